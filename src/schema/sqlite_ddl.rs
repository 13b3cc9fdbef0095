//! DDL for the text/epoch-integer backend.

/// Executed in order against a fresh connection during
/// `DbBackend::migrate`.
pub const STATEMENTS: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    r"
    CREATE TABLE IF NOT EXISTS issuers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        email TEXT,
        description TEXT,
        image TEXT,
        public_key TEXT,
        additional_fields TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS badge_classes (
        id TEXT PRIMARY KEY,
        issuer TEXT NOT NULL REFERENCES issuers(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        image TEXT NOT NULL,
        criteria TEXT NOT NULL DEFAULT '{}',
        alignment TEXT,
        tags TEXT,
        version TEXT,
        previous_version TEXT REFERENCES badge_classes(id) ON DELETE SET NULL,
        related TEXT,
        endorsement TEXT,
        additional_fields TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_badge_classes_issuer ON badge_classes(issuer)",
    "CREATE INDEX IF NOT EXISTS idx_badge_classes_previous_version ON badge_classes(previous_version)",
    r"
    CREATE TABLE IF NOT EXISTS assertions (
        id TEXT PRIMARY KEY,
        badge_class TEXT NOT NULL REFERENCES badge_classes(id) ON DELETE CASCADE,
        issuer TEXT NOT NULL REFERENCES issuers(id) ON DELETE CASCADE,
        recipient TEXT NOT NULL,
        recipient_email TEXT GENERATED ALWAYS AS (json_extract(recipient, '$.email')) STORED,
        recipient_identity TEXT GENERATED ALWAYS AS (json_extract(recipient, '$.identity')) STORED,
        recipient_type TEXT GENERATED ALWAYS AS (json_extract(recipient, '$.type')) STORED,
        issued_on INTEGER NOT NULL,
        expires INTEGER,
        evidence TEXT,
        verification TEXT,
        revoked INTEGER NOT NULL DEFAULT 0,
        revocation_reason TEXT,
        additional_fields TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_assertions_badge_class ON assertions(badge_class)",
    "CREATE INDEX IF NOT EXISTS idx_assertions_issuer ON assertions(issuer)",
    "CREATE INDEX IF NOT EXISTS idx_assertions_recipient_email ON assertions(recipient_email)",
    "CREATE INDEX IF NOT EXISTS idx_assertions_recipient_identity ON assertions(recipient_identity)",
    "CREATE INDEX IF NOT EXISTS idx_assertions_recipient_type ON assertions(recipient_type)",
    r"
    CREATE TABLE IF NOT EXISTS status_lists (
        id TEXT PRIMARY KEY,
        issuer_id TEXT NOT NULL REFERENCES issuers(id) ON DELETE CASCADE,
        purpose TEXT NOT NULL,
        status_size INTEGER NOT NULL,
        encoded_list TEXT NOT NULL,
        ttl INTEGER,
        total_entries INTEGER NOT NULL,
        used_entries INTEGER NOT NULL DEFAULT 0,
        metadata TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_status_lists_issuer ON status_lists(issuer_id)",
    r"
    CREATE INDEX IF NOT EXISTS idx_status_lists_allocation
        ON status_lists(issuer_id, purpose, status_size, used_entries)",
    r"
    CREATE TABLE IF NOT EXISTS credential_status_entries (
        id TEXT PRIMARY KEY,
        credential_id TEXT NOT NULL REFERENCES assertions(id) ON DELETE CASCADE,
        status_list_id TEXT NOT NULL REFERENCES status_lists(id) ON DELETE CASCADE,
        status_list_index INTEGER NOT NULL,
        status_size INTEGER NOT NULL,
        purpose TEXT NOT NULL,
        current_status INTEGER NOT NULL DEFAULT 0,
        status_reason TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (status_list_id, status_list_index),
        UNIQUE (credential_id, purpose)
    )",
    "CREATE INDEX IF NOT EXISTS idx_status_entries_credential ON credential_status_entries(credential_id)",
    "CREATE INDEX IF NOT EXISTS idx_status_entries_status_list ON credential_status_entries(status_list_id)",
];

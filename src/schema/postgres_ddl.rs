//! DDL for the native-UUID/JSONB backend.

/// Executed in order against a fresh connection during
/// `DbBackend::migrate`.
pub const STATEMENTS: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS issuers (
        id UUID PRIMARY KEY,
        name JSONB NOT NULL,
        url TEXT NOT NULL,
        email TEXT,
        description TEXT,
        image JSONB,
        public_key JSONB,
        additional_fields JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS badge_classes (
        id UUID PRIMARY KEY,
        issuer UUID NOT NULL REFERENCES issuers(id) ON DELETE CASCADE,
        name JSONB NOT NULL,
        description TEXT NOT NULL,
        image JSONB NOT NULL,
        criteria JSONB NOT NULL DEFAULT '{}'::jsonb,
        alignment JSONB,
        tags JSONB,
        version TEXT,
        previous_version UUID REFERENCES badge_classes(id) ON DELETE SET NULL,
        related JSONB,
        endorsement JSONB,
        additional_fields JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_badge_classes_issuer ON badge_classes(issuer)",
    "CREATE INDEX IF NOT EXISTS idx_badge_classes_previous_version ON badge_classes(previous_version)",
    "CREATE INDEX IF NOT EXISTS idx_badge_classes_related ON badge_classes USING GIN (related)",
    "CREATE INDEX IF NOT EXISTS idx_badge_classes_endorsement ON badge_classes USING GIN (endorsement)",
    r#"
    CREATE TABLE IF NOT EXISTS assertions (
        id UUID PRIMARY KEY,
        badge_class UUID NOT NULL REFERENCES badge_classes(id) ON DELETE CASCADE,
        issuer UUID NOT NULL REFERENCES issuers(id) ON DELETE CASCADE,
        recipient JSONB NOT NULL,
        issued_on TIMESTAMPTZ NOT NULL,
        expires TIMESTAMPTZ,
        evidence JSONB,
        verification JSONB,
        revoked JSONB NOT NULL DEFAULT '{"status": false}'::jsonb,
        revocation_reason TEXT,
        additional_fields JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_assertions_badge_class ON assertions(badge_class)",
    "CREATE INDEX IF NOT EXISTS idx_assertions_issuer ON assertions(issuer)",
    "CREATE INDEX IF NOT EXISTS idx_assertions_recipient_email ON assertions((recipient->>'email'))",
    "CREATE INDEX IF NOT EXISTS idx_assertions_recipient_identity ON assertions((recipient->>'identity'))",
    "CREATE INDEX IF NOT EXISTS idx_assertions_recipient_type ON assertions((recipient->>'type'))",
    r"
    CREATE TABLE IF NOT EXISTS status_lists (
        id UUID PRIMARY KEY,
        issuer_id UUID NOT NULL REFERENCES issuers(id) ON DELETE CASCADE,
        purpose TEXT NOT NULL,
        status_size SMALLINT NOT NULL,
        encoded_list TEXT NOT NULL,
        ttl BIGINT,
        total_entries INTEGER NOT NULL,
        used_entries INTEGER NOT NULL DEFAULT 0,
        metadata JSONB,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_status_lists_issuer ON status_lists(issuer_id)",
    r"
    CREATE INDEX IF NOT EXISTS idx_status_lists_allocation
        ON status_lists(issuer_id, purpose, status_size, used_entries)",
    r"
    CREATE TABLE IF NOT EXISTS credential_status_entries (
        id UUID PRIMARY KEY,
        credential_id UUID NOT NULL REFERENCES assertions(id) ON DELETE CASCADE,
        status_list_id UUID NOT NULL REFERENCES status_lists(id) ON DELETE CASCADE,
        status_list_index INTEGER NOT NULL,
        status_size SMALLINT NOT NULL,
        purpose TEXT NOT NULL,
        current_status INTEGER NOT NULL DEFAULT 0,
        status_reason TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        UNIQUE (status_list_id, status_list_index),
        UNIQUE (credential_id, purpose)
    )",
    "CREATE INDEX IF NOT EXISTS idx_status_entries_credential ON credential_status_entries(credential_id)",
    "CREATE INDEX IF NOT EXISTS idx_status_entries_status_list ON credential_status_entries(status_list_id)",
];

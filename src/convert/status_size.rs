use crate::error::RepoError;

/// Number of bits per credential slot in a status list: one of `1`, `2`,
/// `4`, or `8`.
///
/// Two historical source variants disagree on the storage type for this
/// value (text-of-number vs. a native small integer) for the same
/// backend; mappers accept either on read and always persist as the
/// backend's native small-integer type going forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatusSize(u8);

impl StatusSize {
    /// Validate and wrap a raw bit-width.
    pub fn new(value: u8) -> Result<Self, RepoError> {
        match value {
            1 | 2 | 4 | 8 => Ok(Self(value)),
            other => {
                Err(RepoError::Validation(format!("statusSize must be 1, 2, 4, or 8, got {other}")))
            }
        }
    }

    /// Parse from whichever shape the row yielded: a native integer
    /// column, or text-of-number for backward compatibility with the
    /// older source variant.
    pub fn from_text(raw: &str) -> Result<Self, RepoError> {
        let value: u8 = raw
            .trim()
            .parse()
            .map_err(|e| RepoError::Corruption(format!("invalid statusSize text {raw:?}: {e}")))?;
        Self::new(value)
    }

    /// The bit width as a plain `u8`.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// The maximum value representable in one slot: `2^statusSize - 1`.
    #[must_use]
    pub const fn max_value(self) -> u64 {
        (1u64 << self.0) - 1
    }
}

impl TryFrom<i64> for StatusSize {
    type Error = RepoError;

    fn try_from(value: i64) -> Result<Self, RepoError> {
        let value: u8 = value
            .try_into()
            .map_err(|_| RepoError::Corruption(format!("statusSize out of range: {value}")))?;
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_sizes() {
        for n in [1, 2, 4, 8] {
            assert_eq!(StatusSize::new(n).unwrap().bits(), n);
        }
    }

    #[test]
    fn rejects_invalid_sizes() {
        for n in [0, 3, 5, 6, 7, 9, 16] {
            assert!(StatusSize::new(n).is_err());
        }
    }

    #[test]
    fn from_text_accepts_numeric_string() {
        assert_eq!(StatusSize::from_text("2").unwrap().bits(), 2);
        assert!(StatusSize::from_text("three").is_err());
    }

    #[test]
    fn max_value_matches_bit_width() {
        assert_eq!(StatusSize::new(1).unwrap().max_value(), 1);
        assert_eq!(StatusSize::new(2).unwrap().max_value(), 3);
        assert_eq!(StatusSize::new(4).unwrap().max_value(), 15);
        assert_eq!(StatusSize::new(8).unwrap().max_value(), 255);
    }
}

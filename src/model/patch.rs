/// Distinguishes "this field was not supplied in the update" from "this
/// field was supplied and set to its default/null value". `update`
/// methods merge a `Patch<T>` struct over the current row field-by-field;
/// only `Set` variants overwrite the existing value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// The field was not present in the update payload; leave it alone.
    #[default]
    Unset,
    /// The field was present and should be written, even if the value
    /// is `None`-shaped for an `Option<T>` inner type.
    Set(T),
}

impl<T> Patch<T> {
    /// Apply this patch over an existing value, returning the existing
    /// value unchanged when `Unset`.
    pub fn apply_over(self, existing: T) -> T {
        match self {
            Self::Unset => existing,
            Self::Set(value) => value,
        }
    }

    /// `true` if this patch carries a value.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_preserves_existing_value() {
        let patch: Patch<String> = Patch::Unset;
        assert_eq!(patch.apply_over("original".to_string()), "original");
    }

    #[test]
    fn set_overwrites_even_with_falsy_value() {
        let patch = Patch::Set(String::new());
        assert_eq!(patch.apply_over("original".to_string()), "");
    }

    #[test]
    fn set_none_is_distinct_from_unset_for_optional_fields() {
        let unset: Patch<Option<String>> = Patch::Unset;
        let set_to_none: Patch<Option<String>> = Patch::Set(None);
        assert_eq!(unset.apply_over(Some("kept".to_string())), Some("kept".to_string()));
        assert_eq!(set_to_none.apply_over(Some("kept".to_string())), None);
    }
}

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// An opaque handle naming a scope (e.g. `string.quoted.double`).
///
/// The tokenizer never looks at scope strings; callers intern their scope
/// names however they like and hand out nonzero handles. Handle 0 is
/// reserved for "no scope", which is why this wraps [`NonZeroU32`] and
/// absent scopes are `Option<ScopeName>`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeName(NonZeroU32);

impl ScopeName {
    /// Returns `None` for 0, the reserved "no scope" value.
    pub const fn new(raw: u32) -> Option<ScopeName> {
        match NonZeroU32::new(raw) {
            Some(n) => Some(ScopeName(n)),
            None => None,
        }
    }

    /// The raw handle value.
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_reserved() {
        assert!(ScopeName::new(0).is_none());
        assert_eq!(ScopeName::new(7).unwrap().get(), 7);
    }

    #[test]
    fn serializes_as_plain_integer() {
        let name = ScopeName::new(42).unwrap();
        assert_eq!(serde_json::to_string(&name).unwrap(), "42");
        let back: ScopeName = serde_json::from_str("42").unwrap();
        assert_eq!(back, name);
    }
}

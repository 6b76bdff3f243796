//! File identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::FilehostError;

/// Opaque identifier shared by a registry record and its blob.
///
/// A random 128-bit UUID (v4) drawn from the OS CSPRNG. Rendered as
/// lowercase hyphenated text, which is also the blob key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Mint a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier supplied by a caller.
    ///
    /// Returns `InvalidIdentifier` for anything that is not a UUID, including
    /// a UUID with surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self, FilehostError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| FilehostError::InvalidIdentifier(s.to_string()))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for FileId {
    type Err = FilehostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique() {
        let ids: HashSet<FileId> = (0..1000).map(|_| FileId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_display_is_hyphenated_lowercase() {
        let id = FileId::generate();
        let s = id.to_string();
        assert_eq!(s.len(), 36);
        assert_eq!(s, s.to_lowercase());
        assert_eq!(s.matches('-').count(), 4);
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = FileId::generate();
        let parsed: FileId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_invalid() {
        let id = FileId::generate().to_string();
        let padded = [format!(" {id} "), format!("{id}\n"), format!("\t{id}")];
        let bad_inputs = ["", "abc", "../../etc/passwd", "65f1c0e2a4b3d2e1f0a9b8c7"]
            .into_iter()
            .map(str::to_string)
            .chain(padded);
        for bad in bad_inputs {
            let result = FileId::parse(&bad);
            assert!(
                matches!(result, Err(FilehostError::InvalidIdentifier(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}

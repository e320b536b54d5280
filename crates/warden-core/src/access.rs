//! Access kinds: the closed set of operations a permission can grant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of access being requested.
///
/// Variants are declared in the canonical order; `Ord` and [`AccessKind::ALL`]
/// follow it, so ordered collections of kinds are deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
    Create,
    Remove,
    Import,
    Export,
}

impl AccessKind {
    /// Every access kind, in declaration order.
    pub const ALL: [AccessKind; 6] = [
        AccessKind::Read,
        AccessKind::Write,
        AccessKind::Create,
        AccessKind::Remove,
        AccessKind::Import,
        AccessKind::Export,
    ];

    /// Lowercase name, as used in storage and messages.
    pub fn as_str(self) -> &'static str {
        match self {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
            AccessKind::Create => "create",
            AccessKind::Remove => "remove",
            AccessKind::Import => "import",
            AccessKind::Export => "export",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown access kind `{s}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_order() {
        let mut shuffled = vec![
            AccessKind::Export,
            AccessKind::Read,
            AccessKind::Remove,
            AccessKind::Write,
            AccessKind::Import,
            AccessKind::Create,
        ];
        shuffled.sort();
        assert_eq!(shuffled, AccessKind::ALL.to_vec());
    }

    #[test]
    fn test_parse() {
        assert_eq!("READ".parse::<AccessKind>().unwrap(), AccessKind::Read);
        assert_eq!(" export ".parse::<AccessKind>().unwrap(), AccessKind::Export);
        assert!("delete".parse::<AccessKind>().is_err());
    }
}

//! Derived table names for one logical document store.

use super::{DbError, DbResult};
use once_cell::sync::Lazy;
use regex::Regex;

const VERSIONS_SUFFIX: &str = "__versions";

static TABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid table name regex"));

/// Current-state and history table names derived from one base name.
///
/// Both names are guaranteed to be safe SQL identifiers, so they can be
/// interpolated into statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    base: String,
    versions: String,
}

impl TableNames {
    /// Derives `<base>` and `<base>__versions`.
    ///
    /// # Errors
    /// - Returns `DbError::InvalidTableName` for anything that is not a plain
    ///   ASCII identifier.
    pub fn for_base(base: &str) -> DbResult<Self> {
        if !is_valid_table_name(base) {
            return Err(DbError::InvalidTableName(base.to_string()));
        }
        Ok(Self {
            base: base.to_string(),
            versions: format!("{base}{VERSIONS_SUFFIX}"),
        })
    }

    /// Current-state table.
    pub fn records(&self) -> &str {
        &self.base
    }

    /// Append-only history table.
    pub fn versions(&self) -> &str {
        &self.versions
    }
}

pub(crate) fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::TableNames;
    use crate::db::DbError;

    #[test]
    fn derives_versions_table_from_base() {
        let names = TableNames::for_base("lddb").unwrap();
        assert_eq!(names.records(), "lddb");
        assert_eq!(names.versions(), "lddb__versions");
    }

    #[test]
    fn rejects_names_that_are_not_identifiers() {
        for bad in ["", "1abc", "lddb; DROP TABLE x", "a-b", "spaced name"] {
            let err = TableNames::for_base(bad).unwrap_err();
            assert!(matches!(err, DbError::InvalidTableName(_)), "{bad}");
        }
    }
}

//! The known-release table.
//!
//! `data/goversions.csv` is generated from the upstream release history
//! (columns `tag,sha,date`, ascending by commit date) and embedded at
//! compile time. Lookups key on the tag.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::GoVersion;

static CSV: &str = include_str!("../../data/goversions.csv");

pub(super) static GOVERSIONS: Lazy<HashMap<&'static str, GoVersion>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for line in CSV.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut cols = line.splitn(3, ',');
        let (Some(tag), Some(sha), Some(date)) = (cols.next(), cols.next(), cols.next()) else {
            continue;
        };
        table.insert(
            tag,
            GoVersion {
                name: tag.to_string(),
                sha: sha.to_string(),
                timestamp: date.to_string(),
            },
        );
    }
    table
});

/// Iterate over every known version tag.
pub fn known_tags() -> impl Iterator<Item = &'static str> {
    GOVERSIONS.keys().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_populated() {
        assert!(GOVERSIONS.len() > 100);
        assert!(GOVERSIONS.contains_key("go1"));
        assert!(GOVERSIONS.contains_key("go1.4beta1"));
        assert!(GOVERSIONS.contains_key("go1.16"));
        assert!(GOVERSIONS.contains_key("go1.21.0"));
    }

    #[test]
    fn entries_carry_all_columns() {
        let v = &GOVERSIONS["go1.16"];
        assert_eq!(v.name, "go1.16");
        assert_eq!(v.sha.len(), 40);
        assert!(v.timestamp.contains('T'));
    }
}

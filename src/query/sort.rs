//! Sort key safelists and their ordering table.

use std::cmp::Ordering;

/// Direction applied to a sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    /// Apply this direction to an ascending comparison.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// The field and direction a sort key resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    pub field: &'static str,
    pub direction: SortDirection,
}

/// The permitted sort keys for one resource type.
///
/// The safelist is the key set of this table, so a key can never be
/// permitted without also having a defined field and direction.
#[derive(Debug, Clone)]
pub struct SortTable {
    entries: Vec<(String, SortColumn)>,
}

impl SortTable {
    /// Build a table from explicit `(key, field, direction)` entries, keeping their order.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, &'static str, SortDirection)>,
    {
        let mut table = Self { entries: Vec::new() };
        for (key, field, direction) in entries {
            table.push(key.to_string(), SortColumn { field, direction });
        }
        table
    }

    /// Build a table where each key sorts in its natural direction and the
    /// same key prefixed with `-` sorts in the opposite one.
    ///
    /// The `-` keys are appended after all plain keys.
    pub fn with_reversals(columns: &[(&'static str, &'static str, SortDirection)]) -> Self {
        let mut table = Self::new(columns.iter().copied());
        for &(key, field, direction) in columns {
            table.push(
                format!("-{}", key),
                SortColumn {
                    field,
                    direction: direction.reversed(),
                },
            );
        }
        table
    }

    fn push(&mut self, key: String, column: SortColumn) {
        if !self.contains(&key) {
            self.entries.push((key, column));
        }
    }

    /// The column a key sorts by, if the key is permitted.
    pub fn resolve(&self, key: &str) -> Option<SortColumn> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, column)| *column)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    /// Permitted keys, in table order.
    pub fn safelist(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SortDirection::*;

    #[test]
    fn test_resolve() {
        let table = SortTable::new([("title", "title", Ascending), ("-year", "year", Descending)]);

        assert_eq!(
            table.resolve("title"),
            Some(SortColumn { field: "title", direction: Ascending })
        );
        assert_eq!(
            table.resolve("-year"),
            Some(SortColumn { field: "year", direction: Descending })
        );
        assert_eq!(table.resolve("runtime"), None);
    }

    #[test]
    fn test_reversals_share_field() {
        let table = SortTable::with_reversals(&[("title", "title", Ascending), ("year", "year", Descending)]);

        assert_eq!(
            table.safelist().collect::<Vec<_>>(),
            vec!["title", "year", "-title", "-year"]
        );
        assert_eq!(table.resolve("-title").unwrap().direction, Descending);
        assert_eq!(table.resolve("-year").unwrap().direction, Ascending);
        assert_eq!(table.resolve("-year").unwrap().field, "year");
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let table = SortTable::new([("title", "title", Ascending), ("title", "title", Descending)]);
        assert_eq!(table.safelist().count(), 1);
        assert_eq!(table.resolve("title").unwrap().direction, Ascending);
    }

    #[test]
    fn test_apply_direction() {
        assert_eq!(Ascending.apply(Ordering::Less), Ordering::Less);
        assert_eq!(Descending.apply(Ordering::Less), Ordering::Greater);
    }
}

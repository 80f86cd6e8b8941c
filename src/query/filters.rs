//! Pagination and sort input, and its validation.

use serde::{Deserialize, Serialize};

use super::sort::{SortColumn, SortTable};
use crate::validator::{ValidationErrors, Validator};

/// Highest page number a client may request.
pub const MAX_PAGE: i64 = 10_000_000;
/// Largest page a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Untrusted pagination and sort parameters as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
            sort: "title".to_string(),
        }
    }
}

impl Filters {
    /// Check the parameters against their bounds and the resource's sort table.
    ///
    /// Every failing field is reported, keyed as `page`, `page_size` or `sort`.
    pub fn validate(&self, sort_table: &SortTable) -> Result<ValidatedFilters, ValidationErrors> {
        let mut v = Validator::new();
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(self.page_size <= MAX_PAGE_SIZE, "page_size", "must be a maximum of 100");

        let column = sort_table.resolve(&self.sort);
        v.check(column.is_some(), "sort", "invalid sort value");

        match (v.into_result(), column) {
            // Both values are within 1..=MAX_PAGE here
            (Ok(()), Some(column)) => Ok(ValidatedFilters {
                page: self.page as u32,
                page_size: self.page_size as u32,
                column,
            }),
            (Err(errors), _) => Err(errors),
            (Ok(()), None) => Err(ValidationErrors::single("sort", "invalid sort value")),
        }
    }
}

/// Pagination and ordering that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedFilters {
    page: u32,
    page_size: u32,
    column: SortColumn,
}

impl ValidatedFilters {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn column(&self) -> SortColumn {
        self.column
    }

    /// Rows to return.
    pub fn limit(&self) -> usize {
        self.page_size as usize
    }

    /// Rows to skip before the requested page.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.page_size as usize)
    }
}

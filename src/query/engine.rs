//! Filtered, sorted and paginated reads.

use serde::Serialize;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::debug;

use super::filters::{Filters, ValidatedFilters};
use super::sort::{SortColumn, SortTable};
use crate::error::{MarqueeError, Result};
use crate::store::{SharedStore, VersionedRecord};

/// A comparable value of one sortable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue<'a> {
    Missing,
    Int(i64),
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// A record the list engine can search, filter by tag and sort.
pub trait Listable: VersionedRecord {
    /// The field matched by the free-text search term.
    fn search_text(&self) -> &str;

    fn tags(&self) -> &[String];

    /// The value of `field` for ordering. Unknown fields compare as `Missing`.
    fn sort_value(&self, field: &str) -> SortValue<'_>;
}

/// Pagination details returned alongside a page of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub current_page: u32,
    pub page_size: u32,
    pub first_page: u32,
    pub last_page: u32,
    pub total_records: usize,
}

impl Metadata {
    /// Metadata for `total_records` matches; all zero when nothing matched.
    pub fn calculate(total_records: usize, page: u32, page_size: u32) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        let last_page = total_records.div_ceil(page_size as usize);
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
            total_records,
        }
    }
}

/// One page of a list read.
#[derive(Debug, Clone)]
pub struct Page<R> {
    pub records: Vec<R>,
    pub metadata: Metadata,
}

/// Runs list reads against a store.
///
/// Input is validated before the store is touched. Matching rows are put in
/// a total order (the requested column, then id ascending) before slicing, so
/// walking the pages of an unchanging collection visits every record exactly once.
pub struct ListQueryEngine<R: Listable> {
    store: SharedStore<R>,
    deadline: Duration,
}

impl<R: Listable> ListQueryEngine<R> {
    pub fn new(store: SharedStore<R>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    /// Return the requested page of records matching `search_term` and `required_tags`.
    ///
    /// An empty search term or tag list matches everything. Fails with
    /// `Validation` for bad pagination or sort input, and with `Transient` if
    /// the store fails or the deadline passes; partial results are never returned.
    pub async fn list(
        &self,
        search_term: &str,
        required_tags: &[String],
        filters: &Filters,
        sort_table: &SortTable,
    ) -> Result<Page<R>> {
        let query = filters.validate(sort_table)?;

        let needle = search_term.to_lowercase();
        let matches = |record: &R| {
            (needle.is_empty() || record.search_text().to_lowercase().contains(&needle))
                && required_tags
                    .iter()
                    .all(|tag| record.tags().iter().any(|t| t == tag))
        };

        let mut rows = match tokio::time::timeout(self.deadline, self.store.find(&matches)).await {
            Ok(rows) => rows?,
            Err(_) => {
                return Err(MarqueeError::Transient(format!(
                    "list exceeded deadline of {:?}",
                    self.deadline
                )))
            }
        };

        let column = query.column();
        rows.sort_by(|a, b| total_order(a, b, column));

        let page = paginate(rows, &query);
        debug!(
            search = %search_term,
            sort = %filters.sort,
            returned = page.records.len(),
            total = page.metadata.total_records,
            "List query executed"
        );
        Ok(page)
    }
}

fn total_order<R: Listable>(a: &R, b: &R, column: SortColumn) -> Ordering {
    let primary = a.sort_value(column.field).cmp(&b.sort_value(column.field));
    column
        .direction
        .apply(primary)
        .then_with(|| a.id().cmp(&b.id()))
}

fn paginate<R>(rows: Vec<R>, query: &ValidatedFilters) -> Page<R> {
    let metadata = Metadata::calculate(rows.len(), query.page(), query.page_size());
    let records = rows
        .into_iter()
        .skip(query.offset())
        .take(query.limit())
        .collect();
    Page { records, metadata }
}

//! List reads: filter validation, safelisted sorting and pagination.

mod engine;
mod filters;
mod sort;

pub use engine::{ListQueryEngine, Listable, Metadata, Page, SortValue};
pub use filters::{Filters, ValidatedFilters, MAX_PAGE, MAX_PAGE_SIZE};
pub use sort::{SortColumn, SortDirection, SortTable};

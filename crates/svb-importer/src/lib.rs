//! Catalog importers: paginated walking of the Spree storefront API and
//! conversion of taxons and products into search-index documents.
//!
//! A sync run for one document type walks the listing pages, handing each
//! page's writes to the bulk queue as it goes, then flushes the queue and
//! reconciles by deleting documents whose cursor was not touched this run.
//! A fetch failure aborts before reconciliation, leaving the partial sync in
//! place; a rejected write is fatal and also skips reconciliation.

pub mod category;
pub mod error;
pub mod price;
pub mod product;
pub mod sync;
pub mod walker;

pub use error::{ImportError, MappingError};
pub use price::PriceResolver;
pub use sync::{ImportStats, SyncContext};
pub use walker::{walk_pages, walk_pages_with_drain, WalkStats};

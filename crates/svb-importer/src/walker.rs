//! Sequential page walker over a paginated JSON:API listing.
//!
//! Pages are requested one at a time starting at page 1 and never
//! concurrently: each page's `included` set is scoped to that page, so a
//! resource must be processed together with the page it arrived on.

use std::future::Future;

use svb_spree::{JsonApiDocument, JsonApiPage, SpreeError};

use crate::error::{ImportError, MappingError};

/// Counters from a completed walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Resources handed to the callback, including those whose mapping
    /// failed.
    pub resources: u64,
    /// Pages fetched.
    pub pages: u32,
    /// Per-resource mapping failures (logged and skipped).
    pub mapping_errors: u64,
}

/// Walks every page of a listing, invoking `on_resource` exactly once per
/// primary resource in source order.
///
/// A mapping error is logged with the page number and the resource's index
/// within the page, counted, and skipped; the walk continues. The walk stops
/// after `meta.total_pages` or after `max_pages`, whichever comes first.
///
/// # Errors
///
/// A page-fetch error aborts the walk and is returned as
/// [`ImportError::PageFetch`].
pub async fn walk_pages<F, Fut>(
    fetch_page: F,
    on_resource: impl FnMut(&JsonApiDocument, &[JsonApiDocument]) -> Result<(), MappingError>,
    per_page: u32,
    max_pages: u32,
) -> Result<WalkStats, ImportError>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<JsonApiPage, SpreeError>>,
{
    walk_pages_with_drain(
        fetch_page,
        on_resource,
        || async { Ok::<(), ImportError>(()) },
        per_page,
        max_pages,
    )
    .await
}

/// Like [`walk_pages`], with `drain` awaited after each page.
///
/// The mapper stays synchronous; an importer buffers the page's writes in
/// the mapper and hands them to its write queue in `drain`, so flushes
/// overlap the walk instead of waiting for the whole listing. A drain error
/// aborts the walk.
///
/// # Errors
///
/// A page-fetch error aborts the walk and is returned as
/// [`ImportError::PageFetch`]; a drain error is returned as is.
pub async fn walk_pages_with_drain<F, Fut, D, DFut>(
    mut fetch_page: F,
    mut on_resource: impl FnMut(&JsonApiDocument, &[JsonApiDocument]) -> Result<(), MappingError>,
    mut drain: D,
    per_page: u32,
    max_pages: u32,
) -> Result<WalkStats, ImportError>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<JsonApiPage, SpreeError>>,
    D: FnMut() -> DFut,
    DFut: Future<Output = Result<(), ImportError>>,
{
    let mut stats = WalkStats::default();
    let mut page = 1_u32;

    loop {
        if page > max_pages {
            tracing::info!(
                pages = stats.pages,
                resource_upper_bound = u64::from(stats.pages) * u64::from(per_page),
                "page limit reached, stopping pagination"
            );
            break;
        }

        let response = fetch_page(page, per_page).await?;
        stats.pages += 1;
        tracing::info!(page, resources = response.data.len(), "page downloaded");

        for (resource_index, resource) in response.data.iter().enumerate() {
            stats.resources += 1;
            if let Err(error) = on_resource(resource, &response.included) {
                stats.mapping_errors += 1;
                tracing::error!(
                    page,
                    per_page,
                    resource_index,
                    %error,
                    "resource import error"
                );
            }
        }

        drain().await?;

        if page >= response.meta.total_pages {
            tracing::info!(
                pages = stats.pages,
                resource_upper_bound = u64::from(page) * u64::from(per_page),
                "pagination finished"
            );
            break;
        }
        page += 1;
    }

    Ok(stats)
}

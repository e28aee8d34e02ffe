//! Shared sync-run plumbing: the run context, the watermark rule, and the
//! drain/reconcile tail every importer finishes with.

use chrono::{DateTime, Utc};
use serde_json::json;
use svb_elastic::{BulkWriteQueue, DocType, ElasticClient};
use svb_spree::JsonApiDocument;

use crate::error::ImportError;

/// Parameters shared by one sync run.
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Opaque run marker stamped on every document touched this run.
    /// Reconciliation deletes whatever does not carry it.
    pub cursor: String,
    /// Watermark: resources not updated since this instant get a cursor-only
    /// patch instead of a full re-index.
    pub updated_since: Option<DateTime<Utc>>,
    /// Base URL prepended to relative image style URLs.
    pub images_host: Option<String>,
    pub per_page: u32,
    pub max_pages: u32,
}

/// Counters reported after a completed import.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportStats {
    /// Cursor-only patches (resource unchanged since the watermark).
    pub cursor_updates: u64,
    /// Full document replacements.
    pub replacements: u64,
    /// Stale documents removed during reconciliation.
    pub stale_deleted: u64,
}

impl SyncContext {
    /// True when the resource predates the watermark and only needs its
    /// cursor stamped. An unparseable or missing `updated_at` counts as
    /// changed, so the resource is re-indexed in full.
    #[must_use]
    pub fn older_than_watermark(&self, resource: &JsonApiDocument) -> bool {
        let Some(watermark) = self.updated_since else {
            return false;
        };
        resource
            .attr_str("updated_at")
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .is_some_and(|updated_at| updated_at.with_timezone(&Utc) < watermark)
    }

    /// The cursor-only patch pushed for resources behind the watermark.
    #[must_use]
    pub fn cursor_patch(&self, resource: &JsonApiDocument) -> serde_json::Value {
        match resource.numeric_id() {
            Some(id) => json!({"id": id, "cursor": self.cursor}),
            None => json!({"id": resource.id, "cursor": self.cursor}),
        }
    }
}

/// Drains the queue and reconciles one document type.
///
/// Any accumulated item failure makes the run fatal before reconciliation is
/// attempted, so a failed run never deletes documents. A burst of
/// update-on-missing failures gets a dedicated operator hint: the watermark
/// was probably set earlier than the index contents.
///
/// # Errors
///
/// Returns [`ImportError::BulkWrite`] when the drain left rejected
/// operations, and [`ImportError::StaleDelete`] when reconciliation reported
/// failures.
pub(crate) async fn drain_and_reconcile(
    queue: &BulkWriteQueue,
    elastic: &ElasticClient,
    doc_type: DocType,
    ctx: &SyncContext,
) -> Result<u64, ImportError> {
    let report = queue.flush().await?;

    if !report.is_clean() {
        tracing::error!(
            %doc_type,
            rejected = report.failures.len(),
            "some or all bulk operations failed"
        );
        if report.has_missing_update_targets() {
            tracing::warn!(
                updated_since = ?ctx.updated_since,
                "tried updating documents missing from the index; \
                 is updated-since appropriate? Try re-running without it."
            );
        }
        return Err(ImportError::BulkWrite {
            doc_type,
            failures: report.failures,
        });
    }

    tracing::info!(%doc_type, cursor = %ctx.cursor, "import clean, removing stale documents");
    let outcome = elastic.delete_stale(doc_type, &ctx.cursor).await?;

    if !outcome.failures.is_empty() {
        tracing::error!(
            %doc_type,
            failures = outcome.failures.len(),
            "stale document removal failed"
        );
        return Err(ImportError::StaleDelete {
            doc_type,
            failures: outcome.failures,
        });
    }

    tracing::info!(%doc_type, removed = outcome.total_deleted, "stale documents removed");
    Ok(outcome.total_deleted)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ctx(updated_since: Option<&str>) -> SyncContext {
        SyncContext {
            cursor: "1000".to_string(),
            updated_since: updated_since
                .map(|raw| DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)),
            images_host: None,
            per_page: 50,
            max_pages: 500,
        }
    }

    fn resource(id: &str, updated_at: Option<&str>) -> JsonApiDocument {
        let attributes = match updated_at {
            Some(ts) => json!({"updated_at": ts}),
            None => json!({}),
        };
        serde_json::from_value(json!({
            "id": id,
            "type": "product",
            "attributes": attributes,
            "relationships": {}
        }))
        .unwrap()
    }

    #[test]
    fn no_watermark_means_everything_changed() {
        let ctx = ctx(None);
        let r = resource("1", Some("2019-01-01T00:00:00Z"));
        assert!(!ctx.older_than_watermark(&r));
    }

    #[test]
    fn resource_behind_watermark_is_old() {
        let ctx = ctx(Some("2020-06-01T00:00:00Z"));
        assert!(ctx.older_than_watermark(&resource("1", Some("2020-01-01T00:00:00Z"))));
        assert!(!ctx.older_than_watermark(&resource("2", Some("2020-07-01T00:00:00Z"))));
    }

    #[test]
    fn missing_updated_at_counts_as_changed() {
        let ctx = ctx(Some("2020-06-01T00:00:00Z"));
        assert!(!ctx.older_than_watermark(&resource("1", None)));
        assert!(!ctx.older_than_watermark(&resource("2", Some("not a date"))));
    }

    #[test]
    fn cursor_patch_uses_numeric_id() {
        let ctx = ctx(None);
        let patch = ctx.cursor_patch(&resource("17", None));
        assert_eq!(patch, json!({"id": 17, "cursor": "1000"}));
    }
}

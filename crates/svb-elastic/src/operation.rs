//! Bulk write operations and their typed per-item results.
//!
//! Every catalog write goes through the `_bulk` API as a header line plus a
//! body line of NDJSON. The bulk response is parsed back into
//! [`BulkItemFailure`] values so callers match on operation kind and status
//! instead of probing raw response shapes.

use serde_json::Value;

use crate::error::ElasticError;

/// The catalog document types this bridge writes. Each type lives in its own
/// index (`{index}_{type}`), replacing the mapping types of older
/// Elasticsearch versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocType {
    Category,
    Product,
    Attribute,
}

impl DocType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DocType::Category => "category",
            DocType::Product => "product",
            DocType::Attribute => "attribute",
        }
    }

    /// All document types, in the order `remove-everything` deletes them.
    #[must_use]
    pub fn all() -> [DocType; 3] {
        [DocType::Category, DocType::Product, DocType::Attribute]
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Full document replace (upsert).
    Index,
    /// Partial patch of an existing document; fails when the target is
    /// missing.
    Update,
}

impl OpKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Index => "index",
            OpKind::Update => "update",
        }
    }
}

/// One pending bulk write: operation kind, target type, document id, and the
/// document (for `Index`) or partial patch (for `Update`).
#[derive(Debug, Clone)]
pub struct BulkOperation {
    pub kind: OpKind,
    pub doc_type: DocType,
    pub id: String,
    pub body: Value,
}

impl BulkOperation {
    /// Builds a full-replace operation from a document carrying an `id`
    /// field.
    ///
    /// # Errors
    ///
    /// Returns [`ElasticError::InvalidDocument`] when the document has no
    /// usable `id`.
    pub fn index(doc_type: DocType, document: Value) -> Result<Self, ElasticError> {
        let id = extract_id(&document, doc_type)?;
        Ok(Self {
            kind: OpKind::Index,
            doc_type,
            id,
            body: document,
        })
    }

    /// Builds a partial-patch operation from a patch carrying an `id` field.
    ///
    /// # Errors
    ///
    /// Returns [`ElasticError::InvalidDocument`] when the patch has no usable
    /// `id`.
    pub fn update(doc_type: DocType, patch: Value) -> Result<Self, ElasticError> {
        let id = extract_id(&patch, doc_type)?;
        Ok(Self {
            kind: OpKind::Update,
            doc_type,
            id,
            body: patch,
        })
    }

    /// Appends the operation's header and body lines to an NDJSON buffer.
    pub(crate) fn append_ndjson(&self, index_name: &str, out: &mut String) {
        let header = match self.kind {
            OpKind::Index => {
                serde_json::json!({"index": {"_index": index_name, "_id": self.id}})
            }
            OpKind::Update => {
                serde_json::json!({"update": {"_index": index_name, "_id": self.id}})
            }
        };
        out.push_str(&header.to_string());
        out.push('\n');

        match self.kind {
            OpKind::Index => out.push_str(&self.body.to_string()),
            OpKind::Update => out.push_str(&serde_json::json!({"doc": self.body}).to_string()),
        }
        out.push('\n');
    }
}

fn extract_id(document: &Value, doc_type: DocType) -> Result<String, ElasticError> {
    match document.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ElasticError::InvalidDocument {
            reason: format!("{doc_type} document is missing an id"),
        }),
    }
}

/// One rejected item from a bulk response: which kind of operation failed,
/// for which document, and why.
#[derive(Debug, Clone)]
pub struct BulkItemFailure {
    pub kind: OpKind,
    pub id: String,
    pub status: u16,
    pub reason: String,
}

impl BulkItemFailure {
    /// An update that failed because the target document does not exist.
    /// A burst of these usually means the caller's `updated-since` watermark
    /// predates the index contents.
    #[must_use]
    pub fn is_missing_update_target(&self) -> bool {
        self.kind == OpKind::Update && self.status == 404
    }
}

/// Extracts the failing items from a `_bulk` response body.
///
/// Items with a 2xx status and no `error` object are successes and are
/// skipped; everything else is reported. Items with an unrecognized shape
/// are reported too, so silent data loss cannot hide behind a malformed
/// response.
#[must_use]
pub fn parse_bulk_failures(response: &Value) -> Vec<BulkItemFailure> {
    let Some(items) = response.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let (kind, detail) = if let Some(detail) = item.get("index") {
                (OpKind::Index, detail)
            } else if let Some(detail) = item.get("update") {
                (OpKind::Update, detail)
            } else {
                return Some(BulkItemFailure {
                    kind: OpKind::Index,
                    id: String::new(),
                    status: 0,
                    reason: format!("unrecognized bulk item shape: {item}"),
                });
            };

            let status = detail
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .unwrap_or(0);
            let error = detail.get("error");

            if (200..300).contains(&status) && error.is_none() {
                return None;
            }

            let id = detail
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let reason = error
                .and_then(|e| e.get("reason"))
                .and_then(Value::as_str)
                .map_or_else(|| format!("status {status}"), str::to_string);

            Some(BulkItemFailure {
                kind,
                id,
                status,
                reason,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn index_extracts_numeric_id() {
        let op = BulkOperation::index(DocType::Product, json!({"id": 42, "name": "x"})).unwrap();
        assert_eq!(op.id, "42");
        assert_eq!(op.kind, OpKind::Index);
    }

    #[test]
    fn update_extracts_string_id() {
        let op = BulkOperation::update(DocType::Category, json!({"id": "7", "cursor": "c"}))
            .unwrap();
        assert_eq!(op.id, "7");
        assert_eq!(op.kind, OpKind::Update);
    }

    #[test]
    fn index_rejects_missing_id() {
        let err = BulkOperation::index(DocType::Product, json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, ElasticError::InvalidDocument { .. }));
    }

    #[test]
    fn ndjson_index_emits_header_and_document() {
        let op =
            BulkOperation::index(DocType::Product, json!({"id": 1, "cursor": "1000"})).unwrap();
        let mut out = String::new();
        op.append_ndjson("catalog_product", &mut out);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let header: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(header["index"]["_index"], "catalog_product");
        assert_eq!(header["index"]["_id"], "1");
        let body: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(body["cursor"], "1000");
    }

    #[test]
    fn ndjson_update_wraps_patch_in_doc() {
        let op =
            BulkOperation::update(DocType::Product, json!({"id": 1, "cursor": "1000"})).unwrap();
        let mut out = String::new();
        op.append_ndjson("catalog_product", &mut out);
        let lines: Vec<&str> = out.lines().collect();
        let header: Value = serde_json::from_str(lines[0]).unwrap();
        assert!(header.get("update").is_some());
        let body: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(body["doc"]["cursor"], "1000");
    }

    #[test]
    fn parse_bulk_failures_skips_successes() {
        let response = json!({
            "errors": false,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"update": {"_id": "2", "status": 200}}
            ]
        });
        assert!(parse_bulk_failures(&response).is_empty());
    }

    #[test]
    fn parse_bulk_failures_reports_update_404() {
        let response = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"update": {"_id": "2", "status": 404, "error": {
                    "type": "document_missing_exception",
                    "reason": "[2]: document missing"
                }}}
            ]
        });
        let failures = parse_bulk_failures(&response);
        assert_eq!(failures.len(), 1);
        let failure = &failures[0];
        assert_eq!(failure.kind, OpKind::Update);
        assert_eq!(failure.id, "2");
        assert_eq!(failure.status, 404);
        assert!(failure.is_missing_update_target());
        assert!(failure.reason.contains("document missing"));
    }

    #[test]
    fn parse_bulk_failures_reports_index_rejection() {
        let response = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "9", "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [price]"
                }}}
            ]
        });
        let failures = parse_bulk_failures(&response);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, OpKind::Index);
        assert!(!failures[0].is_missing_update_target());
    }

    #[test]
    fn parse_bulk_failures_flags_unknown_item_shape() {
        let response = json!({"items": [{"delete": {"_id": "1", "status": 200}}]});
        let failures = parse_bulk_failures(&response);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].reason.contains("unrecognized"));
    }
}

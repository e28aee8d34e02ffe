//! Lookups into a response's side-loaded `included` resource set.

use crate::types::{JsonApiDocument, ResourceRef};

/// Finds the included resource matching `{kind, id}`, if delivered with the
/// response.
#[must_use]
pub fn find_included<'a>(
    included: &'a [JsonApiDocument],
    kind: &str,
    id: &str,
) -> Option<&'a JsonApiDocument> {
    included.iter().find(|r| r.kind == kind && r.id == id)
}

/// Resolves a resource's named relationship against the `included` set.
///
/// References whose target was not delivered in this response are silently
/// skipped — Spree only side-loads what the `include` query asked for.
#[must_use]
pub fn find_included_of_type<'a>(
    included: &'a [JsonApiDocument],
    record: &JsonApiDocument,
    relationship: &str,
) -> Vec<&'a JsonApiDocument> {
    record
        .relationship_refs(relationship)
        .iter()
        .filter_map(|ResourceRef { id, kind }| find_included(included, kind, id))
        .collect()
}

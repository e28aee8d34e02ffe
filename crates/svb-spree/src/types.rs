//! JSON:API wire types for the Spree storefront API.
//!
//! Spree delivers every resource as `{id, type, attributes, relationships}`.
//! Attributes stay as raw `serde_json::Value` — the set of fields differs per
//! resource type and the importers pick out what they need via the accessor
//! helpers below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single JSON:API resource. Read-only for the duration of one mapping
/// callback; the sync engine never mutates upstream data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonApiDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub relationships: Value,
}

/// A `{type, id}` pair from a relationship's `data` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One page of a paginated listing: primary resources, the side-loaded
/// `included` set scoped to this page, and pagination metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonApiPage {
    pub data: Vec<JsonApiDocument>,
    #[serde(default)]
    pub included: Vec<JsonApiDocument>,
    #[serde(default)]
    pub meta: PageMeta,
}

/// A single-resource response (cart, order, variant lookup).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonApiSingle {
    pub data: JsonApiDocument,
    #[serde(default)]
    pub included: Vec<JsonApiDocument>,
}

/// Pagination metadata. `total_pages` is authoritative but best-effort — the
/// collection may grow or shrink between page requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub total_pages: u32,
}

impl JsonApiDocument {
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn attr_bool(&self, name: &str) -> Option<bool> {
        self.attr(name).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn attr_i64(&self, name: &str) -> Option<i64> {
        self.attr(name).and_then(Value::as_i64)
    }

    /// Numeric attribute accessor that also accepts Spree's stringly-typed
    /// decimals (`"price": "12.99"`).
    #[must_use]
    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        match self.attr(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// The `{type, id}` pairs under `relationships.<name>.data`, whether the
    /// relationship is to-one or to-many. Missing or null relationships yield
    /// an empty list.
    #[must_use]
    pub fn relationship_refs(&self, name: &str) -> Vec<ResourceRef> {
        let Some(data) = self
            .relationships
            .get(name)
            .and_then(|rel| rel.get("data"))
        else {
            return Vec::new();
        };

        match data {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            Value::Object(_) => serde_json::from_value(data.clone())
                .map(|r| vec![r])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// The single `{type, id}` pair of a to-one relationship, if present.
    #[must_use]
    pub fn relationship_ref(&self, name: &str) -> Option<ResourceRef> {
        self.relationship_refs(name).into_iter().next()
    }

    /// Numeric form of the resource id. Spree ids are numeric strings; the
    /// search documents store them as numbers.
    #[must_use]
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.parse().ok()
    }
}

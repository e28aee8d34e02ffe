//! Taxon (category) import.
//!
//! The taxon tree is eager-loaded in full before conversion: a category
//! document embeds its whole subtree (`children_data`) and its ancestor path,
//! so every node must be in hand first.

use serde_json::{json, Map, Value};
use svb_elastic::{BulkWriteQueue, DocType, ElasticClient};
use svb_spree::{JsonApiDocument, SpreeClient};

use crate::error::{ImportError, MappingError};
use crate::sync::{drain_and_reconcile, ImportStats, SyncContext};
use crate::walker::walk_pages;

/// `parent_id` for root categories. Must be an id Spree never generates.
const ROOT_PARENT_ID: i64 = -42;

/// Eager-loads every taxon from the listing.
///
/// # Errors
///
/// Propagates a page-fetch failure.
pub async fn load_categories(
    spree: &SpreeClient,
    ctx: &SyncContext,
) -> Result<Vec<JsonApiDocument>, ImportError> {
    let mut categories = Vec::new();
    walk_pages(
        |page, per_page| spree.list_taxons(page, per_page),
        |resource, _| {
            categories.push(resource.clone());
            Ok(())
        },
        ctx.per_page,
        ctx.max_pages,
    )
    .await?;
    Ok(categories)
}

/// Collects the categories on the root paths of `leaf_ids`: every ancestor
/// of each leaf plus the leaf itself, topmost first, each node at most once.
#[must_use]
pub fn categories_on_path<'a>(
    categories: &'a [JsonApiDocument],
    leaf_ids: &[&str],
) -> Vec<&'a JsonApiDocument> {
    let mut on_path: Vec<&JsonApiDocument> = Vec::new();

    for leaf_id in leaf_ids {
        let mut node_id = Some((*leaf_id).to_string());
        let mut branch: Vec<&JsonApiDocument> = Vec::new();

        while let Some(id) = node_id {
            if on_path.iter().chain(branch.iter()).any(|c| c.id == id) {
                break;
            }
            let Some(node) = categories.iter().find(|c| c.id == id) else {
                break;
            };
            branch.push(node);
            node_id = node.relationship_ref("parent").map(|parent| parent.id);
        }

        // The branch was collected leaf-upwards; prepend it reversed so the
        // topmost category stays on the left.
        branch.reverse();
        let insert_at = on_path.len();
        for node in branch {
            on_path.insert(insert_at, node);
        }
    }

    on_path
}

/// Converts one taxon into its search document.
fn convert_category(
    category: &JsonApiDocument,
    categories: &[JsonApiDocument],
    cursor: &str,
) -> Result<Value, MappingError> {
    let id = category
        .numeric_id()
        .ok_or_else(|| MappingError::missing_attribute(category, "id"))?;
    let depth = category
        .attr_i64("depth")
        .ok_or_else(|| MappingError::missing_attribute(category, "depth"))?;
    let parent_id = category
        .relationship_ref("parent")
        .and_then(|parent| parent.id.parse::<i64>().ok())
        .unwrap_or(ROOT_PARENT_ID);
    let path = categories_on_path(categories, &[category.id.as_str()])
        .iter()
        .map(|c| c.id.clone())
        .collect::<Vec<_>>()
        .join("/");

    let mut document = Map::new();
    if let Some((children_count, children_data)) = children_props(category, categories) {
        document.insert("children_count".to_string(), json!(children_count));
        document.insert("children_data".to_string(), Value::Array(children_data));
    }
    document.insert("id".to_string(), json!(id));
    document.insert("cursor".to_string(), json!(cursor));
    document.insert("is_active".to_string(), json!(true));
    document.insert("level".to_string(), json!(depth + 2));
    document.insert("name".to_string(), json!(category.attr_str("name")));
    document.insert("parent_id".to_string(), json!(parent_id));
    document.insert("path".to_string(), json!(path));
    document.insert("position".to_string(), json!(category.attr_i64("position")));
    document.insert(
        "product_count".to_string(),
        json!(category.relationship_refs("products").len()),
    );
    document.insert("url_key".to_string(), json!(category.attr_str("permalink")));

    Ok(Value::Object(document))
}

/// The recursive `children_count`/`children_data` pair, or `None` for a
/// leaf. Child references missing from the loaded set are skipped.
fn children_props(
    node: &JsonApiDocument,
    categories: &[JsonApiDocument],
) -> Option<(usize, Vec<Value>)> {
    let children: Vec<Value> = node
        .relationship_refs("children")
        .iter()
        .filter_map(|child_ref| {
            let child = categories.iter().find(|c| c.id == child_ref.id)?;
            let child_id: i64 = child_ref.id.parse().ok()?;
            let mut entry = Map::new();
            entry.insert("id".to_string(), json!(child_id));
            if let Some((count, data)) = children_props(child, categories) {
                entry.insert("children_count".to_string(), json!(count));
                entry.insert("children_data".to_string(), Value::Array(data));
            }
            Some(Value::Object(entry))
        })
        .collect();

    if children.is_empty() {
        None
    } else {
        Some((children.len(), children))
    }
}

/// Runs the full category sync: walk, convert, drain, reconcile.
///
/// # Errors
///
/// Any [`ImportError`] is fatal for the run.
pub async fn import_categories(
    spree: &SpreeClient,
    queue: &BulkWriteQueue,
    elastic: &ElasticClient,
    ctx: &SyncContext,
) -> Result<ImportStats, ImportError> {
    let categories = load_categories(spree, ctx).await?;
    tracing::info!(
        categories = categories.len(),
        "categories downloaded, converting to search documents"
    );

    let mut stats = ImportStats::default();
    for category in &categories {
        if ctx.older_than_watermark(category) {
            stats.cursor_updates += 1;
            queue
                .push_update(DocType::Category, ctx.cursor_patch(category))
                .await?;
        } else {
            match convert_category(category, &categories, &ctx.cursor) {
                Ok(document) => {
                    stats.replacements += 1;
                    queue.push_index(DocType::Category, document).await?;
                }
                Err(error) => {
                    tracing::error!(id = %category.id, %error, "category conversion failed");
                }
            }
        }
    }

    tracing::info!(
        cursor_updates = stats.cursor_updates,
        replacements = stats.replacements,
        "category writes queued"
    );

    stats.stale_deleted = drain_and_reconcile(queue, elastic, DocType::Category, ctx).await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn taxon(id: &str, depth: i64, parent: Option<&str>, children: &[&str]) -> JsonApiDocument {
        let parent_data = match parent {
            Some(pid) => json!({"id": pid, "type": "taxon"}),
            None => Value::Null,
        };
        let child_refs: Vec<_> = children
            .iter()
            .map(|cid| json!({"id": cid, "type": "taxon"}))
            .collect();
        serde_json::from_value(json!({
            "id": id,
            "type": "taxon",
            "attributes": {
                "name": format!("Taxon {id}"),
                "permalink": format!("taxon-{id}"),
                "depth": depth,
                "position": 1,
                "updated_at": "2021-01-01T00:00:00Z"
            },
            "relationships": {
                "parent": {"data": parent_data},
                "children": {"data": child_refs},
                "products": {"data": [{"id": "900", "type": "product"}]}
            }
        }))
        .unwrap()
    }

    fn tree() -> Vec<JsonApiDocument> {
        vec![
            taxon("1", 0, None, &["2", "3"]),
            taxon("2", 1, Some("1"), &["4"]),
            taxon("3", 1, Some("1"), &[]),
            taxon("4", 2, Some("2"), &[]),
        ]
    }

    #[test]
    fn path_walks_up_to_the_root() {
        let categories = tree();
        let path = categories_on_path(&categories, &["4"]);
        let ids: Vec<&str> = path.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
    }

    #[test]
    fn path_deduplicates_shared_ancestors() {
        let categories = tree();
        let path = categories_on_path(&categories, &["4", "3"]);
        let ids: Vec<&str> = path.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4", "3"]);
    }

    #[test]
    fn convert_root_category() {
        let categories = tree();
        let document = convert_category(&categories[0], &categories, "1000").unwrap();

        assert_eq!(document["id"], 1);
        assert_eq!(document["parent_id"], ROOT_PARENT_ID);
        assert_eq!(document["level"], 2);
        assert_eq!(document["path"], "1");
        assert_eq!(document["cursor"], "1000");
        assert_eq!(document["url_key"], "taxon-1");
        assert_eq!(document["product_count"], 1);
        assert_eq!(document["is_active"], true);

        assert_eq!(document["children_count"], 2);
        let children = document["children_data"].as_array().unwrap();
        assert_eq!(children[0]["id"], 2);
        assert_eq!(children[0]["children_count"], 1);
        assert_eq!(children[0]["children_data"][0]["id"], 4);
        assert_eq!(children[1]["id"], 3);
        assert!(children[1].get("children_count").is_none());
    }

    #[test]
    fn convert_leaf_category_has_no_children_fields() {
        let categories = tree();
        let document = convert_category(&categories[3], &categories, "1000").unwrap();

        assert_eq!(document["id"], 4);
        assert_eq!(document["parent_id"], 2);
        assert_eq!(document["level"], 4);
        assert_eq!(document["path"], "1/2/4");
        assert!(document.get("children_count").is_none());
        assert!(document.get("children_data").is_none());
    }
}

//! Product import.
//!
//! Each product page is mapped together with its side-loaded `included` set:
//! default variant, images, variants with option values, option types,
//! product properties, and (multi-currency) price records. A product becomes
//! one `product` document plus one `attribute` document per product property
//! and per option type. Attribute documents are always fully replaced and
//! never reconciled away; only products carry the cursor lifecycle.

use serde_json::{json, Map, Value};
use svb_elastic::{BulkWriteQueue, DocType, ElasticClient};
use svb_spree::{find_included, find_included_of_type, JsonApiDocument, SpreeClient};

use std::cell::RefCell;

use crate::category::{categories_on_path, load_categories};
use crate::error::{ImportError, MappingError};
use crate::price::PriceResolver;
use crate::sync::{drain_and_reconcile, ImportStats, SyncContext};
use crate::walker::walk_pages_with_drain;

/// Prefix for product-property attribute codes, kept distinct from option
/// attribute codes and standard fields to avoid naming collisions.
const CUSTOM_ATTRIBUTE_PREFIX: &str = "prodattr_";

/// Target image width when choosing among pre-rendered styles.
const IMAGE_TARGET_WIDTH: i64 = 800;

fn custom_attribute_code(id: &str) -> String {
    format!("{CUSTOM_ATTRIBUTE_PREFIX}{id}")
}

/// Option attribute codes are the option type id itself, unprefixed.
fn option_attribute_code(id: &str) -> String {
    id.to_string()
}

/// Prepends the configured images host to relative style URLs.
fn absolutize(url: &str, images_host: Option<&str>) -> String {
    match images_host {
        Some(host) if !url.starts_with("http") => {
            format!("{}/{}", host.trim_end_matches('/'), url.trim_start_matches('/'))
        }
        _ => url.to_string(),
    }
}

/// Picks the URL of the pre-rendered style closest to the target width,
/// preferring one at least as wide when available.
fn image_url(image: &JsonApiDocument, images_host: Option<&str>) -> Option<String> {
    let styles = image.attr("styles")?.as_array()?;

    let mut best: Option<(&Value, i64)> = None;
    for style in styles {
        let width = match style.get("width") {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(w) => w,
                None => continue,
            },
            Some(Value::String(s)) => match s.parse() {
                Ok(w) => w,
                Err(_) => continue,
            },
            _ => continue,
        };
        let diff = width - IMAGE_TARGET_WIDTH;
        best = match best {
            None => Some((style, diff)),
            Some((_, best_diff)) if best_diff < 0 && diff > 0 => Some((style, diff)),
            Some(current @ (_, best_diff)) if best_diff > 0 && diff < 0 => Some(current),
            Some(current @ (_, best_diff)) => {
                if diff.abs() < best_diff.abs() {
                    Some((style, diff))
                } else {
                    Some(current)
                }
            }
        };
    }

    best.and_then(|(style, _)| style.get("url"))
        .and_then(Value::as_str)
        .map(|url| absolutize(url, images_host))
}

/// Builds the `media_gallery` entries for a set of images.
fn media_gallery(images: &[&JsonApiDocument], images_host: Option<&str>) -> Vec<Value> {
    images
        .iter()
        .enumerate()
        .filter_map(|(position, image)| {
            image_url(image, images_host).map(|url| {
                json!({
                    "image": url,
                    "lab": Value::Null,
                    "pos": position,
                    "typ": "image"
                })
            })
        })
        .collect()
}

/// Finds the option type owning an option value.
fn option_type_of_value<'a>(
    option_types: &[&'a JsonApiDocument],
    option_value_id: &str,
) -> Option<&'a JsonApiDocument> {
    option_types
        .iter()
        .find(|option_type| {
            option_type
                .relationship_refs("option_values")
                .iter()
                .any(|value_ref| value_ref.id == option_value_id)
        })
        .copied()
}

fn stock_flags(variant: &JsonApiDocument) -> Value {
    let purchasable = variant.attr_bool("purchasable").unwrap_or(false);
    let in_stock = variant.attr_bool("in_stock").unwrap_or(false);
    let backorderable = variant.attr_bool("backorderable").unwrap_or(false);
    json!({"is_in_stock": purchasable && (in_stock || backorderable)})
}

fn sorted_by_position<'a>(records: &[&'a JsonApiDocument]) -> Vec<&'a JsonApiDocument> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|record| record.attr_i64("position").unwrap_or(i64::MAX));
    sorted
}

/// The documents produced from one product resource.
pub(crate) struct ProductDocuments {
    pub product: Value,
    pub attributes: Vec<Value>,
}

#[allow(clippy::too_many_lines)]
pub(crate) fn convert_product(
    product: &JsonApiDocument,
    included: &[JsonApiDocument],
    categories: &[JsonApiDocument],
    resolver: &PriceResolver,
    images_host: Option<&str>,
    cursor: &str,
) -> Result<ProductDocuments, MappingError> {
    let id = product
        .numeric_id()
        .ok_or_else(|| MappingError::missing_attribute(product, "id"))?;
    let default_variant_ref = product
        .relationship_ref("default_variant")
        .ok_or_else(|| MappingError::missing_relationship(product, "default_variant"))?;
    let default_variant = find_included(included, &default_variant_ref.kind, &default_variant_ref.id)
        .ok_or(MappingError::MissingIncluded {
            kind: default_variant_ref.kind,
            id: default_variant_ref.id,
        })?;

    let images = find_included_of_type(included, product, "images");
    let gallery = media_gallery(&images, images_host);
    let has_options = !product.relationship_refs("option_types").is_empty();
    let properties = find_included_of_type(included, product, "product_properties");
    let spree_variants = find_included_of_type(included, product, "variants");
    let option_types = find_included_of_type(included, product, "option_types");

    // Variants, each with its option selections and per-variant gallery.
    let mut variants: Vec<Map<String, Value>> = Vec::new();
    for spree_variant in &spree_variants {
        let variant_images = find_included_of_type(included, spree_variant, "images");
        let variant_price = resolver.variant_price(spree_variant, included)?;

        let mut variant = Map::new();
        variant.insert("final_price".to_string(), json!(variant_price));
        variant.insert(
            "image".to_string(),
            json!(variant_images
                .first()
                .and_then(|image| image_url(image, images_host))
                .unwrap_or_default()),
        );
        variant.insert("priceInclTax".to_string(), json!(variant_price));
        variant.insert("regular_price".to_string(), json!(variant_price));
        variant.insert("sku".to_string(), json!(spree_variant.attr_str("sku")));
        variant.insert("status".to_string(), json!(1));
        variant.insert("stock".to_string(), stock_flags(spree_variant));

        for value_ref in spree_variant.relationship_refs("option_values") {
            if let Some(option_type) = option_type_of_value(&option_types, &value_ref.id) {
                variant.insert(option_attribute_code(&option_type.id), json!(value_ref.id));
            }
        }

        // image1, image2, ... for the remaining gallery entries; the first
        // image is already the variant's `image`.
        for (index, entry) in media_gallery(&variant_images, images_host)
            .iter()
            .enumerate()
            .skip(1)
        {
            variant.insert(format!("image{index}"), entry["image"].clone());
        }

        variants.push(variant);
    }

    let configurable_options: Vec<Value> = sorted_by_position(&option_types)
        .iter()
        .map(|option_type| {
            let values: Vec<&JsonApiDocument> = option_type
                .relationship_refs("option_values")
                .iter()
                // Option values unused by this product are not side-loaded;
                // leave them out of the document.
                .filter_map(|value_ref| find_included(included, "option_value", &value_ref.id))
                .collect();
            json!({
                "attribute_code": option_attribute_code(&option_type.id),
                "attribute_name": option_type.attr_str("name"),
                "label": option_type.attr_str("presentation"),
                "values": sorted_by_position(&values)
                    .iter()
                    .map(|value| json!({
                        "label": value.attr_str("presentation"),
                        "value_index": value.id
                    }))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    // Per option type, the distinct option values selected across variants,
    // keyed by the option type's name.
    let mut filters = Map::new();
    for option in &configurable_options {
        let Some(code) = option["attribute_code"].as_str() else {
            continue;
        };
        let mut seen: Vec<Value> = Vec::new();
        for variant in &variants {
            if let Some(value) = variant.get(code) {
                if !seen.contains(value) {
                    seen.push(value.clone());
                }
            }
        }
        if let Some(name) = option["attribute_name"].as_str() {
            filters.insert(name.to_string(), Value::Array(seen));
        }
    }

    let price = resolver.variant_price(default_variant, included)?;
    let taxon_refs = product.relationship_refs("taxons");
    let taxon_ids: Vec<&str> = taxon_refs.iter().map(|r| r.id.as_str()).collect();
    let product_categories = categories_on_path(categories, &taxon_ids);

    let main_image = images
        .first()
        .and_then(|image| image_url(image, images_host))
        .unwrap_or_default();

    let mut document = Map::new();
    document.insert(
        "category".to_string(),
        json!(product_categories
            .iter()
            .map(|category| json!({
                "category_id": category.numeric_id(),
                "name": category.attr_str("name")
            }))
            .collect::<Vec<_>>()),
    );
    for (name, values) in filters {
        document.insert(name, values);
    }
    document.insert(
        "category_ids".to_string(),
        json!(product_categories
            .iter()
            .filter_map(|category| category.numeric_id())
            .collect::<Vec<_>>()),
    );
    document.insert(
        "configurable_children".to_string(),
        Value::Array(variants.iter().cloned().map(Value::Object).collect()),
    );
    document.insert(
        "configurable_options".to_string(),
        json!(configurable_options),
    );
    // Spree does not expose a created date; available_on stands in.
    document.insert(
        "created_at".to_string(),
        json!(product.attr_str("available_on")),
    );
    document.insert("cursor".to_string(), json!(cursor));
    document.insert(
        "description".to_string(),
        json!(default_variant.attr_str("description")),
    );
    document.insert("final_price".to_string(), json!(price));
    document.insert("has_options".to_string(), json!(has_options));
    document.insert("id".to_string(), json!(id));
    document.insert("image".to_string(), json!(main_image));
    document.insert(
        "media_gallery".to_string(),
        if images.is_empty() {
            Value::Null
        } else {
            Value::Array(gallery)
        },
    );
    document.insert("name".to_string(), json!(default_variant.attr_str("name")));
    document.insert("news_from_date".to_string(), Value::Null);
    document.insert("news_to_date".to_string(), Value::Null);
    document.insert("price".to_string(), json!(price));
    document.insert("priceInclTax".to_string(), json!(price));
    document.insert("regular_price".to_string(), json!(price));
    document.insert("sku".to_string(), json!(default_variant.attr_str("sku")));
    document.insert("special_from_date".to_string(), Value::Null);
    document.insert("special_price".to_string(), Value::Null);
    document.insert("special_to_date".to_string(), Value::Null);
    document.insert("status".to_string(), json!(1));
    document.insert("stock".to_string(), stock_flags(default_variant));
    document.insert("tax_class_id".to_string(), json!(2));
    document.insert("thumbnail".to_string(), json!(main_image));
    document.insert(
        "type_id".to_string(),
        json!(if variants.is_empty() {
            "simple"
        } else {
            "configurable"
        }),
    );
    document.insert(
        "updated_at".to_string(),
        json!(product.attr_str("updated_at")),
    );
    document.insert("visibility".to_string(), json!(4));
    document.insert(
        "weight".to_string(),
        json!(default_variant.attr_f64("weight")),
    );
    for property in &properties {
        document.insert(
            custom_attribute_code(&property.id),
            property.attr("value").cloned().unwrap_or(Value::Null),
        );
    }

    // Attribute documents: one per product property and one per option type.
    let mut attributes: Vec<Value> = properties
        .iter()
        .map(|property| {
            let code = custom_attribute_code(&property.id);
            json!({
                "attribute_code": code,
                "attribute_id": code,
                "default_frontend_label": property.attr_str("name"),
                "id": property.numeric_id(),
                "is_user_defined": true,
                "is_visible": true,
                "is_visible_on_front": true
            })
        })
        .collect();
    for option in &configurable_options {
        let code = option["attribute_code"].as_str().unwrap_or_default();
        attributes.push(json!({
            "id": code.parse::<i64>().ok(),
            "is_user_defined": true,
            "is_visible": true,
            "attribute_code": option["attribute_name"],
            "options": option["values"]
                .as_array()
                .map(|values| values
                    .iter()
                    .map(|value| json!({
                        "label": value["label"],
                        "value": value["value_index"]
                    }))
                    .collect::<Vec<_>>())
                .unwrap_or_default()
        }));
    }

    Ok(ProductDocuments {
        product: Value::Object(document),
        attributes,
    })
}

/// One buffered write for the current page: mapping happens in the sync
/// walker callback, queue pushes happen in the page drain.
enum QueuedWrite {
    CursorPatch(Value),
    Replace(ProductDocuments),
}

/// Runs the full product sync: walk, convert, drain, reconcile.
///
/// At most one page of converted documents is held back at a time; each
/// page's writes are handed to the queue before the next page is fetched,
/// so full batches leave for the index while the walk is still running.
///
/// # Errors
///
/// Any [`ImportError`] is fatal for the run.
pub async fn import_products(
    spree: &SpreeClient,
    queue: &BulkWriteQueue,
    elastic: &ElasticClient,
    resolver: &PriceResolver,
    ctx: &SyncContext,
) -> Result<ImportStats, ImportError> {
    let categories = load_categories(spree, ctx).await?;
    tracing::info!(categories = categories.len(), "categories fetched, importing products");

    let includes = resolver.product_includes();
    let pending: RefCell<Vec<QueuedWrite>> = RefCell::new(Vec::new());
    let mut stats = ImportStats::default();

    walk_pages_with_drain(
        |page, per_page| spree.list_products(page, per_page, &includes),
        |product, included| {
            if ctx.older_than_watermark(product) {
                stats.cursor_updates += 1;
                pending
                    .borrow_mut()
                    .push(QueuedWrite::CursorPatch(ctx.cursor_patch(product)));
            } else {
                let documents = convert_product(
                    product,
                    included,
                    &categories,
                    resolver,
                    ctx.images_host.as_deref(),
                    &ctx.cursor,
                )?;
                stats.replacements += 1;
                pending.borrow_mut().push(QueuedWrite::Replace(documents));
            }
            Ok(())
        },
        || {
            let writes: Vec<QueuedWrite> = pending.borrow_mut().drain(..).collect();
            async move {
                for write in writes {
                    match write {
                        QueuedWrite::CursorPatch(patch) => {
                            queue.push_update(DocType::Product, patch).await?;
                        }
                        QueuedWrite::Replace(documents) => {
                            queue.push_index(DocType::Product, documents.product).await?;
                            for attribute in documents.attributes {
                                queue.push_index(DocType::Attribute, attribute).await?;
                            }
                        }
                    }
                }
                Ok(())
            }
        },
        ctx.per_page,
        ctx.max_pages,
    )
    .await?;

    tracing::info!(
        cursor_updates = stats.cursor_updates,
        replacements = stats.replacements,
        "product writes queued"
    );

    stats.stale_deleted = drain_and_reconcile(queue, elastic, DocType::Product, ctx).await?;
    Ok(stats)
}

#[cfg(test)]
#[path = "product_test.rs"]
mod tests;

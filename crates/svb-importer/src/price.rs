//! Price extension point for the product importer.
//!
//! A single-currency store exposes the price directly on each variant. With
//! the multi-currency extension installed the variant price lives in a
//! side-loaded `prices` relationship instead, one entry per currency, and the
//! product listing must include those records.

use svb_spree::{find_included, JsonApiDocument};

use crate::error::MappingError;

const BASE_PRODUCT_INCLUDES: &str = "default_variant,images,option_types,product_properties,\
                                     variants,variants.option_values,taxons";

#[derive(Debug, Clone)]
pub enum PriceResolver {
    SingleCurrency,
    MultiCurrency { currency: String },
}

impl PriceResolver {
    /// The `include` set for product listing pages. Multi-currency adds the
    /// side-loaded price records.
    #[must_use]
    pub fn product_includes(&self) -> String {
        match self {
            PriceResolver::SingleCurrency => BASE_PRODUCT_INCLUDES.to_string(),
            PriceResolver::MultiCurrency { .. } => {
                format!("{BASE_PRODUCT_INCLUDES},default_variant.prices,variants.prices")
            }
        }
    }

    /// Resolves the price of one variant (the default variant included).
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] when the variant carries no usable price
    /// for the resolver's currency.
    pub fn variant_price(
        &self,
        variant: &JsonApiDocument,
        included: &[JsonApiDocument],
    ) -> Result<f64, MappingError> {
        match self {
            PriceResolver::SingleCurrency => variant
                .attr_f64("price")
                .ok_or_else(|| MappingError::missing_attribute(variant, "price")),
            PriceResolver::MultiCurrency { currency } => variant
                .relationship_refs("prices")
                .iter()
                .filter_map(|price_ref| find_included(included, &price_ref.kind, &price_ref.id))
                .find(|price| price.attr_str("currency") == Some(currency))
                .and_then(|price| price.attr_f64("amount"))
                .ok_or_else(|| MappingError::missing_relationship(variant, "prices")),
        }
    }
}

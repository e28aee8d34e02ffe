use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One store entry from `config/stores.yaml`.
///
/// Each store writes to its own search index and (for multi-currency
/// deployments) shops Spree in its own currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub identifier: String,
    pub elastic_index: String,
    pub spree_currency: Option<String>,
}

/// The parsed stores file: an optional default store identifier plus the
/// store list. An empty list means single-store mode — the generic
/// `ES_INDEX` applies and no currency switching happens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoresFile {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
}

impl StoresFile {
    #[must_use]
    pub fn is_multi_store(&self) -> bool {
        !self.stores.is_empty()
    }

    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<&StoreConfig> {
        self.stores.iter().find(|s| s.identifier == identifier)
    }

    /// The configured default store, if multi-store mode is active.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` when stores exist but no default
    /// identifier is configured. `load_stores` already guarantees a
    /// configured default resolves to a real store.
    pub fn default_store(&self) -> Result<Option<&StoreConfig>, ConfigError> {
        if !self.is_multi_store() {
            return Ok(None);
        }
        let identifier = self.default.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "a default store identifier is required when using multi store".to_string(),
            )
        })?;
        Ok(self.find(identifier))
    }
}

/// Load and validate the stores configuration from a YAML file.
///
/// A missing file is not an error — it yields the empty (single-store)
/// configuration, matching deployments that never set up multi store.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read, parsed, or
/// fails validation.
pub fn load_stores(path: &Path) -> Result<StoresFile, ConfigError> {
    if !path.exists() {
        return Ok(StoresFile::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::StoresFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let stores_file: StoresFile = serde_yaml::from_str(&content)?;

    validate_stores(&stores_file)?;

    Ok(stores_file)
}

fn validate_stores(stores_file: &StoresFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for store in &stores_file.stores {
        if store.identifier.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store identifier must be non-empty".to_string(),
            ));
        }

        if store.elastic_index.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "store '{}' has an empty elastic_index",
                store.identifier
            )));
        }

        if !seen.insert(store.identifier.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate store identifier: '{}'",
                store.identifier
            )));
        }
    }

    if let Some(default) = &stores_file.default {
        if !stores_file.stores.is_empty() && stores_file.find(default).is_none() {
            return Err(ConfigError::Validation(format!(
                "default store '{default}' is not present in the store list"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(identifier: &str, index: &str, currency: Option<&str>) -> StoreConfig {
        StoreConfig {
            identifier: identifier.to_string(),
            elastic_index: index.to_string(),
            spree_currency: currency.map(str::to_string),
        }
    }

    #[test]
    fn empty_file_is_single_store() {
        let file = StoresFile::default();
        assert!(!file.is_multi_store());
        assert!(file.default_store().unwrap().is_none());
    }

    #[test]
    fn find_matches_by_identifier() {
        let file = StoresFile {
            default: Some("eu".to_string()),
            stores: vec![
                store("eu", "catalog_eu", Some("EUR")),
                store("us", "catalog_us", Some("USD")),
            ],
        };
        assert_eq!(file.find("us").unwrap().elastic_index, "catalog_us");
        assert!(file.find("uk").is_none());
    }

    #[test]
    fn default_store_requires_identifier_in_multi_store_mode() {
        let file = StoresFile {
            default: None,
            stores: vec![store("eu", "catalog_eu", None)],
        };
        let err = file.default_store().unwrap_err();
        assert!(err.to_string().contains("default store identifier"));
    }

    #[test]
    fn validate_rejects_empty_identifier() {
        let file = StoresFile {
            default: None,
            stores: vec![store("  ", "catalog", None)],
        };
        let err = validate_stores(&file).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn validate_rejects_empty_index() {
        let file = StoresFile {
            default: None,
            stores: vec![store("eu", "", None)],
        };
        let err = validate_stores(&file).unwrap_err();
        assert!(err.to_string().contains("empty elastic_index"));
    }

    #[test]
    fn validate_rejects_duplicate_identifier() {
        let file = StoresFile {
            default: None,
            stores: vec![
                store("eu", "catalog_eu", None),
                store("EU", "catalog_eu2", None),
            ],
        };
        let err = validate_stores(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate store identifier"));
    }

    #[test]
    fn validate_rejects_unknown_default() {
        let file = StoresFile {
            default: Some("uk".to_string()),
            stores: vec![store("eu", "catalog_eu", None)],
        };
        let err = validate_stores(&file).unwrap_err();
        assert!(err.to_string().contains("not present"));
    }

    #[test]
    fn parses_yaml_document() {
        let yaml = r"
default: eu
stores:
  - identifier: eu
    elastic_index: catalog_eu
    spree_currency: EUR
  - identifier: us
    elastic_index: catalog_us
    spree_currency: USD
";
        let file: StoresFile = serde_yaml::from_str(yaml).unwrap();
        assert!(validate_stores(&file).is_ok());
        assert_eq!(file.stores.len(), 2);
        assert_eq!(
            file.default_store().unwrap().unwrap().spree_currency,
            Some("EUR".to_string())
        );
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let file = load_stores(Path::new("/definitely/not/here/stores.yaml")).unwrap();
        assert!(!file.is_multi_store());
    }
}

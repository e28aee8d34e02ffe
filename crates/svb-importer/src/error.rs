use svb_elastic::{BulkItemFailure, DocType, ElasticError};
use svb_spree::SpreeError;
use thiserror::Error;

/// A fatal sync-run error. Any of these maps to a non-zero process exit.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("page fetch failed: {0}")]
    PageFetch(#[from] SpreeError),

    #[error(transparent)]
    Elastic(#[from] ElasticError),

    #[error("importing {doc_type} documents left {} rejected bulk operations", failures.len())]
    BulkWrite {
        doc_type: DocType,
        failures: Vec<BulkItemFailure>,
    },

    #[error("removing stale {doc_type} documents reported {} failures", failures.len())]
    StaleDelete {
        doc_type: DocType,
        failures: Vec<serde_json::Value>,
    },
}

/// A per-resource conversion error. Mapping errors are isolated: the walk
/// logs them and continues with the next resource.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("{kind} {id} is missing attribute \"{attribute}\"")]
    MissingAttribute {
        kind: String,
        id: String,
        attribute: &'static str,
    },

    #[error("{kind} {id} is missing relationship \"{relationship}\"")]
    MissingRelationship {
        kind: String,
        id: String,
        relationship: &'static str,
    },

    #[error("included resource {kind} {id} not found in page")]
    MissingIncluded { kind: String, id: String },
}

impl MappingError {
    pub(crate) fn missing_attribute(
        resource: &svb_spree::JsonApiDocument,
        attribute: &'static str,
    ) -> Self {
        MappingError::MissingAttribute {
            kind: resource.kind.clone(),
            id: resource.id.clone(),
            attribute,
        }
    }

    pub(crate) fn missing_relationship(
        resource: &svb_spree::JsonApiDocument,
        relationship: &'static str,
    ) -> Self {
        MappingError::MissingRelationship {
            kind: resource.kind.clone(),
            id: resource.id.clone(),
            relationship,
        }
    }
}

pub mod client;
pub mod error;
pub mod operation;
pub mod queue;

pub use client::{DeleteStaleOutcome, ElasticClient};
pub use error::ElasticError;
pub use operation::{BulkItemFailure, BulkOperation, DocType, OpKind};
pub use queue::{BulkWriteQueue, FlushReport};

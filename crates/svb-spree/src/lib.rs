pub mod client;
pub mod error;
pub mod included;
pub mod retry;
pub mod types;

pub use client::SpreeClient;
pub use error::SpreeError;
pub use included::{find_included, find_included_of_type};
pub use types::{JsonApiDocument, JsonApiPage, JsonApiSingle, PageMeta, ResourceRef};

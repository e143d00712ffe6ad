//! Adapters for the external collaborators the worker depends on: the blob
//! store, the parser service, and the embedding service, protected by
//! shared circuit breaking and rate limiting.

pub mod blob_store;
pub mod embedding;
pub mod error;
pub mod mock;
pub mod parser;

pub use blob_store::{BlobStore, LocalFsBlobStore};
pub use embedding::{EmbeddingClient, HttpEmbeddingClient, Vector};
pub use error::{ClientError, ClientResult};
pub use mock::{MockBlobStore, MockEmbeddingClient, MockParserClient};
pub use parser::{HttpParserClient, ParseStatus, ParserClient, sign_webhook};

//! Blob store gateway implementations

pub mod http;
pub mod memory;
pub mod signer;

pub use http::HttpBlobGateway;
pub use memory::MemoryBlobGateway;
pub use signer::UrlSigner;

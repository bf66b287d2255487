//! Port traits (interfaces) for dependency injection

pub mod blob;
pub mod membership;

pub use blob::{BlobGateway, BlobOperation, PresignedUrl};
pub use membership::MembershipPort;

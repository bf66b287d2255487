//! Business logic services

pub mod auth;
pub mod committer;
pub mod manifest;
pub mod membership;
pub mod planner;

pub use auth::AuthService;
pub use committer::ConfirmCommitter;
pub use manifest::ManifestReader;
pub use membership::StoreMembership;
pub use planner::SyncPlanner;

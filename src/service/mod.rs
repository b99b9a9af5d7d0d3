//! Credential lifecycle: username generation, connection guarding and the
//! create / update / delete operations.

pub mod connection_guard;
pub mod context;
pub mod lifecycle;
pub mod username;

pub use context::RequestContext;
pub use lifecycle::{Hana, RevocationStage, TYPE_NAME};

//! Core traits for the GynDNS service
//!
//! - [`KeyValueStore`]: backend collaborator of the record store
//! - [`Frontend`]: a listener run by the supervisor

pub mod frontend;
pub mod kv_store;

pub use frontend::Frontend;
pub use kv_store::KeyValueStore;

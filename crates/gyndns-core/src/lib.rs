// # gyndns-core
//
// Core library for the GynDNS dynamic DNS service.
//
// ## Architecture Overview
//
// Clients publish their current address over HTTP; a DNS front-end answers
// A and MX queries from the most recently published address. The two
// front-ends share nothing but the record store.
//
// - **access**: registered users and their hostname patterns
// - **store**: hostname → address records on a `KeyValueStore` backend
// - **update**: authenticated update endpoint (`UpdateService` + HTTP binding)
// - **dns**: query responder (`DnsResponder` + UDP listener)
// - **supervisor**: runs both listeners, shuts them down together
//
// ## Design Principles
//
// 1. **Immutable users**: the user table is built once and shared read-only
// 2. **One key scheme**: both front-ends go through `RecordStore`
// 3. **Library-First**: the daemon only wires configuration to these types
// 4. **Fail together**: a fatal listener error stops the whole service

pub mod access;
pub mod config;
pub mod dns;
pub mod error;
pub mod store;
pub mod supervisor;
pub mod traits;
pub mod update;

// Re-export core types for convenience
pub use access::{AuthError, HostnamePattern, User, UserTable};
pub use config::{ListenConfig, ServiceConfig, StoreConfig, UserConfig};
pub use dns::DnsResponder;
pub use dns::udp::DnsFrontend;
pub use error::{Error, Result};
pub use store::{FileKvStore, MemoryKvStore, RecordStore, RedisKvStore};
pub use supervisor::Supervisor;
pub use traits::{Frontend, KeyValueStore};
pub use update::http::HttpFrontend;
pub use update::{Credentials, PublishedRecord, UpdateRequest, UpdateService};

//! Test doubles and common utilities for contract tests
//!
//! Each contract test file pulls in only part of this module.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::extract::connect_info::MockConnectInfo;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gyndns_core::error::{Error, Result};
use gyndns_core::traits::{Frontend, KeyValueStore};
use gyndns_core::{MemoryKvStore, RecordStore, UpdateService, User, UserTable};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Peer address the mocked HTTP connection reports
pub const PEER: &str = "192.0.2.50:40000";

/// Users shared by the contract tests
///
/// - alice / s3cret: `home.example.com`, `*.lab.example.com`
/// - bob / hunter2: `bob.example.org`
pub fn test_users() -> Arc<UserTable> {
    Arc::new(
        UserTable::new([
            User::new("alice", "s3cret", ["home.example.com", "*.lab.example.com"]),
            User::new("bob", "hunter2", ["bob.example.org"]),
        ])
        .expect("fixture users are unique"),
    )
}

/// Record store over a fresh in-memory backend
pub fn memory_store() -> RecordStore {
    RecordStore::new(Arc::new(MemoryKvStore::new()))
}

/// Update router with a fixed peer address, as the daemon would serve it
pub fn update_app(store: RecordStore) -> Router {
    update_app_with_peer(store, SocketAddr::from_str(PEER).unwrap())
}

/// Update router whose connections appear to come from `peer`
pub fn update_app_with_peer(store: RecordStore, peer: SocketAddr) -> Router {
    let service = UpdateService::new(test_users(), store);
    gyndns_core::update::http::router(service).layer(MockConnectInfo(peer))
}

/// `Authorization` header value for Basic credentials
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// A standard query with one question
pub fn dns_query(id: u16, name: &str, record_type: RecordType) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    msg.add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    msg
}

/// A backend that fails every operation
#[derive(Default)]
pub struct FailingKvStore {
    calls: AtomicUsize,
}

impl FailingKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations attempted
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for FailingKvStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::store("connection refused"))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::store("connection refused"))
    }

    async fn flush(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::store("connection refused"))
    }
}

/// An in-memory backend that counts flushes
#[derive(Default)]
pub struct CountingKvStore {
    inner: MemoryKvStore,
    flushes: AtomicUsize,
}

impl CountingKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value).await
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What a [`ScriptedFrontend`] does once started
#[derive(Debug, Clone)]
pub enum Script {
    /// Serve until cancelled
    ServeUntilCancelled,
    /// Serve until cancelled, then take this long to drain
    DrainFor(Duration),
    /// Fail with a fatal error after a delay
    FailAfter(Duration),
}

/// Observable lifecycle of a [`ScriptedFrontend`]
#[derive(Debug, Default)]
pub struct Lifecycle {
    pub started: AtomicBool,
    pub cancelled: AtomicBool,
    pub drained: AtomicBool,
}

/// A frontend that follows a script instead of serving a socket
pub struct ScriptedFrontend {
    name: &'static str,
    script: Script,
    lifecycle: Arc<Lifecycle>,
}

impl ScriptedFrontend {
    pub fn new(name: &'static str, script: Script) -> (Self, Arc<Lifecycle>) {
        let lifecycle = Arc::new(Lifecycle::default());
        (
            Self {
                name,
                script,
                lifecycle: lifecycle.clone(),
            },
            lifecycle,
        )
    }
}

#[async_trait]
impl Frontend for ScriptedFrontend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn serve(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        self.lifecycle.started.store(true, Ordering::SeqCst);

        match self.script.clone() {
            Script::ServeUntilCancelled => {
                shutdown.cancelled().await;
                self.lifecycle.cancelled.store(true, Ordering::SeqCst);
            }
            Script::DrainFor(delay) => {
                shutdown.cancelled().await;
                self.lifecycle.cancelled.store(true, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
            }
            Script::FailAfter(delay) => {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        self.lifecycle.cancelled.store(true, Ordering::SeqCst);
                    }
                    _ = tokio::time::sleep(delay) => {
                        return Err(Error::fatal(self.name, "address already in use"));
                    }
                }
            }
        }

        self.lifecycle.drained.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// # Redis Key-Value Store
//
// Records live in an external Redis server as plain string values, under the
// same `hostname/<fqdn>` keys the record store uses everywhere. Any other
// process talking to the same server sees every published address.
//
// ## Connection Handling
//
// A single `ConnectionManager` is shared by all requests and reconnects on
// its own after the server goes away. The initial connection is made when
// the store is opened, so an unreachable server fails startup.
//
// ## Crash Behavior
//
// Durability is whatever the server is configured for; `flush` has nothing
// to write back.

use std::fmt;

use ::redis::aio::ConnectionManager;
use ::redis::{Client, Cmd, RedisError};
use async_trait::async_trait;
use tracing::info;

use crate::Error;
use crate::traits::KeyValueStore;

/// Key-value store backed by a Redis server
#[derive(Clone)]
pub struct RedisKvStore {
    connection: ConnectionManager,
}

impl RedisKvStore {
    /// Connect to the server at `url` (`redis://host:port/db`)
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = Client::open(url).map_err(|e| store_error("connect", None, e))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| store_error("connect", None, e))?;

        info!("Connected to Redis record store");
        Ok(Self { connection })
    }
}

impl fmt::Debug for RedisKvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisKvStore").finish_non_exhaustive()
    }
}

fn get_command(key: &str) -> Cmd {
    let mut cmd = ::redis::cmd("GET");
    cmd.arg(key);
    cmd
}

fn set_command(key: &str, value: &str) -> Cmd {
    let mut cmd = ::redis::cmd("SET");
    cmd.arg(key).arg(value);
    cmd
}

fn store_error(op: &str, key: Option<&str>, err: RedisError) -> Error {
    match key {
        Some(key) => Error::store(format!("Redis {} {} failed: {}", op, key, err)),
        None => Error::store(format!("Redis {} failed: {}", op, err)),
    }
}

#[async_trait]
impl KeyValueStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut connection = self.connection.clone();
        get_command(key)
            .query_async::<Option<String>>(&mut connection)
            .await
            .map_err(|e| store_error("GET", Some(key), e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut connection = self.connection.clone();
        set_command(key, value)
            .query_async::<()>(&mut connection)
            .await
            .map_err(|e| store_error("SET", Some(key), e))
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

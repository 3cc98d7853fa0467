//! Remote store client.

use crate::client::{ParamMap, ProcedureCall, SlotState, StoreClient};
use crate::engine::{LastError, RecordMap};
use crate::error::{ErrorCode, StoreError, StoreResult};
use crate::loopback::{self, Endpoint, RemoteServer};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Options for connecting to a remote store.
#[derive(Debug, Clone, Default)]
pub struct RemoteOptions {
    /// Connection timeout; `None` uses the client default (no timeout).
    pub timeout: Option<Duration>,
}

impl RemoteOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds options from a timeout in seconds, negative meaning default.
    #[must_use]
    pub fn from_secs(timeout_secs: f64) -> Self {
        let timeout = (timeout_secs.is_finite() && timeout_secs >= 0.0)
            .then(|| Duration::from_secs_f64(timeout_secs));
        Self { timeout }
    }
}

/// A connection to a remote store.
///
/// The connection is synchronous: every call blocks until the server
/// answers. Closing drops the connection; later calls fail with `Invalid`.
#[derive(Debug)]
pub struct RemoteStore {
    endpoint: Endpoint,
    options: RemoteOptions,
    server: RwLock<Option<Arc<RemoteServer>>>,
    last_error: LastError,
}

impl RemoteStore {
    /// Connects to `endpoint`.
    pub fn connect(endpoint: &Endpoint, options: RemoteOptions) -> StoreResult<Self> {
        let server = loopback::connect(endpoint)?;
        info!(%endpoint, timeout = ?options.timeout, "connected to remote store");
        Ok(Self {
            endpoint: endpoint.clone(),
            options,
            server: RwLock::new(Some(server)),
            last_error: LastError::default(),
        })
    }

    /// Returns the endpoint this client is connected to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the configured timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.options.timeout
    }

    fn server(&self) -> StoreResult<Arc<RemoteServer>> {
        let server = self.server.read().clone().ok_or_else(StoreError::closed)?;
        if !server.is_running() {
            return Err(StoreError::new(
                ErrorCode::Network,
                format!("connection to {} was lost", self.endpoint),
            ));
        }
        Ok(server)
    }

    fn read<T>(&self, f: impl FnOnce(&RecordMap) -> StoreResult<T>) -> StoreResult<T> {
        let server = self.server()?;
        let records = server.records().read();
        f(&records)
    }

    fn write<T>(&self, f: impl FnOnce(&mut RecordMap) -> StoreResult<T>) -> StoreResult<T> {
        let server = self.server()?;
        let mut records = server.records().write();
        f(&mut records)
    }
}

impl StoreClient for RemoteStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let value = self.last_error.track(self.read(|r| Ok(r.get(key).cloned())))?;
        if value.is_none() {
            self.last_error.set(ErrorCode::NoRecord);
        }
        Ok(value)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| {
            r.set(key, value);
            Ok(())
        }))
    }

    fn add(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| r.add(key, value)))
    }

    fn replace(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| r.replace(key, value)))
    }

    fn append(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| {
            r.append(key, value);
            Ok(())
        }))
    }

    fn remove(&self, key: &[u8]) -> StoreResult<()> {
        self.last_error.track(self.write(|r| r.remove(key)))
    }

    fn increment(&self, key: &[u8], delta: i64, initial: i64) -> StoreResult<i64> {
        self.last_error.track(self.write(|r| r.increment(key, delta, initial)))
    }

    fn count(&self) -> StoreResult<i64> {
        self.last_error.track(self.read(|r| Ok(r.len() as i64)))
    }

    fn clear(&self) -> StoreResult<()> {
        self.last_error.track(self.write(|r| {
            r.clear();
            Ok(())
        }))
    }

    fn close(&self) -> StoreResult<()> {
        let result = match self.server.write().take() {
            Some(_) => {
                info!(endpoint = %self.endpoint, "closed remote store");
                Ok(())
            }
            None => Err(StoreError::closed()),
        };
        self.last_error.track(result)
    }

    fn last_error(&self) -> ErrorCode {
        self.last_error.get()
    }

    fn record_error(&self, code: ErrorCode) {
        self.last_error.set(code);
    }

    fn match_prefix_into(&self, prefix: &[u8], slots: &mut [Vec<u8>]) -> StoreResult<usize> {
        self.last_error
            .track(self.read(|r| Ok(r.match_prefix_into(prefix, slots))))
    }

    fn get_bulk_into(
        &self,
        keys: &[&[u8]],
        slots: &mut [Vec<u8>],
        states: &mut [SlotState],
    ) -> StoreResult<usize> {
        self.last_error
            .track(self.read(|r| r.get_bulk_into(keys, slots, states)))
    }

    fn set_bulk(&self, pairs: &[(&[u8], &[u8])]) -> StoreResult<usize> {
        self.last_error.track(self.write(|r| Ok(r.set_bulk(pairs))))
    }

    fn remove_bulk(&self, keys: &[&[u8]]) -> StoreResult<usize> {
        self.last_error.track(self.write(|r| Ok(r.remove_bulk(keys))))
    }
}

impl ProcedureCall for RemoteStore {
    fn play_script_into(
        &self,
        name: &str,
        params: &ParamMap,
        slots: &mut [Vec<u8>],
    ) -> StoreResult<usize> {
        let result = self.server().and_then(|server| {
            let output = server.call(name, params)?;
            let needed = output.len() * 2;
            if needed > slots.len() {
                return Err(StoreError::new(
                    ErrorCode::Overflow,
                    format!(
                        "procedure {name:?} returned {} pairs, capacity is {} slots",
                        output.len(),
                        slots.len()
                    ),
                ));
            }
            for (pair, (key, value)) in slots.chunks_exact_mut(2).zip(output) {
                pair[0] = key;
                pair[1] = value;
            }
            debug!(procedure = name, pairs = needed / 2, "played script");
            Ok(needed)
        });
        self.last_error.track(result)
    }
}

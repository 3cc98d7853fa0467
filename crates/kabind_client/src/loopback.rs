//! In-process endpoint registry standing in for the network transport.
//!
//! A [`RemoteServer`] is bound to an [`Endpoint`] with [`serve`]; a
//! [`crate::RemoteStore`] connecting to that endpoint talks to it directly.
//! Connecting to an endpoint nobody serves fails with `Network`, just as a
//! refused TCP connection would.

use crate::client::ParamMap;
use crate::engine::RecordMap;
use crate::error::{ErrorCode, StoreError, StoreResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::info;

/// Address of a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::new(ErrorCode::Invalid, format!("invalid endpoint {s:?}"));
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

/// A server-side procedure: reads its parameters, may touch the records,
/// and returns a name to value mapping.
pub type Procedure = Arc<dyn Fn(&mut RecordMap, &ParamMap) -> StoreResult<ParamMap> + Send + Sync>;

/// The server half of a remote store.
pub struct RemoteServer {
    records: RwLock<RecordMap>,
    procedures: RwLock<HashMap<String, Procedure>>,
    running: AtomicBool,
}

impl fmt::Debug for RemoteServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteServer")
            .field("records", &self.records.read().len())
            .field("procedures", &self.procedures.read().len())
            .field("running", &self.running.load(Ordering::Acquire))
            .finish()
    }
}

impl Default for RemoteServer {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteServer {
    /// Creates a server with the built-in procedures `echo`, `count` and `fetch`.
    pub fn new() -> Self {
        let server = Self {
            records: RwLock::new(RecordMap::new()),
            procedures: RwLock::new(HashMap::new()),
            running: AtomicBool::new(true),
        };
        server.register("echo", |_, params| Ok(params.clone()));
        server.register("count", |records, _| {
            let mut out = ParamMap::new();
            out.insert(b"count".to_vec(), records.len().to_string().into_bytes());
            Ok(out)
        });
        server.register("fetch", |records, params| {
            Ok(params
                .keys()
                .filter_map(|key| records.get(key).map(|value| (key.clone(), value.clone())))
                .collect())
        });
        server
    }

    /// Registers (or replaces) a procedure.
    pub fn register<F>(&self, name: impl Into<String>, procedure: F)
    where
        F: Fn(&mut RecordMap, &ParamMap) -> StoreResult<ParamMap> + Send + Sync + 'static,
    {
        self.procedures.write().insert(name.into(), Arc::new(procedure));
    }

    /// Returns true until the server is shut down.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn records(&self) -> &RwLock<RecordMap> {
        &self.records
    }

    /// Runs a procedure under the record write lock.
    pub(crate) fn call(&self, name: &str, params: &ParamMap) -> StoreResult<ParamMap> {
        let procedure = self.procedures.read().get(name).cloned().ok_or_else(|| {
            StoreError::new(ErrorCode::NotImplemented, format!("no procedure named {name:?}"))
        })?;
        let mut records = self.records.write();
        procedure(&mut records, params)
    }
}

static REGISTRY: LazyLock<Mutex<HashMap<Endpoint, Arc<RemoteServer>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Binds `server` to `endpoint`.
///
/// Fails with `Duplicate` when the endpoint is already served.
pub fn serve(endpoint: &Endpoint, server: Arc<RemoteServer>) -> StoreResult<()> {
    let mut registry = REGISTRY.lock();
    if registry.contains_key(endpoint) {
        return Err(StoreError::new(
            ErrorCode::Duplicate,
            format!("endpoint {endpoint} is already served"),
        ));
    }
    registry.insert(endpoint.clone(), server);
    info!(%endpoint, "serving loopback endpoint");
    Ok(())
}

/// Unbinds `endpoint`, breaking every client connected to it.
///
/// Returns false when nothing was bound.
pub fn shutdown(endpoint: &Endpoint) -> bool {
    match REGISTRY.lock().remove(endpoint) {
        Some(server) => {
            server.running.store(false, Ordering::Release);
            info!(%endpoint, "stopped loopback endpoint");
            true
        }
        None => false,
    }
}

pub(crate) fn connect(endpoint: &Endpoint) -> StoreResult<Arc<RemoteServer>> {
    REGISTRY.lock().get(endpoint).cloned().ok_or_else(|| {
        StoreError::new(
            ErrorCode::Network,
            format!("connection refused by {endpoint}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parse() {
        let ep: Endpoint = "localhost:1978".parse().unwrap();
        assert_eq!(ep, Endpoint::new("localhost", 1978));
        assert_eq!(ep.to_string(), "localhost:1978");

        assert!("localhost".parse::<Endpoint>().is_err());
        assert!(":1978".parse::<Endpoint>().is_err());
        assert!("host:notaport".parse::<Endpoint>().is_err());
    }

    #[test]
    fn serve_twice_is_duplicate() {
        let ep = Endpoint::new("loopback-test-dup", 1);
        serve(&ep, Arc::new(RemoteServer::new())).unwrap();
        let err = serve(&ep, Arc::new(RemoteServer::new())).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Duplicate);
        assert!(shutdown(&ep));
        assert!(!shutdown(&ep));
    }

    #[test]
    fn connect_unbound_is_network_error() {
        let err = connect(&Endpoint::new("loopback-test-nobody", 9)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Network);
    }

    #[test]
    fn builtin_procedures() {
        let server = RemoteServer::new();
        server.records().write().set(b"a", b"1");

        let mut params = ParamMap::new();
        params.insert(b"a".to_vec(), Vec::new());
        params.insert(b"zz".to_vec(), Vec::new());

        let fetched = server.call("fetch", &params).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[b"a".as_slice()], b"1");

        let count = server.call("count", &ParamMap::new()).unwrap();
        assert_eq!(count[b"count".as_slice()], b"1");

        assert_eq!(server.call("echo", &params).unwrap(), params);
    }

    #[test]
    fn unknown_procedure_is_not_implemented() {
        let server = RemoteServer::new();
        let err = server.call("nope", &ParamMap::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotImplemented);
    }
}

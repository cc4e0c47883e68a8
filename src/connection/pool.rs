//! Process-wide cache of live server handles keyed by endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connection::handle::{Connector, Handle};
use crate::error::{Error, Result};
use crate::models::{ConnectionInfo, EndpointKey};

/// Default number of distinct endpoints the pool will hold.
pub const DEFAULT_POOL_CAPACITY: usize = 10;

struct PooledHandle {
    handle: Handle,
}

/// Shares one handle per `host:port:authdb` across sessions.
///
/// Cached handles are probed before reuse; a handle that fails the probe is
/// evicted and replaced. Lookup, probe and insertion happen under one lock, so
/// concurrent callers for the same endpoint never open two handles.
pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    capacity: usize,
    handles: Mutex<HashMap<EndpointKey, PooledHandle>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>, capacity: usize) -> Self {
        Self { connector, capacity: capacity.max(1), handles: Mutex::new(HashMap::new()) }
    }

    pub fn with_default_capacity(connector: Arc<dyn Connector>) -> Self {
        Self::new(connector, DEFAULT_POOL_CAPACITY)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    pub fn contains(&self, key: &EndpointKey) -> bool {
        self.handles.lock().contains_key(key)
    }

    /// Return a live handle for `info`, reusing a cached one when it still answers.
    pub fn acquire(&self, info: &ConnectionInfo) -> Result<Handle> {
        let key = info.endpoint_key();
        let mut handles = self.handles.lock();

        if let Some(pooled) = handles.get(&key) {
            match pooled.handle.ping() {
                Ok(()) => {
                    log::debug!("Reusing pooled connection for {key}");
                    return Ok(pooled.handle.clone());
                }
                Err(err) => {
                    log::warn!("Pooled connection for {key} failed probe, evicting: {err}");
                    if let Some(stale) = handles.remove(&key) {
                        stale.handle.close();
                    }
                }
            }
        }

        if handles.len() >= self.capacity {
            return Err(Error::ResourceExhausted(format!(
                "connection pool is full ({} endpoints)",
                self.capacity
            )));
        }

        let handle = self.connector.open(info).map_err(Error::into_connection_error)?;
        if let Err(err) = handle.ping() {
            handle.close();
            return Err(err.into_connection_error());
        }

        log::info!("Opened pooled connection for {key}");
        handles.insert(key, PooledHandle { handle: handle.clone() });
        Ok(handle)
    }

    /// Drop and close the handle for `key`. Returns whether one was pooled.
    pub fn evict(&self, key: &EndpointKey) -> bool {
        let removed = self.handles.lock().remove(key);
        match removed {
            Some(pooled) => {
                pooled.handle.close();
                log::debug!("Evicted pooled connection for {key}");
                true
            }
            None => false,
        }
    }

    /// Close every pooled handle. Used at shutdown.
    pub fn close_all(&self) {
        let drained: Vec<(EndpointKey, PooledHandle)> = self.handles.lock().drain().collect();
        for (key, pooled) in drained {
            pooled.handle.close();
            log::debug!("Closed pooled connection for {key}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorCategory;
    use crate::testing::{FakeConnector, FakeServer};

    fn pool(server: &Arc<FakeServer>, capacity: usize) -> (Arc<FakeConnector>, ConnectionPool) {
        let connector = FakeConnector::new(server.clone());
        let pool = ConnectionPool::new(connector.clone(), capacity);
        (connector, pool)
    }

    #[test]
    fn same_endpoint_shares_one_handle() {
        let server = FakeServer::new();
        let (connector, pool) = pool(&server, 10);
        let info = ConnectionInfo::new("localhost", 27017);

        let first = pool.acquire(&info).unwrap();
        let second = pool.acquire(&info.clone().with_name("other name")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.opened(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn different_auth_databases_get_separate_handles() {
        let server = FakeServer::new();
        let (connector, pool) = pool(&server, 10);

        pool.acquire(&ConnectionInfo::new("localhost", 27017)).unwrap();
        pool.acquire(&ConnectionInfo::new("localhost", 27017).with_auth_database("reports"))
            .unwrap();

        assert_eq!(connector.opened(), 2);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn full_pool_rejects_new_endpoints() {
        let server = FakeServer::new();
        let (_, pool) = pool(&server, 1);

        pool.acquire(&ConnectionInfo::new("a", 27017)).unwrap();
        let err = pool.acquire(&ConnectionInfo::new("b", 27017)).err().unwrap();

        assert_eq!(err.category(), ErrorCategory::ResourceExhausted);
        // The existing endpoint is still served at capacity.
        assert!(pool.acquire(&ConnectionInfo::new("a", 27017)).is_ok());
    }

    #[test]
    fn stale_handle_is_evicted_and_replaced() {
        let server = FakeServer::new();
        let (connector, pool) = pool(&server, 10);
        let info = ConnectionInfo::new("localhost", 27017);

        let first = pool.acquire(&info).unwrap();
        server.set_down(true);
        let err = pool.acquire(&info).err().unwrap();
        assert_eq!(err.category(), ErrorCategory::Connection);
        assert!(pool.is_empty());
        assert_eq!(server.close_count(), 2);

        server.set_down(false);
        let second = pool.acquire(&info).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.opened(), 3);
    }

    #[test]
    fn unreachable_endpoint_is_not_pooled() {
        let server = FakeServer::new();
        server.set_timing_out(true);
        let (_, pool) = pool(&server, 10);

        let err = pool.acquire(&ConnectionInfo::new("localhost", 27017)).err().unwrap();

        assert!(err.is_timeout());
        assert!(pool.is_empty());
    }

    #[test]
    fn close_all_empties_pool() {
        let server = FakeServer::new();
        let (_, pool) = pool(&server, 10);
        pool.acquire(&ConnectionInfo::new("a", 27017)).unwrap();
        pool.acquire(&ConnectionInfo::new("b", 27017)).unwrap();

        pool.close_all();

        assert!(pool.is_empty());
        assert_eq!(server.close_count(), 2);
    }

    #[test]
    fn evict_reports_presence() {
        let server = FakeServer::new();
        let (_, pool) = pool(&server, 10);
        let info = ConnectionInfo::new("localhost", 27017);
        pool.acquire(&info).unwrap();

        assert!(pool.evict(&info.endpoint_key()));
        assert!(!pool.evict(&info.endpoint_key()));
    }
}

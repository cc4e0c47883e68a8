//! In-memory server used by unit tests. Filters support top-level equality only.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use mongodb::bson::{Bson, Document, doc};
use parking_lot::Mutex;

use crate::connection::{
    Connector, FindDocumentsOptions, Handle, ReplaceOutcome, ServerHandle,
};
use crate::error::{Error, Result};
use crate::models::ConnectionInfo;

#[derive(Default)]
pub(crate) struct FakeServer {
    collections: Mutex<BTreeMap<(String, String), Vec<Document>>>,
    system_databases: Mutex<Vec<String>>,
    down: AtomicBool,
    timing_out: AtomicBool,
    stats_denied: AtomicBool,
    find_delay: Mutex<Option<Duration>>,
    open_delay: Mutex<Option<Duration>>,
    refused_hosts: Mutex<Vec<String>>,
    closed: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        let server = Self::default();
        *server.system_databases.lock() =
            vec!["admin".to_string(), "config".to_string(), "local".to_string()];
        Arc::new(server)
    }

    pub fn insert(&self, database: &str, collection: &str, documents: Vec<Document>) {
        self.collections
            .lock()
            .entry((database.to_string(), collection.to_string()))
            .or_default()
            .extend(documents);
    }

    pub fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .get(&(database.to_string(), collection.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_timing_out(&self, timing_out: bool) {
        self.timing_out.store(timing_out, Ordering::SeqCst);
    }

    pub fn deny_stats(&self, denied: bool) {
        self.stats_denied.store(denied, Ordering::SeqCst);
    }

    pub fn set_find_delay(&self, delay: Option<Duration>) {
        *self.find_delay.lock() = delay;
    }

    /// Delay every new handle by `delay` before it is handed out.
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        *self.open_delay.lock() = delay;
    }

    /// Fail every open for `host` with a refused connection.
    pub fn refuse_host(&self, host: &str) {
        self.refused_hosts.lock().push(host.to_string());
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.timing_out.load(Ordering::SeqCst) {
            return Err(Error::Timeout("server selection timed out".to_string()));
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_stats(&self) -> Result<()> {
        self.check()?;
        if self.stats_denied.load(Ordering::SeqCst) {
            return Err(Error::Operation("not authorized to run stats".to_string()));
        }
        Ok(())
    }

    fn matching(&self, database: &str, collection: &str, filter: &Document) -> Vec<Document> {
        self.documents(database, collection)
            .into_iter()
            .filter(|doc| matches_filter(doc, filter))
            .collect()
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

pub(crate) struct FakeConnector {
    server: Arc<FakeServer>,
    opened: AtomicUsize,
}

impl FakeConnector {
    pub fn new(server: Arc<FakeServer>) -> Arc<Self> {
        Arc::new(Self { server, opened: AtomicUsize::new(0) })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn open(&self, info: &ConnectionInfo) -> Result<Handle> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.server.open_delay.lock() {
            std::thread::sleep(delay);
        }
        if self.server.refused_hosts.lock().contains(&info.host) {
            return Err(Error::Connection("connection refused".to_string()));
        }
        Ok(Arc::new(FakeHandle { server: self.server.clone() }))
    }
}

pub(crate) struct FakeHandle {
    server: Arc<FakeServer>,
}

impl ServerHandle for FakeHandle {
    fn ping(&self) -> Result<()> {
        self.server.check()
    }

    fn list_database_names(&self) -> Result<Vec<String>> {
        self.server.check()?;
        let mut names: Vec<String> = self.server.system_databases.lock().clone();
        for (database, _) in self.server.collections.lock().keys() {
            if !names.contains(database) {
                names.push(database.clone());
            }
        }
        Ok(names)
    }

    fn database_stats(&self, database: &str) -> Result<Document> {
        self.server.check_stats()?;
        let collections = self.list_collection_names(database)?.len() as i32;
        Ok(doc! {
            "collections": collections,
            "dataSize": 2048.0,
            "storageSize": 4096_i64,
            "indexes": collections,
            "indexSize": 1024,
        })
    }

    fn list_collection_names(&self, database: &str) -> Result<Vec<String>> {
        self.server.check()?;
        Ok(self
            .server
            .collections
            .lock()
            .keys()
            .filter(|(db, _)| db == database)
            .map(|(_, collection)| collection.clone())
            .rev()
            .collect())
    }

    fn collection_stats(&self, database: &str, collection: &str) -> Result<Document> {
        self.server.check_stats()?;
        let count = self.server.documents(database, collection).len() as i64;
        Ok(doc! {
            "count": count,
            "size": count * 100,
            "storageSize": 4096,
            "totalIndexSize": 512,
            "avgObjSize": 100.0,
            "capped": false,
        })
    }

    fn list_index_names(&self, _database: &str, _collection: &str) -> Result<Vec<String>> {
        self.server.check()?;
        Ok(vec!["_id_".to_string()])
    }

    fn find(
        &self,
        database: &str,
        collection: &str,
        options: FindDocumentsOptions,
    ) -> Result<Vec<Document>> {
        if let Some(delay) = *self.server.find_delay.lock() {
            std::thread::sleep(delay);
        }
        self.server.check()?;
        let filter = options.filter.unwrap_or_default();
        let matching = self.server.matching(database, collection, &filter);
        let limit = if options.limit > 0 { options.limit as usize } else { usize::MAX };
        Ok(matching.into_iter().skip(options.skip as usize).take(limit).collect())
    }

    fn count(&self, database: &str, collection: &str, filter: Document) -> Result<u64> {
        self.server.check()?;
        Ok(self.server.matching(database, collection, &filter).len() as u64)
    }

    fn distinct(
        &self,
        database: &str,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>> {
        self.server.check()?;
        let mut values: Vec<Bson> = Vec::new();
        for doc in self.server.matching(database, collection, &filter) {
            if let Some(value) = doc.get(field)
                && !values.contains(value)
            {
                values.push(value.clone());
            }
        }
        Ok(values)
    }

    fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>> {
        self.server.check()?;
        let mut documents = self.server.documents(database, collection);
        for stage in pipeline {
            let Some((name, argument)) = stage.iter().next() else {
                return Err(Error::Operation("empty pipeline stage".to_string()));
            };
            documents = match (name.as_str(), argument) {
                ("$match", Bson::Document(filter)) => {
                    documents.into_iter().filter(|doc| matches_filter(doc, filter)).collect()
                }
                ("$limit", Bson::Int32(n)) => documents.into_iter().take(*n as usize).collect(),
                ("$skip", Bson::Int32(n)) => documents.into_iter().skip(*n as usize).collect(),
                _ => {
                    return Err(Error::Operation(format!(
                        "Unrecognized pipeline stage name: '{name}'"
                    )));
                }
            };
        }
        Ok(documents)
    }

    fn replace_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        replacement: Document,
    ) -> Result<ReplaceOutcome> {
        self.server.check()?;
        let mut collections = self.server.collections.lock();
        let Some(documents) =
            collections.get_mut(&(database.to_string(), collection.to_string()))
        else {
            return Ok(ReplaceOutcome::default());
        };
        let Some(existing) = documents.iter_mut().find(|doc| matches_filter(doc, &filter)) else {
            return Ok(ReplaceOutcome::default());
        };

        let mut updated = Document::new();
        if let Some(id) = existing.get("_id") {
            updated.insert("_id", id.clone());
        }
        for (key, value) in replacement {
            updated.insert(key, value);
        }
        let modified = u64::from(*existing != updated);
        *existing = updated;
        Ok(ReplaceOutcome { matched: 1, modified })
    }

    fn close(&self) {
        self.server.closed.fetch_add(1, Ordering::SeqCst);
    }
}

//! MongoDB driver implementation of the connection seam.
//!
//! The driver is async; the data-access layer is synchronous and runs on the
//! operation worker. Each handle shares one Tokio runtime owned by the
//! connector and blocks on it per call.

use std::sync::Arc;

use mongodb::Client;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{ClientOptions, Credential, ServerAddress, Tls, TlsOptions};
use tokio::runtime::Runtime;

use crate::connection::handle::{Connector, Handle, ServerHandle};
use crate::connection::types::{FindDocumentsOptions, ReplaceOutcome};
use crate::error::Result;
use crate::models::ConnectionInfo;

const APP_NAME: &str = "docscope";

/// Opens driver clients for the pool.
pub struct MongoConnector {
    runtime: Arc<Runtime>,
}

impl MongoConnector {
    /// Create a connector with its own multi-threaded Tokio runtime.
    pub fn new() -> Result<Self> {
        let runtime = Runtime::new()?;
        Ok(Self { runtime: Arc::new(runtime) })
    }

    /// Driver options for one endpoint, built field by field from `info`.
    pub fn client_options(info: &ConnectionInfo) -> Result<ClientOptions> {
        let mut options = ClientOptions::default();
        options.hosts = vec![ServerAddress::parse(info.address())?];
        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(info.connect_timeout());
        options.server_selection_timeout = Some(info.server_selection_timeout());
        options.max_pool_size = Some(info.max_pool_size);

        if info.auth_enabled {
            let mut credential = Credential::default();
            credential.username = info.username.clone();
            credential.password = info.password.clone();
            credential.source = Some(info.auth_database.clone());
            options.credential = Some(credential);
        }

        if info.tls_enabled {
            let mut tls = TlsOptions::default();
            tls.ca_file_path = info.tls_ca_file.clone();
            tls.allow_invalid_certificates = Some(info.tls_ca_file.is_none());
            options.tls = Some(Tls::Enabled(tls));
        }

        Ok(options)
    }
}

impl Connector for MongoConnector {
    fn open(&self, info: &ConnectionInfo) -> Result<Handle> {
        let options = Self::client_options(info)?;
        // Client construction spawns monitor tasks, so it must run inside the runtime.
        let _guard = self.runtime.enter();
        let client = Client::with_options(options)?;
        log::debug!("Created MongoDB client for {}", info.endpoint_key());
        Ok(Arc::new(MongoHandle { client, runtime: self.runtime.clone() }))
    }
}

/// One driver client. The driver keeps its own socket pool underneath.
pub struct MongoHandle {
    pub(crate) client: Client,
    pub(crate) runtime: Arc<Runtime>,
}

impl ServerHandle for MongoHandle {
    fn ping(&self) -> Result<()> {
        let client = self.client.clone();
        self.runtime.block_on(async {
            client.database("admin").run_command(doc! { "ping": 1 }).await?;
            Ok(())
        })
    }

    fn list_database_names(&self) -> Result<Vec<String>> {
        let client = self.client.clone();
        self.runtime.block_on(async {
            let names = client.list_database_names().await?;
            Ok(names)
        })
    }

    fn database_stats(&self, database: &str) -> Result<Document> {
        self.run_database_stats(database)
    }

    fn list_collection_names(&self, database: &str) -> Result<Vec<String>> {
        let client = self.client.clone();
        let database = database.to_string();
        self.runtime.block_on(async {
            let names = client.database(&database).list_collection_names().await?;
            Ok(names)
        })
    }

    fn collection_stats(&self, database: &str, collection: &str) -> Result<Document> {
        self.run_collection_stats(database, collection)
    }

    fn list_index_names(&self, database: &str, collection: &str) -> Result<Vec<String>> {
        self.index_names(database, collection)
    }

    fn find(
        &self,
        database: &str,
        collection: &str,
        options: FindDocumentsOptions,
    ) -> Result<Vec<Document>> {
        self.find_documents(database, collection, options)
    }

    fn count(&self, database: &str, collection: &str, filter: Document) -> Result<u64> {
        self.count_documents(database, collection, filter)
    }

    fn distinct(
        &self,
        database: &str,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>> {
        self.distinct_values(database, collection, field, filter)
    }

    fn aggregate(
        &self,
        database: &str,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>> {
        self.aggregate_pipeline(database, collection, pipeline)
    }

    fn replace_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        replacement: Document,
    ) -> Result<ReplaceOutcome> {
        self.replace_document(database, collection, filter, replacement)
    }

    fn close(&self) {
        let client = self.client.clone();
        self.runtime.block_on(async {
            client.shutdown().immediate(true).await;
        });
    }
}

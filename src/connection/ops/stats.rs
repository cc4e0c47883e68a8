//! Database and collection statistics operations.

use mongodb::bson::{Document, doc};

use crate::connection::mongo::MongoHandle;
use crate::error::Result;

impl MongoHandle {
    /// Fetch collection stats (runs in Tokio runtime)
    pub fn run_collection_stats(&self, database: &str, collection: &str) -> Result<Document> {
        let client = self.client.clone();
        let database = database.to_string();
        let collection = collection.to_string();
        self.runtime.block_on(async {
            let db = client.database(&database);
            let stats = db.run_command(doc! { "collStats": collection }).await?;
            Ok(stats)
        })
    }

    /// Fetch database stats (runs in Tokio runtime)
    pub fn run_database_stats(&self, database: &str) -> Result<Document> {
        let client = self.client.clone();
        let database = database.to_string();
        self.runtime.block_on(async {
            let db = client.database(&database);
            let stats = db.run_command(doc! { "dbStats": 1 }).await?;
            Ok(stats)
        })
    }

    /// Names of the indexes defined on a collection (runs in Tokio runtime)
    pub fn index_names(&self, database: &str, collection: &str) -> Result<Vec<String>> {
        let client = self.client.clone();
        let database = database.to_string();
        let collection = collection.to_string();
        self.runtime.block_on(async {
            let coll = client.database(&database).collection::<Document>(&collection);
            let names = coll.list_index_names().await?;
            Ok(names)
        })
    }
}

//! Document reads and replacement for MongoDB collections.

use mongodb::bson::{Bson, Document};

use crate::connection::mongo::MongoHandle;
use crate::connection::types::{FindDocumentsOptions, ReplaceOutcome};
use crate::error::Result;

impl MongoHandle {
    /// Find documents in a collection with pagination (runs in Tokio runtime)
    pub fn find_documents(
        &self,
        database: &str,
        collection: &str,
        opts: FindDocumentsOptions,
    ) -> Result<Vec<Document>> {
        use futures::TryStreamExt;

        let client = self.client.clone();
        let database = database.to_string();
        let collection = collection.to_string();
        let filter = opts.filter.unwrap_or_default();

        self.runtime.block_on(async {
            let coll = client.database(&database).collection::<Document>(&collection);

            let mut options = mongodb::options::FindOptions::default();
            options.skip = Some(opts.skip);
            options.limit = (opts.limit > 0).then_some(opts.limit);
            options.sort = opts.sort;
            options.projection = opts.projection;

            let cursor = coll.find(filter).with_options(options).await?;
            let documents: Vec<Document> = cursor.try_collect().await?;
            Ok(documents)
        })
    }

    /// Count documents matching a filter (runs in Tokio runtime)
    pub fn count_documents(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<u64> {
        let client = self.client.clone();
        let database = database.to_string();
        let collection = collection.to_string();

        self.runtime.block_on(async {
            let coll = client.database(&database).collection::<Document>(&collection);
            let count = coll.count_documents(filter).await?;
            Ok(count)
        })
    }

    /// Distinct values of one field among matching documents (runs in Tokio runtime)
    pub fn distinct_values(
        &self,
        database: &str,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> Result<Vec<Bson>> {
        let client = self.client.clone();
        let database = database.to_string();
        let collection = collection.to_string();
        let field = field.to_string();

        self.runtime.block_on(async {
            let coll = client.database(&database).collection::<Document>(&collection);
            let values = coll.distinct(field, filter).await?;
            Ok(values)
        })
    }

    /// Replace the first document matching `filter` (runs in Tokio runtime)
    pub fn replace_document(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
        replacement: Document,
    ) -> Result<ReplaceOutcome> {
        let client = self.client.clone();
        let database = database.to_string();
        let collection = collection.to_string();

        self.runtime.block_on(async {
            let coll = client.database(&database).collection::<Document>(&collection);
            let result = coll.replace_one(filter, replacement).await?;
            Ok(ReplaceOutcome { matched: result.matched_count, modified: result.modified_count })
        })
    }
}

//! Common test utilities for integration tests using Testcontainers.
//!
//! A single MongoDB 7.0 container is shared per test binary (Rust compiles each
//! `tests/*.rs` file as a separate binary). Per-test isolation is achieved by
//! namespacing every database name with a short UUID suffix.
//!
//! The crate's API is blocking and drives its own tokio runtime, so tests are
//! plain `#[test]` functions. The container lives on a background thread with
//! a dedicated runtime; seeding uses a short-lived runtime per call.
//!
//! An `atexit` hook ensures the container is removed when the process exits.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::OnceLock;
use std::time::Duration;

use docscope::ConnectionInfo;
use mongodb::bson::Document;
use mongodb::{Client, options::ClientOptions};
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::mongo::Mongo;

/// How long tests wait for the operation worker to drain.
pub const WAIT: Duration = Duration::from_secs(30);

/// Address of the shared container.
struct SharedContainer {
    host: String,
    port: u16,
}

static SHARED: OnceLock<SharedContainer> = OnceLock::new();

/// Docker container ID, stored globally so the `atexit` handler can remove it.
static CONTAINER_ID: OnceLock<String> = OnceLock::new();

unsafe extern "C" {
    fn atexit(f: extern "C" fn()) -> i32;
}

/// Called by the C runtime on process exit. Forcibly removes the shared container.
extern "C" fn remove_container() {
    if let Some(id) = CONTAINER_ID.get() {
        let _ = std::process::Command::new("docker")
            .args(["rm", "-f", id])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create test runtime")
}

/// Initialize the shared container (called once per test binary).
fn get_or_init_shared() -> &'static SharedContainer {
    SHARED.get_or_init(|| {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);

        std::thread::spawn(move || {
            runtime().block_on(async {
                let container = Mongo::default()
                    .with_tag("7.0")
                    .start()
                    .await
                    .expect("Failed to start MongoDB container");

                let _ = CONTAINER_ID.set(container.id().to_string());
                unsafe {
                    atexit(remove_container);
                }

                let host = container.get_host().await.expect("Failed to get host").to_string();
                let port = container.get_host_port_ipv4(27017).await.expect("Failed to get port");

                // Readiness probe
                let uri = format!("mongodb://{host}:{port}");
                let opts = ClientOptions::parse(&uri).await.expect("Failed to parse");
                let probe = Client::with_options(opts).expect("Failed to create probe client");
                for _ in 0..30 {
                    if probe.list_database_names().await.is_ok() {
                        break;
                    }
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                }
                drop(probe);

                tx.send((host, port)).expect("Failed to send container address");

                // Park forever so the container outlives every test.
                std::future::pending::<()>().await;
            });
        });

        let (host, port) = rx.recv().expect("Failed to receive container address");
        SharedContainer { host, port }
    })
}

/// Per-test handle to the shared container.
///
/// `db_name("foo")` returns `foo_{test_id}`, preventing cross-test interference.
pub struct MongoTestContainer {
    host: String,
    port: u16,
    test_id: String,
}

impl MongoTestContainer {
    pub fn start() -> Self {
        let shared = get_or_init_shared();
        let test_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        Self { host: shared.host.clone(), port: shared.port, test_id }
    }

    /// Connection parameters for the crate under test.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(&self.host, self.port).with_name("test container")
    }

    pub fn db_name(&self, name: &str) -> String {
        format!("{}_{}", name, self.test_id)
    }

    /// Insert `documents` into the namespaced `db.collection` through a
    /// separate driver client.
    pub fn seed(&self, db: &str, collection: &str, documents: Vec<Document>) {
        let uri = format!("mongodb://{}:{}", self.host, self.port);
        let db = self.db_name(db);
        runtime().block_on(async {
            let opts = ClientOptions::parse(&uri).await.expect("Failed to parse");
            let client = Client::with_options(opts).expect("Failed to create seed client");
            let coll = client.database(&db).collection::<Document>(collection);
            if documents.is_empty() {
                client.database(&db).create_collection(collection).await.expect("create failed");
            } else {
                coll.insert_many(documents).await.expect("Failed to seed documents");
            }
            client.shutdown().await;
        });
    }

    /// Read back every document in the namespaced `db.collection`.
    pub fn documents(&self, db: &str, collection: &str) -> Vec<Document> {
        use futures::TryStreamExt;

        let uri = format!("mongodb://{}:{}", self.host, self.port);
        let db = self.db_name(db);
        runtime().block_on(async {
            let opts = ClientOptions::parse(&uri).await.expect("Failed to parse");
            let client = Client::with_options(opts).expect("Failed to create client");
            let cursor = client
                .database(&db)
                .collection::<Document>(collection)
                .find(Document::new())
                .await
                .expect("find failed");
            let documents: Vec<Document> = cursor.try_collect().await.expect("cursor failed");
            client.shutdown().await;
            documents
        })
    }
}

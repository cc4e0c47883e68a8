//! Session events for UI updates

use std::path::PathBuf;
use std::sync::mpsc;

use chrono::{DateTime, Utc};
use mongodb::bson::Document;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ErrorCategory;
use crate::export::ExportFormat;
use crate::models::{
    CollectionInfo, ConnectionInfo, ConnectionStatus, DatabaseInfo, DocumentStats, QuerySpec,
};

/// Events emitted by the SessionController, in the order the worker produced them.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    // Connection lifecycle
    ConnectionStatusChanged(ConnectionStatus),
    ConnectionTested {
        info: ConnectionInfo,
        ok: bool,
    },

    // Data loaded
    DatabasesLoaded(Vec<DatabaseInfo>),
    CollectionsLoaded {
        database: String,
        collections: Vec<CollectionInfo>,
    },
    DocumentsLoaded {
        database: String,
        collection: String,
        documents: Vec<Document>,
        stats: DocumentStats,
    },
    QueryExecuted(QuerySpec),

    // Writes
    DocumentUpdated {
        database: String,
        collection: String,
        id: String,
        matched: bool,
    },
    DataExported {
        path: PathBuf,
        format: ExportFormat,
        records: u64,
    },

    ErrorOccurred(ErrorInfo),
}

/// Selection at the time an error was reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorContext {
    pub database: Option<String>,
    pub collection: Option<String>,
    pub connection_status: ConnectionStatus,
}

/// Uniform failure report handed to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    pub category: ErrorCategory,
    pub timestamp: DateTime<Utc>,
    pub context: ErrorContext,
    pub detail: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>, category: ErrorCategory, context: ErrorContext) -> Self {
        Self { message: message.into(), category, timestamp: Utc::now(), context, detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Fan-out of session events to any number of channel subscribers.
///
/// Subscribers whose receiver has been dropped are pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::Sender<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn emit(&self, event: SessionEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

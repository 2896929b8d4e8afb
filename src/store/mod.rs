// src/store/mod.rs
//
// Document-store collaborator and the typed reset-request store on top of
// it. The generic layer speaks collections of JSON documents; backends are
// selected by connection string and dispatched through an enum.
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod requests;
pub mod sqlite;

pub use requests::{RequestPatch, ResetRequestStore};

/// Collection holding reset-request documents.
pub const REQUESTS_COLLECTION: &str = "password_reset_requests";
/// Collection holding user documents. Externally owned; this crate reads
/// records and patches only the security fields.
pub const USERS_COLLECTION: &str = "users";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No account found for username: {0}")]
    UserNotFound(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Request {id} is no longer pending (status: {status})")]
    Conflict { id: String, status: String },

    #[error("Document store error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::Backend(error.to_string())
    }
}

// Backend contract: generic document operations, not-found and conflict
// semantics per the reset-request store that sits on top.
pub trait DocumentBackend: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError>;

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError>;

    async fn create(&self, collection: &str, id: &str, body: &Value) -> Result<(), StoreError>;

    /// Shallow-merge `patch` into the stored document. Explicit nulls in the
    /// patch overwrite (clear) existing fields.
    async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<(), StoreError>;

    /// Like `update`, but only if the document's `guard_field` currently
    /// equals `expected`; otherwise fails with [`StoreError::Conflict`].
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        patch: &Value,
        guard_field: &str,
        expected: &Value,
    ) -> Result<(), StoreError>;
}

// Shallow JSON-object merge shared by the backends.
pub(crate) fn merge_document(body: &mut Value, patch: &Value) {
    if let (Some(target), Some(source)) = (body.as_object_mut(), patch.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[derive(Clone)]
pub enum BackendType {
    Sqlite(sqlite::SqliteBackend),
    Memory(memory::MemoryBackend),
}

/// The document-store collaborator, dispatching to the configured backend.
#[derive(Clone)]
pub struct Documents {
    backend: BackendType,
}

impl Documents {
    /// Connect using a connection string: `sqlite:` URLs open the SQLite
    /// backend, anything else is rejected.
    pub async fn connect(connection_string: &str) -> Result<Self, StoreError> {
        if connection_string.starts_with("sqlite:") {
            let mut backend = sqlite::SqliteBackend::new();
            backend.init(connection_string).await?;
            Ok(Self {
                backend: BackendType::Sqlite(backend),
            })
        } else {
            Err(StoreError::Backend(format!(
                "unsupported connection string: {}",
                connection_string
            )))
        }
    }

    /// A process-local in-memory store, for tests and light embedding.
    pub fn in_memory() -> Self {
        Self {
            backend: BackendType::Memory(memory::MemoryBackend::new()),
        }
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        match &self.backend {
            BackendType::Sqlite(backend) => backend.get(collection, id).await,
            BackendType::Memory(backend) => backend.get(collection, id).await,
        }
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        match &self.backend {
            BackendType::Sqlite(backend) => backend.list(collection).await,
            BackendType::Memory(backend) => backend.list(collection).await,
        }
    }

    pub async fn query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        match &self.backend {
            BackendType::Sqlite(backend) => backend.query(collection, field, value).await,
            BackendType::Memory(backend) => backend.query(collection, field, value).await,
        }
    }

    pub async fn create(&self, collection: &str, id: &str, body: &Value) -> Result<(), StoreError> {
        match &self.backend {
            BackendType::Sqlite(backend) => backend.create(collection, id, body).await,
            BackendType::Memory(backend) => backend.create(collection, id, body).await,
        }
    }

    pub async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<(), StoreError> {
        match &self.backend {
            BackendType::Sqlite(backend) => backend.update(collection, id, patch).await,
            BackendType::Memory(backend) => backend.update(collection, id, patch).await,
        }
    }

    pub async fn update_if(
        &self,
        collection: &str,
        id: &str,
        patch: &Value,
        guard_field: &str,
        expected: &Value,
    ) -> Result<(), StoreError> {
        match &self.backend {
            BackendType::Sqlite(backend) => {
                backend.update_if(collection, id, patch, guard_field, expected).await
            }
            BackendType::Memory(backend) => {
                backend.update_if(collection, id, patch, guard_field, expected).await
            }
        }
    }

    pub fn backend_name(&self) -> &str {
        match &self.backend {
            BackendType::Sqlite(_) => "SQLite",
            BackendType::Memory(_) => "Memory",
        }
    }
}

//! In-memory database implementation.
//!
//! This module provides a simple database handle that keeps every collection as an
//! insertion-ordered list of BSON documents behind an async-safe read-write lock.

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use docbridge_core::{
    backend::{Collection, Database, DatabaseBuilder, DocumentCursor, Session, UpdateOutcome},
    error::ModelResult,
};

use crate::{evaluator, pipeline, session::in_memory, update};

type StoreMap = HashMap<String, Vec<Document>>;

/// Thread-safe in-memory database.
///
/// `InMemoryDatabase` is cloneable and uses an `Arc`-wrapped internal state; clones
/// share the same collections. Queries scan every document of a collection, and results
/// come back in insertion order.
///
/// # Example
///
/// ```ignore
/// use docbridge_memory::InMemoryDatabase;
/// use bson::doc;
///
/// let db = InMemoryDatabase::new();
/// db.insert("profiles", vec![doc! { "user_id": "4" }]).await?;
///
/// let profile = db.collection("profiles").find_one(doc! { "user_id": "4" }, None).await?;
/// assert!(profile.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryDatabase {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryDatabase {
    /// Creates a new empty in-memory database.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for seeding an `InMemoryDatabase`.
    pub fn builder() -> InMemoryDatabaseBuilder {
        InMemoryDatabaseBuilder::default()
    }

    /// Starts a new client session.
    pub fn start_session(&self) -> crate::session::InMemorySession {
        crate::session::InMemorySession::new()
    }

    /// Appends documents to a collection, creating it if needed.
    ///
    /// Documents without an `_id` are given a fresh `ObjectId`.
    pub async fn insert(
        &self,
        collection: &str,
        documents: impl IntoIterator<Item = Document>,
    ) -> ModelResult<()> {
        let mut store = self.store.write().await;
        store
            .entry(collection.to_string())
            .or_default()
            .extend(documents.into_iter().map(with_id));

        Ok(())
    }

    /// Returns a copy of every document in a collection, in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Lists the names of all collections.
    pub async fn list_collections(&self) -> Vec<String> {
        self.store.read().await.keys().cloned().collect()
    }

    pub(crate) async fn publish(&self, staged: StoreMap) {
        let mut store = self.store.write().await;
        for (name, documents) in staged {
            store.insert(name, documents);
        }
    }
}

fn with_id(mut document: Document) -> Document {
    if !document.contains_key("_id") {
        document.insert("_id", ObjectId::new());
    }
    document
}

impl Database for InMemoryDatabase {
    fn collection(&self, name: &str) -> Box<dyn Collection> {
        Box::new(InMemoryCollection {
            name: name.to_string(),
            store: self.store.clone(),
        })
    }
}

/// A handle to one collection of an [`InMemoryDatabase`].
#[derive(Debug, Clone)]
pub struct InMemoryCollection {
    name: String,
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryCollection {
    /// Returns the current documents, as seen from the session's transaction if any.
    async fn snapshot(&self, session: Option<&mut dyn Session>) -> ModelResult<Vec<Document>> {
        if let Some(staged) = in_memory(session)?.and_then(|session| session.staged()) {
            if let Some(documents) = staged.get(&self.name) {
                return Ok(documents.clone());
            }
        }

        Ok(self
            .store
            .read()
            .await
            .get(&self.name)
            .cloned()
            .unwrap_or_default())
    }

    async fn filtered(
        &self,
        filter: &Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<Vec<Document>> {
        if let Some(staged) = in_memory(session)?.and_then(|session| session.staged()) {
            if let Some(documents) = staged.get(&self.name) {
                return evaluator::filter_documents(documents, filter);
            }
        }

        match self.store.read().await.get(&self.name) {
            Some(documents) => evaluator::filter_documents(documents, filter),
            None => Ok(vec![]),
        }
    }
}

fn cursor(documents: Vec<Document>) -> DocumentCursor {
    stream::iter(documents.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl Collection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(
        &self,
        filter: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<Option<Document>> {
        Ok(self.filtered(&filter, session).await?.into_iter().next())
    }

    async fn find(
        &self,
        filter: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<DocumentCursor> {
        Ok(cursor(self.filtered(&filter, session).await?))
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<DocumentCursor> {
        debug!(collection = %self.name, stages = pipeline.len(), "running in-memory pipeline");
        let documents = self.snapshot(session).await?;

        Ok(cursor(pipeline::run(documents, &pipeline)?))
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<UpdateOutcome> {
        if let Some(staged) = in_memory(session)?.and_then(|session| session.staged_mut()) {
            if !staged.contains_key(&self.name) {
                let current = self
                    .store
                    .read()
                    .await
                    .get(&self.name)
                    .cloned()
                    .unwrap_or_default();
                staged.insert(self.name.clone(), current);
            }
            let documents = staged.entry(self.name.clone()).or_default();

            return update::update_one(documents, &filter, &update);
        }

        let mut store = self.store.write().await;
        match store.get_mut(&self.name) {
            Some(documents) => update::update_one(documents, &filter, &update),
            None => Ok(UpdateOutcome::default()),
        }
    }
}

/// Builder for [`InMemoryDatabase`] instances, optionally seeded with documents.
///
/// # Example
///
/// ```ignore
/// let db = InMemoryDatabase::builder()
///     .seed("profiles", vec![doc! { "user_id": "4" }])
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct InMemoryDatabaseBuilder {
    seed: Vec<(String, Vec<Document>)>,
}

impl InMemoryDatabaseBuilder {
    /// Adds documents to a collection of the database being built.
    pub fn seed(mut self, collection: &str, documents: impl IntoIterator<Item = Document>) -> Self {
        self.seed
            .push((collection.to_string(), documents.into_iter().collect()));
        self
    }
}

#[async_trait]
impl DatabaseBuilder for InMemoryDatabaseBuilder {
    type Database = InMemoryDatabase;

    async fn build(self) -> ModelResult<Self::Database> {
        let database = InMemoryDatabase::new();
        for (collection, documents) in self.seed {
            database.insert(&collection, documents).await?;
        }

        Ok(database)
    }
}

use async_trait::async_trait;
use bson::Document;
use futures::{StreamExt, TryStreamExt, stream};
use mongodb::{Client, Collection as DriverCollection, options::ClientOptions};
use tracing::debug;

use docbridge_core::{
    backend::{Collection, Database, DatabaseBuilder, DocumentCursor, Session, UpdateOutcome},
    error::{ModelError, ModelResult},
};

use crate::session::{MongoSession, backend, client_session};

/// A handle to one database of a MongoDB deployment.
#[derive(Debug, Clone)]
pub struct MongoDatabase {
    client: Client,
    database: String,
}

impl MongoDatabase {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDatabaseBuilder {
        MongoDatabaseBuilder::new(dsn, database)
    }

    /// Starts a client session, for use with transactions.
    pub async fn start_session(&self) -> ModelResult<MongoSession> {
        Ok(MongoSession::new(
            self.client.start_session().await.map_err(backend)?,
        ))
    }

    pub async fn shutdown(self) -> ModelResult<()> {
        self.client.shutdown().await;

        Ok(())
    }

    fn get_collection(&self, collection_name: &str) -> DriverCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

impl Database for MongoDatabase {
    fn collection(&self, name: &str) -> Box<dyn Collection> {
        Box::new(MongoCollection {
            inner: self.get_collection(name),
        })
    }
}

/// A handle to one MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    inner: DriverCollection<Document>,
}

fn materialized(documents: Vec<Document>) -> DocumentCursor {
    stream::iter(documents.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl Collection for MongoCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find_one(
        &self,
        filter: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<Option<Document>> {
        let action = self.inner.find_one(filter);

        match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(backend)
    }

    async fn find(
        &self,
        filter: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<DocumentCursor> {
        match client_session(session)? {
            // a session cursor borrows the session on every batch, so drain it here
            Some(session) => {
                let mut cursor = self
                    .inner
                    .find(filter)
                    .session(&mut *session)
                    .await
                    .map_err(backend)?;

                Ok(materialized(
                    cursor
                        .stream(session)
                        .try_collect::<Vec<_>>()
                        .await
                        .map_err(backend)?,
                ))
            }
            None => Ok(self
                .inner
                .find(filter)
                .await
                .map_err(backend)?
                .map_err(backend)
                .boxed()),
        }
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<DocumentCursor> {
        debug!(collection = self.inner.name(), stages = pipeline.len(), "running aggregate");

        match client_session(session)? {
            Some(session) => {
                let mut cursor = self
                    .inner
                    .aggregate(pipeline)
                    .session(&mut *session)
                    .await
                    .map_err(backend)?;

                Ok(materialized(
                    cursor
                        .stream(session)
                        .try_collect::<Vec<_>>()
                        .await
                        .map_err(backend)?,
                ))
            }
            None => Ok(self
                .inner
                .aggregate(pipeline)
                .await
                .map_err(backend)?
                .map_err(backend)
                .boxed()),
        }
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<UpdateOutcome> {
        let action = self.inner.update_one(filter, update);

        let result = match client_session(session)? {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(backend)?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }
}

/// Builder for [`MongoDatabase`] handles.
///
/// Configuration is a connection string and a database name; client options are parsed
/// from the connection string.
pub struct MongoDatabaseBuilder {
    dsn: String,
    database: String,
}

impl MongoDatabaseBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl DatabaseBuilder for MongoDatabaseBuilder {
    type Database = MongoDatabase;

    async fn build(self) -> ModelResult<Self::Database> {
        Ok(MongoDatabase::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| ModelError::Backend(e.to_string()))?,
            )
            .map_err(|e| ModelError::Backend(e.to_string()))?,
            self.database,
        ))
    }
}

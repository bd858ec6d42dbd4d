//! Client sessions with staged transactions for the in-memory database.

use bson::Document;
use std::{any::Any, collections::HashMap};
use tracing::debug;

use docbridge_core::{
    backend::Session,
    error::{ModelError, ModelResult},
};

use crate::store::InMemoryDatabase;

/// A session on an [`InMemoryDatabase`].
///
/// While a transaction is open, operations run through the session read and write a
/// private copy of each collection they touch. Nothing is visible to other readers until
/// [`InMemorySession::commit_transaction`]; [`InMemorySession::abort_transaction`] discards
/// the staged copies. Commit replaces the touched collections wholesale, so concurrent
/// writes made outside the transaction to those collections are lost.
#[derive(Debug, Default)]
pub struct InMemorySession {
    staged: Option<HashMap<String, Vec<Document>>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction on this session.
    pub fn start_transaction(&mut self) -> ModelResult<()> {
        if self.staged.is_some() {
            return Err(ModelError::Session(
                "a transaction is already in progress".to_string(),
            ));
        }
        self.staged = Some(HashMap::new());

        Ok(())
    }

    /// Publishes every staged collection to `database` and closes the transaction.
    pub async fn commit_transaction(&mut self, database: &InMemoryDatabase) -> ModelResult<()> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| ModelError::Session("no transaction in progress".to_string()))?;

        debug!(collections = staged.len(), "committing in-memory transaction");
        database.publish(staged).await;

        Ok(())
    }

    /// Discards every staged change and closes the transaction.
    pub fn abort_transaction(&mut self) -> ModelResult<()> {
        match self.staged.take() {
            Some(staged) => {
                debug!(collections = staged.len(), "aborting in-memory transaction");
                Ok(())
            }
            None => Err(ModelError::Session("no transaction in progress".to_string())),
        }
    }

    pub(crate) fn staged(&self) -> Option<&HashMap<String, Vec<Document>>> {
        self.staged.as_ref()
    }

    pub(crate) fn staged_mut(&mut self) -> Option<&mut HashMap<String, Vec<Document>>> {
        self.staged.as_mut()
    }
}

impl Session for InMemorySession {
    fn in_transaction(&self) -> bool {
        self.staged.is_some()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Downcasts a core session to an [`InMemorySession`].
pub(crate) fn in_memory(
    session: Option<&mut dyn Session>,
) -> ModelResult<Option<&mut InMemorySession>> {
    session
        .map(|session| {
            session
                .as_any_mut()
                .downcast_mut::<InMemorySession>()
                .ok_or_else(|| {
                    ModelError::Session("expected an in-memory database session".to_string())
                })
        })
        .transpose()
}

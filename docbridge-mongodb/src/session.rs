//! Client sessions for the MongoDB backend.

use mongodb::ClientSession;
use std::any::Any;

use docbridge_core::{
    backend::Session,
    error::{ModelError, ModelResult},
};

/// A MongoDB client session, usable wherever docbridge accepts a [`Session`].
pub struct MongoSession {
    inner: ClientSession,
    in_transaction: bool,
}

impl MongoSession {
    pub fn new(inner: ClientSession) -> Self {
        Self {
            inner,
            in_transaction: false,
        }
    }

    pub async fn start_transaction(&mut self) -> ModelResult<()> {
        self.inner.start_transaction().await.map_err(backend)?;
        self.in_transaction = true;

        Ok(())
    }

    pub async fn commit_transaction(&mut self) -> ModelResult<()> {
        self.inner.commit_transaction().await.map_err(backend)?;
        self.in_transaction = false;

        Ok(())
    }

    pub async fn abort_transaction(&mut self) -> ModelResult<()> {
        self.in_transaction = false;
        self.inner.abort_transaction().await.map_err(backend)
    }

    /// Returns the driver session.
    pub fn client_session(&mut self) -> &mut ClientSession {
        &mut self.inner
    }
}

impl Session for MongoSession {
    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) fn backend(err: mongodb::error::Error) -> ModelError {
    ModelError::Backend(err.to_string())
}

/// Downcasts a core session to the driver session it wraps.
pub(crate) fn client_session(
    session: Option<&mut dyn Session>,
) -> ModelResult<Option<&mut ClientSession>> {
    session
        .map(|session| {
            session
                .as_any_mut()
                .downcast_mut::<MongoSession>()
                .map(MongoSession::client_session)
                .ok_or_else(|| ModelError::Session("expected a MongoDB session".to_string()))
        })
        .transpose()
}

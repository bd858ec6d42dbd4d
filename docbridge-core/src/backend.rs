//! Database handle abstraction used by mapped documents.
//!
//! This module defines the minimal capability set a database client must provide for
//! the core to resolve related-collection sequences and to persist dirty fields.
//!
//! # Traits
//!
//! - [`Database`]: hands out [`Collection`] handles by name
//! - [`Collection`]: `find_one`, `find`, `aggregate` and `update_one`
//! - [`Session`]: a type-erased client session / transaction
//! - [`DatabaseBuilder`]: factory trait for creating database handles
//!
//! The traits are async, but the core imposes no threading model of its own: a blocking
//! client can implement them with futures that complete immediately, and cancellation of
//! an in-flight query is left entirely to the implementation.

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;
use std::{any::Any, fmt::Debug};

use crate::error::ModelResult;

/// A single-pass stream of raw documents returned by `find` and `aggregate`.
pub type DocumentCursor = BoxStream<'static, ModelResult<Document>>;

/// The result of a partial update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents matched by the filter.
    pub matched_count: u64,
    /// Number of documents actually changed.
    pub modified_count: u64,
}

impl UpdateOutcome {
    /// Returns `true` when the filter matched exactly one document.
    pub fn matched_one(&self) -> bool {
        self.matched_count == 1
    }
}

/// A client session, optionally carrying an open transaction.
///
/// Sessions are passed through the core untouched; each backend downcasts to its own
/// session type through [`Session::as_any_mut`]:
///
/// ```ignore
/// let session = session.as_any_mut().downcast_mut::<MySession>();
/// ```
pub trait Session: Any + Send {
    /// Returns `true` while a transaction is open on this session.
    fn in_transaction(&self) -> bool;

    /// Returns a mutable reference to the session as a generic `Any` type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A handle to a database that can open collections by name.
///
/// Wrappers hold the handle behind an `Arc`, so implementations should be cheap to
/// share and must be thread-safe.
pub trait Database: Send + Sync + Debug {
    /// Returns a handle to the named collection.
    fn collection(&self, name: &str) -> Box<dyn Collection>;
}

/// A handle to a single collection.
///
/// Every operation accepts an optional session; implementations must run the operation
/// inside that session (and its transaction, if any) when one is given.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Returns the name of this collection.
    fn name(&self) -> &str;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(
        &self,
        filter: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<Option<Document>>;

    /// Returns every document matching `filter`, in the collection's natural order.
    async fn find(
        &self,
        filter: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<DocumentCursor>;

    /// Runs an aggregation pipeline and returns its output documents in order.
    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<DocumentCursor>;

    /// Applies `update` (an update-operator document such as `{"$set": {...}}`) to the
    /// first document matching `filter`.
    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<UpdateOutcome>;
}

#[async_trait]
pub trait DatabaseBuilder {
    type Database: Database;

    async fn build(self) -> ModelResult<Self::Database>;
}

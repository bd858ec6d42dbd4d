//! Lazy sequences of wrapped sub-documents.
//!
//! A [`DocumentSequence`] first drains the elements of an embedded array, already wrapped
//! in memory, and then pulls from a related-collection cursor. Both parts produce the same
//! item type; the sequence is finite and single-pass.

use futures::{
    Stream, StreamExt, TryStreamExt,
    executor::{BlockingStream, block_on_stream},
    stream::{self, BoxStream},
};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tracing::debug;

use crate::{
    backend::{Collection, Database},
    descriptor::SupersetQuery,
    document::{DocumentWrapper, Model},
    error::ModelResult,
};

/// A single-pass stream of `E` wrappers: embedded elements first, then related documents.
///
/// Once exhausted the stream keeps returning `None`; read the attribute again to start over.
pub struct DocumentSequence<E: Model> {
    embedded_len: usize,
    inner: BoxStream<'static, ModelResult<DocumentWrapper<E>>>,
}

impl<E: Model> DocumentSequence<E> {
    pub(crate) fn new(
        embedded: Vec<DocumentWrapper<E>>,
        related: Option<(Box<dyn Collection>, SupersetQuery)>,
        db: Option<Arc<dyn Database>>,
    ) -> Self {
        let embedded_len = embedded.len();
        let head = stream::iter(embedded.into_iter().map(Ok));

        let tail = match related {
            Some((collection, query)) => stream::once(async move {
                match query {
                    SupersetQuery::Find(filter) => {
                        debug!(collection = collection.name(), "issuing superset find");
                        collection.find(filter, None).await
                    }
                    SupersetQuery::Aggregate(pipeline) => {
                        debug!(
                            collection = collection.name(),
                            stages = pipeline.len(),
                            "issuing superset aggregate"
                        );
                        collection.aggregate(pipeline, None).await
                    }
                }
            })
            .try_flatten()
            .map_ok(move |raw| DocumentWrapper::new(raw, db.clone()))
            .boxed(),
            None => stream::empty().boxed(),
        };

        Self {
            embedded_len,
            inner: head.chain(tail).fuse().boxed(),
        }
    }

    /// Number of elements that came from the embedded array.
    pub fn embedded_len(&self) -> usize {
        self.embedded_len
    }

    /// Drains the sequence into a vector, stopping at the first error.
    pub async fn try_collect_all(self) -> ModelResult<Vec<DocumentWrapper<E>>> {
        self.try_collect().await
    }

    /// Turns the sequence into a blocking iterator, for callers driving a blocking client.
    pub fn blocking(self) -> BlockingStream<Self> {
        block_on_stream(self)
    }
}

impl<E: Model> Stream for DocumentSequence<E> {
    type Item = ModelResult<DocumentWrapper<E>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

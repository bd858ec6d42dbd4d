//! Models and the document wrapper.
//!
//! A [`Model`] is a type-level declaration: its [`Schema`], its strictness and its
//! identity field. A [`DocumentWrapper<M>`] is one instance of that model around a raw
//! BSON document. Attribute access dispatches to the schema's descriptor for the name,
//! or, for undeclared names, straight to the raw document (unless the model is strict).
//!
//! Writes are tracked in a dirty set which [`DocumentWrapper::save`] flushes as a single
//! `$set` update.
//!
//! # Example
//!
//! ```ignore
//! struct Profile;
//!
//! impl Model for Profile {
//!     fn schema() -> &'static Schema {
//!         static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
//!             Schema::builder()
//!                 .field("id", Field::named("user_id").transform(transform::to_int))
//!                 .build()
//!                 .expect("valid profile schema")
//!         });
//!         &SCHEMA
//!     }
//! }
//!
//! let mut profile = DocumentWrapper::<Profile>::new(raw, Some(db.clone()));
//! profile.set("id", "5")?;
//! profile.save(db.collection("profiles").as_ref(), None, None).await?;
//! ```

use bson::{Bson, Document, de::deserialize_from_bson, doc};
use serde::de::DeserializeOwned;
use serde_json::{Value, to_value};
use std::{fmt, marker::PhantomData, sync::Arc};
use tracing::{debug, trace};

use crate::{
    backend::{Collection, Database, Session, UpdateOutcome},
    descriptor::Descriptor,
    error::{ModelError, ModelResult},
    schema::Schema,
    sequence::DocumentSequence,
};

/// Type-level declaration of a mapped document kind.
///
/// Everything here is static: descriptors are built once and shared by every
/// [`DocumentWrapper`] of the model, and strictness cannot change per instance.
pub trait Model: Send + Sync + 'static {
    /// When `true`, reading or assigning an undeclared attribute fails instead of
    /// falling through to the raw document.
    const STRICT: bool = false;

    /// Returns the model's descriptor registry.
    fn schema() -> &'static Schema {
        Schema::empty()
    }

    /// Returns the raw field holding the document's identity, used by `save`.
    fn identity_field() -> &'static str {
        "_id"
    }

    /// Returns the model's display name, used in error messages.
    fn model_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Read-only, type-erased view of a wrapped document.
///
/// Superset query builders receive the owning document through this trait.
pub trait Attributes: Send + Sync {
    /// Returns the owning model's display name.
    fn model_name(&self) -> &'static str;

    /// Returns the raw document.
    fn raw(&self) -> &Document;

    /// Resolves an attribute the same way [`DocumentWrapper::get`] does.
    fn get(&self, attribute: &str) -> ModelResult<Bson>;
}

/// Result of [`DocumentWrapper::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing was pending; no update was sent.
    Unchanged,
    /// The pending fields were sent in one update.
    Updated(UpdateOutcome),
}

impl SaveOutcome {
    /// Number of documents the update matched (zero when nothing was sent).
    pub fn matched_count(&self) -> u64 {
        match self {
            SaveOutcome::Unchanged => 0,
            SaveOutcome::Updated(outcome) => outcome.matched_count,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, SaveOutcome::Unchanged)
    }
}

/// A raw document viewed through model `M`.
///
/// The wrapper owns the raw document it was given (it is moved in, not copied) and
/// mutates it in place on writes. The dirty set is not synchronized: a wrapper must not
/// be written from several tasks at once.
pub struct DocumentWrapper<M: Model> {
    raw: Document,
    db: Option<Arc<dyn Database>>,
    dirty: Document,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> DocumentWrapper<M> {
    /// Wraps `raw`, with an optional database handle for related-collection lookups.
    pub fn new(raw: Document, db: Option<Arc<dyn Database>>) -> Self {
        Self {
            raw,
            db,
            dirty: Document::new(),
            _model: PhantomData,
        }
    }

    /// Fetches the first document matching `filter` from `collection` and wraps it.
    pub async fn load(
        db: Arc<dyn Database>,
        collection: &str,
        filter: Document,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<Option<Self>> {
        let found = db.collection(collection).find_one(filter, session).await?;

        Ok(found.map(|raw| Self::new(raw, Some(db))))
    }

    /// Returns the raw document.
    pub fn raw(&self) -> &Document {
        &self.raw
    }

    /// Unwraps the raw document, discarding any pending changes.
    pub fn into_raw(self) -> Document {
        self.raw
    }

    /// Returns the database handle, if one was provided.
    pub fn db(&self) -> Option<&Arc<dyn Database>> {
        self.db.as_ref()
    }

    /// Returns the fields written since construction or the last successful save.
    pub fn dirty(&self) -> &Document {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Returns `true` if the raw document has a field called `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.raw.contains_key(field)
    }

    /// Reads an attribute.
    ///
    /// Declared attributes delegate to their descriptor. Undeclared attributes read the
    /// raw field of the same name, or fail with [`ModelError::UndeclaredAttribute`] on a
    /// strict model.
    pub fn get(&self, attribute: &str) -> ModelResult<Bson> {
        match M::schema().get(attribute) {
            Some(Descriptor::Field(field)) => {
                trace!(model = M::model_name(), attribute, "field read");
                field.read(&self.raw)
            }
            Some(Descriptor::Fallthrough(fallthrough)) => {
                trace!(model = M::model_name(), attribute, "fallthrough read");
                fallthrough.read(&self.raw)
            }
            Some(Descriptor::Sequence(_)) => Err(ModelError::SequenceAttribute {
                attribute: attribute.to_string(),
            }),
            None if M::STRICT => Err(ModelError::UndeclaredAttribute {
                model: M::model_name(),
                attribute: attribute.to_string(),
            }),
            None => self
                .raw
                .get(attribute)
                .cloned()
                .ok_or_else(|| ModelError::missing(attribute, attribute)),
        }
    }

    /// Assigns an attribute.
    ///
    /// Declared fields transform the value, store it and mark it dirty. Undeclared
    /// attributes are stored as-is and marked dirty, or fail with
    /// [`ModelError::UndeclaredAssignment`] on a strict model.
    pub fn set(&mut self, attribute: &str, value: impl Into<Bson>) -> ModelResult<()> {
        match M::schema().get(attribute) {
            Some(Descriptor::Field(field)) => {
                trace!(model = M::model_name(), attribute, "field write");
                field.write(&mut self.raw, &mut self.dirty, value.into())
            }
            Some(Descriptor::Fallthrough(_) | Descriptor::Sequence(_)) => {
                Err(ModelError::ReadOnly {
                    attribute: attribute.to_string(),
                })
            }
            None if M::STRICT => Err(ModelError::UndeclaredAssignment {
                model: M::model_name(),
                attribute: attribute.to_string(),
            }),
            None => {
                let value = value.into();
                self.raw.insert(attribute, value.clone());
                self.dirty.insert(attribute, value);

                Ok(())
            }
        }
    }

    /// Reads a sequence attribute as a lazy stream of `E` wrappers.
    ///
    /// Embedded elements are wrapped immediately and yielded first, in array order.
    /// If a superset query is configured, its shape is checked now, but the query is
    /// only sent once the stream is polled past the last embedded element. No
    /// deduplication happens between the two parts.
    pub fn sequence<E: Model>(&self, attribute: &str) -> ModelResult<DocumentSequence<E>> {
        let sequence = match M::schema().get(attribute) {
            Some(Descriptor::Sequence(sequence)) => sequence,
            Some(_) => {
                return Err(ModelError::NotSequence {
                    attribute: attribute.to_string(),
                });
            }
            None if M::STRICT => {
                return Err(ModelError::UndeclaredAttribute {
                    model: M::model_name(),
                    attribute: attribute.to_string(),
                });
            }
            None => {
                return Err(ModelError::NotSequence {
                    attribute: attribute.to_string(),
                });
            }
        };
        sequence.check_element::<E>()?;

        let embedded = sequence
            .embedded(&self.raw)?
            .into_iter()
            .map(|raw| DocumentWrapper::<E>::new(raw, self.db.clone()))
            .collect::<Vec<_>>();

        let related = match sequence.superset_query(self)? {
            Some((collection, query)) => {
                let db = self.db.as_ref().ok_or_else(|| ModelError::NoDatabase {
                    attribute: attribute.to_string(),
                })?;

                Some((db.collection(collection), query))
            }
            None => None,
        };

        Ok(DocumentSequence::new(embedded, related, self.db.clone()))
    }

    /// Persists the dirty set with a single partial update.
    ///
    /// The match filter is `match_criteria` if given, otherwise `{identity: raw[identity]}`.
    /// With nothing pending, no update is sent and [`SaveOutcome::Unchanged`] is returned.
    /// On success the dirty set is cleared; on failure it is kept. The number of matched
    /// documents is reported but not checked.
    pub async fn save(
        &mut self,
        collection: &dyn Collection,
        match_criteria: Option<Document>,
        session: Option<&mut dyn Session>,
    ) -> ModelResult<SaveOutcome> {
        let filter = match match_criteria {
            Some(criteria) => criteria,
            None => {
                let identity_field = M::identity_field();
                match self.raw.get(identity_field) {
                    Some(id) if *id != Bson::Null => doc! { identity_field: id.clone() },
                    _ => {
                        return Err(ModelError::Save {
                            model: M::model_name(),
                            identity_field,
                        });
                    }
                }
            }
        };

        if self.dirty.is_empty() {
            debug!(
                model = M::model_name(),
                collection = collection.name(),
                "nothing to save"
            );
            return Ok(SaveOutcome::Unchanged);
        }

        debug!(
            model = M::model_name(),
            collection = collection.name(),
            fields = self.dirty.len(),
            "saving dirty fields"
        );

        let outcome = collection
            .update_one(filter, doc! { "$set": self.dirty.clone() }, session)
            .await?;
        self.dirty.clear();

        Ok(SaveOutcome::Updated(outcome))
    }

    /// Deserializes the raw document into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> ModelResult<T> {
        Ok(deserialize_from_bson(Bson::Document(self.raw.clone()))?)
    }

    /// Converts the raw document to JSON.
    pub fn to_json(&self) -> ModelResult<Value> {
        Ok(to_value(&self.raw)?)
    }
}

impl<M: Model> Attributes for DocumentWrapper<M> {
    fn model_name(&self) -> &'static str {
        M::model_name()
    }

    fn raw(&self) -> &Document {
        &self.raw
    }

    fn get(&self, attribute: &str) -> ModelResult<Bson> {
        DocumentWrapper::get(self, attribute)
    }
}

impl<M: Model> Clone for DocumentWrapper<M> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            db: self.db.clone(),
            dirty: self.dirty.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for DocumentWrapper<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(M::model_name())
            .field("raw", &self.raw)
            .field("dirty", &self.dirty)
            .field("db", &self.db.is_some())
            .finish()
    }
}

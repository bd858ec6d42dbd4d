//! Declarative attribute mappings.
//!
//! A descriptor is static configuration attached to a logical attribute name. It decides
//! how that attribute resolves against a raw document:
//!
//! - [`FieldDescriptor`] maps the attribute to one raw field, with an optional [`Transform`]
//! - [`FallthroughDescriptor`] tries several raw field names and returns the first present
//! - [`SequenceDescriptor`] wraps an embedded array of sub-documents, optionally followed by
//!   documents from a related ("superset") collection
//!
//! Descriptors are created once, when a [`Schema`](crate::schema::Schema) is built, and are
//! shared by every wrapper of that model.

use bson::{Bson, Document};
use std::{any::TypeId, fmt, sync::Arc};

use crate::{
    document::{Attributes, Model},
    error::{MappingKind, ModelError, ModelResult},
    transform::{self, Transform},
};

/// Shorthand for declaring a [`FieldDescriptor`].
pub type Field = FieldDescriptor;
/// Shorthand for declaring a [`FallthroughDescriptor`].
pub type Fallthrough = FallthroughDescriptor;
/// Shorthand for declaring a [`SequenceDescriptor`].
pub type Sequence = SequenceDescriptor;

/// Builds the superset query for a sequence attribute from its owning document.
pub type QueryBuilderFn = Arc<dyn Fn(&dyn Attributes) -> ModelResult<Bson> + Send + Sync>;

/// A descriptor bound to an attribute name in a schema.
#[derive(Debug, Clone)]
pub enum Descriptor {
    Field(FieldDescriptor),
    Fallthrough(FallthroughDescriptor),
    Sequence(SequenceDescriptor),
}

impl Descriptor {
    /// Returns the logical attribute name this descriptor is bound to.
    pub fn attribute(&self) -> &str {
        match self {
            Descriptor::Field(d) => &d.attribute,
            Descriptor::Fallthrough(d) => &d.attribute,
            Descriptor::Sequence(d) => &d.attribute,
        }
    }

    pub(crate) fn bind(&mut self, attribute: &str) {
        match self {
            Descriptor::Field(d) => {
                d.attribute = attribute.to_string();
                d.field_name.get_or_insert_with(|| attribute.to_string());
            }
            Descriptor::Fallthrough(d) => d.attribute = attribute.to_string(),
            Descriptor::Sequence(d) => {
                d.attribute = attribute.to_string();
                d.field_name.get_or_insert_with(|| attribute.to_string());
            }
        }
    }
}

impl From<FieldDescriptor> for Descriptor {
    fn from(d: FieldDescriptor) -> Self {
        Descriptor::Field(d)
    }
}

impl From<FallthroughDescriptor> for Descriptor {
    fn from(d: FallthroughDescriptor) -> Self {
        Descriptor::Fallthrough(d)
    }
}

impl From<SequenceDescriptor> for Descriptor {
    fn from(d: SequenceDescriptor) -> Self {
        Descriptor::Sequence(d)
    }
}

/// Maps an attribute to a single raw field, applying a transform on read and write.
///
/// # Example
///
/// ```ignore
/// // `id` reads the raw `user_id` field and converts it to an integer.
/// Field::named("user_id").transform(transform::to_int)
/// ```
#[derive(Clone)]
pub struct FieldDescriptor {
    attribute: String,
    field_name: Option<String>,
    transform: Transform,
}

impl FieldDescriptor {
    /// A field whose raw name is the attribute name, with no transform.
    pub fn new() -> Self {
        Self {
            attribute: String::new(),
            field_name: None,
            transform: Arc::new(transform::identity),
        }
    }

    /// A field mapped to a differently-named raw field.
    pub fn named(field_name: impl Into<String>) -> Self {
        Self {
            field_name: Some(field_name.into()),
            ..Self::new()
        }
    }

    /// Sets the transform applied to values on both read and write.
    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Bson) -> ModelResult<Bson> + Send + Sync + 'static,
    {
        self.transform = Arc::new(transform);
        self
    }

    /// Returns the raw field name.
    pub fn field_name(&self) -> &str {
        self.field_name.as_deref().unwrap_or(&self.attribute)
    }

    /// Looks up the raw field and returns its transformed value.
    pub fn read(&self, raw: &Document) -> ModelResult<Bson> {
        let value = raw
            .get(self.field_name())
            .ok_or_else(|| ModelError::missing(&self.attribute, self.field_name()))?;

        (self.transform)(value.clone())
    }

    /// Transforms `value`, stores it in the raw document and records it as dirty.
    ///
    /// A failing transform leaves both documents untouched.
    pub fn write(&self, raw: &mut Document, dirty: &mut Document, value: Bson) -> ModelResult<()> {
        let transformed = (self.transform)(value)?;

        raw.insert(self.field_name(), transformed.clone());
        dirty.insert(self.field_name(), transformed);

        Ok(())
    }
}

impl Default for FieldDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("attribute", &self.attribute)
            .field("field_name", &self.field_name())
            .finish_non_exhaustive()
    }
}

/// Tries an ordered list of raw field names and returns the value of the first one present.
///
/// Presence, not truthiness, decides: a field holding `null` stops the search.
#[derive(Debug, Clone)]
pub struct FallthroughDescriptor {
    attribute: String,
    field_names: Vec<String>,
}

impl FallthroughDescriptor {
    pub fn new<I, S>(field_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attribute: String::new(),
            field_names: field_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the configured raw field names in lookup order.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn read(&self, raw: &Document) -> ModelResult<Bson> {
        self.field_names
            .iter()
            .find_map(|name| raw.get(name))
            .cloned()
            .ok_or_else(|| ModelError::Mapping {
                attribute: self.attribute.clone(),
                fields: self.field_names.clone(),
                kind: MappingKind::Fallthrough,
            })
    }
}

/// A related-collection query produced by a sequence's query builder.
#[derive(Debug, Clone, PartialEq)]
pub enum SupersetQuery {
    /// A flat filter, run with `find`.
    Find(Document),
    /// An ordered list of stages, run with `aggregate`.
    Aggregate(Vec<Document>),
}

impl SupersetQuery {
    /// Classifies a query builder's output by shape.
    ///
    /// A document is a filter; an array whose elements are all documents is a pipeline.
    /// Anything else is a [`ModelError::QueryShape`].
    pub fn from_bson(attribute: &str, value: Bson) -> ModelResult<Self> {
        let shape_error = |found: String| ModelError::QueryShape {
            attribute: attribute.to_string(),
            found,
        };

        match value {
            Bson::Document(filter) => Ok(SupersetQuery::Find(filter)),
            Bson::Array(stages) => stages
                .into_iter()
                .map(|stage| match stage {
                    Bson::Document(stage) => Ok(stage),
                    other => Err(shape_error(format!(
                        "an array containing a {:?} stage",
                        other.element_type()
                    ))),
                })
                .collect::<ModelResult<Vec<_>>>()
                .map(SupersetQuery::Aggregate),
            other => Err(shape_error(format!("a {:?} value", other.element_type()))),
        }
    }
}

/// Wraps the elements of an embedded array in a model, optionally followed by related
/// documents fetched from another collection.
///
/// # Example
///
/// ```ignore
/// Sequence::of::<Follower>().superset("followers", |profile| {
///     Ok(bson!([
///         { "$match": { "user_id": profile.get("user_id")? } },
///         { "$unwind": "$followers" },
///         { "$replaceRoot": { "newRoot": "$followers" } },
///     ]))
/// })
/// ```
#[derive(Clone)]
pub struct SequenceDescriptor {
    attribute: String,
    field_name: Option<String>,
    element: TypeId,
    element_name: &'static str,
    superset: Option<(String, QueryBuilderFn)>,
}

impl SequenceDescriptor {
    /// A sequence whose elements are wrapped as `E`.
    pub fn of<E: Model>() -> Self {
        Self {
            attribute: String::new(),
            field_name: None,
            element: TypeId::of::<E>(),
            element_name: E::model_name(),
            superset: None,
        }
    }

    /// Maps the sequence to a differently-named raw array field.
    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Appends the results of a query against `collection` after the embedded elements.
    ///
    /// The builder receives the owning document and returns either a filter document
    /// (run with `find`) or an array of pipeline stages (run with `aggregate`).
    pub fn superset<F>(mut self, collection: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&dyn Attributes) -> ModelResult<Bson> + Send + Sync + 'static,
    {
        self.superset = Some((collection.into(), Arc::new(builder)));
        self
    }

    /// Returns the raw array field name.
    pub fn raw_field_name(&self) -> &str {
        self.field_name.as_deref().unwrap_or(&self.attribute)
    }

    /// Returns the related collection name, if a superset query is configured.
    pub fn superset_collection(&self) -> Option<&str> {
        self.superset.as_ref().map(|(collection, _)| collection.as_str())
    }

    pub(crate) fn check_element<E: Model>(&self) -> ModelResult<()> {
        if self.element == TypeId::of::<E>() {
            Ok(())
        } else {
            Err(ModelError::ElementType {
                attribute: self.attribute.clone(),
                expected: self.element_name,
                requested: E::model_name(),
            })
        }
    }

    /// Returns the embedded sub-documents, in array order.
    pub fn embedded(&self, raw: &Document) -> ModelResult<Vec<Document>> {
        let field = self.raw_field_name();
        let items = match raw.get(field) {
            Some(Bson::Array(items)) => items,
            Some(other) => {
                return Err(ModelError::Serialization(format!(
                    "attribute '{}' expected an array in '{field}', found {:?}",
                    self.attribute,
                    other.element_type()
                )));
            }
            None => return Err(ModelError::missing(&self.attribute, field)),
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Bson::Document(doc) => Ok(doc.clone()),
                other => Err(ModelError::Serialization(format!(
                    "attribute '{}' element {index} is a {:?}, not a document",
                    self.attribute,
                    other.element_type()
                ))),
            })
            .collect()
    }

    /// Runs the query builder against the owning document, returning the related
    /// collection and the classified query. `None` when no superset is configured.
    pub fn superset_query(
        &self,
        owner: &dyn Attributes,
    ) -> ModelResult<Option<(&str, SupersetQuery)>> {
        match &self.superset {
            Some((collection, builder)) => Ok(Some((
                collection.as_str(),
                SupersetQuery::from_bson(&self.attribute, builder(owner)?)?,
            ))),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for SequenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceDescriptor")
            .field("attribute", &self.attribute)
            .field("field_name", &self.raw_field_name())
            .field("element", &self.element_name)
            .field("superset_collection", &self.superset_collection())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{bson, doc};

    fn bound<D: Into<Descriptor>>(attribute: &str, descriptor: D) -> Descriptor {
        let mut descriptor = descriptor.into();
        descriptor.bind(attribute);
        descriptor
    }

    #[test]
    fn field_name_defaults_to_attribute() {
        let Descriptor::Field(field) = bound("user_id", Field::new()) else {
            unreachable!()
        };

        assert_eq!(field.field_name(), "user_id");
        assert_eq!(field.read(&doc! { "user_id": "4" }).unwrap(), Bson::String("4".into()));
    }

    #[test]
    fn field_read_applies_transform() {
        let Descriptor::Field(field) =
            bound("id", Field::named("user_id").transform(transform::to_int))
        else {
            unreachable!()
        };

        assert_eq!(field.read(&doc! { "user_id": "4" }).unwrap(), Bson::Int64(4));
    }

    #[test]
    fn field_write_records_transformed_value() {
        let Descriptor::Field(field) =
            bound("id", Field::named("user_id").transform(transform::to_int))
        else {
            unreachable!()
        };
        let mut raw = doc! { "user_id": "4" };
        let mut dirty = Document::new();

        field.write(&mut raw, &mut dirty, Bson::String("7".into())).unwrap();

        assert_eq!(raw, doc! { "user_id": 7_i64 });
        assert_eq!(dirty, doc! { "user_id": 7_i64 });
    }

    #[test]
    fn failing_transform_leaves_documents_untouched() {
        let Descriptor::Field(field) =
            bound("id", Field::named("user_id").transform(transform::to_int))
        else {
            unreachable!()
        };
        let mut raw = doc! { "user_id": "4" };
        let mut dirty = Document::new();

        let err = field
            .write(&mut raw, &mut dirty, Bson::String("seven".into()))
            .unwrap_err();

        assert!(matches!(err, ModelError::Transform(_)));
        assert_eq!(raw, doc! { "user_id": "4" });
        assert!(dirty.is_empty());
    }

    #[test]
    fn fallthrough_stops_at_present_null() {
        let Descriptor::Fallthrough(fallthrough) = bound("a", Fallthrough::new(["a", "b"])) else {
            unreachable!()
        };

        assert_eq!(
            fallthrough.read(&doc! { "a": Bson::Null, "b": "the_b_value" }).unwrap(),
            Bson::Null
        );
        assert_eq!(
            fallthrough.read(&doc! { "b": "the_b_value" }).unwrap(),
            Bson::String("the_b_value".into())
        );
    }

    #[test]
    fn superset_query_classifies_shapes() {
        assert_eq!(
            SupersetQuery::from_bson("followers", bson!({ "user_id": "4" })).unwrap(),
            SupersetQuery::Find(doc! { "user_id": "4" })
        );
        assert_eq!(
            SupersetQuery::from_bson("followers", bson!([{ "$match": {} }, { "$limit": 2 }]))
                .unwrap(),
            SupersetQuery::Aggregate(vec![doc! { "$match": {} }, doc! { "$limit": 2 }])
        );
        assert!(matches!(
            SupersetQuery::from_bson("followers", Bson::String("nope".into())),
            Err(ModelError::QueryShape { .. })
        ));
        assert!(matches!(
            SupersetQuery::from_bson("followers", bson!([{ "$match": {} }, 3])),
            Err(ModelError::QueryShape { .. })
        ));
    }
}

//! Per-model registries of attribute descriptors.
//!
//! A [`Schema`] maps logical attribute names to [`Descriptor`]s. It is built once per model,
//! typically inside a `static LazyLock`, and every wrapper of the model refers to it.

use std::collections::BTreeMap;

use crate::{
    descriptor::{Descriptor, FallthroughDescriptor, FieldDescriptor, SequenceDescriptor},
    error::{ModelError, ModelResult},
};

static EMPTY: Schema = Schema {
    descriptors: BTreeMap::new(),
};

/// An immutable registry of descriptors keyed by attribute name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    descriptors: BTreeMap<String, Descriptor>,
}

impl Schema {
    /// Creates a new schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// The shared schema of models that declare no attributes.
    pub fn empty() -> &'static Schema {
        &EMPTY
    }

    /// Returns the descriptor declared for `attribute`, if any.
    pub fn get(&self, attribute: &str) -> Option<&Descriptor> {
        self.descriptors.get(attribute)
    }

    /// Returns `true` if a descriptor is declared for `attribute`.
    pub fn declares(&self, attribute: &str) -> bool {
        self.descriptors.contains_key(attribute)
    }

    /// Iterates over declared attribute names, in sorted order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Builder for [`Schema`].
///
/// Declaration errors (duplicate attributes, empty fallthrough lists) are collected and
/// reported by [`SchemaBuilder::build`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    descriptors: BTreeMap<String, Descriptor>,
    errors: Vec<String>,
}

impl SchemaBuilder {
    /// Declares a mapped field.
    pub fn field(self, attribute: &str, field: FieldDescriptor) -> Self {
        self.declare(attribute, field)
    }

    /// Declares a fallthrough attribute.
    pub fn fallthrough(self, attribute: &str, fallthrough: FallthroughDescriptor) -> Self {
        if fallthrough.field_names().is_empty() {
            let mut this = self;
            this.errors.push(format!(
                "fallthrough attribute '{attribute}' has no field names"
            ));
            return this;
        }

        self.declare(attribute, fallthrough)
    }

    /// Declares a sequence attribute.
    pub fn sequence(self, attribute: &str, sequence: SequenceDescriptor) -> Self {
        self.declare(attribute, sequence)
    }

    /// Declares any descriptor.
    pub fn declare(mut self, attribute: &str, descriptor: impl Into<Descriptor>) -> Self {
        let mut descriptor = descriptor.into();
        descriptor.bind(attribute);

        if self
            .descriptors
            .insert(attribute.to_string(), descriptor)
            .is_some()
        {
            self.errors
                .push(format!("attribute '{attribute}' is declared more than once"));
        }

        self
    }

    /// Builds the schema, failing if any declaration was invalid.
    pub fn build(self) -> ModelResult<Schema> {
        if !self.errors.is_empty() {
            return Err(ModelError::InvalidSchema(self.errors.join("; ")));
        }

        Ok(Schema {
            descriptors: self.descriptors,
        })
    }
}

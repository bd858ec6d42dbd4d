//! Convenient re-exports of commonly used types from docbridge.
//!
//! ```ignore
//! use docbridge::prelude::*;
//! ```
//!
//! This provides access to:
//! - Models, wrappers and attribute views
//! - Descriptors, schemas and the built-in transforms
//! - Database, collection and session traits
//! - Error types

pub use docbridge_core::{
    backend::{Collection, Database, DatabaseBuilder, DocumentCursor, Session, UpdateOutcome},
    descriptor::{
        Descriptor, Fallthrough, FallthroughDescriptor, Field, FieldDescriptor, Sequence,
        SequenceDescriptor, SupersetQuery,
    },
    document::{Attributes, DocumentWrapper, Model, SaveOutcome},
    error::{MappingKind, ModelError, ModelResult},
    schema::{Schema, SchemaBuilder},
    sequence::DocumentSequence,
    transform::{self, Transform},
};

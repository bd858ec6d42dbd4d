//! Lazily-evaluated, typed attribute access over BSON documents.
//!
//! This crate is the core of the docbridge project and provides:
//!
//! - **Descriptors** ([`descriptor`]) - Declarative field, fallthrough and sequence mappings
//! - **Schemas** ([`schema`]) - Per-model registries of descriptors, built once and shared
//! - **Document wrappers** ([`document`]) - The [`Model`](document::Model) trait and
//!   [`DocumentWrapper`](document::DocumentWrapper), with dirty tracking and partial saves
//! - **Lazy sequences** ([`sequence`]) - Embedded arrays chained with related-collection queries
//! - **Database abstraction** ([`backend`]) - The minimal capability set a database handle must provide
//! - **Transforms** ([`transform`]) - Built-in value conversions for mapped fields
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use std::sync::LazyLock;
//! use docbridge_core::{document::{DocumentWrapper, Model}, schema::Schema, descriptor::{Field, Fallthrough}, transform};
//! use bson::doc;
//!
//! struct Person;
//!
//! impl Model for Person {
//!     fn schema() -> &'static Schema {
//!         static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
//!             Schema::builder()
//!                 .field("version", Field::named("schema_version").transform(transform::to_int))
//!                 .fallthrough("name", Fallthrough::new(["name", "full_name"]))
//!                 .build()
//!                 .expect("valid person schema")
//!         });
//!         &SCHEMA
//!     }
//! }
//!
//! let person = DocumentWrapper::<Person>::new(doc! { "full_name": "Mark Smith", "schema_version": "2" }, None);
//! assert_eq!(person.get("name")?, "Mark Smith".into());
//! assert_eq!(person.get("version")?, 2_i64.into());
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_core;

pub mod backend;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod schema;
pub mod sequence;
pub mod transform;

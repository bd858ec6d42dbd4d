//! Main docbridge crate: typed, lazily-evaluated attribute access over BSON documents.
//!
//! This crate is the primary entry point for users of docbridge. It re-exports the core
//! types from `docbridge-core` and gives access to the available database backends.
//!
//! # Features
//!
//! - **Declarative mappings** - Map attributes to raw fields, with transforms and fallbacks
//! - **Lazy sequences** - Embedded arrays chained with related-collection queries
//! - **Partial saves** - Only the fields written since the last save are sent
//! - **Pluggable backends** - In-memory and MongoDB database handles behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::InMemoryDatabase};
//! use bson::{bson, doc};
//! use std::sync::{Arc, LazyLock};
//!
//! struct Follower;
//!
//! impl Model for Follower {}
//!
//! struct Profile;
//!
//! impl Model for Profile {
//!     fn schema() -> &'static Schema {
//!         static SCHEMA: LazyLock<Schema> = LazyLock::new(|| {
//!             Schema::builder()
//!                 .field("id", Field::named("user_id").transform(transform::to_int))
//!                 .fallthrough("name", Fallthrough::new(["name", "full_name"]))
//!                 .sequence(
//!                     "followers",
//!                     Sequence::of::<Follower>().superset("followers", |profile| {
//!                         Ok(bson!([
//!                             { "$match": { "user_id": profile.raw().get("user_id").cloned() } },
//!                             { "$unwind": "$followers" },
//!                             { "$replaceRoot": { "newRoot": "$followers" } },
//!                         ]))
//!                     }),
//!                 )
//!                 .build()
//!                 .expect("valid profile schema")
//!         });
//!         &SCHEMA
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ModelResult<()> {
//!     let db: Arc<dyn Database> = Arc::new(
//!         InMemoryDatabase::builder()
//!             .seed("profiles", vec![doc! { "user_id": "4", "full_name": "Mark Smith", "followers": [] }])
//!             .build()
//!             .await?,
//!     );
//!
//!     let mut profile = DocumentWrapper::<Profile>::load(db.clone(), "profiles", doc! { "user_id": "4" }, None)
//!         .await?
//!         .expect("profile exists");
//!
//!     println!("{} has id {}", profile.get("name")?, profile.get("id")?);
//!
//!     let followers = profile.sequence::<Follower>("followers")?.try_collect_all().await?;
//!     println!("{} followers", followers.len());
//!
//!     profile.set("id", "5")?;
//!     profile.save(db.collection("profiles").as_ref(), None, None).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory database for development and testing
//! - [`mongodb`] - MongoDB database (requires the `mongodb` feature)


pub mod prelude;

pub use docbridge_core::{backend, descriptor, document, error, schema, sequence, transform};

// Re-export BSON types for convenience
pub use bson;

/// In-memory database backend.
pub mod memory {
    pub use docbridge_memory::{
        InMemoryCollection, InMemoryDatabase, InMemoryDatabaseBuilder, InMemorySession,
    };
}

/// MongoDB database backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbridge_mongodb::{MongoCollection, MongoDatabase, MongoDatabaseBuilder, MongoSession};
}

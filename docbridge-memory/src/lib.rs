//! In-memory database backend for docbridge.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Database` trait.
//! It is meant for development, tests and small embedded uses.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **MongoDB-style filters** - Equality, dotted paths, comparison and logical operators
//! - **Aggregation** - `$match`, `$unwind`, `$replaceRoot`, `$project`, `$sort`, `$skip`, `$limit`, `$count`
//! - **Transactions** - Sessions stage writes until commit
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::InMemoryDatabase};
//! use bson::doc;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ModelResult<()> {
//!     let db = InMemoryDatabase::builder()
//!         .seed("profiles", vec![doc! { "user_id": "4", "followers": [] }])
//!         .build()
//!         .await?;
//!     let db: Arc<dyn Database> = Arc::new(db);
//!
//!     let profile = DocumentWrapper::<Profile>::load(db, "profiles", doc! { "user_id": "4" }, None)
//!         .await?
//!         .expect("profile exists");
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_memory;

pub mod evaluator;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod update;

pub use session::InMemorySession;
pub use store::{InMemoryCollection, InMemoryDatabase, InMemoryDatabaseBuilder};

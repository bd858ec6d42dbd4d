//! MongoDB backend for docbridge.
//!
//! This crate implements the docbridge `Database` trait on top of the official MongoDB
//! driver, so wrapped documents can resolve related collections and save their dirty
//! fields against a real deployment.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docbridge = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docbridge::{backend::DatabaseBuilder, mongodb::MongoDatabase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = MongoDatabase::builder("mongodb://localhost:27017", "why")
//!         .build()
//!         .await?;
//!
//!     let mut session = db.start_session().await?;
//!     session.start_transaction().await?;
//!     // ... writes with Some(&mut session) ...
//!     session.abort_transaction().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_mongodb;

pub mod session;
pub mod store;

pub use session::MongoSession;
pub use store::{MongoCollection, MongoDatabase, MongoDatabaseBuilder};

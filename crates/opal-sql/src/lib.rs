//! # opal-sql
//!
//! SQL front-end and query executor for OpalDB.
//!
//! This crate implements:
//! - SQL parsing (PostgreSQL-compatible, via `sqlparser`)
//! - DNF predicate normalization and per-conjunct index planning
//! - Statement execution over a narrow storage engine interface
//! - An in-memory reference engine
//!
//! The entry point is [`Session`], which owns an engine and turns SQL
//! text into a populated [`SessionResponse`]:
//!
//! ```
//! use opal_sql::Session;
//!
//! let mut session = Session::new();
//! session.execute("CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(32));");
//! session.execute("INSERT INTO users VALUES (1, 'ada');");
//! let response = session.execute("SELECT id, name FROM users;");
//! assert!(!response.failed());
//! assert_eq!(response.column_names, vec!["id", "name"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// SQL statement and predicate lowering
pub mod parser;

/// Storage engine interface and the in-memory reference engine
pub mod storage;

/// Statement dispatch, predicate compilation, result merging
pub mod exec;

mod error;
mod response;
mod session;

pub use error::{Error, Result};
pub use response::SessionResponse;
pub use session::Session;

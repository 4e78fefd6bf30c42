//! SAGE — a declarative data-ingestion and validation engine.
//!
//! Producers ("senders") submit tabular data files against a contract
//! described in YAML configuration documents (a **catalog**, a
//! **package** of catalogs, and a **sender** roster); this crate loads
//! that contract, evaluates submissions against it, and — when the
//! resulting [`finding::Diagnostic`] is clean — routes records into a
//! relational [`sink`].
//!
//! ```text
//! controller::load      -> Schema Loader   (loader)
//! controller::validate  -> Sender Gate     (gate)
//!                        -> File Reader    (reader)
//!                        -> Validator      (validator, expr)
//! controller::process   -> as validate, + Sink (sink)
//! ```
//!
//! The `sage` binary (`src/bin/sage.rs`) exposes `validate-yaml`,
//! `process-package` and `validate-sender` over this same API.

pub mod controller;
pub mod expr;
pub mod finding;
pub mod gate;
pub mod loader;
pub mod model;
pub mod reader;
pub mod sink;
pub mod validator;

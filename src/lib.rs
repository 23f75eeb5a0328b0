//! `json_schema` is a JSON Schema validation engine supporting drafts 6,
//! 7, 2019-09, and 2020-12, with full reference resolution (including
//! `$recursiveRef` and `$dynamicRef`), a shared schema registry, and the
//! four standard output formats.
//!
//! # Validating data
//!
//! The most common use-case for this crate is checking that some JSON
//! input is really valid against a schema. Here's how you'd achieve that
//! use-case:
//!
//! ```
//! use serde_json::json;
//! use json_schema::{Draft, Registry, Schema, Validator};
//! use failure::Error;
//!
//! fn main() -> Result<(), Error> {
//!     let schema = Schema::parse(&json!({
//!         "type": "object",
//!         "properties": {
//!             "name": { "type": "string" },
//!             "age": { "type": "number" },
//!             "phones": {
//!                 "type": "array",
//!                 "items": { "type": "string" }
//!             }
//!         },
//!         "required": ["name"]
//!     }), Draft::Draft202012)?;
//!
//!     let registry = Registry::new();
//!     let validator = Validator::new(&registry);
//!
//!     let good = validator.validate(&schema, &json!({
//!         "name": "John Doe",
//!         "age": 43,
//!         "phones": ["+44 1234567", "+44 2345678"]
//!     }))?;
//!     assert!(good.is_valid());
//!
//!     let bad = validator.validate(&schema, &json!({
//!         "age": "43",
//!         "phones": ["+44 1234567", 442345678]
//!     }))?;
//!     assert!(!bad.is_valid());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Cross-document references
//!
//! Schemas refer to one another by URI. Register each document in a
//! [`Registry`](registry/struct.Registry.html) and references resolve
//! across them; a fetch hook can be installed for URIs that should be
//! loaded on demand. The registry is safe to share between threads, and
//! each `validate` call owns all of its evaluation state.
//!
//! # Output formats
//!
//! Every validation produces a complete evaluation tree. The
//! [`Evaluation`](validator/struct.Evaluation.html) you get back shapes
//! it into `flag`, `basic`, `detailed`, or `verbose` form, with the
//! standard `keywordLocation` / `absoluteKeywordLocation` /
//! `instanceLocation` fields at every node.

mod catalog;
mod number;
mod resolver;
mod vm;

pub mod context;
pub mod draft;
pub mod errors;
pub mod format;
pub mod keywords;
pub mod output;
pub mod pointer;
pub mod registry;
pub mod schema;
pub mod uri;
pub mod validator;

pub use crate::catalog::Descriptor;
pub use crate::draft::Draft;
pub use crate::errors::SchemaError;
pub use crate::format::Format;
pub use crate::output::{OutputFormat, OutputUnit};
pub use crate::pointer::{Pointer, RelativePointer};
pub use crate::registry::Registry;
pub use crate::schema::Schema;
pub use crate::validator::{Evaluation, Options, Validator};

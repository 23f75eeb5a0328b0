//! Validate instances against schemas.
//!
//! This module contains the public entry point for *validation*, the
//! process of taking a piece of input data (called an "instance") and
//! checking it against a schema, producing an [`Evaluation`] whose output
//! tree can be shaped into any of the four output formats.

use crate::context::Context;
use crate::draft::Draft;
use crate::output::{self, OutputFormat, OutputUnit};
use crate::pointer::Pointer;
use crate::registry::{Document, Registry};
use crate::schema::Schema;
use crate::vm;
use failure::Error;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Validates instances against schemas held in a [`Registry`].
pub struct Validator<'a> {
    registry: &'a Registry,
    options: Options,
}

impl<'a> Validator<'a> {
    /// Constructs a new validator using the default options.
    pub fn new(registry: &'a Registry) -> Validator<'a> {
        Validator::new_with_options(registry, Options::default())
    }

    /// Constructs a new validator using the given options.
    pub fn new_with_options(registry: &'a Registry, options: Options) -> Validator<'a> {
        Validator { registry, options }
    }

    /// Validate an instance against a schema.
    ///
    /// The schema does not have to be registered: its anchors and
    /// fragment references resolve against a private view, and only
    /// references to *other* documents go through the registry. Ordinary
    /// assertion failures are data in the returned [`Evaluation`]; a Rust
    /// error means the evaluation itself could not finish (a reference
    /// budget ran out, or the schema's identifiers are unresolvable).
    pub fn validate(&self, schema: &Schema, instance: &Value) -> Result<Evaluation, Error> {
        let doc = Arc::new(Document::from_schema(
            None,
            schema.clone(),
            None,
            self.options.default_draft,
        )?);

        let root = vm::run(
            &self.options,
            self.registry,
            &doc,
            &Pointer::root(),
            instance,
        )?;

        Ok(Evaluation {
            root,
            format: self.options.output_format,
        })
    }

    /// Validate an instance against the schema registered under `uri`,
    /// fetching it first if a fetch hook is configured.
    pub fn validate_uri(&self, uri: &Url, instance: &Value) -> Result<Evaluation, Error> {
        let (doc, location) = self.registry.get(uri)?;
        let root = vm::run(&self.options, self.registry, &doc, &location, instance)?;

        Ok(Evaluation {
            root,
            format: self.options.output_format,
        })
    }
}

/// Options for how validation should proceed.
#[derive(Clone, Debug)]
pub struct Options {
    pub(crate) default_draft: Draft,
    pub(crate) output_format: OutputFormat,
    pub(crate) strict_format: bool,
    pub(crate) strict_types: bool,
    pub(crate) require_format_validation: bool,
    pub(crate) max_reference_depth: usize,
}

impl Options {
    /// Create a new, default `Options`.
    pub fn new() -> Options {
        Options::default()
    }

    /// The draft assumed for schemas that carry no `$schema`. Defaults to
    /// draft 2020-12.
    pub fn default_draft(&mut self, draft: Draft) -> &mut Options {
        self.default_draft = draft;
        self
    }

    /// The output format [`Evaluation::output`] produces. Defaults to
    /// `flag`.
    pub fn output_format(&mut self, format: OutputFormat) -> &mut Options {
        self.output_format = format;
        self
    }

    /// Strict format evaluation: format assertions are enforced and an
    /// unknown format name fails validation instead of being ignored.
    pub fn strict_format(&mut self, strict: bool) -> &mut Options {
        self.strict_format = strict;
        self
    }

    /// Enforce format assertions for known formats without making
    /// unknown format names an error.
    pub fn require_format_validation(&mut self, require: bool) -> &mut Options {
        self.require_format_validation = require;
        self
    }

    /// Strict type checking: `integer` only accepts integral JSON
    /// representations, so `1.0` stops counting as an integer.
    pub fn strict_types(&mut self, strict: bool) -> &mut Options {
        self.strict_types = strict;
        self
    }

    /// Sets the maximum number of reference hops a single evaluation may
    /// be inside of at once. The default is to follow 32 cross-references
    /// before aborting.
    ///
    /// When evaluation is aborted because of this maximum depth,
    /// validation *fails* with an error; no evaluation is returned. This
    /// exists to keep pathological reference chains from running away.
    pub fn max_reference_depth(&mut self, max_depth: usize) -> &mut Options {
        self.max_reference_depth = max_depth;
        self
    }
}

impl Default for Options {
    fn default() -> Options {
        Options {
            default_draft: Draft::default(),
            output_format: OutputFormat::Flag,
            strict_format: false,
            strict_types: false,
            require_format_validation: false,
            max_reference_depth: 32,
        }
    }
}

/// The result of one validation call: validity plus the evaluation tree
/// behind it.
///
/// Note that an `Evaluation` holding failures is the *successful* result
/// of running `validate`; assertion failures are not Rust errors.
pub struct Evaluation {
    root: Context,
    format: OutputFormat,
}

impl Evaluation {
    pub fn is_valid(&self) -> bool {
        self.root.valid
    }

    /// The first failure message, when invalid.
    pub fn error(&self) -> Option<&str> {
        self.root.error.as_deref()
    }

    /// The output tree in the configured format.
    pub fn output(&self) -> OutputUnit {
        self.output_with(self.format)
    }

    /// The output tree in an explicit format.
    pub fn output_with(&self, format: OutputFormat) -> OutputUnit {
        output::format(&self.root, format)
    }

    /// The raw evaluation tree, for callers that want to walk it
    /// themselves.
    pub fn tree(&self) -> &Context {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Schema {
        Schema::parse(&value, Draft::default()).unwrap()
    }

    #[test]
    fn reference_cycle_fails_the_branch() -> Result<(), Error> {
        let registry = Registry::new();
        let validator = Validator::new(&registry);

        let evaluation = validator.validate(
            &parse(json!({
                "$defs": {
                    "a": { "$ref": "#/$defs/a" },
                },
                "$ref": "#/$defs/a",
            })),
            &json!({}),
        )?;

        assert!(!evaluation.is_valid());
        assert!(evaluation.error().unwrap().contains("cycle"));

        Ok(())
    }

    #[test]
    fn max_reference_depth_is_terminal() -> Result<(), Error> {
        let mut options = Options::new();
        options.max_reference_depth(2);

        let registry = Registry::new();
        let validator = Validator::new_with_options(&registry, options);

        // Three hops deep, but not cyclic.
        let schema = parse(json!({
            "$defs": {
                "a": { "$ref": "#/$defs/b" },
                "b": { "$ref": "#/$defs/c" },
                "c": { "type": "string" },
            },
            "$ref": "#/$defs/a",
        }));

        assert!(validator.validate(&schema, &json!("deep")).is_err());

        Ok(())
    }

    #[test]
    fn output_format_flows_from_options() -> Result<(), Error> {
        let mut options = Options::new();
        options.output_format(OutputFormat::Verbose);

        let registry = Registry::new();
        let validator = Validator::new_with_options(&registry, options);
        let evaluation = validator.validate(&parse(json!({"type": "string"})), &json!(3))?;

        assert!(!evaluation.is_valid());
        let verbose = evaluation.output();
        assert_eq!(verbose.errors.len(), 1);

        let flag = evaluation.output_with(OutputFormat::Flag);
        assert_eq!(flag.valid, verbose.valid);

        Ok(())
    }
}

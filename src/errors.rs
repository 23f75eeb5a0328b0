//! An error type for all schema-related operations.

use failure::Fail;

/// An enum of possible errors that can emerge from this crate.
///
/// Every variant is a *structured* error kind; the `Display` implementation
/// is the human-readable message that validation output carries. Ordinary
/// assertion failures (wrong type, out of range, and so on) are not Rust
/// errors at all -- they are data inside an
/// [`Evaluation`](../validator/struct.Evaluation.html).
#[derive(Debug, Fail, PartialEq)]
pub enum SchemaError {
    /// A schema document could not be parsed.
    ///
    /// Raised during schema construction when a keyword's payload violates
    /// its structural constraint, for example a non-numeric `minimum` or a
    /// `pattern` that does not compile.
    #[fail(display = "invalid schema at {}: {}", location, message)]
    Parse { location: String, message: String },

    /// A reference names a URI that is not in the registry and could not be
    /// fetched.
    #[fail(display = "unresolved reference: {}", uri)]
    UnresolvedReference { uri: String },

    /// A reference fragment names an anchor that the target document does
    /// not declare.
    #[fail(display = "no anchor {:?} in {}", anchor, uri)]
    MissingAnchor { uri: String, anchor: String },

    /// A reference fragment is a JSON Pointer that does not land on a
    /// schema within the target document.
    #[fail(display = "pointer {} does not resolve within {}", pointer, uri)]
    DanglingPointer { uri: String, pointer: String },

    /// The same `(schema, instance location)` pair was entered twice while
    /// following references.
    #[fail(display = "reference cycle detected at {}", location)]
    ReferenceCycle { location: String },

    /// A schema was registered under a URI already mapped to a different
    /// schema.
    #[fail(display = "duplicate schema id: {}", uri)]
    DuplicateId { uri: String },

    /// A schema attempts to refer to something relative to its base URI,
    /// but neither it nor any enclosing schema has one.
    ///
    /// References resolve using the usual rules for URIs, where the `$id`
    /// of the enclosing schema resource is the base URI. Without a base,
    /// only fragment-only or absolute references are meaningful.
    #[fail(display = "relative reference in an anonymous schema")]
    RelativeRefFromAnonymousSchema,

    /// A `$schema` value does not name a draft this crate understands.
    #[fail(display = "unknown meta-schema: {}", uri)]
    UnknownDraft { uri: String },

    /// A root `$vocabulary` entry marked required names a vocabulary the
    /// keyword catalog does not know.
    #[fail(display = "unknown required vocabulary: {}", uri)]
    UnknownVocabulary { uri: String },

    /// A `format` value has no registered predicate.
    ///
    /// Only surfaced when strict format evaluation is enabled; otherwise an
    /// unknown format simply produces no assertion.
    #[fail(display = "unknown format: {:?}", name)]
    UnknownFormat { name: String },

    /// A JSON Pointer or Relative JSON Pointer string is malformed.
    #[fail(display = "malformed pointer: {:?}", pointer)]
    InvalidPointer { pointer: String },

    /// A URI reference could not be parsed or resolved.
    #[fail(display = "invalid uri reference: {:?}", uri)]
    InvalidUri { uri: String },

    /// The maximum reference depth was exceeded during evaluation.
    ///
    /// This likely means that your configured `max_reference_depth` is too
    /// small, or that there is an infinite cyclical definition in your
    /// schemas. Terminal for the whole validation call.
    #[fail(display = "maximum reference depth exceeded during validation")]
    MaxDepthExceeded,
}

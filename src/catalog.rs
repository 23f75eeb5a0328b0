//! The keyword catalog: descriptors for every keyword the engine knows.
//!
//! A descriptor carries the metadata the engine needs before it ever looks
//! at a payload: which drafts the keyword exists in, which vocabulary it
//! belongs to, its evaluation priority, and whether it produces
//! annotations. Lookup is by `(name, active draft)`; the same name may
//! appear more than once with disjoint draft sets (`items` changes shape
//! in 2020-12).

use crate::draft::{Draft, DraftSet};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Metadata for one keyword in one range of drafts.
#[derive(Debug)]
pub struct Descriptor {
    pub name: &'static str,
    pub drafts: DraftSet,
    pub vocabulary: &'static str,
    /// Evaluation order within a schema object, ascending. Identity and
    /// reference keywords come first, applicators before the annotation
    /// consumers, `unevaluated*` last.
    pub priority: u8,
    pub produces_annotations: bool,
}

const fn descriptor(
    name: &'static str,
    drafts: DraftSet,
    vocabulary: &'static str,
    priority: u8,
    produces_annotations: bool,
) -> Descriptor {
    Descriptor {
        name,
        drafts,
        vocabulary,
        priority,
        produces_annotations,
    }
}

const ALL: DraftSet = DraftSet::ALL;

pub static DESCRIPTORS: &[Descriptor] = &[
    // Structure; never evaluated directly.
    descriptor("$defs", DraftSet::since(Draft::Draft201909), "core", 0, false),
    descriptor("definitions", ALL, "core", 0, false),
    // References.
    descriptor("$ref", ALL, "core", 8, false),
    descriptor("$recursiveRef", DraftSet::only(Draft::Draft201909), "core", 9, false),
    descriptor("$dynamicRef", DraftSet::only(Draft::Draft202012), "core", 9, false),
    // In-place assertions.
    descriptor("type", ALL, "validation", 16, false),
    descriptor("enum", ALL, "validation", 17, false),
    descriptor("const", ALL, "validation", 17, false),
    descriptor("multipleOf", ALL, "validation", 20, false),
    descriptor("maximum", ALL, "validation", 20, false),
    descriptor("exclusiveMaximum", ALL, "validation", 20, false),
    descriptor("minimum", ALL, "validation", 20, false),
    descriptor("exclusiveMinimum", ALL, "validation", 20, false),
    descriptor("maxLength", ALL, "validation", 24, false),
    descriptor("minLength", ALL, "validation", 24, false),
    descriptor("pattern", ALL, "validation", 24, false),
    descriptor("format", ALL, "format-annotation", 24, true),
    descriptor("contentEncoding", DraftSet::since(Draft::Draft7), "content", 24, true),
    descriptor("contentMediaType", DraftSet::since(Draft::Draft7), "content", 24, true),
    descriptor("maxProperties", ALL, "validation", 28, false),
    descriptor("minProperties", ALL, "validation", 28, false),
    descriptor("required", ALL, "validation", 28, false),
    descriptor(
        "dependentRequired",
        DraftSet::since(Draft::Draft201909),
        "validation",
        28,
        false,
    ),
    descriptor("maxItems", ALL, "validation", 30, false),
    descriptor("minItems", ALL, "validation", 30, false),
    descriptor("uniqueItems", ALL, "validation", 30, false),
    // Applicators.
    descriptor("properties", ALL, "applicator", 40, true),
    descriptor("patternProperties", ALL, "applicator", 41, true),
    descriptor("additionalProperties", ALL, "applicator", 42, true),
    descriptor("propertyNames", ALL, "applicator", 43, false),
    descriptor("prefixItems", DraftSet::only(Draft::Draft202012), "applicator", 44, true),
    descriptor("items", DraftSet::until(Draft::Draft201909), "applicator", 45, true),
    descriptor("items", DraftSet::only(Draft::Draft202012), "applicator", 45, true),
    descriptor(
        "additionalItems",
        DraftSet::until(Draft::Draft201909),
        "applicator",
        46,
        true,
    ),
    descriptor("contains", ALL, "applicator", 47, true),
    // Assertions over the contains annotation; evaluated inside contains.
    descriptor("maxContains", DraftSet::since(Draft::Draft201909), "validation", 48, false),
    descriptor("minContains", DraftSet::since(Draft::Draft201909), "validation", 48, false),
    descriptor(
        "dependentSchemas",
        DraftSet::since(Draft::Draft201909),
        "applicator",
        50,
        false,
    ),
    descriptor("dependencies", DraftSet::until(Draft::Draft7), "applicator", 50, false),
    descriptor("if", DraftSet::since(Draft::Draft7), "applicator", 56, false),
    descriptor("then", DraftSet::since(Draft::Draft7), "applicator", 57, false),
    descriptor("else", DraftSet::since(Draft::Draft7), "applicator", 58, false),
    descriptor("allOf", ALL, "applicator", 60, false),
    descriptor("anyOf", ALL, "applicator", 61, false),
    descriptor("oneOf", ALL, "applicator", 62, false),
    descriptor("not", ALL, "applicator", 63, false),
    // Pure annotations.
    descriptor("title", ALL, "meta-data", 70, true),
    descriptor("description", ALL, "meta-data", 70, true),
    descriptor("default", ALL, "meta-data", 70, true),
    descriptor("examples", ALL, "meta-data", 70, true),
    descriptor("deprecated", DraftSet::since(Draft::Draft201909), "meta-data", 70, true),
    descriptor("readOnly", DraftSet::since(Draft::Draft7), "meta-data", 70, true),
    descriptor("writeOnly", DraftSet::since(Draft::Draft7), "meta-data", 70, true),
    // Annotation consumers; always last.
    descriptor(
        "unevaluatedItems",
        DraftSet::since(Draft::Draft201909),
        "unevaluated",
        80,
        true,
    ),
    descriptor(
        "unevaluatedProperties",
        DraftSet::since(Draft::Draft201909),
        "unevaluated",
        81,
        true,
    ),
];

lazy_static! {
    static ref BY_NAME: HashMap<&'static str, Vec<&'static Descriptor>> = {
        let mut index: HashMap<&'static str, Vec<&'static Descriptor>> = HashMap::new();
        for descriptor in DESCRIPTORS {
            index.entry(descriptor.name).or_default().push(descriptor);
        }
        index
    };
}

/// Find the descriptor for `name` under the active draft.
pub fn lookup(name: &str, draft: Draft) -> Option<&'static Descriptor> {
    BY_NAME
        .get(name)?
        .iter()
        .copied()
        .find(|descriptor| descriptor.drafts.contains(draft))
}

/// The vocabulary short names the catalog implements, as they appear at
/// the tail of official vocabulary URIs.
pub const KNOWN_VOCABULARIES: &[&str] = &[
    "core",
    "applicator",
    "unevaluated",
    "validation",
    "meta-data",
    "format-annotation",
    "format-assertion",
    "content",
];

/// Whether a `$vocabulary` URI names a vocabulary the catalog can honor.
pub fn knows_vocabulary(uri: &str) -> bool {
    match uri.rsplit('/').next() {
        Some(tail) => KNOWN_VOCABULARIES.contains(&tail),
        None => false,
    }
}

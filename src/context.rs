//! Per-invocation validation state.
//!
//! Every schema node, keyword, and subschema application gets a context of
//! its own, forming the evaluation tree that output formatting walks
//! later. A child context is derived from its parent and committed back
//! on completion; annotations merge upward only from valid children, so a
//! failing branch never contaminates its parent.

use crate::pointer::Pointer;
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// An annotation produced by a keyword: who said it, where, about what.
#[derive(Clone, Debug)]
pub struct Annotation {
    pub keyword: String,
    pub keyword_location: Pointer,
    pub absolute_location: Option<String>,
    pub instance_location: Pointer,
    pub value: Value,
}

/// A node in the evaluation tree.
#[derive(Debug)]
pub struct Context {
    /// Where in the instance this node is looking.
    pub instance_location: Pointer,
    /// The evaluation path: the chain of keyword applications from the
    /// root, including every `$ref` hop.
    pub keyword_location: Pointer,
    /// Base URI of the schema resource this node sits in.
    pub base_uri: Option<Url>,
    /// Location within that resource, for the absolute keyword location.
    pub schema_location: Pointer,
    pub valid: bool,
    pub error: Option<String>,
    /// The annotation value produced at this node, if any.
    pub annotation: Option<Value>,
    /// All annotations visible at this node: its own plus those merged
    /// up from valid children. `unevaluated*` consults this union.
    pub annotations: Vec<Annotation>,
    pub children: Vec<Context>,
}

/// Which array indices the visible annotations say have been evaluated.
#[derive(Debug, Default)]
pub struct ItemCoverage {
    pub all: bool,
    pub upto: Option<u64>,
    pub indices: HashSet<u64>,
}

impl ItemCoverage {
    pub fn covers(&self, index: u64) -> bool {
        self.all || self.upto.map(|max| index <= max).unwrap_or(false)
            || self.indices.contains(&index)
    }
}

const EVALUATED_PROPERTY_KEYWORDS: &[&str] = &[
    "properties",
    "patternProperties",
    "additionalProperties",
    "unevaluatedProperties",
];

impl Context {
    pub fn new_root(base_uri: Option<Url>, schema_location: Pointer) -> Context {
        Context {
            instance_location: Pointer::root(),
            keyword_location: Pointer::root(),
            base_uri,
            schema_location,
            valid: true,
            error: None,
            annotation: None,
            annotations: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Derive a child context. `keyword_tokens` extend both the
    /// evaluation path and the schema location; `instance_tokens` extend
    /// the instance location.
    pub fn derive(&self, keyword_tokens: &[&str], instance_tokens: &[&str]) -> Context {
        let mut keyword_location = self.keyword_location.clone();
        let mut schema_location = self.schema_location.clone();
        for token in keyword_tokens {
            keyword_location.push(*token);
            schema_location.push(*token);
        }

        let mut instance_location = self.instance_location.clone();
        for token in instance_tokens {
            instance_location.push(*token);
        }

        Context {
            instance_location,
            keyword_location,
            base_uri: self.base_uri.clone(),
            schema_location,
            valid: true,
            error: None,
            annotation: None,
            annotations: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Derive a child for evaluation on the far side of a reference: same
    /// evaluation path and instance location, new schema identity.
    pub fn derive_remote(&self, base_uri: Option<Url>, schema_location: Pointer) -> Context {
        Context {
            instance_location: self.instance_location.clone(),
            keyword_location: self.keyword_location.clone(),
            base_uri,
            schema_location,
            valid: true,
            error: None,
            annotation: None,
            annotations: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Mark this node invalid. The first message wins; later failures at
    /// the same node are already visible in the children.
    pub fn fail<S: Into<String>>(&mut self, message: S) {
        self.valid = false;
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }

    /// Produce an annotation at this node.
    pub fn annotate(&mut self, keyword: &str, value: Value) {
        self.annotation = Some(value.clone());
        self.annotations.push(Annotation {
            keyword: keyword.to_owned(),
            keyword_location: self.keyword_location.clone(),
            absolute_location: self.absolute_location(),
            instance_location: self.instance_location.clone(),
            value,
        });
    }

    /// Attach a completed child. Annotations merge up only when the child
    /// is valid; the child itself is kept either way for output.
    pub fn push_child(&mut self, child: Context) -> bool {
        let valid = child.valid;
        if valid {
            self.annotations.extend(child.annotations.iter().cloned());
        }
        self.children.push(child);

        valid
    }

    /// Attach a completed child without merging its annotations, for
    /// keywords like `not` that discard nested annotations outright.
    pub fn push_child_silent(&mut self, child: Context) -> bool {
        let valid = child.valid;
        self.children.push(child);

        valid
    }

    /// Attach an asserting child: an invalid child makes this node
    /// invalid too.
    pub fn apply_child(&mut self, child: Context) {
        let error = child.error.clone();
        if !self.push_child(child) {
            self.valid = false;
            if self.error.is_none() {
                self.error = error;
            }
        }
    }

    /// `base#pointer` form of the schema location, when a base is known.
    pub fn absolute_location(&self) -> Option<String> {
        self.base_uri
            .as_ref()
            .map(|base| format!("{}#{}", base, self.schema_location))
    }

    /// The union of evaluated property names visible at this node's
    /// instance location.
    pub fn evaluated_properties(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        for annotation in &self.annotations {
            if annotation.instance_location != self.instance_location {
                continue;
            }
            if !EVALUATED_PROPERTY_KEYWORDS.contains(&annotation.keyword.as_str()) {
                continue;
            }
            if let Value::Array(list) = &annotation.value {
                for name in list {
                    if let Some(name) = name.as_str() {
                        names.insert(name.to_owned());
                    }
                }
            }
        }

        names
    }

    /// The union of evaluated array indices visible at this node's
    /// instance location.
    pub fn evaluated_items(&self) -> ItemCoverage {
        let mut coverage = ItemCoverage::default();
        for annotation in &self.annotations {
            if annotation.instance_location != self.instance_location {
                continue;
            }

            match annotation.keyword.as_str() {
                "items" | "prefixItems" | "additionalItems" | "unevaluatedItems" => {
                    match &annotation.value {
                        Value::Bool(true) => coverage.all = true,
                        Value::Number(n) => {
                            if let Some(index) = n.as_u64() {
                                coverage.upto =
                                    Some(coverage.upto.map_or(index, |max| max.max(index)));
                            }
                        }
                        _ => {}
                    }
                }
                "contains" => {
                    if let Value::Array(list) = &annotation.value {
                        for index in list {
                            if let Some(index) = index.as_u64() {
                                coverage.indices.insert(index);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        coverage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derivation_extends_locations() {
        let root = Context::new_root(None, Pointer::root());
        let child = root.derive(&["properties", "a"], &["a"]);
        assert_eq!(child.keyword_location.to_string(), "/properties/a");
        assert_eq!(child.schema_location.to_string(), "/properties/a");
        assert_eq!(child.instance_location.to_string(), "/a");

        let remote = child.derive_remote(
            Some("https://example.com/s".parse().unwrap()),
            Pointer::parse("/$defs/x").unwrap(),
        );
        assert_eq!(remote.keyword_location.to_string(), "/properties/a");
        assert_eq!(
            remote.absolute_location().unwrap(),
            "https://example.com/s#/$defs/x"
        );
    }

    #[test]
    fn failed_children_do_not_leak_annotations() {
        let mut parent = Context::new_root(None, Pointer::root());

        let mut good = parent.derive(&["properties"], &[]);
        good.annotate("properties", json!(["a"]));
        parent.apply_child(good);

        let mut bad = parent.derive(&["patternProperties"], &[]);
        bad.annotate("patternProperties", json!(["b"]));
        bad.fail("nope");
        parent.apply_child(bad);

        assert!(!parent.valid);
        assert_eq!(parent.children.len(), 2);
        let evaluated = parent.evaluated_properties();
        assert!(evaluated.contains("a"));
        assert!(!evaluated.contains("b"));
    }

    #[test]
    fn item_coverage_union() {
        let mut parent = Context::new_root(None, Pointer::root());

        let mut prefix = parent.derive(&["prefixItems"], &[]);
        prefix.annotate("prefixItems", json!(1));
        parent.apply_child(prefix);

        let mut contains = parent.derive(&["contains"], &[]);
        contains.annotate("contains", json!([4]));
        parent.apply_child(contains);

        let coverage = parent.evaluated_items();
        assert!(coverage.covers(0));
        assert!(coverage.covers(1));
        assert!(!coverage.covers(2));
        assert!(coverage.covers(4));

        let mut rest = parent.derive(&["items"], &[]);
        rest.annotate("items", json!(true));
        parent.apply_child(rest);
        assert!(parent.evaluated_items().covers(2));
    }

    #[test]
    fn annotations_at_other_locations_are_ignored() {
        let mut parent = Context::new_root(None, Pointer::root());
        let mut nested = parent.derive(&["properties", "a"], &["a"]);
        let mut inner = nested.derive(&["properties"], &[]);
        inner.annotate("properties", json!(["deep"]));
        nested.apply_child(inner);
        parent.apply_child(nested);

        // The deep "properties" annotation talks about /a, not the root.
        assert!(parent.evaluated_properties().is_empty());
    }
}

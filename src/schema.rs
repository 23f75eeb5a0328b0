//! The in-memory schema model.
//!
//! A schema is either a boolean or an ordered set of keyword instances.
//! Parsing walks a JSON value, converts every recognized property through
//! the keyword catalog, and keeps unrecognized properties around in an
//! "unknown keywords" bag. The keyword order of an object schema is the
//! catalog's priority order, with source order breaking ties.

use crate::catalog;
use crate::draft::Draft;
use crate::errors::SchemaError;
use crate::keywords::{self, KeywordInstance};
use crate::pointer::Pointer;
use failure::Error;
use serde_json::{Map, Value};

/// A parsed schema: `true`, `false`, or an object schema.
#[derive(Clone, Debug)]
pub enum Schema {
    Bool(bool),
    Object(Box<SchemaObject>),
}

impl Schema {
    /// Parse a schema from a JSON value.
    ///
    /// `default_draft` applies at the document root when no `$schema` is
    /// present; nested schemas inherit the draft of their enclosing schema
    /// unless they redeclare `$schema`.
    pub fn parse(value: &Value, default_draft: Draft) -> Result<Schema, Error> {
        let mut ctx = ParseCtx {
            draft: default_draft,
            location: Pointer::root(),
        };

        parse_value(value, &mut ctx, true)
    }

    pub fn as_object(&self) -> Option<&SchemaObject> {
        match self {
            Schema::Object(object) => Some(object),
            Schema::Bool(_) => None,
        }
    }

    /// Navigate the schema tree by JSON Pointer tokens.
    ///
    /// Descends through keyword payloads (`/$defs/x`, `/properties/a`,
    /// `/allOf/0`, ...). Returns `None` when the path does not land on a
    /// schema.
    pub fn at_pointer(&self, tokens: &[String]) -> Option<&Schema> {
        if tokens.is_empty() {
            return Some(self);
        }

        match self {
            Schema::Bool(_) => None,
            Schema::Object(object) => object.descend(tokens),
        }
    }
}

/// An object schema: identity data plus ordered keyword instances.
#[derive(Clone, Debug)]
pub struct SchemaObject {
    pub draft: Draft,
    /// `$id` (or pre-2019 `id`), exactly as written; resolution against
    /// the enclosing base happens at registration and evaluation time.
    pub id: Option<String>,
    pub anchor: Option<String>,
    pub dynamic_anchor: Option<String>,
    pub recursive_anchor: bool,
    /// Root-only `$vocabulary` entries as `(uri, required)` pairs.
    pub vocabulary: Option<Vec<(String, bool)>>,
    pub comment: Option<String>,
    /// Keyword instances in evaluation order.
    pub keywords: Vec<KeywordInstance>,
    /// Properties that are not keywords in the active draft.
    pub unknown: Vec<(String, Value)>,
    /// Dynamic anchor names declared anywhere in this schema resource,
    /// filled in only on resource roots. Drives dynamic frame creation.
    pub resource_dynamic_anchors: Vec<String>,
}

impl SchemaObject {
    /// Whether this object starts a schema resource of its own.
    pub fn is_resource_root(&self) -> bool {
        self.id.is_some() || !self.resource_dynamic_anchors.is_empty() || self.recursive_anchor
    }

    pub fn find(&self, name: &str) -> Option<&KeywordInstance> {
        self.keywords.iter().find(|ki| ki.name() == name)
    }

    fn descend(&self, tokens: &[String]) -> Option<&Schema> {
        for instance in &self.keywords {
            for (path, sub) in instance.subschemas() {
                if tokens.len() >= path.len() && tokens[..path.len()] == path[..] {
                    return sub.at_pointer(&tokens[path.len()..]);
                }
            }
        }

        None
    }
}

/// Shared state threaded through a parse: the active draft and the
/// location of the schema being parsed, for error messages.
pub(crate) struct ParseCtx {
    pub draft: Draft,
    pub location: Pointer,
}

impl ParseCtx {
    pub fn err<S: Into<String>>(&self, message: S) -> Error {
        SchemaError::Parse {
            location: self.location.to_string(),
            message: message.into(),
        }
        .into()
    }

    /// Parse an embedded subschema, extending the location by `tokens`
    /// for the duration.
    pub fn subschema(&mut self, tokens: &[&str], value: &Value) -> Result<Schema, Error> {
        for token in tokens {
            self.location.push(*token);
        }
        let parsed = parse_value(value, self, false);
        for _ in tokens {
            self.location.pop();
        }

        parsed
    }
}

fn parse_value(value: &Value, ctx: &mut ParseCtx, resource_root: bool) -> Result<Schema, Error> {
    match value {
        Value::Bool(b) => Ok(Schema::Bool(*b)),
        Value::Object(map) => parse_object(map, ctx, resource_root),
        _ => Err(ctx.err("a schema must be a boolean or an object")),
    }
}

fn parse_object(
    map: &Map<String, Value>,
    ctx: &mut ParseCtx,
    resource_root: bool,
) -> Result<Schema, Error> {
    let enclosing_draft = ctx.draft;
    if let Some(meta) = map.get("$schema") {
        let uri = meta
            .as_str()
            .ok_or_else(|| ctx.err("$schema must be a string"))?;
        ctx.draft = Draft::from_meta_schema(uri).ok_or(SchemaError::UnknownDraft {
            uri: uri.to_owned(),
        })?;
    }
    let draft = ctx.draft;

    let identity_string = |key: &str| -> Result<Option<String>, Error> {
        match map.get(key) {
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ctx.err(format!("{} must be a string", key))),
            None => Ok(None),
        }
    };

    let mut id = identity_string("$id")?;
    if id.is_none() && draft <= Draft::Draft7 {
        id = identity_string("id")?;
    }

    let mut anchor = if draft >= Draft::Draft201909 {
        identity_string("$anchor")?
    } else {
        None
    };

    // Pre-2019 drafts declare anchors as plain-name fragments in $id.
    if draft <= Draft::Draft7 {
        if let Some(raw) = id.take() {
            if let Some(name) = raw.strip_prefix('#') {
                anchor = Some(name.to_owned());
            } else {
                id = Some(raw);
            }
        }
    }

    let dynamic_anchor = if draft == Draft::Draft202012 {
        identity_string("$dynamicAnchor")?
    } else {
        None
    };

    let recursive_anchor = if draft == Draft::Draft201909 {
        match map.get("$recursiveAnchor") {
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(ctx.err("$recursiveAnchor must be a boolean")),
            None => false,
        }
    } else {
        false
    };

    let vocabulary = if resource_root && draft >= Draft::Draft201909 {
        match map.get("$vocabulary") {
            Some(Value::Object(entries)) => {
                let mut parsed = Vec::with_capacity(entries.len());
                for (uri, required) in entries {
                    let required = required
                        .as_bool()
                        .ok_or_else(|| ctx.err("$vocabulary values must be booleans"))?;
                    if required && !catalog::knows_vocabulary(uri) {
                        return Err(SchemaError::UnknownVocabulary { uri: uri.clone() }.into());
                    }
                    parsed.push((uri.clone(), required));
                }
                Some(parsed)
            }
            Some(_) => return Err(ctx.err("$vocabulary must be an object")),
            None => None,
        }
    } else {
        None
    };

    let comment = if draft >= Draft::Draft7 {
        identity_string("$comment")?
    } else {
        None
    };

    let mut keywords = Vec::new();
    let mut unknown = Vec::new();

    for (key, payload) in map {
        if is_identity_key(key, draft) {
            continue;
        }

        match catalog::lookup(key, draft) {
            Some(descriptor) => {
                let keyword = keywords::parse_keyword(descriptor, payload, ctx)?;
                keywords.push(KeywordInstance {
                    descriptor,
                    keyword,
                });
            }
            None => unknown.push((key.clone(), payload.clone())),
        }
    }

    // Stable: source order breaks priority ties.
    keywords.sort_by_key(|instance| instance.descriptor.priority);

    let mut object = SchemaObject {
        draft,
        id,
        anchor,
        dynamic_anchor,
        recursive_anchor,
        vocabulary,
        comment,
        keywords,
        unknown,
        resource_dynamic_anchors: Vec::new(),
    };

    if resource_root || object.id.is_some() {
        let mut anchors = Vec::new();
        collect_dynamic_anchors(&object, true, &mut anchors);
        object.resource_dynamic_anchors = anchors;
    }

    ctx.draft = enclosing_draft;
    Ok(Schema::Object(Box::new(object)))
}

fn is_identity_key(key: &str, draft: Draft) -> bool {
    match key {
        "$schema" | "$id" => true,
        "id" => draft <= Draft::Draft7,
        "$comment" => draft >= Draft::Draft7,
        "$anchor" | "$vocabulary" => draft >= Draft::Draft201909,
        "$recursiveAnchor" => draft == Draft::Draft201909,
        "$dynamicAnchor" => draft == Draft::Draft202012,
        _ => false,
    }
}

/// Collect `$dynamicAnchor` names within one resource, stopping at nested
/// resource roots.
fn collect_dynamic_anchors(object: &SchemaObject, is_root: bool, out: &mut Vec<String>) {
    if !is_root && object.id.is_some() {
        return;
    }

    if let Some(name) = &object.dynamic_anchor {
        out.push(name.clone());
    }

    for instance in &object.keywords {
        for (_, sub) in instance.subschemas() {
            if let Schema::Object(child) = sub {
                collect_dynamic_anchors(child, false, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::{ItemsForm, Keyword};
    use serde_json::json;

    #[test]
    fn booleans_and_empty() {
        assert!(matches!(
            Schema::parse(&json!(true), Draft::Draft202012).unwrap(),
            Schema::Bool(true)
        ));
        assert!(matches!(
            Schema::parse(&json!(false), Draft::Draft202012).unwrap(),
            Schema::Bool(false)
        ));

        let empty = Schema::parse(&json!({}), Draft::Draft202012).unwrap();
        assert!(empty.as_object().unwrap().keywords.is_empty());

        assert!(Schema::parse(&json!(3), Draft::Draft202012).is_err());
    }

    #[test]
    fn draft_detection_and_inheritance() {
        let schema = Schema::parse(
            &json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "properties": { "a": {} },
            }),
            Draft::Draft202012,
        )
        .unwrap();

        let object = schema.as_object().unwrap();
        assert_eq!(object.draft, Draft::Draft7);

        let nested = schema
            .at_pointer(&["properties".into(), "a".into()])
            .unwrap();
        assert_eq!(nested.as_object().unwrap().draft, Draft::Draft7);

        assert!(Schema::parse(
            &json!({"$schema": "https://example.com/custom"}),
            Draft::Draft202012
        )
        .is_err());
    }

    #[test]
    fn keyword_ordering_is_priority_then_source() {
        let schema = Schema::parse(
            &json!({
                "unevaluatedProperties": false,
                "minimum": 1,
                "allOf": [{}],
                "$ref": "#",
                "maximum": 2,
            }),
            Draft::Draft202012,
        )
        .unwrap();

        let names: Vec<_> = schema
            .as_object()
            .unwrap()
            .keywords
            .iter()
            .map(|ki| ki.name())
            .collect();
        assert_eq!(
            names,
            vec!["$ref", "minimum", "maximum", "allOf", "unevaluatedProperties"]
        );
    }

    #[test]
    fn unknown_keywords_are_retained() {
        let schema = Schema::parse(
            &json!({"x-internal": {"nested": true}, "prefixItems": [{}]}),
            Draft::Draft7,
        )
        .unwrap();

        let object = schema.as_object().unwrap();
        // prefixItems does not exist in draft-07, so both land in the bag.
        assert_eq!(object.keywords.len(), 0);
        assert_eq!(object.unknown.len(), 2);
    }

    #[test]
    fn payload_errors_carry_locations() {
        let err = Schema::parse(
            &json!({"properties": {"a": {"minimum": "nope"}}}),
            Draft::Draft202012,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("/properties/a"), "got: {}", message);

        assert!(Schema::parse(&json!({"pattern": "("}), Draft::Draft202012).is_err());
        assert!(Schema::parse(&json!({"enum": []}), Draft::Draft202012).is_err());
        assert!(Schema::parse(&json!({"multipleOf": 0}), Draft::Draft202012).is_err());
    }

    #[test]
    fn legacy_anchor_in_id() {
        let schema = Schema::parse(
            &json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "definitions": {
                    "named": { "$id": "#here", "type": "string" },
                },
            }),
            Draft::Draft7,
        )
        .unwrap();

        let named = schema
            .at_pointer(&["definitions".into(), "named".into()])
            .unwrap();
        let object = named.as_object().unwrap();
        assert_eq!(object.anchor.as_deref(), Some("here"));
        assert_eq!(object.id, None);
    }

    #[test]
    fn resource_anchor_collection() {
        let schema = Schema::parse(
            &json!({
                "$id": "https://example.com/root",
                "$dynamicAnchor": "T",
                "$defs": {
                    "inner": { "$dynamicAnchor": "U" },
                    "separate": {
                        "$id": "https://example.com/other",
                        "$dynamicAnchor": "V",
                    },
                },
            }),
            Draft::Draft202012,
        )
        .unwrap();

        let root = schema.as_object().unwrap();
        assert_eq!(root.resource_dynamic_anchors, vec!["T", "U"]);

        let separate = schema
            .at_pointer(&["$defs".into(), "separate".into()])
            .unwrap();
        assert_eq!(
            separate.as_object().unwrap().resource_dynamic_anchors,
            vec!["V"]
        );
    }

    #[test]
    fn vocabulary_checking() {
        assert!(Schema::parse(
            &json!({"$vocabulary": {
                "https://json-schema.org/draft/2020-12/vocab/core": true,
                "https://example.com/vocab/extra": false,
            }}),
            Draft::Draft202012
        )
        .is_ok());

        assert!(Schema::parse(
            &json!({"$vocabulary": {"https://example.com/vocab/extra": true}}),
            Draft::Draft202012
        )
        .is_err());
    }

    #[test]
    fn keyword_enum_payloads() {
        let schema = Schema::parse(
            &json!({"items": [{"type": "string"}], "additionalItems": false}),
            Draft::Draft7,
        )
        .unwrap();
        let object = schema.as_object().unwrap();
        assert!(matches!(
            object.find("items").unwrap().keyword,
            Keyword::Items(ItemsForm::Tuple(_))
        ));

        let schema = Schema::parse(&json!({"items": {"type": "string"}}), Draft::Draft202012)
            .unwrap();
        assert!(matches!(
            schema.as_object().unwrap().find("items").unwrap().keyword,
            Keyword::Items(ItemsForm::Single(_))
        ));
    }
}

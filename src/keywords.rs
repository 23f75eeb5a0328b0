//! Typed keyword payloads.
//!
//! Every recognized keyword parses into a [`Keyword`] variant carrying its
//! payload in validated form, paired with the catalog descriptor that
//! identifies its draft, vocabulary, and evaluation priority. Dispatch in
//! the engine is a match over these variants; there is no open subclassing.

use crate::catalog::Descriptor;
use crate::draft::Draft;
use crate::number::Decimal;
use crate::schema::{ParseCtx, Schema};
use failure::Error;
use regex::Regex;
use serde_json::{Number, Value};

/// One keyword as it appears in a schema object: a catalog descriptor plus
/// the parsed payload.
#[derive(Clone, Debug)]
pub struct KeywordInstance {
    pub descriptor: &'static Descriptor,
    pub keyword: Keyword,
}

impl KeywordInstance {
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Enumerate embedded subschemas with their token paths relative to
    /// the owning schema object.
    pub fn subschemas(&self) -> Vec<(Vec<String>, &Schema)> {
        let name = self.name().to_owned();
        let mut out = Vec::new();

        match &self.keyword {
            Keyword::Defs(members)
            | Keyword::Properties(members)
            | Keyword::DependentSchemas(members) => {
                for (key, schema) in members {
                    out.push((vec![name.clone(), key.clone()], schema));
                }
            }
            Keyword::PatternProperties(members) => {
                for (pattern, schema) in members {
                    out.push((vec![name.clone(), pattern.source.clone()], schema));
                }
            }
            Keyword::Dependencies(members) => {
                for (key, dependency) in members {
                    if let Dependency::Schema(schema) = dependency {
                        out.push((vec![name.clone(), key.clone()], schema));
                    }
                }
            }
            Keyword::AllOf(branches)
            | Keyword::AnyOf(branches)
            | Keyword::OneOf(branches)
            | Keyword::PrefixItems(branches) => {
                for (i, schema) in branches.iter().enumerate() {
                    out.push((vec![name.clone(), i.to_string()], schema));
                }
            }
            Keyword::Items(ItemsForm::Tuple(branches)) => {
                for (i, schema) in branches.iter().enumerate() {
                    out.push((vec![name.clone(), i.to_string()], schema));
                }
            }
            Keyword::Items(ItemsForm::Single(schema))
            | Keyword::Not(schema)
            | Keyword::If(schema)
            | Keyword::Then(schema)
            | Keyword::Else(schema)
            | Keyword::AdditionalProperties(schema)
            | Keyword::PropertyNames(schema)
            | Keyword::AdditionalItems(schema)
            | Keyword::Contains(schema)
            | Keyword::UnevaluatedItems(schema)
            | Keyword::UnevaluatedProperties(schema) => {
                out.push((vec![name], schema.as_ref()));
            }
            _ => {}
        }

        out
    }
}

#[derive(Clone, Debug)]
pub enum Keyword {
    // Structure
    Defs(Vec<(String, Schema)>),

    // References
    Ref(String),
    RecursiveRef(String),
    DynamicRef(String),

    // In-place assertions
    Type(Vec<InstanceType>),
    Enum(Vec<Value>),
    Const(Value),
    MultipleOf(Number),
    Maximum(Number),
    ExclusiveMaximum(Number),
    Minimum(Number),
    ExclusiveMinimum(Number),
    MaxLength(u64),
    MinLength(u64),
    Pattern(PatternEntry),
    MaxItems(u64),
    MinItems(u64),
    UniqueItems(bool),
    MaxContains(u64),
    MinContains(u64),
    MaxProperties(u64),
    MinProperties(u64),
    Required(Vec<String>),
    DependentRequired(Vec<(String, Vec<String>)>),
    Format(String),

    // Applicators
    AllOf(Vec<Schema>),
    AnyOf(Vec<Schema>),
    OneOf(Vec<Schema>),
    Not(Box<Schema>),
    If(Box<Schema>),
    Then(Box<Schema>),
    Else(Box<Schema>),
    Properties(Vec<(String, Schema)>),
    PatternProperties(Vec<(PatternEntry, Schema)>),
    AdditionalProperties(Box<Schema>),
    PropertyNames(Box<Schema>),
    DependentSchemas(Vec<(String, Schema)>),
    Dependencies(Vec<(String, Dependency)>),
    Items(ItemsForm),
    PrefixItems(Vec<Schema>),
    AdditionalItems(Box<Schema>),
    Contains(Box<Schema>),
    UnevaluatedItems(Box<Schema>),
    UnevaluatedProperties(Box<Schema>),

    // Annotations
    Title(String),
    Description(String),
    Default(Value),
    Examples(Vec<Value>),
    Deprecated(bool),
    ReadOnly(bool),
    WriteOnly(bool),
    ContentEncoding(String),
    ContentMediaType(String),
}

/// A compiled regex that remembers how it was written, for output paths
/// and diagnostics.
#[derive(Clone, Debug)]
pub struct PatternEntry {
    pub source: String,
    pub regex: Regex,
}

#[derive(Clone, Debug)]
pub enum Dependency {
    Schema(Schema),
    Required(Vec<String>),
}

#[derive(Clone, Debug)]
pub enum ItemsForm {
    Single(Box<Schema>),
    Tuple(Vec<Schema>),
}

/// The seven instance type names of the `type` keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    Integer,
    String,
}

impl InstanceType {
    pub fn from_name(name: &str) -> Option<InstanceType> {
        match name {
            "null" => Some(InstanceType::Null),
            "boolean" => Some(InstanceType::Boolean),
            "object" => Some(InstanceType::Object),
            "array" => Some(InstanceType::Array),
            "number" => Some(InstanceType::Number),
            "integer" => Some(InstanceType::Integer),
            "string" => Some(InstanceType::String),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InstanceType::Null => "null",
            InstanceType::Boolean => "boolean",
            InstanceType::Object => "object",
            InstanceType::Array => "array",
            InstanceType::Number => "number",
            InstanceType::Integer => "integer",
            InstanceType::String => "string",
        }
    }

    /// Whether `value` is of this type. With `strict_types`, `integer`
    /// demands an integral JSON representation, so `1.0` fails; otherwise
    /// any number equal to its floor passes.
    pub fn matches(&self, value: &Value, strict_types: bool) -> bool {
        match self {
            InstanceType::Null => value.is_null(),
            InstanceType::Boolean => value.is_boolean(),
            InstanceType::Object => value.is_object(),
            InstanceType::Array => value.is_array(),
            InstanceType::Number => value.is_number(),
            InstanceType::String => value.is_string(),
            InstanceType::Integer => match value.as_number() {
                Some(n) if strict_types => n.is_i64() || n.is_u64(),
                Some(n) => Decimal::from_number(n).is_integer(),
                None => false,
            },
        }
    }
}

/// Parse a keyword payload according to its descriptor.
pub(crate) fn parse_keyword(
    descriptor: &'static Descriptor,
    value: &Value,
    ctx: &mut ParseCtx,
) -> Result<Keyword, Error> {
    let keyword = match descriptor.name {
        "$defs" | "definitions" => Keyword::Defs(schema_map(descriptor.name, value, ctx)?),

        "$ref" => Keyword::Ref(string(descriptor.name, value, ctx)?),
        "$recursiveRef" => {
            let target = string(descriptor.name, value, ctx)?;
            if target != "#" {
                return Err(ctx.err("$recursiveRef must be \"#\""));
            }
            Keyword::RecursiveRef(target)
        }
        "$dynamicRef" => Keyword::DynamicRef(string(descriptor.name, value, ctx)?),

        "type" => Keyword::Type(type_set(value, ctx)?),
        "enum" => match value.as_array() {
            Some(options) if !options.is_empty() => Keyword::Enum(options.clone()),
            _ => return Err(ctx.err("enum must be a non-empty array")),
        },
        "const" => Keyword::Const(value.clone()),
        "multipleOf" => {
            let n = number(descriptor.name, value, ctx)?;
            let decimal = Decimal::from_number(&n);
            if decimal.is_zero() || decimal.is_negative() {
                return Err(ctx.err("multipleOf must be a positive number"));
            }
            Keyword::MultipleOf(n)
        }
        "maximum" => Keyword::Maximum(number(descriptor.name, value, ctx)?),
        "exclusiveMaximum" => Keyword::ExclusiveMaximum(number(descriptor.name, value, ctx)?),
        "minimum" => Keyword::Minimum(number(descriptor.name, value, ctx)?),
        "exclusiveMinimum" => Keyword::ExclusiveMinimum(number(descriptor.name, value, ctx)?),
        "maxLength" => Keyword::MaxLength(non_negative(descriptor.name, value, ctx)?),
        "minLength" => Keyword::MinLength(non_negative(descriptor.name, value, ctx)?),
        "pattern" => Keyword::Pattern(pattern(value, ctx)?),
        "maxItems" => Keyword::MaxItems(non_negative(descriptor.name, value, ctx)?),
        "minItems" => Keyword::MinItems(non_negative(descriptor.name, value, ctx)?),
        "uniqueItems" => Keyword::UniqueItems(boolean(descriptor.name, value, ctx)?),
        "maxContains" => Keyword::MaxContains(non_negative(descriptor.name, value, ctx)?),
        "minContains" => Keyword::MinContains(non_negative(descriptor.name, value, ctx)?),
        "maxProperties" => Keyword::MaxProperties(non_negative(descriptor.name, value, ctx)?),
        "minProperties" => Keyword::MinProperties(non_negative(descriptor.name, value, ctx)?),
        "required" => Keyword::Required(string_list(descriptor.name, value, ctx)?),
        "dependentRequired" => {
            let map = object(descriptor.name, value, ctx)?;
            let mut members = Vec::with_capacity(map.len());
            for (key, names) in map {
                members.push((key.clone(), string_list(descriptor.name, names, ctx)?));
            }
            Keyword::DependentRequired(members)
        }
        "format" => Keyword::Format(string(descriptor.name, value, ctx)?),

        "allOf" => Keyword::AllOf(schema_list(descriptor.name, value, ctx)?),
        "anyOf" => Keyword::AnyOf(schema_list(descriptor.name, value, ctx)?),
        "oneOf" => Keyword::OneOf(schema_list(descriptor.name, value, ctx)?),
        "not" => Keyword::Not(Box::new(subschema(descriptor.name, value, ctx)?)),
        "if" => Keyword::If(Box::new(subschema(descriptor.name, value, ctx)?)),
        "then" => Keyword::Then(Box::new(subschema(descriptor.name, value, ctx)?)),
        "else" => Keyword::Else(Box::new(subschema(descriptor.name, value, ctx)?)),
        "properties" => Keyword::Properties(schema_map(descriptor.name, value, ctx)?),
        "patternProperties" => {
            let map = object(descriptor.name, value, ctx)?;
            let mut members = Vec::with_capacity(map.len());
            for (source, sub) in map {
                let regex = Regex::new(source)
                    .map_err(|e| ctx.err(format!("invalid pattern {:?}: {}", source, e)))?;
                let schema = ctx.subschema(&[descriptor.name, source.as_str()], sub)?;
                members.push((
                    PatternEntry {
                        source: source.clone(),
                        regex,
                    },
                    schema,
                ));
            }
            Keyword::PatternProperties(members)
        }
        "additionalProperties" => {
            Keyword::AdditionalProperties(Box::new(subschema(descriptor.name, value, ctx)?))
        }
        "propertyNames" => Keyword::PropertyNames(Box::new(subschema(descriptor.name, value, ctx)?)),
        "dependentSchemas" => Keyword::DependentSchemas(schema_map(descriptor.name, value, ctx)?),
        "dependencies" => {
            let map = object(descriptor.name, value, ctx)?;
            let mut members = Vec::with_capacity(map.len());
            for (key, dependency) in map {
                let parsed = if dependency.is_array() {
                    Dependency::Required(string_list(descriptor.name, dependency, ctx)?)
                } else {
                    Dependency::Schema(ctx.subschema(&[descriptor.name, key.as_str()], dependency)?)
                };
                members.push((key.clone(), parsed));
            }
            Keyword::Dependencies(members)
        }
        "items" if ctx.draft >= Draft::Draft202012 => Keyword::Items(ItemsForm::Single(Box::new(
            subschema(descriptor.name, value, ctx)?,
        ))),
        "items" => match value {
            Value::Array(_) => Keyword::Items(ItemsForm::Tuple(schema_list(
                descriptor.name,
                value,
                ctx,
            )?)),
            _ => Keyword::Items(ItemsForm::Single(Box::new(subschema(
                descriptor.name,
                value,
                ctx,
            )?))),
        },
        "prefixItems" => Keyword::PrefixItems(schema_list(descriptor.name, value, ctx)?),
        "additionalItems" => {
            Keyword::AdditionalItems(Box::new(subschema(descriptor.name, value, ctx)?))
        }
        "contains" => Keyword::Contains(Box::new(subschema(descriptor.name, value, ctx)?)),
        "unevaluatedItems" => {
            Keyword::UnevaluatedItems(Box::new(subschema(descriptor.name, value, ctx)?))
        }
        "unevaluatedProperties" => {
            Keyword::UnevaluatedProperties(Box::new(subschema(descriptor.name, value, ctx)?))
        }

        "title" => Keyword::Title(string(descriptor.name, value, ctx)?),
        "description" => Keyword::Description(string(descriptor.name, value, ctx)?),
        "default" => Keyword::Default(value.clone()),
        "examples" => match value.as_array() {
            Some(examples) => Keyword::Examples(examples.clone()),
            None => return Err(ctx.err("examples must be an array")),
        },
        "deprecated" => Keyword::Deprecated(boolean(descriptor.name, value, ctx)?),
        "readOnly" => Keyword::ReadOnly(boolean(descriptor.name, value, ctx)?),
        "writeOnly" => Keyword::WriteOnly(boolean(descriptor.name, value, ctx)?),
        "contentEncoding" => Keyword::ContentEncoding(string(descriptor.name, value, ctx)?),
        "contentMediaType" => Keyword::ContentMediaType(string(descriptor.name, value, ctx)?),

        other => {
            return Err(ctx.err(format!(
                "descriptor {:?} has no payload parser",
                other
            )))
        }
    };

    Ok(keyword)
}

fn string(name: &str, value: &Value, ctx: &ParseCtx) -> Result<String, Error> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ctx.err(format!("{} must be a string", name)))
}

fn boolean(name: &str, value: &Value, ctx: &ParseCtx) -> Result<bool, Error> {
    value
        .as_bool()
        .ok_or_else(|| ctx.err(format!("{} must be a boolean", name)))
}

fn number(name: &str, value: &Value, ctx: &ParseCtx) -> Result<Number, Error> {
    value
        .as_number()
        .cloned()
        .ok_or_else(|| ctx.err(format!("{} must be a number", name)))
}

fn non_negative(name: &str, value: &Value, ctx: &ParseCtx) -> Result<u64, Error> {
    let invalid = || ctx.err(format!("{} must be a non-negative integer", name));

    match value.as_number() {
        Some(n) => {
            if let Some(exact) = n.as_u64() {
                return Ok(exact);
            }
            // Integral floats like 2.0 are accepted.
            match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
                _ => Err(invalid()),
            }
        }
        None => Err(invalid()),
    }
}

fn object<'a>(
    name: &str,
    value: &'a Value,
    ctx: &ParseCtx,
) -> Result<&'a serde_json::Map<String, Value>, Error> {
    value
        .as_object()
        .ok_or_else(|| ctx.err(format!("{} must be an object", name)))
}

fn string_list(name: &str, value: &Value, ctx: &ParseCtx) -> Result<Vec<String>, Error> {
    let items = value
        .as_array()
        .ok_or_else(|| ctx.err(format!("{} must be an array of strings", name)))?;

    items
        .iter()
        .map(|item| string(name, item, ctx))
        .collect()
}

fn subschema(name: &str, value: &Value, ctx: &mut ParseCtx) -> Result<Schema, Error> {
    ctx.subschema(&[name], value)
}

fn schema_list(name: &str, value: &Value, ctx: &mut ParseCtx) -> Result<Vec<Schema>, Error> {
    let items = value
        .as_array()
        .ok_or_else(|| ctx.err(format!("{} must be an array of schemas", name)))?;
    if items.is_empty() {
        return Err(ctx.err(format!("{} must not be empty", name)));
    }

    let mut schemas = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let index = i.to_string();
        schemas.push(ctx.subschema(&[name, index.as_str()], item)?);
    }

    Ok(schemas)
}

fn schema_map(name: &str, value: &Value, ctx: &mut ParseCtx) -> Result<Vec<(String, Schema)>, Error> {
    let map = object(name, value, ctx)?;
    let mut members = Vec::with_capacity(map.len());
    for (key, sub) in map {
        members.push((key.clone(), ctx.subschema(&[name, key.as_str()], sub)?));
    }

    Ok(members)
}

fn type_set(value: &Value, ctx: &ParseCtx) -> Result<Vec<InstanceType>, Error> {
    let parse_one = |v: &Value| -> Result<InstanceType, Error> {
        let name = v
            .as_str()
            .ok_or_else(|| ctx.err("type entries must be strings"))?;
        InstanceType::from_name(name)
            .ok_or_else(|| ctx.err(format!("unknown type name {:?}", name)))
    };

    match value {
        Value::String(_) => Ok(vec![parse_one(value)?]),
        Value::Array(names) if !names.is_empty() => names.iter().map(parse_one).collect(),
        _ => Err(ctx.err("type must be a string or a non-empty array of strings")),
    }
}

fn pattern(value: &Value, ctx: &ParseCtx) -> Result<PatternEntry, Error> {
    let source = string("pattern", value, ctx)?;
    let regex = Regex::new(&source)
        .map_err(|e| ctx.err(format!("invalid pattern {:?}: {}", source, e)))?;

    Ok(PatternEntry { source, regex })
}

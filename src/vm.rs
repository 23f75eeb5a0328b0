use crate::context::Context;
use crate::draft::Draft;
use crate::errors::SchemaError;
use crate::format;
use crate::keywords::{Dependency, ItemsForm, Keyword, KeywordInstance};
use crate::number::{json_eq, Decimal};
use crate::pointer::{is_pointer_fragment, Pointer};
use crate::registry::{Document, Registry};
use crate::resolver::{self, Resolved};
use crate::schema::{Schema, SchemaObject};
use crate::uri::{split_fragment, UriRef};
use crate::validator::Options;
use failure::Error;
use serde_json::{json, Number, Value};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Run a full validation, producing the root of the evaluation tree.
pub(crate) fn run(
    options: &Options,
    registry: &Registry,
    doc: &Arc<Document>,
    location: &Pointer,
    instance: &Value,
) -> Result<Context, Error> {
    let schema = doc
        .schema_at(location)
        .ok_or_else(|| SchemaError::DanglingPointer {
            uri: doc
                .base
                .as_ref()
                .map(|base| base.to_string())
                .unwrap_or_else(|| "<anonymous>".to_owned()),
            pointer: location.to_string(),
        })?;

    let (base, resource_relative) = doc.resource_of(location);
    let mut ctx = Context::new_root(base, resource_relative);
    let mut vm = Vm {
        options,
        registry,
        frames: Vec::new(),
        active_refs: HashSet::new(),
        hops: 0,
    };

    vm.eval(schema, instance, &mut ctx, doc)?;
    Ok(ctx)
}

/// One entry of the dynamic scope: a schema resource that declares a
/// dynamic or recursive anchor, entered and not yet left.
struct Frame {
    doc: Arc<Document>,
    resource: Option<Url>,
    dynamic_anchors: Vec<String>,
    recursive: bool,
}

impl Frame {
    fn root_location(&self) -> Pointer {
        match &self.resource {
            Some(uri) => self
                .doc
                .resource_location(uri)
                .cloned()
                .unwrap_or_default(),
            None => Pointer::root(),
        }
    }
}

enum RefKind {
    Static,
    Recursive,
    Dynamic,
}

struct Vm<'a> {
    options: &'a Options,
    registry: &'a Registry,
    frames: Vec<Frame>,
    /// Active `(schema identity, instance location)` pairs, for cycle
    /// detection across reference hops.
    active_refs: HashSet<(String, String)>,
    hops: usize,
}

impl<'a> Vm<'a> {
    fn eval(
        &mut self,
        schema: &Schema,
        instance: &Value,
        ctx: &mut Context,
        doc: &Arc<Document>,
    ) -> Result<(), Error> {
        let object = match schema {
            Schema::Bool(true) => return Ok(()),
            Schema::Bool(false) => {
                ctx.fail("false schema rejects every instance");
                return Ok(());
            }
            Schema::Object(object) => object,
        };

        // Entering an embedded resource moves the base URI.
        if let Some(raw) = &object.id {
            let resolved = UriRef::new(raw).resolve(ctx.base_uri.as_ref())?;
            if resolved != ctx.base_uri {
                ctx.base_uri = resolved;
                ctx.schema_location = Pointer::root();
            }
        }

        let pushed = if !object.resource_dynamic_anchors.is_empty() || object.recursive_anchor {
            self.frames.push(Frame {
                doc: Arc::clone(doc),
                resource: ctx.base_uri.clone(),
                dynamic_anchors: object.resource_dynamic_anchors.clone(),
                recursive: object.recursive_anchor,
            });
            true
        } else {
            false
        };

        let outcome = self.eval_object(object, instance, ctx, doc);

        if pushed {
            self.frames.pop();
        }

        outcome
    }

    fn eval_object(
        &mut self,
        object: &SchemaObject,
        instance: &Value,
        ctx: &mut Context,
        doc: &Arc<Document>,
    ) -> Result<(), Error> {
        // In pre-2019 drafts a $ref replaces all sibling keywords.
        if object.draft <= Draft::Draft7 {
            if let Some(instance_kw) = object.find("$ref") {
                if let Keyword::Ref(target) = &instance_kw.keyword {
                    return self.eval_ref("$ref", target, RefKind::Static, instance, ctx, doc);
                }
            }
        }

        let mut if_result: Option<bool> = None;
        for keyword in &object.keywords {
            self.eval_keyword(object, keyword, instance, ctx, doc, &mut if_result)?;
        }

        Ok(())
    }

    fn eval_keyword(
        &mut self,
        object: &SchemaObject,
        keyword: &KeywordInstance,
        instance: &Value,
        ctx: &mut Context,
        doc: &Arc<Document>,
        if_result: &mut Option<bool>,
    ) -> Result<(), Error> {
        let name = keyword.name();

        match &keyword.keyword {
            // Structure only; nothing to evaluate.
            Keyword::Defs(_) => {}
            // Enforced inside `contains`.
            Keyword::MaxContains(_) | Keyword::MinContains(_) => {}

            Keyword::Ref(target) => {
                self.eval_ref(name, target, RefKind::Static, instance, ctx, doc)?
            }
            Keyword::RecursiveRef(target) => {
                self.eval_ref(name, target, RefKind::Recursive, instance, ctx, doc)?
            }
            Keyword::DynamicRef(target) => {
                self.eval_ref(name, target, RefKind::Dynamic, instance, ctx, doc)?
            }

            Keyword::Type(expected) => {
                let mut kctx = ctx.derive(&[name], &[]);
                if !expected
                    .iter()
                    .any(|t| t.matches(instance, self.options.strict_types))
                {
                    let names: Vec<_> = expected.iter().map(|t| t.name()).collect();
                    kctx.fail(format!("expected type {}", names.join(" or ")));
                }
                ctx.apply_child(kctx);
            }

            Keyword::Enum(options) => {
                let mut kctx = ctx.derive(&[name], &[]);
                if !options.iter().any(|option| json_eq(option, instance)) {
                    kctx.fail("instance matches no enum value");
                }
                ctx.apply_child(kctx);
            }

            Keyword::Const(expected) => {
                let mut kctx = ctx.derive(&[name], &[]);
                if !json_eq(expected, instance) {
                    kctx.fail("instance differs from the const value");
                }
                ctx.apply_child(kctx);
            }

            Keyword::MultipleOf(factor) => {
                if let Some(n) = instance.as_number() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    let value = Decimal::from_number(n);
                    if !value.is_multiple_of(&Decimal::from_number(factor)) {
                        kctx.fail(format!("not a multiple of {}", factor));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Maximum(bound) => {
                self.numeric_bound(name, instance, ctx, bound, |v, b| v <= b, "greater than")
            }
            Keyword::ExclusiveMaximum(bound) => {
                self.numeric_bound(name, instance, ctx, bound, |v, b| v < b, "not less than")
            }
            Keyword::Minimum(bound) => {
                self.numeric_bound(name, instance, ctx, bound, |v, b| v >= b, "less than")
            }
            Keyword::ExclusiveMinimum(bound) => {
                self.numeric_bound(name, instance, ctx, bound, |v, b| v > b, "not greater than")
            }

            Keyword::MaxLength(limit) => {
                if let Some(s) = instance.as_str() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    if (s.chars().count() as u64) > *limit {
                        kctx.fail(format!("longer than {} characters", limit));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::MinLength(limit) => {
                if let Some(s) = instance.as_str() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    if (s.chars().count() as u64) < *limit {
                        kctx.fail(format!("shorter than {} characters", limit));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Pattern(pattern) => {
                if let Some(s) = instance.as_str() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    if !pattern.regex.is_match(s) {
                        kctx.fail(format!("does not match pattern {:?}", pattern.source));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::MaxItems(limit) => {
                if let Some(items) = instance.as_array() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    if (items.len() as u64) > *limit {
                        kctx.fail(format!("more than {} items", limit));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::MinItems(limit) => {
                if let Some(items) = instance.as_array() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    if (items.len() as u64) < *limit {
                        kctx.fail(format!("fewer than {} items", limit));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::UniqueItems(required) => {
                if let (true, Some(items)) = (*required, instance.as_array()) {
                    let mut kctx = ctx.derive(&[name], &[]);
                    'outer: for i in 0..items.len() {
                        for j in i + 1..items.len() {
                            if json_eq(&items[i], &items[j]) {
                                kctx.fail(format!("items {} and {} are equal", i, j));
                                break 'outer;
                            }
                        }
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::MaxProperties(limit) => {
                if let Some(members) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    if (members.len() as u64) > *limit {
                        kctx.fail(format!("more than {} properties", limit));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::MinProperties(limit) => {
                if let Some(members) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    if (members.len() as u64) < *limit {
                        kctx.fail(format!("fewer than {} properties", limit));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Required(names) => {
                if let Some(members) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    for required in names {
                        if !members.contains_key(required) {
                            kctx.fail(format!("missing required property {:?}", required));
                            break;
                        }
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::DependentRequired(dependencies) => {
                if let Some(members) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    'deps: for (trigger, needed) in dependencies {
                        if !members.contains_key(trigger) {
                            continue;
                        }
                        for required in needed {
                            if !members.contains_key(required) {
                                kctx.fail(format!(
                                    "property {:?} requires property {:?}",
                                    trigger, required
                                ));
                                break 'deps;
                            }
                        }
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Format(format_name) => {
                let mut kctx = ctx.derive(&[name], &[]);
                let assert = self.options.strict_format || self.options.require_format_validation;

                match format::lookup(format_name) {
                    Some(format) => {
                        kctx.annotate(name, json!(format_name));
                        if assert && !format.check(instance) {
                            kctx.fail(format!("not a valid {:?}", format_name));
                        }
                    }
                    None => {
                        if self.options.strict_format {
                            kctx.fail(
                                SchemaError::UnknownFormat {
                                    name: format_name.clone(),
                                }
                                .to_string(),
                            );
                        }
                    }
                }
                ctx.apply_child(kctx);
            }

            Keyword::AllOf(branches) => {
                let mut kctx = ctx.derive(&[name], &[]);
                for (i, branch) in branches.iter().enumerate() {
                    let index = i.to_string();
                    let mut bctx = kctx.derive(&[index.as_str()], &[]);
                    self.eval(branch, instance, &mut bctx, doc)?;
                    kctx.apply_child(bctx);
                }
                ctx.apply_child(kctx);
            }

            Keyword::AnyOf(branches) => {
                let mut kctx = ctx.derive(&[name], &[]);
                let mut any = false;
                for (i, branch) in branches.iter().enumerate() {
                    let index = i.to_string();
                    let mut bctx = kctx.derive(&[index.as_str()], &[]);
                    self.eval(branch, instance, &mut bctx, doc)?;
                    any |= kctx.push_child(bctx);
                }
                if !any {
                    kctx.fail("no anyOf branch matched");
                }
                ctx.apply_child(kctx);
            }

            Keyword::OneOf(branches) => {
                let mut kctx = ctx.derive(&[name], &[]);
                let mut matched = 0;
                for (i, branch) in branches.iter().enumerate() {
                    let index = i.to_string();
                    let mut bctx = kctx.derive(&[index.as_str()], &[]);
                    self.eval(branch, instance, &mut bctx, doc)?;
                    if kctx.push_child(bctx) {
                        matched += 1;
                    }
                }
                if matched != 1 {
                    kctx.fail(format!("expected exactly one matching branch, got {}", matched));
                }
                ctx.apply_child(kctx);
            }

            Keyword::Not(branch) => {
                let mut kctx = ctx.derive(&[name], &[]);
                self.eval(branch, instance, &mut kctx, doc)?;
                // Invert, and discard nested annotations either way.
                let inner_valid = kctx.valid;
                kctx.annotations.clear();
                kctx.annotation = None;
                kctx.valid = !inner_valid;
                kctx.error = if inner_valid {
                    Some("instance matches the not schema".to_owned())
                } else {
                    None
                };
                ctx.apply_child(kctx);
            }

            Keyword::If(branch) => {
                let mut kctx = ctx.derive(&[name], &[]);
                self.eval(branch, instance, &mut kctx, doc)?;
                *if_result = Some(kctx.valid);
                // `if` never asserts; its annotations count when it matched.
                ctx.push_child(kctx);
            }

            Keyword::Then(branch) => {
                if *if_result == Some(true) {
                    let mut kctx = ctx.derive(&[name], &[]);
                    self.eval(branch, instance, &mut kctx, doc)?;
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Else(branch) => {
                if *if_result == Some(false) {
                    let mut kctx = ctx.derive(&[name], &[]);
                    self.eval(branch, instance, &mut kctx, doc)?;
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Properties(members) => {
                if let Some(map) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    let mut applied = Vec::new();
                    for (key, branch) in members {
                        if let Some(value) = map.get(key) {
                            let mut pctx = kctx.derive(&[key.as_str()], &[key.as_str()]);
                            self.eval(branch, value, &mut pctx, doc)?;
                            kctx.apply_child(pctx);
                            applied.push(json!(key));
                        }
                    }
                    kctx.annotate(name, Value::Array(applied));
                    ctx.apply_child(kctx);
                }
            }

            Keyword::PatternProperties(members) => {
                if let Some(map) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    let mut applied = Vec::new();
                    for (pattern, branch) in members {
                        for (key, value) in map {
                            if pattern.regex.is_match(key) {
                                let mut pctx = kctx.derive(&[pattern.source.as_str()], &[key.as_str()]);
                                self.eval(branch, value, &mut pctx, doc)?;
                                kctx.apply_child(pctx);
                                applied.push(json!(key));
                            }
                        }
                    }
                    kctx.annotate(name, Value::Array(applied));
                    ctx.apply_child(kctx);
                }
            }

            Keyword::AdditionalProperties(branch) => {
                if let Some(map) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    let mut applied = Vec::new();
                    for (key, value) in map {
                        if covered_by_siblings(object, key) {
                            continue;
                        }
                        let mut pctx = kctx.derive(&[], &[key.as_str()]);
                        self.eval(branch, value, &mut pctx, doc)?;
                        kctx.apply_child(pctx);
                        applied.push(json!(key));
                    }
                    kctx.annotate(name, Value::Array(applied));
                    ctx.apply_child(kctx);
                }
            }

            Keyword::PropertyNames(branch) => {
                if let Some(map) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    for key in map.keys() {
                        let mut pctx = kctx.derive(&[], &[]);
                        self.eval(branch, &Value::String(key.clone()), &mut pctx, doc)?;
                        if !pctx.valid && kctx.valid {
                            kctx.fail(format!("property name {:?} is invalid", key));
                        }
                        kctx.push_child_silent(pctx);
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::DependentSchemas(members) => {
                if let Some(map) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    for (trigger, branch) in members {
                        if map.contains_key(trigger) {
                            let mut dctx = kctx.derive(&[trigger.as_str()], &[]);
                            self.eval(branch, instance, &mut dctx, doc)?;
                            kctx.apply_child(dctx);
                        }
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Dependencies(members) => {
                if let Some(map) = instance.as_object() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    for (trigger, dependency) in members {
                        if !map.contains_key(trigger) {
                            continue;
                        }
                        match dependency {
                            Dependency::Required(needed) => {
                                for required in needed {
                                    if !map.contains_key(required) {
                                        kctx.fail(format!(
                                            "property {:?} requires property {:?}",
                                            trigger, required
                                        ));
                                    }
                                }
                            }
                            Dependency::Schema(branch) => {
                                let mut dctx = kctx.derive(&[trigger.as_str()], &[]);
                                self.eval(branch, instance, &mut dctx, doc)?;
                                kctx.apply_child(dctx);
                            }
                        }
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::PrefixItems(branches) => {
                if let Some(items) = instance.as_array() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    let applied = branches.len().min(items.len());
                    for i in 0..applied {
                        let index = i.to_string();
                        let mut ictx = kctx.derive(&[index.as_str()], &[index.as_str()]);
                        self.eval(&branches[i], &items[i], &mut ictx, doc)?;
                        kctx.apply_child(ictx);
                    }
                    if let Some(value) = tuple_annotation(applied, items.len()) {
                        kctx.annotate(name, value);
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Items(ItemsForm::Tuple(branches)) => {
                if let Some(items) = instance.as_array() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    let applied = branches.len().min(items.len());
                    for i in 0..applied {
                        let index = i.to_string();
                        let mut ictx = kctx.derive(&[index.as_str()], &[index.as_str()]);
                        self.eval(&branches[i], &items[i], &mut ictx, doc)?;
                        kctx.apply_child(ictx);
                    }
                    if let Some(value) = tuple_annotation(applied, items.len()) {
                        kctx.annotate(name, value);
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Items(ItemsForm::Single(branch)) => {
                if let Some(items) = instance.as_array() {
                    // In 2020-12 `items` picks up where `prefixItems` ends.
                    let start = if object.draft >= Draft::Draft202012 {
                        match object.find("prefixItems") {
                            Some(KeywordInstance {
                                keyword: Keyword::PrefixItems(prefix),
                                ..
                            }) => prefix.len().min(items.len()),
                            _ => 0,
                        }
                    } else {
                        0
                    };

                    let mut kctx = ctx.derive(&[name], &[]);
                    let mut applied = false;
                    for (i, item) in items.iter().enumerate().skip(start) {
                        let index = i.to_string();
                        let mut ictx = kctx.derive(&[], &[index.as_str()]);
                        self.eval(branch, item, &mut ictx, doc)?;
                        kctx.apply_child(ictx);
                        applied = true;
                    }
                    if applied {
                        kctx.annotate(name, json!(true));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::AdditionalItems(branch) => {
                if let Some(items) = instance.as_array() {
                    // Only meaningful after a tuple-form `items`.
                    let start = match object.find("items") {
                        Some(KeywordInstance {
                            keyword: Keyword::Items(ItemsForm::Tuple(prefix)),
                            ..
                        }) => prefix.len(),
                        _ => return Ok(()),
                    };

                    let mut kctx = ctx.derive(&[name], &[]);
                    let mut applied = false;
                    for (i, item) in items.iter().enumerate().skip(start) {
                        let index = i.to_string();
                        let mut ictx = kctx.derive(&[], &[index.as_str()]);
                        self.eval(branch, item, &mut ictx, doc)?;
                        kctx.apply_child(ictx);
                        applied = true;
                    }
                    if applied {
                        kctx.annotate(name, json!(true));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Contains(branch) => {
                if let Some(items) = instance.as_array() {
                    let mut kctx = ctx.derive(&[name], &[]);
                    let mut matched = Vec::new();
                    for (i, item) in items.iter().enumerate() {
                        let index = i.to_string();
                        let mut ictx = kctx.derive(&[], &[index.as_str()]);
                        self.eval(branch, item, &mut ictx, doc)?;
                        if kctx.push_child(ictx) {
                            matched.push(i as u64);
                        }
                    }

                    let minimum = match object.find("minContains") {
                        Some(KeywordInstance {
                            keyword: Keyword::MinContains(n),
                            ..
                        }) => *n,
                        _ => 1,
                    };
                    let maximum = match object.find("maxContains") {
                        Some(KeywordInstance {
                            keyword: Keyword::MaxContains(n),
                            ..
                        }) => Some(*n),
                        _ => None,
                    };

                    let count = matched.len() as u64;
                    if count < minimum {
                        kctx.fail(format!(
                            "expected at least {} matching items, got {}",
                            minimum, count
                        ));
                    } else if let Some(maximum) = maximum {
                        if count > maximum {
                            kctx.fail(format!(
                                "expected at most {} matching items, got {}",
                                maximum, count
                            ));
                        }
                    }

                    kctx.annotate(name, json!(matched));
                    ctx.apply_child(kctx);
                }
            }

            Keyword::UnevaluatedItems(branch) => {
                if let Some(items) = instance.as_array() {
                    let coverage = ctx.evaluated_items();
                    let mut kctx = ctx.derive(&[name], &[]);
                    let mut applied = false;
                    for (i, item) in items.iter().enumerate() {
                        if coverage.covers(i as u64) {
                            continue;
                        }
                        let index = i.to_string();
                        let mut ictx = kctx.derive(&[], &[index.as_str()]);
                        self.eval(branch, item, &mut ictx, doc)?;
                        kctx.apply_child(ictx);
                        applied = true;
                    }
                    if applied {
                        kctx.annotate(name, json!(true));
                    }
                    ctx.apply_child(kctx);
                }
            }

            Keyword::UnevaluatedProperties(branch) => {
                if let Some(map) = instance.as_object() {
                    let evaluated = ctx.evaluated_properties();
                    let mut kctx = ctx.derive(&[name], &[]);
                    let mut applied = Vec::new();
                    for (key, value) in map {
                        if evaluated.contains(key) {
                            continue;
                        }
                        let mut pctx = kctx.derive(&[], &[key.as_str()]);
                        self.eval(branch, value, &mut pctx, doc)?;
                        kctx.apply_child(pctx);
                        applied.push(json!(key));
                    }
                    kctx.annotate(name, Value::Array(applied));
                    ctx.apply_child(kctx);
                }
            }

            Keyword::Title(value) | Keyword::Description(value) => {
                let mut kctx = ctx.derive(&[name], &[]);
                kctx.annotate(name, json!(value));
                ctx.push_child(kctx);
            }

            Keyword::Default(value) => {
                let mut kctx = ctx.derive(&[name], &[]);
                kctx.annotate(name, value.clone());
                ctx.push_child(kctx);
            }

            Keyword::Examples(values) => {
                let mut kctx = ctx.derive(&[name], &[]);
                kctx.annotate(name, Value::Array(values.clone()));
                ctx.push_child(kctx);
            }

            Keyword::Deprecated(flag) | Keyword::ReadOnly(flag) | Keyword::WriteOnly(flag) => {
                let mut kctx = ctx.derive(&[name], &[]);
                kctx.annotate(name, json!(flag));
                ctx.push_child(kctx);
            }

            Keyword::ContentEncoding(value) | Keyword::ContentMediaType(value) => {
                let mut kctx = ctx.derive(&[name], &[]);
                kctx.annotate(name, json!(value));
                ctx.push_child(kctx);
            }
        }

        Ok(())
    }

    fn numeric_bound(
        &mut self,
        name: &str,
        instance: &Value,
        ctx: &mut Context,
        bound: &Number,
        ok: fn(&Decimal, &Decimal) -> bool,
        complaint: &str,
    ) {
        if let Some(n) = instance.as_number() {
            let mut kctx = ctx.derive(&[name], &[]);
            let value = Decimal::from_number(n);
            let limit = Decimal::from_number(bound);
            if !ok(&value, &limit) {
                kctx.fail(format!("{} {}", complaint, bound));
            }
            ctx.apply_child(kctx);
        }
    }

    fn eval_ref(
        &mut self,
        name: &str,
        reference: &str,
        kind: RefKind,
        instance: &Value,
        ctx: &mut Context,
        doc: &Arc<Document>,
    ) -> Result<(), Error> {
        let mut kctx = ctx.derive(&[name], &[]);

        match self.follow_ref(reference, kind, instance, &mut kctx, doc) {
            Ok(()) => {}
            Err(error) => {
                // Budget exhaustion is terminal for the whole call;
                // resolution failures fail this branch only.
                if let Some(SchemaError::MaxDepthExceeded) = error.downcast_ref::<SchemaError>() {
                    return Err(error);
                }
                kctx.fail(error.to_string());
            }
        }

        ctx.apply_child(kctx);
        Ok(())
    }

    fn follow_ref(
        &mut self,
        reference: &str,
        kind: RefKind,
        instance: &Value,
        kctx: &mut Context,
        doc: &Arc<Document>,
    ) -> Result<(), Error> {
        let mut resolved = resolver::resolve(self.registry, reference, &kctx.base_uri, doc)?;

        match kind {
            RefKind::Static => {}
            RefKind::Recursive => {
                // Redirect to the outermost recursive frame, but only when
                // the statically resolved document opts in at its root.
                let target =
                    resolved
                        .doc
                        .schema_at(&resolved.location)
                        .ok_or_else(|| SchemaError::DanglingPointer {
                            uri: reference.to_owned(),
                            pointer: resolved.location.to_string(),
                        })?;
                let opted_in = target
                    .as_object()
                    .map(|object| object.recursive_anchor)
                    .unwrap_or(false);

                if opted_in {
                    if let Some(frame) = self.frames.iter().find(|frame| frame.recursive) {
                        let location = frame.root_location();
                        let (base, resource_relative) = frame.doc.resource_of(&location);
                        resolved = Resolved {
                            doc: Arc::clone(&frame.doc),
                            location,
                            base,
                            resource_relative,
                            dynamic: false,
                        };
                    }
                }
            }
            RefKind::Dynamic => {
                let fragment = split_fragment(reference).1;
                if let Some(anchor) = fragment.filter(|f| !is_pointer_fragment(f)) {
                    // Only an initial match on a dynamic anchor makes the
                    // reference dynamic; otherwise it behaves like $ref.
                    if resolved.dynamic {
                        let outermost = self
                            .frames
                            .iter()
                            .find(|frame| frame.dynamic_anchors.iter().any(|a| a == anchor));
                        if let Some(frame) = outermost {
                            let entry = frame
                                .doc
                                .anchor(&frame.resource, anchor)
                                .ok_or_else(|| SchemaError::MissingAnchor {
                                    uri: reference.to_owned(),
                                    anchor: anchor.to_owned(),
                                })?;
                            let location = entry.location.clone();
                            let (base, resource_relative) = frame.doc.resource_of(&location);
                            resolved = Resolved {
                                doc: Arc::clone(&frame.doc),
                                location,
                                base,
                                resource_relative,
                                dynamic: true,
                            };
                        }
                    }
                }
            }
        }

        let identity = format!(
            "{}#{}",
            resolved
                .base
                .as_ref()
                .map(|base| base.to_string())
                .unwrap_or_default(),
            resolved.location
        );
        let guard_key = (identity, kctx.instance_location.to_string());
        if !self.active_refs.insert(guard_key.clone()) {
            return Err(SchemaError::ReferenceCycle {
                location: kctx.keyword_location.to_string(),
            }
            .into());
        }

        self.hops += 1;
        let outcome = if self.hops > self.options.max_reference_depth {
            Err(SchemaError::MaxDepthExceeded.into())
        } else {
            self.eval_resolved(&resolved, instance, kctx)
        };
        self.hops -= 1;
        self.active_refs.remove(&guard_key);

        outcome
    }

    fn eval_resolved(
        &mut self,
        resolved: &Resolved,
        instance: &Value,
        kctx: &mut Context,
    ) -> Result<(), Error> {
        let target = resolved
            .doc
            .schema_at(&resolved.location)
            .ok_or_else(|| SchemaError::DanglingPointer {
                uri: resolved
                    .base
                    .as_ref()
                    .map(|base| base.to_string())
                    .unwrap_or_else(|| "<anonymous>".to_owned()),
                pointer: resolved.location.to_string(),
            })?;

        let mut rctx = kctx.derive_remote(resolved.base.clone(), resolved.resource_relative.clone());
        let outcome = self.eval(target, instance, &mut rctx, &resolved.doc);
        kctx.apply_child(rctx);

        outcome
    }
}

/// Whether a property name is handled by the sibling `properties` or
/// `patternProperties` keywords, making it not "additional".
fn covered_by_siblings(object: &SchemaObject, key: &str) -> bool {
    if let Some(KeywordInstance {
        keyword: Keyword::Properties(members),
        ..
    }) = object.find("properties")
    {
        if members.iter().any(|(name, _)| name == key) {
            return true;
        }
    }

    if let Some(KeywordInstance {
        keyword: Keyword::PatternProperties(members),
        ..
    }) = object.find("patternProperties")
    {
        if members.iter().any(|(pattern, _)| pattern.regex.is_match(key)) {
            return true;
        }
    }

    false
}

/// The annotation of tuple-form item keywords: `true` when every item was
/// covered, else the largest covered index.
fn tuple_annotation(applied: usize, len: usize) -> Option<Value> {
    if applied == 0 {
        None
    } else if applied == len {
        Some(json!(true))
    } else {
        Some(json!(applied as u64 - 1))
    }
}

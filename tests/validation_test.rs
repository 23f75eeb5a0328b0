use failure::Error;
use json_schema::{Draft, Options, OutputFormat, Registry, Schema, Validator};
use serde_json::{json, Value};

fn parse(value: Value) -> Schema {
    Schema::parse(&value, Draft::default()).expect("error parsing schema")
}

fn check(schema: &Value, instance: &Value) -> bool {
    let registry = Registry::new();
    let validator = Validator::new(&registry);
    validator
        .validate(&parse(schema.clone()), instance)
        .expect("error validating instance")
        .is_valid()
}

#[test]
fn boolean_and_empty_schemas() {
    let instances = [
        json!(null),
        json!(true),
        json!(0),
        json!("s"),
        json!([1, 2]),
        json!({"a": 1}),
    ];

    for instance in &instances {
        assert!(check(&json!(true), instance));
        assert!(check(&json!({}), instance));
        assert!(!check(&json!(false), instance));
    }
}

#[test]
fn not_inverts_validity() {
    let schemas = [
        json!({"type": "string"}),
        json!({"minimum": 3}),
        json!(true),
        json!({"required": ["a"]}),
    ];
    let instances = [json!("x"), json!(5), json!({"b": 1})];

    for schema in &schemas {
        for instance in &instances {
            let direct = check(schema, instance);
            let inverted = check(&json!({ "not": schema }), instance);
            assert_eq!(direct, !inverted, "schema {} instance {}", schema, instance);
        }
    }
}

#[test]
fn combinator_cardinalities() {
    let branches = json!([{"type": "integer"}, {"minimum": 10}]);
    let combine = |keyword: &str| {
        let mut schema = serde_json::Map::new();
        schema.insert(keyword.to_owned(), branches.clone());
        Value::Object(schema)
    };

    // allOf: every branch.
    assert!(check(&combine("allOf"), &json!(12)));
    assert!(!check(&combine("allOf"), &json!(3)));
    assert!(!check(&combine("allOf"), &json!(10.5)));

    // anyOf: at least one branch.
    assert!(check(&combine("anyOf"), &json!(3)));
    assert!(check(&combine("anyOf"), &json!(10.5)));
    assert!(!check(&combine("anyOf"), &json!("ten")));

    // oneOf: exactly one branch.
    assert!(check(&combine("oneOf"), &json!(3)));
    assert!(check(&combine("oneOf"), &json!(10.5)));
    assert!(!check(&combine("oneOf"), &json!(12)));
    assert!(!check(&combine("oneOf"), &json!("ten")));
}

#[test]
fn integer_accepts_integral_floats() {
    let schema = json!({"type": "integer"});
    assert!(check(&schema, &json!(1.0)));
    assert!(check(&schema, &json!(1)));
    assert!(!check(&schema, &json!(1.5)));
    assert!(!check(&schema, &json!("1")));
}

#[test]
fn strict_types_reject_integral_floats() -> Result<(), Error> {
    let registry = Registry::new();
    let mut options = Options::new();
    options.strict_types(true);
    let validator = Validator::new_with_options(&registry, options);

    let schema = parse(json!({"type": "integer"}));
    assert!(validator.validate(&schema, &json!(1))?.is_valid());
    assert!(!validator.validate(&schema, &json!(1.0))?.is_valid());

    Ok(())
}

#[test]
fn multiple_of_is_decimal_exact() {
    let schema = json!({"multipleOf": 0.1});
    // 0.3 % 0.1 drifts in binary floats; decimals keep it exact.
    assert!(check(&schema, &json!(0.3)));
    assert!(check(&schema, &json!(1)));
    assert!(!check(&schema, &json!(0.35)));

    assert!(check(&json!({"multipleOf": 2}), &json!(8)));
    assert!(!check(&json!({"multipleOf": 2}), &json!(7)));
}

#[test]
fn const_and_enum_use_json_equality() {
    assert!(check(&json!({"const": 1}), &json!(1.0)));
    assert!(check(&json!({"enum": [1, "a"]}), &json!(1.0)));
    assert!(!check(&json!({"enum": [1, "a"]}), &json!("b")));
    assert!(check(
        &json!({"const": {"x": [1, 2]}}),
        &json!({"x": [1.0, 2]})
    ));
}

#[test]
fn string_lengths_count_code_points() {
    let schema = json!({"minLength": 2, "maxLength": 3});
    assert!(check(&schema, &json!("héé")));
    assert!(check(&schema, &json!("日本語")));
    assert!(!check(&schema, &json!("日本語です")));
    assert!(!check(&schema, &json!("x")));
    // Non-strings are out of scope for length checks.
    assert!(check(&schema, &json!(42)));
}

#[test]
fn object_keywords() {
    let schema = json!({
        "properties": {"a": {"type": "integer"}},
        "patternProperties": {"^x-": {"type": "string"}},
        "additionalProperties": {"type": "boolean"},
        "required": ["a"],
        "minProperties": 1,
        "maxProperties": 4,
    });

    assert!(check(&schema, &json!({"a": 1})));
    assert!(check(&schema, &json!({"a": 1, "x-note": "hi", "extra": true})));
    assert!(!check(&schema, &json!({"a": "one"})));
    assert!(!check(&schema, &json!({"a": 1, "x-note": 3})));
    assert!(!check(&schema, &json!({"a": 1, "extra": "not boolean"})));
    assert!(!check(&schema, &json!({"b": 2})));
}

#[test]
fn property_names_and_dependent_keywords() {
    assert!(check(
        &json!({"propertyNames": {"maxLength": 3}}),
        &json!({"ab": 1, "abc": 2})
    ));
    assert!(!check(
        &json!({"propertyNames": {"maxLength": 3}}),
        &json!({"abcd": 1})
    ));

    let dependent = json!({
        "dependentRequired": {"credit_card": ["billing_address"]},
        "dependentSchemas": {"credit_card": {"properties": {
            "billing_address": {"type": "string"},
        }}},
    });
    assert!(check(&dependent, &json!({"name": "x"})));
    assert!(check(
        &dependent,
        &json!({"credit_card": 1234, "billing_address": "1 Main St"})
    ));
    assert!(!check(&dependent, &json!({"credit_card": 1234})));
    assert!(!check(
        &dependent,
        &json!({"credit_card": 1234, "billing_address": 7})
    ));
}

#[test]
fn draft7_dependencies_both_forms() {
    let schema = json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "dependencies": {
            "a": ["b"],
            "c": {"required": ["d"]},
        },
    });

    assert!(check(&schema, &json!({})));
    assert!(check(&schema, &json!({"a": 1, "b": 2})));
    assert!(!check(&schema, &json!({"a": 1})));
    assert!(check(&schema, &json!({"c": 1, "d": 2})));
    assert!(!check(&schema, &json!({"c": 1})));
}

#[test]
fn array_keywords() {
    let schema = json!({
        "prefixItems": [{"type": "integer"}, {"type": "string"}],
        "items": {"type": "boolean"},
        "minItems": 1,
        "maxItems": 4,
        "uniqueItems": true,
    });

    assert!(check(&schema, &json!([1, "two", true])));
    assert!(!check(&schema, &json!([1, 2])));
    assert!(!check(&schema, &json!([1, "two", "three"])));
    assert!(!check(&schema, &json!([])));
    assert!(!check(&schema, &json!([1, "two", true, false, true])));
    assert!(!check(&schema, &json!([1, "1", true, true])));

    // uniqueItems compares by value, so 1 and 1.0 collide.
    assert!(!check(&json!({"uniqueItems": true}), &json!([1, 1.0])));
}

#[test]
fn legacy_tuple_items_with_additional_items() {
    let schema = json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "items": [{"type": "integer"}, {"type": "string"}],
        "additionalItems": {"type": "boolean"},
    });

    assert!(check(&schema, &json!([1, "two", true, false])));
    assert!(!check(&schema, &json!([1, "two", "three"])));
    assert!(!check(&schema, &json!(["one"])));
}

#[test]
fn contains_with_bounds() {
    let schema = json!({"contains": {"type": "string"}});
    assert!(check(&schema, &json!([1, "a"])));
    assert!(!check(&schema, &json!([1, 2])));

    let bounded = json!({
        "contains": {"type": "string"},
        "minContains": 2,
        "maxContains": 3,
    });
    assert!(check(&bounded, &json!(["a", 1, "b"])));
    assert!(!check(&bounded, &json!(["a", 1])));
    assert!(!check(&bounded, &json!(["a", "b", "c", "d"])));

    // minContains of zero allows an empty match set.
    let optional = json!({"contains": {"type": "string"}, "minContains": 0});
    assert!(check(&optional, &json!([1, 2])));
    assert!(check(&optional, &json!([])));
}

#[test]
fn if_then_else() {
    let schema = json!({
        "if": {"properties": {"kind": {"const": "card"}}},
        "then": {"required": ["number"]},
        "else": {"required": ["iban"]},
    });

    assert!(check(&schema, &json!({"kind": "card", "number": "4111"})));
    assert!(!check(&schema, &json!({"kind": "card"})));
    assert!(check(&schema, &json!({"kind": "cash", "iban": "DE00"})));
    assert!(!check(&schema, &json!({"kind": "cash"})));
}

#[test]
fn unevaluated_properties_across_all_of() {
    let schema = json!({
        "allOf": [
            {"properties": {"a": {}}},
            {"properties": {"b": {}}},
        ],
        "unevaluatedProperties": false,
    });

    assert!(check(&schema, &json!({"a": 1, "b": 2})));
    assert!(!check(&schema, &json!({"a": 1, "b": 2, "c": 3})));
}

#[test]
fn unevaluated_properties_sees_all_successful_anyof_branches() {
    let schema = json!({
        "anyOf": [
            {"properties": {"a": {"type": "integer"}}, "required": ["a"]},
            {"properties": {"b": {"type": "integer"}}, "required": ["b"]},
        ],
        "unevaluatedProperties": false,
    });

    // Both branches succeed, so both annotation sets count.
    assert!(check(&schema, &json!({"a": 1, "b": 2})));
    assert!(check(&schema, &json!({"a": 1})));
    // The failing branch's annotations are discarded.
    assert!(!check(&schema, &json!({"a": 1, "b": "two"})));
    assert!(!check(&schema, &json!({"a": 1, "c": 3})));
}

#[test]
fn unevaluated_items_after_prefix_items() {
    let schema = json!({
        "allOf": [{"prefixItems": [{"type": "integer"}]}],
        "unevaluatedItems": false,
    });

    assert!(check(&schema, &json!([1])));
    assert!(!check(&schema, &json!([1, 2])));
    assert!(check(&schema, &json!([])));

    let with_contains = json!({
        "contains": {"type": "string"},
        "unevaluatedItems": {"type": "integer"},
    });
    assert!(check(&with_contains, &json!(["s", 1, 2])));
    assert!(!check(&with_contains, &json!(["s", 1, true])));
}

#[test]
fn format_assertions_under_strict_format() -> Result<(), Error> {
    let registry = Registry::new();
    let mut options = Options::new();
    options.strict_format(true);
    let validator = Validator::new_with_options(&registry, options);

    let schema = parse(json!({"format": "uuid"}));
    assert!(validator
        .validate(&schema, &json!("123e4567-e89b-12d3-a456-426614174000"))?
        .is_valid());
    assert!(!validator.validate(&schema, &json!("not-a-uuid"))?.is_valid());
    // Non-strings never trip format predicates.
    assert!(validator.validate(&schema, &json!(17))?.is_valid());

    // Unknown formats are errors only under strict format.
    let unknown = parse(json!({"format": "zip-code"}));
    assert!(!validator.validate(&unknown, &json!("anything"))?.is_valid());
    assert!(check(&json!({"format": "zip-code"}), &json!("anything")));

    // Without any strictness, format is annotation-only.
    assert!(check(&json!({"format": "uuid"}), &json!("not-a-uuid")));

    Ok(())
}

#[test]
fn flag_matches_verbose_validity() -> Result<(), Error> {
    let registry = Registry::new();
    let validator = Validator::new(&registry);

    let cases = [
        (json!({"type": "integer"}), json!(3)),
        (json!({"type": "integer"}), json!("3")),
        (
            json!({"allOf": [{"minimum": 0}], "unevaluatedProperties": false}),
            json!({"a": 1}),
        ),
        (json!({"not": {}}), json!(null)),
        (
            json!({"oneOf": [{"type": "number"}, {"minimum": 1}]}),
            json!(5),
        ),
    ];

    for (schema, instance) in &cases {
        let evaluation = validator.validate(&parse(schema.clone()), instance)?;
        let flag = evaluation.output_with(OutputFormat::Flag);
        let verbose = evaluation.output_with(OutputFormat::Verbose);
        assert_eq!(flag.valid, verbose.valid, "schema {}", schema);
        assert_eq!(flag.valid, evaluation.is_valid());
    }

    Ok(())
}

#[test]
fn annotations_surface_in_verbose_output() -> Result<(), Error> {
    let registry = Registry::new();
    let mut options = Options::new();
    options.output_format(OutputFormat::Verbose);
    let validator = Validator::new_with_options(&registry, options);

    let schema = parse(json!({
        "title": "Widget",
        "properties": {"a": {}},
    }));
    let evaluation = validator.validate(&schema, &json!({"a": 1}))?;
    assert!(evaluation.is_valid());

    let output = evaluation.output();
    let rendered = serde_json::to_value(&output)?;
    let annotations = rendered["annotations"].as_array().expect("annotations");
    assert!(annotations
        .iter()
        .any(|unit| unit["annotation"] == json!("Widget")));
    assert!(annotations
        .iter()
        .any(|unit| unit["annotation"] == json!(["a"])));

    Ok(())
}

#[test]
fn basic_output_lists_assertion_outcomes() -> Result<(), Error> {
    let registry = Registry::new();
    let validator = Validator::new(&registry);

    let schema = parse(json!({
        "properties": {
            "a": {"type": "integer"},
            "b": {"type": "string"},
        },
    }));
    let evaluation = validator.validate(&schema, &json!({"a": "x", "b": 3}))?;
    assert!(!evaluation.is_valid());

    let basic = evaluation.output_with(OutputFormat::Basic);
    assert_eq!(basic.errors.len(), 2);
    for unit in &basic.errors {
        assert!(unit.errors.is_empty());
        assert!(unit.error.is_some());
        assert!(unit.keyword_location.is_some());
        assert!(unit.instance_location.is_some());
    }

    Ok(())
}

//! Shaping evaluation trees into the four output formats.
//!
//! The engine always produces a complete evaluation tree; this module
//! reshapes it. `flag` keeps only the root validity, `basic` flattens to
//! a list, `detailed` prunes branches that carry no information, and
//! `verbose` reproduces the whole tree.

use crate::context::Context;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Flag,
    Basic,
    Detailed,
    Verbose,
}

/// One node of a formatted output tree.
#[derive(Clone, Debug, Default, Serialize)]
pub struct OutputUnit {
    pub valid: bool,

    #[serde(rename = "keywordLocation", skip_serializing_if = "Option::is_none")]
    pub keyword_location: Option<String>,

    #[serde(
        rename = "absoluteKeywordLocation",
        skip_serializing_if = "Option::is_none"
    )]
    pub absolute_keyword_location: Option<String>,

    #[serde(rename = "instanceLocation", skip_serializing_if = "Option::is_none")]
    pub instance_location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OutputUnit>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<OutputUnit>,
}

/// Shape an evaluation tree into the requested format.
pub fn format(root: &Context, format: OutputFormat) -> OutputUnit {
    match format {
        OutputFormat::Flag => OutputUnit {
            valid: root.valid,
            ..OutputUnit::default()
        },
        OutputFormat::Basic => basic(root),
        OutputFormat::Detailed => {
            detailed(root).unwrap_or_else(|| leaf(root))
        }
        OutputFormat::Verbose => verbose(root),
    }
}

fn leaf(ctx: &Context) -> OutputUnit {
    OutputUnit {
        valid: ctx.valid,
        keyword_location: Some(ctx.keyword_location.to_string()),
        absolute_keyword_location: ctx.absolute_location(),
        instance_location: Some(ctx.instance_location.to_string()),
        error: if ctx.valid { None } else { ctx.error.clone() },
        annotation: if ctx.valid {
            ctx.annotation.clone()
        } else {
            None
        },
        errors: Vec::new(),
        annotations: Vec::new(),
    }
}

fn verbose(ctx: &Context) -> OutputUnit {
    let mut unit = leaf(ctx);
    for child in &ctx.children {
        let formatted = verbose(child);
        if child.valid {
            unit.annotations.push(formatted);
        } else {
            unit.errors.push(formatted);
        }
    }

    unit
}

fn basic(ctx: &Context) -> OutputUnit {
    let mut unit = OutputUnit {
        valid: ctx.valid,
        ..OutputUnit::default()
    };

    if ctx.valid {
        // The root's visible annotations are already the committed union,
        // with their producing locations intact.
        for annotation in &ctx.annotations {
            unit.annotations.push(OutputUnit {
                valid: true,
                keyword_location: Some(annotation.keyword_location.to_string()),
                absolute_keyword_location: annotation.absolute_location.clone(),
                instance_location: Some(annotation.instance_location.to_string()),
                annotation: Some(annotation.value.clone()),
                ..OutputUnit::default()
            });
        }
    } else {
        collect_failures(ctx, &mut unit.errors);
    }

    unit
}

/// Gather the deepest failing nodes: assertion outcomes, not the chain of
/// applicators above them.
fn collect_failures(ctx: &Context, out: &mut Vec<OutputUnit>) {
    let failing_children: Vec<_> = ctx.children.iter().filter(|child| !child.valid).collect();

    if failing_children.is_empty() {
        out.push(leaf(ctx));
        return;
    }

    // A node that failed on its own terms (oneOf cardinality, for one)
    // is an outcome too, even with failing children below it.
    if ctx.error.is_some()
        && failing_children
            .iter()
            .all(|child| child.error.as_deref() != ctx.error.as_deref())
    {
        out.push(leaf(ctx));
    }

    for child in failing_children {
        collect_failures(child, out);
    }
}

fn detailed(ctx: &Context) -> Option<OutputUnit> {
    if ctx.valid {
        let kept: Vec<_> = ctx.children.iter().filter_map(detailed).collect();
        if ctx.annotation.is_none() && kept.is_empty() {
            return None;
        }

        let mut unit = leaf(ctx);
        unit.annotations = kept;
        Some(unit)
    } else {
        let kept: Vec<_> = ctx
            .children
            .iter()
            .filter(|child| !child.valid)
            .filter_map(detailed)
            .collect();

        // Collapse pass-through chains: a node whose only failure story is
        // its single failing child adds nothing.
        let inherited = ctx.error.is_none()
            || ctx
                .children
                .iter()
                .any(|child| !child.valid && child.error == ctx.error);
        if kept.len() == 1 && inherited {
            return kept.into_iter().next();
        }

        let mut unit = leaf(ctx);
        unit.error = ctx.error.clone();
        unit.errors = kept;
        Some(unit)
    }
}

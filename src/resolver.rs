//! Static reference resolution.
//!
//! Turns a `$ref`-family URI reference into a concrete schema location:
//! split off the fragment, resolve the rest against the current base,
//! find the target document (in hand, or through the registry and its
//! fetch hook), then interpret the fragment as a JSON Pointer or an
//! anchor name. Dynamic and recursive redirection happens afterwards in
//! the engine, which owns the frame stack.

use crate::errors::SchemaError;
use crate::pointer::{is_pointer_fragment, Pointer};
use crate::registry::{Document, Registry};
use crate::uri::{split_fragment, UriRef};
use failure::Error;
use log::trace;
use std::sync::Arc;
use url::Url;

/// The outcome of static resolution.
#[derive(Debug)]
pub(crate) struct Resolved {
    pub doc: Arc<Document>,
    /// Location of the target schema from the document root.
    pub location: Pointer,
    /// The schema resource the target sits in.
    pub base: Option<Url>,
    /// The target's location relative to that resource's root.
    pub resource_relative: Pointer,
    /// True when the fragment named an anchor that is dynamic or
    /// recursive, making the reference eligible for stack redirection.
    pub dynamic: bool,
}

pub(crate) fn resolve(
    registry: &Registry,
    reference: &str,
    base_uri: &Option<Url>,
    doc: &Arc<Document>,
) -> Result<Resolved, Error> {
    let (before_fragment, fragment) = split_fragment(reference);
    trace!("resolving reference {:?} against {:?}", reference, base_uri);

    // Find the document and resource the reference points into.
    let (target_doc, resource_uri) = if before_fragment.is_empty() {
        (Arc::clone(doc), base_uri.clone())
    } else {
        let resolved = UriRef::new(reference)
            .resolve(base_uri.as_ref())?
            .ok_or_else(|| SchemaError::InvalidUri {
                uri: reference.to_owned(),
            })?;

        // The current document may embed the resource; prefer it so
        // self-contained documents resolve without a registry entry.
        if doc.resource_location(&resolved).is_some() {
            (Arc::clone(doc), Some(resolved))
        } else {
            let (fetched, _) = registry.get(&resolved)?;
            (fetched, Some(resolved))
        }
    };

    let resource_location = match &resource_uri {
        Some(uri) => target_doc
            .resource_location(uri)
            .cloned()
            .ok_or_else(|| SchemaError::UnresolvedReference {
                uri: uri.to_string(),
            })?,
        None => Pointer::root(),
    };

    let display_uri = resource_uri
        .as_ref()
        .map(|uri| uri.to_string())
        .unwrap_or_else(|| "<anonymous>".to_owned());

    // Interpret the fragment.
    let (location, dynamic) = match fragment {
        None => (resource_location, false),
        Some(f) if is_pointer_fragment(f) => {
            let tail = Pointer::parse(f).map_err(|_| SchemaError::InvalidPointer {
                pointer: f.to_owned(),
            })?;
            let location = resource_location.join(&tail);
            if target_doc.schema_at(&location).is_none() {
                return Err(SchemaError::DanglingPointer {
                    uri: display_uri,
                    pointer: f.to_owned(),
                }
                .into());
            }
            (location, false)
        }
        Some(name) => {
            let entry = target_doc.anchor(&resource_uri, name).ok_or_else(|| {
                SchemaError::MissingAnchor {
                    uri: display_uri.clone(),
                    anchor: name.to_owned(),
                }
            })?;
            (entry.location.clone(), entry.dynamic)
        }
    };

    let (base, resource_relative) = target_doc.resource_of(&location);

    Ok(Resolved {
        doc: target_doc,
        location,
        base,
        resource_relative,
        dynamic,
    })
}

//! Logic related to holding a collection of schemas together.
//!
//! The registry maps absolute, fragmentless URIs to parsed schema
//! documents. Registering a document walks it once, resolving every nested
//! `$id` into a resource entry of its own and indexing every anchor under
//! its enclosing resource. Reads take a shared lock; registration and
//! lazy fetching take the write lock, so concurrent validation calls can
//! share one registry.

use crate::draft::Draft;
use crate::errors::SchemaError;
use crate::pointer::Pointer;
use crate::schema::Schema;
use crate::uri::{strip_fragment, UriRef};
use failure::Error;
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use url::Url;

/// A fetch hook: given an absolute URI, produce the raw bytes of the
/// schema document it identifies.
pub type FetchHook = dyn Fn(&Url) -> Result<Vec<u8>, Error> + Send + Sync;

/// One schema document and its identity indexes.
#[derive(Debug)]
pub struct Document {
    /// The document's own base URI; `None` only for anonymous documents
    /// built for unregistered schemas.
    pub base: Option<Url>,
    pub draft: Draft,
    /// The JSON the document was registered from, kept for idempotency
    /// checks. Anonymous documents have none.
    pub source: Option<Value>,
    pub root: Schema,
    /// Every schema resource in the document: its absolute URI and its
    /// location within the tree. The root resource comes first.
    resources: Vec<(Option<Url>, Pointer)>,
    anchors: Vec<AnchorEntry>,
    /// True when the document arrived through the fetch hook rather than
    /// explicit registration.
    pub fetched: bool,
}

/// An anchor indexed under its enclosing schema resource.
#[derive(Clone, Debug)]
pub struct AnchorEntry {
    pub resource: Option<Url>,
    pub name: String,
    pub location: Pointer,
    /// Dynamic and recursive anchors resolve through the evaluation
    /// stack; static `$ref`s may still target them by name.
    pub dynamic: bool,
}

impl Document {
    /// Parse and index a document from JSON.
    pub fn build(
        base: Option<Url>,
        source: Value,
        default_draft: Draft,
    ) -> Result<Document, Error> {
        let root = Schema::parse(&source, default_draft)?;
        Document::from_schema(base, root, Some(source), default_draft)
    }

    /// Index an already-parsed schema.
    pub(crate) fn from_schema(
        base: Option<Url>,
        root: Schema,
        source: Option<Value>,
        default_draft: Draft,
    ) -> Result<Document, Error> {
        let draft = root
            .as_object()
            .map(|object| object.draft)
            .unwrap_or(default_draft);

        // The root's own $id, if any, refines the registration URI.
        let effective_base = match root.as_object().and_then(|object| object.id.as_ref()) {
            Some(raw) => UriRef::new(raw).resolve(base.as_ref())?,
            None => base,
        };

        let mut document = Document {
            base: effective_base.clone(),
            draft,
            source,
            root,
            resources: Vec::new(),
            anchors: Vec::new(),
            fetched: false,
        };

        document
            .resources
            .push((effective_base.clone(), Pointer::root()));
        index_schema(
            &document.root,
            true,
            &effective_base,
            &mut Pointer::root(),
            &mut document.resources,
            &mut document.anchors,
        )?;

        Ok(document)
    }

    /// All resource URIs and their locations, root first.
    pub fn resources(&self) -> &[(Option<Url>, Pointer)] {
        &self.resources
    }

    pub fn resource_location(&self, uri: &Url) -> Option<&Pointer> {
        self.resources
            .iter()
            .find(|(resource, _)| resource.as_ref() == Some(uri))
            .map(|(_, location)| location)
    }

    /// Look up an anchor declared within the given resource.
    pub fn anchor(&self, resource: &Option<Url>, name: &str) -> Option<&AnchorEntry> {
        self.anchors
            .iter()
            .find(|entry| entry.resource == *resource && entry.name == name)
    }

    pub fn schema_at(&self, location: &Pointer) -> Option<&Schema> {
        self.root.at_pointer(location.tokens())
    }

    /// The innermost schema resource enclosing `location`: its URI and
    /// the location's remainder relative to that resource's root.
    pub fn resource_of(&self, location: &Pointer) -> (Option<Url>, Pointer) {
        let mut best: &(Option<Url>, Pointer) = &self.resources[0];
        for candidate in &self.resources {
            if location.starts_with(&candidate.1)
                && candidate.1.tokens().len() >= best.1.tokens().len()
            {
                best = candidate;
            }
        }

        let relative = Pointer::new(location.tokens()[best.1.tokens().len()..].to_vec());
        (best.0.clone(), relative)
    }
}

fn index_schema(
    schema: &Schema,
    is_root: bool,
    base: &Option<Url>,
    location: &mut Pointer,
    resources: &mut Vec<(Option<Url>, Pointer)>,
    anchors: &mut Vec<AnchorEntry>,
) -> Result<(), Error> {
    let object = match schema.as_object() {
        Some(object) => object,
        None => return Ok(()),
    };

    let mut current_base = base.clone();
    if !is_root {
        if let Some(raw) = &object.id {
            let resolved = UriRef::new(raw).resolve(base.as_ref())?;
            resources.push((resolved.clone(), location.clone()));
            current_base = resolved;
        }
    }

    if let Some(name) = &object.anchor {
        anchors.push(AnchorEntry {
            resource: current_base.clone(),
            name: name.clone(),
            location: location.clone(),
            dynamic: false,
        });
    }

    if let Some(name) = &object.dynamic_anchor {
        anchors.push(AnchorEntry {
            resource: current_base.clone(),
            name: name.clone(),
            location: location.clone(),
            dynamic: true,
        });
    }

    for instance in &object.keywords {
        for (path, sub) in instance.subschemas() {
            for token in &path {
                location.push(token.clone());
            }
            index_schema(sub, false, &current_base, location, resources, anchors)?;
            for _ in &path {
                location.pop();
            }
        }
    }

    Ok(())
}

#[derive(Clone)]
struct Entry {
    doc: Arc<Document>,
    location: Pointer,
}

/// Holds a collection of schema documents, keyed by absolute URI.
pub struct Registry {
    entries: RwLock<HashMap<Url, Entry>>,
    fetch: Option<Box<FetchHook>>,
    default_draft: Draft,
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

impl Registry {
    /// Construct a new, empty registry.
    pub fn new() -> Registry {
        Registry::new_with_draft(Draft::default())
    }

    /// A registry whose documents parse under the given default draft
    /// when they carry no `$schema` of their own.
    pub fn new_with_draft(default_draft: Draft) -> Registry {
        Registry {
            entries: RwLock::new(HashMap::new()),
            fetch: None,
            default_draft,
        }
    }

    /// Install a fetch hook. URIs that are not registered will be fetched
    /// through it on first use; without a hook they are unresolved
    /// errors.
    pub fn set_fetch<F>(&mut self, hook: F)
    where
        F: Fn(&Url) -> Result<Vec<u8>, Error> + Send + Sync + 'static,
    {
        self.fetch = Some(Box::new(hook));
    }

    /// Add a schema document to the registry under `uri`.
    ///
    /// Every nested `$id` becomes a resource entry of its own. Registering
    /// the same document twice is a no-op; registering a *different*
    /// document under an occupied URI is an error.
    pub fn register(&self, uri: &Url, source: Value) -> Result<(), Error> {
        let document = Document::build(
            Some(strip_fragment(uri.clone())),
            source,
            self.default_draft,
        )?;

        self.insert(uri, document)
    }

    fn insert(&self, uri: &Url, document: Document) -> Result<(), Error> {
        let document = Arc::new(document);
        let mut entries = self.entries.write().expect("registry poisoned");

        let mut keys: Vec<(Url, Pointer)> = Vec::new();
        let register_key = strip_fragment(uri.clone());
        keys.push((register_key, Pointer::root()));
        for (resource, location) in document.resources() {
            if let Some(resource) = resource {
                keys.push((resource.clone(), location.clone()));
            }
        }

        for (key, location) in &keys {
            if let Some(existing) = entries.get(key) {
                let same = existing.doc.source == document.source
                    && existing.location == *location;
                if !same {
                    return Err(SchemaError::DuplicateId {
                        uri: key.to_string(),
                    }
                    .into());
                }
            }
        }

        for (key, location) in keys {
            entries.entry(key).or_insert_with(|| Entry {
                doc: Arc::clone(&document),
                location,
            });
        }

        Ok(())
    }

    pub fn contains(&self, uri: &Url) -> bool {
        let entries = self.entries.read().expect("registry poisoned");
        entries.contains_key(uri)
    }

    /// Get the document and resource location for `uri`, fetching it
    /// through the hook if necessary.
    pub fn get(&self, uri: &Url) -> Result<(Arc<Document>, Pointer), Error> {
        let key = strip_fragment(uri.clone());

        {
            let entries = self.entries.read().expect("registry poisoned");
            if let Some(entry) = entries.get(&key) {
                return Ok((Arc::clone(&entry.doc), entry.location.clone()));
            }
        }

        let hook = match &self.fetch {
            Some(hook) => hook,
            None => {
                return Err(SchemaError::UnresolvedReference {
                    uri: uri.to_string(),
                }
                .into())
            }
        };

        debug!("fetching schema document {}", key);
        let bytes = hook(&key).map_err(|_| SchemaError::UnresolvedReference {
            uri: uri.to_string(),
        })?;
        let source: Value =
            serde_json::from_slice(&bytes).map_err(|_| SchemaError::UnresolvedReference {
                uri: uri.to_string(),
            })?;

        let mut document =
            Document::build(Some(key.clone()), source, self.default_draft)?;
        document.fetched = true;
        self.insert(&key, document)?;

        let entries = self.entries.read().expect("registry poisoned");
        let entry = entries
            .get(&key)
            .expect("unreachable: entry inserted just above");
        Ok((Arc::clone(&entry.doc), entry.location.clone()))
    }

    /// Look up an anchored subschema within the document identified by
    /// `uri`.
    pub fn anchor(&self, uri: &Url, name: &str) -> Result<(Arc<Document>, AnchorEntry), Error> {
        let key = strip_fragment(uri.clone());
        let (doc, _) = self.get(&key)?;
        let entry = doc
            .anchor(&Some(key.clone()), name)
            .cloned()
            .ok_or(SchemaError::MissingAnchor {
                uri: key.to_string(),
                anchor: name.to_owned(),
            })?;

        Ok((doc, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn url(s: &str) -> Url {
        s.parse().unwrap()
    }

    #[test]
    fn register_and_get() {
        let registry = Registry::new();
        registry
            .register(
                &url("https://example.com/root"),
                json!({
                    "$defs": {
                        "leaf": { "$id": "https://example.com/leaf", "type": "string" },
                        "named": { "$anchor": "here", "type": "integer" },
                        "moving": { "$dynamicAnchor": "T" },
                    },
                }),
            )
            .unwrap();

        let (doc, location) = registry.get(&url("https://example.com/root")).unwrap();
        assert!(location.is_root());
        assert_eq!(doc.base, Some(url("https://example.com/root")));

        // The embedded resource is addressable on its own.
        let (leaf_doc, leaf_location) = registry.get(&url("https://example.com/leaf")).unwrap();
        assert_eq!(leaf_location.to_string(), "/$defs/leaf");
        assert!(leaf_doc.schema_at(&leaf_location).is_some());

        let (_, here) = registry
            .anchor(&url("https://example.com/root"), "here")
            .unwrap();
        assert_eq!(here.location.to_string(), "/$defs/named");
        assert!(!here.dynamic);

        let (_, moving) = registry
            .anchor(&url("https://example.com/root"), "T")
            .unwrap();
        assert!(moving.dynamic);

        assert!(registry
            .anchor(&url("https://example.com/root"), "absent")
            .is_err());
    }

    #[test]
    fn nested_ids_resolve_against_the_enclosing_base() {
        let registry = Registry::new();
        registry
            .register(
                &url("https://example.com/dir/root.json"),
                json!({
                    "$defs": {
                        "sibling": { "$id": "sibling.json" },
                        "rooted": { "$id": "/rooted" },
                    },
                }),
            )
            .unwrap();

        assert!(registry.contains(&url("https://example.com/dir/sibling.json")));
        assert!(registry.contains(&url("https://example.com/rooted")));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = Registry::new();
        let uri = url("https://example.com/schema");
        registry.register(&uri, json!({"type": "string"})).unwrap();

        // Same document again: idempotent.
        registry.register(&uri, json!({"type": "string"})).unwrap();

        // A different document under the same URI: rejected.
        let err = registry
            .register(&uri, json!({"type": "integer"}))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn unresolved_without_a_hook() {
        let registry = Registry::new();
        assert!(registry.get(&url("https://example.com/absent")).is_err());
    }

    #[test]
    fn lazy_fetch_is_idempotent() {
        let mut registry = Registry::new();
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        registry.set_fetch(|uri: &Url| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            if uri.as_str() == "https://example.com/fetched" {
                Ok(br#"{"type": "boolean"}"#.to_vec())
            } else {
                Err(failure::err_msg("unknown uri"))
            }
        });

        let uri = url("https://example.com/fetched");
        let (doc, _) = registry.get(&uri).unwrap();
        assert!(doc.fetched);
        let _ = registry.get(&uri).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);

        assert!(registry.get(&url("https://example.com/other")).is_err());
    }
}

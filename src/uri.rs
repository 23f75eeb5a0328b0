//! URI handling for schema identity and reference resolution.
//!
//! Registry keys and schema bases are absolute, fragmentless [`Url`]s.
//! Reference strings stay around in their original form for diagnostics;
//! comparison always happens on the normalized parsed form.

use crate::errors::SchemaError;
use failure::Error;
use url::Url;

/// A URI reference as written in a schema, classified but not yet resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct UriRef {
    raw: String,
    kind: UriRefKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UriRefKind {
    /// Parses on its own, e.g. `https://example.com/schema`.
    Absolute(Url),
    /// Must be joined against a base, e.g. `sibling.json` or `/other`.
    Relative,
    /// Only a fragment, e.g. `#/$defs/foo` or `#anchor`.
    FragmentOnly,
}

impl UriRef {
    pub fn new(raw: &str) -> UriRef {
        let kind = if raw.starts_with('#') {
            UriRefKind::FragmentOnly
        } else {
            match Url::parse(raw) {
                Ok(url) => UriRefKind::Absolute(url),
                Err(_) => UriRefKind::Relative,
            }
        };

        UriRef {
            raw: raw.to_owned(),
            kind,
        }
    }

    /// The reference exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &UriRefKind {
        &self.kind
    }

    /// The fragment part, without `#`, if one is present.
    pub fn fragment(&self) -> Option<&str> {
        split_fragment(&self.raw).1
    }

    /// Resolve against an optional base, dropping any fragment.
    ///
    /// Fragment-only references resolve to the base itself. A relative
    /// reference without a base is an error; an absolute reference ignores
    /// the base entirely.
    pub fn resolve(&self, base: Option<&Url>) -> Result<Option<Url>, Error> {
        let (before_fragment, _) = split_fragment(&self.raw);

        match self.kind {
            UriRefKind::Absolute(_) => {
                let url = Url::parse(before_fragment).map_err(|_| SchemaError::InvalidUri {
                    uri: self.raw.clone(),
                })?;
                Ok(Some(strip_fragment(url)))
            }
            UriRefKind::FragmentOnly => Ok(base.cloned().map(strip_fragment)),
            UriRefKind::Relative => match base {
                Some(base) => {
                    let url = base
                        .join(before_fragment)
                        .map_err(|_| SchemaError::InvalidUri {
                            uri: self.raw.clone(),
                        })?;
                    Ok(Some(strip_fragment(url)))
                }
                None => Err(SchemaError::RelativeRefFromAnonymousSchema.into()),
            },
        }
    }
}

/// Split a reference string into the part before `#` and the fragment.
pub fn split_fragment(s: &str) -> (&str, Option<&str>) {
    match s.find('#') {
        Some(at) => (&s[..at], Some(&s[at + 1..])),
        None => (s, None),
    }
}

/// Drop the fragment from a URL, returning the normalized identity form.
pub fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// Parse an absolute, fragmentless URI for use as a registry key.
pub fn parse_absolute(s: &str) -> Result<Url, Error> {
    let (base, fragment) = split_fragment(s);
    if fragment.map(|f| !f.is_empty()).unwrap_or(false) {
        return Err(SchemaError::InvalidUri { uri: s.to_owned() }.into());
    }

    Url::parse(base).map_err(|_| SchemaError::InvalidUri { uri: s.to_owned() }.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify() {
        assert!(matches!(
            UriRef::new("https://example.com/a").kind(),
            UriRefKind::Absolute(_)
        ));
        assert!(matches!(
            UriRef::new("sibling.json").kind(),
            UriRefKind::Relative
        ));
        assert!(matches!(
            UriRef::new("/rooted#frag").kind(),
            UriRefKind::Relative
        ));
        assert!(matches!(
            UriRef::new("#/$defs/a").kind(),
            UriRefKind::FragmentOnly
        ));
    }

    #[test]
    fn resolve() {
        let base: Url = "https://example.com/dir/schema.json".parse().unwrap();

        let target = |raw: &str| {
            UriRef::new(raw)
                .resolve(Some(&base))
                .unwrap()
                .unwrap()
                .to_string()
        };

        assert_eq!(target("other.json"), "https://example.com/dir/other.json");
        assert_eq!(target("/rooted"), "https://example.com/rooted");
        assert_eq!(target("//host.example.com/x"), "https://host.example.com/x");
        assert_eq!(
            target("https://elsewhere.com/s#frag"),
            "https://elsewhere.com/s"
        );
        assert_eq!(
            target("#/$defs/a"),
            "https://example.com/dir/schema.json"
        );

        assert!(UriRef::new("relative").resolve(None).is_err());
        assert_eq!(UriRef::new("#anchor").resolve(None).unwrap(), None);
    }

    #[test]
    fn fragments() {
        assert_eq!(split_fragment("a#b"), ("a", Some("b")));
        assert_eq!(split_fragment("a#"), ("a", Some("")));
        assert_eq!(split_fragment("a"), ("a", None));
        assert_eq!(UriRef::new("x.json#/a/b").fragment(), Some("/a/b"));
    }
}

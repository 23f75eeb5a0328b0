//! JSON Pointer (RFC 6901) and Relative JSON Pointer support.
//!
//! Pointers are used in two roles throughout this crate: as navigable paths
//! into instance and schema documents, and as the serialized locations that
//! appear in validation output. Navigation distinguishes "found a value"
//! from "nothing there" -- a pointer that lands on JSON `null` is a hit.

use crate::errors::SchemaError;
use failure::Error;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A parsed JSON Pointer.
///
/// The empty pointer (`""`) addresses the whole document. Tokens are stored
/// unescaped; `~0`/`~1` escaping is applied only when rendering or parsing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pointer {
    tokens: Vec<String>,
}

impl Pointer {
    /// The pointer addressing the whole document.
    pub fn root() -> Pointer {
        Pointer { tokens: Vec::new() }
    }

    /// Construct a pointer from pre-split, unescaped tokens.
    pub fn new<T: Into<String>>(tokens: Vec<T>) -> Pointer {
        Pointer {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a pointer from its string form.
    ///
    /// The string must be empty or begin with `/`. `~1` unescapes to `/`
    /// and `~0` to `~`; a `~` followed by anything else is malformed.
    pub fn parse(s: &str) -> Result<Pointer, Error> {
        if s.is_empty() {
            return Ok(Pointer::root());
        }

        if !s.starts_with('/') {
            return Err(SchemaError::InvalidPointer {
                pointer: s.to_owned(),
            }
            .into());
        }

        let mut tokens = Vec::new();
        for raw in s[1..].split('/') {
            tokens.push(unescape(raw).ok_or(SchemaError::InvalidPointer {
                pointer: s.to_owned(),
            })?);
        }

        Ok(Pointer { tokens })
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Append a token in place.
    pub fn push<T: Into<String>>(&mut self, token: T) {
        self.tokens.push(token.into());
    }

    /// Remove the last token.
    pub fn pop(&mut self) -> Option<String> {
        self.tokens.pop()
    }

    /// A new pointer with `token` appended.
    pub fn child<T: Into<String>>(&self, token: T) -> Pointer {
        let mut tokens = self.tokens.clone();
        tokens.push(token.into());
        Pointer { tokens }
    }

    /// Whether `prefix` is a leading path of this pointer.
    pub fn starts_with(&self, prefix: &Pointer) -> bool {
        self.tokens.len() >= prefix.tokens.len()
            && self.tokens[..prefix.tokens.len()] == prefix.tokens[..]
    }

    /// A new pointer with all of `other`'s tokens appended.
    pub fn join(&self, other: &Pointer) -> Pointer {
        let mut tokens = self.tokens.clone();
        tokens.extend(other.tokens.iter().cloned());
        Pointer { tokens }
    }

    /// Navigate `value` by this pointer.
    ///
    /// Returns `None` when the pointer does not resolve. Array tokens must
    /// be canonical base-10 indices; `-` (the "past the end" token) never
    /// resolves.
    pub fn eval<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let mut current = value;
        for token in &self.tokens {
            current = match current {
                Value::Object(map) => map.get(token)?,
                Value::Array(items) => items.get(parse_index(token)?)?,
                _ => return None,
            };
        }

        Some(current)
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", escape(token))?;
        }

        Ok(())
    }
}

impl FromStr for Pointer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Pointer, Error> {
        Pointer::parse(s)
    }
}

/// A Relative JSON Pointer: an ancestor count followed by either a plain
/// pointer or `#`.
///
/// `2/foo` walks two levels up from the current location and then descends
/// to `foo`; `0#` yields the name or index of the current location itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelativePointer {
    up: usize,
    target: RelativeTarget,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum RelativeTarget {
    Pointer(Pointer),
    Member,
}

impl RelativePointer {
    pub fn parse(s: &str) -> Result<RelativePointer, Error> {
        let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
            return Err(SchemaError::InvalidPointer {
                pointer: s.to_owned(),
            }
            .into());
        }

        let up = digits.parse().map_err(|_| SchemaError::InvalidPointer {
            pointer: s.to_owned(),
        })?;

        let rest = &s[digits.len()..];
        let target = if rest == "#" {
            RelativeTarget::Member
        } else {
            RelativeTarget::Pointer(Pointer::parse(rest)?)
        };

        Ok(RelativePointer { up, target })
    }

    /// Evaluate against `root`, starting from the value addressed by
    /// `location`.
    ///
    /// The `#` form synthesizes the final name or index of the adjusted
    /// location as a JSON value; the pointer form navigates onward and
    /// clones the result.
    pub fn eval(&self, root: &Value, location: &Pointer) -> Option<Value> {
        if self.up > location.tokens.len() {
            return None;
        }

        let base = &location.tokens[..location.tokens.len() - self.up];

        match self.target {
            RelativeTarget::Member => {
                let token = base.last()?;
                Some(match token.parse::<u64>() {
                    Ok(index) => Value::from(index),
                    Err(_) => Value::from(token.as_str()),
                })
            }
            RelativeTarget::Pointer(ref tail) => {
                let adjusted = Pointer::new(base.to_vec()).join(tail);
                adjusted.eval(root).cloned()
            }
        }
    }
}

impl fmt::Display for RelativePointer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.up)?;
        match self.target {
            RelativeTarget::Member => write!(f, "#"),
            RelativeTarget::Pointer(ref pointer) => write!(f, "{}", pointer),
        }
    }
}

impl FromStr for RelativePointer {
    type Err = Error;

    fn from_str(s: &str) -> Result<RelativePointer, Error> {
        RelativePointer::parse(s)
    }
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }

    Some(out)
}

fn parse_index(token: &str) -> Option<usize> {
    // Leading zeros are not canonical indices per RFC 6901.
    if token == "0" {
        return Some(0);
    }

    if token.starts_with('0') || token.starts_with('+') {
        return None;
    }

    token.parse().ok()
}

/// Whether a reference fragment should be interpreted as a JSON Pointer
/// rather than an anchor name.
pub fn is_pointer_fragment(fragment: &str) -> bool {
    fragment.is_empty() || fragment.starts_with('/')
}

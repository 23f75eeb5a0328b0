//! Draft identification and per-draft keyword applicability.

use std::fmt;

/// The JSON Schema drafts this crate understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Draft {
    Draft6,
    Draft7,
    Draft201909,
    Draft202012,
}

impl Draft {
    /// Identify a draft from a `$schema` value.
    ///
    /// Both `http` and `https` forms are accepted, with or without a
    /// trailing empty fragment.
    pub fn from_meta_schema(uri: &str) -> Option<Draft> {
        let trimmed = uri
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('#');

        match trimmed {
            "json-schema.org/draft-06/schema" => Some(Draft::Draft6),
            "json-schema.org/draft-07/schema" => Some(Draft::Draft7),
            "json-schema.org/draft/2019-09/schema" => Some(Draft::Draft201909),
            "json-schema.org/draft/2020-12/schema" => Some(Draft::Draft202012),
            _ => None,
        }
    }

    pub fn meta_schema(&self) -> &'static str {
        match self {
            Draft::Draft6 => "http://json-schema.org/draft-06/schema#",
            Draft::Draft7 => "http://json-schema.org/draft-07/schema#",
            Draft::Draft201909 => "https://json-schema.org/draft/2019-09/schema",
            Draft::Draft202012 => "https://json-schema.org/draft/2020-12/schema",
        }
    }
}

impl Default for Draft {
    fn default() -> Draft {
        Draft::Draft202012
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Draft::Draft6 => "draft-06",
            Draft::Draft7 => "draft-07",
            Draft::Draft201909 => "2019-09",
            Draft::Draft202012 => "2020-12",
        };
        f.write_str(name)
    }
}

/// The set of drafts a keyword descriptor applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DraftSet {
    from: Draft,
    until: Draft,
}

impl DraftSet {
    pub const ALL: DraftSet = DraftSet {
        from: Draft::Draft6,
        until: Draft::Draft202012,
    };

    pub const fn since(from: Draft) -> DraftSet {
        DraftSet {
            from,
            until: Draft::Draft202012,
        }
    }

    pub const fn until(until: Draft) -> DraftSet {
        DraftSet {
            from: Draft::Draft6,
            until,
        }
    }

    pub const fn only(draft: Draft) -> DraftSet {
        DraftSet {
            from: draft,
            until: draft,
        }
    }

    pub fn contains(&self, draft: Draft) -> bool {
        self.from <= draft && draft <= self.until
    }
}

#![forbid(unsafe_code)]

//! Resource identity for widgets and panel regions.
//!
//! A [`Uri`] is the stable name everything in the shell hangs off: widget
//! factories match on it, the widget manager derives cache ids from it, and
//! the layout restorer persists it. The shape is
//! `scheme://authority/path?query#fragment`.
//!
//! # Invariants
//!
//! - `Uri::parse(u.to_string())` reproduces `u` exactly.
//! - Query pairs keep their textual order; no percent-decoding is applied.
//! - Widget identity derives from [`Uri::without_query`], so two URIs that
//!   differ only in query name the same widget. Query parameters are open
//!   options, not identity.

use std::collections::HashMap;
use std::fmt;

/// Parse failure for a URI string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// The string has no `scheme:` prefix.
    MissingScheme(String),
}

impl fmt::Display for UriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingScheme(s) => write!(f, "uri has no scheme: {s:?}"),
        }
    }
}

impl std::error::Error for UriError {}

/// Captured `:param` values from a successful pattern match.
pub type UriParams = HashMap<String, String>;

/// A parsed resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Uri {
    scheme: String,
    authority: String,
    path: String,
    query: String,
    fragment: String,
}

impl Uri {
    /// Parse a URI from its string form.
    pub fn parse(input: &str) -> Result<Self, UriError> {
        let Some(colon) = input.find(':') else {
            return Err(UriError::MissingScheme(input.to_string()));
        };
        let scheme = &input[..colon];
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '*'))
        {
            return Err(UriError::MissingScheme(input.to_string()));
        }

        let mut rest = &input[colon + 1..];
        let fragment = match rest.find('#') {
            Some(i) => {
                let f = rest[i + 1..].to_string();
                rest = &rest[..i];
                f
            }
            None => String::new(),
        };
        let query = match rest.find('?') {
            Some(i) => {
                let q = rest[i + 1..].to_string();
                rest = &rest[..i];
                q
            }
            None => String::new(),
        };

        let (authority, path) = if let Some(after) = rest.strip_prefix("//") {
            match after.find('/') {
                Some(i) => (after[..i].to_string(), after[i..].to_string()),
                None => (after.to_string(), String::new()),
            }
        } else {
            (String::new(), rest.to_string())
        };

        Ok(Self {
            scheme: scheme.to_string(),
            authority,
            path,
            query,
            fragment,
        })
    }

    /// Build a URI from a scheme and absolute path.
    #[must_use]
    pub fn from_path(scheme: &str, path: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            scheme: scheme.to_string(),
            path,
            ..Self::default()
        }
    }

    /// Scheme component.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Authority component (may be empty).
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Path component (leading slash included when present).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string without the leading `?`.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Fragment without the leading `#`.
    #[must_use]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Last non-empty path segment, falling back to authority then scheme.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if let Some(seg) = self.path.rsplit('/').find(|s| !s.is_empty()) {
            return seg;
        }
        if !self.authority.is_empty() {
            return &self.authority;
        }
        &self.scheme
    }

    /// Parent location: the path with its last non-empty segment removed.
    ///
    /// The root path is its own parent. Query and fragment are dropped.
    #[must_use]
    pub fn parent(&self) -> Uri {
        let normalized = normalize_path(&self.path);
        let parent_path = match normalized.rfind('/') {
            Some(0) => "/".to_string(),
            Some(i) => normalized[..i].to_string(),
            None => normalized,
        };
        Uri {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path: parent_path,
            query: String::new(),
            fragment: String::new(),
        }
    }

    /// Replace the scheme.
    #[must_use]
    pub fn with_scheme(&self, scheme: &str) -> Uri {
        Uri {
            scheme: scheme.to_string(),
            ..self.clone()
        }
    }

    /// Replace the authority.
    #[must_use]
    pub fn with_authority(&self, authority: &str) -> Uri {
        Uri {
            authority: authority.to_string(),
            ..self.clone()
        }
    }

    /// Replace the path.
    #[must_use]
    pub fn with_path(&self, path: &str) -> Uri {
        Uri {
            path: path.to_string(),
            ..self.clone()
        }
    }

    /// Replace the raw query string.
    #[must_use]
    pub fn with_query(&self, query: &str) -> Uri {
        Uri {
            query: query.to_string(),
            ..self.clone()
        }
    }

    /// Replace the fragment.
    #[must_use]
    pub fn with_fragment(&self, fragment: &str) -> Uri {
        Uri {
            fragment: fragment.to_string(),
            ..self.clone()
        }
    }

    /// Drop the query component. This is the identity form used for widget
    /// cache keys.
    #[must_use]
    pub fn without_query(&self) -> Uri {
        self.with_query("")
    }

    /// Drop the fragment component.
    #[must_use]
    pub fn without_fragment(&self) -> Uri {
        self.with_fragment("")
    }

    /// Query string parsed into ordered key/value pairs.
    ///
    /// Pairs split on `&` and `=`; values may be empty. No decoding.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        if self.query.is_empty() {
            return Vec::new();
        }
        self.query
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (part.to_string(), String::new()),
            })
            .collect()
    }

    /// Merge key/value pairs into the query. Existing keys are updated in
    /// place; new keys append in the given order.
    #[must_use]
    pub fn add_query_pairs(&self, pairs: &[(String, String)]) -> Uri {
        let mut existing = self.query_pairs();
        for (k, v) in pairs {
            match existing.iter_mut().find(|(ek, _)| ek == k) {
                Some(entry) => entry.1 = v.clone(),
                None => existing.push((k.clone(), v.clone())),
            }
        }
        self.with_query(&encode_query(&existing))
    }

    /// Remove the named keys from the query.
    #[must_use]
    pub fn remove_query_keys(&self, keys: &[&str]) -> Uri {
        let remaining: Vec<(String, String)> = self
            .query_pairs()
            .into_iter()
            .filter(|(k, _)| !keys.contains(&k.as_str()))
            .collect();
        self.with_query(&encode_query(&remaining))
    }

    /// Whether `self` names the same location as `other` or an ancestor of
    /// it. Scheme and authority must match exactly; query and fragment are
    /// ignored.
    #[must_use]
    pub fn is_equal_or_parent(&self, other: &Uri) -> bool {
        if self.scheme != other.scheme || self.authority != other.authority {
            return false;
        }
        let a = normalize_path(&self.path);
        let b = normalize_path(&other.path);
        a == b || a == "/" || b.starts_with(&format!("{a}/"))
    }

    /// Match against a URI-shaped pattern, capturing `:name` segments.
    ///
    /// Pattern scheme and authority may be `*` to match anything. Path
    /// segments match literally, `:name` captures a single segment, a
    /// mid-pattern `*` matches exactly one segment, and a trailing `*`
    /// matches any remainder (including none). Query and fragment in the
    /// pattern are ignored.
    #[must_use]
    pub fn match_pattern(&self, pattern: &str) -> Option<UriParams> {
        let pat = Uri::parse(pattern).ok()?;
        if pat.scheme != "*" && pat.scheme != self.scheme {
            return None;
        }
        if pat.authority != "*" && pat.authority != self.authority {
            return None;
        }

        let pat_path = normalize_path(&pat.path);
        let own_path = normalize_path(&self.path);
        let pat_segs: Vec<&str> = pat_path.split('/').filter(|s| !s.is_empty()).collect();
        let own_segs: Vec<&str> = own_path.split('/').filter(|s| !s.is_empty()).collect();

        let mut params = UriParams::new();
        let mut i = 0;
        for (idx, pseg) in pat_segs.iter().enumerate() {
            if *pseg == "*" {
                if idx + 1 == pat_segs.len() {
                    return Some(params);
                }
                if i >= own_segs.len() {
                    return None;
                }
                i += 1;
            } else if let Some(name) = pseg.strip_prefix(':') {
                let Some(seg) = own_segs.get(i) else {
                    return None;
                };
                params.insert(name.to_string(), (*seg).to_string());
                i += 1;
            } else {
                if own_segs.get(i) != Some(pseg) {
                    return None;
                }
                i += 1;
            }
        }
        if i == own_segs.len() { Some(params) } else { None }
    }
}

/// Join pairs back into a raw query string.
fn encode_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                k.clone()
            } else {
                format!("{k}={v}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Collapse duplicate slashes and trailing slash (root stays `/`).
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if !self.authority.is_empty() || self.path.starts_with('/') {
            write!(f, "//{}", self.authority)?;
        }
        write!(f, "{}", self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

impl serde::Serialize for Uri {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Uri {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Uri::parse(&s).map_err(serde::de::Error::custom)
    }
}

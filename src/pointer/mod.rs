//! # JSON Pointer (RFC 6901)
//!
//! A strict implementation of JSON Pointer parsing, formatting, and
//! resolution against a `serde_json::Value` document. Percent-decoding is
//! deliberately *not* performed here — that only applies when a pointer is
//! derived from a URI fragment, which is [`crate::reference`]'s job.

use crate::errors::CoreError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// An ordered sequence of unescaped path segments. The empty sequence
/// denotes the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Pointer(Vec<String>);

impl Pointer {
    /// The pointer referring to the whole document.
    pub fn root() -> Self {
        Pointer(Vec::new())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Pointer(segments.into_iter().map(Into::into).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn push<S: Into<String>>(&self, segment: S) -> Self {
        let mut next = self.0.clone();
        next.push(segment.into());
        Pointer(next)
    }

    pub fn parent(&self) -> Option<Pointer> {
        if self.0.is_empty() {
            None
        } else {
            Some(Pointer(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Parse a pointer string per RFC 6901. No percent-decoding happens
    /// here; callers resolving a URI fragment must decode first.
    pub fn parse(raw: &str) -> Result<Pointer, CoreError> {
        if raw.is_empty() {
            return Ok(Pointer::root());
        }
        if !raw.starts_with('/') {
            return Err(CoreError::parse(
                Pointer::root(),
                format!("malformed pointer '{raw}': must be empty or start with '/'"),
            ));
        }
        let mut segments = Vec::new();
        for token in raw[1..].split('/') {
            segments.push(unescape_token(token)?);
        }
        Ok(Pointer(segments))
    }

    /// Resolve this pointer against `doc`, returning a borrowed reference to
    /// the target value.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Result<&'a Value, CoreError> {
        let mut current = doc;
        for (i, segment) in self.0.iter().enumerate() {
            current = step(current, segment, &self.prefix(i))?;
        }
        Ok(current)
    }

    /// Resolve this pointer against `doc`, returning a mutable reference.
    pub fn resolve_mut<'a>(&self, doc: &'a mut Value) -> Result<&'a mut Value, CoreError> {
        let mut current = doc;
        for (i, segment) in self.0.iter().enumerate() {
            current = step_mut(current, segment, &self.prefix(i))?;
        }
        Ok(current)
    }

    pub fn exists(&self, doc: &Value) -> bool {
        self.resolve(doc).is_ok()
    }

    /// Set the value at this pointer. Creating intermediate containers as
    /// needed is *not* supported; the parent container must already exist.
    /// `-` as the final array segment appends.
    pub fn set(&self, doc: &mut Value, value: Value) -> Result<(), CoreError> {
        if self.0.is_empty() {
            *doc = value;
            return Ok(());
        }
        let parent_ptr = Pointer(self.0[..self.0.len() - 1].to_vec());
        let last = &self.0[self.0.len() - 1];
        let parent = parent_ptr.resolve_mut(doc)?;
        match parent {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            Value::Array(arr) => {
                if last == "-" {
                    arr.push(value);
                    Ok(())
                } else {
                    let idx = parse_array_index(last, &parent_ptr)?;
                    if idx < arr.len() {
                        arr[idx] = value;
                        Ok(())
                    } else if idx == arr.len() {
                        arr.push(value);
                        Ok(())
                    } else {
                        Err(CoreError::reference(
                            parent_ptr,
                            format!("array index out of range: {idx}"),
                        ))
                    }
                }
            }
            _ => Err(CoreError::reference(parent_ptr, "not a container")),
        }
    }

    /// Enumerate every pointer reachable in `doc`, optionally restricted to
    /// those beneath `prefix`. Containers and leaves are both included.
    pub fn list_pointers(doc: &Value, prefix: Option<&Pointer>) -> Vec<Pointer> {
        let base = prefix.cloned().unwrap_or_default();
        let root_value = match base.resolve(doc) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };
        let mut out = Vec::new();
        walk(root_value, &base, &mut out);
        out
    }

    fn prefix(&self, up_to: usize) -> Pointer {
        Pointer(self.0[..up_to].to_vec())
    }
}

fn walk(value: &Value, at: &Pointer, out: &mut Vec<Pointer>) {
    out.push(at.clone());
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                walk(v, &at.push(k), out);
            }
        }
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                walk(v, &at.push(i.to_string()), out);
            }
        }
        _ => {}
    }
}

fn step<'a>(current: &'a Value, segment: &str, at: &Pointer) -> Result<&'a Value, CoreError> {
    match current {
        Value::Object(map) => map
            .get(segment)
            .ok_or_else(|| CoreError::reference(at.clone(), format!("segment not found: '{segment}'"))),
        Value::Array(arr) => {
            let idx = parse_array_index(segment, at)?;
            arr.get(idx)
                .ok_or_else(|| CoreError::reference(at.clone(), format!("array index out of range: {idx}")))
        }
        _ => Err(CoreError::reference(at.clone(), "not a container")),
    }
}

fn step_mut<'a>(
    current: &'a mut Value,
    segment: &str,
    at: &Pointer,
) -> Result<&'a mut Value, CoreError> {
    match current {
        Value::Object(map) => map
            .get_mut(segment)
            .ok_or_else(|| CoreError::reference(at.clone(), format!("segment not found: '{segment}'"))),
        Value::Array(arr) => {
            let idx = parse_array_index(segment, at)?;
            let len = arr.len();
            arr.get_mut(idx)
                .ok_or_else(|| CoreError::reference(at.clone(), format!("array index out of range: {idx} (len {len})")))
        }
        _ => Err(CoreError::reference(at.clone(), "not a container")),
    }
}

/// Parse a segment as an array index under RFC 6901 rules: decimal,
/// non-negative, no leading zeros except the literal `0`, `-` rejected
/// (resolve-only path; `set` handles `-` separately as append).
fn parse_array_index(segment: &str, at: &Pointer) -> Result<usize, CoreError> {
    if segment == "-" {
        return Err(CoreError::reference(
            at.clone(),
            "'-' is only valid as the target of 'set', not 'resolve'",
        ));
    }
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::reference(at.clone(), format!("invalid array index: '{segment}'")));
    }
    if segment.len() > 1 && segment.starts_with('0') {
        return Err(CoreError::reference(
            at.clone(),
            format!("array index has leading zero: '{segment}'"),
        ));
    }
    segment
        .parse::<usize>()
        .map_err(|_| CoreError::reference(at.clone(), format!("array index out of range: '{segment}'")))
}

fn unescape_token(token: &str) -> Result<String, CoreError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => {
                    return Err(CoreError::parse(
                        Pointer::root(),
                        format!("invalid escape in pointer segment '{token}'"),
                    ))
                }
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{}", escape_segment(segment))?;
        }
        Ok(())
    }
}

impl FromStr for Pointer {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pointer::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rfc6901_section5_examples_resolve() {
        let doc = json!({
            "foo": ["bar", "baz"],
            "": 0,
            "a/b": 1,
            "c%d": 2,
            "e^f": 3,
            "g|h": 4,
            "i\\j": 5,
            "k\"l": 6,
            " ": 7,
            "m~n": 8
        });

        assert_eq!(Pointer::parse("").unwrap().resolve(&doc).unwrap(), &doc);
        assert_eq!(Pointer::parse("/foo").unwrap().resolve(&doc).unwrap(), &json!(["bar", "baz"]));
        assert_eq!(Pointer::parse("/foo/0").unwrap().resolve(&doc).unwrap(), &json!("bar"));
        assert_eq!(Pointer::parse("/").unwrap().resolve(&doc).unwrap(), &json!(0));
        assert_eq!(Pointer::parse("/a~1b").unwrap().resolve(&doc).unwrap(), &json!(1));
        assert_eq!(Pointer::parse("/c%d").unwrap().resolve(&doc).unwrap(), &json!(2));
        assert_eq!(Pointer::parse("/e^f").unwrap().resolve(&doc).unwrap(), &json!(3));
        assert_eq!(Pointer::parse("/g|h").unwrap().resolve(&doc).unwrap(), &json!(4));
        assert_eq!(Pointer::parse("/i\\j").unwrap().resolve(&doc).unwrap(), &json!(5));
        assert_eq!(Pointer::parse("/k\"l").unwrap().resolve(&doc).unwrap(), &json!(6));
        assert_eq!(Pointer::parse("/ ").unwrap().resolve(&doc).unwrap(), &json!(7));
        assert_eq!(Pointer::parse("/m~0n").unwrap().resolve(&doc).unwrap(), &json!(8));
    }

    #[test]
    fn round_trips_format_then_parse() {
        let p = Pointer::from_segments(["a/b", "m~n", "0"]);
        let formatted = p.to_string();
        assert_eq!(Pointer::parse(&formatted).unwrap(), p);
    }

    #[test]
    fn percent_is_not_decoded_by_pointer_itself() {
        let doc = json!({"c%d": 2});
        assert_eq!(Pointer::parse("/c%d").unwrap().resolve(&doc).unwrap(), &json!(2));
        assert!(Pointer::parse("/c%25d").unwrap().resolve(&doc).is_err());
    }

    #[test]
    fn dash_is_rejected_during_resolve() {
        let doc = json!({"items": [1, 2, 3]});
        let ptr = Pointer::parse("/items/-").unwrap();
        assert!(ptr.resolve(&doc).is_err());
    }

    #[test]
    fn dash_appends_during_set() {
        let mut doc = json!({"items": [1, 2]});
        Pointer::parse("/items/-").unwrap().set(&mut doc, json!(3)).unwrap();
        assert_eq!(doc, json!({"items": [1, 2, 3]}));
    }

    #[test]
    fn leading_zero_index_is_rejected() {
        let doc = json!({"items": [1, 2, 3]});
        assert!(Pointer::parse("/items/01").unwrap().resolve(&doc).is_err());
        assert!(Pointer::parse("/items/0").unwrap().resolve(&doc).is_ok());
    }

    #[test]
    fn unescaped_invalid_tilde_is_rejected() {
        assert!(Pointer::parse("/a~x").is_err());
    }

    #[test]
    fn list_pointers_enumerates_every_node() {
        let doc = json!({"a": {"b": 1}, "c": [1, 2]});
        let pointers = Pointer::list_pointers(&doc, None);
        let formatted: Vec<String> = pointers.iter().map(|p| p.to_string()).collect();
        assert!(formatted.contains(&"".to_string()));
        assert!(formatted.contains(&"/a".to_string()));
        assert!(formatted.contains(&"/a/b".to_string()));
        assert!(formatted.contains(&"/c/0".to_string()));
        assert!(formatted.contains(&"/c/1".to_string()));
    }

    #[test]
    fn segment_not_found_is_an_error() {
        let doc = json!({"a": 1});
        assert!(Pointer::parse("/b").unwrap().resolve(&doc).is_err());
    }

    #[test]
    fn not_a_container_is_an_error() {
        let doc = json!({"a": 1});
        assert!(Pointer::parse("/a/b").unwrap().resolve(&doc).is_err());
    }
}

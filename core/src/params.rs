//! Request parameters and bracket-notation flattening.
//!
//! # Design
//! A parameter is a closed variant: a scalar, a file, or a nested map of
//! the same. Flattening walks the tree in insertion order and produces
//! `parent[child]` keys. The same walk drives file detection, multipart
//! encoding and urlencoding, so every path agrees on key names.
//!
//! `Params::from_query` is the inverse direction: it rebuilds nesting from a
//! query string the way a server-side form decoder reads bracketed keys.

use std::borrow::Cow;

use serde_json::Value;

use crate::attachment::Attachment;
use crate::error::{Error, Result};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Scalar(String),
    File(Attachment),
    Map(Params),
}

impl Param {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Param::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Params> {
        match self {
            Param::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Scalar(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Scalar(value)
    }
}

macro_rules! numeric_param {
    ($($t:ty),*) => {
        $(impl From<$t> for Param {
            fn from(value: $t) -> Self {
                Param::Scalar(value.to_string())
            }
        })*
    };
}

numeric_param!(i32, i64, u32, u64, usize, f64);

impl From<Attachment> for Param {
    fn from(value: Attachment) -> Self {
        Param::File(value)
    }
}

impl From<Params> for Param {
    fn from(value: Params) -> Self {
        Param::Map(value)
    }
}

/// A leaf produced by flattening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlatValue<'a> {
    Scalar(&'a str),
    File(&'a Attachment),
}

/// Insertion-ordered parameter map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Param)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any previous value in its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Param>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Chaining form of `insert`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Param>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Param> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into bracket-notated leaves. See [`flatten`].
    pub fn flatten(&self) -> Vec<(String, FlatValue<'_>)> {
        flatten(self, None)
    }

    /// Whether any leaf is a file.
    pub fn has_files(&self) -> bool {
        self.entries.iter().any(|(_, v)| match v {
            Param::File(_) => true,
            Param::Map(m) => m.has_files(),
            Param::Scalar(_) => false,
        })
    }

    /// Parse a query string, nesting bracketed keys.
    pub fn from_query(query: &str) -> Self {
        let mut params = Params::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let segments = split_key(&key);
            if segments[0].is_empty() {
                continue;
            }
            params.insert_path(&segments, Param::Scalar(value.into_owned()));
        }
        params
    }

    fn insert_path(&mut self, segments: &[Cow<'_, str>], value: Param) {
        let key = match segments[0].as_ref() {
            "" => self.next_index().to_string(),
            k => k.to_string(),
        };
        if segments.len() == 1 {
            self.insert(key, value);
            return;
        }
        if !matches!(self.get(&key), Some(Param::Map(_))) {
            self.insert(key.clone(), Params::new());
        }
        if let Some((_, Param::Map(child))) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            child.insert_path(&segments[1..], value);
        }
    }

    fn next_index(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(|(k, _)| k.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1)
    }
}

impl<K: Into<String>, V: Into<Param>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl TryFrom<Value> for Params {
    type Error = Error;

    /// Objects and arrays become maps (arrays keyed by index); strings and
    /// numbers become scalars. `null` and booleans are rejected.
    fn try_from(value: Value) -> Result<Self> {
        match json_to_param(value, None)? {
            Param::Map(m) => Ok(m),
            _ => Err(Error::invalid_parameter("top-level value must be an object")),
        }
    }
}

fn json_to_param(value: Value, key: Option<&str>) -> Result<Param> {
    let nested = |k: &str| match key {
        Some(prefix) => format!("{prefix}[{k}]"),
        None => k.to_string(),
    };
    match value {
        Value::String(s) => Ok(Param::Scalar(s)),
        Value::Number(n) => Ok(Param::Scalar(n.to_string())),
        Value::Object(obj) => {
            let mut params = Params::new();
            for (k, v) in obj {
                let param = json_to_param(v, Some(&nested(&k)))?;
                params.insert(k, param);
            }
            Ok(Param::Map(params))
        }
        Value::Array(items) => {
            let mut params = Params::new();
            for (i, v) in items.into_iter().enumerate() {
                let k = i.to_string();
                let param = json_to_param(v, Some(&nested(&k)))?;
                params.insert(k, param);
            }
            Ok(Param::Map(params))
        }
        Value::Null | Value::Bool(_) => Err(Error::invalid_parameter(key.unwrap_or("<root>"))),
    }
}

/// Split `a[b][]` into `["a", "b", ""]`. An unterminated bracket ends
/// segment parsing; the remainder stays part of the last key.
fn split_key(key: &str) -> Vec<Cow<'_, str>> {
    let Some(open) = key.find('[') else {
        return vec![Cow::Borrowed(key)];
    };
    if open == 0 || !key[open..].contains(']') {
        return vec![Cow::Borrowed(key)];
    }

    let mut segments = vec![Cow::Borrowed(&key[..open])];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        segments.push(Cow::Borrowed(&inner[..close]));
        rest = &inner[close + 1..];
    }
    segments
}

/// Flatten nested params into `prefix[key]` leaves, in insertion order.
/// A key produced twice keeps its first position and its last value.
pub fn flatten<'a>(params: &'a Params, prefix: Option<&str>) -> Vec<(String, FlatValue<'a>)> {
    let mut flat: Vec<(String, FlatValue<'a>)> = Vec::new();
    flatten_into(params, prefix, &mut flat);
    flat
}

fn flatten_into<'a>(params: &'a Params, prefix: Option<&str>, out: &mut Vec<(String, FlatValue<'a>)>) {
    for (k, v) in &params.entries {
        let key = match prefix {
            Some(p) => format!("{p}[{k}]"),
            None => k.clone(),
        };
        let leaf = match v {
            Param::Map(child) => {
                flatten_into(child, Some(&key), out);
                continue;
            }
            Param::Scalar(s) => FlatValue::Scalar(s),
            Param::File(f) => FlatValue::File(f),
        };
        match out.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = leaf,
            None => out.push((key, leaf)),
        }
    }
}

/// `application/x-www-form-urlencoded` form of the flattened scalars.
pub fn urlencode(params: &Params) -> Result<String> {
    let pairs: Vec<(String, &str)> = params
        .flatten()
        .into_iter()
        .filter_map(|(k, v)| match v {
            FlatValue::Scalar(s) => Some((k, s)),
            FlatValue::File(_) => None,
        })
        .collect();
    serde_urlencoded::to_string(pairs).map_err(Error::invalid_parameter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scalars(flat: &[(String, FlatValue<'_>)]) -> Vec<(String, String)> {
        flat.iter()
            .map(|(k, v)| match v {
                FlatValue::Scalar(s) => (k.clone(), s.to_string()),
                FlatValue::File(f) => (k.clone(), format!("<file {}>", f.filename())),
            })
            .collect()
    }

    fn nested() -> Params {
        Params::new()
            .with("name", "bob")
            .with(
                "user",
                Params::new()
                    .with("age", 42)
                    .with("tags", Params::new().with("0", "a").with("1", "b")),
            )
            .with("z", "last")
    }

    #[test]
    fn flattens_with_brackets_in_order() {
        let p = nested();
        let flat = scalars(&p.flatten());
        assert_eq!(
            flat,
            vec![
                ("name".to_string(), "bob".to_string()),
                ("user[age]".to_string(), "42".to_string()),
                ("user[tags][0]".to_string(), "a".to_string()),
                ("user[tags][1]".to_string(), "b".to_string()),
                ("z".to_string(), "last".to_string()),
            ]
        );
    }

    #[test]
    fn prefix_wraps_top_level_keys() {
        let p = Params::new().with("a", "1");
        let flat = scalars(&flatten(&p, Some("outer")));
        assert_eq!(flat, vec![("outer[a]".to_string(), "1".to_string())]);
    }

    #[test]
    fn reflattening_a_flat_map_is_identity() {
        let p = nested();
        let once: Params = scalars(&p.flatten()).into_iter().collect();
        let twice: Params = scalars(&once.flatten()).into_iter().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn colliding_keys_keep_last_value() {
        let p = Params::new()
            .with("a[b]", "first")
            .with("c", "middle")
            .with("a", Params::new().with("b", "second"));
        let flat = scalars(&p.flatten());
        assert_eq!(
            flat,
            vec![
                ("a[b]".to_string(), "second".to_string()),
                ("c".to_string(), "middle".to_string()),
            ]
        );
    }

    #[test]
    fn query_string_nests_brackets() {
        let p = Params::from_query("x=1&y=2&user[name]=a+b&list[]=p&list[]=q&enc=%26%3D");
        assert_eq!(p.get("x").and_then(Param::as_scalar), Some("1"));
        assert_eq!(p.get("y").and_then(Param::as_scalar), Some("2"));
        let user = p.get("user").and_then(Param::as_map).unwrap();
        assert_eq!(user.get("name").and_then(Param::as_scalar), Some("a b"));
        let list = p.get("list").and_then(Param::as_map).unwrap();
        assert_eq!(list.get("0").and_then(Param::as_scalar), Some("p"));
        assert_eq!(list.get("1").and_then(Param::as_scalar), Some("q"));
        assert_eq!(p.get("enc").and_then(Param::as_scalar), Some("&="));
    }

    #[test]
    fn query_without_value_is_empty_scalar() {
        let p = Params::from_query("flag&x=");
        assert_eq!(p.get("flag").and_then(Param::as_scalar), Some(""));
        assert_eq!(p.get("x").and_then(Param::as_scalar), Some(""));
    }

    #[test]
    fn unterminated_bracket_is_literal() {
        let p = Params::from_query("a[b=1");
        assert_eq!(p.get("a[b").and_then(Param::as_scalar), Some("1"));
    }

    #[test]
    fn json_objects_and_arrays_become_maps() {
        let p = Params::try_from(json!({"a": "x", "n": 1.5, "list": ["p", {"q": 2}]})).unwrap();
        let flat = scalars(&p.flatten());
        assert_eq!(
            flat,
            vec![
                ("a".to_string(), "x".to_string()),
                ("n".to_string(), "1.5".to_string()),
                ("list[0]".to_string(), "p".to_string()),
                ("list[1][q]".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn json_null_and_bool_are_invalid() {
        let err = Params::try_from(json!({"outer": {"flag": true}})).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(k) if k == "outer[flag]"));
        let err = Params::try_from(json!({"gone": null})).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(k) if k == "gone"));
        assert!(Params::try_from(json!("scalar")).is_err());
    }

    #[test]
    fn urlencode_escapes_brackets_and_spaces() {
        let p = Params::new()
            .with("q", "a b&c")
            .with("arr", Params::new().with("k", "v"));
        assert_eq!(urlencode(&p).unwrap(), "q=a+b%26c&arr%5Bk%5D=v");
    }
}

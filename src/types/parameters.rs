//! Namespaced key/value parameters attached to lines.
//!
//! Values live under a `(namespace1, namespace2, key)` triple and are kept as
//! text. Typed accessors parse the text on read, and anything that is not
//! defined reads back as an empty string, zero or `false`.
//!
//! The compact directive form of a parameter set is
//! `!!NS1:NS2:key1=value1:key2=value2`, with `&colon;` standing in for a
//! literal colon inside a value.

use crate::types::duration::{HumNum, to_f64, zero};
use std::collections::BTreeMap;
use std::fmt;

type KeyValues = BTreeMap<String, String>;
type Namespace2 = BTreeMap<String, KeyValues>;
type Namespace1 = BTreeMap<String, Namespace2>;

const COLON_ESCAPE: &str = "&colon;";

/// Address of a single parameter.
///
/// Built from `"key"`, `("ns2", "key")` or `("ns1", "ns2", "key")`. Missing
/// namespaces are the empty namespace. A bare string containing colons is
/// split as `ns2:key` or `ns1:ns2:key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamPath<'a> {
    pub ns1: &'a str,
    pub ns2: &'a str,
    pub key: &'a str,
}

impl<'a> From<&'a str> for ParamPath<'a> {
    fn from(key: &'a str) -> Self {
        let parts: Vec<&str> = key.splitn(3, ':').collect();
        match parts.as_slice() {
            [ns2, key] => ParamPath {
                ns1: "",
                ns2: *ns2,
                key: *key,
            },
            [ns1, ns2, key] => ParamPath {
                ns1: *ns1,
                ns2: *ns2,
                key: *key,
            },
            _ => ParamPath {
                ns1: "",
                ns2: "",
                key,
            },
        }
    }
}

impl<'a> From<&'a String> for ParamPath<'a> {
    fn from(key: &'a String) -> Self {
        ParamPath::from(key.as_str())
    }
}

impl<'a> From<(&'a str, &'a str)> for ParamPath<'a> {
    fn from((ns2, key): (&'a str, &'a str)) -> Self {
        ParamPath { ns1: "", ns2, key }
    }
}

impl<'a> From<(&'a str, &'a str, &'a str)> for ParamPath<'a> {
    fn from((ns1, ns2, key): (&'a str, &'a str, &'a str)) -> Self {
        ParamPath { ns1, ns2, key }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterStore {
    // Allocated on the first set.
    parameters: Option<Namespace1>,
    prefix: String,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            parameters: None,
            prefix: prefix.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Text written before each namespace line when the store is rendered.
    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = prefix.to_string();
    }

    fn lookup(&self, path: ParamPath<'_>) -> Option<&String> {
        self.parameters
            .as_ref()?
            .get(path.ns1)?
            .get(path.ns2)?
            .get(path.key)
    }

    pub fn get<'p>(&self, path: impl Into<ParamPath<'p>>) -> &str {
        self.lookup(path.into()).map(String::as_str).unwrap_or("")
    }

    pub fn get_int<'p>(&self, path: impl Into<ParamPath<'p>>) -> i64 {
        let value = self.get(path);
        if value.contains('/') {
            parse_fraction(value).to_integer()
        } else {
            parse_leading_int(value).unwrap_or(0)
        }
    }

    pub fn get_fraction<'p>(&self, path: impl Into<ParamPath<'p>>) -> HumNum {
        let value = self.get(path);
        if value.contains('/') {
            parse_fraction(value)
        } else {
            HumNum::from_integer(parse_leading_int(value).unwrap_or(0))
        }
    }

    pub fn get_float<'p>(&self, path: impl Into<ParamPath<'p>>) -> f64 {
        let value = self.get(path);
        if value.contains('/') {
            to_f64(&parse_fraction(value))
        } else {
            parse_leading_float(value).unwrap_or(0.0)
        }
    }

    /// Undefined, `"false"` and `"0"` read as false; anything else is true.
    pub fn get_bool<'p>(&self, path: impl Into<ParamPath<'p>>) -> bool {
        match self.lookup(path.into()) {
            None => false,
            Some(value) => !(value == "false" || value == "0"),
        }
    }

    /// Store any displayable value (text, integer, rational, float) as text.
    /// An existing value under the same triple is overwritten.
    pub fn set<'p>(&mut self, path: impl Into<ParamPath<'p>>, value: impl fmt::Display) {
        let path = path.into();
        self.parameters
            .get_or_insert_with(BTreeMap::new)
            .entry(path.ns1.to_string())
            .or_default()
            .entry(path.ns2.to_string())
            .or_default()
            .insert(path.key.to_string(), value.to_string());
    }

    pub fn is_defined<'p>(&self, path: impl Into<ParamPath<'p>>) -> bool {
        self.lookup(path.into()).is_some()
    }

    pub fn delete_value<'p>(&mut self, path: impl Into<ParamPath<'p>>) {
        let path = path.into();
        let Some(parameters) = self.parameters.as_mut() else {
            return;
        };
        let Some(namespace2) = parameters.get_mut(path.ns1) else {
            return;
        };
        if let Some(keys) = namespace2.get_mut(path.ns2) {
            keys.remove(path.key);
            if keys.is_empty() {
                namespace2.remove(path.ns2);
            }
        }
        if namespace2.is_empty() {
            parameters.remove(path.ns1);
        }
    }

    /// All keys stored under the namespace pair, in sorted order.
    pub fn get_keys(&self, ns1: &str, ns2: &str) -> Vec<String> {
        self.parameters
            .as_ref()
            .and_then(|parameters| parameters.get(ns1))
            .and_then(|namespace2| namespace2.get(ns2))
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_parameters(&self) -> bool {
        self.parameters.as_ref().is_some_and(|parameters| {
            parameters
                .values()
                .flat_map(|namespace2| namespace2.values())
                .any(|keys| !keys.is_empty())
        })
    }

    /// Import the body of a directive, `ns1:ns2:key1=value1:key2`.
    ///
    /// Fewer than three colon-separated fields is a no-op. A piece without
    /// `=` is stored as the flag value `"true"`.
    pub fn set_parameters(&mut self, data: &str) {
        let pieces: Vec<&str> = data.split(':').collect();
        if pieces.len() < 3 {
            return;
        }
        let (ns1, ns2) = (pieces[0], pieces[1]);
        for piece in &pieces[2..] {
            let piece = piece.replace(COLON_ESCAPE, ":");
            match piece.split_once('=') {
                Some((key, value)) => self.set((ns1, ns2, key), value),
                None => self.set((ns1, ns2, piece.as_str()), "true"),
            }
        }
    }
}

impl fmt::Display for ParameterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(parameters) = &self.parameters else {
            return Ok(());
        };
        for (ns1, namespace2) in parameters {
            for (ns2, keys) in namespace2 {
                if keys.is_empty() {
                    continue;
                }
                write!(f, "{}{}:{}", self.prefix, ns1, ns2)?;
                for (key, value) in keys {
                    write!(f, ":{}", key.replace(':', COLON_ESCAPE))?;
                    if value != "true" {
                        write!(f, "={}", value.replace(':', COLON_ESCAPE))?;
                    }
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Leading signed integer, skipping leading whitespace (`"12abc"` → 12).
fn parse_leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let sign_len = usize::from(text.starts_with(['+', '-']));
    let digit_len = text[sign_len..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digit_len == 0 {
        return None;
    }
    text[..sign_len + digit_len].parse().ok()
}

fn parse_leading_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let candidate: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        .collect();
    (1..=candidate.len())
        .rev()
        .find_map(|end| candidate[..end].parse::<f64>().ok())
}

fn parse_fraction(text: &str) -> HumNum {
    let Some((top, bottom)) = text.split_once('/') else {
        return zero();
    };
    match (parse_leading_int(top), parse_leading_int(bottom)) {
        (Some(top), Some(bottom)) if bottom != 0 => HumNum::new(top, bottom),
        (Some(top), None) => HumNum::from_integer(top),
        _ => zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_store_is_empty() {
        let store = ParameterStore::new();
        assert!(!store.has_parameters());
        assert_eq!(store.get("key"), "");
        assert_eq!(store.get_int("key"), 0);
        assert_eq!(store.get_fraction(("a", "b", "key")), zero());
        assert_eq!(store.get_float(("b", "key")), 0.0);
        assert!(!store.get_bool("key"));
        assert!(store.get_keys("", "").is_empty());
        assert_eq!(store.to_string(), "");
    }

    #[test]
    fn test_path_arities() {
        let mut store = ParameterStore::new();
        store.set("key", "one");
        store.set(("ns2", "key"), "two");
        store.set(("ns1", "ns2", "key"), "three");

        assert_eq!(store.get("key"), "one");
        assert_eq!(store.get(("", "", "key")), "one");
        assert_eq!(store.get(("ns2", "key")), "two");
        assert_eq!(store.get("ns2:key"), "two");
        assert_eq!(store.get(("ns1", "ns2", "key")), "three");
        assert_eq!(store.get("ns1:ns2:key"), "three");
    }

    #[test]
    fn test_overwrite_and_delete() {
        let mut store = ParameterStore::new();
        store.set(("a", "b", "k"), "first");
        store.set(("a", "b", "k"), "second");
        assert_eq!(store.get(("a", "b", "k")), "second");
        assert!(store.is_defined(("a", "b", "k")));

        store.delete_value(("a", "b", "k"));
        assert!(!store.is_defined(("a", "b", "k")));
        assert!(!store.has_parameters());

        store.delete_value(("missing", "ns", "k"));
    }

    #[test]
    fn test_typed_values() {
        let mut store = ParameterStore::new();
        store.set("int", 42);
        store.set("neg", "-7 beats");
        store.set("frac", HumNum::new(3, 4));
        store.set("float", 2.5);
        store.set("junk", "abc");

        assert_eq!(store.get("int"), "42");
        assert_eq!(store.get_int("int"), 42);
        assert_eq!(store.get_int("neg"), -7);
        assert_eq!(store.get("frac"), "3/4");
        assert_eq!(store.get_fraction("frac"), HumNum::new(3, 4));
        assert_eq!(store.get_int("frac"), 0);
        assert_eq!(store.get_float("frac"), 0.75);
        assert_eq!(store.get_fraction("int"), HumNum::from_integer(42));
        assert_eq!(store.get_float("float"), 2.5);
        assert_eq!(store.get_int("junk"), 0);
        assert_eq!(store.get_float("junk"), 0.0);
    }

    #[test]
    fn test_bool_values() {
        let mut store = ParameterStore::new();
        store.set("yes", "true");
        store.set("no", "false");
        store.set("zero", 0);
        store.set("empty", "");

        assert!(store.get_bool("yes"));
        assert!(!store.get_bool("no"));
        assert!(!store.get_bool("zero"));
        assert!(store.get_bool("empty"));
        assert!(!store.get_bool("undefined"));
    }

    #[test]
    fn test_set_parameters() {
        let mut store = ParameterStore::new();
        store.set_parameters("ns1:ns2:key1=value1:key2");
        assert_eq!(store.get(("ns1", "ns2", "key1")), "value1");
        assert_eq!(store.get(("ns1", "ns2", "key2")), "true");
        assert_eq!(store.get_keys("ns1", "ns2"), vec!["key1", "key2"]);
        assert!(store.has_parameters());
    }

    #[test]
    fn test_set_parameters_escapes_and_short_input() {
        let mut store = ParameterStore::new();
        store.set_parameters("ns1:ns2");
        assert!(!store.has_parameters());

        store.set_parameters("LO:N:t=12&colon;30:a=b=c");
        assert_eq!(store.get(("LO", "N", "t")), "12:30");
        assert_eq!(store.get(("LO", "N", "a")), "b=c");
    }

    #[test]
    fn test_render_directive() {
        let mut store = ParameterStore::with_prefix("!!");
        store.set_parameters("LO:TX:t=12&colon;30:a");
        store.set(("LO", "DY", "z"), "p");
        assert_eq!(store.to_string(), "!!LO:DY:z=p\n!!LO:TX:a:t=12&colon;30\n");
    }

    #[test]
    fn test_escaped_keys_survive_rendering() {
        let mut store = ParameterStore::with_prefix("!!");
        store.set_parameters("LO:N:a&colon;b=1:c&colon;d");
        assert_eq!(store.get(("LO", "N", "a:b")), "1");
        let rendered = store.to_string();
        assert_eq!(rendered, "!!LO:N:a&colon;b=1:c&colon;d\n");

        let mut reread = ParameterStore::with_prefix("!!");
        reread.set_parameters(rendered.trim_end().trim_start_matches("!!"));
        assert_eq!(reread, store);
    }

    #[test]
    fn test_set_prefix() {
        let mut store = ParameterStore::with_prefix("!!");
        store.set(("LO", "N", "vis"), "4");
        store.set_prefix("!");
        assert_eq!(store.prefix(), "!");
        assert_eq!(store.to_string(), "!LO:N:vis=4\n");

        store.set_prefix("");
        assert_eq!(store.to_string(), "LO:N:vis=4\n");
    }
}

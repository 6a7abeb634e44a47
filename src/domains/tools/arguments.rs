//! Normalized tool arguments.
//!
//! Callers may spell parameters in camelCase or snake_case. Every key is
//! folded to snake_case; when both spellings of a key arrive, the
//! snake_case value wins regardless of order. Among values with the same
//! spelling the later one wins. `null` and blank strings are dropped on
//! the way in, so they read as absent.

use serde_json::{Map, Value};

/// Convert a camelCase key to snake_case. Snake-case keys pass through.
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// A flat, snake_case-keyed parameter set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    /// Values that arrived under their snake_case spelling.
    snake: Map<String, Value>,
    /// Values that arrived under some other spelling, keyed by snake_case.
    aliased: Map<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one parameter. Later inserts of the same spelling win.
    pub fn insert(&mut self, key: &str, value: Value) {
        if key.is_empty() || is_absent(&value) {
            return;
        }
        let snake = to_snake_case(key);
        if snake == key {
            self.snake.insert(snake, value);
        } else {
            self.aliased.insert(snake, value);
        }
    }

    /// Merge every entry of a JSON object.
    pub fn extend_object(&mut self, object: &Map<String, Value>) {
        for (key, value) in object {
            self.insert(key, value.clone());
        }
    }

    pub fn from_object(object: &Map<String, Value>) -> Self {
        let mut args = Self::new();
        args.extend_object(object);
        args
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.snake.get(key).or_else(|| self.aliased.get(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.snake.is_empty() && self.aliased.is_empty()
    }

    /// Sorted list of present keys, for logging.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .snake
            .keys()
            .chain(self.aliased.keys().filter(|k| !self.snake.contains_key(*k)))
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Flatten into one object, snake_case values taking precedence.
    pub fn to_object(&self) -> Map<String, Value> {
        let mut out = self.aliased.clone();
        for (key, value) in &self.snake {
            out.insert(key.clone(), value.clone());
        }
        out
    }
}

impl<K: AsRef<str>> FromIterator<(K, Value)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (key, value) in iter {
            args.insert(key.as_ref(), value);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("h3Id"), "h3_id");
        assert_eq!(to_snake_case("kRing"), "k_ring");
        assert_eq!(to_snake_case("speciesIdsOrNames"), "species_ids_or_names");
        assert_eq!(to_snake_case("lastNMonths"), "last_n_months");
        assert_eq!(to_snake_case("h3_res"), "h3_res");
    }

    #[test]
    fn test_camel_alias_is_readable_as_snake() {
        let args: Arguments = vec![("h3Id", json!("8928308280fffff"))].into_iter().collect();
        assert_eq!(args.get("h3_id"), Some(&json!("8928308280fffff")));
    }

    #[test]
    fn test_snake_wins_regardless_of_order() {
        let a: Arguments = vec![("h3_res", json!(7)), ("h3Res", json!(9))]
            .into_iter()
            .collect();
        let b: Arguments = vec![("h3Res", json!(9)), ("h3_res", json!(7))]
            .into_iter()
            .collect();
        assert_eq!(a.get("h3_res"), Some(&json!(7)));
        assert_eq!(b.get("h3_res"), Some(&json!(7)));
        assert_eq!(a.to_object()["h3_res"], json!(7));
    }

    #[test]
    fn test_later_same_spelling_wins() {
        let args: Arguments = vec![("year", json!(2020)), ("year", json!(2022))]
            .into_iter()
            .collect();
        assert_eq!(args.get("year"), Some(&json!(2022)));
    }

    #[test]
    fn test_null_and_blank_are_absent() {
        let args: Arguments = vec![
            ("year", json!(2022)),
            ("year", Value::Null),
            ("h3_id", json!("   ")),
        ]
        .into_iter()
        .collect();
        assert_eq!(args.get("year"), Some(&json!(2022)));
        assert!(!args.contains("h3_id"));
    }

    #[test]
    fn test_keys_are_deduplicated() {
        let args: Arguments = vec![("kRing", json!(2)), ("k_ring", json!(1)), ("h3Id", json!("x"))]
            .into_iter()
            .collect();
        assert_eq!(args.keys(), vec!["h3_id", "k_ring"]);
    }
}

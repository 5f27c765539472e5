//! Dot-separated model paths.
//!
//! A path like `items.2.name` addresses into nested objects and arrays of a
//! [`serde_json::Value`]. The empty path is the root.

use serde_json::{Map, Value};

/// Iterate the non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

/// Join a base path and a relative path.
pub fn join(base: &str, path: &str) -> String {
    match (base.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}.{path}"),
    }
}

/// Whether a subscription on `subscribed` must hear a change at `changed`.
///
/// True when the paths are equal or one is an ancestor of the other: a
/// change to `items` affects `items.0.name`, and a change to `items.0.name`
/// affects whoever depends on `items` as a whole.
pub fn affects(subscribed: &str, changed: &str) -> bool {
    is_prefix(subscribed, changed) || is_prefix(changed, subscribed)
}

fn is_prefix(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    match path.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

/// Read the value at `path`, if present.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Mutable slot at `path`, creating intermediate objects as needed.
///
/// Null intermediates become objects. A numeric segment may index one past
/// the end of an array, which appends a null. Returns `None` when the path
/// runs through a scalar or indexes further past the end.
pub fn slot_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments(path) {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                if index == items.len() {
                    items.push(Value::Null);
                }
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Remove and return the value at `path`.
pub fn take(root: &mut Value, path: &str) -> Option<Value> {
    let (parent, last) = match path.rfind('.') {
        Some(split) => (&path[..split], &path[split + 1..]),
        None => ("", path),
    };
    if last.is_empty() {
        return Some(std::mem::take(root));
    }
    let mut current = root;
    for segment in segments(parent) {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    match current {
        Value::Object(map) => map.remove(last),
        Value::Array(items) => {
            let index: usize = last.parse().ok()?;
            (index < items.len()).then(|| items.remove(index))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join() {
        assert_eq!(join("", "open"), "open");
        assert_eq!(join("_components.c1", ""), "_components.c1");
        assert_eq!(join("_components.c1", "open"), "_components.c1.open");
    }

    #[test]
    fn test_affects_ancestors_and_descendants() {
        assert!(affects("items", "items"));
        assert!(affects("items", "items.0.name"));
        assert!(affects("items.0.name", "items"));
        assert!(affects("", "anything"));
        assert!(!affects("items", "itemsCount"));
        assert!(!affects("open", "opened"));
        assert!(!affects("a.b", "a.c"));
    }

    #[test]
    fn test_lookup() {
        let value = json!({"items": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(lookup(&value, "items.1.name"), Some(&json!("b")));
        assert_eq!(lookup(&value, "items.5"), None);
        assert_eq!(lookup(&value, "items.x"), None);
        assert_eq!(lookup(&value, ""), Some(&value));
    }

    #[test]
    fn test_slot_mut_creates_objects() {
        let mut value = Value::Null;
        *slot_mut(&mut value, "user.name").unwrap() = json!("ada");
        assert_eq!(value, json!({"user": {"name": "ada"}}));
    }

    #[test]
    fn test_slot_mut_appends_to_arrays() {
        let mut value = json!({"list": [1]});
        *slot_mut(&mut value, "list.1").unwrap() = json!(2);
        assert_eq!(value, json!({"list": [1, 2]}));
    }

    #[test]
    fn test_slot_mut_index_past_end() {
        let mut value = json!({"list": []});
        assert!(slot_mut(&mut value, "list.2").is_none());
        assert!(slot_mut(&mut value, "list.18446744073709551615").is_none());
        assert!(slot_mut(&mut value, "list.4000000000").is_none());
        assert_eq!(value, json!({"list": []}));
    }

    #[test]
    fn test_slot_mut_through_scalar() {
        let mut value = json!({"title": "x"});
        assert!(slot_mut(&mut value, "title.length").is_none());
    }

    #[test]
    fn test_take() {
        let mut value = json!({"a": {"b": 1, "c": 2}, "list": [1, 2, 3]});
        assert_eq!(take(&mut value, "a.b"), Some(json!(1)));
        assert_eq!(take(&mut value, "list.1"), Some(json!(2)));
        assert_eq!(take(&mut value, "missing.x"), None);
        assert_eq!(value, json!({"a": {"c": 2}, "list": [1, 3]}));
    }
}

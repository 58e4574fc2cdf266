//! Canonical serialization of record fields
//!
//! Same logical content always produces the same string: object keys are
//! sorted at every nesting level and the output carries no whitespace.

use serde_json::{Map, Value};

/// Field map hashed into a chain link
pub type Fields = Map<String, Value>;

/// Serialize a field map deterministically (sorted keys, compact JSON)
pub fn canonicalize(fields: &Fields) -> String {
    let mut out = String::new();
    write_object(&mut out, fields);
    out
}

fn write_object(out: &mut String, map: &Map<String, Value>) {
    // Sort explicitly: the map's own iteration order depends on serde_json features
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        if let Some(value) = map.get(key) {
            write_value(out, value);
        }
    }
    out.push('}');
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => write_object(out, map),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::String(s) => write_string(out, s),
        // null, bool and numbers have a single compact rendering
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push_str(&Value::String(s.to_string()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut a = Fields::new();
        a.insert("subject_id".into(), json!("u1"));
        a.insert("action".into(), json!("create"));
        a.insert("reason_code".into(), json!("USER_CREATED"));

        let mut b = Fields::new();
        b.insert("reason_code".into(), json!("USER_CREATED"));
        b.insert("subject_id".into(), json!("u1"));
        b.insert("action".into(), json!("create"));

        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn test_nested_objects_sorted() {
        let mut a = Fields::new();
        a.insert("details".into(), json!({"z": 1, "a": {"y": true, "b": null}}));

        assert_eq!(canonicalize(&a), r#"{"details":{"a":{"b":null,"y":true},"z":1}}"#);
    }

    #[test]
    fn test_compact_output_and_escaping() {
        let mut a = Fields::new();
        a.insert("note".into(), json!("say \"hi\"\n"));
        a.insert("list".into(), json!([3, "x", false]));

        assert_eq!(
            canonicalize(&a),
            r#"{"list":[3,"x",false],"note":"say \"hi\"\n"}"#
        );
    }

    #[test]
    fn test_empty_map() {
        assert_eq!(canonicalize(&Fields::new()), "{}");
    }

    #[test]
    fn test_different_content_differs() {
        let mut a = Fields::new();
        a.insert("action".into(), json!("create"));
        let mut b = Fields::new();
        b.insert("action".into(), json!("delete"));

        assert_ne!(canonicalize(&a), canonicalize(&b));
    }
}

//! Value Codec
//!
//! Text encoding boundary for cached values. Anything in the JSON data model
//! round-trips: strings, numbers, booleans, null, nested maps and sequences.
//! Values outside that model (maps with non-string keys, for instance) are
//! rejected with a serialization error instead of being stored lossily.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Encodes `value` into its stored text form.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decodes stored text back into `T`.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Employee {
        id: u32,
        name: String,
        salary: Option<f64>,
        tags: Vec<String>,
    }

    #[test]
    fn test_nested_value_roundtrip() {
        let value = json!({
            "name": "cache",
            "count": 3,
            "ratio": 0.25,
            "enabled": true,
            "missing": null,
            "items": [1, "two", [3.5, false], {"deep": {"deeper": []}}]
        });

        let text = encode(&value).unwrap();
        let decoded: Value = decode(&text).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_typed_struct_roundtrip() {
        let employee = Employee {
            id: 7,
            name: "Ada".to_string(),
            salary: None,
            tags: vec!["payroll".to_string()],
        };

        let text = encode(&employee).unwrap();
        let decoded: Employee = decode(&text).unwrap();
        assert_eq!(decoded, employee);
    }

    #[test]
    fn test_non_string_map_keys_rejected() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");

        let result = encode(&map);
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[test]
    fn test_decode_wrong_type() {
        let text = encode(&"text").unwrap();
        let result: Result<i64> = decode(&text);
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }
}

use serde_json::Value;

/// Converts values to and from their stored text form.
pub trait Serializer: Send + Sync {
    fn serialize(&self, value: &Value) -> anyhow::Result<String>;
    fn deserialize(&self, stored: &str) -> anyhow::Result<Value>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> anyhow::Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize(&self, stored: &str) -> anyhow::Result<Value> {
        Ok(serde_json::from_str(stored)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_is_stored_as_json_null() {
        let stored = JsonSerializer.serialize(&Value::Null).unwrap();
        assert_eq!(stored, "null");
        assert_eq!(JsonSerializer.deserialize(&stored).unwrap(), Value::Null);
    }

    #[test]
    fn rejects_corrupt_payloads() {
        assert!(JsonSerializer.deserialize("{not json").is_err());
        assert_eq!(
            JsonSerializer.deserialize(r#"{"x":[1,2]}"#).unwrap(),
            json!({"x": [1, 2]})
        );
    }
}

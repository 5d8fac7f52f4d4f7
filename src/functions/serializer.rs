//! Callable wire encoding
//!
//! Integers outside the safe f64 range travel as wrapped `Int64Value`
//! objects; everything else is plain JSON.

use serde_json::{Map, Value};

const LONG_TYPE: &str = "type.googleapis.com/google.protobuf.Int64Value";
const UNSIGNED_LONG_TYPE: &str = "type.googleapis.com/google.protobuf.UInt64Value";

/// Largest integer an f64 represents exactly
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Encode request data
pub(crate) fn encode(data: &Value) -> Value {
    match data {
        Value::Number(n) => match n.as_i64() {
            Some(i) if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 => wrap(LONG_TYPE, i.to_string()),
            Some(_) => data.clone(),
            None => match n.as_u64() {
                Some(u) => wrap(UNSIGNED_LONG_TYPE, u.to_string()),
                None => data.clone(),
            },
        },
        Value::Array(items) => Value::Array(items.iter().map(encode).collect()),
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), encode(v))).collect()),
        _ => data.clone(),
    }
}

/// Decode response data, unwrapping `Int64Value` / `UInt64Value` objects
pub(crate) fn decode(data: Value) -> Value {
    match data {
        Value::Object(map) => match unwrap(&map) {
            Some(number) => number,
            None => Value::Object(map.into_iter().map(|(k, v)| (k, decode(v))).collect()),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(decode).collect()),
        other => other,
    }
}

fn wrap(type_url: &str, value: String) -> Value {
    let mut map = Map::new();
    map.insert("@type".to_string(), Value::String(type_url.to_string()));
    map.insert("value".to_string(), Value::String(value));
    Value::Object(map)
}

fn unwrap(map: &Map<String, Value>) -> Option<Value> {
    let type_url = map.get("@type")?.as_str()?;
    let value = map.get("value")?.as_str()?;
    match type_url {
        LONG_TYPE => value.parse::<i64>().ok().map(Value::from),
        UNSIGNED_LONG_TYPE => value.parse::<u64>().ok().map(Value::from),
        _ => None,
    }
}

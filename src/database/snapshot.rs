//! Immutable copies of database data

use crate::database::query::OrderBy;
use serde_json::Value;
use std::cmp::Ordering;

/// Data read from a database location
#[derive(Debug, Clone, PartialEq)]
pub struct DataSnapshot {
    key: Option<String>,
    value: Value,
    order: OrderBy,
}

impl DataSnapshot {
    pub(crate) fn new(key: Option<String>, value: Value, order: OrderBy) -> Self {
        Self { key, value, order }
    }

    /// Last path segment of the location, `None` at the root
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The data, `Null` when nothing exists
    pub fn val(&self) -> &Value {
        &self.value
    }

    /// Whether any data exists
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    /// Snapshot of a descendant; empty when the path does not exist
    pub fn child(&self, path: &str) -> DataSnapshot {
        let mut current = &self.value;
        let mut key = self.key.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = child_value(current, segment).unwrap_or(&Value::Null);
            key = Some(segment.to_string());
        }
        DataSnapshot::new(key, current.clone(), OrderBy::Key)
    }

    /// Whether a descendant exists at `path`
    pub fn has_child(&self, path: &str) -> bool {
        self.child(path).exists()
    }

    /// Whether this location has any children
    pub fn has_children(&self) -> bool {
        self.num_children() > 0
    }

    /// Number of direct children
    pub fn num_children(&self) -> usize {
        match &self.value {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.iter().filter(|v| !v.is_null()).count(),
            _ => 0,
        }
    }

    /// Direct children in query order
    pub fn children(&self) -> Vec<DataSnapshot> {
        let mut children: Vec<DataSnapshot> = match &self.value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| DataSnapshot::new(Some(k.clone()), v.clone(), OrderBy::Key))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(i, v)| DataSnapshot::new(Some(i.to_string()), v.clone(), OrderBy::Key))
                .collect(),
            _ => Vec::new(),
        };
        children.sort_by(|a, b| compare_children(&self.order, a, b));
        children
    }

    /// Visit children in query order; return `true` from `action` to stop
    ///
    /// Returns whether the iteration was stopped early.
    pub fn for_each(&self, action: impl FnMut(DataSnapshot) -> bool) -> bool {
        self.children().into_iter().any(action)
    }
}

fn child_value<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn compare_children(order: &OrderBy, a: &DataSnapshot, b: &DataSnapshot) -> Ordering {
    let by_key = || compare_keys(a.key().unwrap_or_default(), b.key().unwrap_or_default());
    match order {
        OrderBy::Key | OrderBy::Priority => by_key(),
        OrderBy::Value => compare_values(&a.value, &b.value).then_with(by_key),
        OrderBy::Child(path) => compare_values(a.child(path).val(), b.child(path).val()).then_with(by_key),
    }
}

/// Integer-like keys first, numerically; then other keys lexicographically
pub(crate) fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i32>().ok(), b.parse::<i32>().ok()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.len().cmp(&b.len())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// null < false < true < numbers < strings < objects
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(false) => 1,
            Value::Bool(true) => 2,
            Value::Number(_) => 3,
            Value::String(_) => 4,
            Value::Array(_) | Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

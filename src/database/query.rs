//! Sorted and filtered reads
//!
//! Modifiers are validated as they are added and rendered as REST query
//! parameters (`orderBy`, `limitToFirst`, `startAt`, ...), each value JSON
//! encoded.

use crate::database::reference::DatabaseReference;
use crate::database::snapshot::DataSnapshot;
use crate::error::{DatabaseError, FirebaseError};
use serde_json::Value;

/// Sort order of a query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrderBy {
    /// By key
    Key,
    /// By the value at a child path
    Child(String),
    /// By value
    Value,
    /// By priority (the default)
    #[default]
    Priority,
}

impl OrderBy {
    fn param(&self) -> String {
        let raw = match self {
            OrderBy::Key => "$key",
            OrderBy::Value => "$value",
            OrderBy::Priority => "$priority",
            OrderBy::Child(path) => path.as_str(),
        };
        Value::String(raw.to_string()).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Limit {
    First(u32),
    Last(u32),
}

/// Modifiers accumulated on a query
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct QueryModifiers {
    order_by: Option<OrderBy>,
    limit: Option<Limit>,
    start_at: Option<Value>,
    end_at: Option<Value>,
    equal_to: bool,
}

impl QueryModifiers {
    /// Order used to sort snapshot children
    pub(crate) fn order(&self) -> OrderBy {
        self.order_by.clone().unwrap_or_default()
    }

    /// REST query parameters
    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let filtered = self.limit.is_some() || self.start_at.is_some() || self.end_at.is_some();

        match &self.order_by {
            Some(order) => params.push(("orderBy", order.param())),
            // Filters require an explicit order
            None if filtered => params.push(("orderBy", OrderBy::default().param())),
            None => {}
        }

        match self.limit {
            Some(Limit::First(n)) => params.push(("limitToFirst", n.to_string())),
            Some(Limit::Last(n)) => params.push(("limitToLast", n.to_string())),
            None => {}
        }

        if self.equal_to {
            if let Some(value) = &self.start_at {
                params.push(("equalTo", value.to_string()));
            }
        } else {
            if let Some(value) = &self.start_at {
                params.push(("startAt", value.to_string()));
            }
            if let Some(value) = &self.end_at {
                params.push(("endAt", value.to_string()));
            }
        }
        params
    }

    fn validate_bound(&self, method: &str, value: &Value) -> Result<(), DatabaseError> {
        if !matches!(value, Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)) {
            return Err(DatabaseError::InvalidQuery(format!(
                "{}(): 'value' must be a number, string, boolean or null value",
                method
            )));
        }
        self.validate_against_order(method, &self.order(), value)
    }

    fn validate_against_order(&self, method: &str, order: &OrderBy, value: &Value) -> Result<(), DatabaseError> {
        match order {
            OrderBy::Key if !value.is_string() => Err(DatabaseError::InvalidQuery(format!(
                "{}(): when ordering by key, the value must be a string",
                method
            ))),
            OrderBy::Priority if value.is_boolean() => Err(DatabaseError::InvalidQuery(format!(
                "{}(): when ordering by priority, the value must be a valid priority (null, a number, or a string)",
                method
            ))),
            _ => Ok(()),
        }
    }
}

/// A read of a location, optionally sorted and filtered
#[derive(Debug, Clone)]
pub struct Query {
    reference: DatabaseReference,
    modifiers: QueryModifiers,
}

impl Query {
    pub(crate) fn new(reference: DatabaseReference) -> Self {
        Self {
            reference,
            modifiers: QueryModifiers::default(),
        }
    }

    /// Location this query reads
    pub fn reference(&self) -> &DatabaseReference {
        &self.reference
    }

    /// Sort by the value at `path` under each child
    pub fn order_by_child(self, path: &str) -> Result<Query, FirebaseError> {
        if path.is_empty() || matches!(path, "$key" | "$value" | "$priority") {
            return Err(DatabaseError::InvalidQuery(format!(
                "orderByChild(): '{}' is not a valid child path",
                path
            ))
            .into());
        }
        crate::database::reference::validate_path(path)?;
        self.order_by(OrderBy::Child(path.to_string()))
    }

    /// Sort by key
    pub fn order_by_key(self) -> Result<Query, FirebaseError> {
        self.order_by(OrderBy::Key)
    }

    /// Sort by value
    pub fn order_by_value(self) -> Result<Query, FirebaseError> {
        self.order_by(OrderBy::Value)
    }

    /// Sort by priority
    pub fn order_by_priority(self) -> Result<Query, FirebaseError> {
        self.order_by(OrderBy::Priority)
    }

    /// Keep the first `limit` children
    pub fn limit_to_first(self, limit: u32) -> Result<Query, FirebaseError> {
        self.limit("limitToFirst", Limit::First(limit))
    }

    /// Keep the last `limit` children
    pub fn limit_to_last(self, limit: u32) -> Result<Query, FirebaseError> {
        self.limit("limitToLast", Limit::Last(limit))
    }

    /// Children sorting at or after `value`
    pub fn start_at(mut self, value: Value) -> Result<Query, FirebaseError> {
        self.modifiers.validate_bound("startAt", &value)?;
        if self.modifiers.start_at.is_some() {
            return Err(DatabaseError::InvalidQuery(
                "startAt(): starting point was already set (by another call to startAt or equalTo)".to_string(),
            )
            .into());
        }
        self.modifiers.start_at = Some(value);
        Ok(self)
    }

    /// Children sorting at or before `value`
    pub fn end_at(mut self, value: Value) -> Result<Query, FirebaseError> {
        self.modifiers.validate_bound("endAt", &value)?;
        if self.modifiers.end_at.is_some() {
            return Err(DatabaseError::InvalidQuery(
                "endAt(): ending point was already set (by another call to endAt or equalTo)".to_string(),
            )
            .into());
        }
        self.modifiers.end_at = Some(value);
        Ok(self)
    }

    /// Children sorting exactly at `value`
    pub fn equal_to(mut self, value: Value) -> Result<Query, FirebaseError> {
        self.modifiers.validate_bound("equalTo", &value)?;
        if self.modifiers.start_at.is_some() {
            return Err(DatabaseError::InvalidQuery(
                "equalTo(): starting point was already set (by another call to startAt or equalTo)".to_string(),
            )
            .into());
        }
        if self.modifiers.end_at.is_some() {
            return Err(DatabaseError::InvalidQuery(
                "equalTo(): ending point was already set (by another call to endAt or equalTo)".to_string(),
            )
            .into());
        }
        self.modifiers.start_at = Some(value.clone());
        self.modifiers.end_at = Some(value);
        self.modifiers.equal_to = true;
        Ok(self)
    }

    /// Read the data once
    pub async fn get(&self) -> Result<DataSnapshot, FirebaseError> {
        let value = self.reference.fetch(&self.modifiers.to_params()).await?;
        Ok(DataSnapshot::new(
            self.reference.key().map(str::to_string),
            value,
            self.modifiers.order(),
        ))
    }

    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        self.modifiers.to_params()
    }

    fn order_by(mut self, order: OrderBy) -> Result<Query, FirebaseError> {
        // Error-first: one order per query
        if self.modifiers.order_by.is_some() {
            return Err(DatabaseError::InvalidQuery(
                "You can't combine multiple orderBy calls".to_string(),
            )
            .into());
        }
        for (method, bound) in [("startAt", &self.modifiers.start_at), ("endAt", &self.modifiers.end_at)] {
            if let Some(value) = bound {
                self.modifiers.validate_against_order(method, &order, value)?;
            }
        }
        self.modifiers.order_by = Some(order);
        Ok(self)
    }

    fn limit(mut self, method: &str, limit: Limit) -> Result<Query, FirebaseError> {
        let (Limit::First(n) | Limit::Last(n)) = limit;
        if n == 0 {
            return Err(DatabaseError::InvalidQuery(format!(
                "{}(): 'limit' must be a positive integer value",
                method
            ))
            .into());
        }
        if self.modifiers.limit.is_some() {
            return Err(DatabaseError::InvalidQuery(format!(
                "{}(): limit was already set (by another call to limitToFirst, or limitToLast)",
                method
            ))
            .into());
        }
        self.modifiers.limit = Some(limit);
        Ok(self)
    }
}

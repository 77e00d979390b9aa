//! Typed filter predicates evaluated by the store.

use std::cmp::Ordering;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::record::{Document, lookup};

/// Comparison operators understood natively by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    /// The operator's wire name, used when a predicate is echoed back as JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "$eq",
            CmpOp::Ne => "$ne",
            CmpOp::Gt => "$gt",
            CmpOp::Gte => "$gte",
            CmpOp::Lt => "$lt",
            CmpOp::Lte => "$lte",
        }
    }

    fn holds(&self, field: Option<&Value>, operand: &Value) -> bool {
        match self {
            CmpOp::Eq => field.is_some_and(|v| values_equal(v, operand)),
            CmpOp::Ne => !field.is_some_and(|v| values_equal(v, operand)),
            CmpOp::Gt => ordered(field, operand, |o| o == Ordering::Greater),
            CmpOp::Gte => ordered(field, operand, |o| o != Ordering::Less),
            CmpOp::Lt => ordered(field, operand, |o| o == Ordering::Less),
            CmpOp::Lte => ordered(field, operand, |o| o != Ordering::Greater),
        }
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter over documents.
///
/// An empty conjunction matches every document.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Cmp {
        field: String,
        op: CmpOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
}

impl Predicate {
    /// The predicate matching every document.
    pub fn all() -> Self {
        Predicate::And(Vec::new())
    }

    /// Builds a single comparison.
    pub fn cmp(field: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Predicate::Cmp {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Builds an equality comparison.
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, CmpOp::Eq, value)
    }

    /// Builds a membership test.
    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
        }
    }

    /// Returns true if this predicate matches every document.
    pub fn is_match_all(&self) -> bool {
        match self {
            Predicate::And(parts) => parts.iter().all(Predicate::is_match_all),
            _ => false,
        }
    }

    /// Conjoins two predicates, flattening nested conjunctions.
    pub fn and(self, other: Predicate) -> Self {
        let mut parts = self.into_conjuncts();
        parts.extend(other.into_conjuncts());
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::And(parts)
        }
    }

    fn into_conjuncts(self) -> Vec<Predicate> {
        match self {
            Predicate::And(parts) => parts
                .into_iter()
                .flat_map(Predicate::into_conjuncts)
                .collect(),
            other => vec![other],
        }
    }

    /// Evaluates the predicate against a document.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Predicate::And(parts) => parts.iter().all(|p| p.matches(document)),
            Predicate::Cmp { field, op, value } => op.holds(lookup(document, field), value),
            Predicate::In { field, values } => lookup(document, field)
                .is_some_and(|v| values.iter().any(|candidate| values_equal(v, candidate))),
        }
    }

    /// Renders the predicate in the store's JSON query dialect.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        self.write_json(&mut out);
        Value::Object(out)
    }

    fn write_json(&self, out: &mut Map<String, Value>) {
        match self {
            Predicate::And(parts) => {
                for part in parts {
                    part.write_json(out);
                }
            }
            Predicate::Cmp { field, op, value } => {
                let entry = out.entry(field.clone()).or_insert_with(|| json!({}));
                if let Some(ops) = entry.as_object_mut() {
                    ops.insert(op.as_str().to_string(), value.clone());
                }
            }
            Predicate::In { field, values } => {
                let entry = out.entry(field.clone()).or_insert_with(|| json!({}));
                if let Some(ops) = entry.as_object_mut() {
                    ops.insert("$in".to_string(), Value::Array(values.clone()));
                }
            }
        }
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Self::all()
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn ordered(field: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match field {
        Some(v) if same_kind(v, operand) => accept(compare_values(v, operand)),
        _ => false,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

/// Equality with numeric widening (`5 == 5.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Total order across JSON values: values of different kinds order by kind,
/// numbers compare numerically, strings lexically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

//! The filter stage: request parameters to a store predicate.

use std::collections::BTreeMap;

use doc_store::{CmpOp, Predicate};
use serde_json::{Number, Value};

use crate::config::QueryPipelineConfig;
use crate::request::{ParamValue, QueryRequest};
use crate::{PipelineError, Result};

/// A comparison operator accepted in `field[op]=value` parameters.
///
/// This is the whole whitelist. Anything else is rejected before it can reach
/// the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    GreaterOrEqual,
    Greater,
    LessOrEqual,
    Less,
}

impl ComparisonOperator {
    /// Looks up an operator by its short (`gte`) or long (`greaterOrEqual`) name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gte" | "greaterOrEqual" => Some(Self::GreaterOrEqual),
            "gt" | "greater" => Some(Self::Greater),
            "lte" | "lessOrEqual" => Some(Self::LessOrEqual),
            "lt" | "less" => Some(Self::Less),
            _ => None,
        }
    }

    /// The store's native operator.
    pub fn to_native(self) -> CmpOp {
        match self {
            Self::GreaterOrEqual => CmpOp::Gte,
            Self::Greater => CmpOp::Gt,
            Self::LessOrEqual => CmpOp::Lte,
            Self::Less => CmpOp::Lt,
        }
    }
}

/// Builds the filter predicate for a request.
///
/// Reserved keys are skipped. Conditions on different fields are conjoined in
/// key order.
pub(crate) fn build(config: &QueryPipelineConfig, request: &QueryRequest) -> Result<Predicate> {
    let mut predicate = Predicate::all();
    for (key, value) in request.iter() {
        if config.is_reserved(key) {
            continue;
        }
        validate_field(key)?;
        let condition = match value {
            ParamValue::Scalar(raw) => Predicate::equals(key, coerce(raw)),
            ParamValue::Repeated(raws) => {
                if !config.allows_repeats(key) {
                    return Err(PipelineError::parameter(key, "given more than once"));
                }
                Predicate::one_of(key, raws.iter().map(|raw| coerce(raw)).collect())
            }
            ParamValue::Operators(ops) => operators(key, ops)?,
        };
        predicate = predicate.and(condition);
    }
    Ok(predicate)
}

fn operators(field: &str, ops: &BTreeMap<String, String>) -> Result<Predicate> {
    let mut predicate = Predicate::all();
    for (name, raw) in ops {
        let op = ComparisonOperator::from_name(name).ok_or_else(|| {
            PipelineError::InvalidOperator {
                field: field.to_string(),
                operator: name.clone(),
            }
        })?;
        predicate = predicate.and(Predicate::cmp(field, op.to_native(), coerce(raw)));
    }
    Ok(predicate)
}

/// Checks that a field name is a plain (optionally dotted) identifier.
pub(crate) fn validate_field(field: &str) -> Result<()> {
    let well_formed = !field.is_empty()
        && field.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if well_formed {
        Ok(())
    } else {
        Err(PipelineError::parameter(field, "not a valid field name"))
    }
}

/// Interprets a raw parameter value: numbers and booleans become typed JSON,
/// everything else stays a string.
pub(crate) fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(x) = raw.parse::<f64>() {
        if let Some(n) = Number::from_f64(x) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

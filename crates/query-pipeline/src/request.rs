//! Inbound query parameters.

use std::collections::BTreeMap;

use crate::{PipelineError, Result};

/// The value bound to one query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// `key=value`
    Scalar(String),
    /// `key=a&key=b`; only legal for allow-listed keys.
    Repeated(Vec<String>),
    /// `key[op]=value`, keyed by operator name.
    Operators(BTreeMap<String, String>),
}

impl ParamValue {
    /// Returns the value if the parameter was given exactly once as a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

/// A parsed query string: parameter name to value.
///
/// Keys are kept in sorted order so every stage sees them deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    params: BTreeMap<String, ParamValue>,
}

impl QueryRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a request from raw `(key, value)` pairs in query-string order.
    ///
    /// Bracketed keys (`price[gte]`) become operator maps. Repeated plain keys
    /// are collected into [`ParamValue::Repeated`]; whether that is allowed is
    /// decided later by the stages.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut request = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.into();
            match split_bracket(key)? {
                (field, Some(op)) => request.push_operator(field, op, value)?,
                (field, None) => request.push_scalar(field, value)?,
            }
        }
        Ok(request)
    }

    /// Adds (or repeats) a scalar parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.params.get_mut(&key) {
            Some(ParamValue::Repeated(values)) => values.push(value),
            Some(ParamValue::Scalar(first)) => {
                let first = std::mem::take(first);
                self.params
                    .insert(key, ParamValue::Repeated(vec![first, value]));
            }
            // Builder input is trusted; a scalar simply replaces operators.
            Some(ParamValue::Operators(_)) | None => {
                self.params.insert(key, ParamValue::Scalar(value));
            }
        }
        self
    }

    /// Adds an operator parameter (`key[op]=value`).
    pub fn operator(
        mut self,
        key: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let entry = self
            .params
            .entry(key)
            .or_insert_with(|| ParamValue::Operators(BTreeMap::new()));
        if !matches!(entry, ParamValue::Operators(_)) {
            *entry = ParamValue::Operators(BTreeMap::new());
        }
        if let ParamValue::Operators(ops) = entry {
            ops.insert(op.into(), value.into());
        }
        self
    }

    /// Replaces the given parameters wholesale, as a route alias does.
    pub fn with_overrides<'a>(
        mut self,
        overrides: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        for (key, value) in overrides {
            self.params
                .insert(key.to_string(), ParamValue::Scalar(value.to_string()));
        }
        self
    }

    /// Looks up a parameter.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns true if no parameters were given.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    fn push_scalar(&mut self, key: &str, value: String) -> Result<()> {
        match self.params.get_mut(key) {
            None => {
                self.params
                    .insert(key.to_string(), ParamValue::Scalar(value));
            }
            Some(ParamValue::Scalar(first)) => {
                let first = std::mem::take(first);
                self.params
                    .insert(key.to_string(), ParamValue::Repeated(vec![first, value]));
            }
            Some(ParamValue::Repeated(values)) => values.push(value),
            Some(ParamValue::Operators(_)) => {
                return Err(PipelineError::parameter(
                    key,
                    "cannot combine a plain value with comparison operators",
                ));
            }
        }
        Ok(())
    }

    fn push_operator(&mut self, key: &str, op: &str, value: String) -> Result<()> {
        let entry = self
            .params
            .entry(key.to_string())
            .or_insert_with(|| ParamValue::Operators(BTreeMap::new()));
        match entry {
            ParamValue::Operators(ops) => {
                if ops.insert(op.to_string(), value).is_some() {
                    return Err(PipelineError::parameter(
                        format!("{key}[{op}]"),
                        "operator given more than once",
                    ));
                }
                Ok(())
            }
            _ => Err(PipelineError::parameter(
                key,
                "cannot combine a plain value with comparison operators",
            )),
        }
    }
}

/// Splits `field[op]` into its parts. Only one bracket level is accepted.
fn split_bracket(key: &str) -> Result<(&str, Option<&str>)> {
    let Some(open) = key.find('[') else {
        if key.contains(']') {
            return Err(PipelineError::parameter(key, "unbalanced brackets"));
        }
        return Ok((key, None));
    };

    let field = &key[..open];
    let rest = &key[open + 1..];
    let Some(inner) = rest.strip_suffix(']') else {
        return Err(PipelineError::parameter(key, "unbalanced brackets"));
    };
    if inner.contains('[') || inner.contains(']') {
        return Err(PipelineError::parameter(
            key,
            "nested operators are not supported",
        ));
    }
    if field.is_empty() || inner.is_empty() {
        return Err(PipelineError::parameter(key, "empty field or operator"));
    }
    Ok((field, Some(inner)))
}

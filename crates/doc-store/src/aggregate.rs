//! Aggregation pipeline stages and their in-process evaluation.

use serde_json::{Number, Value};

use crate::query::FindOptions;
use crate::record::{Document, ID_FIELD, lookup};
use crate::{Predicate, SortKey};

/// An accumulator computed per group.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Number of documents in the group.
    Count,
    /// Sum of a numeric field.
    Sum(String),
    /// Mean of a numeric field; documents missing the field are ignored.
    Avg(String),
    /// Minimum of a field.
    Min(String),
    /// Maximum of a field.
    Max(String),
}

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keeps documents matching the predicate.
    Match(Predicate),
    /// Groups documents by a field (or all together when `by` is `None`).
    ///
    /// Each output document has `_id` set to the group key and one field per
    /// accumulator. An empty input produces no groups.
    Group {
        by: Option<String>,
        accumulators: Vec<(String, Accumulator)>,
    },
    /// Orders documents by the given keys.
    Sort(Vec<SortKey>),
}

impl Stage {
    /// Convenience constructor for a group stage.
    pub fn group(by: Option<&str>, accumulators: Vec<(&str, Accumulator)>) -> Self {
        Stage::Group {
            by: by.map(str::to_string),
            accumulators: accumulators
                .into_iter()
                .map(|(name, acc)| (name.to_string(), acc))
                .collect(),
        }
    }
}

/// Runs a pipeline over an already-loaded set of documents.
pub fn run_pipeline(mut documents: Vec<Document>, stages: &[Stage]) -> Vec<Document> {
    for stage in stages {
        documents = match stage {
            Stage::Match(predicate) => documents
                .into_iter()
                .filter(|d| predicate.matches(d))
                .collect(),
            Stage::Group { by, accumulators } => group(documents, by.as_deref(), accumulators),
            Stage::Sort(keys) => {
                let opts = FindOptions {
                    sort: keys.clone(),
                    ..FindOptions::default()
                };
                documents.sort_by(|a, b| opts.compare(a, b));
                documents
            }
        };
    }
    documents
}

fn group(
    documents: Vec<Document>,
    by: Option<&str>,
    accumulators: &[(String, Accumulator)],
) -> Vec<Document> {
    // Groups keep first-seen order so output is deterministic.
    let mut groups: Vec<(Value, Vec<Document>)> = Vec::new();
    for document in documents {
        let key = by
            .and_then(|field| lookup(&document, field).cloned())
            .unwrap_or(Value::Null);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(document),
            None => groups.push((key, vec![document])),
        }
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut out = Document::new();
            out.insert(ID_FIELD.to_string(), key);
            for (name, acc) in accumulators {
                out.insert(name.clone(), accumulate(acc, &members));
            }
            out
        })
        .collect()
}

fn accumulate(acc: &Accumulator, members: &[Document]) -> Value {
    let numbers = |field: &str| -> Vec<f64> {
        members
            .iter()
            .filter_map(|d| lookup(d, field).and_then(Value::as_f64))
            .collect()
    };

    match acc {
        Accumulator::Count => Value::from(members.len()),
        Accumulator::Sum(field) => number(numbers(field).iter().sum()),
        Accumulator::Avg(field) => {
            let values = numbers(field);
            if values.is_empty() {
                Value::Null
            } else {
                number(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        Accumulator::Min(field) => extreme(members, field, std::cmp::Ordering::Less),
        Accumulator::Max(field) => extreme(members, field, std::cmp::Ordering::Greater),
    }
}

fn extreme(members: &[Document], field: &str, wanted: std::cmp::Ordering) -> Value {
    members
        .iter()
        .filter_map(|d| lookup(d, field))
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if crate::predicate::compare_values(v, b) != wanted => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::into_document;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|v| into_document(v).unwrap())
            .collect()
    }

    #[test]
    fn match_then_group_counts_and_averages() {
        let input = docs(vec![
            json!({"tour": "a", "rating": 4}),
            json!({"tour": "a", "rating": 5}),
            json!({"tour": "b", "rating": 1}),
        ]);
        let out = run_pipeline(
            input,
            &[
                Stage::Match(Predicate::equals("tour", "a")),
                Stage::group(
                    Some("tour"),
                    vec![
                        ("n", Accumulator::Count),
                        ("avg", Accumulator::Avg("rating".into())),
                    ],
                ),
            ],
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["_id"], json!("a"));
        assert_eq!(out[0]["n"], json!(2));
        assert_eq!(out[0]["avg"], json!(4.5));
    }

    #[test]
    fn empty_input_produces_no_groups() {
        let out = run_pipeline(
            Vec::new(),
            &[Stage::group(None, vec![("n", Accumulator::Count)])],
        );
        assert!(out.is_empty());
    }

    #[test]
    fn min_max_sum_and_sort() {
        let input = docs(vec![
            json!({"difficulty": "easy", "price": 397}),
            json!({"difficulty": "medium", "price": 1497}),
            json!({"difficulty": "easy", "price": 497}),
        ]);
        let out = run_pipeline(
            input,
            &[
                Stage::group(
                    Some("difficulty"),
                    vec![
                        ("min", Accumulator::Min("price".into())),
                        ("max", Accumulator::Max("price".into())),
                        ("total", Accumulator::Sum("price".into())),
                    ],
                ),
                Stage::Sort(vec![SortKey::desc("total")]),
            ],
        );

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["_id"], json!("medium"));
        assert_eq!(out[1]["min"], json!(397));
        assert_eq!(out[1]["max"], json!(497));
        assert_eq!(out[1]["total"], json!(894.0));
    }
}

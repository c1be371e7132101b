//! Collection responses come back in several shapes; this turns each of them
//! into one [`NormalizedPage`].

use serde_json::{Map, Value};

use parqueo_core::NormalizedPage;

/// The response shapes a collection fetch can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ListShape {
    /// A bare JSON array.
    Array(Vec<Value>),
    /// `{results, count, next, previous}`.
    PaginatedResults {
        rows: Vec<Value>,
        count: Option<u64>,
        next: Option<String>,
        previous: Option<String>,
    },
    /// `{items, total, next, prev}`.
    PaginatedItems {
        rows: Vec<Value>,
        total: Option<u64>,
        next: Option<String>,
        prev: Option<String>,
    },
    /// Anything else, shown as a single row.
    SingleObject(Value),
}

impl ListShape {
    /// Classifies a body. First match wins: array, `results`, `items`,
    /// then the single-object fallback.
    pub fn detect(body: Value) -> Self {
        match body {
            Value::Array(rows) => ListShape::Array(rows),
            Value::Object(mut map) => {
                if matches!(map.get("results"), Some(Value::Array(_))) {
                    let rows = take_array(&mut map, "results");
                    return ListShape::PaginatedResults {
                        rows,
                        count: map.get("count").and_then(as_count),
                        next: token(&map, "next"),
                        previous: token(&map, "previous"),
                    };
                }
                if matches!(map.get("items"), Some(Value::Array(_))) {
                    let rows = take_array(&mut map, "items");
                    return ListShape::PaginatedItems {
                        rows,
                        total: map.get("total").and_then(as_count),
                        next: token(&map, "next"),
                        prev: token(&map, "prev"),
                    };
                }
                ListShape::SingleObject(Value::Object(map))
            }
            other => ListShape::SingleObject(other),
        }
    }

    pub fn into_page(self) -> NormalizedPage {
        match self {
            ListShape::Array(rows) => NormalizedPage::single(rows),
            ListShape::PaginatedResults {
                rows,
                count,
                next,
                previous,
            } => NormalizedPage {
                count: count.unwrap_or(rows.len() as u64),
                rows,
                next,
                previous,
            },
            ListShape::PaginatedItems {
                rows,
                total,
                next,
                prev,
            } => NormalizedPage {
                count: total.unwrap_or(rows.len() as u64),
                rows,
                next,
                previous: prev,
            },
            ListShape::SingleObject(record) => NormalizedPage::single(vec![record]),
        }
    }

    /// Just the row sequence; option loading has no use for the
    /// single-object fallback and gets an empty list instead.
    pub fn into_rows(self) -> Vec<Value> {
        match self {
            ListShape::Array(rows)
            | ListShape::PaginatedResults { rows, .. }
            | ListShape::PaginatedItems { rows, .. } => rows,
            ListShape::SingleObject(_) => Vec::new(),
        }
    }
}

/// Normalizes any collection response body.
pub fn normalize(body: Value) -> NormalizedPage {
    if body.is_null() {
        return NormalizedPage::default();
    }
    ListShape::detect(body).into_page()
}

fn take_array(map: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match map.remove(key) {
        Some(Value::Array(rows)) => rows,
        _ => Vec::new(),
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn token(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

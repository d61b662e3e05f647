use serde_json::Value as JsonValue;

/// Equality filters plus an optional ordering, in PostgREST terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    filters: Vec<(String, String)>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push((column.into(), value.to_string()));
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order = Some((column.into(), true));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some((column.into(), false));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    /// Query-string pairs: `col=eq.value`, `order=col.asc`, `limit=n`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|(c, v)| (c.clone(), format!("eq.{v}")))
            .collect();
        if let Some((col, asc)) = &self.order {
            params.push(("order".to_string(), format!("{col}.{}", if *asc { "asc" } else { "desc" })));
        }
        if let Some(n) = self.limit {
            params.push(("limit".to_string(), n.to_string()));
        }
        params
    }

    /// Applies the query to rows held in memory.
    pub fn apply(&self, rows: impl IntoIterator<Item = JsonValue>) -> Vec<JsonValue> {
        let mut out: Vec<JsonValue> = rows
            .into_iter()
            .filter(|row| self.filters.iter().all(|(c, v)| column_matches(row, c, v)))
            .collect();
        if let Some((col, asc)) = &self.order {
            out.sort_by(|a, b| {
                let ord = compare_json(a.get(col), b.get(col));
                if *asc { ord } else { ord.reverse() }
            });
        }
        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

fn column_matches(row: &JsonValue, column: &str, expected: &str) -> bool {
    match row.get(column) {
        Some(JsonValue::String(s)) => s == expected,
        Some(JsonValue::Null) | None => expected == "null",
        Some(other) => other.to_string() == expected,
    }
}

fn compare_json(a: Option<&JsonValue>, b: Option<&JsonValue>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        (None | Some(JsonValue::Null), None | Some(JsonValue::Null)) => Ordering::Equal,
        (None | Some(JsonValue::Null), _) => Ordering::Greater,
        (_, None | Some(JsonValue::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

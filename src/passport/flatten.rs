use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use super::compose::is_present;

static CAMEL_BOUNDARY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://").unwrap());

const MONO_MIN_LEN: usize = 22;
const LABEL_SEPARATOR: &str = " / ";

/// Shape of a row's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Scalar,
    ScalarList,
    MixedList,
    Object,
}

/// How a value should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderHint {
    Text,
    Mono,
    Link,
    Chips,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub label: String,
    pub value: Value,
    pub kind: ValueKind,
    pub hint: RenderHint,
    pub search_text: String,
}

impl Row {
    pub fn new(label: String, value: Value) -> Self {
        let kind = classify(&value);
        let hint = render_hint(&value);
        let search_text = format!("{} {}", label, stringify_value(&value)).to_lowercase();
        Row { label, value, kind, hint, search_text }
    }

    /// Display text for scalar values; chips and JSON blocks use `chips` / `pretty`.
    pub fn text(&self) -> String {
        stringify_value(&self.value)
    }

    pub fn chips(&self) -> Vec<String> {
        match &self.value {
            Value::Array(items) => items.iter().map(stringify_value).collect(),
            _ => Vec::new(),
        }
    }

    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.value).unwrap_or_default()
    }
}

/// Flatten an object into labeled rows, depth first in key order.
pub fn flatten(obj: &Map<String, Value>) -> Vec<Row> {
    flatten_entries(obj.iter(), None)
}

/// Flatten only the keys of `obj` that are not in `excluded`.
pub fn flatten_excluding(obj: &Map<String, Value>, excluded: &[&str]) -> Vec<Row> {
    flatten_entries(
        obj.iter().filter(|(k, _)| !excluded.contains(&k.as_str())),
        None,
    )
}

fn flatten_entries<'a, I>(entries: I, prefix: Option<&str>) -> Vec<Row>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut rows = Vec::new();

    for (key, value) in entries {
        if !is_present(value) {
            continue;
        }
        let label = match prefix {
            Some(p) => format!("{}{}{}", p, LABEL_SEPARATOR, humanize_key(key)),
            None => humanize_key(key),
        };
        match value {
            Value::Object(inner) => rows.extend(flatten_entries(inner.iter(), Some(label.as_str()))),
            _ => rows.push(Row::new(label, value.clone())),
        }
    }

    rows
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn classify(value: &Value) -> ValueKind {
    match value {
        Value::Array(items) if items.iter().all(is_scalar) => ValueKind::ScalarList,
        Value::Array(_) => ValueKind::MixedList,
        Value::Object(_) => ValueKind::Object,
        _ => ValueKind::Scalar,
    }
}

fn render_hint(value: &Value) -> RenderHint {
    match value {
        Value::Array(_) => RenderHint::Chips,
        Value::Object(_) => RenderHint::Json,
        _ => {
            let text = stringify_value(value);
            if LINK_RE.is_match(&text) {
                RenderHint::Link
            } else if text.chars().count() > MONO_MIN_LEN && (text.contains('/') || text.contains('-')) {
                RenderHint::Mono
            } else {
                RenderHint::Text
            }
        }
    }
}

/// Turn a machine key such as `nominal_voltageV` or `co2Footprint` into a label.
pub fn humanize_key(key: &str) -> String {
    let spaced = CAMEL_BOUNDARY_RE.replace_all(key, "$1 $2").replace('_', " ");

    let mut out = String::with_capacity(spaced.len());
    let mut prev_word = false;
    for ch in spaced.chars() {
        let word = ch.is_ascii_alphanumeric() || ch == '_';
        if word && !prev_word {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
        prev_word = word;
    }
    out
}

/// Searchable/displayable text for any JSON value.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match integral(n) {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        Value::Array(items) => items.iter().map(stringify_value).collect::<Vec<_>>().join(" "),
        Value::Object(_) => compact_json(value),
    }
}

/// Compact JSON with integral floats written without a fraction.
pub fn compact_json(value: &Value) -> String {
    serde_json::to_string(&normalize_numbers(value)).unwrap_or_default()
}

fn normalize_numbers(value: &Value) -> Value {
    match value {
        Value::Number(n) => integral(n).map(Value::from).unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(normalize_numbers).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_numbers(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

fn integral(n: &Number) -> Option<i64> {
    n.as_f64()
        .filter(|f| n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15)
        .map(|f| f as i64)
}

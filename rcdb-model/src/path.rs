use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A field path such as `address.city`, `tags[0]` or `meta[author].name`.
///
/// Bracketed and dotted segments are interchangeable: `a[b]` and `a.b`
/// resolve identically. A leading `.` is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut normalized = String::with_capacity(raw.len());
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            if c != '[' {
                normalized.push(c);
                continue;
            }
            let mut inner = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == ']' {
                    closed = true;
                    break;
                }
                inner.push(next);
            }
            if closed && !inner.is_empty() {
                normalized.push('.');
                normalized.push_str(&inner);
            } else {
                // unterminated or empty brackets are kept literally
                normalized.push('[');
                normalized.push_str(&inner);
                if closed {
                    normalized.push(']');
                }
            }
        }
        let trimmed = normalized.strip_prefix('.').unwrap_or(&normalized);
        let segments = trimmed.split('.').map(str::to_string).collect();
        Self { raw, segments }
    }

    /// The path exactly as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walks `value` segment by segment. Objects are indexed by key and
    /// arrays by numeric position; anything else ends the walk.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments.iter().try_fold(value, |current, segment| step(current, segment))
    }

    /// Like [`FieldPath::resolve`], starting from an object's fields.
    pub fn resolve_in<'a>(&self, fields: &'a Map<String, Value>) -> Option<&'a Value> {
        let (head, rest) = self.segments.split_first()?;
        rest.iter()
            .try_fold(fields.get(head)?, |current, segment| step(current, segment))
    }
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

impl From<String> for FieldPath {
    fn from(raw: String) -> Self {
        Self::parse(raw)
    }
}

impl From<&str> for FieldPath {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.raw
    }
}

/// JavaScript truthiness, as applied by the server-side view functions.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

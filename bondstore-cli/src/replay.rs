//! Event traces - one `{"event": N, "fields": [...]}` JSON object per line
//!
//! Field values: `null` is absent, booleans and integers map directly,
//! strings are hex encoded bytes.

use bondstore::Field;

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: field {index}: {reason}")]
    Field {
        line: usize,
        index: usize,
        reason: String,
    },
}

#[derive(Debug, serde::Deserialize)]
struct RawEvent {
    event: u8,
    #[serde(default)]
    fields: Vec<serde_json::Value>,
}

#[derive(Debug, PartialEq)]
pub struct TraceEvent {
    pub line: usize,
    pub event: u8,
    pub fields: Vec<Field>,
}

fn to_field(value: &serde_json::Value) -> Result<Field, String> {
    use serde_json::Value;

    match value {
        Value::Null => Ok(Field::None),
        Value::Bool(b) => Ok(Field::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(Field::Int)
            .ok_or_else(|| format!("{n} is not an integer")),
        Value::String(s) => data_encoding::HEXLOWER_PERMISSIVE
            .decode(s.as_bytes())
            .map(Field::Bytes)
            .map_err(|e| format!("bad hex: {e}")),
        other => Err(format!("unsupported value {other}")),
    }
}

/// Parse a whole trace; blank lines and `#` comments are skipped
pub fn parse(text: &str) -> Result<Vec<TraceEvent>, TraceError> {
    let mut events = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }

        let ev: RawEvent = serde_json::from_str(raw)
            .map_err(|source| TraceError::Json { line, source })?;
        let fields = ev
            .fields
            .iter()
            .enumerate()
            .map(|(index, v)| to_field(v).map_err(|reason| TraceError::Field { line, index, reason }))
            .collect::<Result<_, _>>()?;
        events.push(TraceEvent { line, event: ev.event, fields });
    }
    Ok(events)
}

/// Render a reply without exposing key material
pub fn describe(fields: &[Field]) -> String {
    let parts: Vec<String> = fields
        .iter()
        .map(|f| match f {
            Field::None => "null".to_string(),
            Field::Bool(b) => b.to_string(),
            Field::Int(n) => n.to_string(),
            Field::Bytes(b) => format!("<{} bytes>", b.len()),
        })
        .collect();
    format!("[{}]", parts.join(", "))
}

//! Plain (JSON) rendering of stores and views.

use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};

/// Key of the collision-count marker appended by `include_stats`.
pub const COLLISIONS_KEY: &str = "$collisions";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PlainOptions {
    /// Append a collision-count marker when any collisions exist.
    pub include_stats: bool,
}

impl PlainOptions {
    pub fn with_stats() -> Self {
        Self {
            include_stats: true,
        }
    }
}

/// Render key/value pairs as an object when every key is distinct text,
/// else as an array of `[key, value]` pairs.
///
/// A key equal to the collision marker also forces the pair form when the
/// marker is going to be emitted.
pub(crate) fn pairs<'a, K, V, I>(items: I, collisions: usize, opts: PlainOptions) -> Result<Value>
where
    K: Serialize,
    V: Serialize + 'a,
    I: IntoIterator<Item = (K, &'a V)>,
{
    let mut rows = Vec::new();
    for (k, v) in items {
        rows.push((serde_json::to_value(k)?, serde_json::to_value(v)?));
    }
    let stats = opts.include_stats && collisions > 0;

    if let Some(mut obj) = as_object(&rows, stats) {
        if stats {
            obj.insert(COLLISIONS_KEY.to_string(), Value::from(collisions));
        }
        return Ok(Value::Object(obj));
    }

    let mut arr: Vec<Value> = rows
        .into_iter()
        .map(|(k, v)| Value::Array(vec![k, v]))
        .collect();
    if stats {
        arr.push(Value::Array(vec![
            Value::from(COLLISIONS_KEY),
            Value::from(collisions),
        ]));
    }
    Ok(Value::Array(arr))
}

// None if any key is not a string, repeats, or would clash with the marker.
fn as_object(rows: &[(Value, Value)], stats: bool) -> Option<Map<String, Value>> {
    let mut obj = Map::with_capacity(rows.len() + usize::from(stats));
    for (k, v) in rows {
        let k = k.as_str()?;
        if stats && k == COLLISIONS_KEY {
            return None;
        }
        if obj.insert(k.to_string(), v.clone()).is_some() {
            return None;
        }
    }
    Some(obj)
}

/// Render set members as an array.
pub(crate) fn members<'a, V, I>(items: I, collisions: usize, opts: PlainOptions) -> Result<Value>
where
    V: Serialize + 'a,
    I: IntoIterator<Item = &'a V>,
{
    let mut arr = Vec::new();
    for v in items {
        arr.push(serde_json::to_value(v)?);
    }
    if opts.include_stats && collisions > 0 {
        let mut marker = Map::new();
        marker.insert(COLLISIONS_KEY.to_string(), Value::from(collisions));
        arr.push(Value::Object(marker));
    }
    Ok(Value::Array(arr))
}

//! Normalizer - arbitrary values to JSON
//!
//! Never fails: anything JSON cannot carry becomes a descriptive marker
//! string, and the traversal is bounded by depth, breadth, a node budget and
//! cycle checks.

use chrono::SecondsFormat;
use contracts::{LimitsConfig, Value};
use serde_json::{Map, Number, Value as Json};

use crate::markers;
use crate::visit::{walk, Container, Folder, WalkBounds};

/// Default string cap, in chars
pub const DEFAULT_MAX_STRING_LENGTH: usize = 32_768;

/// Default node budget
pub const DEFAULT_MAX_NODES: usize = 102_400;

/// Normalize with the default string cap
pub fn normalize(value: &Value, max_depth: usize, max_breadth: usize) -> Json {
    Normalizer {
        max_depth,
        max_breadth,
        max_string_length: DEFAULT_MAX_STRING_LENGTH,
        max_nodes: DEFAULT_MAX_NODES,
    }
    .normalize(value)
}

/// Configured normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    pub max_depth: usize,
    pub max_breadth: usize,
    pub max_string_length: usize,
    pub max_nodes: usize,
}

impl Normalizer {
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            max_depth: limits.max_depth,
            max_breadth: limits.max_breadth,
            max_string_length: limits.max_string_length,
            max_nodes: WalkBounds::from_limits(limits).max_nodes,
        }
    }

    /// Same limits with a different depth
    pub fn with_depth(self, max_depth: usize) -> Self {
        Self { max_depth, ..self }
    }

    pub fn normalize(&self, value: &Value) -> Json {
        walk(value, &mut NormalizeFolder(self))
    }

    /// Re-normalize an already JSON payload, e.g. at a lower depth
    pub fn renormalize(&self, json: &Json) -> Json {
        self.normalize(&Value::from(json.clone()))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_limits(&LimitsConfig::default())
    }
}

struct NormalizeFolder<'a>(&'a Normalizer);

impl Folder for NormalizeFolder<'_> {
    type Output = Json;

    fn leaf(&mut self, value: &Value) -> Json {
        match value {
            Value::Undefined => Json::String(markers::UNDEFINED.into()),
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(n) => Json::Number((*n).into()),
            Value::Number(n) => number(*n),
            Value::BigInt(n) => Json::String(markers::bigint(*n)),
            Value::String(s) => Json::String(markers::cap_chars(s, self.0.max_string_length)),
            Value::Date(Some(date)) => {
                Json::String(date.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Date(None) => Json::String(markers::INVALID_DATE.into()),
            Value::Function(name) => Json::String(markers::function(name.as_deref())),
            Value::Symbol(description) => Json::String(markers::symbol(description.as_deref())),
            Value::Array(_) => Json::String(markers::ARRAY.into()),
            Value::Object(_) => Json::String(markers::OBJECT.into()),
        }
    }

    fn circular(&mut self, _kind: Container) -> Json {
        Json::String(markers::CIRCULAR.into())
    }

    fn collapsed(&mut self, kind: Container) -> Json {
        Json::String(kind.marker().into())
    }

    fn array(&mut self, mut items: Vec<Json>, omitted: usize) -> Json {
        if omitted > 0 {
            items.push(Json::String(markers::MAX_PROPERTIES.into()));
        }
        Json::Array(items)
    }

    fn object(&mut self, entries: Vec<(String, Json)>, omitted: usize) -> Json {
        let mut map: Map<String, Json> = entries.into_iter().collect();
        if omitted > 0 {
            map.insert(
                markers::MAX_PROPERTIES_KEY.into(),
                Json::String(markers::MAX_PROPERTIES.into()),
            );
        }
        Json::Object(map)
    }

    fn max_depth(&self) -> usize {
        self.0.max_depth
    }

    fn max_breadth(&self) -> usize {
        self.0.max_breadth
    }

    fn max_nodes(&self) -> usize {
        self.0.max_nodes
    }

    fn skip_property(&self, value: &Value) -> bool {
        value.is_undefined()
    }
}

fn number(n: f64) -> Json {
    if n.is_nan() {
        Json::String(markers::NAN.into())
    } else if n == f64::INFINITY {
        Json::String(markers::INFINITY.into())
    } else if n == f64::NEG_INFINITY {
        Json::String(markers::NEG_INFINITY.into())
    } else {
        Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

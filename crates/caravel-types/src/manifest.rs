//! Manifest values and path-based access
//!
//! A manifest is an arbitrarily nested structured document (map / sequence /
//! scalar). Patch targets vary by resource kind, so access goes through
//! dotted paths (`spec.template.metadata.labels`, `spec.containers[0].image`)
//! rather than a fixed schema.

use crate::kind::ResourceKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured description of a cluster resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Value);

/// One segment of a dotted path.
enum PathSegment<'a> {
    Key(&'a str),
    Index(usize),
}

fn segments(path: &str) -> Vec<PathSegment<'_>> {
    let mut out = Vec::new();
    for part in path.split('.') {
        match part.find('[') {
            None => out.push(PathSegment::Key(part)),
            Some(open) => {
                if open > 0 {
                    out.push(PathSegment::Key(&part[..open]));
                }
                let mut rest = &part[open..];
                while let Some(close) = rest.find(']') {
                    if let Ok(idx) = rest[1..close].parse::<usize>() {
                        out.push(PathSegment::Index(idx));
                    }
                    rest = &rest[close + 1..];
                    if !rest.starts_with('[') {
                        break;
                    }
                }
            }
        }
    }
    out
}

impl Manifest {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Resource kind string (`deployment`, `customResourceDefinition`, ...).
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    /// Resource kind, parsed.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        self.kind().map(ResourceKind::parse)
    }

    pub fn api_version(&self) -> Option<&str> {
        self.0.get("apiVersion").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.value_at("metadata.name").and_then(Value::as_str)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.value_at("metadata.namespace").and_then(Value::as_str)
    }

    /// `metadata.generation`, bumped by the cluster on every spec change.
    pub fn generation(&self) -> Option<i64> {
        self.value_at("metadata.generation").and_then(Value::as_i64)
    }

    /// Read the value at a dotted path.
    pub fn value_at(&self, path: &str) -> Option<&Value> {
        let mut current = &self.0;
        for segment in segments(path) {
            current = match segment {
                PathSegment::Key(key) => current.get(key)?,
                PathSegment::Index(idx) => current.get(idx)?,
            };
        }
        Some(current)
    }

    /// Mutable access to the value at a dotted path.
    pub fn value_at_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut current = &mut self.0;
        for segment in segments(path) {
            current = match segment {
                PathSegment::Key(key) => current.get_mut(key)?,
                PathSegment::Index(idx) => current.get_mut(idx)?,
            };
        }
        Some(current)
    }

    /// Write a value at a dotted path, creating intermediate objects for
    /// missing key segments. Returns false when the path is blocked by a
    /// non-object value or an out-of-bounds index.
    pub fn set_value_at(&mut self, path: &str, value: Value) -> bool {
        let segs = segments(path);
        if segs.is_empty() {
            return false;
        }
        let mut current = &mut self.0;
        for (i, segment) in segs.iter().enumerate() {
            let last = i == segs.len() - 1;
            match segment {
                PathSegment::Key(key) => {
                    if current.is_null() {
                        *current = Value::Object(Map::new());
                    }
                    let Some(map) = current.as_object_mut() else {
                        return false;
                    };
                    if last {
                        map.insert((*key).to_string(), value);
                        return true;
                    }
                    current = map.entry((*key).to_string()).or_insert(Value::Null);
                }
                PathSegment::Index(idx) => {
                    let Some(seq) = current.as_array_mut() else {
                        return false;
                    };
                    if *idx >= seq.len() {
                        return false;
                    }
                    if last {
                        seq[*idx] = value;
                        return true;
                    }
                    current = &mut seq[*idx];
                }
            }
        }
        false
    }
}

impl From<Value> for Manifest {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<Manifest> for Value {
    fn from(manifest: Manifest) -> Self {
        manifest.0
    }
}

use http::Method;
use serde_json::Value;

/// Where a parameter is carried in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

impl From<oas3::spec::ParameterIn> for ParameterLocation {
    fn from(loc: oas3::spec::ParameterIn) -> Self {
        match loc {
            oas3::spec::ParameterIn::Path => ParameterLocation::Path,
            oas3::spec::ParameterIn::Query => ParameterLocation::Query,
            oas3::spec::ParameterIn::Header => ParameterLocation::Header,
            oas3::spec::ParameterIn::Cookie => ParameterLocation::Cookie,
        }
    }
}

/// Nesting limit when collecting types through `anyOf`/`oneOf`
const MAX_SCHEMA_DEPTH: usize = 8;

/// A declared parameter with its schema flattened to JSON (`$ref`s resolved)
#[derive(Debug, Clone)]
pub struct ParameterMeta {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Option<Value>,
}

impl ParameterMeta {
    /// Primitive type names declared for this parameter's schema.
    ///
    /// Reads `type` as either a single name or a list. A schema without a
    /// `type` contributes the union of its `anyOf`/`oneOf` alternatives; if
    /// any alternative is untyped the result is empty (unconstrained).
    #[must_use]
    pub fn schema_types(&self) -> Vec<String> {
        self.schema
            .as_ref()
            .map(|s| declared_types(s, 0))
            .unwrap_or_default()
    }
}

fn declared_types(schema: &Value, depth: usize) -> Vec<String> {
    if depth > MAX_SCHEMA_DEPTH {
        return Vec::new();
    }
    match schema.get("type") {
        Some(Value::String(t)) => return vec![t.clone()],
        Some(Value::Array(ts)) => {
            return ts
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        }
        _ => {}
    }
    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(alternatives)) = schema.get(key) {
            let mut types = Vec::new();
            for alt in alternatives {
                let alt_types = declared_types(alt, depth + 1);
                if alt_types.is_empty() {
                    return Vec::new();
                }
                types.extend(alt_types);
            }
            return types;
        }
    }
    Vec::new()
}

/// One declared `(method, path template)` pair with everything the route tree needs
#[derive(Debug, Clone)]
pub struct RouteMeta {
    pub method: Method,
    /// Path template exactly as declared under `paths`
    pub path_pattern: String,
    pub operation_id: Option<String>,
    /// Operation parameters merged with the path item's shared parameters
    pub parameters: Vec<ParameterMeta>,
}

impl RouteMeta {
    /// Find the `in: path` parameter satisfying a `{name}` placeholder
    #[must_use]
    pub fn path_parameter(&self, name: &str) -> Option<&ParameterMeta> {
        self.parameters
            .iter()
            .find(|p| p.location == ParameterLocation::Path && p.name == name)
    }
}

/// Descriptive metadata of a loaded specification, used for logging and `apimeter_spec_info`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecMeta {
    pub title: String,
    pub version: String,
    /// Path component of the first server URL, without trailing `/` (empty when absent)
    pub base_path: String,
    /// Number of declared `(method, path)` pairs across supported methods
    pub endpoint_count: usize,
}

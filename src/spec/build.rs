use super::error::SpecError;
use super::types::{ParameterLocation, ParameterMeta, RouteMeta, SpecMeta};
use http::Method;
use oas3::spec::{ObjectOrReference, Parameter};
use oas3::OpenApiV3Spec;
use serde_json::Value;
use tracing::debug;

/// HTTP methods that get a route tree. Anything else never matches.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::HEAD,
];

/// Nesting limit for `$ref` expansion; guards against self-referencing schemas
const MAX_REF_DEPTH: usize = 10;

/// Resolve a JSON Schema `$ref` to the actual schema definition
///
/// Looks up schema references like `#/components/schemas/UserId` in the OpenAPI spec
/// and returns the resolved schema object.
pub fn resolve_schema_ref<'a>(
    spec: &'a OpenApiV3Spec,
    ref_path: &str,
) -> Option<&'a oas3::spec::ObjectSchema> {
    if let Some(name) = ref_path.strip_prefix("#/components/schemas/") {
        spec.components
            .as_ref()?
            .schemas
            .get(name)
            .and_then(|schema_ref| match schema_ref {
                ObjectOrReference::Object(schema) => Some(schema),
                _ => None,
            })
    } else {
        None
    }
}

/// Recursively expand `$ref` objects in a schema value with their component definitions
pub fn expand_schema_refs(spec: &OpenApiV3Spec, value: &mut Value) {
    expand_schema_refs_at(spec, value, 0);
}

fn expand_schema_refs_at(spec: &OpenApiV3Spec, value: &mut Value, depth: usize) {
    if depth > MAX_REF_DEPTH {
        return;
    }
    match value {
        Value::Object(obj) => {
            if let Some(ref_path) = obj.get("$ref").and_then(|v| v.as_str()) {
                if let Some(schema) = resolve_schema_ref(spec, ref_path) {
                    if let Ok(mut new_val) = serde_json::to_value(schema) {
                        expand_schema_refs_at(spec, &mut new_val, depth + 1);
                        *value = new_val;
                        return;
                    }
                }
            }
            for v in obj.values_mut() {
                expand_schema_refs_at(spec, v, depth + 1);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                expand_schema_refs_at(spec, v, depth + 1);
            }
        }
        _ => {}
    }
}

fn resolve_parameter_ref<'a>(spec: &'a OpenApiV3Spec, ref_path: &str) -> Option<&'a Parameter> {
    if let Some(name) = ref_path.strip_prefix("#/components/parameters/") {
        spec.components
            .as_ref()?
            .parameters
            .get(name)
            .and_then(|param_ref| match param_ref {
                ObjectOrReference::Object(param) => Some(param),
                _ => None,
            })
    } else {
        None
    }
}

/// Extract parameter metadata, resolving parameter and schema references.
///
/// References that cannot be resolved are skipped; a placeholder relying on
/// one then surfaces as a missing declaration when the tree is built.
pub fn extract_parameters(
    spec: &OpenApiV3Spec,
    params: &[ObjectOrReference<Parameter>],
) -> Vec<ParameterMeta> {
    let mut out = Vec::new();
    for p in params {
        let param = match p {
            ObjectOrReference::Object(obj) => Some(obj),
            ObjectOrReference::Ref { ref_path, .. } => resolve_parameter_ref(spec, ref_path),
        };

        if let Some(param) = param {
            let mut schema = param.schema.as_ref().and_then(|s| match s {
                ObjectOrReference::Object(obj) => serde_json::to_value(obj).ok(),
                ObjectOrReference::Ref { ref_path, .. } => resolve_schema_ref(spec, ref_path)
                    .and_then(|sch| serde_json::to_value(sch).ok()),
            });
            if let Some(ref mut val) = schema {
                expand_schema_refs(spec, val);
            }

            out.push(ParameterMeta {
                name: param.name.clone(),
                location: ParameterLocation::from(param.location),
                required: param.required.unwrap_or(false),
                schema,
            });
        }
    }
    out
}

/// Operation parameters first, then path-item parameters not shadowed by
/// an operation parameter with the same name and location.
fn merge_parameters(operation: Vec<ParameterMeta>, shared: Vec<ParameterMeta>) -> Vec<ParameterMeta> {
    let mut merged = operation;
    for param in shared {
        let shadowed = merged
            .iter()
            .any(|p| p.name == param.name && p.location == param.location);
        if !shadowed {
            merged.push(param);
        }
    }
    merged
}

/// Derive the base path from the first declared server URL.
///
/// Server variables are replaced by their defaults, relative URLs are resolved
/// against a placeholder origin, and a trailing `/` is dropped so that `/`
/// alone yields an empty base path.
pub fn base_path(spec: &OpenApiV3Spec) -> Result<String, SpecError> {
    let Some(server) = spec.servers.first() else {
        return Ok(String::new());
    };

    let mut url_str = server.url.clone();
    for (name, variable) in &server.variables {
        url_str = url_str.replace(&format!("{{{name}}}"), &variable.default);
    }

    let parsed = match url::Url::parse(&url_str) {
        Ok(u) => Ok(u),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            url::Url::parse("http://localhost/").and_then(|origin| origin.join(&url_str))
        }
        Err(e) => Err(e),
    }
    .map_err(|source| SpecError::InvalidServerUrl {
        url: url_str.clone(),
        source,
    })?;

    let p = parsed.path().trim_end_matches('/');
    Ok(p.to_string())
}

/// Title, version and base path of a document; `endpoint_count` is filled in by the caller
pub fn spec_meta(spec: &OpenApiV3Spec) -> Result<SpecMeta, SpecError> {
    Ok(SpecMeta {
        title: spec.info.title.clone(),
        version: spec.info.version.clone(),
        base_path: base_path(spec)?,
        endpoint_count: 0,
    })
}

/// Collect every declared `(method, path)` pair for the supported methods.
///
/// Paths are visited in the document model's key order; the resulting tree
/// does not depend on it.
#[must_use]
pub fn build_routes(spec: &OpenApiV3Spec) -> Vec<RouteMeta> {
    let mut routes = Vec::new();

    let Some(paths_map) = spec.paths.as_ref() else {
        return routes;
    };

    for (path, item) in paths_map {
        let shared = extract_parameters(spec, &item.parameters);
        for (method, operation) in item.methods() {
            let method: Method = method.clone();
            if !SUPPORTED_METHODS.contains(&method) {
                debug!(method = %method, path = %path, "Skipping unsupported method");
                continue;
            }

            let parameters = merge_parameters(
                extract_parameters(spec, &operation.parameters),
                shared.clone(),
            );

            debug!(
                method = %method,
                path = %path,
                operation_id = ?operation.operation_id,
                parameters = parameters.len(),
                "Declared route"
            );

            routes.push(RouteMeta {
                method,
                path_pattern: path.clone(),
                operation_id: operation.operation_id.clone(),
                parameters,
            });
        }
    }

    routes
}

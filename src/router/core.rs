use http::Method;
use oas3::OpenApiV3Spec;
use std::collections::HashMap;
use tracing::debug;

use super::radix::{split_segments, RouteLeaf, RouteTree};
use crate::spec::{build_routes, spec_meta, SpecError, SpecMeta, SUPPORTED_METHODS};

/// Successful resolution of a concrete request to a declared route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub method: Method,
    /// Declared template with the base path prefixed, e.g. `/api/v1/users/{userId}`
    pub template: String,
    pub operation_id: Option<String>,
}

/// An immutable, fully built view of one OpenAPI document.
///
/// Holds the document's metadata and one [`RouteTree`] per supported
/// method. Instances are never mutated after construction; a reload builds a
/// new one and swaps it in (see [`crate::hot_reload::SpecStore`]).
///
/// When two declared templates can both match a request (sibling parameters
/// whose recognizers overlap), the first branch found by the search wins.
/// Which one that is follows placeholder-name order and is not a precedence
/// guarantee; only "literal before parameter at the same position" is.
#[derive(Debug, Clone)]
pub struct Specification {
    meta: SpecMeta,
    trees: HashMap<Method, RouteTree>,
}

impl Specification {
    /// Build every per-method tree from a parsed document.
    ///
    /// Fails on the first placeholder without a declared path parameter or on
    /// an unparsable server URL; no partial specification is ever returned.
    pub fn from_document(document: OpenApiV3Spec) -> Result<Self, SpecError> {
        let mut meta = spec_meta(&document)?;

        let mut trees: HashMap<Method, RouteTree> = SUPPORTED_METHODS
            .iter()
            .map(|m| (m.clone(), RouteTree::new(m.clone())))
            .collect();

        for route in build_routes(&document) {
            if let Some(tree) = trees.get_mut(&route.method) {
                tree.insert(&route)?;
            }
        }

        meta.endpoint_count = trees.values().map(RouteTree::endpoint_count).sum();
        debug!(
            title = %meta.title,
            version = %meta.version,
            base_path = %meta.base_path,
            endpoints = meta.endpoint_count,
            "Route trees built"
        );

        Ok(Self { meta, trees })
    }

    #[must_use]
    pub fn meta(&self) -> &SpecMeta {
        &self.meta
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.meta.base_path
    }

    /// Route tree for `method`; `None` for unsupported methods
    #[must_use]
    pub fn tree(&self, method: &Method) -> Option<&RouteTree> {
        self.trees.get(method)
    }

    /// Resolve a raw method token and request URI.
    ///
    /// The token is case-sensitive; anything other than the supported
    /// upper-case methods is a non-match.
    #[must_use]
    pub fn resolve(&self, method: &str, uri: &str) -> Option<RouteMatch> {
        let method = Method::from_bytes(method.as_bytes()).ok()?;
        self.resolve_method(&method, uri)
    }

    /// Resolve a request URI for an already parsed method.
    ///
    /// Query string and fragment are ignored. The path must start with the
    /// base path on a segment boundary. `None` is the expected outcome for
    /// unknown traffic and is not logged.
    #[must_use]
    pub fn resolve_method(&self, method: &Method, uri: &str) -> Option<RouteMatch> {
        let tree = self.trees.get(method)?;
        let path = uri.split(&['?', '#'][..]).next().unwrap_or_default();
        let relative = self.strip_base_path(path)?;
        let segments = split_segments(relative);
        let leaf = tree.search(&segments)?;

        Some(RouteMatch {
            method: method.clone(),
            template: self.canonical_template(&leaf.template),
            operation_id: leaf.operation_id.clone(),
        })
    }

    fn strip_base_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let base = self.meta.base_path.as_str();
        if base.is_empty() {
            return Some(path);
        }
        let rest = path.strip_prefix(base)?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// `template` with the base path prefixed, as reported in [`RouteMatch`]
    #[must_use]
    pub fn canonical_template(&self, template: &str) -> String {
        let base = self.meta.base_path.as_str();
        match template {
            "/" | "" if !base.is_empty() => base.to_string(),
            t if t.starts_with('/') => format!("{base}{t}"),
            t => format!("{base}/{t}"),
        }
    }

    /// Every declared route as `(method, leaf)`, in supported-method order
    /// then template order
    #[must_use]
    pub fn routes(&self) -> Vec<(&Method, &RouteLeaf)> {
        SUPPORTED_METHODS
            .iter()
            .filter_map(|m| self.trees.get(m))
            .flat_map(|tree| {
                tree.templates()
                    .into_iter()
                    .map(move |leaf| (tree.method(), leaf))
            })
            .collect()
    }
}

//! Per-method route tree with typed parameter positions.
//!
//! Every declared path template for one HTTP method is split on `/` and
//! inserted segment by segment. Literal segments live in a map keyed by
//! their exact text; `{name}` placeholders live in a separate map of
//! parameter nodes, each carrying a [`Recognizer`] built from the declared
//! schema type(s). The two maps never share nodes, so a placeholder's brace
//! text can only ever be reached through a recognizer, and never through
//! the parameter it names.
//!
//! ## Search
//!
//! A request may match a literal child and one or more parameter children at
//! the same position, and only some of those branches lead to a leaf. Lookup
//! is therefore a depth-first search with backtracking over an explicit work
//! stack of `(node, segment index)` pairs:
//!
//! - the literal child is explored first,
//! - then every parameter child whose recognizer accepts the segment, in
//!   placeholder-name order,
//! - the first branch that consumes every segment on a leaf wins.
//!
//! A branch that runs out of segments on a non-leaf node, or finds no child
//! for the next segment, is abandoned and the next pending branch resumes.

use http::Method;
use smallvec::{smallvec, SmallVec};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::recognizer::Recognizer;
use crate::spec::{RouteMeta, SpecError};

/// Split a template or request path into its non-empty `/`-separated segments.
///
/// `/a/b`, `a/b/` and `//a//b` all yield `["a", "b"]`.
pub fn split_segments(path: &str) -> SmallVec<[&str; 8]> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Placeholder name when `segment` is written as `{name}`
fn placeholder_name(segment: &str) -> Option<&str> {
    if segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}') {
        Some(&segment[1..segment.len() - 1])
    } else {
        None
    }
}

/// Template data stored where a declared path ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLeaf {
    /// Path template exactly as declared, without the base path
    pub template: String,
    pub operation_id: Option<String>,
}

/// One path segment position in a [`RouteTree`]
#[derive(Debug, Clone, Default)]
pub struct RouteNode {
    /// Literal text, or `{name}` for a parameter node; empty at the root
    segment: String,
    literals: HashMap<String, RouteNode>,
    /// Parameter children keyed by placeholder name
    params: BTreeMap<String, RouteNode>,
    /// Present iff this is a parameter node
    recognizer: Option<Recognizer>,
    leaf: Option<RouteLeaf>,
}

impl RouteNode {
    fn literal(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            ..Self::default()
        }
    }

    fn parameter(segment: &str, recognizer: Recognizer) -> Self {
        Self {
            segment: segment.to_string(),
            recognizer: Some(recognizer),
            ..Self::default()
        }
    }

    /// Segment text as declared (`users`, `{userId}`); empty for the root
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    #[must_use]
    pub fn is_parameter(&self) -> bool {
        self.recognizer.is_some()
    }

    #[must_use]
    pub fn recognizer(&self) -> Option<&Recognizer> {
        self.recognizer.as_ref()
    }

    /// Whether some declared path ends exactly here
    #[must_use]
    pub fn can_be_leaf(&self) -> bool {
        self.leaf.is_some()
    }

    /// Declared template ending here, if any
    #[must_use]
    pub fn canonical_path(&self) -> Option<&str> {
        self.leaf.as_ref().map(|l| l.template.as_str())
    }

    #[must_use]
    pub fn leaf(&self) -> Option<&RouteLeaf> {
        self.leaf.as_ref()
    }

    /// Child nodes in a stable order: literals sorted by text, then parameters
    /// sorted by placeholder name.
    #[must_use]
    pub fn children(&self) -> Vec<&RouteNode> {
        let mut literals: Vec<&RouteNode> = self.literals.values().collect();
        literals.sort_by(|a, b| a.segment.cmp(&b.segment));
        literals.extend(self.params.values());
        literals
    }

    fn accepts(&self, segment: &str) -> bool {
        self.recognizer
            .as_ref()
            .is_some_and(|r| r.is_match(segment))
    }
}

/// A template segment resolved before the tree is touched, so a failing
/// template never leaves partial nodes behind
enum TemplateSegment<'a> {
    Literal(&'a str),
    Parameter {
        text: &'a str,
        name: &'a str,
        recognizer: Recognizer,
    },
}

fn resolve_template(route: &RouteMeta) -> Result<Vec<TemplateSegment<'_>>, SpecError> {
    split_segments(&route.path_pattern)
        .into_iter()
        .map(|text| match placeholder_name(text) {
            None => Ok(TemplateSegment::Literal(text)),
            Some(name) => {
                let param = route.path_parameter(name).ok_or_else(|| {
                    SpecError::MissingParameterDeclaration {
                        method: route.method.clone(),
                        path: route.path_pattern.clone(),
                        segment: text.to_string(),
                    }
                })?;
                Ok(TemplateSegment::Parameter {
                    text,
                    name,
                    recognizer: Recognizer::for_types(&param.schema_types()),
                })
            }
        })
        .collect()
}

/// Every declared path of one HTTP method
#[derive(Debug, Clone)]
pub struct RouteTree {
    method: Method,
    root: RouteNode,
    endpoints: usize,
}

impl RouteTree {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            root: RouteNode::default(),
            endpoints: 0,
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn root(&self) -> &RouteNode {
        &self.root
    }

    /// Number of distinct leaf positions
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints
    }

    /// Insert one declared route.
    ///
    /// Fails with [`SpecError::MissingParameterDeclaration`] when a placeholder
    /// has no matching `in: path` parameter; the tree is left unchanged in
    /// that case.
    pub fn insert(&mut self, route: &RouteMeta) -> Result<(), SpecError> {
        let segments = resolve_template(route)?;

        let mut node = &mut self.root;
        for segment in segments {
            node = match segment {
                TemplateSegment::Literal(text) => node
                    .literals
                    .entry(text.to_string())
                    .or_insert_with(|| RouteNode::literal(text)),
                TemplateSegment::Parameter {
                    text,
                    name,
                    recognizer,
                } => {
                    let child = node
                        .params
                        .entry(name.to_string())
                        .or_insert_with(|| RouteNode::parameter(text, recognizer.clone()));
                    if let Some(existing) = child.recognizer.as_mut() {
                        *existing = existing.union(&recognizer);
                    }
                    child
                }
            };
        }

        let leaf = RouteLeaf {
            template: route.path_pattern.clone(),
            operation_id: route.operation_id.clone(),
        };
        match node.leaf.replace(leaf) {
            None => self.endpoints += 1,
            Some(previous) if previous.template != route.path_pattern => {
                debug!(
                    method = %self.method,
                    previous = %previous.template,
                    template = %route.path_pattern,
                    "Template overwrites an identical segment sequence"
                );
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Find the leaf reached by consuming exactly `segments`.
    ///
    /// A request segment equal to a parameter's own placeholder (`{userId}`
    /// against `{userId}`) is never accepted by that parameter; any other
    /// text, braces included, is left to its recognizer.
    #[must_use]
    pub fn search(&self, segments: &[&str]) -> Option<&RouteLeaf> {
        let mut pending: SmallVec<[(&RouteNode, usize); 16]> = smallvec![(&self.root, 0)];

        while let Some((node, depth)) = pending.pop() {
            let Some(segment) = segments.get(depth) else {
                if let Some(leaf) = node.leaf.as_ref() {
                    return Some(leaf);
                }
                continue;
            };

            // Pushed in reverse so they pop in name order, after the literal
            for child in node.params.values().rev() {
                if child.segment != *segment && child.accepts(segment) {
                    pending.push((child, depth + 1));
                }
            }
            if let Some(child) = node.literals.get(*segment) {
                pending.push((child, depth + 1));
            }
        }

        None
    }

    /// Every declared template in this tree, sorted
    #[must_use]
    pub fn templates(&self) -> Vec<&RouteLeaf> {
        let mut out = Vec::with_capacity(self.endpoints);
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if let Some(leaf) = node.leaf.as_ref() {
                out.push(leaf);
            }
            stack.extend(node.literals.values());
            stack.extend(node.params.values());
        }
        out.sort_by(|a, b| a.template.cmp(&b.template));
        out
    }
}

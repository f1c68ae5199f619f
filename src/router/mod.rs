//! # Router Module
//!
//! Resolves concrete gateway requests (`GET /api/v1/users/482/posts/77`) back
//! to the route templates declared in an OpenAPI document
//! (`/api/v1/users/{userId}/posts/{postId}`), so request metrics can be
//! labelled per endpoint instead of per raw URL.
//!
//! ## Architecture
//!
//! - [`Recognizer`] decides whether a path segment can stand for a typed
//!   `{name}` placeholder (`integer` → digits, `boolean` → `true|false`,
//!   `string` → anything).
//! - [`RouteTree`] holds every declared template of one method as a prefix
//!   tree of literal and parameter nodes, and searches it with backtracking.
//! - [`Specification`] owns the parsed document, the base path and one tree
//!   per supported method, and exposes [`Specification::resolve`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use apimeter::spec::load_spec;
//!
//! let spec = load_spec("openapi.yaml")?;
//! if let Some(m) = spec.resolve("GET", "/api/v1/users/482?expand=posts") {
//!     assert_eq!(m.template, "/api/v1/users/{userId}");
//! }
//! ```
//!
//! A non-match is a normal outcome (health checks, scanners, typos) and is
//! returned as `None`, never as an error.

mod core;
mod radix;
mod recognizer;
#[cfg(test)]
mod tests;

pub use core::{RouteMatch, Specification};
pub use radix::{split_segments, RouteLeaf, RouteNode, RouteTree};
pub use recognizer::{Recognizer, SegmentClass};

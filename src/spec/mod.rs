//! # Spec Module
//!
//! Loading an OpenAPI 3 document and extracting what route resolution needs
//! from it: the base path, descriptive metadata, and every declared
//! `(method, path)` pair with its merged parameter declarations.
//!
//! Documents come from a local file or an `http(s)` URL ([`SpecSource`]) and
//! may be YAML or JSON. The resulting [`RouteMeta`] list feeds the route tree
//! builder in [`crate::router`].

mod build;
mod error;
mod load;
mod types;

pub use build::{
    base_path, build_routes, expand_schema_refs, extract_parameters, resolve_schema_ref,
    spec_meta, SUPPORTED_METHODS,
};
pub use error::SpecError;
pub use load::{load_spec, load_spec_str, parse_document, SpecSource};
pub use types::{ParameterLocation, ParameterMeta, RouteMeta, SpecMeta};

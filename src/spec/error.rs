use http::Method;
use std::fmt;
use std::path::PathBuf;

/// Failure to turn an OpenAPI document into a [`Specification`](crate::router::Specification).
///
/// Every variant is fatal to the load that produced it. The caller (initial
/// load or reload job) decides whether to terminate or keep serving the
/// previously published specification.
#[derive(Debug)]
pub enum SpecError {
    /// The local specification file could not be read
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },
    /// The remote specification could not be fetched (transport failure or non-2xx status)
    Fetch {
        /// URL that was requested
        url: String,
        /// Underlying HTTP client failure
        source: reqwest::Error,
    },
    /// The document is neither valid YAML nor valid JSON
    Syntax(serde_yaml::Error),
    /// The document parsed but does not describe an OpenAPI 3 object model
    Model(serde_json::Error),
    /// The first server URL cannot be parsed, so no base path can be derived
    InvalidServerUrl {
        /// Server URL after variable substitution
        url: String,
        /// Parse failure
        source: url::ParseError,
    },
    /// A `{name}` placeholder has no `in: path` parameter declared for its operation
    MissingParameterDeclaration {
        /// Method of the operation being inserted
        method: Method,
        /// Declared path template
        path: String,
        /// Offending placeholder segment, braces included
        segment: String,
    },
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::Io { path, source } => {
                write!(f, "failed to read specification {}: {}", path.display(), source)
            }
            SpecError::Fetch { url, source } => {
                write!(f, "failed to fetch specification from {}: {}", url, source)
            }
            SpecError::Syntax(e) => write!(f, "specification is not valid YAML or JSON: {}", e),
            SpecError::Model(e) => write!(f, "specification is not a valid OpenAPI 3 document: {}", e),
            SpecError::InvalidServerUrl { url, source } => {
                write!(f, "cannot derive base path from server url '{}': {}", url, source)
            }
            SpecError::MissingParameterDeclaration {
                method,
                path,
                segment,
            } => write!(
                f,
                "path parameter {} of {} {} is not declared on the operation or its path item",
                segment, method, path
            ),
        }
    }
}

impl std::error::Error for SpecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpecError::Io { source, .. } => Some(source),
            SpecError::Fetch { source, .. } => Some(source),
            SpecError::Syntax(e) => Some(e),
            SpecError::Model(e) => Some(e),
            SpecError::InvalidServerUrl { source, .. } => Some(source),
            SpecError::MissingParameterDeclaration { .. } => None,
        }
    }
}

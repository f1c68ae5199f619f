use super::error::SpecError;
use crate::router::Specification;
use oas3::OpenApiV3Spec;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for a single remote specification fetch
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where an OpenAPI document is loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    /// `http://` or `https://` URL fetched with a blocking client
    Url(String),
    /// Local YAML or JSON file
    File(PathBuf),
}

impl SpecSource {
    /// Classify a configured location. `http(s)://` is remote, `file://` and
    /// anything else is a local path.
    #[must_use]
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            return SpecSource::Url(location.to_string());
        }
        if let Some(path) = location.strip_prefix("file://") {
            return SpecSource::File(PathBuf::from(path));
        }
        SpecSource::File(PathBuf::from(location))
    }

    /// Read the raw document bytes
    pub fn fetch(&self) -> Result<Vec<u8>, SpecError> {
        match self {
            SpecSource::File(path) => std::fs::read(path).map_err(|source| SpecError::Io {
                path: path.clone(),
                source,
            }),
            SpecSource::Url(url) => fetch_url(url).map_err(|source| SpecError::Fetch {
                url: url.clone(),
                source,
            }),
        }
    }

    /// Fetch, parse and build a complete [`Specification`]
    pub fn load(&self) -> Result<Specification, SpecError> {
        let bytes = self.fetch()?;
        let document = parse_document(&bytes)?;
        Specification::from_document(document)
    }
}

impl fmt::Display for SpecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecSource::Url(url) => write!(f, "{url}"),
            SpecSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn fetch_url(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()?;
    let body = client.get(url).send()?.error_for_status()?.bytes()?;
    Ok(body.to_vec())
}

/// Drop path-item keys that are neither operations nor known path-item fields,
/// so vendor quirks (`x-` aside) do not fail strict deserialization.
fn strip_unknown_verbs(val: &mut serde_json::Value) {
    const METHODS: [&str; 8] = ["get", "post", "put", "delete", "patch", "options", "head", "trace"];

    if let Some(serde_json::Value::Object(paths_map)) = val.get_mut("paths") {
        for item in paths_map.values_mut() {
            if let serde_json::Value::Object(obj) = item {
                obj.retain(|k, _| {
                    let lk = k.to_ascii_lowercase();
                    match lk.as_str() {
                        "summary" | "description" | "servers" | "parameters" | "$ref" => true,
                        m if METHODS.contains(&m) => true,
                        _ => k.starts_with("x-"),
                    }
                });
            }
        }
    }
}

/// Parse a YAML or JSON OpenAPI document into the `oas3` object model.
///
/// YAML is a superset of JSON, so one parser serves both encodings.
pub fn parse_document(bytes: &[u8]) -> Result<OpenApiV3Spec, SpecError> {
    let mut value: serde_json::Value = serde_yaml::from_slice(bytes).map_err(SpecError::Syntax)?;
    strip_unknown_verbs(&mut value);
    serde_json::from_value(value).map_err(SpecError::Model)
}

/// Load and build a specification from a local file
pub fn load_spec(path: impl AsRef<Path>) -> Result<Specification, SpecError> {
    SpecSource::File(path.as_ref().to_path_buf()).load()
}

/// Build a specification from an in-memory YAML or JSON document
pub fn load_spec_str(document: &str) -> Result<Specification, SpecError> {
    Specification::from_document(parse_document(document.as_bytes())?)
}

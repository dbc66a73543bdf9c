//! Loading type descriptions and payloads from files, strings and HTTP URLs.
//!
//! A type description file is a JSON array of [`TypeDef`]s.

use std::path::Path;

use crate::error::LoadError;
use crate::registry::{Registry, TypeDef};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load type descriptions from a file and build a registry.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// `LoadError::InvalidJson` if it isn't a JSON array of type definitions,
/// or `LoadError::Registry` if a definition is rejected.
pub fn load_types(path: &Path) -> Result<Registry, LoadError> {
    let content = read_file(path)?;
    load_types_str(&content)
}

/// Load type descriptions from a JSON string.
pub fn load_types_str(content: &str) -> Result<Registry, LoadError> {
    let defs: Vec<TypeDef> =
        serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })?;
    registry_from(&defs)
}

/// Load type descriptions from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't valid JSON, or `LoadError::Registry` if a definition is rejected.
#[cfg(feature = "remote")]
pub fn load_types_url(url: &str) -> Result<Registry, LoadError> {
    let network = |source: reqwest::Error| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let response = client.get(url).send().map_err(network)?;

    // Check for HTTP errors before parsing
    let response = response.error_for_status().map_err(network)?;

    let defs: Vec<TypeDef> = response.json().map_err(network)?;
    tracing::debug!(%url, types = defs.len(), "fetched type descriptions");
    registry_from(&defs)
}

/// Load type descriptions from a file path or URL.
///
/// URLs are only supported with the `remote` feature.
pub fn load_types_auto(source: &str) -> Result<Registry, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_types_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_types(Path::new(source))
    }
}

/// Read a payload file as bytes.
pub fn load_payload(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn read_file(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

fn registry_from(defs: &[TypeDef]) -> Result<Registry, LoadError> {
    Ok(Registry::from_defs(defs)?)
}

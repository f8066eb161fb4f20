//! Static JSON bundle mirroring the read-only endpoints, for hosting without a live server.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::domain::{ModelInfo, RankedResultSet};

pub const SERVICE_NAME: &str = "Attrition Prediction API";

/// URL path the bundle is served from unless told otherwise.
pub const DEFAULT_BASE_PATH: &str = "/api";

#[derive(Debug, thiserror::Error)]
pub enum StaticApiError {
    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {name}: {source}")]
    Serialize {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Write the bundle into `dir`, creating it if needed. Returns the written paths.
///
/// `base_path` is the URL path the directory is hosted under; `index.json` lists the
/// documents relative to it.
pub fn write_static_api(
    dir: &Path,
    base_path: &str,
    top_employees: &RankedResultSet,
    model_info: &ModelInfo,
) -> Result<Vec<PathBuf>, StaticApiError> {
    fs::create_dir_all(dir).map_err(|source| StaticApiError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let health = json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    });
    let endpoints: Vec<String> = ["health.json", "model-info.json", "top_employees.json"]
        .iter()
        .map(|name| endpoint(base_path, name))
        .collect();
    let index = json!({
        "service": SERVICE_NAME,
        "available_endpoints": endpoints,
        "note": "Static snapshot; on-demand prediction requires the live service.",
    });

    let written = vec![
        write_json(dir, "top_employees.json", top_employees)?,
        write_json(dir, "model-info.json", model_info)?,
        write_json(dir, "health.json", &health)?,
        write_json(dir, "index.json", &index)?,
    ];

    info!(dir = %dir.display(), files = written.len(), "static api bundle written");
    Ok(written)
}

fn endpoint(base_path: &str, name: &str) -> String {
    let base = base_path.trim_matches('/');
    if base.is_empty() {
        format!("/{name}")
    } else {
        format!("/{base}/{name}")
    }
}

fn write_json<T: Serialize + ?Sized>(
    dir: &Path,
    name: &'static str,
    value: &T,
) -> Result<PathBuf, StaticApiError> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|source| StaticApiError::Serialize { name, source })?;
    let path = dir.join(name);
    fs::write(&path, body).map_err(|source| StaticApiError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

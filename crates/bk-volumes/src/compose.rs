//! Compose-file volume resolution.
//!
//! A volume source may reference a compose service instead of a concrete
//! volume name; the service's first named volume mount is the candidate,
//! qualified with the compose project name the way the compose tooling
//! does (`{project}_{volume}`).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Deserialize)]
struct ComposeService {
    #[serde(default)]
    volumes: Vec<serde_yaml::Value>,
}

/// Resolve a compose service reference to its first named volume.
///
/// Bind mounts (entries whose source starts with `/`, `.` or `~`) are
/// skipped; only named volumes qualify.
pub fn service_volume(compose_path: &Path, service: &str) -> crate::Result<String> {
    let raw = std::fs::read_to_string(compose_path)?;
    let compose: ComposeFile =
        serde_yaml::from_str(&raw).map_err(|e| crate::Error::ComposeParse {
            path: compose_path.to_path_buf(),
            message: e.to_string(),
        })?;

    let entry = compose.services.get(service).ok_or_else(|| {
        crate::Error::ComposeServiceNotFound {
            service: service.to_string(),
            path: compose_path.to_path_buf(),
        }
    })?;

    for mount in &entry.volumes {
        if let Some(name) = named_volume(mount) {
            return Ok(name);
        }
    }

    Err(crate::Error::ComposeServiceNotFound {
        service: service.to_string(),
        path: compose_path.to_path_buf(),
    })
}

/// Project name used for the `{project}_{volume}` candidate: the configured
/// project if any, else the compose file's directory name.
pub fn project_name(compose_path: &Path, configured: Option<&str>) -> Option<String> {
    if let Some(project) = configured {
        return Some(project.to_string());
    }
    compose_path
        .parent()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
}

/// Extract the named-volume source of one mount entry, short or long form.
fn named_volume(mount: &serde_yaml::Value) -> Option<String> {
    let source = match mount {
        serde_yaml::Value::String(short) => short.split(':').next().map(|s| s.to_string()),
        serde_yaml::Value::Mapping(long) => {
            long.get("source").and_then(|v| v.as_str()).map(|s| s.to_string())
        }
        _ => None,
    }?;

    if source.starts_with('/') || source.starts_with('.') || source.starts_with('~') {
        return None;
    }
    Some(source)
}

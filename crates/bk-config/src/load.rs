//! Config file loading, path resolution, and semantic validation.

use std::path::{Path, PathBuf};

use crate::model::{Config, Credentials, RemoteConfig};

impl Config {
    /// Load a config file (YAML or JSON by extension), resolve relative
    /// paths against the file's directory, and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| crate::Error::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config: Config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)?,
            Some("json") => serde_json::from_str(&raw)?,
            _ => {
                return Err(crate::Error::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Resolve every relative path in the config against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.database.path = resolve(base, &self.database.path);
        if self.local.enabled {
            self.local.path = resolve(base, &self.local.path);
        }
        for source in self.sources.values_mut() {
            source.path = resolve(base, &source.path);
        }
        for item in &mut self.volumes.items {
            if let Some(compose) = item.compose_file.take() {
                item.compose_file = Some(resolve(base, &compose));
            }
        }
    }

    /// Semantic validation. Called by [`Config::load`]; callers constructing
    /// a config programmatically should invoke it themselves.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.local.enabled && !self.remote.enabled {
            return Err(crate::Error::validation(
                "at least one of local.enabled, remote.enabled must be true",
            ));
        }

        if self.local.enabled && self.local.path.as_os_str().is_empty() {
            return Err(crate::Error::validation("local.enabled requires local.path"));
        }

        if self.remote.enabled && self.remote.bucket.is_empty() {
            return Err(crate::Error::validation("remote.enabled requires remote.bucket"));
        }

        if self.archive.compression > 9 {
            return Err(crate::Error::validation(format!(
                "archive.compression must be 0-9, got {}",
                self.archive.compression
            )));
        }

        if let Some(zone) = &self.timezone {
            parse_timezone(zone)?;
        }

        for (name, schedule) in &self.schedules {
            if schedule.cron.split_whitespace().count() != 5 {
                return Err(crate::Error::validation(format!(
                    "schedule '{}' cron expression must have five fields: '{}'",
                    name, schedule.cron
                )));
            }
            if schedule.retention.max_count == 0 {
                return Err(crate::Error::validation(format!(
                    "schedule '{}' retention.max_count must be at least 1",
                    name
                )));
            }
            if schedule.retention.max_days == 0 {
                return Err(crate::Error::validation(format!(
                    "schedule '{}' retention.max_days must be at least 1",
                    name
                )));
            }
            if let Some(sources) = &schedule.sources {
                for source in sources {
                    if !self.sources.contains_key(source) {
                        return Err(crate::Error::UnknownSource {
                            schedule: name.clone(),
                            source_name: source.clone(),
                        });
                    }
                }
            }
            if let Some(zone) = &schedule.timezone {
                parse_timezone(zone)?;
            }
        }

        Ok(())
    }

    /// Source configs a schedule backs up: its named subset, or all sources.
    pub fn sources_for_schedule(&self, schedule: &str) -> Vec<(String, crate::SourceConfig)> {
        let subset = self.schedules.get(schedule).and_then(|s| s.sources.clone());
        match subset {
            Some(names) => names
                .into_iter()
                .filter_map(|name| self.sources.get(&name).map(|s| (name.clone(), s.clone())))
                .collect(),
            None => self.sources.iter().map(|(n, s)| (n.clone(), s.clone())).collect(),
        }
    }
}

/// Resolve remote credentials in the order: config field, `S3_*`
/// environment, `AWS_*` environment. Missing credentials are fatal.
pub fn resolve_credentials(remote: &RemoteConfig) -> crate::Result<Credentials> {
    let access_key_id = remote
        .access_key_id
        .clone()
        .or_else(|| std::env::var("S3_ACCESS_KEY_ID").ok())
        .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok());
    let secret_access_key = remote
        .secret_access_key
        .clone()
        .or_else(|| std::env::var("S3_SECRET_ACCESS_KEY").ok())
        .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok());

    match (access_key_id, secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(Credentials {
            access_key_id,
            secret_access_key,
        }),
        _ => Err(crate::Error::MissingCredentials),
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(zone: &str) -> crate::Result<chrono_tz::Tz> {
    zone.parse::<chrono_tz::Tz>()
        .map_err(|_| crate::Error::validation(format!("unknown timezone '{}'", zone)))
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
database:
  path: state/catalog.db
sources:
  app:
    path: /srv/app
    patterns:
      - "**/*.ts"
      - "!**/node_modules/**"
local:
  enabled: true
  path: backups
remote:
  enabled: false
schedules:
  daily:
    cron: "0 3 * * *"
    retention:
      max_count: 7
      max_days: 30
    sources: [app]
"#;

    fn write_config(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_yaml_and_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "config.yaml", SAMPLE);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.path, dir.path().join("state/catalog.db"));
        assert_eq!(config.local.path, dir.path().join("backups"));
        assert_eq!(config.sources["app"].path, Path::new("/srv/app"));
        assert_eq!(config.archive.prefix, "backitup");
        assert_eq!(config.archive.compression, 6);
        assert!(config.safety.verify_checksum_before_delete);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "config.toml", SAMPLE);
        assert!(matches!(
            Config::load(&path),
            Err(crate::Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn rejects_when_no_destination_enabled() {
        let body = SAMPLE.replace("enabled: true", "enabled: false");
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "config.yaml", &body);
        assert!(matches!(
            Config::load(&path),
            Err(crate::Error::Validation { .. })
        ));
    }

    #[test]
    fn rejects_unknown_schedule_source() {
        let body = SAMPLE.replace("sources: [app]", "sources: [missing]");
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "config.yaml", &body);
        assert!(matches!(
            Config::load(&path),
            Err(crate::Error::UnknownSource { .. })
        ));
    }

    #[test]
    fn rejects_zero_retention_values() {
        let body = SAMPLE.replace("max_count: 7", "max_count: 0");
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "config.yaml", &body);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn rejects_wrong_cron_arity() {
        let body = SAMPLE.replace("\"0 3 * * *\"", "\"0 3 * *\"");
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "config.yaml", &body);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn rejects_unknown_timezone() {
        let body = format!("{}    timezone: Mars/Olympus\n", SAMPLE);
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "config.yaml", &body);
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn credentials_fall_back_to_config_fields() {
        let remote = RemoteConfig {
            enabled: true,
            bucket: "bucket".to_string(),
            access_key_id: Some("AKIA".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..Default::default()
        };
        let creds = resolve_credentials(&remote).unwrap();
        assert_eq!(creds.access_key_id, "AKIA");
        assert_eq!(creds.secret_access_key, "secret");
    }

    #[test]
    fn sources_for_schedule_defaults_to_all() {
        let dir = tempfile::tempdir().unwrap();
        let body = SAMPLE.replace("    sources: [app]\n", "");
        let path = write_config(dir.path(), "config.yaml", &body);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sources_for_schedule("daily").len(), 1);
    }
}

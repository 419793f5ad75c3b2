//! Configuration loading from file and environment.

use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::WorkerConfig;
use crate::validate::validate;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "FERRY_CONFIG";

/// Environment variable overriding the configured log level.
const LOG_LEVEL_ENV: &str = "FERRY_LOG_LEVEL";

/// Environment variable overriding the configured log format.
const LOG_FORMAT_ENV: &str = "FERRY_LOG_FORMAT";

/// Load, override, and validate the configuration at `path`.
///
/// Environment variables take precedence over file contents for the logging
/// settings; everything else comes from the file alone.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed, or when the resulting
/// configuration violates an invariant.
pub fn load_config(path: &Path) -> ConfigResult<WorkerConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::io("read_config", path, source))?;
    let mut config: WorkerConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::parse(path, source))?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate(&config)?;
    debug!(
        scheme = %config.scheme,
        mounts = config.mounts.len(),
        "worker configuration loaded"
    );
    Ok(config)
}

/// Load the configuration named by [`CONFIG_PATH_ENV`].
///
/// # Errors
///
/// Fails when the variable is unset or the file fails to load.
pub fn load_from_env() -> ConfigResult<WorkerConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).map_err(|_| ConfigError::MissingEnv {
        name: CONFIG_PATH_ENV,
    })?;
    load_config(Path::new(&path))
}

fn apply_env_overrides(
    config: &mut WorkerConfig,
    lookup: impl Fn(&'static str) -> Option<String>,
) {
    if let Some(level) = lookup(LOG_LEVEL_ENV) {
        config.logging.level = level;
    }
    if let Some(format) = lookup(LOG_FORMAT_ENV) {
        config.logging.format = Some(format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("ferry.json");
        let mut file = std::fs::File::create(&path).expect("create config");
        file.write_all(contents.as_bytes()).expect("write config");
        (dir, path)
    }

    const GOOD: &str = r#"{
        "scheme": "media",
        "mounts": [{"prefix": "/cdrom", "target": "file:///mnt/cdrom/"}],
        "logging": {"level": "debug", "format": "pretty"}
    }"#;

    #[test]
    fn loads_and_validates_a_file() {
        let (_dir, path) = write_config(GOOD);
        let config = load_config(&path).expect("load");
        assert_eq!(config.scheme, "media");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_files_report_io_context() {
        let (_dir, path) = write_config(GOOD);
        let missing = path.with_file_name("absent.json");
        let err = load_config(&missing).expect_err("must fail");
        let ConfigError::Io { operation, .. } = err else {
            panic!("unexpected error shape");
        };
        assert_eq!(operation, "read_config");
    }

    #[test]
    fn malformed_json_reports_parse_context() {
        let (_dir, path) = write_config("{not json");
        let err = load_config(&path).expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn invalid_contents_are_rejected() {
        let (_dir, path) = write_config(
            r#"{"scheme": "media", "mounts": [{"prefix": "cdrom", "target": "file:///mnt/"}]}"#,
        );
        let err = load_config(&path).expect_err("must fail");
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let (_dir, path) = write_config(GOOD);
        let mut config = load_config(&path).expect("load");
        apply_env_overrides(&mut config, |name| match name {
            "FERRY_LOG_LEVEL" => Some("trace".to_string()),
            "FERRY_LOG_FORMAT" => Some("json".to_string()),
            _ => None,
        });
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }
}

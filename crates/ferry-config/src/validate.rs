//! Invariant checks applied after loading.

use crate::error::{ConfigError, ConfigResult};
use crate::model::WorkerConfig;

/// Validate a loaded configuration.
///
/// # Errors
///
/// Returns an [`ConfigError::InvalidField`] describing the first violated
/// invariant: an ill-formed scheme, a non-absolute or duplicated mount
/// prefix, or a non-hierarchical mount target.
pub fn validate(config: &WorkerConfig) -> ConfigResult<()> {
    validate_scheme(&config.scheme)?;

    if config.mounts.is_empty() {
        return Err(ConfigError::invalid("mounts", "empty", None));
    }

    let mut seen = std::collections::BTreeSet::new();
    for mount in &config.mounts {
        if !mount.prefix.starts_with('/') {
            return Err(ConfigError::invalid(
                "mounts.prefix",
                "not_absolute",
                Some(mount.prefix.clone()),
            ));
        }
        if mount.prefix.len() > 1 && mount.prefix.ends_with('/') {
            return Err(ConfigError::invalid(
                "mounts.prefix",
                "trailing_slash",
                Some(mount.prefix.clone()),
            ));
        }
        if !seen.insert(mount.prefix.as_str()) {
            return Err(ConfigError::invalid(
                "mounts.prefix",
                "duplicate",
                Some(mount.prefix.clone()),
            ));
        }
        if mount.target.cannot_be_a_base() {
            return Err(ConfigError::invalid(
                "mounts.target",
                "not_hierarchical",
                Some(mount.target.to_string()),
            ));
        }
    }
    Ok(())
}

fn validate_scheme(scheme: &str) -> ConfigResult<()> {
    let mut chars = scheme.chars();
    let valid_head = chars.next().is_some_and(|head| head.is_ascii_lowercase());
    let valid_tail = chars.all(|tail| {
        tail.is_ascii_lowercase() || tail.is_ascii_digit() || matches!(tail, '+' | '-' | '.')
    });
    if valid_head && valid_tail {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "scheme",
            "not_a_url_scheme",
            Some(scheme.to_string()),
        ))
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, address parses)
//! - Keep the bus reply deadline inside the request timeout
//! - Detect overlapping mount points
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::routing::STATUS_PATH;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid bind address '{value}'")]
    BindAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: mount prefix '{value}' must start and end with '/'")]
    MountPrefix { field: &'static str, value: String },

    #[error("{field}: mount prefix '{value}' overlaps '{other}'")]
    Overlap {
        field: &'static str,
        value: String,
        other: String,
    },

    #[error("{field}: invalid cookie name '{value}'")]
    CookieName { field: &'static str, value: String },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },

    #[error("bus.reply_timeout_ms: {reply_ms}ms must be shorter than timeouts.request_secs ({request_secs}s)")]
    ReplyOutlastsRequest { reply_ms: u64, request_secs: u64 },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    for (field, value) in [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("bus.reply_timeout_ms", config.bus.reply_timeout_ms),
        ("session.timeout_ms", config.session.timeout_ms),
        ("session.sweep_interval_secs", config.session.sweep_interval_secs),
        ("datastore.timeout_secs", config.datastore.timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    // The bridge must answer 504 before the request layer gives up.
    let (reply_ms, request_secs) = (config.bus.reply_timeout_ms, config.timeouts.request_secs);
    if reply_ms != 0 && request_secs != 0 && reply_ms >= request_secs.saturating_mul(1000) {
        errors.push(ValidationError::ReplyOutlastsRequest {
            reply_ms,
            request_secs,
        });
    }
    if config.bus.consumer_buffer == 0 {
        errors.push(ValidationError::Zero { field: "bus.consumer_buffer" });
    }

    for (field, value) in [
        ("bus.invalid_credentials_address", &config.bus.invalid_credentials_address),
        ("bus.query_address", &config.bus.query_address),
        ("session.reply_attribute", &config.session.reply_attribute),
        ("static_files.resource_root", &config.static_files.resource_root),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::Empty { field });
        }
    }

    let cookie = &config.session.cookie_name;
    if cookie.is_empty()
        || cookie
            .chars()
            .any(|c| c == ';' || c == '=' || c == ',' || c.is_whitespace() || c.is_control())
    {
        errors.push(ValidationError::CookieName {
            field: "session.cookie_name",
            value: cookie.clone(),
        });
    }
    if !config.session.cookie_path.starts_with('/') {
        errors.push(ValidationError::MountPrefix {
            field: "session.cookie_path",
            value: config.session.cookie_path.clone(),
        });
    }

    let bridge = &config.socket_bridge;
    if bridge
        .inbound_permitted
        .iter()
        .chain(bridge.outbound_permitted.iter())
        .any(|a| a.is_empty())
    {
        errors.push(ValidationError::Empty {
            field: "socket_bridge.permitted",
        });
    }

    let mut mounts = vec![
        ("bus.mount_prefix", config.bus.mount_prefix.as_str()),
        ("static_files.mount_prefix", config.static_files.mount_prefix.as_str()),
    ];
    if bridge.enabled {
        mounts.push(("socket_bridge.mount_prefix", bridge.mount_prefix.as_str()));
    }

    for (field, prefix) in &mounts {
        if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
            errors.push(ValidationError::MountPrefix {
                field,
                value: prefix.to_string(),
            });
        }
        if STATUS_PATH.starts_with(prefix) {
            errors.push(ValidationError::Overlap {
                field,
                value: prefix.to_string(),
                other: STATUS_PATH.to_string(),
            });
        }
    }
    for (i, (field, prefix)) in mounts.iter().enumerate() {
        for (_, other) in mounts.iter().skip(i + 1) {
            if prefix.starts_with(other) || other.starts_with(prefix) {
                errors.push(ValidationError::Overlap {
                    field,
                    value: prefix.to_string(),
                    other: other.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.bus.reply_timeout_ms = 0;
        config.session.cookie_name = "bad name".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero {
            field: "bus.reply_timeout_ms"
        }));
    }

    #[test]
    fn test_reply_deadline_within_request_timeout() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 2;
        config.bus.reply_timeout_ms = 2_000;

        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::ReplyOutlastsRequest {
                reply_ms: 2_000,
                request_secs: 2,
            }])
        );

        config.bus.reply_timeout_ms = 1_999;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_overlapping_mounts_rejected() {
        let mut config = GatewayConfig::default();
        config.static_files.mount_prefix = "/bus/static/".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::Overlap { .. }));
    }

    #[test]
    fn test_mount_prefix_shape() {
        let mut config = GatewayConfig::default();
        config.bus.mount_prefix = "/bus".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ValidationError::MountPrefix { field: "bus.mount_prefix", .. }
        )));
    }

    #[test]
    fn test_disabled_bridge_mount_ignored() {
        let mut config = GatewayConfig::default();
        config.socket_bridge.enabled = false;
        config.socket_bridge.mount_prefix = "/bus/".into();
        assert_eq!(validate_config(&config), Ok(()));
    }
}

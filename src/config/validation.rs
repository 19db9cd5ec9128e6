//! Configuration validation.
//!
//! Semantic checks on top of what serde already enforces. All problems are
//! collected so a bad file is reported in one pass.

use std::collections::HashSet;
use std::fmt;

use url::Url;

use crate::config::schema::BalancerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `servers[2].weight`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push(ValidationError::new("servers", "at least one server is required"));
    }

    let mut names = HashSet::new();
    for (i, server) in config.servers.iter().enumerate() {
        let field = |name: &str| format!("servers[{i}].{name}");

        if server.name.trim().is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        } else if !names.insert(server.name.as_str()) {
            errors.push(ValidationError::new(
                field("name"),
                format!("duplicate server name '{}'", server.name),
            ));
        }

        match Url::parse(&server.address) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
            Ok(_) => errors.push(ValidationError::new(
                field("address"),
                "must be an http(s) URL with a host",
            )),
            Err(e) => errors.push(ValidationError::new(field("address"), e.to_string())),
        }

        if let Err(e) = server.options().validate() {
            let name = if server.weight == 0 { "weight" } else { "fail_timeout_ms" };
            errors.push(ValidationError::new(field(name), e.to_string()));
        }
    }

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be at least 1"));
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            "must not exceed retry.max_delay_ms",
        ));
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
    use crate::config::schema::UpstreamConfig;

    fn upstream(name: &str, address: &str) -> UpstreamConfig {
        UpstreamConfig {
            name: name.into(),
            address: address.into(),
            weight: 1,
            max_fails: 1,
            fail_timeout_ms: 1000,
            backup: false,
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = BalancerConfig::default();
        config.servers.push(upstream("a", "http://127.0.0.1:3000"));
        config.servers.push(upstream("b", "https://api.example.com/"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_config_rejected() {
        let errors = validate_config(&BalancerConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "servers");
    }

    #[test]
    fn test_all_errors_reported() {
        let mut config = BalancerConfig::default();
        config.servers.push(upstream("a", "http://127.0.0.1:3000"));
        config.servers.push(upstream("a", "ftp://127.0.0.1"));
        let mut zero_weight = upstream("c", "not a url");
        zero_weight.weight = 0;
        config.servers.push(zero_weight);

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "servers[1].name",
                "servers[1].address",
                "servers[2].address",
                "servers[2].weight",
            ]
        );
    }

    #[test]
    fn test_zero_weight_allowed_without_tracking() {
        let mut config = BalancerConfig::default();
        let mut server = upstream("a", "http://127.0.0.1:3000");
        server.weight = 0;
        server.max_fails = 0;
        config.servers.push(server);
        assert!(validate_config(&config).is_ok());

        config.servers[0].max_fails = 2;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "servers[0].weight");
    }

    #[test]
    fn test_zero_timeout_with_tracking_rejected() {
        let mut config = BalancerConfig::default();
        let mut server = upstream("a", "http://127.0.0.1:3000");
        server.fail_timeout_ms = 0;
        config.servers.push(server);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "servers[0].fail_timeout_ms");
    }
}

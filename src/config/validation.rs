//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that every
//! address string parses for the chain it belongs to. All errors are
//! collected, not just the first.

use std::str::FromStr;

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::ForwarderConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ForwarderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if url::Url::parse(&config.node.rpc_url).is_err() {
        errors.push(ValidationError::new("node.rpc_url", "not a valid URL"));
    }
    if config.node.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("node.rpc_timeout_secs", "must be > 0"));
    }
    if config.node.ping_interval_ms == 0 {
        errors.push(ValidationError::new("node.ping_interval_ms", "must be > 0"));
    }

    let fwd = &config.forwarding;
    if fwd.enabled {
        if Address::from_str(&fwd.destination).is_err() {
            errors.push(ValidationError::new("forwarding.destination", "not a valid address"));
        }
        if Address::from_str(&fwd.identity).is_err() {
            errors.push(ValidationError::new("forwarding.identity", "not a valid address"));
        }
        if fwd.gas_limit < 21_000 {
            errors.push(ValidationError::new("forwarding.gas_limit", "must be >= 21000"));
        }
        if fwd.gas_price_gwei == 0 {
            errors.push(ValidationError::new("forwarding.gas_price_gwei", "must be > 0"));
        }
        if fwd.confirmation_poll_ms == 0 {
            errors.push(ValidationError::new("forwarding.confirmation_poll_ms", "must be > 0"));
        }
        if fwd.confirmation_timeout_secs == 0 {
            errors.push(ValidationError::new("forwarding.confirmation_timeout_secs", "must be > 0"));
        }
    }

    let status = &config.status;
    if fwd.enabled && !status.enabled {
        errors.push(ValidationError::new(
            "status.enabled",
            "forwarding needs status polling for balance observations",
        ));
    }
    if status.enabled {
        if Address::from_str(&status.oracle_address).is_err() {
            errors.push(ValidationError::new("status.oracle_address", "not a valid address"));
        }
        if status.poll_interval_ms == 0 {
            errors.push(ValidationError::new("status.poll_interval_ms", "must be > 0"));
        }
    }

    let btc = &config.bitcoin;
    if btc.enabled {
        match bitcoin::Network::from_str(&btc.network) {
            Ok(network) => {
                let parsed = bitcoin::Address::from_str(&btc.destination)
                    .ok()
                    .and_then(|a| a.require_network(network).ok());
                if parsed.is_none() {
                    errors.push(ValidationError::new(
                        "bitcoin.destination",
                        format!("not a valid {} address", network),
                    ));
                }
            }
            Err(_) => errors.push(ValidationError::new("bitcoin.network", "unknown network")),
        }
        if url::Url::parse(&btc.explorer_url).is_err() {
            errors.push(ValidationError::new("bitcoin.explorer_url", "not a valid URL"));
        }
        if Address::from_str(&btc.identity).is_err() {
            errors.push(ValidationError::new("bitcoin.identity", "not a valid address"));
        }
        if !(btc.fee_safety_multiplier >= 1.0) {
            errors.push(ValidationError::new("bitcoin.fee_safety_multiplier", "must be >= 1.0"));
        }
        if btc.poll_interval_secs == 0 {
            errors.push(ValidationError::new("bitcoin.poll_interval_secs", "must be > 0"));
        }
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be empty"));
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
        assert!(validate_config(&ForwarderConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ForwarderConfig::default();
        config.forwarding.enabled = true;
        config.forwarding.destination = "nope".into();
        config.forwarding.identity = "nope".into();
        config.bitcoin.enabled = true;
        config.bitcoin.fee_safety_multiplier = 0.5;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"forwarding.destination"));
        assert!(fields.contains(&"forwarding.identity"));
        assert!(fields.contains(&"bitcoin.fee_safety_multiplier"));
        assert!(fields.contains(&"bitcoin.destination"));
        assert!(fields.contains(&"status.enabled"));
    }

    #[test]
    fn test_nan_multiplier_rejected() {
        let mut config = ForwarderConfig::default();
        config.bitcoin.enabled = true;
        config.bitcoin.fee_safety_multiplier = f64::NAN;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "bitcoin.fee_safety_multiplier"));
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

/// Tuning of the QoS layer for one job. Every field has a default, so an empty JSON
/// object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QosConfig {
    /// Minimum time between two reports of the same reporter.
    pub aggregation_interval_ms: i64,
    /// Number of measurements a manager keeps per metric.
    pub value_history_capacity: usize,
    /// Output buffer size channels are deployed with.
    pub initial_buffer_size: i32,
    pub chain_establish_timeout_ms: u64,
    /// How long a halted input gate sleeps before it re-checks for shutdown.
    pub input_gate_poll_interval_ms: u64,
}

impl Default for QosConfig {
    fn default() -> Self {
        QosConfig { aggregation_interval_ms: 1000, value_history_capacity: 16, initial_buffer_size: 32768, chain_establish_timeout_ms: 5000, input_gate_poll_interval_ms: 50 }
    }
}

impl QosConfig {
    pub fn from_file(file_path: &str) -> Result<Self> {
        let config: QosConfig = parse_json_file(file_path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.aggregation_interval_ms <= 0 {
            return Err(Error::ConfigurationError(format!("aggregationIntervalMs must be positive, got {}", self.aggregation_interval_ms)));
        }
        if self.value_history_capacity == 0 {
            return Err(Error::ConfigurationError("valueHistoryCapacity must be positive".to_string()));
        }
        if self.initial_buffer_size <= 0 {
            return Err(Error::ConfigurationError(format!("initialBufferSize must be positive, got {}", self.initial_buffer_size)));
        }
        if self.chain_establish_timeout_ms == 0 || self.input_gate_poll_interval_ms == 0 {
            return Err(Error::ConfigurationError("chainEstablishTimeoutMs and inputGatePollIntervalMs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn chain_establish_timeout(&self) -> Duration {
        Duration::from_millis(self.chain_establish_timeout_ms)
    }

    pub fn input_gate_poll_interval(&self) -> Duration {
        Duration::from_millis(self.input_gate_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: QosConfig = serde_json::from_str(r#"{ "aggregationIntervalMs": 250 }"#).unwrap();
        assert_eq!(config.aggregation_interval_ms, 250);
        assert_eq!(config.value_history_capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = QosConfig { aggregation_interval_ms: 0, ..QosConfig::default() };
        assert!(matches!(config.validate(), Err(Error::ConfigurationError(_))));
    }
}

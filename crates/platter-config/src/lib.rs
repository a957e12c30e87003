//! Configuration for the platter fulfillment core.
//!
//! TOML configuration with `${ENV_VAR}` substitution and validation.
//! Every section is optional; omitted sections fall back to the current
//! platform policy defaults.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Storage backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
	/// Backend name: `memory` or `file`.
	pub backend: String,
	/// Base directory for the file backend.
	pub path: PathBuf,
}

impl Default for StorageSettings {
	fn default() -> Self {
		Self {
			backend: "memory".to_string(),
			path: PathBuf::from("./data/storage"),
		}
	}
}

/// Pickup verification tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
	pub code_ttl_minutes: i64,
	pub attempt_ceiling: u32,
}

impl Default for VerificationSettings {
	fn default() -> Self {
		Self {
			code_ttl_minutes: 15,
			attempt_ceiling: 5,
		}
	}
}

/// Settlement tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettlementSettings {
	/// Platform commission in [0, 1), written as a string ("0.05").
	pub commission_rate: Decimal,
}

impl Default for SettlementSettings {
	fn default() -> Self {
		Self {
			commission_rate: Decimal::new(5, 2),
		}
	}
}

/// Demand estimation tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemandSettings {
	pub capacity_ceiling: u32,
	pub velocity_window_minutes: i64,
	pub min_wait_minutes: u32,
	pub alert_threshold: u32,
}

impl Default for DemandSettings {
	fn default() -> Self {
		Self {
			capacity_ceiling: 20,
			velocity_window_minutes: 30,
			min_wait_minutes: 10,
			alert_threshold: 80,
		}
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlatterConfig {
	pub storage: StorageSettings,
	pub verification: VerificationSettings,
	pub settlement: SettlementSettings,
	pub demand: DemandSettings,
}

/// Configuration loader with environment variable substitution.
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub async fn load(&self) -> Result<PlatterConfig, ConfigError> {
		let file_path = self
			.file_path
			.as_ref()
			.ok_or_else(|| ConfigError::FileNotFound("No configuration file specified".into()))?;

		let content = tokio::fs::read_to_string(file_path).await?;
		let config = Self::parse(&content)?;
		Self::validate(&config)?;
		Ok(config)
	}

	/// Parses TOML content after substituting `${VAR}` references.
	pub fn parse(content: &str) -> Result<PlatterConfig, ConfigError> {
		let substituted = Self::substitute_env_vars(content)?;
		toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Find and replace ${VAR_NAME} patterns.
		let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = std::env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn validate(config: &PlatterConfig) -> Result<(), ConfigError> {
		if !matches!(config.storage.backend.as_str(), "memory" | "file") {
			return Err(ConfigError::ValidationError(format!(
				"Unknown storage backend: {}",
				config.storage.backend
			)));
		}
		if config.verification.code_ttl_minutes <= 0 {
			return Err(ConfigError::ValidationError(
				"Verification code TTL must be positive".into(),
			));
		}
		if config.verification.attempt_ceiling == 0 {
			return Err(ConfigError::ValidationError(
				"Verification attempt ceiling must be positive".into(),
			));
		}
		if config.settlement.commission_rate < Decimal::ZERO
			|| config.settlement.commission_rate >= Decimal::ONE
		{
			return Err(ConfigError::ValidationError(
				"Commission rate must be in [0, 1)".into(),
			));
		}
		if config.demand.capacity_ceiling == 0 {
			return Err(ConfigError::ValidationError(
				"Demand capacity ceiling must be positive".into(),
			));
		}
		if config.demand.velocity_window_minutes <= 0 {
			return Err(ConfigError::ValidationError(
				"Demand velocity window must be positive".into(),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn defaults_match_platform_policy() {
		let config = ConfigLoader::parse("").unwrap();
		assert_eq!(config.storage.backend, "memory");
		assert_eq!(config.verification.code_ttl_minutes, 15);
		assert_eq!(config.verification.attempt_ceiling, 5);
		assert_eq!(config.settlement.commission_rate, Decimal::new(5, 2));
		assert_eq!(config.demand.capacity_ceiling, 20);
		assert_eq!(config.demand.alert_threshold, 80);
	}

	#[test]
	fn parses_full_config() {
		let config = ConfigLoader::parse(
			r#"
[storage]
backend = "file"
path = "/var/lib/platter"

[verification]
code_ttl_minutes = 10
attempt_ceiling = 3

[settlement]
commission_rate = "0.075"

[demand]
capacity_ceiling = 40
velocity_window_minutes = 15
min_wait_minutes = 8
alert_threshold = 90
"#,
		)
		.unwrap();
		assert_eq!(config.storage.backend, "file");
		assert_eq!(config.storage.path, PathBuf::from("/var/lib/platter"));
		assert_eq!(config.verification.code_ttl_minutes, 10);
		assert_eq!(config.settlement.commission_rate, Decimal::new(75, 3));
		assert_eq!(config.demand.velocity_window_minutes, 15);
	}

	#[test]
	fn substitutes_environment_variables() {
		std::env::set_var("PLATTER_TEST_STORAGE_PATH", "/tmp/platter-test");
		let config = ConfigLoader::parse(
			r#"
[storage]
backend = "file"
path = "${PLATTER_TEST_STORAGE_PATH}"
"#,
		)
		.unwrap();
		assert_eq!(config.storage.path, PathBuf::from("/tmp/platter-test"));
	}

	#[test]
	fn missing_environment_variable_is_an_error() {
		let err = ConfigLoader::parse(
			r#"
[storage]
path = "${PLATTER_TEST_DOES_NOT_EXIST}"
"#,
		)
		.unwrap_err();
		assert!(matches!(err, ConfigError::EnvVarNotFound(_)));
	}

	#[tokio::test]
	async fn load_validates_the_parsed_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[settlement]
commission_rate = "1.5"
"#
		)
		.unwrap();

		let err = ConfigLoader::new()
			.with_file(file.path())
			.load()
			.await
			.unwrap_err();
		assert!(matches!(err, ConfigError::ValidationError(_)));
	}

	#[test]
	fn validation_rejects_bad_settings() {
		let zero_ttl = ConfigLoader::parse("").map(|mut c| {
			c.verification.code_ttl_minutes = 0;
			c
		});
		assert!(ConfigLoader::validate(&zero_ttl.unwrap()).is_err());

		let unknown_backend = ConfigLoader::parse("[storage]\nbackend = \"redis\"").unwrap();
		assert!(ConfigLoader::validate(&unknown_backend).is_err());

		let zero_capacity = ConfigLoader::parse("[demand]\ncapacity_ceiling = 0").unwrap();
		assert!(ConfigLoader::validate(&zero_capacity).is_err());
	}
}

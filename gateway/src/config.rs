use aggregator::config::{Config as GatewayConfig, ValidationError};
use serde::Deserialize;
use std::fs::File;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(metrics) = &self.common.metrics
            && metrics.statsd_port == 0
        {
            return Err(ValidationError::InvalidPort);
        }
        self.gateway.validate()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    ValidationError(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn gateway_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://public@sentry.example.com/1
            gateway:
                listener:
                    host: 0.0.0.0
                    port: 3000
                admin_listener:
                    host: 127.0.0.1
                    port: 3001
                upstream:
                    base_url: https://www.pekora.zip
                timeouts:
                    http_timeout_secs: 10
                    task_timeout_secs: 12
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(
            config.common.metrics,
            Some(MetricsConfig {
                statsd_host: "127.0.0.1".into(),
                statsd_port: 8125
            })
        );
        assert_eq!(
            config.common.logging.expect("logging config").sentry_dsn,
            "https://public@sentry.example.com/1"
        );
        assert_eq!(config.gateway.listener.port, 3000);
        assert_eq!(config.gateway.upstream.base_url.as_str(), "https://www.pekora.zip/");
        assert_eq!(config.gateway.timeouts.task_timeout_secs, 12);
        assert_eq!(config.gateway.upstream.cookie_name, ".PEKOSECURITY");
    }

    #[test]
    fn common_sections_are_optional() {
        let yaml = r#"
            gateway:
                listener: {host: 0.0.0.0, port: 3000}
                admin_listener: {host: 127.0.0.1, port: 3001}
                upstream: {base_url: "http://127.0.0.1:8080"}
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(config.common.metrics.is_none());
        assert!(config.common.logging.is_none());
    }

    #[test]
    fn invalid_configs() {
        // Missing gateway section
        let tmp = write_tmp_file("metrics: {statsd_host: localhost, statsd_port: 8125}\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        // Parses but fails validation
        let yaml = r#"
            gateway:
                listener: {host: 0.0.0.0, port: 3000}
                admin_listener: {host: 127.0.0.1, port: 3001}
                upstream: {base_url: "http://127.0.0.1:8080"}
                timeouts: {http_timeout_secs: 10, task_timeout_secs: 5}
            "#;
        let tmp = write_tmp_file(yaml);
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ValidationError(ValidationError::InvalidTimeouts))
        ));

        assert!(matches!(
            Config::from_file(std::path::Path::new("/nonexistent/gateway.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}

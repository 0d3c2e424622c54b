use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the ingest endpoint binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Path to a model artifact (JSON logistic regression). Absent or
    /// unloadable means the heuristic scorer is used for the process lifetime.
    #[serde(default)]
    pub model_path: Option<String>,
    /// Downstream endpoint alerts are POSTed to. Absent means alerts are
    /// scored and logged but never dispatched.
    #[serde(default)]
    pub alert_url: Option<String>,
    /// Bearer token attached to alert POSTs when set.
    #[serde(default)]
    pub alert_api_key: Option<String>,
    /// Minimum score that triggers a dispatch.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
    /// Per-attempt network timeout for alert delivery.
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_seconds: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8053".to_string()
}

fn default_alert_threshold() -> f64 {
    0.6
}

fn default_dispatch_timeout() -> u64 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: default_listen_addr(),
            model_path: None,
            alert_url: None,
            alert_api_key: None,
            alert_threshold: default_alert_threshold(),
            dispatch_timeout_seconds: default_dispatch_timeout(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8053");
        assert_eq!(config.alert_threshold, 0.6);
        assert_eq!(config.dispatch_timeout_seconds, 3);
        assert!(config.model_path.is_none());
        assert!(config.alert_url.is_none());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config =
            serde_yaml::from_str("alert_url: http://phishing-svc:9000/api/alerts\n").unwrap();
        assert_eq!(
            config.alert_url.as_deref(),
            Some("http://phishing-svc:9000/api/alerts")
        );
        assert_eq!(config.alert_threshold, 0.6);
        assert_eq!(config.listen_addr, "0.0.0.0:8053");
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = std::env::temp_dir().join("tunnel-sentry-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");

        let config = Config {
            model_path: Some("/var/lib/tunnel-sentry/model.json".to_string()),
            alert_threshold: 0.75,
            ..Config::default()
        };
        config.to_file(path.to_str().unwrap()).unwrap();

        let loaded = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.model_path, config.model_path);
        assert_eq!(loaded.alert_threshold, 0.75);
    }
}

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::schema::ResourceSchema;

/// Console configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL (default: "http://127.0.0.1:8000")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Page-size hint sent with list requests (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// How long fetched option lists stay fresh, in seconds (default: 300)
    #[serde(default = "default_options_ttl")]
    pub options_ttl_secs: u64,
    /// Request timeout; the transport default applies when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// IANA time zone for datetime fields; the system zone when absent
    #[serde(default)]
    pub timezone: Option<String>,
    /// Extra resources appended to the built-in registry
    #[serde(default)]
    pub resources: Vec<ResourceSchema>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_options_ttl() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            options_ttl_secs: default_options_ttl(),
            timeout_secs: None,
            timezone: None,
            resources: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from file, environment, and CLI arguments
    pub fn load(
        config_path: Option<&PathBuf>,
        cli_url: Option<&str>,
        cli_page_size: Option<u32>,
    ) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else if let Ok(content) = std::fs::read_to_string("parqueo-admin.toml") {
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var("PARQUEO_ADMIN_URL") {
            config.base_url = url;
        }
        if let Ok(size) = std::env::var("PARQUEO_ADMIN_PAGE_SIZE") {
            if let Ok(s) = size.parse() {
                config.page_size = s;
            }
        }
        if let Ok(tz) = std::env::var("PARQUEO_ADMIN_TIMEZONE") {
            config.timezone = Some(tz);
        }

        if let Some(url) = cli_url {
            config.base_url = url.to_string();
        }
        if let Some(size) = cli_page_size {
            config.page_size = size;
        }

        Ok(config)
    }

    pub fn options_ttl(&self) -> Duration {
        Duration::from_secs(self.options_ttl_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The zone datetime fields are displayed in.
    pub fn time_zone(&self) -> crate::Result<jiff::tz::TimeZone> {
        match &self.timezone {
            Some(name) if name.eq_ignore_ascii_case("utc") => Ok(jiff::tz::TimeZone::UTC),
            Some(name) => jiff::tz::TimeZone::get(name)
                .map_err(|e| crate::Error::Config(format!("timezone {}: {}", name, e))),
            None => Ok(jiff::tz::TimeZone::system()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Coercion, FieldType};

    #[test]
    fn defaults_apply_to_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.page_size, 100);
        assert_eq!(config.options_ttl(), Duration::from_secs(300));
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn extra_resources_parse_from_toml() {
        let config: Config = toml::from_str(
            r#"
            base_url = "http://parqueo.local"
            page_size = 25

            [[resources]]
            key = "tarifas"
            title = "Tarifas"
            endpoint = "/api/tarifas/"

            [[resources.fields]]
            name = "monto"
            label = "Monto"
            type = "number"
            required = true

            [[resources.fields]]
            name = "parqueo"
            label = "Parqueo"
            type = "select"
            options_endpoint = "/api/parqueos/"
            parse_out = "foreign_key"
            "#,
        )
        .unwrap();

        assert_eq!(config.page_size, 25);
        let tarifas = &config.resources[0];
        assert_eq!(tarifas.key, "tarifas");
        assert_eq!(tarifas.fields[0].field_type, FieldType::Number);
        assert!(tarifas.fields[0].required);
        assert!(tarifas.fields[1].list);
        assert_eq!(tarifas.fields[1].parse_out, Coercion::ForeignKey);
        assert_eq!(tarifas.fields[1].value_key, "id");
        assert_eq!(tarifas.fields[1].label_key, "nombre");
    }

    #[test]
    fn unknown_timezone_is_a_config_error() {
        let config = Config {
            timezone: Some("Mars/Olympus".into()),
            ..Config::default()
        };
        assert!(matches!(config.time_zone(), Err(crate::Error::Config(_))));
    }
}

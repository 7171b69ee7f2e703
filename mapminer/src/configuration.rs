use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub webdriver: WebDriverSettings,
    pub scrape: ScrapeSettings,
    pub crawler: CrawlerSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = match self.require_ssl {
            true => PgSslMode::Require,
            false => PgSslMode::Prefer,
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

#[derive(Deserialize, Clone)]
pub struct WebDriverSettings {
    /// e.g. http://localhost:9515 for a local chromedriver
    pub url: String,
    pub headless: bool,
    pub proxy: Option<String>,
}

/// Options that shape one search term's crawl.
#[derive(Deserialize, Clone, Debug)]
pub struct ScrapeSettings {
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub target_count_per_term: u32,
    pub require_phone: bool,
    pub require_website: bool,
    pub scroll_delay_ms: u64,
    #[serde(default = "default_max_scroll_attempts")]
    pub max_scroll_attempts: u32,
    #[serde(default = "default_no_new_results_limit")]
    pub no_new_results_limit: u32,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_detail_settle_delay_ms")]
    pub detail_settle_delay_ms: u64,
}

fn default_max_scroll_attempts() -> u32 {
    50
}

fn default_no_new_results_limit() -> u32 {
    3
}

fn default_settle_delay_ms() -> u64 {
    1500
}

fn default_detail_settle_delay_ms() -> u64 {
    2000
}

impl ScrapeSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.target_count_per_term == 0 {
            return Err("target_count_per_term must be greater than 0".to_string());
        }
        if self.max_scroll_attempts == 0 {
            return Err("max_scroll_attempts must be greater than 0".to_string());
        }
        if self.no_new_results_limit == 0 {
            return Err("no_new_results_limit must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn detail_settle_delay(&self) -> Duration {
        Duration::from_millis(self.detail_settle_delay_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct CrawlerSettings {
    pub min_concurrency: usize,
    pub max_concurrency: usize,
    pub max_request_retries: u8,
    pub max_usage_count: u32,
    pub navigation_timeout_secs: u64,
    pub network_idle_timeout_secs: u64,
    pub selector_timeout_secs: u64,
    #[serde(default = "default_request_handler_timeout_secs")]
    pub request_handler_timeout_secs: u64,
}

fn default_request_handler_timeout_secs() -> u64 {
    180
}

impl CrawlerSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn network_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.network_idle_timeout_secs)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }

    /// Ceiling for one list or detail unit, page work included.
    pub fn request_handler_timeout(&self) -> Duration {
        Duration::from_secs(self.request_handler_timeout_secs)
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    // Detect the running environment, default to `local`
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // e.g. `APP_SCRAPE__TARGET_COUNT_PER_TERM=20`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

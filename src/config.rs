use std::env;
use std::time::Duration;

use anyhow::Context;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub city: String,

    // Upstream providers; a missing key disables the provider.
    pub weather_api_key: Option<String>,
    pub twitter_api_key: Option<String>,
    pub news_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub oracle_model: String,
    pub upstream_timeout: Duration,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let timeout_secs: u64 = env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .context("UPSTREAM_TIMEOUT_SECS must be a whole number of seconds")?;

        Ok(Self {
            city: env::var("CIVIC_CITY").unwrap_or_else(|_| "Bengaluru".to_string()),
            weather_api_key: optional_env("WEATHER_API_KEY"),
            twitter_api_key: optional_env("TWITTER_API_KEY"),
            news_api_key: optional_env("NEWS_API_KEY"),
            gemini_api_key: optional_env("GEMINI_TEXT_API_KEY"),
            oracle_model: env::var("ORACLE_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            upstream_timeout: Duration::from_secs(timeout_secs),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("WEB_PORT must be a number")?,
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

//! Runner configuration, read from the environment.
//!
//! | variable                  | default                  |
//! |---------------------------|--------------------------|
//! | `E2E_BASE_URL`            | `http://127.0.0.1:8000`  |
//! | `E2E_START_PAGE`          | `/index.html`            |
//! | `E2E_LANDMARK`            | `main#main-content`      |
//! | `BROWSER`                 | `all`                    |
//! | `E2E_HEADLESS`            | `true`                   |
//! | `E2E_EXPECT_TIMEOUT_MS`   | `5000`                   |
//! | `E2E_NAV_TIMEOUT_MS`      | `30000`                  |
//! | `E2E_SCENARIO_TIMEOUT_MS` | `60000`                  |
//! | `E2E_SETTLE_TIMEOUT_MS`   | `5000`                   |
//! | `E2E_SERVER_TIMEOUT_MS`   | `120000`                 |
//! | `E2E_CONCURRENCY`         | `1`                      |
//! | `E2E_ARTIFACTS`           | `target/e2e-artifacts`   |
//! | `E2E_SPAWN_SERVER`        | `true`                   |

use crate::{page_contract, BrowserType};
use anyhow::{anyhow, bail, Context as _, Result};
use std::{path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: String,
    /// Loaded before every scenario.
    pub start_page: String,
    /// Selector whose presence means the page finished loading.
    pub landmark: String,
    pub browsers: Vec<BrowserType>,
    pub headless: bool,
    /// Upper bound for auto-waiting actions and polled expectations.
    pub expect_timeout: Duration,
    pub navigation_timeout: Duration,
    pub scenario_timeout: Duration,
    /// Upper bound for waiting on running animations to finish.
    pub settle_timeout: Duration,
    pub server_timeout: Duration,
    pub concurrency: usize,
    pub artifacts_dir: PathBuf,
    pub spawn_server: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            base_url: "http://127.0.0.1:8000".to_string(),
            start_page: "/index.html".to_string(),
            landmark: page_contract::LANDMARK.to_string(),
            browsers: BrowserType::ALL.to_vec(),
            headless: true,
            expect_timeout: Duration::from_millis(5_000),
            navigation_timeout: Duration::from_millis(30_000),
            scenario_timeout: Duration::from_millis(60_000),
            settle_timeout: Duration::from_millis(5_000),
            server_timeout: Duration::from_millis(120_000),
            concurrency: 1,
            artifacts_dir: PathBuf::from("target/e2e-artifacts"),
            spawn_server: true,
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RunnerConfig::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(base_url) = var("E2E_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(start_page) = var("E2E_START_PAGE") {
            config.start_page = start_page;
        }
        if let Some(landmark) = var("E2E_LANDMARK") {
            config.landmark = landmark;
        }
        if let Some(browsers) = var("BROWSER") {
            config.browsers = parse_browsers(&browsers)?;
        }
        if let Some(headless) = var("E2E_HEADLESS") {
            config.headless = parse_flag("E2E_HEADLESS", &headless)?;
        }
        if let Some(ms) = var("E2E_EXPECT_TIMEOUT_MS") {
            config.expect_timeout = parse_millis("E2E_EXPECT_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = var("E2E_NAV_TIMEOUT_MS") {
            config.navigation_timeout = parse_millis("E2E_NAV_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = var("E2E_SCENARIO_TIMEOUT_MS") {
            config.scenario_timeout = parse_millis("E2E_SCENARIO_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = var("E2E_SETTLE_TIMEOUT_MS") {
            config.settle_timeout = parse_millis("E2E_SETTLE_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = var("E2E_SERVER_TIMEOUT_MS") {
            config.server_timeout = parse_millis("E2E_SERVER_TIMEOUT_MS", &ms)?;
        }
        if let Some(concurrency) = var("E2E_CONCURRENCY") {
            config.concurrency = concurrency
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    anyhow!(
                        "E2E_CONCURRENCY must be a positive integer, got {:?}",
                        concurrency
                    )
                })?;
        }
        if let Some(dir) = var("E2E_ARTIFACTS") {
            config.artifacts_dir = PathBuf::from(dir);
        }
        if let Some(spawn) = var("E2E_SPAWN_SERVER") {
            config.spawn_server = parse_flag("E2E_SPAWN_SERVER", &spawn)?;
        }

        Ok(config)
    }

    /// Joins a page path onto the base URL; absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// `host:port` the web server is expected to listen on.
    pub fn server_addr(&self) -> Result<String> {
        let without_scheme = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .ok_or_else(|| anyhow!("E2E_BASE_URL has no scheme: {}", self.base_url))?;
        let authority = without_scheme.split('/').next().unwrap_or(without_scheme);

        if authority.contains(':') {
            Ok(authority.to_string())
        } else if self.base_url.starts_with("https://") {
            Ok(format!("{}:443", authority))
        } else {
            Ok(format!("{}:80", authority))
        }
    }
}

fn parse_browsers(value: &str) -> Result<Vec<BrowserType>> {
    if value.trim().eq_ignore_ascii_case("all") {
        return Ok(BrowserType::ALL.to_vec());
    }

    let mut browsers = Vec::new();
    for name in value.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        let browser = BrowserType::from_str(name)
            .with_context(|| format!("invalid BROWSER {:?}", value))?;
        if !browsers.contains(&browser) {
            browsers.push(browser);
        }
    }
    if browsers.is_empty() {
        bail!("BROWSER selects no browser: {:?}", value);
    }
    Ok(browsers)
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean, got {:?}", key, other),
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .with_context(|| format!("{} must be a number of milliseconds, got {:?}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<RunnerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunnerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.landmark, "main#main-content");
        assert_eq!(config.browsers, BrowserType::ALL.to_vec());
        assert_eq!(config.expect_timeout, Duration::from_secs(5));
        assert_eq!(config.concurrency, 1);
        assert!(config.headless && config.spawn_server);
    }

    #[test]
    fn overrides_from_environment() {
        let config = config(&[
            ("E2E_BASE_URL", "http://localhost:9000/"),
            ("BROWSER", "firefox, chromium,firefox"),
            ("E2E_HEADLESS", "false"),
            ("E2E_EXPECT_TIMEOUT_MS", "250"),
            ("E2E_CONCURRENCY", "3"),
            ("E2E_SPAWN_SERVER", "0"),
        ])
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(
            config.browsers,
            vec![BrowserType::Firefox, BrowserType::Chromium]
        );
        assert!(!config.headless);
        assert_eq!(config.expect_timeout, Duration::from_millis(250));
        assert_eq!(config.concurrency, 3);
        assert!(!config.spawn_server);
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = config(&[("BROWSER", "  "), ("E2E_START_PAGE", "")]).unwrap();
        assert_eq!(config.browsers.len(), 3);
        assert_eq!(config.start_page, "/index.html");
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(config(&[("BROWSER", "opera")]).is_err());
        assert!(config(&[("BROWSER", ",")]).is_err());
        assert!(config(&[("E2E_HEADLESS", "sometimes")]).is_err());
        assert!(config(&[("E2E_NAV_TIMEOUT_MS", "30s")]).is_err());
        assert!(config(&[("E2E_CONCURRENCY", "0")]).is_err());
    }

    #[test]
    fn joins_urls() {
        let config = RunnerConfig::default();
        assert_eq!(config.url("/index.html"), "http://127.0.0.1:8000/index.html");
        assert_eq!(config.url("index.html"), "http://127.0.0.1:8000/index.html");
        assert_eq!(config.url("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn server_address_from_base_url() {
        let mut config = RunnerConfig::default();
        assert_eq!(config.server_addr().unwrap(), "127.0.0.1:8000");

        config.base_url = "http://localhost/showcase".to_string();
        assert_eq!(config.server_addr().unwrap(), "localhost:80");

        config.base_url = "localhost:8000".to_string();
        assert!(config.server_addr().is_err());
    }
}

use std::time::Duration;

use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend { Http, Memory }

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default = "default_http_addr")]
  pub http_addr: String,                  // 0.0.0.0:8080
  #[serde(default = "default_api_url")]
  pub notification_api_url: Url,          // http://backend:8000/api/v1/
  pub api_token: Option<String>,
  #[serde(default = "default_backend")]
  pub notification_backend: Backend,      // http | memory
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,          // 10
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,            // 30, 0 disables polling
  #[serde(default = "default_page_size")]
  pub page_size: u32,                     // 20
  pub console_origin: Option<String>,     // http://localhost:5173
}

impl Config {
  pub fn from_env() -> Result<Self, envy::Error> { envy::from_env() }

  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

  pub fn poll_interval(&self) -> Option<Duration> {
    (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
  }
}

fn default_http_addr() -> String { "0.0.0.0:8080".into() }
fn default_api_url() -> Url { Url::parse("http://backend:8000/api/v1/").expect("static url") }
fn default_backend() -> Backend { Backend::Http }
fn default_request_timeout() -> u64 { 10 }
fn default_poll_interval() -> u64 { 30 }
fn default_page_size() -> u32 { 20 }

/// Presentation constants for the layout coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
  pub mobile_breakpoint: u32,   // widths <= this are mobile
  pub collapsed_width: u32,
  pub expanded_width: u32,
  pub grace_delay: Duration,
  pub attach_timeout: Duration,
}

impl Default for LayoutConfig {
  fn default() -> Self {
    Self {
      mobile_breakpoint: 1024,
      collapsed_width: 80,
      expanded_width: 280,
      grace_delay: Duration::from_millis(150),
      attach_timeout: Duration::from_secs(5),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_fill_missing_vars() {
    let cfg: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
    assert_eq!(cfg.http_addr, "0.0.0.0:8080");
    assert_eq!(cfg.notification_backend, Backend::Http);
    assert_eq!(cfg.page_size, 20);
    assert_eq!(cfg.poll_interval(), Some(Duration::from_secs(30)));
    assert!(cfg.api_token.is_none());
  }

  #[test]
  fn env_overrides_and_zero_disables_polling() {
    let vars = vec![
      ("NOTIFICATION_API_URL".to_string(), "http://localhost:9000/api/".to_string()),
      ("NOTIFICATION_BACKEND".to_string(), "memory".to_string()),
      ("POLL_INTERVAL_SECS".to_string(), "0".to_string()),
      ("PAGE_SIZE".to_string(), "50".to_string()),
    ];
    let cfg: Config = envy::from_iter(vars).unwrap();
    assert_eq!(cfg.notification_api_url.as_str(), "http://localhost:9000/api/");
    assert_eq!(cfg.notification_backend, Backend::Memory);
    assert_eq!(cfg.poll_interval(), None);
    assert_eq!(cfg.page_size, 50);
  }
}

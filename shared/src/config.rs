use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::error::{AppError, ErrorKind};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DRAFT_TTL_MS: u64 = 60_000;
pub const ERROR_DISPLAY_MS: u64 = 3_000;
pub const TOAST_DISPLAY_MS: u64 = 3_000;
pub const MAX_PDF_BYTES: usize = 10 * 1024 * 1024;
pub const DASHBOARD_LEADERBOARD_SIZE: usize = 5;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 72;
pub const MAX_URL_LENGTH: usize = 2048;
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("Invalid API path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Internal, e.to_string())
    }
}

/// Where the remote API lives and the client-side limits and timings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    base_url: String,
    pub draft_ttl_ms: u64,
    pub error_display_ms: u64,
    pub toast_display_ms: u64,
    pub max_pdf_bytes: usize,
    pub dashboard_leaderboard_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            draft_ttl_ms: DRAFT_TTL_MS,
            error_display_ms: ERROR_DISPLAY_MS,
            toast_display_ms: TOAST_DISPLAY_MS,
            max_pdf_bytes: MAX_PDF_BYTES,
            dashboard_leaderboard_size: DASHBOARD_LEADERBOARD_SIZE,
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        let parsed = validate_base_url(base_url)?;
        self.base_url = parsed.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/tasks/3/complete`.
    pub fn endpoint(&self, path: &str) -> Result<String, ConfigError> {
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidPath {
                path: path.to_string(),
                reason: "path must start with '/'".to_string(),
            });
        }
        if path.contains("..") || path.contains('?') || path.contains('#') {
            return Err(ConfigError::InvalidPath {
                path: path.to_string(),
                reason: "path cannot contain traversal, query or fragment".to_string(),
            });
        }

        Ok(format!("{}{}", self.base_url(), path))
    }

    pub fn endpoint_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<String, ConfigError> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        Ok(url)
    }
}

pub fn validate_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
        url: raw.chars().take(80).collect(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("URL cannot be empty"));
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(invalid("URL is too long"));
    }

    let parsed = Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(invalid(&format!(
                "invalid scheme '{other}', only 'http' and 'https' are allowed"
            )))
        }
    }
    if parsed.host_str().is_none() {
        return Err(invalid("URL must have a host"));
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(invalid("URL cannot contain credentials"));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("URL cannot contain a query or fragment"));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url(), "http://localhost:8000");
        assert_eq!(config.draft_ttl_ms, 60_000);
        assert_eq!(config.max_pdf_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let config = ApiConfig::default()
            .with_base_url("https://api.example.com/v1/")
            .unwrap();
        assert_eq!(
            config.endpoint("/tasks/3/complete").unwrap(),
            "https://api.example.com/v1/tasks/3/complete"
        );
    }

    #[test]
    fn test_endpoint_with_query() {
        let config = ApiConfig::default();
        assert_eq!(
            config
                .endpoint_with_query("/study-items", &[("type", "plan")])
                .unwrap(),
            "http://localhost:8000/study-items?type=plan"
        );
    }

    #[test]
    fn test_endpoint_rejects_bad_paths() {
        let config = ApiConfig::default();
        assert!(config.endpoint("tasks").is_err());
        assert!(config.endpoint("/tasks/../admin").is_err());
        assert!(config.endpoint("/tasks?x=1").is_err());
    }

    #[test]
    fn test_base_url_validation() {
        assert!(validate_base_url("https://api.example.com").is_ok());
        assert!(validate_base_url("").is_err());
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("https://user:pw@example.com").is_err());
        assert!(validate_base_url("https://example.com/?debug=1").is_err());
        assert!(validate_base_url("not a url").is_err());
    }
}

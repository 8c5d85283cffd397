//! Provider configuration.
//!
//! The configure payload is parsed into a [`ProviderConfig`], then resolved
//! against the environment into a [`ResolvedConfig`]. Precedence is explicit
//! configuration, then environment variable, then default.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::client::{ApiError, ClientConfig, DEFAULT_TIMEOUT};
use crate::error::ProviderError;
use crate::schema::Diagnostic;
use crate::types::is_unknown;

/// Environment variable for the API key.
pub const ENV_API_KEY: &str = "N8N_API_KEY";

/// Environment variable for the instance URL.
pub const ENV_INSTANCE_URL: &str = "N8N_INSTANCE_URL";

/// A configuration attribute as received from the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigValue<T> {
    /// Not set.
    #[default]
    Null,
    /// Set, but not known until apply.
    Unknown,
    /// Set to a known value.
    Known(T),
}

impl<T> ConfigValue<T> {
    /// Whether the value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// The known value, if any.
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            _ => None,
        }
    }
}

impl ConfigValue<String> {
    fn from_json(name: &str, value: Option<&Value>) -> Result<Self, ProviderError> {
        match value {
            None | Some(Value::Null) => Ok(Self::Null),
            Some(v) if is_unknown(v) => Ok(Self::Unknown),
            Some(Value::String(s)) => Ok(Self::Known(s.clone())),
            Some(_) => Err(ProviderError::Validation(format!(
                "attribute '{}' must be a string",
                name
            ))),
        }
    }
}

impl ConfigValue<i64> {
    fn from_json(name: &str, value: Option<&Value>) -> Result<Self, ProviderError> {
        match value {
            None | Some(Value::Null) => Ok(Self::Null),
            Some(v) if is_unknown(v) => Ok(Self::Unknown),
            Some(Value::Number(n)) => n.as_i64().map(Self::Known).ok_or_else(|| {
                ProviderError::Validation(format!("attribute '{}' must be an integer", name))
            }),
            Some(_) => Err(ProviderError::Validation(format!(
                "attribute '{}' must be an integer",
                name
            ))),
        }
    }
}

/// Provider configuration block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderConfig {
    /// `api_key`
    pub api_key: ConfigValue<String>,
    /// `instance_url`
    pub instance_url: ConfigValue<String>,
    /// `timeout`, in seconds.
    pub timeout: ConfigValue<i64>,
}

/// Configuration after environment fallback and defaults are applied.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Instance URL without a trailing `/`.
    pub instance_url: String,
    /// API key.
    pub api_key: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ResolvedConfig {
    /// Client settings for this configuration.
    pub fn client_config(&self, version: &str) -> ClientConfig {
        ClientConfig::new(self.instance_url.clone(), self.api_key.clone())
            .with_timeout(self.timeout)
            .with_user_agent(format!("n8ncloud-provider/{}", version))
    }
}

impl ProviderConfig {
    /// Parse the configure payload. A `null` payload is an empty configuration.
    pub fn from_value(value: &Value) -> Result<Self, ProviderError> {
        Ok(Self {
            api_key: ConfigValue::<String>::from_json("api_key", value.get("api_key"))?,
            instance_url: ConfigValue::<String>::from_json(
                "instance_url",
                value.get("instance_url"),
            )?,
            timeout: ConfigValue::<i64>::from_json("timeout", value.get("timeout"))?,
        })
    }

    /// Diagnostics for values that cannot be resolved before apply.
    pub fn unknown_diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if self.api_key.is_unknown() {
            diagnostics.push(
                Diagnostic::error("Unknown n8n Cloud API Key")
                    .with_detail(format!(
                        "The provider cannot create the n8n Cloud API client as there is an unknown \
                         configuration value for the n8n Cloud API key. Either target apply the \
                         source of the value first, set the value statically in the configuration, \
                         or use the {} environment variable.",
                        ENV_API_KEY
                    ))
                    .with_attribute("api_key"),
            );
        }
        if self.instance_url.is_unknown() {
            diagnostics.push(
                Diagnostic::error("Unknown n8n Cloud Instance URL")
                    .with_detail(format!(
                        "The provider cannot create the n8n Cloud API client as there is an unknown \
                         configuration value for the n8n Cloud instance URL. Either target apply \
                         the source of the value first, set the value statically in the \
                         configuration, or use the {} environment variable.",
                        ENV_INSTANCE_URL
                    ))
                    .with_attribute("instance_url"),
            );
        }
        diagnostics
    }

    /// Resolve against the process environment.
    pub fn resolve_from_env(&self) -> Result<ResolvedConfig, Vec<Diagnostic>> {
        self.resolve(|name| std::env::var(name).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    ///
    /// Unknown values are reported first and stop further checks.
    pub fn resolve<F>(&self, env: F) -> Result<ResolvedConfig, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let unknown = self.unknown_diagnostics();
        if !unknown.is_empty() {
            return Err(unknown);
        }

        let api_key = match &self.api_key {
            ConfigValue::Known(v) => v.clone(),
            _ => env(ENV_API_KEY).unwrap_or_default(),
        };
        let instance_url = match &self.instance_url {
            ConfigValue::Known(v) => v.clone(),
            _ => env(ENV_INSTANCE_URL).unwrap_or_default(),
        };

        let mut diagnostics = Vec::new();

        if api_key.is_empty() {
            diagnostics.push(
                Diagnostic::error("Missing n8n Cloud API Key")
                    .with_detail(format!(
                        "The provider cannot create the n8n Cloud API client as there is a missing \
                         or empty value for the n8n Cloud API key. Set the api_key value in the \
                         configuration or use the {} environment variable. If either is already \
                         set, ensure the value is not empty.",
                        ENV_API_KEY
                    ))
                    .with_attribute("api_key"),
            );
        }

        let instance_url = instance_url.trim().trim_end_matches('/').to_string();
        if instance_url.is_empty() {
            diagnostics.push(
                Diagnostic::error("Missing n8n Cloud Instance URL")
                    .with_detail(format!(
                        "The provider cannot create the n8n Cloud API client as there is a missing \
                         or empty value for the n8n Cloud instance URL. Set the instance_url value \
                         in the configuration or use the {} environment variable. If either is \
                         already set, ensure the value is not empty.",
                        ENV_INSTANCE_URL
                    ))
                    .with_attribute("instance_url"),
            );
        } else if let Err(reason) = check_instance_url(&instance_url) {
            diagnostics.push(
                Diagnostic::error("Invalid n8n Cloud Instance URL")
                    .with_detail(format!(
                        "The instance URL must be an absolute http or https URL such as \
                         https://yourinstance.app.n8n.cloud, got {:?}: {}",
                        instance_url, reason
                    ))
                    .with_attribute("instance_url"),
            );
        }

        let timeout = match self.timeout.known() {
            None | Some(0) => DEFAULT_TIMEOUT,
            Some(secs) if *secs < 0 => {
                diagnostics.push(
                    Diagnostic::error("Invalid n8n Cloud Timeout")
                        .with_detail(format!(
                            "The timeout must be a positive number of seconds, got {}.",
                            secs
                        ))
                        .with_attribute("timeout"),
                );
                DEFAULT_TIMEOUT
            },
            Some(secs) => Duration::from_secs(secs.unsigned_abs()),
        };

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        Ok(ResolvedConfig {
            instance_url,
            api_key: SecretString::from(api_key),
            timeout,
        })
    }
}

fn check_instance_url(url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        "http" | "https" => Err("missing host".to_string()),
        other => Err(format!("unsupported scheme {:?}", other)),
    }
}

/// Diagnostic for a client that could not be built.
pub fn client_error_diagnostic(err: &ApiError) -> Diagnostic {
    Diagnostic::error("Unable to create n8n Cloud API Client").with_detail(format!(
        "An unexpected error occurred when creating the n8n Cloud API client: {}",
        err
    ))
}

impl std::fmt::Display for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "instance_url={} timeout={}s api_key_set={}",
            self.instance_url,
            self.timeout.as_secs(),
            !self.api_key.expose_secret().is_empty()
        )
    }
}

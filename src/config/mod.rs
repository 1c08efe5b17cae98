use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Deployment defects detected while validating the configuration.
///
/// These are never recovered from: the server refuses to start.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Route \"{0}\" not defined in the router configuration")]
    MissingRoute(String),

    #[error("Route \"{route}\" has no allowed values for query parameter \"{param}\"")]
    EmptyQueryValues { route: String, param: String },

    #[error("Public prefix \"{0}\" must start with '/'")]
    InvalidPublicPrefix(String),

    #[error("At least one public prefix is required")]
    NoPublicPrefixes,

    #[error("Unknown HTTP method in write_methods: {0}")]
    InvalidMethod(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally visible origin, used to build links sent by email
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default)]
    pub environment: Environment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            environment: Environment::default(),
        }
    }
}

impl ServerConfig {
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity/data service (auth under /auth/v1, tables under /rest/v1)
    #[serde(default = "default_identity_url")]
    pub url: String,
    /// Public API key sent with every request
    #[serde(default)]
    pub anon_key: String,
    /// Name of the cookie holding the serialized session
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: default_identity_url(),
            anon_key: String::new(),
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_identity_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_cookie_name() -> String {
    "sb-auth-token".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Path prefixes reachable without a session
    #[serde(default = "default_public_prefixes")]
    pub public_prefixes: Vec<String>,
    /// Methods that a signed-in user may still send to a public route
    #[serde(default = "default_write_methods")]
    pub write_methods: Vec<String>,
    /// Query parameter marking an in-progress password recovery
    #[serde(default = "default_recovery_param")]
    pub recovery_param: String,
    #[serde(default = "default_recovery_value")]
    pub recovery_value: String,
    #[serde(default = "default_signin_path")]
    pub signin_path: String,
    #[serde(default = "default_home_path")]
    pub home_path: String,
    #[serde(default = "default_onboarding_path")]
    pub onboarding_path: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            public_prefixes: default_public_prefixes(),
            write_methods: default_write_methods(),
            recovery_param: default_recovery_param(),
            recovery_value: default_recovery_value(),
            signin_path: default_signin_path(),
            home_path: default_home_path(),
            onboarding_path: default_onboarding_path(),
        }
    }
}

fn default_public_prefixes() -> Vec<String> {
    vec!["/auth".to_string(), "/info".to_string()]
}

fn default_write_methods() -> Vec<String> {
    ["POST", "PUT", "PATCH", "DELETE"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_recovery_param() -> String {
    "type".to_string()
}

fn default_recovery_value() -> String {
    "recovery".to_string()
}

fn default_signin_path() -> String {
    "/auth?action=signin".to_string()
}

fn default_home_path() -> String {
    "/".to_string()
}

fn default_onboarding_path() -> String {
    "/onboarding".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default = "default_theme")]
    pub default_theme: String,
    #[serde(default = "default_lang")]
    pub default_lang: String,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            default_theme: default_theme(),
            default_lang: default_lang(),
        }
    }
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_lang() -> String {
    "es".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A named page and the values each of its query parameters may take.
///
/// The first value of a parameter is its default.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub query: HashMap<String, Vec<String>>,
}

impl RouteEntry {
    fn new(name: &str, path: &str, param: &str, values: &[&str]) -> Self {
        let mut query = HashMap::new();
        query.insert(
            param.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        Self {
            name: name.to_string(),
            path: path.to_string(),
            query,
        }
    }

    /// Allowed values for a query parameter, empty when the route declares none
    pub fn allowed(&self, param: &str) -> &[String] {
        self.query.get(param).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn default_value(&self, param: &str) -> Option<&str> {
        self.allowed(param).first().map(String::as_str)
    }
}

fn default_routes() -> Vec<RouteEntry> {
    vec![
        RouteEntry::new("auth", "/auth", "action", &["signin", "signup"]),
        RouteEntry::new("password", "/auth/password", "type", &["reset", "recovery"]),
        RouteEntry::new("password-reset", "/auth/password_reset", "type", &["recovery", ""]),
    ]
}

/// Routes the handlers look up by name; all must be present at startup.
const REQUIRED_ROUTES: &[(&str, &str)] = &[
    ("auth", "action"),
    ("password", "type"),
    ("password-reset", "type"),
];

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| "Failed to parse configuration file")?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            identity: IdentityConfig::default(),
            access: AccessConfig::default(),
            preferences: PreferencesConfig::default(),
            logging: LoggingConfig::default(),
            routes: default_routes(),
        }
    }

    /// Check the invariants the request pipeline relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access.public_prefixes.is_empty() {
            return Err(ConfigError::NoPublicPrefixes);
        }
        if let Some(bad) = self
            .access
            .public_prefixes
            .iter()
            .find(|p| !p.starts_with('/'))
        {
            return Err(ConfigError::InvalidPublicPrefix(bad.clone()));
        }
        for method in &self.access.write_methods {
            if axum::http::Method::from_bytes(method.as_bytes()).is_err() {
                return Err(ConfigError::InvalidMethod(method.clone()));
            }
        }
        for (name, param) in REQUIRED_ROUTES {
            let route = self.route(name)?;
            if route.allowed(param).is_empty() {
                return Err(ConfigError::EmptyQueryValues {
                    route: name.to_string(),
                    param: param.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Find a route entry by name
    pub fn route(&self, name: &str) -> Result<&RouteEntry, ConfigError> {
        self.routes
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ConfigError::MissingRoute(name.to_string()))
    }
}

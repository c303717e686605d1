//! Configuration module for vcdusage.
//!
//! Session options for connecting to the control plane, and the settings of
//! the report binary. Both load from environment variables.

use crate::usage::{MetricBasis, StorageScope, VmQuery};

use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("username required")]
    NoUsername,
    #[error("password required")]
    NoPassword,
    #[error("URL required")]
    NoUrl,
    #[error("failed to parse URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{name} required")]
    Missing { name: &'static str },
    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Parse a control-plane URL, forcing the `https` scheme and the `/api`
/// path when none is given.
pub fn parse_url(u: &str) -> Result<Url, ConfigError> {
    let raw = if u.starts_with("http") {
        u.to_string()
    } else {
        format!("https://{}", u)
    };

    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.clone(),
        reason,
    };

    let mut url = Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
    url.set_scheme("https")
        .map_err(|_| invalid("cannot use https scheme".to_string()))?;
    if url.path() == "/" || url.path().is_empty() {
        url.set_path("/api");
    }
    Ok(url)
}

/// Session options.
#[derive(Clone, PartialEq)]
pub struct Options {
    /// Skip TLS certificate validation (default: false)
    pub insecure: bool,
    /// Organization used to authenticate (default: "system")
    pub org: String,
    pub username: String,
    pub password: String,
    pub url: Option<Url>,
    /// API version sent in the Accept header (default: "36.0")
    pub api_version: String,
    /// Per-request timeout (default: 30s)
    pub timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            insecure: false,
            org: "system".to_string(),
            username: String::new(),
            password: String::new(),
            url: None,
            api_version: "36.0".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("insecure", &self.insecure)
            .field("org", &self.org)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Options {
    pub fn insecure(mut self) -> Self {
        self.insecure = true;
        self
    }

    pub fn org(mut self, org: &str) -> Self {
        self.org = org.to_string();
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// Base URL of the API. See [`parse_url`].
    pub fn url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn api_version(mut self, version: &str) -> Self {
        self.api_version = version.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ensure required options are set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::NoUsername);
        }
        if self.password.is_empty() {
            return Err(ConfigError::NoPassword);
        }
        if self.url.is_none() {
            return Err(ConfigError::NoUrl);
        }
        Ok(())
    }

    /// Load options from environment variables.
    ///
    /// Environment variables:
    /// - `VCD_URL`: API URL, parsed with [`parse_url`]
    /// - `VCD_USERNAME`, `VCD_PASSWORD`: credentials
    /// - `VCD_ORG`: authentication org (default: "system")
    /// - `VCD_INSECURE`: skip certificate validation when "true" or "1"
    /// - `VCD_API_VERSION`: API version (default: "36.0")
    /// - `VCD_TIMEOUT_SECS`: request timeout in seconds (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load options from the variables returned by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut opts = Self::default();

        if let Some(u) = lookup("VCD_URL") {
            opts.url = Some(parse_url(&u)?);
        }
        if let Some(username) = lookup("VCD_USERNAME") {
            opts.username = username;
        }
        if let Some(password) = lookup("VCD_PASSWORD") {
            opts.password = password;
        }
        if let Some(org) = lookup("VCD_ORG").filter(|v| !v.is_empty()) {
            opts.org = org;
        }
        if let Some(insecure) = lookup("VCD_INSECURE") {
            opts.insecure = parse_flag(&insecure);
        }
        if let Some(version) = lookup("VCD_API_VERSION") {
            opts.api_version = version;
        }
        if let Some(secs) = lookup("VCD_TIMEOUT_SECS") {
            let parsed: u64 = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "VCD_TIMEOUT_SECS",
                value: secs.clone(),
            })?;
            opts.timeout = Duration::from_secs(parsed);
        }

        Ok(opts)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Settings of the report binary.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub org_id: String,
    /// Restrict the report to a single VDC
    pub vdc_id: Option<String>,
    pub basis: MetricBasis,
    pub scope: StorageScope,
    /// Extra VM filter counted alongside the totals
    pub query: Option<VmQuery>,
}

impl ReportConfig {
    /// Load report settings from environment variables.
    ///
    /// Environment variables:
    /// - `VCD_ORG_ID`: organization to report on (required)
    /// - `VCD_VDC_ID`: single VDC to report on
    /// - `VCD_METRIC_BASIS`: "used" or "allocated" (default: "used")
    /// - `VCD_STORAGE_SCOPE`: "all" or "default" (default: "all")
    /// - `VCD_QUERY_NAME`, `VCD_QUERY_GUEST_OS`: case-insensitive substrings
    /// - `VCD_QUERY_POWERED_ON`: restrict the query to powered-on VMs
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load report settings from the variables returned by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let set = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let org_id = set("VCD_ORG_ID").ok_or(ConfigError::Missing { name: "VCD_ORG_ID" })?;
        let vdc_id = set("VCD_VDC_ID");

        let basis: MetricBasis = match set("VCD_METRIC_BASIS") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "VCD_METRIC_BASIS",
                value: v.clone(),
            })?,
            None => MetricBasis::default(),
        };
        let scope: StorageScope = match set("VCD_STORAGE_SCOPE") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "VCD_STORAGE_SCOPE",
                value: v.clone(),
            })?,
            None => StorageScope::default(),
        };

        let name = set("VCD_QUERY_NAME");
        let guest_os = set("VCD_QUERY_GUEST_OS");
        let powered_on = set("VCD_QUERY_POWERED_ON")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let query = if name.is_none() && guest_os.is_none() && !powered_on {
            None
        } else {
            let mut query = VmQuery::all();
            if let Some(name) = name {
                query = query.name_containing(&name);
            }
            if let Some(guest_os) = guest_os {
                query = query.guest_os_containing(&guest_os);
            }
            if powered_on {
                query = query.powered_on();
            }
            Some(query)
        };

        Ok(Self {
            org_id,
            vdc_id,
            basis,
            scope,
            query,
        })
    }
}

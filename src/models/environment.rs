//! Environment-related data models.
//!
//! An environment is a named target database. Callers may use any alias
//! token; everything internal is keyed by the canonical [`Environment`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Canonical environment keys.
///
/// `Local` is its own key rather than an alias of `Development`: a developer
/// laptop database and a shared development server are different targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Development,
    Staging,
    Production,
}

impl Environment {
    /// All canonical keys in display order.
    pub const ALL: [Environment; 4] = [
        Environment::Local,
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    /// Normalize an alias token (case-insensitive, surrounding whitespace ignored).
    ///
    /// Returns `None` for tokens outside the alias table.
    pub fn from_alias(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Self::Local),
            "dev" | "development" => Some(Self::Development),
            "stage" | "stg" | "staging" => Some(Self::Staging),
            "prod" | "production" => Some(Self::Production),
            _ => None,
        }
    }

    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection string for one environment.
///
/// Immutable for the process lifetime. The string is validated only when a
/// pool is first created for the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub environment: Environment,
    /// Contains sensitive data - never log
    connection_string: String,
}

impl ConnectionDescriptor {
    pub fn new(environment: Environment, connection_string: impl Into<String>) -> Self {
        Self {
            environment,
            connection_string: connection_string.into(),
        }
    }

    /// Raw connection string, including credentials.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Get a display-safe version of the connection string (credentials masked).
    ///
    /// Masks the userinfo password and any `password` query parameter.
    pub fn masked_connection_string(&self) -> String {
        let raw = &self.connection_string;
        let Some(scheme_end) = raw.find("://").map(|i| i + 3) else {
            return "****".to_string();
        };
        let authority_end = raw[scheme_end..]
            .find(['/', '?'])
            .map_or(raw.len(), |i| scheme_end + i);
        let masked = match raw[scheme_end..authority_end].rfind('@') {
            Some(at) => {
                let userinfo = &raw[scheme_end..scheme_end + at];
                let user = userinfo.split(':').next().unwrap_or_default();
                format!(
                    "{}{}:****{}",
                    &raw[..scheme_end],
                    user,
                    &raw[scheme_end + at..]
                )
            }
            None => raw.clone(),
        };
        mask_query_password(masked)
    }
}

/// Replace the value of every `password` query parameter.
fn mask_query_password(url: String) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url;
    };
    let params: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if key.eq_ignore_ascii_case("password") => format!("{key}=****"),
            _ => pair.to_string(),
        })
        .collect();
    format!("{}?{}", base, params.join("&"))
}

impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("environment", &self.environment)
            .field("connection_string", &self.masked_connection_string())
            .finish()
    }
}

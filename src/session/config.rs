//! Session store and cookie configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Session store path (redb database file).
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Session TTL in seconds (default: 1 hour).
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Cleanup interval in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Router name recorded in new state bags and audit records.
    #[serde(default = "default_router")]
    pub router: String,

    /// Cookie name for session ID.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie domain (optional, defaults to request host).
    #[serde(default)]
    pub cookie_domain: Option<String>,

    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Require HTTPS for cookies (Secure flag).
    #[serde(default = "default_true")]
    pub cookie_secure: bool,

    #[serde(default = "default_true")]
    pub cookie_http_only: bool,

    #[serde(default = "default_same_site")]
    pub cookie_same_site: String,
}

fn default_store_path() -> String {
    "/var/lib/svs/sessions.redb".to_string()
}

fn default_ttl() -> u64 {
    60 * 60
}

fn default_cleanup_interval() -> u64 {
    super::cleanup::DEFAULT_CLEANUP_INTERVAL_SECS
}

fn default_router() -> String {
    "svs".to_string()
}

fn default_cookie_name() -> String {
    "SVS_SESSION".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_same_site() -> String {
    "Lax".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            ttl_secs: default_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
            router: default_router(),
            cookie_name: default_cookie_name(),
            cookie_domain: None,
            cookie_path: default_cookie_path(),
            cookie_secure: true,
            cookie_http_only: true,
            cookie_same_site: default_same_site(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.store_path.is_empty() {
            return Err("session store_path is required".to_string());
        }

        if self.ttl_secs == 0 {
            return Err("session ttl_secs must be positive".to_string());
        }

        if self.cookie_name.is_empty() || self.cookie_name.contains(['=', ';', ' ']) {
            return Err(format!("invalid session cookie_name: {:?}", self.cookie_name));
        }

        match self.cookie_same_site.as_str() {
            "Strict" | "Lax" | "None" => Ok(()),
            other => Err(format!("cookie_same_site must be Strict, Lax or None, got {}", other)),
        }
    }

    /// Build the session cookie value.
    pub fn build_cookie(&self, session_id: &str) -> String {
        let mut cookie = format!("{}={}", self.cookie_name, session_id);

        if let Some(ref domain) = self.cookie_domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }

        cookie.push_str(&format!("; Path={}", self.cookie_path));

        if self.cookie_secure {
            cookie.push_str("; Secure");
        }

        if self.cookie_http_only {
            cookie.push_str("; HttpOnly");
        }

        cookie.push_str(&format!("; SameSite={}", self.cookie_same_site));
        cookie.push_str(&format!("; Max-Age={}", self.ttl_secs));

        cookie
    }

    /// Parse session ID from cookie header.
    pub fn parse_session_cookie(&self, cookie_header: &str) -> Option<String> {
        let prefix = format!("{}=", self.cookie_name);
        cookie_header
            .split(';')
            .map(str::trim)
            .find_map(|part| part.strip_prefix(prefix.as_str()))
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cookie_path, "/");
        assert!(config.cookie_secure);
        assert!(config.cookie_http_only);
    }

    #[test]
    fn test_validation() {
        let mut config = SessionConfig::default();
        config.cookie_same_site = "Sometimes".to_string();
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.cookie_name = "a=b".to_string();
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_cookie() {
        let config = SessionConfig {
            cookie_domain: Some("svs.example.org".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.build_cookie("abc123"),
            "SVS_SESSION=abc123; Domain=svs.example.org; Path=/; Secure; HttpOnly; SameSite=Lax; Max-Age=3600"
        );
    }

    #[test]
    fn test_parse_session_cookie() {
        let config = SessionConfig::default();
        assert_eq!(
            config.parse_session_cookie("theme=dark; SVS_SESSION=abc123; other=1"),
            Some("abc123".to_string())
        );
        assert_eq!(config.parse_session_cookie("theme=dark"), None);
        assert_eq!(config.parse_session_cookie("XSVS_SESSION=abc"), None);
    }
}

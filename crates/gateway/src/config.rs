use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use reqwest::header::HeaderName;

const DEFAULT_GRAPHQL_ENDPOINT: &str = "http://localhost:8080/v1/graphql";
const DEFAULT_SECRET_HEADER: &str = "x-hasura-admin-secret";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub graphql_endpoint: String,
    pub graphql_admin_secret: Option<String>,
    pub graphql_secret_header: String,
    pub graphql_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("CATALOG_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                let file_kv = parse_env_file(config_path)?;
                merged.extend(file_kv);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let mut bind_addr = parse_socket_addr(
            kv.get("CATALOG_BIND_ADDR"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            "CATALOG_BIND_ADDR",
        )?;
        if let Some(port) = parse_port(kv.get("CATALOG_PORT"), "CATALOG_PORT")? {
            bind_addr.set_port(port);
        }

        let graphql_endpoint = kv
            .get("CATALOG_GRAPHQL_ENDPOINT")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_GRAPHQL_ENDPOINT)
            .to_string();
        if !graphql_endpoint.starts_with("http://") && !graphql_endpoint.starts_with("https://") {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "CATALOG_GRAPHQL_ENDPOINT must be an http:// or https:// URL".to_string(),
            });
        }

        let graphql_admin_secret = kv
            .get("CATALOG_GRAPHQL_ADMIN_SECRET")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let graphql_secret_header = kv
            .get("CATALOG_GRAPHQL_SECRET_HEADER")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SECRET_HEADER)
            .to_ascii_lowercase();
        if HeaderName::from_bytes(graphql_secret_header.as_bytes()).is_err() {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "CATALOG_GRAPHQL_SECRET_HEADER must be a valid HTTP header name"
                    .to_string(),
            });
        }

        let graphql_timeout_ms = parse_u64(
            kv.get("CATALOG_GRAPHQL_TIMEOUT_MS"),
            0,
            "CATALOG_GRAPHQL_TIMEOUT_MS",
        )?;

        Ok(Self {
            bind_addr,
            graphql_endpoint,
            graphql_admin_secret,
            graphql_secret_header,
            graphql_timeout_ms,
        })
    }

    /// Transport timeout for backend calls; `None` leaves calls unbounded.
    pub fn graphql_timeout(&self) -> Option<Duration> {
        (self.graphql_timeout_ms > 0).then(|| Duration::from_millis(self.graphql_timeout_ms))
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;

    parse_env_lines(&contents)
}

fn parse_env_lines(contents: &str) -> Result<HashMap<String, String>, StartupError> {
    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()));
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..bytes.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn parse_socket_addr(
    value: Option<&String>,
    default: SocketAddr,
    key: &'static str,
) -> Result<SocketAddr, StartupError> {
    match value.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(v) => v.parse::<SocketAddr>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a valid host:port socket address", key),
        }),
    }
}

fn parse_port(value: Option<&String>, key: &'static str) -> Result<Option<u16>, StartupError> {
    match value.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(v) => v.parse::<u16>().map(Some).map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a port number between 0 and 65535", key),
        }),
    }
}

fn parse_u64(value: Option<&String>, default: u64, key: &'static str) -> Result<u64, StartupError> {
    match value.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(v) => v.parse::<u64>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a non-negative integer", key),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = GatewayConfig::from_kv(&HashMap::new()).expect("defaults should be valid");

        assert_eq!(cfg.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.graphql_endpoint, DEFAULT_GRAPHQL_ENDPOINT);
        assert_eq!(cfg.graphql_admin_secret, None);
        assert_eq!(cfg.graphql_secret_header, DEFAULT_SECRET_HEADER);
        assert_eq!(cfg.graphql_timeout(), None);
    }

    #[test]
    fn port_overrides_bind_addr_port() {
        let cfg = GatewayConfig::from_kv(&env(&[
            ("CATALOG_BIND_ADDR", "0.0.0.0:8000"),
            ("CATALOG_PORT", "4100"),
        ]))
        .unwrap();

        assert_eq!(cfg.bind_addr, "0.0.0.0:4100".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn invalid_port_fails() {
        let err = GatewayConfig::from_kv(&env(&[("CATALOG_PORT", "70000")])).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn non_http_endpoint_fails() {
        let err = GatewayConfig::from_kv(&env(&[(
            "CATALOG_GRAPHQL_ENDPOINT",
            "ftp://backend/v1/graphql",
        )]))
        .unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn blank_secret_means_no_credential() {
        let cfg =
            GatewayConfig::from_kv(&env(&[("CATALOG_GRAPHQL_ADMIN_SECRET", "   ")])).unwrap();
        assert_eq!(cfg.graphql_admin_secret, None);
    }

    #[test]
    fn invalid_secret_header_fails() {
        let err = GatewayConfig::from_kv(&env(&[("CATALOG_GRAPHQL_SECRET_HEADER", "bad header")]))
            .unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn timeout_is_opt_in() {
        let cfg = GatewayConfig::from_kv(&env(&[("CATALOG_GRAPHQL_TIMEOUT_MS", "1500")])).unwrap();
        assert_eq!(cfg.graphql_timeout(), Some(Duration::from_millis(1500)));

        let err =
            GatewayConfig::from_kv(&env(&[("CATALOG_GRAPHQL_TIMEOUT_MS", "-1")])).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn env_file_lines_are_parsed_with_quotes_and_comments() {
        let kv = parse_env_lines(
            "# backend\nCATALOG_GRAPHQL_ENDPOINT=\"http://hasura:8080/v1/graphql\"\n\nCATALOG_PORT='4000'\n",
        )
        .unwrap();

        assert_eq!(
            kv.get("CATALOG_GRAPHQL_ENDPOINT").map(String::as_str),
            Some("http://hasura:8080/v1/graphql")
        );
        assert_eq!(kv.get("CATALOG_PORT").map(String::as_str), Some("4000"));
    }

    #[test]
    fn env_file_line_without_separator_fails() {
        let err = parse_env_lines("CATALOG_PORT\n").unwrap_err();
        assert_eq!(err.code, "ERR_CONFIG_FILE_PARSE");
    }
}

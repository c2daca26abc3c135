use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Host (host:port) used when building content URLs. Falls back to the
    /// request's `Host` header when unset.
    pub external_host: Option<String>,
    pub trust_forwarded_proto: bool,
    pub content_retention: ContentRetention,
}

/// What happens to uploaded content when its owning File is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ContentRetention {
    /// Content outlives the resource; recreating the name serves the old bytes.
    #[default]
    Retain,
    /// Content is dropped together with the resource.
    EvictOnDelete,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "File resource API with an in-memory content subresource")]
pub struct Args {
    /// Host to bind to (overrides FILE_CDN_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_CDN_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Metadata database URL (overrides FILE_CDN_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// External host (host:port) used to construct content URLs
    /// (overrides FILE_CDN_EXTERNAL_HOST). If empty, the request's Host header is used.
    #[arg(long)]
    pub external_host: Option<String>,

    /// Treat `X-Forwarded-Proto: https` as a TLS-terminated request
    /// (overrides FILE_CDN_TRUST_FORWARDED_PROTO)
    #[arg(long)]
    pub trust_forwarded_proto: bool,

    /// Content retention policy on resource delete (overrides FILE_CDN_CONTENT_RETENTION)
    #[arg(long, value_enum)]
    pub content_retention: Option<ContentRetention>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::merge(args, |key| env::var(key))?;
        Ok((cfg, migrate))
    }

    /// Merge parsed args over values looked up through `lookup`.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = lookup("FILE_CDN_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match lookup("FILE_CDN_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing FILE_CDN_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8080,
            Err(err) => return Err(err).context("reading FILE_CDN_PORT"),
        };
        let env_db = lookup("FILE_CDN_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/file_cdn.db".into());
        let env_external_host = lookup("FILE_CDN_EXTERNAL_HOST").ok();
        let env_trust_proto = match lookup("FILE_CDN_TRUST_FORWARDED_PROTO") {
            Ok(value) => parse_bool(&value)
                .with_context(|| format!("parsing FILE_CDN_TRUST_FORWARDED_PROTO value `{}`", value))?,
            Err(_) => false,
        };
        let env_retention = match lookup("FILE_CDN_CONTENT_RETENTION") {
            Ok(value) => ContentRetention::from_str(&value, true)
                .map_err(|err| anyhow!(err))
                .with_context(|| format!("parsing FILE_CDN_CONTENT_RETENTION value `{}`", value))?,
            Err(_) => ContentRetention::default(),
        };

        // --- Merge ---
        let external_host = args
            .external_host
            .or(env_external_host)
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            external_host,
            trust_forwarded_proto: args.trust_forwarded_proto || env_trust_proto,
            content_retention: args.content_retention.unwrap_or(env_retention),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("expected a boolean, got `{}`", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> + use<> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("file-cdn").chain(argv.iter().copied()))
    }

    #[test]
    fn test_defaults_without_env_or_flags() {
        let cfg = AppConfig::merge(args(&[]), lookup_from(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.external_host, None);
        assert!(!cfg.trust_forwarded_proto);
        assert_eq!(cfg.content_retention, ContentRetention::Retain);
    }

    #[test]
    fn test_flags_override_env() {
        let env = lookup_from(&[
            ("FILE_CDN_PORT", "9000"),
            ("FILE_CDN_EXTERNAL_HOST", "env.example.com"),
        ]);
        let cfg = AppConfig::merge(
            args(&["--port", "9100", "--external-host", "cdn.example.com:443"]),
            env,
        )
        .unwrap();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.external_host.as_deref(), Some("cdn.example.com:443"));
    }

    #[test]
    fn test_empty_external_host_is_unset() {
        let env = lookup_from(&[("FILE_CDN_EXTERNAL_HOST", "  ")]);
        let cfg = AppConfig::merge(args(&[]), env).unwrap();
        assert_eq!(cfg.external_host, None);
    }

    #[test]
    fn test_env_retention_and_proto() {
        let env = lookup_from(&[
            ("FILE_CDN_CONTENT_RETENTION", "evict-on-delete"),
            ("FILE_CDN_TRUST_FORWARDED_PROTO", "true"),
        ]);
        let cfg = AppConfig::merge(args(&[]), env).unwrap();
        assert_eq!(cfg.content_retention, ContentRetention::EvictOnDelete);
        assert!(cfg.trust_forwarded_proto);
    }

    #[test]
    fn test_bad_port_is_error() {
        let env = lookup_from(&[("FILE_CDN_PORT", "not-a-port")]);
        assert!(AppConfig::merge(args(&[]), env).is_err());
    }

    #[test]
    fn test_bad_retention_is_error() {
        let env = lookup_from(&[("FILE_CDN_CONTENT_RETENTION", "forever")]);
        assert!(AppConfig::merge(args(&[]), env).is_err());
    }
}

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;

use crate::model::error::ProxyError;

const DEFAULT_CACHE_MAX_OBJECT_BYTES: usize = 8 * 1024 * 1024;

#[derive(Parser, Debug, Clone)]
#[command(name = "objectproxy", version, about = "HTTP front-end for Google Cloud Storage")]
pub struct Config {
    #[arg(long, env = "PROXY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PROXY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Terminate TLS with the PEM certificate and key below
    #[arg(long, env = "PROXY_TLS")]
    pub tls: bool,

    #[arg(long, env = "PROXY_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "PROXY_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Project whose buckets `GET /` lists; discovered from the credentials when unset
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project: Option<String>,

    #[arg(long, env = "PROXY_NO_CACHE")]
    pub no_cache: bool,

    /// Objects above this size are streamed but not cached
    #[arg(long, env = "PROXY_CACHE_MAX_OBJECT_BYTES", default_value_t = DEFAULT_CACHE_MAX_OBJECT_BYTES)]
    pub cache_max_object_bytes: usize,

    #[arg(long, env = "PROXY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

/// PEM paths for TLS termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Config {
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.port == 0 {
            return Err(ProxyError::Config("port must be non-zero".to_string()));
        }

        self.tls_paths()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ProxyError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|err| ProxyError::Config(format!("invalid listen address: {}:{}, {}", self.host, self.port, err)))
    }

    pub fn tls_paths(&self) -> Result<Option<TlsPaths>, ProxyError> {
        if !self.tls {
            return Ok(None);
        }

        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Ok(Some(TlsPaths {
                cert: cert.clone(),
                key: key.clone(),
            })),
            _ => Err(ProxyError::Config(
                "--tls requires both --tls-cert and --tls-key".to_string(),
            )),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

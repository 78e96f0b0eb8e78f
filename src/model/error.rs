use thiserror::Error;

/// Process-level failures: startup, configuration and the accept loop.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("configuration error: {0}")]
    Config(String),
}

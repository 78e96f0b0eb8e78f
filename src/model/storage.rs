use thiserror::Error;

/// Failure reported by the remote object store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("iteration failed: {0}")]
    Iteration(String),

    #[error("io failed: {0}")]
    Io(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerAttrs {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemAttrs {
    pub name: String,
    pub size: i64,
    pub content_type: Option<String>,
}

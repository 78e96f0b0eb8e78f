use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::model::storage::{ContainerAttrs, ItemAttrs, StoreError};

pub mod gcs;
#[cfg(test)]
pub mod mock;

/// Lazily fetched names; an `Err` item ends the listing early.
pub type NameStream = BoxStream<'static, Result<String, StoreError>>;

pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// The remote object store as seen by the proxy.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn list_containers(&self) -> NameStream;

    async fn container_attributes(&self, container: &str) -> Result<ContainerAttrs, StoreError>;

    fn list_items(&self, container: &str) -> NameStream;

    async fn item_attributes(&self, container: &str, item: &str) -> Result<ItemAttrs, StoreError>;

    async fn open_item_reader(&self, container: &str, item: &str) -> Result<ByteStream, StoreError>;
}

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};

use crate::{
    adapters::{self, ByteStream, NameStream},
    model::storage::{ContainerAttrs, ItemAttrs, StoreError},
};

/// In-memory store with failure injection.
#[derive(Default)]
pub struct MockClient {
    pub buckets: BTreeMap<String, BTreeMap<String, Bytes>>,
    /// Listings yield this many names, then fail.
    pub fail_listing_after: Option<usize>,
    pub fail_open: bool,
    /// Readers fail before yielding anything.
    pub fail_read_immediately: bool,
    /// Readers yield their first chunk, then fail.
    pub fail_read_after_first_chunk: bool,
    /// Content is handed out in chunks of this size.
    pub chunk_size: Option<usize>,
    pub content_type: Option<String>,
    pub calls: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.buckets.entry(bucket.to_string()).or_default();
        self
    }

    pub fn with_object(mut self, bucket: &str, key: &str, body: &[u8]) -> Self {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), Bytes::copy_from_slice(body));
        self
    }

    /// Number of store calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn names(&self, names: Vec<String>) -> NameStream {
        let mut items: Vec<Result<String, StoreError>> = names.into_iter().map(Ok).collect();
        if let Some(n) = self.fail_listing_after {
            items.truncate(n);
            items.push(Err(StoreError::Iteration("injected listing failure".to_string())));
        }

        stream::iter(items).boxed()
    }
}

#[async_trait]
impl adapters::ObjectStore for MockClient {
    fn list_containers(&self) -> NameStream {
        self.record();
        self.names(self.buckets.keys().cloned().collect())
    }

    async fn container_attributes(&self, container: &str) -> Result<ContainerAttrs, StoreError> {
        self.record();
        match self.buckets.contains_key(container) {
            true => Ok(ContainerAttrs {
                name: container.to_string(),
            }),
            false => Err(StoreError::NotFound(container.to_string())),
        }
    }

    fn list_items(&self, container: &str) -> NameStream {
        self.record();
        let names = self
            .buckets
            .get(container)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();

        self.names(names)
    }

    async fn item_attributes(&self, container: &str, item: &str) -> Result<ItemAttrs, StoreError> {
        self.record();
        let body = self
            .buckets
            .get(container)
            .and_then(|objects| objects.get(item))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", container, item)))?;

        Ok(ItemAttrs {
            name: item.to_string(),
            size: body.len() as i64,
            content_type: self.content_type.clone(),
        })
    }

    async fn open_item_reader(&self, container: &str, item: &str) -> Result<ByteStream, StoreError> {
        self.record();
        if self.fail_open {
            return Err(StoreError::Io("injected open failure".to_string()));
        }

        let body = self
            .buckets
            .get(container)
            .and_then(|objects| objects.get(item))
            .cloned()
            .ok_or_else(|| StoreError::Io(format!("{}/{}", container, item)))?;

        let size = self.chunk_size.unwrap_or(body.len()).max(1);
        let mut chunks: Vec<Result<Bytes, StoreError>> = body
            .chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        if self.fail_read_immediately {
            chunks.clear();
            chunks.push(Err(StoreError::Io("injected read failure".to_string())));
        } else if self.fail_read_after_first_chunk {
            chunks.truncate(1);
            chunks.push(Err(StoreError::Io("injected read failure".to_string())));
        }

        Ok(stream::iter(chunks).boxed())
    }
}

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::{Bytes, BytesMut};
use futures::{stream::BoxStream, Stream};
use tracing::{debug, error};

use crate::{
    cache::{CachedEntry, ObjectCache},
    model::storage::StoreError,
};

struct Capture {
    cache: Arc<ObjectCache>,
    key: String,
    limit: usize,
    content_type: Option<String>,
    buf: BytesMut,
}

/// Item content on its way to the client.
///
/// Passes chunks through untouched and logs a mid-stream failure. When a cache
/// is attached the chunks are also accumulated, and the cache is populated
/// once the inner stream ends cleanly. An error, an object past the size
/// limit, or the stream being dropped early all discard the capture.
pub struct ItemStream {
    inner: BoxStream<'static, Result<Bytes, StoreError>>,
    key: String,
    capture: Option<Capture>,
    bytes_sent: usize,
}

impl ItemStream {
    pub fn new(inner: BoxStream<'static, Result<Bytes, StoreError>>, key: String) -> Self {
        Self {
            inner,
            key,
            capture: None,
            bytes_sent: 0,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ObjectCache>, limit: usize, content_type: Option<String>) -> Self {
        self.capture = Some(Capture {
            cache,
            key: self.key.clone(),
            limit,
            content_type,
            buf: BytesMut::new(),
        });
        self
    }
}

impl Stream for ItemStream {
    type Item = Result<Bytes, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_sent += chunk.len();

                let over_limit = match &mut this.capture {
                    Some(capture) if capture.buf.len() + chunk.len() <= capture.limit => {
                        capture.buf.extend_from_slice(&chunk);
                        false
                    }
                    Some(_) => true,
                    None => false,
                };
                if over_limit {
                    debug!(key = %this.key, limit_exceeded = true, "skipping cache population");
                    this.capture = None;
                }

                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                error!(
                    error_message=%err,
                    error_group="object_io",
                    key=%this.key,
                    bytes_sent=this.bytes_sent
                );
                this.capture = None;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                debug!(key = %this.key, bytes_sent = this.bytes_sent, "item stream finished");
                if let Some(capture) = this.capture.take() {
                    debug!(key = %capture.key, size = capture.buf.len(), "populating cache");
                    capture.cache.set(
                        &capture.key,
                        CachedEntry {
                            bytes: capture.buf.freeze(),
                            content_type: capture.content_type,
                        },
                    );
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

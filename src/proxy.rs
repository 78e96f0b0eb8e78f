use std::{convert::Infallible, sync::Arc};

use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Full, StreamBody};
use hyper::{
    body::Frame,
    header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE},
    Request, Response, StatusCode,
};
use tracing::{error, info, span, Instrument, Level};

use crate::{
    adapters::{NameStream, ObjectStore},
    cache::ObjectCache,
    errors::{ErrorCatalog, ErrorKind},
    model::{
        coordinate::{Route, StorageCoordinate},
        storage::StoreError,
    },
    util::{json::to_tabbed_json, path, stream::ItemStream},
};

pub type ProxyBody = UnsyncBoxBody<Bytes, StoreError>;

/// Result of a handler: either a response to send or the taxonomy entry to
/// answer with instead.
type HandlerResult = Result<Response<ProxyBody>, ErrorKind>;

const APPLICATION_JSON: &str = "application/json";

fn full(bytes: Bytes) -> ProxyBody {
    Full::new(bytes)
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

fn json_response(body: Bytes, status: StatusCode) -> Response<ProxyBody> {
    let mut resp = Response::new(full(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    resp
}

/// Maps request paths onto object store operations.
pub struct StorageProxy {
    store: Arc<dyn ObjectStore>,
    errors: ErrorCatalog,
    cache: Option<Arc<ObjectCache>>,
    max_cached_object_bytes: usize,
}

impl StorageProxy {
    pub fn new(store: Arc<dyn ObjectStore>, errors: ErrorCatalog) -> Self {
        Self {
            store,
            errors,
            cache: None,
            max_cached_object_bytes: 0,
        }
    }

    /// Serves repeat item fetches from `cache`. Objects larger than
    /// `max_object_bytes` are streamed but never stored.
    pub fn with_cache(mut self, cache: Arc<ObjectCache>, max_object_bytes: usize) -> Self {
        self.cache = Some(cache);
        self.max_cached_object_bytes = max_object_bytes;
        self
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<ProxyBody> {
        let path = req.uri().path().to_string();
        let span = span!(Level::INFO, "request", method = %req.method(), path = %path);

        async move {
            info!("called");

            let coordinate = match path::decode(&path).and_then(|decoded| path::resolve(&decoded)) {
                Err(err) => {
                    error!(error_message=%err, error_group="parse_path");
                    return self.error_response(ErrorKind::MalformedPath);
                }
                Ok(coordinate) => coordinate,
            };

            let result = match coordinate.route() {
                Route::Invalid => Err(ErrorKind::BucketRequired),
                Route::ListContainers => self.list_containers().await,
                Route::ListItems { container } => self.list_items(container).await,
                Route::GetItem { container, item } => {
                    self.get_item(&coordinate, container, item).await
                }
            };

            match result {
                Err(kind) => self.error_response(kind),
                Ok(resp) => resp,
            }
        }
        .instrument(span)
        .await
    }

    fn error_response(&self, kind: ErrorKind) -> Response<ProxyBody> {
        error!(
            error_message = kind.message(),
            error_group = kind.group(),
            status = kind.status().as_u16()
        );
        json_response(self.errors.body(kind), kind.status())
    }

    async fn list_containers(&self) -> HandlerResult {
        let names = collect_names(self.store.list_containers()).await?;
        names_response(&names)
    }

    async fn list_items(&self, container: &str) -> HandlerResult {
        if let Err(err) = self.store.container_attributes(container).await {
            error!(error_message=%err, error_group="container_attributes", container=container);
            return Err(ErrorKind::BucketNotFound);
        }

        let names = collect_names(self.store.list_items(container)).await?;
        names_response(&names)
    }

    async fn get_item(&self, coordinate: &StorageCoordinate, container: &str, item: &str) -> HandlerResult {
        let key = coordinate.key();

        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.get(&key) {
                info!(key = %key, size = entry.bytes.len(), "cache hit");
                let len = entry.bytes.len() as u64;
                let mut resp = Response::new(full(entry.bytes));
                set_item_headers(&mut resp, entry.content_type.as_deref(), Some(len));
                return Ok(resp);
            }
        }

        if let Err(err) = self.store.container_attributes(container).await {
            error!(error_message=%err, error_group="container_attributes", container=container);
            return Err(ErrorKind::BucketNotFound);
        }

        let attrs = match self.store.item_attributes(container, item).await {
            Err(err) => {
                error!(error_message=%err, error_group="item_attributes", key=%key);
                return Err(ErrorKind::ObjectNotFound);
            }
            Ok(attrs) => attrs,
        };

        let mut reader = match self.store.open_item_reader(container, item).await {
            Err(err) => {
                error!(error_message=%err, error_group="open_reader", key=%key);
                return Err(ErrorKind::ObjectIOResponse);
            }
            Ok(reader) => reader,
        };

        // The status line goes out with the first body frame, so a reader
        // that fails straight away can still be answered with a clean 500.
        let first = match reader.try_next().await {
            Err(err) => {
                error!(error_message=%err, error_group="read_object", key=%key);
                return Err(ErrorKind::ObjectIOResponse);
            }
            Ok(first) => first,
        };

        let content = stream::iter(first.into_iter().map(Ok::<Bytes, StoreError>))
            .chain(reader)
            .boxed();
        let mut body = ItemStream::new(content, key);
        if let Some(cache) = &self.cache {
            if attrs.size >= 0 && attrs.size as u64 <= self.max_cached_object_bytes as u64 {
                body = body.with_cache(
                    Arc::clone(cache),
                    self.max_cached_object_bytes,
                    attrs.content_type.clone(),
                );
            }
        }

        let mut resp = Response::new(StreamBody::new(body.map_ok(Frame::data)).boxed_unsync());
        let len = u64::try_from(attrs.size).ok();
        set_item_headers(&mut resp, attrs.content_type.as_deref(), len);

        Ok(resp)
    }
}

/// Item responses carry the store's content type whether served from the
/// store or the cache.
fn set_item_headers(resp: &mut Response<ProxyBody>, content_type: Option<&str>, len: Option<u64>) {
    if let Some(content_type) = content_type.and_then(|ct| HeaderValue::from_str(ct).ok()) {
        resp.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    if let Some(len) = len {
        resp.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
}

/// Drains a listing fully before anything is written.
async fn collect_names(names: NameStream) -> Result<Vec<String>, ErrorKind> {
    names.try_collect().await.map_err(|err: StoreError| {
        error!(error_message=%err, error_group="iteration");
        ErrorKind::IterationError
    })
}

fn names_response(names: &[String]) -> HandlerResult {
    match to_tabbed_json(names) {
        Err(err) => {
            error!(error_message=%err, error_group="marshalling");
            Err(ErrorKind::Marshalling)
        }
        Ok(body) => Ok(json_response(Bytes::from(body), StatusCode::OK)),
    }
}

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use google_cloud_storage::{
    client::Client,
    http::{
        buckets::{get::GetBucketRequest, list::ListBucketsRequest},
        objects::{download::Range, get::GetObjectRequest, list::ListObjectsRequest},
        Error,
    },
};

use crate::{
    adapters::{self, ByteStream, NameStream},
    model::storage::{ContainerAttrs, ItemAttrs, StoreError},
};

/// Google Cloud Storage, scoped to one project for bucket listings.
#[derive(Clone)]
pub struct GcsStore {
    client: Client,
    project_id: String,
}

impl GcsStore {
    pub fn new(client: Client, project_id: &str) -> Self {
        Self {
            client,
            project_id: project_id.to_string(),
        }
    }
}

fn lookup_error(what: &str, err: Error) -> StoreError {
    match err {
        Error::Response(err) if err.code == 404 => StoreError::NotFound(what.to_string()),
        err => StoreError::Io(format!("failed to look up: {}, {}", what, err)),
    }
}

/// Turns a stream of name pages into a stream of names.
fn flatten_pages<S>(pages: S) -> NameStream
where
    S: futures::Stream<Item = Result<Vec<String>, StoreError>> + Send + 'static,
{
    pages
        .map_ok(|names| stream::iter(names.into_iter().map(Ok::<String, StoreError>)))
        .try_flatten()
        .boxed()
}

#[async_trait]
impl adapters::ObjectStore for GcsStore {
    fn list_containers(&self) -> NameStream {
        let client = self.client.clone();
        let project = self.project_id.clone();

        // `None` state means the last page has been fetched
        let pages = stream::try_unfold(Some(None::<String>), move |state| {
            let client = client.clone();
            let project = project.clone();
            async move {
                let page_token = match state {
                    None => return Ok(None),
                    Some(token) => token,
                };

                let req = ListBucketsRequest {
                    project: project.clone(),
                    page_token,
                    ..Default::default()
                };

                let lb = client.list_buckets(&req).await.map_err(|err| {
                    StoreError::Iteration(format!("failed to list_buckets in: {}, {}", project, err))
                })?;

                let names: Vec<String> = lb.items.into_iter().map(|b| b.name).collect();
                Ok::<_, StoreError>(Some((names, lb.next_page_token.map(Some))))
            }
        });

        flatten_pages(pages)
    }

    async fn container_attributes(&self, container: &str) -> Result<ContainerAttrs, StoreError> {
        let req = GetBucketRequest {
            bucket: container.to_string(),
            ..Default::default()
        };

        let bucket = self
            .client
            .get_bucket(&req)
            .await
            .map_err(|err| lookup_error(container, err))?;

        Ok(ContainerAttrs { name: bucket.name })
    }

    fn list_items(&self, container: &str) -> NameStream {
        let client = self.client.clone();
        let bucket = container.to_string();

        let pages = stream::try_unfold(Some(None::<String>), move |state| {
            let client = client.clone();
            let bucket = bucket.clone();
            async move {
                let page_token = match state {
                    None => return Ok(None),
                    Some(token) => token,
                };

                let req = ListObjectsRequest {
                    bucket: bucket.clone(),
                    page_token,
                    ..Default::default()
                };

                let lo = client.list_objects(&req).await.map_err(|err| {
                    StoreError::Iteration(format!("failed to list_objects in: {}, {}", bucket, err))
                })?;

                let names: Vec<String> = lo
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .map(|o| o.name)
                    .collect();
                Ok::<_, StoreError>(Some((names, lo.next_page_token.map(Some))))
            }
        });

        flatten_pages(pages)
    }

    async fn item_attributes(&self, container: &str, item: &str) -> Result<ItemAttrs, StoreError> {
        let req = GetObjectRequest {
            bucket: container.to_string(),
            object: item.to_string(),
            ..Default::default()
        };

        let obj = self
            .client
            .get_object(&req)
            .await
            .map_err(|err| lookup_error(&format!("{}/{}", container, item), err))?;

        Ok(ItemAttrs {
            name: obj.name,
            size: obj.size,
            content_type: obj.content_type,
        })
    }

    async fn open_item_reader(&self, container: &str, item: &str) -> Result<ByteStream, StoreError> {
        let req = GetObjectRequest {
            bucket: container.to_string(),
            object: item.to_string(),
            ..Default::default()
        };

        let key = format!("{}/{}", container, item);
        let body = self
            .client
            .download_streamed_object(&req, &Range::default())
            .await
            .map_err(|err| StoreError::Io(format!("failed to download_object: {}, {}", key, err)))?;

        Ok(body
            .map_err(move |err| StoreError::Io(format!("failed to read body: {}, {}", key, err)))
            .boxed())
    }
}

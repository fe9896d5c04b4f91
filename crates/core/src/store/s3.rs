//! S3-compatible (AWS S3, MinIO, R2) store implementation.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Tag, Tagging};
use aws_sdk_s3::Client;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::{debug, info};

use super::config::StorageConfig;
use super::error::StoreError;
use super::local::{collect_upload_files, content_type_for};
use super::traits::{ContentReader, JobStore, OutputSink};
use crate::job::SourceJob;

/// One bucket of an S3-compatible object store.
///
/// The same type serves as the source [`JobStore`] (pointed at the upload
/// bucket) and as the [`OutputSink`] (pointed at the output bucket).
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

/// Listing position between `ListObjectsV2` pages.
enum Cursor {
    Start,
    Next(String),
    Done,
}

impl S3Store {
    /// Create a store for `bucket` from connection settings.
    pub fn new(config: &StorageConfig, bucket: impl Into<String>) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "dashcoder",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.into(),
        }
    }

    /// Store pointed at the source upload bucket.
    pub fn source(config: &StorageConfig) -> Self {
        Self::new(config, config.source_bucket.clone())
    }

    /// Store pointed at the encoded output bucket.
    pub fn output(config: &StorageConfig) -> Self {
        Self::new(config, config.output_bucket.clone())
    }

    /// Bucket this store reads and writes.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(&self, token: Option<String>) -> Result<(Vec<String>, Cursor), StoreError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|e| StoreError::ListFailed(describe(&e)))?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        let next = match (response.is_truncated(), response.next_continuation_token()) {
            (Some(true), Some(token)) => Cursor::Next(token.to_string()),
            _ => Cursor::Done,
        };

        Ok((keys, next))
    }

    async fn fetch_tags(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let output = self
            .client
            .get_object_tagging()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if is_missing(&e) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::tagging_failed(key, describe(&e))
                }
            })?;

        Ok(output
            .tag_set()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect())
    }

    async fn open(&self, key: &str) -> Result<ContentReader, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if is_missing(&e) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::download_failed(key, describe(&e))
                }
            })?;

        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn head_bucket(&self) -> Result<(), StoreError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StoreError::Backend(format!(
                    "bucket {} unreachable: {}",
                    self.bucket,
                    describe(&e)
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    fn list_jobs(&self) -> BoxStream<'_, Result<SourceJob, StoreError>> {
        let pages = stream::try_unfold(Cursor::Start, move |cursor| async move {
            let token = match cursor {
                Cursor::Done => return Ok::<_, StoreError>(None),
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
            };
            let (keys, next) = self.list_page(token).await?;
            Ok(Some((keys, next)))
        });

        pages
            .map_ok(|keys| stream::iter(keys.into_iter().map(Ok::<String, StoreError>)))
            .try_flatten()
            .try_filter_map(move |key| async move {
                match self.fetch_tags(&key).await {
                    Ok(tags) => Ok(Some(SourceJob::with_tags(key, tags))),
                    Err(e) if e.is_not_found() => {
                        // Deleted between listing and tag lookup.
                        debug!(key = %key, "Object vanished during listing");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .boxed()
    }

    async fn set_tags(&self, id: &str, tags: HashMap<String, String>) -> Result<(), StoreError> {
        let tag_set = tags
            .into_iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::tagging_failed(id, e))?;

        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(|e| StoreError::tagging_failed(id, e))?;

        self.client
            .put_object_tagging()
            .bucket(&self.bucket)
            .key(id)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| StoreError::tagging_failed(id, describe(&e)))?;

        debug!(key = %id, "Set object tags");
        Ok(())
    }

    async fn remove_tags(&self, id: &str) -> Result<(), StoreError> {
        self.client
            .delete_object_tagging()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| StoreError::tagging_failed(id, describe(&e)))?;

        debug!(key = %id, "Removed object tags");
        Ok(())
    }

    async fn get_content(&self, id: &str) -> Result<ContentReader, StoreError> {
        self.open(id).await
    }

    async fn delete_content(&self, id: &str) -> Result<(), StoreError> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
        {
            Ok(_) => {
                debug!(key = %id, "Deleted object");
                Ok(())
            }
            Err(e) if is_missing(&e) => Ok(()),
            Err(e) => Err(StoreError::delete_failed(id, describe(&e))),
        }
    }

    async fn check_connectivity(&self) -> Result<(), StoreError> {
        self.head_bucket().await
    }
}

#[async_trait]
impl OutputSink for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn upload(&self, job_id: &str, local_dir: &Path) -> Result<(), StoreError> {
        let files = collect_upload_files(job_id, local_dir).await?;

        for file in &files {
            let body = ByteStream::from_path(&file.path)
                .await
                .map_err(|e| StoreError::upload_failed(&file.key, e))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&file.key)
                .body(body)
                .content_type(content_type_for(&file.path))
                .send()
                .await
                .map_err(|e| StoreError::upload_failed(&file.key, describe(&e)))?;

            debug!(key = %file.key, "Uploaded output file");
        }

        info!(
            job_id = %job_id,
            files = files.len(),
            bucket = %self.bucket,
            "Uploaded encoded output"
        );
        Ok(())
    }

    async fn get_object(&self, job_id: &str, file_name: &str) -> Result<ContentReader, StoreError> {
        self.open(&format!("{}/{}", job_id, file_name.trim_start_matches('/')))
            .await
    }

    async fn check_connectivity(&self) -> Result<(), StoreError> {
        self.head_bucket().await
    }
}

fn describe<E: std::error::Error>(err: E) -> String {
    DisplayErrorContext(err).to_string()
}

fn is_missing<E: ProvideErrorMetadata, R>(err: &SdkError<E, R>) -> bool {
    matches!(
        err.as_service_error().and_then(|e| e.code()),
        Some("NoSuchKey") | Some("NotFound")
    )
}

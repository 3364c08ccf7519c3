//! S3-compatible object store (Acacia, Banksia).

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use md5::{Digest, Md5};

use obsarchive_core::config::LocationConfig;
use obsarchive_core::error::{AppError, ErrorKind};
use obsarchive_core::result::AppResult;
use obsarchive_core::traits::{IncompleteUpload, IncompleteUploadStore, ObjectStore};

/// Error code S3 reports for a key that is already gone.
const NO_SUCH_KEY: &str = "NoSuchKey";

/// Object store backed by an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    name: String,
    client: Client,
}

impl S3ObjectStore {
    /// Build a client for the location `name` from its configuration section.
    pub async fn connect(name: &str, config: &LocationConfig) -> AppResult<Self> {
        tracing::info!(
            location = name,
            endpoint = %config.endpoint_url,
            region = %config.region,
            "Initializing S3 object store"
        );

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "obsarchive",
        );
        let timeouts = aws_config::timeout::TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build();

        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint_url)
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        Ok(Self {
            name: name.to_string(),
            client: Client::from_conf(s3_config),
        })
    }
}

/// Map an SDK error to an [`AppError`], marking network failures, timeouts,
/// throttling and 5xx responses as retryable.
fn sdk_error<E>(err: SdkError<E, HttpResponse>, what: &str) -> AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            status == 429 || status >= 500
        }
        _ => false,
    };
    let kind = if transient {
        ErrorKind::ServiceUnavailable
    } else {
        ErrorKind::Storage
    };
    let message = format!("{what}: {}", DisplayErrorContext(&err));
    AppError::with_source(kind, message, err)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> AppResult<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Internal, "Invalid object identifier", e)
            })?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(false)
            .build()
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Invalid delete request", e))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("DeleteObjects on {}/{bucket}", self.name)))?;

        let mut confirmed: Vec<String> = output
            .deleted()
            .iter()
            .filter_map(|d| d.key().map(str::to_string))
            .collect();

        for failure in output.errors() {
            let key = failure.key().unwrap_or_default();
            if failure.code() == Some(NO_SUCH_KEY) {
                confirmed.push(key.to_string());
                continue;
            }
            tracing::warn!(
                location = %self.name,
                bucket,
                key,
                code = failure.code().unwrap_or_default(),
                "Object not deleted: {}",
                failure.message().unwrap_or_default()
            );
        }

        tracing::debug!(
            location = %self.name,
            bucket,
            requested = keys.len(),
            confirmed = confirmed.len(),
            "DeleteObjects complete"
        );
        Ok(confirmed)
    }
}

#[async_trait]
impl IncompleteUploadStore for S3ObjectStore {
    async fn list_buckets(&self) -> AppResult<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| sdk_error(e, &format!("ListBuckets on {}", self.name)))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn list_incomplete_uploads(&self, bucket: &str) -> AppResult<Vec<IncompleteUpload>> {
        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;

        loop {
            let page = self
                .client
                .list_multipart_uploads()
                .bucket(bucket)
                .set_key_marker(key_marker.take())
                .set_upload_id_marker(upload_id_marker.take())
                .send()
                .await
                .map_err(|e| {
                    sdk_error(e, &format!("ListMultipartUploads on {}/{bucket}", self.name))
                })?;

            for upload in page.uploads() {
                let (Some(key), Some(upload_id)) = (upload.key(), upload.upload_id()) else {
                    continue;
                };
                uploads.push(IncompleteUpload {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    upload_id: upload_id.to_string(),
                    initiated: upload.initiated().and_then(|t| {
                        chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())
                    }),
                });
            }

            if !page.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = page.next_key_marker().map(str::to_string);
            upload_id_marker = page.next_upload_id_marker().map(str::to_string);
            if key_marker.is_none() && upload_id_marker.is_none() {
                break;
            }
        }

        Ok(uploads)
    }

    async fn object_md5(&self, bucket: &str, key: &str) -> AppResult<Option<String>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(SdkError::ServiceError(service)) if service.err().is_no_such_key() => {
                return Ok(None);
            }
            Err(e) => {
                return Err(sdk_error(
                    e,
                    &format!("GetObject {key} on {}/{bucket}", self.name),
                ));
            }
        };

        let mut body = output.body;
        let mut hasher = Md5::new();
        while let Some(chunk) = body.try_next().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ServiceUnavailable,
                format!("Failed reading {key} from {}/{bucket}", self.name),
                e,
            )
        })? {
            hasher.update(&chunk);
        }
        Ok(Some(hex::encode(hasher.finalize())))
    }

    async fn abort_upload(&self, upload: &IncompleteUpload) -> AppResult<()> {
        match self
            .client
            .abort_multipart_upload()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(service)) if service.err().is_no_such_upload() => {
                tracing::debug!(key = %upload.key, "Upload already gone");
                Ok(())
            }
            Err(e) => Err(sdk_error(
                e,
                &format!("AbortMultipartUpload {} on {}", upload.key, self.name),
            )),
        }
    }
}

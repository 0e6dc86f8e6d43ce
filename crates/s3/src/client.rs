//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the BucketStore trait from jam-core.

use std::path::Path;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
    ErrorDocument, IndexDocument, WebsiteConfiguration,
};
use bytes::Bytes;
use jam_core::{
    BucketStore, BucketSummary, ETag, Error, LIST_PAGE_SIZE, ObjectPage, RemoteObject, Result,
    RetryConfig, SessionConfig, check_part_size, is_retryable_error, region_from_location,
    retry_with_backoff,
};
use jiff::Timestamp;
use tokio::io::AsyncReadExt;

/// Region used when neither the session nor the SDK provider chain names one
pub const FALLBACK_REGION: &str = "us-east-1";

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    retry: RetryConfig,
}

impl S3Client {
    /// Create a new S3 client from session settings
    pub async fn new(session: &SessionConfig, retry: RetryConfig) -> Result<Self> {
        session.validate()?;

        let region = RegionProviderChain::first_try(
            session.region.clone().map(aws_config::Region::new),
        )
        .or_default_provider()
        .or_else(aws_config::Region::new(FALLBACK_REGION));

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

        if let Some(profile) = &session.profile {
            loader = loader.profile_name(profile);
        }

        if let Some(endpoint) = &session.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) = (&session.access_key, &session.secret_key) {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "jam-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        let config = loader.load().await;

        // S3-compatible services behind a custom endpoint rarely support
        // virtual-hosted addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(session.endpoint.is_some())
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            retry,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Region requests are signed for
    pub fn region(&self) -> String {
        self.inner
            .config()
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| FALLBACK_REGION.to_string())
    }

    /// Format AWS SDK error into a detailed error message
    fn format_sdk_error<E: std::fmt::Display>(error: &SdkError<E>) -> String {
        match error {
            SdkError::ServiceError(service_err) => {
                let err = service_err.err();
                let meta = service_err.raw();
                let mut msg = format!("Service error: {}", err);
                // Try to extract additional error information from headers
                if let Some(code) = meta.headers().get("x-amz-error-code")
                    && let Ok(code_str) = std::str::from_utf8(code.as_bytes())
                {
                    msg.push_str(&format!(" (code: {})", code_str));
                }
                msg
            }
            SdkError::ConstructionFailure(err) => {
                format!("Request construction failed: {:?}", err)
            }
            SdkError::TimeoutError(_) => "Request timeout".to_string(),
            SdkError::DispatchFailure(err) => {
                format!("Network dispatch error: {:?}", err)
            }
            SdkError::ResponseError(err) => {
                format!("Response error: {:?}", err)
            }
            _ => error.to_string(),
        }
    }

    /// Map an SDK failure onto jam's error kinds
    fn map_sdk_error<E>(error: SdkError<E>, subject: &str) -> Error
    where
        E: ProvideErrorMetadata + std::fmt::Display,
    {
        let code = error.code().map(str::to_string);
        classify(code.as_deref(), subject, Self::format_sdk_error(&error))
    }

    async fn list_page(&self, bucket: &str, token: Option<String>) -> Result<ObjectPage> {
        let response = self
            .inner
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(LIST_PAGE_SIZE)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket))?;

        let objects = response
            .contents()
            .iter()
            .map(|object| {
                let mut remote = RemoteObject::new(
                    object.key().unwrap_or_default(),
                    ETag::from_remote(object.e_tag().unwrap_or_default()),
                    object.size().unwrap_or(0),
                );
                remote.last_modified = object
                    .last_modified()
                    .and_then(|dt| Timestamp::from_second(dt.secs()).ok());
                remote
            })
            .collect();

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    async fn put_single(&self, bucket: &str, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::local_io(path, std::io::Error::other(e.to_string())))?;

        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        Ok(())
    }

    /// Upload in parts of exactly `chunk_size` bytes; only the last may be shorter
    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
        chunk_size: usize,
    ) -> Result<()> {
        let created = self
            .inner
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::General(format!("No upload id returned for '{key}'")))?
            .to_string();

        match self
            .send_parts(bucket, key, path, &upload_id, chunk_size)
            .await
        {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.inner
                    .complete_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error(e, key))?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = self
                    .inner
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        key,
                        upload_id,
                        error = %Self::format_sdk_error(&abort),
                        "Failed to abort multi-part upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn send_parts(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        upload_id: &str,
        chunk_size: usize,
    ) -> Result<Vec<CompletedPart>> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::local_io(path, e))?;
        let mut parts = Vec::new();
        let mut part_number: i32 = 0;

        loop {
            let mut buf = Vec::with_capacity(chunk_size);
            let read = (&mut file)
                .take(chunk_size as u64)
                .read_to_end(&mut buf)
                .await
                .map_err(|e| Error::local_io(path, e))?;
            if read == 0 {
                break;
            }

            part_number += 1;
            let data = Bytes::from(buf);
            tracing::debug!(key, part_number, size = read, "Uploading part");

            let etag = retry_with_backoff(
                &self.retry,
                "upload_part",
                || {
                    let data = data.clone();
                    async move {
                        let response = self
                            .inner
                            .upload_part()
                            .bucket(bucket)
                            .key(key)
                            .upload_id(upload_id)
                            .part_number(part_number)
                            .body(ByteStream::from(data))
                            .send()
                            .await
                            .map_err(|e| Self::map_sdk_error(e, key))?;
                        Ok(response.e_tag().unwrap_or_default().to_string())
                    }
                },
                is_retryable_error,
            )
            .await?;

            parts.push(
                CompletedPart::builder()
                    .e_tag(etag)
                    .part_number(part_number)
                    .build(),
            );

            if read < chunk_size {
                break;
            }
        }

        Ok(parts)
    }
}

/// Turn an S3 error code into an error kind
fn classify(code: Option<&str>, subject: &str, message: String) -> Error {
    match code {
        Some(
            "AccessDenied"
            | "AllAccessDisabled"
            | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "ExpiredToken"
            | "InvalidToken",
        ) => Error::Auth(message),
        Some("NoSuchBucket" | "NoSuchKey" | "NotFound") => {
            Error::NotFound(format!("{subject}: {message}"))
        }
        Some("BucketAlreadyExists" | "OperationAborted") => {
            Error::Conflict(format!("{subject}: {message}"))
        }
        _ => Error::Network(message),
    }
}

/// Whether a file of `size` bytes is sent in parts
fn is_multipart(size: u64, chunk_size: usize) -> bool {
    size > chunk_size as u64
}

#[async_trait]
impl BucketStore for S3Client {
    async fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage> {
        retry_with_backoff(
            &self.retry,
            "list_objects",
            || {
                let token = continuation_token.clone();
                async move { self.list_page(bucket, token).await }
            },
            is_retryable_error,
        )
        .await
    }

    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
        chunk_size: usize,
    ) -> Result<()> {
        // S3 rejects undersized parts only at completion, after every part was sent
        check_part_size(chunk_size)?;

        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::local_io(path, e))?
            .len();

        if is_multipart(size, chunk_size) {
            self.put_multipart(bucket, key, path, content_type, chunk_size)
                .await
        } else {
            retry_with_backoff(
                &self.retry,
                "put_object",
                || async move { self.put_single(bucket, key, path, content_type).await },
                is_retryable_error,
            )
            .await
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        retry_with_backoff(
            &self.retry,
            "delete_object",
            || async move {
                self.inner
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error(e, key))?;
                Ok(())
            },
            is_retryable_error,
        )
        .await
    }

    async fn bucket_region(&self, bucket: &str) -> Result<String> {
        retry_with_backoff(
            &self.retry,
            "get_bucket_location",
            || async move {
                let response = self
                    .inner
                    .get_bucket_location()
                    .bucket(bucket)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error(e, bucket))?;
                Ok(region_from_location(
                    response.location_constraint().map(|c| c.as_str()),
                ))
            },
            is_retryable_error,
        )
        .await
    }

    async fn list_buckets(&self) -> Result<Vec<BucketSummary>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, "buckets"))?;

        let buckets = response
            .buckets()
            .iter()
            .map(|b| BucketSummary {
                name: b.name().unwrap_or_default().to_string(),
                created: b
                    .creation_date()
                    .and_then(|dt| Timestamp::from_second(dt.secs()).ok()),
            })
            .collect();

        Ok(buckets)
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<bool> {
        let mut request = self.inner.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if region != FALLBACK_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(true),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_bucket_already_owned_by_you()) =>
            {
                Ok(false)
            }
            Err(e) => Err(Self::map_sdk_error(e, bucket)),
        }
    }

    async fn allow_public_access(&self, bucket: &str) -> Result<()> {
        self.inner
            .delete_public_access_block()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket))?;

        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        self.inner
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket))?;

        Ok(())
    }

    async fn put_website_config(
        &self,
        bucket: &str,
        index_document: &str,
        error_document: &str,
    ) -> Result<()> {
        let index = IndexDocument::builder()
            .suffix(index_document)
            .build()
            .map_err(|e| Error::General(format!("index document: {e}")))?;
        let error = ErrorDocument::builder()
            .key(error_document)
            .build()
            .map_err(|e| Error::General(format!("error document: {e}")))?;

        let website = WebsiteConfiguration::builder()
            .index_document(index)
            .error_document(error)
            .build();

        self.inner
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(website)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket))?;

        Ok(())
    }
}

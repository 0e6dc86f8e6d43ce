//! Static website bucket setup
//!
//! Creates a bucket (or adopts one the caller already owns), opens it for
//! public reads and turns on website hosting.

use serde::Serialize;

use crate::endpoint::website_url;
use crate::error::Result;
use crate::traits::BucketStore;

/// Index and error documents served by the website endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteConfig {
    pub index_document: String,
    pub error_document: String,
}

impl Default for WebsiteConfig {
    fn default() -> Self {
        Self {
            index_document: "index.html".to_string(),
            error_document: "error.html".to_string(),
        }
    }
}

/// Outcome of [`setup_hosting_bucket`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostingReport {
    pub bucket: String,
    pub region: String,
    /// `false` when the bucket already existed
    pub created: bool,
    pub url: String,
}

/// Bucket policy granting anonymous `s3:GetObject` on every key
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "PublicReadGetObject",
                "Effect": "Allow",
                "Principal": "*",
                "Action": ["s3:GetObject"],
                "Resource": [format!("arn:aws:s3:::{bucket}/*")]
            }
        ]
    })
    .to_string()
}

/// Prepare `bucket` for static website hosting in `region`
pub async fn setup_hosting_bucket(
    store: &(impl BucketStore + ?Sized),
    bucket: &str,
    region: &str,
    website: &WebsiteConfig,
) -> Result<HostingReport> {
    let created = store.create_bucket(bucket, region).await?;
    if created {
        tracing::info!(bucket, region, "Created bucket");
    } else {
        tracing::info!(bucket, "Bucket already exists, continuing");
    }

    store.allow_public_access(bucket).await?;

    tracing::info!(bucket, "Applying public read policy");
    store
        .put_bucket_policy(bucket, &public_read_policy(bucket))
        .await?;

    tracing::info!(bucket, "Applying website configuration");
    store
        .put_website_config(bucket, &website.index_document, &website.error_document)
        .await?;

    // An existing bucket may live elsewhere than the requested region
    let actual_region = store.bucket_region(bucket).await?;
    let url = website_url(bucket, &actual_region)?;

    Ok(HostingReport {
        bucket: bucket.to_string(),
        region: actual_region,
        created,
        url,
    })
}

use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use axum::body::Bytes;
use chrono::Utc;
use reqwest::Url;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::StorageConfig;

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage is not configured")]
    NotConfigured,

    #[error("s3 request failed: {0}")]
    S3(String),

    #[error("cannot resolve object key from {0}")]
    UnknownUrl(String),
}

impl<E: std::error::Error + 'static> From<aws_sdk_s3::error::SdkError<E>> for StorageError {
    fn from(err: aws_sdk_s3::error::SdkError<E>) -> Self {
        StorageError::S3(DisplayErrorContext(&err).to_string())
    }
}

#[derive(Clone)]
struct Bucket {
    client: Client,
    name: String,
    public_base: String,
}

/// Image bucket on S3, or on any S3-compatible service when an endpoint is set.
/// Requests are SigV4-signed with the configured access key.
#[derive(Clone)]
pub struct ObjectStorage {
    bucket: Option<Bucket>,
}

impl ObjectStorage {
    pub fn new(config: &StorageConfig) -> Self {
        let (Some(name), Some(access_key), Some(secret_key)) =
            (&config.bucket, &config.access_key, &config.secret_key)
        else {
            tracing::warn!("S3 bucket or credentials missing, uploads are disabled");
            return Self { bucket: None };
        };

        let region = config.region.as_deref().unwrap_or(DEFAULT_REGION);
        let credentials = Credentials::new(access_key, secret_key, None, None, "marketplace-config");
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.trim_end_matches('/')).force_path_style(true);
        }

        Self {
            bucket: Some(Bucket {
                client: Client::from_conf(builder.build()),
                name: name.clone(),
                public_base: public_base(
                    name,
                    region,
                    config.endpoint.as_deref(),
                    config.public_url.as_deref(),
                ),
            }),
        }
    }

    /// Upload `bytes` under `folder` and return the public URL.
    pub async fn upload(&self, bytes: Bytes, mime: &str, folder: &str) -> Result<String, StorageError> {
        let bucket = self.bucket.as_ref().ok_or(StorageError::NotConfigured)?;
        let key = object_key(folder, &bytes, mime, Utc::now().timestamp_millis());

        bucket
            .client
            .put_object()
            .bucket(&bucket.name)
            .key(&key)
            .content_type(mime)
            .body(ByteStream::from(bytes))
            .send()
            .await?;

        tracing::debug!(key = %key, "object uploaded");
        Ok(format!("{}/{key}", bucket.public_base))
    }

    pub async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let bucket = self.bucket.as_ref().ok_or(StorageError::NotConfigured)?;
        let key = key_from_url(&bucket.public_base, url)
            .ok_or_else(|| StorageError::UnknownUrl(url.to_string()))?;

        bucket
            .client
            .delete_object()
            .bucket(&bucket.name)
            .key(&key)
            .send()
            .await?;

        tracing::debug!(key = %key, "object deleted");
        Ok(())
    }
}

/// Base URL objects are served from.
pub fn public_base(bucket: &str, region: &str, endpoint: Option<&str>, public_url: Option<&str>) -> String {
    match (public_url, endpoint) {
        (Some(url), _) => url.trim_end_matches('/').to_string(),
        (None, Some(endpoint)) => format!("{}/{bucket}", endpoint.trim_end_matches('/')),
        (None, None) => format!("https://{bucket}.s3.{region}.amazonaws.com"),
    }
}

/// Object key behind a stored URL; unknown hosts fall back to the URL path.
pub fn key_from_url(public_base: &str, url: &str) -> Option<String> {
    if let Some(rest) = url.strip_prefix(public_base) {
        let key = rest.trim_start_matches('/');
        return (!key.is_empty()).then(|| key.to_string());
    }
    let parsed = Url::parse(url).ok()?;
    let key = parsed.path().trim_start_matches('/');
    (!key.is_empty()).then(|| key.to_string())
}

/// `folder/<content hash prefix>-<millis>.<ext>`
pub fn object_key(folder: &str, bytes: &[u8], mime: &str, millis: i64) -> String {
    let digest = Sha256::digest(bytes);
    let prefix: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!(
        "{}/{}-{}.{}",
        folder.trim_matches('/'),
        prefix,
        millis,
        extension_for(mime)
    )
}

pub fn extension_for(mime: &str) -> &str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        other => other
            .split('/')
            .nth(1)
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let key = object_key("/products/", b"abc", "image/png", 1700000000000);
        assert!(key.starts_with("products/ba7816bf8f01-"));
        assert!(key.ends_with("-1700000000000.png"));
    }

    #[test]
    fn extension_falls_back() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(extension_for("image/svg+xml"), "svg");
        assert_eq!(extension_for("garbage"), "bin");
    }

    #[test]
    fn public_base_prefers_cdn_then_endpoint_then_aws() {
        assert_eq!(
            public_base("shop", "eu-west-1", Some("http://minio:9000/"), Some("https://cdn.example.com/")),
            "https://cdn.example.com"
        );
        assert_eq!(
            public_base("shop", "eu-west-1", Some("http://minio:9000/"), None),
            "http://minio:9000/shop"
        );
        assert_eq!(
            public_base("shop", "eu-west-1", None, None),
            "https://shop.s3.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn key_resolves_from_public_or_raw_url() {
        let base = "https://shop.s3.eu-west-1.amazonaws.com";
        assert_eq!(
            key_from_url(base, "https://shop.s3.eu-west-1.amazonaws.com/banners/ab-1.png").as_deref(),
            Some("banners/ab-1.png")
        );
        assert_eq!(
            key_from_url(base, "https://elsewhere.net/categories/x.jpg").as_deref(),
            Some("categories/x.jpg")
        );
        assert_eq!(key_from_url(base, "not a url"), None);
        assert_eq!(key_from_url(base, base), None);
    }

    #[test]
    fn missing_credentials_disable_uploads() {
        let storage = ObjectStorage::new(&StorageConfig {
            bucket: Some("shop".into()),
            ..Default::default()
        });
        assert!(storage.bucket.is_none());
    }

    #[tokio::test]
    async fn upload_without_bucket_is_rejected() {
        let storage = ObjectStorage::new(&StorageConfig::default());
        let err = storage
            .upload(Bytes::from_static(b"png"), "image/png", "products")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotConfigured));
    }
}

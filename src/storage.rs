use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;

use crate::config::StorageConfig;

/// Where uploaded images live. Keys are relative, e.g. `images/ab12_bun.jpg`.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// Path or absolute URL clients fetch `key` from.
    fn public_path(&self, key: &str) -> String;
    /// Inverse of `public_path`; `None` for paths this backend did not hand out.
    fn key_for(&self, public_path: &str) -> Option<String>;
}

pub async fn from_config(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageClient>> {
    Ok(match config {
        StorageConfig::Local { root } => Arc::new(LocalStorage::new(root.clone())),
        StorageConfig::S3 {
            endpoint,
            bucket,
            access_key,
            secret_key,
            region,
            public_url,
        } => Arc::new(
            Storage::new(endpoint, bucket, access_key, secret_key, region, public_url).await?,
        ),
    })
}

/// Files under a local directory, served back by the app under `/static`.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

const LOCAL_PREFIX: &str = "/static/";

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !key.split('/').any(|part| part == ".." || part.is_empty()),
            "invalid storage key {key:?}"
        );
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_of(key)?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
        Ok(())
    }

    fn public_path(&self, key: &str) -> String {
        format!("{LOCAL_PREFIX}{key}")
    }

    fn key_for(&self, public_path: &str) -> Option<String> {
        public_path.strip_prefix(LOCAL_PREFIX).map(str::to_string)
    }
}

/// S3-compatible bucket (MinIO, AWS) with a public read URL.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl Storage {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        public_url: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .endpoint_url(endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: bucket.to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    fn public_path(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    fn key_for(&self, public_path: &str) -> Option<String> {
        public_path
            .strip_prefix(&self.public_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }
}

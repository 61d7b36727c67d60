//! Cloud Storage JSON API: whole-object download and upload.

use async_trait::async_trait;
use coursecal_core::CourseCalResult;
use coursecal_core::services::BlobStore;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use crate::client::{GoogleClient, endpoint};

const SERVICE: &str = "storage";

pub struct GoogleStorage {
    client: GoogleClient,
    base_url: String,
    upload_url: String,
}

impl GoogleStorage {
    pub fn new(client: GoogleClient, base_url: impl Into<String>, upload_url: impl Into<String>) -> Self {
        GoogleStorage {
            client,
            base_url: base_url.into(),
            upload_url: upload_url.into(),
        }
    }
}

#[async_trait]
impl BlobStore for GoogleStorage {
    #[instrument(skip(self))]
    async fn get(&self, bucket: &str, name: &str) -> CourseCalResult<Option<Vec<u8>>> {
        let url = endpoint(&self.base_url, &["b", bucket, "o", name])?;
        let request = self.client.http().get(url).query(&[("alt", "media")]);

        let response = self
            .client
            .execute(SERVICE, request, &[StatusCode::NOT_FOUND])
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Object not found");
            return Ok(None);
        }

        let bytes = response.bytes().await.map_err(crate::GoogleError::from)?;
        Ok(Some(bytes.to_vec()))
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, bucket: &str, name: &str, bytes: Vec<u8>, content_type: &str) -> CourseCalResult<()> {
        let url = endpoint(&self.upload_url, &["b", bucket, "o"])?;
        let request = self
            .client
            .http()
            .post(url)
            .query(&[("uploadType", "media"), ("name", name)])
            .header(CONTENT_TYPE, content_type)
            .body(bytes);

        self.client.execute(SERVICE, request, &[]).await?;
        Ok(())
    }
}

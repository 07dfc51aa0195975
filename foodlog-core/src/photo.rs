// Photo intake: turns a meal photo into ingredient lines via an external HTTP service

use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// What a photo shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoKind {
    /// A prepared dish; ingredients have to be guessed
    Dish,
    /// A printed ingredient list; ingredients can be read off
    Ingredients,
}

/// Recognition backend
#[async_trait]
pub trait PhotoIntake: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<PhotoKind>;

    async fn dish_to_ingredients(&self, image: &[u8]) -> Result<Vec<String>>;

    async fn ocr_ingredients(&self, image: &[u8]) -> Result<Vec<String>>;

    /// Classify, then run the matching extractor
    async fn extract_ingredients(&self, image: &[u8]) -> Result<Vec<String>> {
        match self.classify(image).await? {
            PhotoKind::Ingredients => self.ocr_ingredients(image).await,
            PhotoKind::Dish => self.dish_to_ingredients(image).await,
        }
    }
}

/// Used when no recognition service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct StubPhotoIntake;

#[async_trait]
impl PhotoIntake for StubPhotoIntake {
    async fn classify(&self, _image: &[u8]) -> Result<PhotoKind> {
        Ok(PhotoKind::Dish)
    }

    async fn dish_to_ingredients(&self, _image: &[u8]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn ocr_ingredients(&self, _image: &[u8]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub struct PhotoIntakeConfig {
    pub url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Client for the recognition service.
///
/// Image bytes are POSTed to `<url>/classify`, `<url>/dish` and `<url>/ocr`;
/// each endpoint answers with a JSON object.
#[derive(Debug, Clone)]
pub struct HttpPhotoIntake {
    config: PhotoIntakeConfig,
    client: Client,
}

impl HttpPhotoIntake {
    pub fn new(config: PhotoIntakeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpPhotoIntake { config, client })
    }

    async fn post(&self, endpoint: &str, image: &[u8]) -> Result<Value> {
        let url = format!("{}/{}", self.config.url.trim_end_matches('/'), endpoint);

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec());
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Photo intake request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(eyre!("Photo intake returned {}: {}", status, body));
        }

        let payload: Value = response
            .json()
            .await
            .context("Failed to parse photo intake response")?;
        debug!(endpoint, "photo intake responded");
        Ok(payload)
    }

    /// `{"kind": "ingredients"}` means a label; anything else is a dish
    pub fn parse_kind(payload: &Value) -> PhotoKind {
        match payload.get("kind").and_then(Value::as_str) {
            Some("ingredients") => PhotoKind::Ingredients,
            _ => PhotoKind::Dish,
        }
    }

    /// `{"ingredients": [...]}`: items are stringified and trimmed, blanks dropped
    pub fn parse_ingredients(payload: &Value) -> Vec<String> {
        let Some(items) = payload.get("ingredients").and_then(Value::as_array) else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[async_trait]
impl PhotoIntake for HttpPhotoIntake {
    async fn classify(&self, image: &[u8]) -> Result<PhotoKind> {
        Ok(Self::parse_kind(&self.post("classify", image).await?))
    }

    async fn dish_to_ingredients(&self, image: &[u8]) -> Result<Vec<String>> {
        Ok(Self::parse_ingredients(&self.post("dish", image).await?))
    }

    async fn ocr_ingredients(&self, image: &[u8]) -> Result<Vec<String>> {
        Ok(Self::parse_ingredients(&self.post("ocr", image).await?))
    }
}

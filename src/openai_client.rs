use crate::error::{ViewerError, ViewerResult};
use crate::image_service::DisplayImage;
use crate::validation::{ApiKeyValidator, SourceImageValidator, Validator};
use base64::{Engine as _, engine::general_purpose};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, error, info};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com";
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const EDIT_MODEL: &str = "gpt-image-1";
pub const EDIT_SIZE: &str = "1024x1024";
pub const CARTOON_PROMPT: &str = "Transform this flag into a playful cartoon illustration";

/// Where the API key comes from. Resolved on every call, so a key exported
/// after startup is still picked up.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Env(String),
    Explicit(String),
}

impl CredentialSource {
    pub fn openai_env() -> Self {
        CredentialSource::Env(OPENAI_API_KEY_VAR.to_string())
    }

    pub fn resolve(&self) -> ViewerResult<String> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Resolves through `lookup` instead of the process environment.
    pub fn resolve_with<L>(&self, lookup: L) -> ViewerResult<String>
    where
        L: Fn(&str) -> Option<String>,
    {
        let raw = match self {
            CredentialSource::Explicit(key) => key.clone(),
            CredentialSource::Env(var) => lookup(var).ok_or_else(|| {
                ViewerError::ConfigurationError(format!("{} environment variable not set", var))
            })?,
        };
        let key = raw.trim();
        ApiKeyValidator.validate(key)?;
        Ok(key.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ImageEditResponse {
    data: Option<Vec<ImageEditData>>,
}

#[derive(Debug, Deserialize)]
struct ImageEditData {
    b64_json: Option<String>,
}

/// Parts are added in the order the edit endpoint documents them. Every
/// `Form` draws its own random boundary.
pub fn build_edit_form(source: &[u8], prompt: &str) -> ViewerResult<Form> {
    let image_part = Part::bytes(source.to_vec())
        .file_name("flag.png")
        .mime_str("image/png")?;

    Ok(Form::new()
        .text("model", EDIT_MODEL)
        .text("prompt", prompt.to_string())
        .part("image[]", image_part)
        .text("size", EDIT_SIZE))
}

pub struct OpenAiImageClient {
    client: reqwest::Client,
    credentials: CredentialSource,
    base_url: String,
}

impl OpenAiImageClient {
    pub fn new(credentials: CredentialSource) -> ViewerResult<Self> {
        Self::with_base_url(credentials, DEFAULT_OPENAI_API_BASE)
    }

    pub fn with_base_url(
        credentials: CredentialSource,
        base_url: impl Into<String>,
    ) -> ViewerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            credentials,
            base_url: base_url.into(),
        })
    }

    pub async fn cartoonize(&self, source: &[u8], prompt: &str) -> ViewerResult<DisplayImage> {
        SourceImageValidator.validate(source)?;
        let api_key = self.credentials.resolve()?;

        let form = build_edit_form(source, prompt)?;
        let url = format!("{}/v1/images/edits", self.base_url.trim_end_matches('/'));
        debug!("Posting {} byte flag to {}", source.len(), url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send request to image edit API: {}", e);
                ViewerError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Image edit API returned error status {}: {}", status, error_text);
            return Err(ViewerError::RemoteApiError {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let response_text = response.text().await?;
        let parsed: ImageEditResponse = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse image edit response as JSON: {}", e);
            ViewerError::MalformedData(format!("Image edit response is not valid JSON: {}", e))
        })?;

        let b64 = parsed
            .data
            .and_then(|data| data.into_iter().next())
            .and_then(|item| item.b64_json)
            .ok_or_else(|| {
                ViewerError::MalformedData("Image edit response has no data[0].b64_json".to_string())
            })?;

        let image_bytes = general_purpose::STANDARD.decode(b64.trim())?;
        let image = DisplayImage::decode(image_bytes)?;
        info!("Received edited image {}x{}", image.width(), image.height());
        Ok(image)
    }
}

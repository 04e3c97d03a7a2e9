use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{AssistClient, AssistError, AssistRequest};

/// Blocking client for a JSON assist gateway.
///
/// The gateway receives `{"instructions", "image": {"mime_type", "data"}}` with the image
/// base64 encoded and answers `{"text"}`. HTTP 429 is reported as [`AssistError::RateLimited`].
/// Must be called from a blocking context (e.g. `tokio::task::spawn_blocking`); the inner
/// client is built on the first call for the same reason.
pub struct HttpAssistClient {
    client: OnceLock<Client>,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct GatewayRequest<'a> {
    instructions: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<GatewayImage<'a>>,
}

#[derive(Serialize)]
struct GatewayImage<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    text: Option<String>,
}

impl HttpAssistClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: OnceLock::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    fn client(&self) -> &Client {
        self.client.get_or_init(Client::new)
    }
}

impl std::fmt::Debug for HttpAssistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAssistClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AssistClient for HttpAssistClient {
    fn generate(&self, request: &AssistRequest<'_>) -> Result<String, AssistError> {
        let body = GatewayRequest {
            instructions: &request.instructions,
            image: request.image.map(|image| GatewayImage {
                mime_type: &image.mime_type,
                data: STANDARD.encode(&image.data),
            }),
        };

        let mut builder = self.client().post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .map_err(|err| AssistError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AssistError::RateLimited);
        }
        if !status.is_success() {
            return Err(AssistError::Unavailable(format!("gateway answered {status}")));
        }

        let payload: GatewayResponse = response
            .json()
            .map_err(|err| AssistError::Unavailable(err.to_string()))?;

        match payload.text.map(|text| text.trim().to_string()) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(AssistError::EmptyResponse),
        }
    }
}

use async_trait::async_trait;
use base64::prelude::{Engine, BASE64_STANDARD};
use cards_core::{CardError, ImageGenerator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ENGINE_ID: &str = "stable-diffusion-xl-1024-v1-0";

// Generation parameters tuned for the card art style.
const CFG_SCALE: u32 = 7;
const HEIGHT: u32 = 832;
const WIDTH: u32 = 1216;
const SAMPLES: u32 = 1;
const STEPS: u32 = 40;

/// Image backend over the Stability AI text-to-image API.
#[derive(Clone)]
pub struct StabilityClient {
    client: reqwest::Client,
    api_key: String,
}

impl StabilityClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, api_key }
    }
}

#[async_trait]
impl ImageGenerator for StabilityClient {
    async fn generate_image(&self, description: &str) -> Result<Vec<u8>, CardError> {
        let url = format!(
            "https://api.stability.ai/v1/generation/{ENGINE_ID}/text-to-image"
        );
        let request = TextToImageRequest {
            text_prompts: vec![TextPrompt {
                text: image_prompt(description),
            }],
            cfg_scale: CFG_SCALE,
            height: HEIGHT,
            width: WIDTH,
            samples: SAMPLES,
            steps: STEPS,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CardError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CardError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let generation: GenerationResponse = response
            .json()
            .await
            .map_err(|e| CardError::ApiError(e.to_string()))?;

        let artifact = generation.artifacts.into_iter().next().ok_or_else(|| {
            CardError::MalformedResponse("generation returned no artifacts".to_string())
        })?;

        let bytes = BASE64_STANDARD
            .decode(artifact.base64)
            .map_err(|e| CardError::MalformedResponse(format!("bad artifact payload: {e}")))?;
        tracing::debug!("generated image ({} bytes)", bytes.len());
        Ok(bytes)
    }
}

fn image_prompt(description: &str) -> String {
    format!(
        "An anime-style drawing of a Pokemon artstation creature that is {description}. \
         The art style is 2D, semi-watercolor in a Pokemon-style theme, detailed and \
         energetic on a plain white background."
    )
}

#[derive(Debug, Serialize)]
struct TextToImageRequest {
    text_prompts: Vec<TextPrompt>,
    cfg_scale: u32,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
}

#[derive(Debug, Serialize)]
struct TextPrompt {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    base64: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_the_fixed_generation_parameters() {
        let request = TextToImageRequest {
            text_prompts: vec![TextPrompt {
                text: image_prompt("a crackling fox"),
            }],
            cfg_scale: CFG_SCALE,
            height: HEIGHT,
            width: WIDTH,
            samples: SAMPLES,
            steps: STEPS,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["cfg_scale"], 7);
        assert_eq!(json["height"], 832);
        assert_eq!(json["width"], 1216);
        assert_eq!(json["samples"], 1);
        assert_eq!(json["steps"], 40);
        assert!(json["text_prompts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("a crackling fox"));
    }

    #[test]
    fn artifact_payload_decodes_to_bytes() {
        let json = r#"{ "artifacts": [ { "base64": "aGVsbG8=" } ] }"#;
        let generation: GenerationResponse = serde_json::from_str(json).unwrap();
        let bytes = BASE64_STANDARD
            .decode(&generation.artifacts[0].base64)
            .unwrap();
        assert_eq!(bytes, b"hello");
    }
}

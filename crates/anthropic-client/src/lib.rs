use async_trait::async_trait;
use cards_core::{CardError, CompanyMetrics, CreatureGenerator, CreatureProfile};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-3-haiku-20240307";
const MAX_TOKENS: u32 = 1024;

/// Creature-description backend over the Anthropic Messages API.
///
/// The conversation is primed with an assistant turn holding a lone `{`, so
/// the model continues a JSON object rather than prose; the reply is parsed
/// back through a typed schema and rejected as `MalformedResponse` when it
/// doesn't hold up.
#[derive(Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, api_key }
    }
}

#[async_trait]
impl CreatureGenerator for AnthropicClient {
    async fn generate_creature(
        &self,
        company: &CompanyMetrics,
    ) -> Result<CreatureProfile, CardError> {
        let request = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            messages: vec![
                Message {
                    role: "user",
                    content: creature_prompt(company),
                },
                // Priming token: the reply continues this JSON object.
                Message {
                    role: "assistant",
                    content: "{".to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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

        let reply: MessagesResponse = response
            .json()
            .await
            .map_err(|e| CardError::ApiError(e.to_string()))?;

        let text = reply
            .content
            .first()
            .map(|block| block.text.as_str())
            .ok_or_else(|| {
                CardError::MalformedResponse("reply carried no content blocks".to_string())
            })?;

        let profile = parse_creature_reply(text)?;
        tracing::debug!("[{}] creature generated: {}", company.ticker, profile.name);
        Ok(profile)
    }
}

fn creature_prompt(company: &CompanyMetrics) -> String {
    format!(
        "Given the company name and description, generate a description of a \
         Pokemon-like creature that represents the company. The creature should \
         have a name (similar to a Pokemon name) and a description. Its physical \
         features should directly relate to the company's business or industry \
         (for example, an electric company may have lightning features, a trash \
         company may have garbage-themed features) and incorporate the company's \
         brand colors. The description should focus solely on physical appearance \
         and include anthropomorphic features (including eyes). Do not include \
         the creature name in the description.\n\
         Below is an example for Intel Corporation:\n\n\
         Example:\n\
         {{\n\
             \"name\": \"Intellichip\",\n\
             \"description\": \"A Pokemon creature with a sleek, angular body in \
         blue and silver, with circuit patterns across its form. Its sharp eyes \
         glow soft blue, symbolizing data processing intelligence. With thin, \
         wiry limbs and connector-like digits, it interfaces with computer \
         hardware. It thrives in high-tech environments, communicating in binary \
         pulses.\"\n\
         }}\n\n\
         Now, generate a creature for:\n\
         Company name: {}\n\
         Description: {}\n\
         Ensure the response is valid JSON.",
        company.company_name.as_deref().unwrap_or(&company.ticker),
        company.description.as_deref().unwrap_or("(no description available)"),
    )
}

/// Reattach the priming brace and validate the reply against the expected
/// schema. Anything that doesn't parse, or parses to blank fields, is a
/// `MalformedResponse` for the caller to skip.
fn parse_creature_reply(text: &str) -> Result<CreatureProfile, CardError> {
    let json = format!("{{{}", text.replace('\n', ""));

    let reply: CreatureReply = serde_json::from_str(&json)
        .map_err(|e| CardError::MalformedResponse(format!("{e}: {json}")))?;

    if reply.name.trim().is_empty() || reply.description.trim().is_empty() {
        return Err(CardError::MalformedResponse(
            "creature reply has a blank name or description".to_string(),
        ));
    }

    Ok(CreatureProfile {
        name: reply.name,
        description: reply.description,
        environment: reply.environment.filter(|env| !env.trim().is_empty()),
    })
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: &'static str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CreatureReply {
    name: String,
    description: String,
    #[serde(default)]
    environment: Option<String>,
}

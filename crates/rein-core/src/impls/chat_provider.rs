//! Generative provider over an OpenAI-compatible chat completions endpoint.
//!
//! Model output is free text. [`extract_decision`] pulls the first well-formed
//! JSON object out of it and falls back to the safe intent pair when nothing
//! usable is found. Only transport-level failures become errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::domain::decision::{Decision, DecisionInput, DecisionSource};
use crate::error::ProviderError;
use crate::ports::DecisionProvider;

const NO_REASONING: &str = "No reasoning provided";

const SYSTEM_PROMPT: &str = r#"You steer a game character through high-level intents.
A mod on the game side executes them; you decide what to do next.

Reply ONLY with JSON of this shape:
{"commands": ["VERB:args", ...], "reasoning": "one or two sentences"}

Give 1 to 5 commands, most important first.

Intents:
- FIND_AND_INTERACT:<chest|shrine|teleporter|shop>  go to the nearest target and use it
- GOTO:CANCEL                                       stop current navigation
- BUY_SHOP_ITEM:<item name>                         buy from a shop
- STRATEGY:<aggressive|defensive|balanced|support>  combat posture
- MODE:<roam|combat|follow|wait>                    movement behaviour

"Recent Action History" lists earlier intents with their status
(pending, success, interrupted, failed). Retry interrupted or stuck actions.
A user directive, when present, takes priority over everything but survival."#;

pub struct ChatProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatProvider {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        info!(model = %config.model, endpoint = %config.endpoint, "chat provider ready");
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Build from config, reading the key from `api_key_env`. `None` when
    /// disabled or when no key is set.
    pub fn from_config(config: &ProviderConfig) -> Result<Option<Self>, ProviderError> {
        if !config.enabled {
            return Ok(None);
        }
        match config.api_key() {
            Some(key) => Self::new(config, key).map(Some),
            None => {
                info!(env = %config.api_key_env, "no API key set, generative provider disabled");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl DecisionProvider for ChatProvider {
    fn name(&self) -> &str {
        "chat"
    }

    async fn decide(&self, input: &DecisionInput) -> Result<Decision, ProviderError> {
        let user = render_user_message(input);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ProviderError::EmptyResponse)?;
        debug!(reply = %text, "provider reply");

        Ok(extract_decision(&text))
    }
}

/// User turn: state summary, the last few intents, the directive.
pub fn render_user_message(input: &DecisionInput) -> String {
    let mut parts = vec![input.state_summary.clone()];
    if !input.recent_intents.is_empty() {
        let lines: Vec<String> = input
            .recent_intents
            .iter()
            .map(|c| format!("  - {c}"))
            .collect();
        parts.push(format!("\nRecent commands sent to mod:\n{}", lines.join("\n")));
    }
    if let Some(directive) = &input.directive {
        parts.push(format!("\nUser directive: {directive}"));
    }
    parts.join("\n")
}

/// Turn free model text into a decision. Never fails.
pub fn extract_decision(text: &str) -> Decision {
    let object = first_json_object(text).unwrap_or_default();

    let intents = object
        .get("commands")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let rationale = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or(NO_REASONING);

    // Decision::new turns an empty list into the safe pair and caps the length
    Decision::new(intents, rationale, DecisionSource::Model)
}

/// The whole text as a JSON object, else the first `{` from which a complete
/// object parses.
fn first_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text.trim()) {
        return Some(map);
    }
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn clean_json_reply() {
        let d = extract_decision(
            r#"{"commands": ["FIND_AND_INTERACT:chest", "MODE:combat"], "reasoning": "loot first"}"#,
        );
        assert_eq!(d.intents(), &["FIND_AND_INTERACT:chest", "MODE:combat"]);
        assert_eq!(d.rationale, "loot first");
        assert_eq!(d.source, DecisionSource::Model);
    }

    #[test]
    fn json_embedded_in_prose() {
        let d = extract_decision(
            "Sure! Here is my plan {not json} and then:\n```json\n{\"commands\": [\"GOTO:CANCEL\"], \"reasoning\": \"stop\"}\n```\nGood luck {",
        );
        assert_eq!(d.intents(), &["GOTO:CANCEL"]);
        assert_eq!(d.rationale, "stop");
    }

    #[rstest]
    #[case("no structure at all")]
    #[case("{\"reasoning\": \"forgot the list\"")]
    #[case("")]
    fn unusable_text_falls_back_to_safe_pair(#[case] text: &str) {
        let d = extract_decision(text);
        assert_eq!(d.intents(), &["STRATEGY:balanced", "MODE:roam"]);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let d = extract_decision(r#"{"reasoning": "hmm"}"#);
        assert_eq!(d.intents(), &["STRATEGY:balanced", "MODE:roam"]);
        assert_eq!(d.rationale, "hmm");

        let d = extract_decision(r#"{"commands": ["MODE:wait"]}"#);
        assert_eq!(d.rationale, NO_REASONING);
    }

    #[test]
    fn more_than_five_intents_are_cut() {
        let d = extract_decision(
            r#"{"commands": ["MODE:a","MODE:b","MODE:c","MODE:d","MODE:e","MODE:f"], "reasoning": "x"}"#,
        );
        assert_eq!(d.intents().len(), 5);
    }

    #[test]
    fn user_message_includes_history_and_directive() {
        let recent = vec!["MODE:roam".to_string()];
        let input = DecisionInput::new("State:\n- Health: 90%", &recent, Some("find a shrine"));
        let text = render_user_message(&input);
        assert!(text.starts_with("State:"));
        assert!(text.contains("  - MODE:roam"));
        assert!(text.ends_with("User directive: find a shrine"));
    }

    #[test]
    fn disabled_or_keyless_config_yields_no_provider() {
        let cfg = ProviderConfig {
            enabled: false,
            ..ProviderConfig::default()
        };
        assert!(ChatProvider::from_config(&cfg).unwrap().is_none());

        let cfg = ProviderConfig {
            api_key_env: "REIN_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ProviderConfig::default()
        };
        assert!(ChatProvider::from_config(&cfg).unwrap().is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let cfg = ProviderConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..ProviderConfig::default()
        };
        let provider = ChatProvider::new(&cfg, "test-key".to_string()).unwrap();
        let input = DecisionInput::new("state", &[], None);
        let err = provider.decide(&input).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
    }
}

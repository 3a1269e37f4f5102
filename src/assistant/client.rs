use crate::config::BackendConfig;
use crate::messages::{Message, Role};
use crate::{NovaError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Reply used when the service answers with an empty body
const EMPTY_REPLY_FALLBACK: &str = "I'm sorry, I couldn't process that.";

/// A conversational backend that turns an utterance (plus optional history)
/// into a textual reply.
///
/// Implementations must never leave a call half-applied: a call either
/// yields a reply or a classified error, exactly once, with no retry.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Request a reply for `utterance`, with `history` as prior context.
    ///
    /// `utterance` must be non-empty after trimming.
    async fn reply(&self, history: &[Message], utterance: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

/// HTTP client for an OpenAI-style chat-completion service.
///
/// All transport and decode failures are logged once with a diagnostic and
/// mapped to `BackendFailure`; a timeout gets its own error kind. The caller
/// never sees a raw transport error.
pub struct ChatClient {
    client: reqwest::Client,
    config: BackendConfig,
    context_window: usize,
}

impl ChatClient {
    pub fn new(config: BackendConfig, context_window: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NovaError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            context_window,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

/// Assemble the wire messages: system instruction, a window of prior
/// history, then the latest utterance. A window of zero sends only the
/// latest utterance.
fn build_messages(
    system_prompt: &str,
    history: &[Message],
    utterance: &str,
    window: usize,
) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(window + 2);
    messages.push(WireMessage {
        role: "system".to_string(),
        content: system_prompt.to_string(),
    });

    let tail_start = history.len().saturating_sub(window);
    for msg in &history[tail_start..] {
        messages.push(WireMessage {
            role: match msg.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: msg.content.clone(),
        });
    }

    messages.push(WireMessage {
        role: "user".to_string(),
        content: utterance.to_string(),
    });

    messages
}

#[async_trait]
impl AssistantBackend for ChatClient {
    async fn reply(&self, history: &[Message], utterance: &str) -> Result<String> {
        if utterance.trim().is_empty() {
            return Err(NovaError::BackendFailure("empty utterance".to_string()));
        }

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: build_messages(
                &self.config.system_prompt,
                history,
                utterance,
                self.context_window,
            ),
        };

        debug!(
            "Requesting reply ({} wire messages, model {})",
            request.messages.len(),
            request.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("Backend request timed out: {}", e);
                    NovaError::BackendTimeout(self.config.timeout_secs)
                } else {
                    error!("Backend request failed: {}", e);
                    NovaError::BackendFailure(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Backend returned {}: {}", status, body);
            return Err(NovaError::BackendFailure(format!("status {}", status)));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!("Backend response did not parse: {}", e);
            NovaError::BackendFailure(format!("bad response: {}", e))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            Ok(EMPTY_REPLY_FALLBACK.to_string())
        } else {
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SYSTEM_PROMPT;

    fn history(turns: &[(&str, Role)]) -> Vec<Message> {
        turns
            .iter()
            .map(|(text, role)| Message::new(*role, *text))
            .collect()
    }

    #[test]
    fn test_zero_window_sends_only_latest_utterance() {
        let history = history(&[("earlier", Role::User), ("reply", Role::Assistant)]);
        let messages = build_messages(DEFAULT_SYSTEM_PROMPT, &history, "latest", 0);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "latest");
    }

    #[test]
    fn test_window_takes_most_recent_history() {
        let history = history(&[
            ("one", Role::User),
            ("two", Role::Assistant),
            ("three", Role::User),
            ("four", Role::Assistant),
        ]);
        let messages = build_messages("sys", &history, "five", 2);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "three");
        assert_eq!(messages[2].content, "four");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].content, "five");
    }

    #[test]
    fn test_window_larger_than_history() {
        let history = history(&[("only", Role::User)]);
        let messages = build_messages("sys", &history, "next", 50);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "only");
    }

    #[test]
    fn test_request_serializes() {
        let request = ChatRequest {
            model: "test-model".to_string(),
            messages: build_messages("sys", &[], "hello", 0),
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "test-model");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[tokio::test]
    async fn test_empty_utterance_rejected() {
        let config = BackendConfig {
            api_key: "key".to_string(),
            base_url: "http://localhost:1".to_string(),
            model: "m".to_string(),
            system_prompt: "sys".to_string(),
            timeout_secs: 1,
        };
        let client = ChatClient::new(config, 0).unwrap();
        let result = client.reply(&[], "   ").await;
        assert!(matches!(result, Err(NovaError::BackendFailure(_))));
    }
}

use std::collections::HashMap;

use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};
use tokio::sync::RwLock;

use super::responder::{
    BoxFuture, CompletionClientSnafu, CompletionFailedSnafu, DEFAULT_COMPLETIONS_ENDPOINT,
    DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, EmptyReplySnafu, MissingApiKeySnafu,
    ReplyRequest, Responder, ResponderConfig, ResponderError, ResponderResult,
};

pub const RIG_RESPONDER_ID: &str = "rig";

/// Speaker of one remembered turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub content: String,
}

impl HistoryTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// OpenAI-compatible completion backend that remembers every session's exchanges,
/// so each prompt is sent as system prompt + prior turns + the new user turn.
pub struct RigResponder {
    config: ResponderConfig,
    histories: RwLock<HashMap<String, Vec<HistoryTurn>>>,
}

impl RigResponder {
    pub fn new(mut config: ResponderConfig) -> ResponderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-responder-new",
                responder: RIG_RESPONDER_ID,
            }
        );

        // The chat-endpoint default is meaningless for a completions client.
        if config.endpoint.is_empty() || config.endpoint == DEFAULT_ENDPOINT {
            config.endpoint = DEFAULT_COMPLETIONS_ENDPOINT.to_string();
        }
        if config.model.is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }
        if config.system_prompt.trim().is_empty() {
            config.system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
        }

        Ok(Self {
            config,
            histories: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    pub async fn history(&self, session_id: &str) -> Vec<HistoryTurn> {
        self.histories
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn clear_history(&self, session_id: &str) {
        self.histories.write().await.remove(session_id);
    }

    /// Remembers a completed exchange; failed prompts are never recorded.
    pub async fn record_exchange(&self, session_id: &str, prompt: &str, reply: &str) {
        let mut histories = self.histories.write().await;
        let turns = histories.entry(session_id.to_string()).or_default();
        turns.push(HistoryTurn::new(TurnRole::User, prompt));
        turns.push(HistoryTurn::new(TurnRole::Assistant, reply));
    }

    fn build_client(config: &ResponderConfig) -> ResponderResult<openai::Client> {
        openai::Client::builder()
            .api_key(config.api_key.as_str())
            .base_url(config.endpoint.as_str())
            .build()
            .context(CompletionClientSnafu {
                stage: "build-client",
            })
    }

    fn to_rig_message(turn: &HistoryTurn) -> RigMessage {
        match turn.role {
            TurnRole::User => RigMessage::user(turn.content.clone()),
            TurnRole::Assistant => RigMessage::assistant(turn.content.clone()),
        }
    }

    async fn complete(&self, request: ReplyRequest) -> ResponderResult<String> {
        let history = self.history(&request.session_id).await;
        let client = Self::build_client(&self.config)?;
        let model = client.completion_model(self.config.model.clone());

        let messages = history.iter().map(Self::to_rig_message).collect::<Vec<_>>();
        tracing::debug!(
            session_id = %request.session_id,
            model = %self.config.model,
            history_turns = messages.len(),
            "sending completion request"
        );

        let mut stream = model
            .completion_request(RigMessage::user(request.message.clone()))
            .messages(messages)
            .preamble(self.config.system_prompt.clone())
            .stream()
            .await
            .context(CompletionFailedSnafu {
                stage: "open-stream",
            })?;

        let mut reply = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamedAssistantContent::Text(text)) => reply.push_str(&text.text),
                // Reasoning, tool calls and the final usage frame carry no reply text.
                Ok(_) => {}
                Err(source) => {
                    tracing::warn!(
                        session_id = %request.session_id,
                        error = %source,
                        "completion stream emitted an error chunk"
                    );
                    return Err(ResponderError::CompletionFailed {
                        stage: "stream-chunk",
                        source,
                    });
                }
            }
        }

        if reply.trim().is_empty() {
            return EmptyReplySnafu {
                stage: "collect-reply",
            }
            .fail();
        }

        self.record_exchange(&request.session_id, &request.message, &reply)
            .await;
        Ok(reply)
    }
}

impl Responder for RigResponder {
    fn id(&self) -> &str {
        RIG_RESPONDER_ID
    }

    fn respond<'a>(&'a self, request: ReplyRequest) -> BoxFuture<'a, ResponderResult<String>> {
        Box::pin(self.complete(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::ResponderKind;

    fn config() -> ResponderConfig {
        ResponderConfig::new(ResponderKind::Rig, "").with_api_key("test-key")
    }

    #[test]
    fn api_key_is_required() {
        let error = RigResponder::new(ResponderConfig::new(ResponderKind::Rig, ""))
            .err()
            .expect("missing key must fail");

        assert!(matches!(error, ResponderError::MissingApiKey { .. }));
    }

    #[test]
    fn blank_settings_fall_back_to_completion_defaults() {
        let responder = RigResponder::new(config().with_model("").with_system_prompt(" "))
            .expect("responder");

        assert_eq!(responder.config().endpoint, DEFAULT_COMPLETIONS_ENDPOINT);
        assert_eq!(responder.config().model, DEFAULT_MODEL);
        assert_eq!(responder.config().system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn histories_are_kept_per_session() {
        let responder = RigResponder::new(config()).expect("responder");

        responder.record_exchange("1", "Hello", "Hi there").await;
        responder
            .record_exchange("1", "She go to school", "She goes to school")
            .await;
        responder.record_exchange("2", "Break a leg?", "Good luck!").await;

        let first = responder.history("1").await;
        assert_eq!(first.len(), 4);
        assert_eq!(first[0], HistoryTurn::new(TurnRole::User, "Hello"));
        assert_eq!(
            first[3],
            HistoryTurn::new(TurnRole::Assistant, "She goes to school")
        );
        assert_eq!(responder.history("2").await.len(), 2);

        responder.clear_history("1").await;
        assert!(responder.history("1").await.is_empty());
        assert_eq!(responder.history("2").await.len(), 2);
    }
}

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/api/chat";
pub const DEFAULT_COMPLETIONS_ENDPOINT: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_SIMULATED_DELAY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are 'Unolingo', a friendly and helpful English \
tutor. Hold a natural conversation. If the user makes a grammar mistake, correct it and briefly \
explain why. Always answer in English unless the user explicitly asks for a translation.";

/// Which backend answers prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderKind {
    /// Remote chat endpoint speaking the `{ message, sessionId }` contract.
    #[default]
    Http,
    /// In-process OpenAI-compatible chat completions.
    Rig,
    /// Offline acknowledgement after a fixed delay.
    Simulated,
}

impl ResponderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Rig => "rig",
            Self::Simulated => "simulated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderConfig {
    pub kind: ResponderKind,
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub simulated_delay: Duration,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            kind: ResponderKind::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            simulated_delay: DEFAULT_SIMULATED_DELAY,
        }
    }
}

impl ResponderConfig {
    pub fn new(kind: ResponderKind, endpoint: impl Into<String>) -> Self {
        Self {
            kind,
            endpoint: endpoint.into().trim().to_string(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into().trim().to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into().trim().to_string();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_simulated_delay(mut self, delay: Duration) -> Self {
        self.simulated_delay = delay;
        self
    }
}

/// Body of one request to the remote responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub message: String,
    pub session_id: String,
}

impl ReplyRequest {
    pub fn new(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.into(),
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ResponderResult<T> = Result<T, ResponderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResponderError {
    #[snafu(display("missing API key for responder '{responder}'"))]
    MissingApiKey {
        stage: &'static str,
        responder: &'static str,
    },
    #[snafu(display("no endpoint configured for responder '{responder}'"))]
    MissingEndpoint {
        stage: &'static str,
        responder: &'static str,
    },
    #[snafu(display("failed to build HTTP client: {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("could not reach the assistant: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to read the assistant's reply: {source}"))]
    ReadReply {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("the assistant returned status {status}"))]
    ReplyStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("completion client failed on `{stage}`: {source}"))]
    CompletionClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completion failed on `{stage}`: {source}"))]
    CompletionFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("the assistant returned no answer"))]
    EmptyReply { stage: &'static str },
}

/// Maps a prompt and session identifier to one reply.
pub trait Responder: Send + Sync {
    fn id(&self) -> &str;
    fn respond<'a>(&'a self, request: ReplyRequest) -> BoxFuture<'a, ResponderResult<String>>;
}

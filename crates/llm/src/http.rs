use snafu::{ResultExt, ensure};

use super::responder::{
    BoxFuture, BuildHttpClientSnafu, MissingEndpointSnafu, ReadReplySnafu, ReplyRequest,
    ReplyStatusSnafu, Responder, ResponderConfig, ResponderResult, TransportSnafu,
};

pub const HTTP_RESPONDER_ID: &str = "http";

/// Posts `{ message, sessionId }` to a chat endpoint and treats the raw body as the reply.
#[derive(Debug, Clone)]
pub struct HttpResponder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpResponder {
    pub fn new(config: &ResponderConfig) -> ResponderResult<Self> {
        let endpoint = config.endpoint.trim().to_string();
        ensure!(
            !endpoint.is_empty(),
            MissingEndpointSnafu {
                stage: "http-responder-new",
                responder: HTTP_RESPONDER_ID,
            }
        );

        let client = reqwest::Client::builder()
            .build()
            .context(BuildHttpClientSnafu {
                stage: "http-responder-build-client",
            })?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, request: ReplyRequest) -> ResponderResult<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context(TransportSnafu {
                stage: "send-reply-request",
            })?;

        let status = response.status();
        let body = response.text().await.context(ReadReplySnafu {
            stage: "read-reply-body",
        })?;

        if !status.is_success() {
            tracing::warn!(
                endpoint = %self.endpoint,
                session_id = %request.session_id,
                status = status.as_u16(),
                body_len = body.len(),
                "responder returned a non-success status"
            );
            return ReplyStatusSnafu {
                stage: "reply-http-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        Ok(body)
    }
}

impl Responder for HttpResponder {
    fn id(&self) -> &str {
        HTTP_RESPONDER_ID
    }

    fn respond<'a>(&'a self, request: ReplyRequest) -> BoxFuture<'a, ResponderResult<String>> {
        Box::pin(self.post(request))
    }
}

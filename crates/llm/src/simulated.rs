use std::time::Duration;

use super::responder::{BoxFuture, ReplyRequest, Responder, ResponderResult};

pub const SIMULATED_RESPONDER_ID: &str = "simulated";

/// Offline responder: waits, then acknowledges the prompt.
#[derive(Debug, Clone)]
pub struct SimulatedResponder {
    delay: Duration,
}

impl SimulatedResponder {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn reply_for(prompt: &str) -> String {
        format!("Acknowledged: \"{prompt}\". This is a simulated response from the assistant.")
    }
}

impl Responder for SimulatedResponder {
    fn id(&self) -> &str {
        SIMULATED_RESPONDER_ID
    }

    fn respond<'a>(&'a self, request: ReplyRequest) -> BoxFuture<'a, ResponderResult<String>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(Self::reply_for(&request.message))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn reply_arrives_after_the_configured_delay() {
        let responder = SimulatedResponder::new(Duration::from_secs(1));
        let started = tokio::time::Instant::now();

        let reply = responder
            .respond(ReplyRequest::new("thorough", "7"))
            .await
            .expect("reply");

        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(
            reply,
            "Acknowledged: \"thorough\". This is a simulated response from the assistant."
        );
    }
}

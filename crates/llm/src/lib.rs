use std::sync::Arc;

mod http;
mod responder;
mod rig_adapter;
mod simulated;

pub use http::{HTTP_RESPONDER_ID, HttpResponder};
pub use responder::{
    BoxFuture, DEFAULT_COMPLETIONS_ENDPOINT, DEFAULT_ENDPOINT, DEFAULT_MODEL,
    DEFAULT_SIMULATED_DELAY, DEFAULT_SYSTEM_PROMPT, ReplyRequest, Responder, ResponderConfig,
    ResponderError, ResponderKind, ResponderResult,
};
pub use rig_adapter::{HistoryTurn, RIG_RESPONDER_ID, RigResponder, TurnRole};
pub use simulated::{SIMULATED_RESPONDER_ID, SimulatedResponder};

pub fn create_responder(config: ResponderConfig) -> ResponderResult<Arc<dyn Responder>> {
    tracing::info!(
        kind = config.kind.as_str(),
        endpoint = %config.endpoint,
        "creating responder"
    );

    match config.kind {
        ResponderKind::Http => Ok(Arc::new(HttpResponder::new(&config)?)),
        ResponderKind::Rig => Ok(Arc::new(RigResponder::new(config)?)),
        ResponderKind::Simulated => Ok(Arc::new(SimulatedResponder::new(config.simulated_delay))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_the_configured_kind() {
        let simulated = create_responder(ResponderConfig::new(ResponderKind::Simulated, ""))
            .expect("simulated");
        assert_eq!(simulated.id(), SIMULATED_RESPONDER_ID);

        let http = create_responder(ResponderConfig::default()).expect("http");
        assert_eq!(http.id(), HTTP_RESPONDER_ID);

        let rig = create_responder(ResponderConfig::new(ResponderKind::Rig, "").with_api_key("k"))
            .expect("rig");
        assert_eq!(rig.id(), RIG_RESPONDER_ID);
    }

    #[test]
    fn rig_without_key_is_a_configuration_error() {
        let result = create_responder(ResponderConfig::new(ResponderKind::Rig, ""));

        assert!(matches!(result, Err(ResponderError::MissingApiKey { .. })));
    }
}

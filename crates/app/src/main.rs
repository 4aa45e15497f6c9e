use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use unolingo_chat::{ChatClient, SendOutcome, SessionManager, SettingsStore};
use unolingo_llm::{Responder, ResponderConfig, SimulatedResponder, create_responder};
use unolingo_storage::{FileStore, KeyValueStore};

mod terminal;

use terminal::{
    Command, HELP, describe_outcome, parse_command, render_accepted, render_message,
    render_sessions, render_transcript,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings_store = SettingsStore::load();
    let settings = settings_store.settings();
    tracing::info!(config = %settings_store.config_path().display(), "settings loaded");

    let responder = build_responder(settings.to_responder_config());
    let slot: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(settings.data_dir()));
    let manager = SessionManager::load(slot, settings.manager_options());
    let client = ChatClient::new(manager, responder);

    println!("{}", render_transcript(&client.view().await));
    if let Err(error) = run(client).await {
        tracing::error!(error = %error, "terminal input failed");
    }
}

fn build_responder(config: ResponderConfig) -> Arc<dyn Responder> {
    match create_responder(config.clone()) {
        Ok(responder) => responder,
        Err(error) => {
            tracing::warn!(
                kind = config.kind.as_str(),
                error = %error,
                "responder unavailable, falling back to simulated replies"
            );
            Arc::new(SimulatedResponder::new(config.simulated_delay))
        }
    }
}

async fn run(client: ChatClient) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Send(text) => match client.submit(&text).await {
                Ok(ticket) => {
                    println!("{}", render_accepted(&ticket));
                    let client = client.clone();
                    tokio::spawn(async move {
                        let outcome = client.deliver(ticket).await;
                        report(&client, &outcome).await;
                    });
                }
                Err(rejection) => tracing::debug!(rejection = ?rejection, "send ignored"),
            },
            Command::NewChat => {
                client.new_chat().await;
                println!("{}", render_transcript(&client.view().await));
            }
            Command::List => println!("{}", render_sessions(&client.view().await)),
            Command::Open(position) => {
                let view = client.view().await;
                match view.sessions.get(position - 1) {
                    Some(summary) => {
                        client.select_session(Some(summary.id)).await;
                        println!("{}", render_transcript(&client.view().await));
                    }
                    None => println!("There is no chat number {position}."),
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Unknown(input) => println!("Unknown command {input}. Type /help."),
        }
    }

    Ok(())
}

async fn report(client: &ChatClient, outcome: &SendOutcome) {
    if let Some(status) = describe_outcome(outcome) {
        println!("{status}");
        return;
    }

    let session_id = match outcome {
        SendOutcome::Replied { session_id } | SendOutcome::Failed { session_id, .. } => *session_id,
        _ => return,
    };
    let manager = client.manager().lock().await;
    let last = manager
        .store()
        .get(session_id)
        .and_then(|session| session.messages.last());
    if let Some(message) = last {
        println!("{}", render_message(message));
    }
}

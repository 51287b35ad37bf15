use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use client::client::ChatClient;
use client::config::ClientConfig;
use client::state::ClientPhase;
use shared::collaborators::reply_generator::CannedReplyGenerator;
use shared::collaborators::text_filter::WordListFilter;
use shared::models::chat_session::PartnerKind;
use shared::models::identity::anonymous_identity;
use shared::repositories::session_repository::{SessionRepository, StoreSessionRepository};
use shared::repositories::waiting_pool_repository::StoreWaitingPoolRepository;
use shared::services::chat_service::{ChatConfig, ChatService};
use shared::services::matchmaking_service::{MatchConfig, MatchmakingService};
use shared::store::memory_store::MemoryStore;

/// Wires one client the way a real process would: its own repositories and
/// services, sharing nothing with the other client but the store.
fn build_client(label: &str, store: &Arc<MemoryStore>) -> Arc<ChatClient> {
    let sessions: Arc<dyn SessionRepository> =
        Arc::new(StoreSessionRepository::new(store.clone()));
    let pool = Arc::new(StoreWaitingPoolRepository::new(store.clone()));

    let matchmaking = MatchmakingService::new(
        sessions.clone(),
        pool,
        MatchConfig {
            fallback_wait: Duration::from_secs(5),
        },
    );
    let chat = ChatService::new(
        sessions.clone(),
        Arc::new(WordListFilter::new()),
        Arc::new(CannedReplyGenerator::new()),
        ChatConfig::default(),
    );

    let identity = format!("{}-{}", label, anonymous_identity());
    ChatClient::new(
        identity,
        matchmaking,
        chat,
        sessions,
        ClientConfig {
            search_delay_min: Duration::from_secs(2),
            search_delay_max: Duration::from_secs(3),
            ..ClientConfig::default()
        },
    )
}

async fn wait_for(client: &Arc<ChatClient>, want: ClientPhase) {
    let mut phases = client.phases();
    while client.phase() != want {
        if phases.changed().await.is_err() {
            return;
        }
    }
}

/// Two real clients enter the pool within the fallback window and get
/// paired with each other.
async fn human_round(store: &Arc<MemoryStore>) -> Result<()> {
    info!("--- round one: two humans ---");

    let alice = build_client("alice", store);
    let bob = build_client("bob", store);

    alice.find_partner().await?;
    bob.find_partner().await?;

    wait_for(&alice, ClientPhase::Playing).await;
    wait_for(&bob, ClientPhase::Playing).await;
    info!("Paired in session {}", alice.session_id().unwrap());

    alice.send_message("hey! having a good day?").await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    bob.send_message("pretty good. you sound suspiciously polite").await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    alice.send_message("damn, caught already?").await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    alice.end_chat().await?;
    wait_for(&bob, ClientPhase::Guessing).await;

    let alice_guess = alice.submit_guess(PartnerKind::Human).await?;
    let bob_guess = bob.submit_guess(PartnerKind::Synthetic).await?;
    info!(
        "Alice guessed human: correct={}. Bob guessed synthetic: correct={}, partner was {:?}",
        alice_guess.correct, bob_guess.correct, bob_guess.actual
    );

    alice.main_menu();
    bob.main_menu();
    Ok(())
}

/// A lone client waits out the fallback window and plays against the
/// synthetic partner instead.
async fn synthetic_round(store: &Arc<MemoryStore>) -> Result<()> {
    info!("--- round two: one human, nobody waiting ---");

    let carol = build_client("carol", store);
    carol.find_partner().await?;

    wait_for(&carol, ClientPhase::Playing).await;
    info!("Matched in session {}", carol.session_id().unwrap());

    carol.send_message("hi! anyone out there?").await?;
    tokio::time::sleep(Duration::from_secs(4)).await;
    carol.send_message("you answer fast for a stranger").await?;
    tokio::time::sleep(Duration::from_secs(4)).await;

    for message in carol.visible_log() {
        info!("  [{}] {}", message.sender, message.text);
    }

    carol.end_chat().await?;
    let guess = carol.submit_guess(PartnerKind::Synthetic).await?;
    info!(
        "Carol guessed synthetic: correct={}, partner was {:?}",
        guess.correct, guess.actual
    );

    carol.main_menu();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let store = Arc::new(MemoryStore::new());

    human_round(&store).await?;
    synthetic_round(&store).await?;

    Ok(())
}

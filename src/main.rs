mod api;
mod autosave;
mod commands;
mod docs;
mod error;
mod sessions;
mod state;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use poise::{Framework, FrameworkOptions};
use tokio::sync::RwLock;
use tracing::{error, info, Level};

use api::ApiClient;
use autosave::guard::UnloadGuards;
use autosave::notifier::SaveNotifier;
use sessions::SessionRegistry;
use state::{AppState, EditorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    // Load env
    let _ = dotenv::dotenv();
    let token = dotenv::var("DISCORD_TOKEN").context("DISCORD_TOKEN required")?;
    let guild_id: Option<serenity::GuildId> = dotenv::var("DISCORD_GUILD_ID")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(serenity::GuildId::new);

    let config = EditorConfig::from_env();
    info!(
        list_debounce_ms = config.list_debounce_ms,
        answer_debounce_ms = config.answer_debounce_ms,
        toast_interval_ms = config.toast_interval_ms,
        "Autosave configured"
    );

    // Init API client
    let api = Arc::new(ApiClient::from_env()?);
    info!(base_url = api.base_url(), "FlowLedger API client initialized");

    // Parse admin user IDs from env
    let admin_ids: HashSet<u64> = dotenv::var("ADMIN_USER_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect();
    if !admin_ids.is_empty() {
        info!(count = admin_ids.len(), "Admin users configured");
    }

    let notifier = Arc::new(SaveNotifier::with_interval(config.toast_interval()));
    let guards = UnloadGuards::new(config.unsaved_message.clone());
    let sessions = Arc::new(SessionRegistry::default());

    let app_state = AppState {
        api,
        sessions: sessions.clone(),
        notifier,
        guards: guards.clone(),
        admin_ids,
        config: Arc::new(RwLock::new(config)),
    };

    let intents =
        serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MESSAGES;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![commands::ledger()],
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as: {} ({})", ready.user.name, ready.user.id);

                let commands = &framework.options().commands;
                info!("Registering {} top-level command(s):", commands.len());
                for cmd in commands {
                    info!("  /{} ({} subcommands)", cmd.name, cmd.subcommands.len());
                }

                if let Some(gid) = guild_id {
                    info!("Registering to guild {} (instant)", gid);
                    poise::builtins::register_in_guild(
                        ctx,
                        &framework.options().commands,
                        gid,
                    )
                    .await?;
                } else {
                    info!("Registering globally (up to 1 hour delay)");
                    poise::builtins::register_globally(
                        ctx,
                        &framework.options().commands,
                    )
                    .await?;
                }

                Ok(app_state)
            })
        })
        .build();

    info!("Starting FlowLedger editor bot...");

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    // Ctrl-C: warn about unsaved documents and flush them before the gateway closes
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        sessions.shutdown(&guards).await;
        shard_manager.shutdown_all().await;
    });

    if let Err(e) = client.start().await {
        error!("Client error: {}", e);
    }

    Ok(())
}

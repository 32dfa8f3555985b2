use std::sync::Arc;

use tracing::{info, warn};

use super::{render, require_session, send_chunked, KindChoice};
use crate::autosave::guard::UnloadPrompt;
use crate::autosave::SaveOutcome;
use crate::docs::types::DocKind;
use crate::sessions::{ChannelToasts, EditorSession};
use crate::state::Context;

fn leave_warning(prompt: &UnloadPrompt) -> String {
    format!(
        "{} ({})\nRun the command again with `force: true` to discard them.",
        prompt.message,
        prompt.documents.join(", ")
    )
}

/// Open a document for editing
#[poise::command(slash_command, guild_only)]
pub async fn open(
    ctx: Context<'_>,
    #[description = "Document type"] kind: KindChoice,
    #[description = "Audit or interview id"] id: u64,
    #[description = "Discard unsaved changes in the current document"] force: Option<bool>,
) -> Result<(), anyhow::Error> {
    let user = ctx.author().id.get();
    let kind = DocKind::from(kind);

    if let Some(current) = ctx.data().sessions.get(user).await {
        if let Some(prompt) = current.confirm_leave() {
            if !force.unwrap_or(false) {
                ctx.say(leave_warning(&prompt)).await?;
                return Ok(());
            }
            warn!(user, documents = ?prompt.documents, "discarding unsaved changes");
        }
    }

    ctx.defer().await?;
    info!(user = %ctx.author().name, %kind, id, "opening document");

    let toasts = Arc::new(ChannelToasts::new(
        ctx.serenity_context().http.clone(),
        ctx.channel_id(),
    ));
    let session = match EditorSession::open(ctx.data(), kind, id, toasts).await {
        Ok(session) => session,
        Err(e) => {
            warn!(%kind, id, "load failed: {}", e);
            ctx.say(format!("Could not load {} #{}: {}", kind, id, e))
                .await?;
            return Ok(());
        }
    };

    let snapshot = session.controller.snapshot().await?;
    ctx.data().sessions.insert(user, session).await;
    send_chunked(&ctx, &render(&snapshot)).await
}

/// Show the open document and its save state
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let Some(session) = require_session(&ctx).await? else {
        return Ok(());
    };
    let snapshot = session.controller.snapshot().await?;
    let mut text = render(&snapshot);
    text.push_str(&format!(
        "\nOpened {}",
        session.opened_at.format("%Y-%m-%d %H:%M UTC")
    ));
    send_chunked(&ctx, &text).await
}

/// Save now instead of waiting for autosave
#[poise::command(slash_command, guild_only)]
pub async fn save(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let Some(session) = require_session(&ctx).await? else {
        return Ok(());
    };
    ctx.defer().await?;

    let label = session.controller.label().to_string();
    let reply = match session.controller.save_now().await {
        SaveOutcome::Saved { fingerprint } => {
            format!("Saved **{}** (`{}`)", label, &fingerprint[..12])
        }
        SaveOutcome::Failed { message } => {
            format!("Could not save **{}**: {}. Your edits are kept.", label, message)
        }
        SaveOutcome::NothingToSave => format!("**{}** has no unsaved changes.", label),
        SaveOutcome::Closed => format!("**{}** was closed before the save finished.", label),
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Close the open document
#[poise::command(slash_command, guild_only)]
pub async fn close(
    ctx: Context<'_>,
    #[description = "Discard unsaved changes"] force: Option<bool>,
) -> Result<(), anyhow::Error> {
    let user = ctx.author().id.get();
    let Some(session) = require_session(&ctx).await? else {
        return Ok(());
    };

    if let Some(prompt) = session.confirm_leave() {
        if !force.unwrap_or(false) {
            ctx.say(leave_warning(&prompt)).await?;
            return Ok(());
        }
        warn!(user, documents = ?prompt.documents, "closing with unsaved changes");
    }
    drop(session);

    match ctx.data().sessions.close(user).await {
        Some(label) => ctx.say(format!("Closed **{}**.", label)).await?,
        None => ctx.say("No document open.").await?,
    };
    Ok(())
}

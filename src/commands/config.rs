use tracing::info;

use crate::state::Context;

/// Configure autosave (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "list_debounce_ms | answer_debounce_ms | unsaved_message"] param: Option<String>,
    #[description = "New value in milliseconds"] value: Option<u32>,
    #[description = "New text (unsaved_message)"] text: Option<String>,
) -> Result<(), anyhow::Error> {
    let user_id = ctx.author().id.get();
    if !ctx.data().is_admin(user_id) {
        ctx.say("This command is admin-only.").await?;
        return Ok(());
    }

    match (param.as_deref(), value, text) {
        // Show current config
        (None, _, _) => {
            let config = ctx.data().config.read().await;
            ctx.say(format!(
                "**Autosave Configuration:**\n\
                 `list_debounce_ms`: {}\n\
                 `answer_debounce_ms`: {}\n\
                 `toast_interval_ms`: {} (set at startup)\n\
                 `unsaved_message`: {}",
                config.list_debounce_ms,
                config.answer_debounce_ms,
                config.toast_interval_ms,
                config.unsaved_message
            ))
            .await?;
        }
        (Some("unsaved_message"), _, Some(message)) => {
            ctx.data().config.write().await.unsaved_message = message.clone();
            ctx.data().guards.set_message(message.clone());
            info!(user_id, "unsaved_message updated");
            ctx.say(format!("`unsaved_message` set to: {}", message)).await?;
        }
        (Some(key @ ("list_debounce_ms" | "answer_debounce_ms")), Some(val), _) => {
            let mut config = ctx.data().config.write().await;
            if key == "list_debounce_ms" {
                config.list_debounce_ms = u64::from(val);
            } else {
                config.answer_debounce_ms = u64::from(val);
            }
            drop(config);
            info!(user_id, key, val, "debounce updated");
            ctx.say(format!("`{}` set to {} (applies to documents opened from now on)", key, val))
                .await?;
        }
        (Some(key @ ("list_debounce_ms" | "answer_debounce_ms" | "unsaved_message")), _, _) => {
            ctx.say(format!(
                "Provide a value for `{}`. Example: `/ledger config list_debounce_ms 2000`",
                key
            ))
            .await?;
        }
        (Some(key), _, _) => {
            ctx.say(format!(
                "Unknown param `{}`. Valid: `list_debounce_ms`, `answer_debounce_ms`, `unsaved_message`",
                key
            ))
            .await?;
        }
    }

    Ok(())
}

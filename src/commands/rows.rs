use tracing::debug;

use super::{autocomplete_field, describe, require_session, row_index, LevelChoice};
use crate::docs::priority::set_priority;
use crate::docs::types::Priority;
use crate::state::Context;

/// Append an empty row to a list field
#[poise::command(slash_command, guild_only)]
pub async fn add_row(
    ctx: Context<'_>,
    #[description = "List field, e.g. process_json"]
    #[autocomplete = "autocomplete_field"]
    field: String,
) -> Result<(), anyhow::Error> {
    let Some(session) = require_session(&ctx).await? else {
        return Ok(());
    };
    let target = field.clone();
    let reply = match session.controller.mutate(move |doc| doc.add_row(&target)).await {
        Ok(index) => format!("Added row {} to `{}`.", index + 1, field),
        Err(e) => describe(&e),
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Replace the text of a row
#[poise::command(slash_command, guild_only)]
pub async fn set_row(
    ctx: Context<'_>,
    #[description = "List field"]
    #[autocomplete = "autocomplete_field"]
    field: String,
    #[description = "Row number (starting at 1)"]
    #[min = 1]
    row: u32,
    #[description = "New text"] text: String,
) -> Result<(), anyhow::Error> {
    let Some(session) = require_session(&ctx).await? else {
        return Ok(());
    };
    let index = row_index(row);
    let (target, value) = (field.clone(), text.clone());
    let result = session
        .controller
        .mutate(move |doc| doc.change_row(&target, index, &value))
        .await;
    let reply = match result {
        Ok(previous) => {
            debug!(field = %field, row, %previous, "row changed");
            format!("`{}` row {} is now: {}", field, row, text)
        }
        Err(e) => describe(&e),
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Remove a row; later rows move up
#[poise::command(slash_command, guild_only)]
pub async fn remove_row(
    ctx: Context<'_>,
    #[description = "List field"]
    #[autocomplete = "autocomplete_field"]
    field: String,
    #[description = "Row number (starting at 1)"]
    #[min = 1]
    row: u32,
) -> Result<(), anyhow::Error> {
    let Some(session) = require_session(&ctx).await? else {
        return Ok(());
    };
    let index = row_index(row);
    let target = field.clone();
    let reply = match session
        .controller
        .mutate(move |doc| doc.remove_row(&target, index))
        .await
    {
        Ok(removed) if removed.is_empty() => format!("Removed empty row {} from `{}`.", row, field),
        Ok(removed) => format!("Removed row {} from `{}`: {}", row, field, removed),
        Err(e) => describe(&e),
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Set the priority of a finding
#[poise::command(slash_command, guild_only)]
pub async fn priority(
    ctx: Context<'_>,
    #[description = "Finding number (starting at 1)"]
    #[min = 1]
    row: u32,
    #[description = "Priority level"] level: LevelChoice,
) -> Result<(), anyhow::Error> {
    let Some(session) = require_session(&ctx).await? else {
        return Ok(());
    };
    let index = row_index(row);
    let level = Priority::from(level);
    let reply = match session
        .controller
        .mutate(move |doc| set_priority(doc, index, level))
        .await
    {
        Ok(finding) => format!("**{}** priority: {}", finding, level),
        Err(e) => describe(&e),
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Answer an interview question
#[poise::command(slash_command, guild_only)]
pub async fn answer(
    ctx: Context<'_>,
    #[description = "Question key"] question: String,
    #[description = "Answer text"] text: String,
) -> Result<(), anyhow::Error> {
    let Some(session) = require_session(&ctx).await? else {
        return Ok(());
    };
    let (key, value) = (question.clone(), text);
    let reply = match session
        .controller
        .mutate(move |doc| doc.set_answer(&key, &value))
        .await
    {
        Ok(()) => format!("Answer to `{}` recorded.", question.trim()),
        Err(e) => describe(&e),
    };
    ctx.say(reply).await?;
    Ok(())
}

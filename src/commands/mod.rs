mod config;
mod rows;
mod session;

use std::sync::Arc;

use crate::autosave::Snapshot;
use crate::docs::priority;
use crate::docs::types::{DocKind, Priority};
use crate::error::EditError;
use crate::sessions::EditorSession;
use crate::state::Context;

/// FlowLedger - edit audit documents with autosave
#[poise::command(
    slash_command,
    subcommands(
        "session::open",
        "session::status",
        "session::save",
        "session::close",
        "rows::add_row",
        "rows::set_row",
        "rows::remove_row",
        "rows::priority",
        "rows::answer",
        "config::config"
    )
)]
pub async fn ledger(_ctx: Context<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum KindChoice {
    #[name = "sipoc"]
    Sipoc,
    #[name = "findings"]
    Findings,
    #[name = "interview"]
    Interview,
}

impl From<KindChoice> for DocKind {
    fn from(choice: KindChoice) -> Self {
        match choice {
            KindChoice::Sipoc => DocKind::Sipoc,
            KindChoice::Findings => DocKind::Findings,
            KindChoice::Interview => DocKind::InterviewQa,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum LevelChoice {
    Low,
    Medium,
    High,
    Critical,
}

impl From<LevelChoice> for Priority {
    fn from(choice: LevelChoice) -> Self {
        match choice {
            LevelChoice::Low => Priority::Low,
            LevelChoice::Medium => Priority::Medium,
            LevelChoice::High => Priority::High,
            LevelChoice::Critical => Priority::Critical,
        }
    }
}

/// The caller's open session, or a hint to open one.
async fn require_session(ctx: &Context<'_>) -> Result<Option<Arc<EditorSession>>, anyhow::Error> {
    let user = ctx.author().id.get();
    match ctx.data().sessions.get(user).await {
        Some(session) => Ok(Some(session)),
        None => {
            ctx.say("No document open. Use `/ledger open` first.").await?;
            Ok(None)
        }
    }
}

/// Chat rows are 1-based.
fn row_index(row: u32) -> usize {
    (row as usize).saturating_sub(1)
}

/// Render an edit error with 1-based rows.
fn describe(err: &EditError) -> String {
    match err {
        EditError::RowOutOfRange { field, index, len } => {
            format!("`{}` has {} row(s); there is no row {}.", field, len, index + 1)
        }
        other => format!("{}.", other),
    }
}

fn render(snapshot: &Snapshot) -> String {
    let doc = &snapshot.document;
    let mut out = format!(
        "**{}** | {} | revision {} | `{}`\n",
        doc.label(),
        snapshot.state,
        snapshot.revision,
        doc.short_fingerprint()
    );
    if let Some(at) = snapshot.last_saved_at {
        out.push_str(&format!("Last saved {}\n", at.format("%H:%M:%S UTC")));
    }

    for field in doc.kind.list_fields() {
        let rows = doc.list(field);
        out.push_str(&format!("\n**{}** ({})\n", field, rows.len()));
        for (i, row) in rows.iter().enumerate() {
            let text = if row.is_empty() { "_(empty)_" } else { row.as_str() };
            match priority::priority_of(doc, row) {
                Some(level) if doc.kind.keyed_list().map(|k| k.list) == Some(*field) => {
                    out.push_str(&format!("  {}. {} [{}]\n", i + 1, text, level))
                }
                _ => out.push_str(&format!("  {}. {}\n", i + 1, text)),
            }
        }
    }

    if let Some(field) = doc.kind.answers_field() {
        let answers = doc.map(field);
        out.push_str(&format!("\n**{}** ({})\n", field, answers.len()));
        for (question, answer) in &answers {
            let answer = answer.as_str().unwrap_or_default();
            out.push_str(&format!("  `{}`: {}\n", question, answer));
        }
    }
    out
}

/// Send a message in Discord-safe chunks (max 1990 chars).
async fn send_chunked(ctx: &Context<'_>, text: &str) -> Result<(), anyhow::Error> {
    let mut remaining = text;
    while !remaining.is_empty() {
        let chunk_len = remaining.len().min(1990);
        let split_at = if chunk_len < remaining.len() {
            let mut end = chunk_len;
            while !remaining.is_char_boundary(end) {
                end -= 1;
            }
            remaining[..end].rfind('\n').map(|i| i + 1).unwrap_or(end)
        } else {
            chunk_len
        };
        ctx.say(&remaining[..split_at]).await?;
        remaining = &remaining[split_at..];
    }
    Ok(())
}

/// Autocomplete list fields of the caller's open document.
async fn autocomplete_field(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let Some(session) = ctx.data().sessions.get(ctx.author().id.get()).await else {
        return Vec::new();
    };
    session
        .controller
        .kind()
        .list_fields()
        .iter()
        .filter(|f| f.contains(&partial.to_lowercase()))
        .map(|f| f.to_string())
        .collect()
}

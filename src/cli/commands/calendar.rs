use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::services::calendar_sync;

#[derive(Subcommand)]
pub enum CalendarCommands {
    #[command(about = "Pull attendee responses and unlink deleted calendar events")]
    Sync {
        #[arg(long, help = "How many days of past events to include")]
        days_back: Option<i64>,
    },
}

pub async fn handle(cmd: CalendarCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        CalendarCommands::Sync { days_back } => {
            let state = super::connect_state().await?;
            let days_back = days_back.unwrap_or(config().calendar.sync_days_back);
            let stats =
                calendar_sync::sync_all(&state.db, state.calendar.as_ref(), days_back).await?;
            state.db.close().await;

            let message = format!(
                "Checked {} events, updated {} assignments, unlinked {} events, {} errors",
                stats.events_checked, stats.assignments_updated, stats.events_unlinked, stats.errors
            );
            output_success(&output_format, &message, Some(json!({ "stats": stats })))
        }
    }
}

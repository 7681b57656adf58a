use serde_json::json;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;

pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    let db = super::connect().await?;
    db.migrate().await?;
    db.close().await;
    output_success(&output_format, "Migrations applied", None)
}

pub async fn health(output_format: OutputFormat) -> anyhow::Result<()> {
    let db = super::connect().await?;
    let result = db.health_check().await;
    db.close().await;

    match result {
        Ok(()) => output_success(
            &output_format,
            "Database reachable",
            Some(json!({ "database": "ok" })),
        ),
        Err(e) => {
            output_error(&output_format, &e.to_string(), Some("SERVICE_UNAVAILABLE"))?;
            anyhow::bail!("database health check failed")
        }
    }
}

use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::services::offers;

#[derive(Subcommand)]
pub enum OfferCommands {
    #[command(about = "Recompute line totals and offer sums")]
    Recalc {
        #[arg(help = "Offer id")]
        id: Uuid,
    },
}

pub async fn handle(cmd: OfferCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        OfferCommands::Recalc { id } => {
            let db = super::connect().await?;
            let mut tx = db.service_tx().await?;
            let offer = offers::recalculate(&mut tx, id).await?;
            tx.commit().await?;
            db.close().await;

            output_success(
                &output_format,
                &format!("Offer {} total {}", offer.offer_number, offer.total_gross),
                Some(json!({ "offer": offer })),
            )
        }
    }
}

pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "crewplan")]
#[command(about = "CrewPlan CLI - operator commands for the booking API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Check database connectivity")]
    Health,

    #[command(about = "Mint an access token for a user")]
    Token {
        #[command(flatten)]
        args: commands::token::TokenArgs,
    },

    #[command(about = "Calendar synchronisation")]
    Calendar {
        #[command(subcommand)]
        cmd: commands::calendar::CalendarCommands,
    },

    #[command(about = "Offer maintenance")]
    Offers {
        #[command(subcommand)]
        cmd: commands::offers::OfferCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::db::migrate(output_format).await,
        Commands::Health => commands::db::health(output_format).await,
        Commands::Token { args } => commands::token::handle(args, output_format),
        Commands::Calendar { cmd } => commands::calendar::handle(cmd, output_format).await,
        Commands::Offers { cmd } => commands::offers::handle(cmd, output_format).await,
    }
}

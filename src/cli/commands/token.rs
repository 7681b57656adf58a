use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(long, help = "User id the token is issued for")]
    pub user: Uuid,

    #[arg(long, help = "Email claim to embed")]
    pub email: Option<String>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let claims = Claims::new(args.user, args.email);
    let token = generate_jwt(&claims)?;

    match output_format {
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
        OutputFormat::Json => output_success(
            &output_format,
            "Token issued",
            Some(json!({
                "token": token,
                "expires_at": claims.exp,
                "expiry_hours": config().security.jwt_expiry_hours,
            })),
        ),
    }
}

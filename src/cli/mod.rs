pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use client::AdminClient;

#[derive(Parser)]
#[command(name = "cmsctl")]
#[command(about = "cmsctl - manage service data sources on a running CMS tenant router")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, env = "CMSCTL_SERVER", default_value = "http://localhost:3000", help = "Base URL of the router")]
    pub server: String,

    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Service data source management")]
    Services {
        #[command(subcommand)]
        cmd: commands::services::ServiceCommands,
    },

    #[command(about = "Check the router and its default data source")]
    Health,
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
    let client = AdminClient::new(&cli.server)?;

    match cli.command {
        Commands::Services { cmd } => commands::services::handle(cmd, &client, output_format).await,
        Commands::Health => commands::health::handle(&client, output_format).await,
    }
}

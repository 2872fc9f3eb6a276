use clap::Subcommand;
use serde_json::Value;

use crate::cli::client::{AdminClient, RemoteError};
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServiceCommands {
    #[command(about = "List service data sources and their pool status")]
    List,

    #[command(about = "Show one service data source")]
    Show {
        #[arg(help = "Service ID")]
        service_id: String,
    },

    #[command(about = "Create a service data source")]
    Create {
        #[arg(help = "Service ID")]
        service_id: String,

        #[arg(long, help = "Database URL (jdbc:mariadb://, mysql://, postgres://, sqlite://)")]
        url: String,

        #[arg(long, default_value = "", help = "Database username")]
        username: String,

        #[arg(long, env = "CMSCTL_DB_PASSWORD", help = "Database password")]
        password: Option<String>,
    },

    #[command(about = "Remove a service data source")]
    Remove {
        #[arg(help = "Service ID")]
        service_id: String,
    },

    #[command(about = "Create a service data source from <SERVICE>_DATASOURCE_URL/_DB_USERNAME/_DB_PASSWORD on the server")]
    AutoDetect {
        #[arg(help = "Service ID")]
        service_id: String,
    },
}

pub async fn handle(cmd: ServiceCommands, client: &AdminClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let result = match cmd {
        ServiceCommands::List => return list(client, &output_format).await,
        ServiceCommands::Show { service_id } => client.show(&service_id).await.map(|data| {
            let status = data["status"].as_str().unwrap_or("unknown").to_string();
            (format!("{}: {}", service_id, status), data)
        }),
        ServiceCommands::Create { service_id, url, username, password } => client
            .create(&service_id, &url, &username, password.as_deref().unwrap_or(""))
            .await
            .map(|data| (format!("Service '{}' created", service_id), data)),
        ServiceCommands::Remove { service_id } => client
            .remove(&service_id)
            .await
            .map(|data| (format!("Service '{}' removed", service_id), data)),
        ServiceCommands::AutoDetect { service_id } => client
            .auto_detect(&service_id)
            .await
            .map(|data| (format!("Service '{}' created from environment", service_id), data)),
    };

    match result {
        Ok((message, data)) => output_success(&output_format, &message, Some(data)),
        Err(e) => report(e, &output_format),
    }
}

async fn list(client: &AdminClient, output_format: &OutputFormat) -> anyhow::Result<()> {
    let data = match client.list().await {
        Ok(data) => data,
        Err(e) => return report(e, output_format),
    };

    let services = data["services"].as_object().cloned().unwrap_or_default();
    if services.is_empty() {
        return output_empty_collection(output_format, "services", "No dynamic services registered");
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        OutputFormat::Text => {
            println!("{:<20} {}", "SERVICE", "STATUS");
            println!("{}", "-".repeat(70));
            for (service_id, status) in &services {
                println!("{:<20} {}", service_id, status.as_str().unwrap_or_default());
            }

            if let Some(Value::Array(static_ids)) = data.get("staticServices") {
                let ids: Vec<&str> = static_ids.iter().filter_map(Value::as_str).collect();
                println!();
                println!("Static: {}", ids.join(", "));
            }
        }
    }
    Ok(())
}

/// JSON callers get the router's error envelope on stdout; the binary prints the text form.
fn report(err: anyhow::Error, output_format: &OutputFormat) -> anyhow::Result<()> {
    if let (OutputFormat::Json, Some(remote)) = (output_format, err.downcast_ref::<RemoteError>()) {
        output_error(output_format, &remote.message, Some(&remote.code))?;
    }
    Err(err)
}

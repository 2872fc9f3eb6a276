use crate::cli::client::AdminClient;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

pub async fn handle(client: &AdminClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let body = client.health().await?;

    if body["success"].as_bool().unwrap_or(false) {
        let services = body["data"]["services"].as_u64().unwrap_or(0);
        output_success(
            &output_format,
            &format!("Router healthy, {} dynamic service(s)", services),
            Some(body),
        )
    } else {
        let reason = body["data"]["database_error"].as_str().unwrap_or("unknown error").to_string();
        output_error(&output_format, &format!("Router degraded: {}", reason), Some("SERVICE_UNAVAILABLE"))?;
        Err(anyhow::anyhow!("default data source unavailable"))
    }
}

use anyhow::anyhow;
use serde_json::Value;

use crate::cli::utils::{endpoint, output_error, output_response};
use crate::cli::OutputFormat;

pub async fn handle(url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let target = endpoint(url, "/api/health")?;
    let response = reqwest::get(target.clone()).await?;
    let status = response.status();
    let body: Value = response.json().await?;

    output_response(&output_format, &body)?;

    if status.is_success() {
        Ok(())
    } else {
        output_error(&output_format, &format!("{} reported {}", target, status), Some("UNHEALTHY"))?;
        Err(anyhow!("gateway is degraded"))
    }
}

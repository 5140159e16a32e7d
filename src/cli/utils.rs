use serde_json::{json, Value};
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print a gateway response body. Text mode prints only `data` when the
/// call succeeded.
pub fn output_response(output_format: &OutputFormat, body: &Value) -> anyhow::Result<()> {
    let shown = match output_format {
        OutputFormat::Json => body,
        OutputFormat::Text => match body.get("data") {
            Some(data) if body["success"] == true => data,
            _ => body,
        },
    };
    println!("{}", serde_json::to_string_pretty(shown)?);
    Ok(())
}

/// Join an API path onto the gateway base URL.
pub fn endpoint(base: &str, path: &str) -> anyhow::Result<url::Url> {
    let base = if base.ends_with('/') { base.to_string() } else { format!("{}/", base) };
    let url = url::Url::parse(&base)?.join(path.trim_start_matches('/'))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_onto_base_urls() {
        assert_eq!(
            endpoint("http://localhost:3000", "/api/health").unwrap().as_str(),
            "http://localhost:3000/api/health"
        );
        assert_eq!(
            endpoint("https://viajes.example/backoffice/", "api/function/get_packages").unwrap().as_str(),
            "https://viajes.example/backoffice/api/function/get_packages"
        );
    }
}

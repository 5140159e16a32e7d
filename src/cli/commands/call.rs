use anyhow::anyhow;
use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::utils::{endpoint, output_error, output_response};
use crate::cli::OutputFormat;
use crate::dispatch::RoutineKind;
use crate::middleware::identity::USER_HEADER;

#[derive(Subcommand)]
pub enum CallCommands {
    #[command(about = "CALL a stored procedure")]
    Procedure {
        #[command(flatten)]
        args: CallArgs,
    },

    #[command(about = "SELECT from a stored function")]
    Function {
        #[command(flatten)]
        args: CallArgs,
    },
}

#[derive(clap::Args)]
pub struct CallArgs {
    #[arg(help = "Routine name")]
    pub name: String,

    #[arg(
        short,
        long = "param",
        help = "Positional parameter as JSON (repeatable); text that is not JSON is sent as a string"
    )]
    pub params: Vec<String>,

    #[arg(short, long, help = "Acting user id, sent as the x-user-id header")]
    pub user: Option<i64>,

    #[arg(long, default_value = super::DEFAULT_URL, help = "Gateway base URL")]
    pub url: String,
}

pub async fn handle(cmd: CallCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let (kind, args) = match cmd {
        CallCommands::Procedure { args } => (RoutineKind::Procedure, args),
        CallCommands::Function { args } => (RoutineKind::Function, args),
    };

    let target = endpoint(&args.url, &format!("/api/{}/{}", kind.noun(), args.name))?;
    let body = json!({ "params": args.params.iter().map(|p| parse_param(p)).collect::<Vec<_>>() });

    let client = reqwest::Client::new();
    let mut request = client.post(target).json(&body);
    if let Some(user) = args.user {
        request = request.header(USER_HEADER, user.to_string());
    }

    let response = request.send().await?;
    let status = response.status();
    let reply: Value = response.json().await?;

    if status.is_success() {
        output_response(&output_format, &reply)
    } else {
        let message = reply["error"].as_str().unwrap_or("request failed");
        match output_format {
            OutputFormat::Json => output_response(&output_format, &reply)?,
            OutputFormat::Text => output_error(&output_format, message, reply["code"].as_str())?,
        }
        Err(anyhow!("{} {} failed with {}", kind.noun(), args.name, status))
    }
}

/// `--param 42` is a number, `--param '{"value":"x","type":"TEXT"}'` a typed
/// parameter, and `--param hola` the string "hola".
fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

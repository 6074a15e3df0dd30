//! Invoke a deployed program with numeric arguments and print its
//! decoded response fields.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solbridge::{
    BridgeConfig, CallOutcome, CancelToken, Field, FieldKind, FieldValue, PayerWallet,
    ProgramClient, Pubkey, Schema,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Program to invoke
    #[arg(short, long)]
    program_id: String,

    /// Response fields as name:kind pairs (kind is float or int)
    #[arg(
        short,
        long = "field",
        default_values_t = [String::from("slope:float"), String::from("intercept:float")]
    )]
    fields: Vec<String>,

    /// Path to the payer keypair file
    #[arg(short, long)]
    keypair: Option<PathBuf>,

    /// Ledger RPC endpoint (overrides SOLBRIDGE_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Values to encode into the instruction payload
    #[arg(required = true)]
    values: Vec<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::from_env();
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if args.verbose {
        config.verbose = true;
    }
    init_logging(config.verbose);

    let program_id = Pubkey::from_str(&args.program_id).context("invalid program id")?;
    let fields = args
        .fields
        .iter()
        .map(|decl| parse_field(decl))
        .collect::<Result<Vec<_>>>()?;
    let schema = Schema::new(fields);

    let wallet_path = args
        .keypair
        .or_else(|| config.keypair_path.clone().map(PathBuf::from));
    let wallet = PayerWallet::load(wallet_path.as_deref()).context("failed to load payer wallet")?;
    info!(payer = %wallet.pubkey(), endpoint = %config.endpoint, "wallet loaded");

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let client = ProgramClient::new(&config, program_id, schema, wallet.into_keypair())
        .with_cancel_token(cancel);

    info!(program = %program_id, values = args.values.len(), "invoking program");
    match client.call(&args.values).await? {
        CallOutcome::Completed(decoded) => {
            for (name, value) in decoded.iter() {
                match value {
                    FieldValue::Float(v) => println!("{name}: {v}"),
                    FieldValue::Int(v) => println!("{name}: {v}"),
                }
            }
            Ok(())
        }
        CallOutcome::SubmissionFailed => {
            warn!("ledger rejected the transaction, no response to decode");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "solbridge=debug,info"
    } else {
        "solbridge=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Parse a `name:kind` field declaration
fn parse_field(decl: &str) -> Result<Field> {
    let (name, kind) = decl
        .split_once(':')
        .with_context(|| format!("field '{decl}' is not a name:kind pair"))?;
    let kind = match kind.trim().to_ascii_lowercase().as_str() {
        "float" | "f32" => FieldKind::Float,
        "int" | "i32" => FieldKind::Int,
        other => anyhow::bail!("unknown field kind '{other}' (expected float or int)"),
    };
    Ok(Field::new(name.trim(), kind))
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use scf_ledger::types::EntityKind;
use scf_ledger::{Config, LedgerStore, SledLedger, invoke, ledger};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scf-ledger")]
#[command(about = "Supply-chain-finance ledger with discount negotiation")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ledger database directory
    #[arg(long, env = "SCF_LEDGER_PATH")]
    ledger_path: Option<PathBuf>,

    /// Log filter, overrides the config file
    #[arg(long, env = "SCF_LOG")]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one named operation and print its JSON result
    Invoke {
        function: String,
        args: Vec<String>,
    },
    /// Print the audit log of one ledger key
    History { kind: String, id: String },
    /// List the operation names `invoke` accepts
    Functions,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(path) = args.ledger_path {
        config.ledger_path = path;
    }
    if let Some(filter) = args.log {
        config.log_filter = filter;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_filter))?,
        )
        .with_writer(std::io::stderr)
        .init();

    let output = match args.command {
        Command::Functions => serde_json::json!(invoke::FUNCTIONS),
        Command::Invoke { function, args } => {
            let store = open_ledger(&config)?;
            invoke::invoke(&store, &function, &args)
                .inspect_err(|err| error!(%function, %err, "Invocation failed"))?
        }
        Command::History { kind, id } => {
            let kind: EntityKind = kind.parse()?;
            let key = kind.key(&id);
            let store = open_ledger(&config)?;
            let entries = store.history(&key)?;
            ledger::verify_history(&key, &entries)?;

            let rows = entries
                .into_iter()
                .map(|entry| {
                    let value: serde_json::Value = ledger::decode_record(&key, &entry.value)?;
                    Ok(serde_json::json!({
                        "version": entry.version,
                        "txId": entry.tx_id,
                        "timestamp": entry.timestamp.to_datetime_utc().to_rfc3339(),
                        "digest": entry.digest,
                        "value": value,
                    }))
                })
                .collect::<scf_ledger::ScfResult<Vec<_>>>()?;
            serde_json::Value::Array(rows)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn open_ledger(config: &Config) -> anyhow::Result<SledLedger> {
    SledLedger::from_config(config)
        .with_context(|| format!("failed to open ledger {}", config.ledger_path.display()))
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use turfbook_db::Database;
use turfbook_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "turfbook-cli", version, about = "Operate the turfbook backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server until Ctrl+C
    Serve,
    /// Print the merged OpenAPI document
    Openapi {
        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print the effective settings after layering files and environment
    Settings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load turfbook settings")?;

    match cli.command {
        Command::Serve => {
            turfbook_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "starting turfbook from cli");
            turfbook_app::run(settings).await
        }
        Command::Openapi { pretty } => {
            // Route and schema fragments only; nothing is read or written.
            let db = Database::in_memory(&settings.database.name).await?;
            let registry = turfbook_app::build_registry(&db);
            let document =
                turfbook_http::router::openapi_document(&registry, &settings.server.api_prefix);
            print_json(&document, pretty)
        }
        Command::Settings => {
            let value = serde_json::to_value(&settings).context("failed to encode settings")?;
            print_json(&value, true)
        }
    }
}

fn print_json(value: &serde_json::Value, pretty: bool) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

use clap::{Parser, Subcommand};
use shelf_core::catalog::ProductCatalog;
use shelf_core::config::Config;
use shelf_core::delivery::{DeliveryOrchestrator, DiskSink, HttpFetcher};
use shelf_core::filename::derive_filename;
use shelf_core::gate::{DownloadGate, GateEvent};
use shelf_core::product::Product;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

/// shelf: storefront download client.
#[derive(Parser)]
#[command(name = "shelf")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wait out the release countdown, then download a product's file.
    Download {
        /// Product id in the catalog.
        product_id: String,

        /// YAML product catalog (overrides the configured catalog).
        #[arg(long, env = "SHELF_CATALOG_PATH")]
        catalog: Option<PathBuf>,

        /// Directory to save into (overrides the configured one).
        #[arg(long, env = "SHELF_DOWNLOAD_DIR")]
        download_dir: Option<PathBuf>,
    },
    /// Print the file name a product would be saved under.
    Filename {
        #[arg(long)]
        title: String,

        #[arg(long)]
        file_ref: String,
    },
}

fn configure_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .with_target(false)
        .with_file(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() {
    configure_logging();
    let args = Args::parse();

    match args.command {
        Command::Filename { title, file_ref } => {
            println!("{}", derive_filename(&title, &file_ref));
        }
        Command::Download {
            product_id,
            catalog,
            download_dir,
        } => {
            let mut config = Config::load().unwrap_or_else(|e| {
                error!("Failed to load configuration: {e}");
                std::process::exit(1);
            });
            if catalog.is_some() {
                config.catalog_path = catalog;
            }
            if let Some(dir) = download_dir {
                config.download_dir = dir;
            }
            if let Err(e) = download(&config, &product_id).await {
                error!("{e}");
                std::process::exit(1);
            }
        }
    }
}

async fn download(config: &Config, product_id: &str) -> Result<(), String> {
    let catalog = config.product_catalog().map_err(|e| e.to_string())?;
    let product = catalog
        .get_product(product_id)
        .await
        .map_err(|e| format!("Failed to load product {product_id}: {e}"))?
        .ok_or_else(|| format!("Product {product_id} not found"))?;

    let issuer = config
        .signed_url_issuer()
        .await
        .map_err(|e| e.to_string())?;
    let fetcher = HttpFetcher::with_timeout(config.fetch_timeout).map_err(|e| e.to_string())?;
    let sink = DiskSink::new(config.download_dir.clone());

    info!("Saving downloads to {}", config.download_dir.display());
    let orchestrator =
        DeliveryOrchestrator::with_default_cascade(issuer, Arc::new(fetcher), Arc::new(sink));
    let (gate, mut events) = DownloadGate::new(Arc::new(orchestrator));

    print_header(&product);
    gate.present(product);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let succeeded = tokio::select! {
            outcome = wait_for_outcome(&mut events) => match outcome {
                Some(succeeded) => succeeded,
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                gate.close();
                println!();
                println!("Cancelled.");
                return Ok(());
            }
        };

        let prompt = if succeeded {
            "Download again? [y/N] "
        } else {
            "Retry? [y/N] "
        };
        print!("{prompt}");
        let _ = std::io::stdout().flush();

        let answer = stdin
            .next_line()
            .await
            .map_err(|e| e.to_string())?
            .unwrap_or_default();
        if !answer.trim().eq_ignore_ascii_case("y") {
            gate.close();
            return Ok(());
        }

        // The outcome is reported through the event channel as well.
        if let Err(e) = gate.retry_download().await {
            return Err(e.to_string());
        }
    }
}

fn print_header(product: &Product) {
    let price = if product.is_free() {
        "Free".to_string()
    } else {
        format!("${:.2}", product.price)
    };
    println!("{} ({})", product.title, price);
}

/// Render events until an outcome arrives. `Some(true)` on success.
async fn wait_for_outcome(events: &mut mpsc::UnboundedReceiver<GateEvent>) -> Option<bool> {
    while let Some(event) = events.recv().await {
        match event {
            GateEvent::Tick { remaining } if remaining > 0 => {
                print!("\rYour download will start in {remaining:>2}s ");
                let _ = std::io::stdout().flush();
            }
            GateEvent::Tick { .. } => {}
            GateEvent::DeliveryStarted => {
                println!();
                println!("Preparing download...");
            }
            GateEvent::DeliverySucceeded { filename } => {
                println!("Download started: {filename}");
                return Some(true);
            }
            GateEvent::DeliveryFailed { reason } => {
                println!("Download failed: {reason}");
                return Some(false);
            }
        }
    }
    None
}

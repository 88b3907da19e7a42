use clap::Parser;

use storefront_lib::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_guard = match storefront_lib::init_logging(&cli.data_dir.join("logs")) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Logging disabled: {}", e);
            None
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Storefront starting up");

    if let Err(e) = cli::dispatch(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        drop(log_guard);
        std::process::exit(1);
    }
}

mod cli;

use tracing::error;

#[tokio::main]
async fn main() {
    // Logging is initialised inside `run` once the configuration is known
    if let Err(err) = cli::run().await {
        error!("tunnelctl error: {}", err);
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

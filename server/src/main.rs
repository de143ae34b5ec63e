use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use server::world::World;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "3001")]
    port: u16,

    /// Maximum number of concurrent connections
    #[arg(long, default_value = "256")]
    max_connections: usize,

    /// Seconds between lobby snapshot broadcasts
    #[arg(long, default_value = "5")]
    lobby_interval_secs: u64,

    /// Milliseconds between round expiry checks
    #[arg(long, default_value = "1000")]
    sweep_interval_ms: u64,

    /// Close connections silent for this many seconds (0 disables)
    #[arg(long, default_value = "300")]
    idle_timeout_secs: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            max_connections: args.max_connections,
            lobby_interval: Duration::from_secs(args.lobby_interval_secs.max(1)),
            sweep_interval: Duration::from_millis(args.sweep_interval_ms.max(1)),
            idle_timeout: (args.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(args.idle_timeout_secs)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::from(Args::parse());
    info!("Starting lobby server on {}", config.bind_addr());

    let mut server = Server::bind(config, World::new()).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            println!("Received Ctrl+C, shutting down gracefully...");
        })
        .await;

    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use machikoro::application::GameService;
use machikoro::random::{OsRandomSource, RandomSource, SeededRandomSource};
use machikoro::server::build_router;

#[derive(Parser, Debug)]
#[command(name = "machikoro-server", about = "Machi Koro game server")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    /// Seconds a player may spend on one turn before being forfeited (0 disables)
    #[arg(long, default_value_t = 0)]
    turn_timeout_secs: u64,

    /// Seed for reproducible dice; the OS generator is used when absent
    #[arg(long)]
    seed: Option<u64>,

    /// Single origin allowed by CORS; any origin when absent
    #[arg(long)]
    allowed_origin: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let random: Arc<dyn RandomSource> = match args.seed {
        Some(seed) => {
            log::warn!("🎲 Using seeded dice ({}); games are predictable", seed);
            Arc::new(SeededRandomSource::new(seed))
        }
        None => Arc::new(OsRandomSource),
    };
    let service = GameService::new(random);

    if args.turn_timeout_secs > 0 {
        let limit = Duration::from_secs(args.turn_timeout_secs);
        let sweeper = service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                for (game_id, user_name) in sweeper.expire_turns(limit).await {
                    log::info!("⏰ Forfeited {} in game {} on timeout", user_name, game_id);
                }
            }
        });
    }

    let app = build_router(service, args.allowed_origin.as_deref());
    let address = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    log::info!("🚀 Starting Machi Koro server on {}", address);
    axum::serve(listener, app).await?;
    Ok(())
}

//! Realtime tail utility for Lotline
//!
//! Connects to the realtime endpoint and logs every inbound message until
//! interrupted. Auction ids given as arguments are watched for bid events.
//!
//! Usage:
//!   ACCESS_TOKEN=... cargo run --bin relay-tail
//!   ACCESS_TOKEN=... cargo run --bin relay-tail -- A1 A2
//!
//! Configuration is read from the environment (and `.env`), see `RelayConfig`.
//! `LOG_FORMAT=json` switches to JSON log lines; `RUST_LOG` sets the filter.

use anyhow::Context;
use lotline_realtime::{AuctionWatch, Message, Relay, RelayConfig, SessionToken};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = RelayConfig::from_env()?;
    let token = config
        .access_token
        .clone()
        .context("ACCESS_TOKEN must be set to open the realtime connection")?;

    let relay = Relay::builder(config)
        .credentials(SessionToken::with_token(token))
        .build()?;

    let _tail = relay.subscribe(|message: &Message| {
        tracing::info!(
            kind = %message.kind,
            auction_id = ?message.auction_id,
            user_id = ?message.user_id,
            data = ?message.data,
            "Realtime message"
        );
    });
    relay.connect();

    let watches: Vec<AuctionWatch> = std::env::args()
        .skip(1)
        .map(|auction_id| {
            AuctionWatch::start(&relay, auction_id, |event| {
                if event.kind.is_final() {
                    tracing::info!(auction_id = %event.auction_id, kind = ?event.kind, "Auction closed");
                }
            })
        })
        .collect();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");

    drop(watches);
    relay.disconnect();
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

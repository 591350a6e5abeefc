/*
[INPUT]:  Market name and optional MAX_ACCESS_KEY / MAX_SECRET_KEY
[OUTPUT]: Ticker events and account updates printed to stdout
[POS]:    Examples - WebSocket stream handling
[UPDATE]: When WebSocket API changes
*/

use max_adapter::*;
use tokio::time::{Duration, timeout};

/// Example: stream ticker updates for one market for a short while
///
/// Usage: cargo run --example ticker_stream -- btctwd
#[tokio::main]
async fn main() -> Result<()> {
    let market = std::env::args().nth(1).unwrap_or_else(|| "btctwd".to_string());

    let mut config = StreamConfig::new();
    if let (Ok(access_key), Ok(secret_key)) = (
        std::env::var("MAX_ACCESS_KEY"),
        std::env::var("MAX_SECRET_KEY"),
    ) {
        config = config.with_credentials(Credentials::new(access_key, secret_key));
    }

    let client = MaxWebSocket::connect(config).await?;
    println!("connected to {}", client.url());

    let mut ticker = client.subscribe_ticker(&market, 16).await?;
    let mut account = client.subscribe_account(16)?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let next = timeout(remaining, async {
            tokio::select! {
                Some(event) = ticker.recv() => {
                    println!("{} last={} buy={} sell={}", event.market, event.last, event.buy, event.sell);
                    true
                }
                Some(event) = account.recv() => {
                    println!("account {:?}", event.fields());
                    true
                }
                else => false,
            }
        })
        .await;

        if !matches!(next, Ok(true)) {
            break;
        }
    }

    println!("auth state: {:?}", client.auth_state());
    ticker.close();
    account.close();
    client.close().await;
    Ok(())
}

use resilient_realtime::{RealtimeClient, RealtimeClientOptions, SendOptions, listener};
use std::time::Duration;

/// Chat session against a live realtime server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let url = std::env::var("REALTIME_URL").expect("REALTIME_URL must be set in .env");
    let token = std::env::var("REALTIME_TOKEN").expect("REALTIME_TOKEN must be set in .env");

    // Options may also come from a JSON blob, e.g. {"heartbeatIntervalMs": 10000}
    let options = match std::env::var("REALTIME_OPTIONS") {
        Ok(raw) => serde_json::from_str::<RealtimeClientOptions>(&raw)?,
        Err(_) => RealtimeClientOptions::default(),
    };

    println!("📡 Connecting to: {}\n", url);
    let client = RealtimeClient::new(&url, token, options)?;

    client.on(
        "chat.message",
        listener(|data| println!("💬 {}", data)),
    );
    client.on(
        "connection.health",
        listener(|health| println!("❤️  health: {}", health)),
    );
    client.on("error", listener(|err| eprintln!("❌ {}", err)));

    // Queued until the connection opens
    client
        .send(
            "chat.message",
            serde_json::json!({ "text": "hello from the queue" }),
            SendOptions::retry(),
        )
        .await?;

    client.connect().await?;
    println!("✅ Connected, state = {}\n", client.state());

    client
        .send(
            "chat.message",
            serde_json::json!({ "text": "hello live" }),
            SendOptions::default(),
        )
        .await?;

    println!("⏳ Watching the session for 60 seconds (interrupt your network to see reconnects)\n");
    for _ in 0..12 {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let metrics = client.metrics();
        println!(
            "  [{}] sent={} received={} attempts={} queued={}",
            client.state(),
            metrics.messages_sent,
            metrics.messages_received,
            metrics.reconnect_attempts,
            metrics.queue_length
        );
    }

    client.disconnect();
    println!("\n👋 Disconnected");
    Ok(())
}

use agenthub_realtime::{
    ConnectionStatus, EventKind, RealtimeClient, RealtimeConfig, RealtimeEvent, ViewContext,
    should_notify,
};

/// Connects to the configured environment and prints every event
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables (APP_MODE, API_BASE_URL, REALTIME_URL)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agenthub_realtime=debug".into()),
        )
        .init();

    let config = RealtimeConfig::from_env()?;
    println!("📡 Connecting to: {}\n", config.url);
    let client = RealtimeClient::new(config)?;

    client.on_status(|status: ConnectionStatus, error: Option<&str>| match error {
        Some(error) => println!("🔌 {} ({})", status.label(), error),
        None => println!("🔌 {}", status.label()),
    });

    let view = ViewContext::new(None::<String>, true);
    client.on(EventKind::NewMessage, move |event: &RealtimeEvent| {
        if let RealtimeEvent::NewMessage(message) = event {
            println!("💬 [{}] {}", message.chat_name, message.preview);
            if let Some(reason) = should_notify(message, &view) {
                println!("🔔 notify ({})", reason.as_str());
            }
        }
    });
    client.on_any(|event: &RealtimeEvent| {
        println!("📨 {} for chat {:?}", event.kind(), event.chat_id());
    });

    client.connect();

    tokio::signal::ctrl_c().await?;

    println!("\n📊 {:#?}", client.stats());
    println!("Disconnecting...");
    client.destroy();

    Ok(())
}

//! GameData Relay
//!
//! Runs a scripted session through the relay to show frame validation end
//! to end. Transports embed the library and call [`SessionManager`] directly.

use std::sync::Arc;
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gamedata_relay::{
    MessageWriter, RelayConfig, SessionManager, VERSION,
    game::{BroadcastEvents, ConfiguredAntiCheat, SpawnType},
    network::{OutboundKind, Recipient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env().context("Failed to load relay config")?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("GameData Relay v{}", VERSION);
    info!("Allowed scene: {}", config.allowed_scene);
    info!("Code attempts: {}", config.max_code_attempts);

    demo_session(config).await
}

/// Demo function to drive one session.
async fn demo_session(config: RelayConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Session ===");

    let events = Arc::new(BroadcastEvents::default());
    let mut rx = events.subscribe();
    let anticheat = Arc::new(ConfiguredAntiCheat::new(config.anticheat_enabled));
    let options = config.game_options();
    let manager = SessionManager::new(config, events, anticheat);

    let (host, guest, third) = (1, 2, 3);
    let session = manager.create(Some(host), options).await?;
    let code = session.lock().await.code;
    info!("Game code: {}", code);

    manager.join(code, host, "Red").await?;
    manager.join(code, guest, "Blue").await?;
    manager.join(code, third, "Green").await?;

    // Everyone loads into the game scene
    for client in [host, guest, third] {
        let frame = sub_message(6, |w| {
            w.write_packed_i32(client);
            w.write_string("OnlineGame");
            Ok(())
        })?;
        let processed = manager.handle_game_data(code, client, &frame, false).await?;
        report(client, &processed.outbound);
    }

    // Host spawns the guest's character
    let frame = sub_message(4, |w| {
        w.write_packed_u32(SpawnType::PlayerControl.as_u32());
        w.write_packed_i32(guest);
        w.write_u8(1);
        w.write_packed_i32(3);
        for (net_id, state) in [(1u32, vec![1u8, 1]), (2, vec![]), (3, vec![0, 0, 0, 128, 0, 128])] {
            w.write_packed_u32(net_id);
            w.start_message(1);
            w.write_bytes(&state);
            w.end_message()?;
        }
        Ok(())
    });
    let processed = manager.handle_game_data(code, host, &frame?, false).await?;
    info!("Spawn relayed {} bytes", processed.frame.relay().map_or(0, |f| f.payload.len()));

    // Third player tries to despawn the guest's character
    let frame = sub_message(5, |w| {
        w.write_packed_u32(1);
        Ok(())
    })?;
    let processed = manager.handle_game_data(code, third, &frame, false).await?;
    if processed.frame.relay().map_or(true, |f| f.payload.is_empty()) {
        warn!("Despawn from {} was rejected", third);
    }

    for client in [third, guest, host] {
        manager.leave(code, client).await?;
    }
    manager.on_client_disconnect(host).await;

    info!("=== Events ===");
    while let Ok(event) = rx.try_recv() {
        info!("{:?}", event);
    }
    info!("Sessions left: {}", manager.session_count().await);

    Ok(())
}

fn sub_message(
    tag: u8,
    body: impl FnOnce(&mut MessageWriter) -> Result<(), gamedata_relay::CodecError>,
) -> anyhow::Result<Vec<u8>> {
    let mut writer = MessageWriter::new();
    writer.start_message(tag);
    body(&mut writer)?;
    writer.end_message()?;
    Ok(writer.into_bytes())
}

fn report(client: i32, outbound: &[gamedata_relay::OutboundMessage]) {
    for message in outbound {
        let target = match message.recipient {
            Recipient::All => "all".to_string(),
            Recipient::Client(id) => id.to_string(),
        };
        match &message.kind {
            OutboundKind::GameData(payload) => {
                info!("{} -> {}: {}", client, target, hex::encode(payload));
            }
            OutboundKind::Disconnect { reason } => {
                info!("{} -> {}: disconnect ({})", client, target, reason);
            }
        }
    }
}

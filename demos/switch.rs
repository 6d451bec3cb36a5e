//! Example: Read a relay board, pulse one channel and watch the poller.

use std::sync::Arc;

use tcp_switch::{DeviceClient, DeviceConfig, DeviceEvent, Poller};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = DeviceConfig::builder()
        .name("Garage")
        .host("192.168.0.50")
        .port(6722)
        .channel_count(2)
        .momentary_delay(1)
        .build();

    let client = Arc::new(DeviceClient::new(config)?);
    println!("Reading {}...", client.endpoint());

    let snapshot = client.try_refresh().await?;
    println!("\n--- Channels ({}) ---", client.channels());
    for (channel, on) in snapshot.states(client.channels())?.into_iter().enumerate() {
        println!("  CH{}: {}", channel + 1, if on { "on" } else { "off" });
    }

    println!("\nPulsing CH1 for 1s...");
    let on = client.turn_on(0).await;
    println!("  CH1 reported {}", if on { "on" } else { "off" });

    let mut events = client.subscribe();
    let _poller = Poller::spawn(Arc::clone(&client));

    println!("\nWatching for changes, press Ctrl+C to stop...");
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(DeviceEvent::ChannelChanged { channel, on }) => {
                    println!("  CH{} turned {}", channel + 1, if on { "on" } else { "off" });
                }
                Ok(DeviceEvent::CommandFailed(diagnostic)) => {
                    println!(
                        "  {} failed after {} attempts: {}",
                        diagnostic.command, diagnostic.attempts, diagnostic.message
                    );
                }
                Ok(_) => {}
                Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await;
    Ok(())
}

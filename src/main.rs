// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use tcp_switch::constants::{
    BUFFER_SIZE, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MOMENTARY_DELAY, DEFAULT_PORT,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_SCAN_INTERVAL_SECS,
};
use tcp_switch::mqtt::{
    MqttChannelEvent, MqttCmdAck, MqttCommand, MqttDeviceError, MqttDeviceEvent, MqttDeviceState,
    MqttSnapshot,
};
use tcp_switch::{
    ChannelSelection, ConnectionMode, DeviceClient, DeviceConfig, DeviceEvent, EventReceiver,
    Poller,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "tcpswitch2mqtt")]
#[command(about = "Bridge between TCP relay boards and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    mqtt: MqttToml,
    #[serde(default, rename = "device")]
    devices: Vec<DeviceToml>,
}

#[derive(Debug, Deserialize)]
struct DeviceToml {
    name: String,
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    channels: ChannelSelection,
    #[serde(default = "default_momentary_delay")]
    momentary_delay: u8,
    #[serde(default = "default_scan_interval")]
    scan_interval_secs: u64,
    #[serde(default = "default_connect_timeout")]
    connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout")]
    read_timeout_ms: u64,
    #[serde(default = "default_buffer_size")]
    buffer_size: usize,
    #[serde(default)]
    connection_mode: ConnectionMode,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_momentary_delay() -> u8 {
    DEFAULT_MOMENTARY_DELAY
}
fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}
fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}
fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}
fn default_buffer_size() -> usize {
    BUFFER_SIZE
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_subscribe_topic")]
    subscribe_topic: String,
    #[serde(default = "default_publish_topic")]
    publish_topic: String,
    #[serde(default = "default_snapshot_interval")]
    snapshot_interval_secs: u64,
}

fn default_client_id() -> String {
    "tcpswitch-bridge".to_string()
}
fn default_subscribe_topic() -> String {
    "tcpswitch/cmd".to_string()
}
fn default_publish_topic() -> String {
    "tcpswitch".to_string()
}
fn default_snapshot_interval() -> u64 {
    60
}

fn build_device_config(toml: &DeviceToml) -> DeviceConfig {
    DeviceConfig::builder()
        .name(&toml.name)
        .host(&toml.host)
        .port(toml.port)
        .channels(toml.channels.clone())
        .momentary_delay(toml.momentary_delay)
        .scan_interval_secs(toml.scan_interval_secs)
        .connect_timeout_ms(toml.connect_timeout_ms)
        .read_timeout_ms(toml.read_timeout_ms)
        .buffer_size(toml.buffer_size)
        .connection_mode(toml.connection_mode)
        .build()
}

fn load_config(path: &str) -> Result<Config> {
    let text = std::fs::read_to_string(path).context("Failed to read config file")?;
    toml::from_str(&text).context("Failed to parse config file")
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

struct Device {
    client: Arc<DeviceClient>,
    poller: Poller,
    /// Configured 0-based channel indices
    channels: Vec<usize>,
}

impl Device {
    fn name(&self) -> &str {
        self.client.switch_name()
    }

    async fn state(&self) -> MqttDeviceState {
        let endpoint = self.client.endpoint();
        MqttDeviceState::new(
            self.name(),
            endpoint.host(),
            endpoint.port(),
            &self.poller.switches().await,
        )
    }
}

type Devices = Arc<Vec<Device>>;

fn find_device<'a>(devices: &'a [Device], name: &str) -> Option<&'a Device> {
    devices.iter().find(|d| d.name() == name)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish_cmd_ack(
    client: &AsyncClient,
    topic: &str,
    success: bool,
    src: Option<serde_json::Value>,
    data: Option<serde_json::Value>,
) {
    publish_json(client, topic, &MqttCmdAck::new(success, src, data), false).await;
}

async fn build_snapshot(devices: &[Device]) -> MqttSnapshot {
    let mut states = Vec::with_capacity(devices.len());
    for device in devices {
        states.push(device.state().await);
    }
    MqttSnapshot::new(states)
}

async fn publish_snapshot(client: &AsyncClient, topic: &str, devices: &[Device]) {
    let snapshot = build_snapshot(devices).await;
    publish_json(client, topic, &snapshot, true).await;
}

// ---------------------------------------------------------------------------
// Device event → MQTT
// ---------------------------------------------------------------------------

async fn handle_device_event(event: DeviceEvent, device: &str, client: &AsyncClient, topic: &str) {
    match event {
        DeviceEvent::ChannelChanged { channel, on } => {
            info!("{device} CH{} turned {}", channel + 1, if on { "on" } else { "off" });
            publish_json(client, topic, &MqttChannelEvent::new(device, channel, on), false).await;
        }

        DeviceEvent::Connected => {
            info!("{device} connected");
            publish_json(client, topic, &MqttDeviceEvent::new("DEVICE_CONNECTED", device), false)
                .await;
        }

        DeviceEvent::Disconnected => {
            warn!("{device} disconnected");
            publish_json(
                client,
                topic,
                &MqttDeviceEvent::new("DEVICE_DISCONNECTED", device),
                false,
            )
            .await;
        }

        DeviceEvent::CommandFailed(diagnostic) => {
            publish_json(client, topic, &MqttDeviceError::new(device, &diagnostic), false).await;
        }

        DeviceEvent::StatusUpdated(snapshot) => {
            debug!("{device} status: {snapshot}");
        }
    }
}

fn spawn_event_forwarder(
    name: String,
    mut rx: EventReceiver,
    client: AsyncClient,
    topic: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => handle_device_event(event, &name, &client, &topic).await,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("{name}: event receiver lagged, missed {n} events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    info!("{name}: event channel closed");
                    break;
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// MQTT command handler
// ---------------------------------------------------------------------------

/// Resolve the device and configured channel a switch command targets.
fn switch_target<'a>(devices: &'a [Device], cmd: &MqttCommand) -> Option<(&'a Device, usize)> {
    let device = match cmd.device.as_deref() {
        Some(name) => find_device(devices, name),
        None if devices.len() == 1 => devices.first(),
        None => None,
    }?;
    let channel = cmd.channel_index()?;
    device.channels.contains(&channel).then_some((device, channel))
}

async fn switch_channel(
    devices: Devices,
    cmd: MqttCommand,
    turn_on: bool,
    client: AsyncClient,
    topic: String,
    src_json: Option<serde_json::Value>,
) {
    let Some((device, channel)) = switch_target(&devices, &cmd) else {
        warn!(
            "{}: unknown device {:?} or channel {:?}",
            cmd.op, cmd.device, cmd.channel
        );
        publish_cmd_ack(&client, &topic, false, src_json, None).await;
        return;
    };

    let label = format!("{} CH{}", device.name(), channel + 1);
    info!("Command: {} {label}", cmd.op);
    match device.client.try_set_channel(channel, turn_on).await {
        Ok(on) => {
            device.poller.apply(channel, on).await;
            let data = serde_json::json!({
                "device": device.name(),
                "channel": channel + 1,
                "on": on,
            });
            publish_cmd_ack(&client, &topic, true, src_json, Some(data)).await;
        }
        Err(e) => {
            error!("{} {label} failed: {e}", cmd.op);
            publish_cmd_ack(&client, &topic, false, src_json, None).await;
        }
    }
}

async fn reconnect_devices(
    devices: Devices,
    target: Option<String>,
    client: AsyncClient,
    topic: String,
    src_json: Option<serde_json::Value>,
) {
    let targets: Vec<&Device> = match target.as_deref() {
        Some(name) => match find_device(&devices, name) {
            Some(device) => vec![device],
            None => {
                warn!("RECONNECT: unknown device {name}");
                publish_cmd_ack(&client, &topic, false, src_json, None).await;
                return;
            }
        },
        None => devices.iter().collect(),
    };
    for device in targets {
        info!("Command: RECONNECT {}", device.name());
        device.client.reconnect().await;
    }
    publish_cmd_ack(&client, &topic, true, src_json, None).await;
}

/// Dispatch one MQTT command. Anything that talks to a board runs on its own
/// task in `tasks`; the MQTT loop only waits for local work.
async fn handle_command(
    payload_str: &str,
    cmd: MqttCommand,
    client: &AsyncClient,
    topic: &str,
    devices: &Devices,
    tasks: &mut JoinSet<()>,
) {
    // Parse the raw payload as a JSON value for the CMD_ACK src field
    let src_json = serde_json::from_str::<serde_json::Value>(payload_str).ok();

    match cmd.op.as_str() {
        "SNAPSHOT" => {
            debug!("Command: SNAPSHOT");
            let snapshot = build_snapshot(devices).await;
            let snapshot_value = serde_json::to_value(&snapshot).ok();
            publish_json(client, topic, &snapshot, true).await;
            publish_cmd_ack(client, topic, true, src_json, snapshot_value).await;
        }

        "PING" => {
            info!("Command: PING");
            publish_cmd_ack(client, topic, true, src_json, None).await;
        }

        "TURN_ON" | "TURN_OFF" => {
            let turn_on = cmd.op == "TURN_ON";
            tasks.spawn(switch_channel(
                Arc::clone(devices),
                cmd,
                turn_on,
                client.clone(),
                topic.to_string(),
                src_json,
            ));
        }

        "RECONNECT" => {
            // disconnect() queues behind a running pulse or retry loop
            tasks.spawn(reconnect_devices(
                Arc::clone(devices),
                cmd.device,
                client.clone(),
                topic.to_string(),
                src_json,
            ));
        }

        other => {
            warn!("Unknown command: {other}");
            publish_cmd_ack(client, topic, false, src_json, None).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Build a client and poller for every valid device entry. Invalid entries
/// are logged and skipped. Each device comes with an event receiver that
/// subscribed before the first connect and poll.
async fn start_devices(entries: &[DeviceToml]) -> (Vec<Device>, Vec<(String, EventReceiver)>) {
    let mut devices = Vec::with_capacity(entries.len());
    let mut receivers = Vec::with_capacity(entries.len());
    for entry in entries {
        let config = build_device_config(entry);
        let channels = config.channels.indices();
        let client = match DeviceClient::new(config) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                error!("Skipping device {}: {e}", entry.name);
                continue;
            }
        };
        if devices.iter().any(|d: &Device| d.name() == entry.name) {
            error!("Skipping device {}: duplicate name", entry.name);
            continue;
        }

        receivers.push((entry.name.clone(), client.subscribe()));
        client.connect().await;
        let poller = Poller::spawn(Arc::clone(&client));
        devices.push(Device {
            client,
            poller,
            channels,
        });
    }
    (devices, receivers)
}

/// Stop every poller, then close every connection.
async fn stop_devices(devices: &[Device]) {
    for device in devices {
        device.poller.stop();
    }
    for device in devices {
        device.client.disconnect().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=tcp_switch=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    let (mut mqtt_host, mut mqtt_port) = parse_mqtt_url(&config.mqtt.url)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let publish_topic = config.mqtt.publish_topic.clone();
        let subscribe_topic = config.mqtt.subscribe_topic.clone();

        let (devices, receivers) = start_devices(&config.devices).await;
        let devices: Devices = Arc::new(devices);
        if devices.is_empty() {
            warn!("No usable devices configured");
        } else {
            info!("{} device(s) started", devices.len());
        }

        // Set up MQTT
        let mut mqtt_opts = MqttOptions::new(&config.mqtt.client_id, &mqtt_host, mqtt_port);
        mqtt_opts.set_keep_alive(Duration::from_secs(30));
        let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

        client
            .subscribe(&subscribe_topic, QoS::AtLeastOnce)
            .await
            .context("Failed to subscribe to MQTT topic")?;
        info!("MQTT: subscribed to {subscribe_topic}");

        // Task 1..n: device event forwarders
        let mut handles: Vec<JoinHandle<()>> = receivers
            .into_iter()
            .map(|(name, rx)| spawn_event_forwarder(name, rx, client.clone(), publish_topic.clone()))
            .collect();

        // MQTT event loop (receives messages, handles commands)
        let devices_cmds = Arc::clone(&devices);
        let client_cmds = client.clone();
        let topic_cmds = publish_topic.clone();
        let sub_topic = subscribe_topic.clone();
        handles.push(tokio::spawn(async move {
            // Dropped with this task, which aborts any command still running
            let mut tasks = JoinSet::new();
            loop {
                while tasks.try_join_next().is_some() {}
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // rumqttc does not resubscribe after a broker reconnect
                        info!("MQTT: connected, subscribing to {sub_topic}");
                        if let Err(e) = client_cmds.subscribe(&sub_topic, QoS::AtLeastOnce).await
                        {
                            error!("Failed to subscribe to {sub_topic}: {e}");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        if msg.topic == sub_topic {
                            let payload = String::from_utf8_lossy(&msg.payload);
                            match serde_json::from_str::<MqttCommand>(&payload) {
                                Ok(cmd) => {
                                    if cmd.op == "SNAPSHOT" {
                                        debug!("MQTT command received: {payload}");
                                    } else {
                                        info!("MQTT command received: {payload}");
                                    }
                                    handle_command(
                                        &payload,
                                        cmd,
                                        &client_cmds,
                                        &topic_cmds,
                                        &devices_cmds,
                                        &mut tasks,
                                    )
                                    .await;
                                }
                                Err(e) => {
                                    warn!("Failed to parse MQTT command: {e}");
                                }
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }));

        // Snapshot timer; the first tick publishes the initial snapshot
        let devices_snap = Arc::clone(&devices);
        let client_snap = client.clone();
        let topic_snap = publish_topic.clone();
        let snapshot_interval = Duration::from_secs(config.mqtt.snapshot_interval_secs.max(1));
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(snapshot_interval);
            loop {
                ticker.tick().await;
                publish_snapshot(&client_snap, &topic_snap, &devices_snap).await;
            }
        }));

        // Wait for a signal
        info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                true
            }
        };

        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let _ = handle.await;
        }

        stop_devices(&devices).await;
        drop(devices);
        if let Err(e) = client.disconnect().await {
            debug!("MQTT disconnect: {e}");
        }

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match load_config(&cli.config) {
            Ok(new_config) => match parse_mqtt_url(&new_config.mqtt.url) {
                Ok((new_host, new_port)) => {
                    mqtt_host = new_host;
                    mqtt_port = new_port;
                    config = new_config;
                    info!("Config reloaded successfully");
                }
                Err(e) => warn!("Invalid MQTT URL in new config, keeping previous: {e}"),
            },
            Err(e) => warn!("Failed to reload config, keeping previous: {e}"),
        }

        info!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str.parse().context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::{sleep, timeout};

    /// Two-channel board that answers every command with "10" and records
    /// what it received.
    struct Board {
        port: u16,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl Board {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&requests);
            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let log = Arc::clone(&log);
                    tokio::spawn(async move {
                        let mut buf = [0u8; 64];
                        while let Ok(n) = socket.read(&mut buf).await {
                            if n == 0 {
                                break;
                            }
                            let cmd = String::from_utf8_lossy(&buf[..n]).into_owned();
                            log.lock().unwrap().push(cmd);
                            if socket.write_all(b"10").await.is_err() {
                                break;
                            }
                        }
                    });
                }
            });
            Self { port, requests }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        async fn wait_for(&self, cmd: &str) {
            timeout(Duration::from_secs(2), async {
                while !self.requests().iter().any(|r| r == cmd) {
                    sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap();
        }

        fn device(&self, momentary_delay: u8) -> Device {
            let config = DeviceConfig::builder()
                .name("Bench")
                .host("127.0.0.1")
                .port(self.port)
                .channel_count(2)
                .momentary_delay(momentary_delay)
                .connect_timeout_ms(1000)
                .read_timeout_ms(2000)
                .build();
            let channels = config.channels.indices();
            let client = Arc::new(DeviceClient::new(config).unwrap());
            let poller = Poller::spawn_with_interval(Arc::clone(&client), Duration::from_millis(20));
            Device {
                client,
                poller,
                channels,
            }
        }
    }

    async fn dispatch(
        payload: &str,
        client: &AsyncClient,
        devices: &Devices,
        tasks: &mut JoinSet<()>,
    ) {
        let cmd: MqttCommand = serde_json::from_str(payload).unwrap();
        handle_command(payload, cmd, client, "tcpswitch", devices, tasks).await;
    }

    fn mqtt_client() -> (AsyncClient, rumqttc::EventLoop) {
        AsyncClient::new(MqttOptions::new("bridge-test", "localhost", 1883), 16)
    }

    #[tokio::test]
    async fn test_reconnect_does_not_wait_for_a_running_pulse() {
        let board = Board::start().await;
        let devices: Devices = Arc::new(vec![board.device(30)]);
        let (client, _eventloop) = mqtt_client();
        let mut tasks = JoinSet::new();

        dispatch(r#"{"op":"TURN_ON","device":"Bench","channel":1}"#, &client, &devices, &mut tasks)
            .await;
        // the switch now holds the device for its 30 s pulse
        board.wait_for("11:30").await;

        let reconnect = dispatch(r#"{"op":"RECONNECT","device":"Bench"}"#, &client, &devices, &mut tasks);
        timeout(Duration::from_secs(1), reconnect)
            .await
            .expect("RECONNECT held up the command loop");
        assert_eq!(tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_releases_devices_held_by_commands() {
        let board = Board::start().await;
        let devices: Devices = Arc::new(vec![board.device(60)]);
        let (client, _eventloop) = mqtt_client();
        let mut tasks = JoinSet::new();

        dispatch(r#"{"op":"TURN_ON","device":"Bench","channel":2}"#, &client, &devices, &mut tasks)
            .await;
        board.wait_for("12:60").await;

        // dropping the command set aborts the switch mid-pulse
        drop(tasks);
        timeout(Duration::from_secs(1), stop_devices(&devices))
            .await
            .expect("device still held by an aborted switch");
        assert!(!devices[0].poller.is_running());
        assert_eq!(Arc::strong_count(&devices), 1);

        let polls = board.requests().len();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(board.requests().len(), polls);
    }

    #[test]
    fn test_parse_mqtt_url() {
        assert_eq!(
            parse_mqtt_url("mqtt://broker.local:1883").unwrap(),
            ("broker.local".to_string(), 1883)
        );
        assert_eq!(
            parse_mqtt_url("10.0.0.5:8883").unwrap(),
            ("10.0.0.5".to_string(), 8883)
        );
        assert!(parse_mqtt_url("mqtt://broker.local").is_err());
        assert!(parse_mqtt_url("mqtt://broker.local:notaport").is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            url = "mqtt://localhost:1883"

            [[device]]
            name = "Garage"
            host = "192.168.1.50"
            "#,
        )
        .unwrap();

        assert_eq!(config.mqtt.publish_topic, "tcpswitch");
        assert_eq!(config.mqtt.subscribe_topic, "tcpswitch/cmd");
        assert_eq!(config.devices.len(), 1);

        let device = build_device_config(&config.devices[0]);
        assert_eq!(device.port, 6722);
        assert_eq!(device.channels, ChannelSelection::Count(2));
        assert_eq!(device.momentary_delay, 0);
        assert_eq!(device.connection_mode, ConnectionMode::Ephemeral);
    }

    #[test]
    fn test_config_channel_list_and_mode() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            url = "mqtt://localhost:1883"

            [[device]]
            name = "Gate"
            host = "10.0.0.9"
            channels = [1, 3]
            momentary_delay = 2
            connection_mode = "persistent"

            [[device]]
            name = "Pump"
            host = "10.0.0.10"
            channels = 8
            "#,
        )
        .unwrap();

        let gate = build_device_config(&config.devices[0]);
        assert_eq!(gate.channels.channel_count(), 3);
        assert_eq!(gate.channels.indices(), vec![0, 2]);
        assert_eq!(gate.momentary_delay, 2);
        assert_eq!(gate.connection_mode, ConnectionMode::Persistent);

        let pump = build_device_config(&config.devices[1]);
        assert_eq!(pump.channels.channel_count(), 8);
    }

    #[test]
    fn test_config_without_devices() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            url = "mqtt://localhost:1883"
            "#,
        )
        .unwrap();
        assert!(config.devices.is_empty());
    }
}

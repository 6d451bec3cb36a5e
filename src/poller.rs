// MIT License - Copyright (c) 2026 Peter Wright
// Periodic status polling

use std::sync::{Arc, Mutex};

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::client::DeviceClient;
use crate::devices::switch::{RelaySwitch, SwitchEvent};
use crate::event::{DeviceEvent, EventSender};
use crate::protocol::StatusSnapshot;
use crate::transport::Connector;

/// Polls one device on its own task and keeps its channel entities current.
///
/// The first poll runs immediately. Ticks that fall due while a slow poll
/// (or a momentary switch holding the client) is still running are delayed
/// rather than bunched up.
pub struct Poller {
    switches: Arc<RwLock<Vec<RelaySwitch>>>,
    event_tx: EventSender,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    /// Start polling at the device's effective poll interval.
    pub fn spawn<C: Connector>(client: Arc<DeviceClient<C>>) -> Self {
        let period = client.config().effective_poll_interval();
        Self::spawn_with_interval(client, period)
    }

    pub fn spawn_with_interval<C: Connector>(client: Arc<DeviceClient<C>>, period: Duration) -> Self {
        let switches: Vec<RelaySwitch> = client
            .config()
            .channels
            .indices()
            .into_iter()
            .map(|channel| RelaySwitch::new(channel, client.switch_name()))
            .collect();
        info!(
            "Polling {} every {:?} for {} channels",
            client.switch_name(),
            period,
            switches.len()
        );

        let switches = Arc::new(RwLock::new(switches));
        let event_tx = client.event_sender();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task_switches = Arc::clone(&switches);
        let task_events = event_tx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Updating {}", client.switch_name());
                        let snapshot = client.refresh().await;
                        apply_snapshot(&task_switches, &task_events, snapshot.as_ref()).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("Poller for {} shutting down", client.switch_name());
                            break;
                        }
                    }
                }
            }
        });

        Self {
            switches,
            event_tx,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Snapshot of the channel entities.
    pub async fn switches(&self) -> Vec<RelaySwitch> {
        self.switches.read().await.clone()
    }

    /// Record a state learned outside the poll loop, e.g. the result of a
    /// switch command. Returns the change event, if any.
    pub async fn apply(&self, channel: usize, on: bool) -> Option<SwitchEvent> {
        let mut switches = self.switches.write().await;
        let switch = switches.iter_mut().find(|s| s.channel == channel)?;
        switch.available = true;
        let event = switch.update(on);
        if event.is_some() {
            let _ = self.event_tx.send(DeviceEvent::ChannelChanged { channel, on });
        }
        event
    }

    /// Stop polling. Safe to call more than once, and through a shared
    /// reference.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Ok(mut handle) = self.handle.lock()
            && let Some(h) = handle.take()
        {
            h.abort();
        }
    }

    /// Whether the polling task is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Update every entity from one poll. A failed poll reads as off and marks
/// the entities unavailable.
async fn apply_snapshot(
    switches: &RwLock<Vec<RelaySwitch>>,
    event_tx: &EventSender,
    snapshot: Option<&StatusSnapshot>,
) {
    let mut switches = switches.write().await;
    for switch in switches.iter_mut() {
        let (on, available) = match snapshot.map(|s| s.is_on(switch.channel)) {
            Some(Ok(on)) => (on, true),
            _ => (false, false),
        };
        switch.available = available;
        if switch.update(on).is_some() {
            let _ = event_tx.send(DeviceEvent::ChannelChanged {
                channel: switch.channel,
                on,
            });
        }
    }
}

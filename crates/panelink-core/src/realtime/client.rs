// ── Realtime client ──
//
// Handle + background driver task. The driver is the only place that
// touches the state machine, the reconciler, the live link and the retry
// timer, so every transition happens in arrival order on one task.

use std::collections::BTreeSet;
use std::future::pending;
use std::sync::Arc;

use panelink_api::message::parse_server_message;
use panelink_api::websocket::display_endpoint;
use panelink_api::{ClientMessage, Error, Link, LinkEvent, ServerMessage, Transport};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::backoff::ReconnectConfig;
use super::machine::{ConnectionMachine, Directive};
use super::reconciler::{ChannelReconciler, ReconcileMode, SubscriptionIntent};
use super::state::ConnectionState;

const MESSAGE_CHANNEL_CAPACITY: usize = 1024;

/// Settings for a [`RealtimeClient`].
#[derive(Debug, Clone, Default)]
pub struct RealtimeConfig {
    pub reconnect: ReconnectConfig,
    pub reconcile: ReconcileMode,
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
}

// ── RealtimeClient ───────────────────────────────────────────────────

/// Handle to a self-healing realtime connection.
///
/// Nothing connects until [`connect`](Self::connect) is called. Inbound
/// messages are fanned out through a broadcast channel in arrival order;
/// a consumer that falls behind receives `RecvError::Lagged` instead of
/// stalling the connection. Dropping the handle stops the driver task.
pub struct RealtimeClient {
    command_tx: mpsc::UnboundedSender<Command>,
    channels: watch::Sender<BTreeSet<String>>,
    state_rx: watch::Receiver<ConnectionState>,
    connected_rx: watch::Receiver<bool>,
    message_tx: broadcast::Sender<Arc<ServerMessage>>,
    cancel: CancellationToken,
}

impl RealtimeClient {
    /// Spawn the driver task on the current tokio runtime.
    pub fn spawn<T: Transport>(transport: T, endpoint: Url, config: RealtimeConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (channels, channels_rx) = watch::channel(BTreeSet::new());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (connected_tx, connected_rx) = watch::channel(false);
        let (message_tx, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let driver = Driver {
            transport,
            endpoint,
            keepalive: config.reconnect.keepalive,
            machine: ConnectionMachine::new(config.reconnect),
            reconciler: ChannelReconciler::new(config.reconcile),
            link: None,
            deadline: None,
            command_rx,
            channels_rx,
            state_tx,
            connected_tx,
            message_tx: message_tx.clone(),
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run());

        Self {
            command_tx,
            channels,
            state_rx,
            connected_rx,
            message_tx,
            cancel,
        }
    }

    /// Ask for the connection to be opened (or re-opened after a rejection).
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Tear the connection down and clear all retry bookkeeping.
    /// Safe to call repeatedly and from any state.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Stop the driver task for good.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Replace the desired channel set.
    pub fn set_channels<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: BTreeSet<String> = channels.into_iter().map(Into::into).collect();
        self.channels.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    pub fn add_channel(&self, channel: impl Into<String>) {
        let channel = channel.into();
        self.channels.send_if_modified(|current| current.insert(channel));
    }

    pub fn remove_channel(&self, channel: &str) {
        self.channels.send_if_modified(|current| current.remove(channel));
    }

    pub fn desired_channels(&self) -> BTreeSet<String> {
        self.channels.borrow().clone()
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch the "is connected" signal.
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Get a new receiver for inbound messages.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ServerMessage>> {
        self.message_tx.subscribe()
    }

    fn send(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            debug!("realtime driver already stopped");
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Driver task ──────────────────────────────────────────────────────

/// Why the driver woke up.
enum Wake {
    Shutdown,
    Command(Command),
    ChannelsChanged,
    Timer,
    Keepalive,
    Link(LinkEvent),
}

struct Driver<T: Transport> {
    transport: T,
    endpoint: Url,
    keepalive: Option<std::time::Duration>,
    machine: ConnectionMachine,
    reconciler: ChannelReconciler,
    link: Option<T::Link>,
    deadline: Option<Instant>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    channels_rx: watch::Receiver<BTreeSet<String>>,
    state_tx: watch::Sender<ConnectionState>,
    connected_tx: watch::Sender<bool>,
    message_tx: broadcast::Sender<Arc<ServerMessage>>,
    cancel: CancellationToken,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self) {
        let mut keepalive = self.keepalive.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let wake = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Wake::Shutdown,
                command = self.command_rx.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => Wake::Shutdown,
                },
                changed = self.channels_rx.changed() => match changed {
                    Ok(()) => Wake::ChannelsChanged,
                    Err(_) => Wake::Shutdown,
                },
                () = sleep_until(self.deadline) => Wake::Timer,
                () = tick(keepalive.as_mut(), self.link.is_some()) => Wake::Keepalive,
                event = next_event(self.link.as_mut()) => Wake::Link(event),
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Command(Command::Connect) => {
                    let directive = self.machine.connect(Instant::now());
                    self.publish();
                    self.apply(directive).await;
                }
                Wake::Command(Command::Disconnect) => {
                    self.deadline = None;
                    self.close_link().await;
                    self.machine.disconnect();
                    self.publish();
                    debug!("realtime client disconnected");
                }
                Wake::ChannelsChanged => self.reconcile_changed().await,
                Wake::Timer => {
                    self.deadline = None;
                    let directive = self.machine.on_timer(Instant::now());
                    self.publish();
                    self.apply(directive).await;
                }
                Wake::Keepalive => {
                    trace!("sending keepalive ping");
                    if let Err(e) = self.send_message(&ClientMessage::Ping).await {
                        self.link_failed(&e).await;
                    }
                }
                Wake::Link(event) => self.handle_link_event(event).await,
            }
        }

        self.deadline = None;
        self.close_link().await;
        self.machine.disconnect();
        self.publish();
        debug!("realtime driver exiting");
    }

    /// Carry out a directive. Failed opens feed straight back into the
    /// machine until it settles on a wait or on nothing.
    async fn apply(&mut self, mut directive: Directive) {
        loop {
            match directive {
                Directive::Idle => return,
                Directive::Wait(delay) => {
                    self.deadline = Some(Instant::now() + delay);
                    return;
                }
                Directive::Open => {
                    self.deadline = None;
                    self.close_link().await;
                    directive = self.open().await;
                    self.publish();
                }
            }
        }
    }

    async fn open(&mut self) -> Directive {
        info!(endpoint = %display_endpoint(&self.endpoint), "connecting realtime channel");

        // Commands stay live while the handshake runs; a disconnect drops
        // the pending open.
        let result = {
            let open = self.transport.open(&self.endpoint);
            tokio::pin!(open);
            loop {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Directive::Idle,
                    command = self.command_rx.recv() => match command {
                        Some(Command::Connect) => trace!("connect ignored, attempt in flight"),
                        Some(Command::Disconnect) | None => {
                            debug!("connection attempt abandoned");
                            self.machine.disconnect();
                            return Directive::Idle;
                        }
                    },
                    result = &mut open => break result,
                }
            }
        };

        match result {
            Ok(link) => {
                self.machine.on_open();
                self.link = Some(link);
                let desired = self.channels_rx.borrow_and_update().clone();
                let intents = self.reconciler.on_open(&desired);
                match self.announce(intents).await {
                    Ok(()) => {
                        info!("realtime channel connected");
                        Directive::Idle
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to announce channels");
                        self.close_link().await;
                        self.machine.on_error(Instant::now())
                    }
                }
            }
            Err(e) if e.is_auth_rejected() => self.machine.on_rejected(),
            Err(e) => {
                warn!(error = %e, attempt = self.machine.attempt(), "realtime connect failed");
                self.machine.on_error(Instant::now())
            }
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Text(text) => match parse_server_message(&text) {
                Ok(message) => {
                    trace!(kind = %message.kind, "realtime message");
                    // No subscribers is fine.
                    let _ = self.message_tx.send(Arc::new(message));
                }
                Err(e) => debug!(error = %e, "dropping malformed realtime message"),
            },
            LinkEvent::Closed { code, reason } => {
                debug!(?code, reason = %reason, "realtime link closed");
                self.link = None;
                let directive = self.machine.on_close(code, Instant::now());
                self.publish();
                self.apply(directive).await;
            }
            LinkEvent::Failed(reason) => {
                self.link_failed(&Error::WebSocketConnect(reason)).await;
            }
        }
    }

    async fn link_failed(&mut self, error: &Error) {
        info!(error = %error, "realtime link failed");
        self.close_link().await;
        let directive = self.machine.on_error(Instant::now());
        self.publish();
        self.apply(directive).await;
    }

    async fn reconcile_changed(&mut self) {
        let desired = self.channels_rx.borrow_and_update().clone();
        let connected = self.machine.state().is_connected() && self.link.is_some();
        let intents = self.reconciler.on_desired_changed(&desired, connected);
        if let Err(e) = self.announce(intents).await {
            self.link_failed(&e).await;
        }
    }

    async fn announce(&mut self, intents: Vec<SubscriptionIntent>) -> Result<(), Error> {
        for intent in intents {
            debug!(channel = %intent.channel, kind = ?intent.kind, "channel intent");
            self.send_message(&ClientMessage::from(intent)).await?;
        }
        Ok(())
    }

    async fn send_message(&mut self, message: &ClientMessage) -> Result<(), Error> {
        match self.link.as_mut() {
            Some(link) => link.send(message).await,
            None => Ok(()),
        }
    }

    async fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
    }

    fn publish(&self) {
        let state = self.machine.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        let connected = state.is_connected();
        self.connected_tx.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => pending().await,
    }
}

async fn tick(interval: Option<&mut Interval>, active: bool) {
    match interval {
        Some(interval) if active => {
            interval.tick().await;
        }
        _ => pending().await,
    }
}

async fn next_event<L: Link>(link: Option<&mut L>) -> LinkEvent {
    match link {
        Some(link) => link.next_event().await,
        None => pending().await,
    }
}

use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use courier_db::Database;
use courier_types::{SyncCommand, SyncEvent};

use crate::backoff::ReconnectPolicy;
use crate::feed;
use crate::listener::{self, ListenerHandle};
use crate::registry::{ClientFrame, ClientId, ClientSender, Registry};

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub listen_addr: SocketAddr,
    reconnect: ReconnectPolicy,
}

impl EngineConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)))
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to bind sync listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("sync engine has shut down")]
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Listening,
    /// The listener died; a restart is pending or retries are exhausted.
    Degraded,
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub state: EngineState,
    pub is_connected: bool,
    pub reconnect_attempts: u32,
    pub clients: usize,
    pub feed_running: bool,
    pub messages_generated: u64,
    /// How many times a listener has been bound, including restarts.
    pub listener_starts: u64,
    pub local_addr: Option<SocketAddr>,
}

pub(crate) type CommandSender = mpsc::UnboundedSender<Command>;

pub(crate) enum Command {
    Start {
        reply: oneshot::Sender<Result<SocketAddr, EngineError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Attach {
        id: ClientId,
        sender: ClientSender,
    },
    Detach {
        id: ClientId,
    },
    Client {
        id: ClientId,
        command: SyncCommand,
    },
    ListenerExited {
        generation: u64,
        error: String,
    },
}

/// Handle to the sync engine's control loop.
///
/// All registry, timer and state changes happen inside one spawned task;
/// the handle only sends it commands, so it is cheap to clone and share.
#[derive(Clone)]
pub struct SyncEngine {
    commands: CommandSender,
}

impl SyncEngine {
    /// Spawn the control loop in the `Stopped` state. Must be called from
    /// within a Tokio runtime.
    pub fn spawn(db: Arc<Database>, config: EngineConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let control = ControlLoop::new(db, config, tx.downgrade(), rx);
        tokio::spawn(control.run());
        Self { commands: tx }
    }

    /// Bind the listener and mark the engine connected. Resets the reconnect
    /// budget. Already listening: returns the current address.
    pub async fn start(&self) -> Result<SocketAddr, EngineError> {
        self.request(|reply| Command::Start { reply }).await?
    }

    /// Cancel both timers, close every client and shut the listener down.
    /// Safe in any state.
    pub async fn stop(&self) {
        let _ = self.request(|reply| Command::Stop { reply }).await;
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Attach an in-process client. It is treated exactly like a WebSocket
    /// connection: it receives the current status immediately, then every
    /// broadcast, until it is dropped or the engine stops.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.commands.send(Command::Attach { id, sender: tx });
        Subscription {
            id,
            events: rx,
            commands: self.commands.clone(),
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| EngineError::Shutdown)?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }
}

/// An in-process client of the sync engine. Dropping it detaches it.
pub struct Subscription {
    id: ClientId,
    events: mpsc::UnboundedReceiver<ClientFrame>,
    commands: CommandSender,
}

impl Subscription {
    /// Next event, or `None` once the engine has closed this client.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        match self.events.recv().await? {
            ClientFrame::Event(event) => Some(event),
            ClientFrame::Close => {
                self.events.close();
                None
            }
        }
    }

    /// Ask for the current connectivity flag. The answer arrives through
    /// [`Subscription::recv`] as a `ConnectionStatus` event.
    pub fn request_status(&self) {
        let _ = self.commands.send(Command::Client {
            id: self.id,
            command: SyncCommand::RequestStatus,
        });
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Detach { id: self.id });
    }
}

struct ControlLoop {
    db: Arc<Database>,
    config: EngineConfig,
    /// Weak so the loop ends once every handle, client and listener is gone.
    commands_tx: mpsc::WeakUnboundedSender<Command>,
    commands: mpsc::UnboundedReceiver<Command>,
    registry: Registry,
    state: EngineState,
    is_connected: bool,
    policy: ReconnectPolicy,
    listener: Option<ListenerHandle>,
    listener_starts: u64,
    feed_timer: Option<Pin<Box<Sleep>>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    messages_generated: u64,
}

impl ControlLoop {
    fn new(
        db: Arc<Database>,
        config: EngineConfig,
        commands_tx: mpsc::WeakUnboundedSender<Command>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let policy = config.reconnect.clone();
        Self {
            db,
            config,
            commands_tx,
            commands,
            registry: Registry::new(),
            state: EngineState::Stopped,
            is_connected: false,
            policy,
            listener: None,
            listener_starts: 0,
            feed_timer: None,
            reconnect_timer: None,
            messages_generated: 0,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                () = wait_for(&mut self.feed_timer) => self.fire_feed().await,
                () = wait_for(&mut self.reconnect_timer) => self.fire_reconnect().await,
            }
        }
        self.shutdown();
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                self.shutdown();
                let _ = reply.send(());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Attach { id, sender } => self.attach(id, sender),
            Command::Detach { id } => self.detach(id),
            Command::Client {
                id,
                command: SyncCommand::RequestStatus,
            } => self.registry.send_to(id, self.status_event()),
            Command::ListenerExited { generation, error } => {
                self.listener_exited(generation, error)
            }
        }
    }

    async fn start(&mut self) -> Result<SocketAddr, EngineError> {
        if let (EngineState::Listening, Some(listener)) = (self.state, &self.listener) {
            return Ok(listener.addr);
        }
        self.bind_listener().await
    }

    /// Bind a fresh listener. On success the engine is `Listening`, connected,
    /// and the reconnect budget is restored.
    async fn bind_listener(&mut self) -> Result<SocketAddr, EngineError> {
        let addr = self.config.listen_addr;
        let generation = self.listener_starts + 1;
        let commands = self.commands_tx.upgrade().ok_or(EngineError::Shutdown)?;
        let handle = listener::bind(addr, generation, commands)
            .await
            .map_err(|source| EngineError::Bind { addr, source })?;

        let local_addr = handle.addr;
        if let Some(previous) = self.listener.replace(handle) {
            previous.shutdown();
        }
        self.listener_starts = generation;
        self.reconnect_timer = None;
        self.policy.reset();
        self.state = EngineState::Listening;
        info!("Sync listener bound on {}", local_addr);

        self.set_connected(true);
        self.update_feed();
        Ok(local_addr)
    }

    fn listener_exited(&mut self, generation: u64, error: String) {
        let current = self.listener.as_ref().map(|l| l.generation);
        if current != Some(generation) {
            debug!("Ignoring exit of stale listener generation {}", generation);
            return;
        }

        error!("Sync listener failed: {}", error);

        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }
        self.state = EngineState::Degraded;
        self.set_connected(false);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self.policy.next_delay() {
            Some(delay) => {
                info!(
                    "Attempting to reconnect in {}ms (attempt {}/{})",
                    delay.as_millis(),
                    self.policy.attempts(),
                    self.policy.max_attempts()
                );
                self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
            }
            None => {
                self.reconnect_timer = None;
                error!(
                    "Max reconnection attempts reached ({}); staying disconnected until restarted",
                    self.policy.max_attempts()
                );
            }
        }
    }

    async fn fire_reconnect(&mut self) {
        self.reconnect_timer = None;
        if self.state != EngineState::Degraded {
            return;
        }

        info!("Restarting sync listener");
        if let Err(e) = self.bind_listener().await {
            warn!("Reconnect failed: {}", e);
            self.schedule_reconnect();
        }
    }

    fn attach(&mut self, id: ClientId, sender: ClientSender) {
        if self.state == EngineState::Stopped {
            debug!("Rejecting client {} while stopped", id);
            let _ = sender.send(ClientFrame::Close);
            return;
        }

        let _ = sender.send(ClientFrame::Event(self.status_event()));
        self.registry.insert(id, sender);
        info!("Client {} attached ({} connected)", id, self.registry.len());
        self.update_feed();
    }

    fn detach(&mut self, id: ClientId) {
        if self.registry.remove(id) {
            info!("Client {} detached ({} connected)", id, self.registry.len());
            self.update_feed();
        }
    }

    /// The feed runs exactly when the engine is up and someone is attached.
    fn update_feed(&mut self) {
        let should_run = self.state != EngineState::Stopped && !self.registry.is_empty();
        match (should_run, self.feed_timer.is_some()) {
            (true, false) => {
                self.arm_feed();
                debug!("Feed generator started");
            }
            (false, true) => {
                self.feed_timer = None;
                debug!("Feed generator stopped");
            }
            _ => {}
        }
    }

    fn arm_feed(&mut self) {
        let delay = feed::next_interval(&mut rand::rng());
        self.feed_timer = Some(Box::pin(tokio::time::sleep(delay)));
    }

    async fn fire_feed(&mut self) {
        self.feed_timer = None;

        let db = self.db.clone();
        match tokio::task::spawn_blocking(move || feed::synthesize(&db)).await {
            Ok(Ok(Some(message))) => {
                self.messages_generated += 1;
                self.registry.broadcast(&SyncEvent::NewMessage(message));
            }
            Ok(Ok(None)) => debug!("No chats available for the feed"),
            Ok(Err(e)) => error!("Error generating random message: {}", e),
            Err(e) => error!("spawn_blocking join error: {}", e),
        }

        self.update_feed();
    }

    fn set_connected(&mut self, connected: bool) {
        if self.is_connected == connected {
            return;
        }
        self.is_connected = connected;
        self.registry.broadcast(&self.status_event());
    }

    fn status_event(&self) -> SyncEvent {
        SyncEvent::ConnectionStatus {
            is_connected: self.is_connected,
        }
    }

    fn shutdown(&mut self) {
        self.feed_timer = None;
        self.reconnect_timer = None;

        let closed = self.registry.close_all();
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }

        if self.state != EngineState::Stopped {
            info!("Sync engine stopped ({} clients closed)", closed);
        }
        self.state = EngineState::Stopped;
        self.is_connected = false;
        self.policy.reset();
    }

    fn snapshot(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            is_connected: self.is_connected,
            reconnect_attempts: self.policy.attempts(),
            clients: self.registry.len(),
            feed_running: self.feed_timer.is_some(),
            messages_generated: self.messages_generated,
            listener_starts: self.listener_starts,
            local_addr: self.listener.as_ref().map(|l| l.addr),
        }
    }
}

async fn wait_for(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

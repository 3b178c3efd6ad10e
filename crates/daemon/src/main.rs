//! hyprdock Daemon
//!
//! Keeps a dock's task list in sync with a running Hyprland instance.
//!
//! Responsibilities:
//! - Fetch compositor snapshots and rebuild the presentation list
//! - Turn compositor events into coalesced refreshes
//! - Persist pinned items
//! - Handle IPC commands from the CLI and renderers
//! - Dock visibility (signals, pointer, hide timer)

mod config;
mod desktop;
mod pins;
mod render;
mod signals;
mod state;
mod trigger;
mod visibility;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, DisplayMode};
use desktop::{DesktopCatalog, LaunchCommand};
use hyprdock_core::{Snapshot, WindowAddress};
use hyprdock_hyprland::{
    run_event_pump, EventPumpConfig, HyprClient, HyprError, HyprEvent, HyprlandPaths,
    SnapshotBuilder,
};
use hyprdock_ipc::{
    encode_line, IpcCommand, IpcResponse, MAX_IPC_MESSAGE_SIZE, MAX_IPC_RESPONSE_SIZE,
};
use pins::PinnedSet;
use signals::RequestSlot;
use state::{ActionError, Activation, DockActions, DockState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use trigger::{FetchRequest, ReconcileTrigger};
use visibility::{Visibility, VisibilityRequest};

/// Events that the daemon event loop processes.
enum DaemonEvent {
    /// An IPC command from a client.
    IpcCommand {
        cmd: IpcCommand,
        responder: oneshot::Sender<IpcResponse>,
    },
    /// A line from the compositor event stream.
    Compositor(HyprEvent),
    /// A snapshot fetch finished.
    SnapshotFetched {
        result: Result<Snapshot, HyprError>,
        force: bool,
    },
    /// Periodic safety-net refresh.
    ReconcileTick,
    /// Hide-after-leave timer fired.
    HideTimer { generation: u64 },
    /// The event pump gave up reconnecting.
    EventStreamFailed(HyprError),
    /// Shutdown signal.
    Shutdown,
}

/// Timeout for reading an IPC command from a client.
const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the compositor event queue.
const EVENT_QUEUE_CAPACITY: usize = 64;

const SIGNAL_HELP: &str = "\
Signals:
  SIGRTMIN+1  toggle the dock
  SIGRTMIN+2  show the dock
  SIGRTMIN+3  hide the dock
  SIGUSR1     toggle the dock (deprecated)";

#[derive(Parser, Debug)]
#[command(name = "hyprdock")]
#[command(about = "Dock daemon for the Hyprland compositor", long_about = None)]
#[command(version, after_help = SIGNAL_HELP)]
struct Args {
    /// Config file to use instead of the standard locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Force debug logging
    #[arg(long)]
    debug: bool,

    /// Start hidden, show on request, hide after the pointer leaves
    #[arg(short = 'd', long)]
    autohide: bool,

    /// Start visible and follow show/hide/toggle requests
    #[arg(short, long)]
    resident: bool,

    /// Allow more than one instance
    #[arg(short, long)]
    multiple: bool,
}

/// Display mode flags given on the command line.
#[derive(Debug, Clone, Copy, Default)]
struct ModeFlags {
    autohide: bool,
    resident: bool,
}

impl ModeFlags {
    /// Override the configured mode. Returns a warning when both flags are set.
    fn apply(self, config: &mut Config) -> Option<&'static str> {
        match (self.autohide, self.resident) {
            (true, true) => {
                config.behavior.mode = DisplayMode::Resident;
                Some("--autohide and --resident are mutually exclusive, ignoring --autohide")
            }
            (false, true) => {
                config.behavior.mode = DisplayMode::Resident;
                None
            }
            (true, false) => {
                config.behavior.mode = DisplayMode::Autohide;
                None
            }
            (false, false) => None,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO, // default fallback for invalid values
    }
}

/// A compositor dispatch requested by a client.
#[derive(Debug)]
enum Dispatch {
    Focus(WindowAddress),
    Close(WindowAddress),
    Move(WindowAddress, u32),
}

/// Result of handling one event.
enum LoopExit {
    Shutdown,
    Fatal(HyprError),
}

/// Everything the event loop owns.
struct Daemon {
    state: DockState,
    visibility: Visibility,
    trigger: ReconcileTrigger,
    builder: SnapshotBuilder,
    paths: HyprlandPaths,
    config_path: Option<PathBuf>,
    mode_flags: ModeFlags,
    event_tx: mpsc::Sender<DaemonEvent>,
    requests: RequestSlot,
    visible_tx: watch::Sender<bool>,
    hide_timer: Option<JoinHandle<()>>,
    reconcile_timer: Option<JoinHandle<()>>,
}

fn snapshot_builder(paths: &HyprlandPaths, config: &Config) -> SnapshotBuilder {
    let client = HyprClient::new(paths.clone()).with_timeout(config.command_timeout());
    SnapshotBuilder::new(client, config.snapshot_filter())
}

fn load_pins(config: &Config) -> PinnedSet {
    match config.pinned_file() {
        Some(path) => {
            let pins = PinnedSet::load(path);
            if let Some(path) = pins.path() {
                debug!("Pinned items file: {}", path.display());
            }
            pins
        }
        None => {
            warn!("No cache directory available, pinned items will not persist");
            PinnedSet::default()
        }
    }
}

fn action_error(e: ActionError) -> IpcResponse {
    warn!("{}", e);
    IpcResponse::error(e.to_string())
}

impl Daemon {
    fn new(
        state: DockState,
        paths: HyprlandPaths,
        event_tx: mpsc::Sender<DaemonEvent>,
        requests: RequestSlot,
    ) -> Self {
        let visibility = Visibility::new(state.config().behavior.mode);
        let (visible_tx, _) = watch::channel(visibility.is_visible());
        Self {
            builder: snapshot_builder(&paths, state.config()),
            state,
            visibility,
            trigger: ReconcileTrigger::new(),
            paths,
            config_path: None,
            mode_flags: ModeFlags::default(),
            event_tx,
            requests,
            visible_tx,
            hide_timer: None,
            reconcile_timer: None,
        }
    }

    fn handle_event(&mut self, event: DaemonEvent) -> Option<LoopExit> {
        match event {
            DaemonEvent::IpcCommand { cmd, responder } => self.handle_command(cmd, responder),
            DaemonEvent::Compositor(event) => {
                debug!("Compositor event: {:?}", event);
                if let Some(request) = self.trigger.on_event(&event) {
                    self.start_fetch(request);
                }
            }
            DaemonEvent::SnapshotFetched { result, force } => {
                match result {
                    Ok(snapshot) => {
                        self.state.apply_snapshot(snapshot, force);
                    }
                    Err(e) => warn!("Snapshot fetch failed, keeping last state: {}", e),
                }
                if let Some(next) = self.trigger.complete() {
                    self.start_fetch(next);
                }
            }
            DaemonEvent::ReconcileTick => self.request_refresh(false),
            DaemonEvent::HideTimer { generation } => {
                self.hide_timer = None;
                if self.visibility.hide_timer_fired(generation) {
                    self.publish_visibility();
                }
            }
            DaemonEvent::EventStreamFailed(e) => return Some(LoopExit::Fatal(e)),
            DaemonEvent::Shutdown => return Some(LoopExit::Shutdown),
        }
        None
    }

    fn handle_command(&mut self, cmd: IpcCommand, responder: oneshot::Sender<IpcResponse>) {
        let response = match cmd {
            IpcCommand::Toggle => self.post_visibility(VisibilityRequest::Toggle),
            IpcCommand::Show => self.post_visibility(VisibilityRequest::Show),
            IpcCommand::Hide => self.post_visibility(VisibilityRequest::Hide),
            IpcCommand::Pin { key } => match self.state.on_pin(&key) {
                Ok(()) => IpcResponse::Ok,
                Err(e) => action_error(e),
            },
            IpcCommand::Unpin { key } => match self.state.on_unpin(&key) {
                Ok(()) => IpcResponse::Ok,
                Err(e) => action_error(e),
            },
            IpcCommand::Activate { key } => match self.state.on_activate(&key) {
                Ok(Activation::Launch(command)) => self.launch(&command),
                Ok(Activation::Focus(address)) => {
                    return self.spawn_dispatch(Dispatch::Focus(address), responder);
                }
                Ok(Activation::Menu(entries)) => IpcResponse::Menu { key, entries },
                Err(e) => action_error(e),
            },
            IpcCommand::SecondaryAction { key } => match self.state.on_secondary_action(&key) {
                Ok(entries) => IpcResponse::Menu { key, entries },
                Err(e) => action_error(e),
            },
            IpcCommand::FocusWindow { address } => {
                return self.spawn_dispatch(Dispatch::Focus(address), responder);
            }
            IpcCommand::CloseWindow { address } => {
                return self.spawn_dispatch(Dispatch::Close(address), responder);
            }
            IpcCommand::MoveToWorkspace { address, workspace } => {
                return self.spawn_dispatch(Dispatch::Move(address, workspace), responder);
            }
            IpcCommand::Launch { key } => match self.state.launch_command(&key) {
                Ok(command) => self.launch(&command),
                Err(e) => action_error(e),
            },
            IpcCommand::PointerEnter => {
                self.cancel_hide_timer();
                if self.visibility.pointer_enter() {
                    self.publish_visibility();
                }
                IpcResponse::Ok
            }
            IpcCommand::PointerLeave => {
                if let Some(generation) = self.visibility.pointer_leave() {
                    self.arm_hide_timer(generation);
                }
                IpcResponse::Ok
            }
            IpcCommand::QueryTasks => IpcResponse::Tasks {
                icon_size: self.state.presentation().icon_size,
                visible: self.visibility.is_visible(),
                position: self.state.config().dock.position,
                alignment: self.state.config().dock.alignment,
                entries: self.state.dock_entries(),
            },
            IpcCommand::Refresh => {
                self.request_refresh(true);
                IpcResponse::Ok
            }
            IpcCommand::Reload => match self.reload() {
                Ok(()) => IpcResponse::Ok,
                Err(e) => {
                    warn!("Config reload failed: {:#}", e);
                    IpcResponse::error(format!("Config reload failed: {:#}", e))
                }
            },
            // The IPC server signals shutdown once the reply is written.
            IpcCommand::Stop => IpcResponse::Ok,
        };

        if responder.send(response).is_err() {
            debug!("Client disconnected before receiving IPC response");
        }
    }

    /// Queue a show/hide request on the single-slot channel.
    fn post_visibility(&self, request: VisibilityRequest) -> IpcResponse {
        self.requests.send_replace(Some(request));
        IpcResponse::Ok
    }

    /// Apply a request taken off the slot.
    fn apply_visibility(&mut self, request: VisibilityRequest) {
        if self.visibility.apply(request) {
            self.publish_visibility();
        }
    }

    fn publish_visibility(&self) {
        self.visible_tx.send_replace(self.visibility.is_visible());
    }

    fn launch(&mut self, command: &LaunchCommand) -> IpcResponse {
        match command.spawn() {
            Ok(()) => {
                if self.visibility.after_launch() {
                    self.publish_visibility();
                }
                IpcResponse::Ok
            }
            Err(e) => {
                warn!("Failed to launch {}: {}", command.program, e);
                IpcResponse::error(format!("Failed to launch {}: {}", command.program, e))
            }
        }
    }

    fn spawn_dispatch(&self, dispatch: Dispatch, responder: oneshot::Sender<IpcResponse>) {
        let client = self.builder.client().clone();
        tokio::spawn(async move {
            let result = match &dispatch {
                Dispatch::Focus(address) => client.focus_window(address).await,
                Dispatch::Close(address) => client.close_window(address).await,
                Dispatch::Move(address, workspace) => {
                    client.move_to_workspace(address, *workspace).await
                }
            };
            let response = match result {
                Ok(()) => IpcResponse::Ok,
                Err(e) => {
                    warn!("{:?} failed: {}", dispatch, e);
                    IpcResponse::error(e.to_string())
                }
            };
            if responder.send(response).is_err() {
                debug!("Client disconnected before receiving IPC response");
            }
        });
    }

    fn request_refresh(&mut self, force: bool) {
        if let Some(request) = self.trigger.request(force) {
            self.start_fetch(request);
        }
    }

    /// Run a snapshot fetch off the loop; the result comes back as an event.
    fn start_fetch(&self, request: FetchRequest) {
        let builder = self.builder.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = builder.build().await;
            let _ = tx
                .send(DaemonEvent::SnapshotFetched {
                    result,
                    force: request.force,
                })
                .await;
        });
    }

    fn arm_hide_timer(&mut self, generation: u64) {
        self.cancel_hide_timer();
        let delay = self.state.config().hide_delay();
        let tx = self.event_tx.clone();
        self.hide_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(DaemonEvent::HideTimer { generation }).await;
        }));
    }

    fn cancel_hide_timer(&mut self) {
        if let Some(handle) = self.hide_timer.take() {
            handle.abort();
        }
    }

    fn restart_reconcile_timer(&mut self) {
        if let Some(handle) = self.reconcile_timer.take() {
            handle.abort();
        }
        let Some(period) = self.state.config().reconcile_interval() else {
            info!("Safety-net refresh disabled");
            return;
        };
        let tx = self.event_tx.clone();
        self.reconcile_timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await; // first tick completes immediately
            loop {
                interval.tick().await;
                if tx.send(DaemonEvent::ReconcileTick).await.is_err() {
                    break; // Channel closed
                }
            }
        }));
    }

    /// Re-read the config file and the pinned file.
    fn reload(&mut self) -> Result<()> {
        let mut config = Config::load(self.config_path.as_deref())?;
        for w in config.validate() {
            warn!("Config: {} - {}", w.field, w.message);
        }
        if let Some(warning) = self.mode_flags.apply(&mut config) {
            warn!("{}", warning);
        }

        let pins = load_pins(&config);
        self.builder = snapshot_builder(&self.paths, &config);
        self.visibility.set_mode(config.behavior.mode);
        self.cancel_hide_timer();
        self.publish_visibility();
        self.state.reload(config, pins);
        self.restart_reconcile_timer();
        self.request_refresh(true);
        Ok(())
    }

    fn shutdown(&mut self) {
        self.cancel_hide_timer();
        if let Some(handle) = self.reconcile_timer.take() {
            handle.abort();
        }
    }
}

/// Run the IPC server, accepting connections and dispatching commands.
async fn run_ipc_server(listener: UnixListener, event_tx: mpsc::Sender<DaemonEvent>) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                error!("Failed to accept client connection: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        debug!("Client connected");

        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, event_tx).await {
                warn!("Client handler error: {}", e);
            }
        });
    }
}

fn response_line(response: &IpcResponse) -> String {
    match encode_line(response) {
        Ok(line) => line,
        Err(e) => {
            warn!("Failed to serialize IPC response: {}", e);
            "{\"status\":\"error\",\"message\":\"Internal serialization error\"}\n".to_string()
        }
    }
}

/// Handle a single client connection.
async fn handle_client<S>(stream: S, event_tx: mpsc::Sender<DaemonEvent>) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let limited_reader = reader.take(MAX_IPC_MESSAGE_SIZE as u64);
    let mut reader = BufReader::new(limited_reader);
    let mut line = String::new();

    // Read command (single line of JSON) with timeout and size bound
    let read_result = tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line)).await;
    let bytes_read = match read_result {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            // Timeout: client did not send in time, silently close
            return Ok(());
        }
    };
    if bytes_read == 0 {
        return Ok(()); // Client disconnected
    }

    let line = line.trim();
    debug!("Received command: {}", line);

    let cmd: IpcCommand = match serde_json::from_str(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            let response = IpcResponse::error(format!("Invalid command: {}", e));
            writer.write_all(response_line(&response).as_bytes()).await?;
            return Ok(());
        }
    };

    let is_stop = matches!(cmd, IpcCommand::Stop);

    let (resp_tx, resp_rx) = oneshot::channel();
    if event_tx
        .send(DaemonEvent::IpcCommand {
            cmd,
            responder: resp_tx,
        })
        .await
        .is_err()
    {
        let response = IpcResponse::error("Daemon is shutting down");
        writer.write_all(response_line(&response).as_bytes()).await?;
        return Ok(());
    }

    let response = match resp_rx.await {
        Ok(resp) => resp,
        Err(_) => IpcResponse::error("Failed to get response from daemon"),
    };
    writer.write_all(response_line(&response).as_bytes()).await?;
    writer.flush().await?;

    if is_stop {
        let _ = event_tx.send(DaemonEvent::Shutdown).await;
    }

    Ok(())
}

/// Forward events from a typed channel into the daemon event queue.
fn spawn_forwarding_task<T: Send + 'static>(
    mut receiver: mpsc::Receiver<T>,
    sender: mpsc::Sender<DaemonEvent>,
    map_fn: impl Fn(T) -> DaemonEvent + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if sender.send(map_fn(event)).await.is_err() {
                break; // Channel closed, daemon shutting down
            }
        }
    })
}

/// Check if another daemon instance is listening on the IPC socket.
async fn check_already_running(path: &Path) -> bool {
    UnixStream::connect(path).await.is_ok()
}

/// Ask the running instance to toggle its dock.
async fn toggle_running_instance(path: &Path) -> Result<IpcResponse> {
    let stream = UnixStream::connect(path)
        .await
        .with_context(|| format!("Failed to connect to {}", path.display()))?;
    let (reader, mut writer) = stream.into_split();
    writer
        .write_all(encode_line(&IpcCommand::Toggle)?.as_bytes())
        .await?;

    let mut reader = BufReader::new(reader.take(MAX_IPC_RESPONSE_SIZE as u64));
    let mut line = String::new();
    tokio::time::timeout(IPC_READ_TIMEOUT, reader.read_line(&mut line))
        .await
        .context("Timed out waiting for the running instance")??;
    Ok(hyprdock_ipc::decode_response(&line)?)
}

/// Bind the IPC socket, replacing a stale socket file.
fn bind_ipc_socket(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        debug!("Removing stale socket {}", path.display());
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
    }
    UnixListener::bind(path).with_context(|| format!("Failed to bind {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (needed for log level)
    let mut config = Config::load(args.config.as_deref()).unwrap_or_else(|e| {
        // Can't use tracing yet, fall back to eprintln
        eprintln!("Failed to load configuration: {:#}. Using defaults.", e);
        Config::default()
    });

    let level = if args.debug {
        Level::DEBUG
    } else {
        parse_level(&config.behavior.log_level)
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    for w in &config.validate() {
        warn!("Config: {} - {}", w.field, w.message);
    }
    let mode_flags = ModeFlags {
        autohide: args.autohide,
        resident: args.resident,
    };
    if let Some(warning) = mode_flags.apply(&mut config) {
        warn!("{}", warning);
    }

    info!("hyprdock daemon starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let socket = hyprdock_ipc::socket_path();
    let mut serve_ipc = true;
    if check_already_running(&socket).await {
        if !args.multiple {
            match toggle_running_instance(&socket).await {
                Ok(response) => info!("Sent toggle to running instance: {:?}", response),
                Err(e) => warn!("Failed to reach running instance: {:#}", e),
            }
            anyhow::bail!(
                "Another hyprdock instance is already running (socket {} is active)",
                socket.display()
            );
        }
        warn!(
            "Another instance owns {}, running without an IPC socket",
            socket.display()
        );
        serve_ipc = false;
    }

    let paths = HyprlandPaths::from_env().context("Is Hyprland running?")?;
    info!("Compositor sockets: {}", paths.control.display());

    info!(
        "Configuration loaded: mode={:?}, icon_size={}, launcher={}, log_level={}",
        config.behavior.mode,
        config.dock.icon_size,
        config.dock.launcher_command,
        config.behavior.log_level
    );

    let pins = load_pins(&config);
    let mut state = DockState::new(config, pins, DesktopCatalog::from_env());

    let initial = snapshot_builder(&paths, state.config())
        .build()
        .await
        .context("Initial compositor snapshot failed")?;
    info!(
        "Found {} window(s) on {} output(s)",
        initial.window_count(),
        initial.outputs.len()
    );
    state.apply_snapshot(initial, true);

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(100);
    let (request_tx, mut request_rx) = watch::channel::<Option<VisibilityRequest>>(None);
    let requests: RequestSlot = Arc::new(request_tx);

    let mut daemon = Daemon::new(state, paths, event_tx.clone(), Arc::clone(&requests));
    daemon.config_path = args.config.clone();
    daemon.mode_flags = mode_flags;

    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    handles.push(tokio::spawn(render::run_renderer(
        render::LogRenderer::default(),
        daemon.state.subscribe(),
        daemon.visible_tx.subscribe(),
    )));

    // Compositor events
    let (hypr_tx, hypr_rx) = mpsc::channel::<HyprEvent>(EVENT_QUEUE_CAPACITY);
    {
        let events_path = daemon.paths.events.clone();
        let failure_tx = event_tx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_event_pump(events_path, EventPumpConfig::default(), hypr_tx).await {
                let _ = failure_tx.send(DaemonEvent::EventStreamFailed(e)).await;
            }
        }));
    }
    handles.push(spawn_forwarding_task(
        hypr_rx,
        event_tx.clone(),
        DaemonEvent::Compositor,
    ));

    daemon.restart_reconcile_timer();

    match signals::spawn_signal_listener(Arc::clone(&requests), event_tx.clone()) {
        Ok(handle) => handles.push(handle),
        Err(e) => warn!("Failed to install signal handlers: {}. Signals disabled.", e),
    }

    if serve_ipc {
        let listener = bind_ipc_socket(&socket)?;
        handles.push(tokio::spawn(run_ipc_server(listener, event_tx.clone())));
        info!("IPC server listening on {}", socket.display());
    }

    // Install Ctrl+C handler so terminal kill triggers graceful shutdown
    {
        let shutdown_tx = event_tx.clone();
        handles.push(tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Ctrl+C received, initiating shutdown...");
                let _ = shutdown_tx.send(DaemonEvent::Shutdown).await;
            }
        }));
    }

    info!("Ready. Use hyprdock-cli to send commands.");

    // Main event loop
    let exit = loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    break LoopExit::Shutdown;
                };
                if let Some(exit) = daemon.handle_event(event) {
                    break exit;
                }
            }
            changed = request_rx.changed() => {
                if changed.is_err() {
                    break LoopExit::Shutdown;
                }
                let request = *request_rx.borrow_and_update();
                if let Some(request) = request {
                    daemon.apply_visibility(request);
                }
            }
        }
    };

    daemon.shutdown();
    for handle in handles {
        handle.abort();
    }
    if serve_ipc {
        if let Err(e) = std::fs::remove_file(&socket) {
            debug!("Failed to remove {}: {}", socket.display(), e);
        }
    }

    match exit {
        LoopExit::Shutdown => {
            info!("hyprdock daemon shutting down.");
            Ok(())
        }
        LoopExit::Fatal(e) => {
            error!("Lost the compositor event stream: {}", e);
            Err(anyhow::Error::new(e).context("Compositor event stream lost"))
        }
    }
}

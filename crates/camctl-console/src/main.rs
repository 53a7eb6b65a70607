//! camctl console entry point.
//!
//! Loads the configuration, opens the device links and runs the single
//! event loop that owns all console state.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from()            -- TOML, validated
//!  └─ open links
//!       ├─ UdpCameraTransport × N    (+ liveness listener task each)
//!       ├─ scene switcher link       (reconnecting WebSocket task)
//!       └─ MatrixReconciler          (own task, HTTP client)
//!  └─ stdin line reader task
//!  └─ event loop (tokio::select!)
//!       ├─ operator commands   → Console::handle
//!       ├─ camera replies      → on_liveness_signal
//!       ├─ command deadline    → on_timeout
//!       ├─ scene frames        → Console::on_scene_frame
//!       ├─ matrix events       → Console::on_matrix_event
//!       ├─ status lines        → stdout
//!       └─ panel tick          → Console::poll_panel
//! ```
//!
//! Shutdown on Ctrl-C or `quit`: drop queued camera commands, wait one
//! command timeout, power every camera off, reset the matrix, wait again.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use camctl_console::application::camera_control::{CameraControl, CameraLink};
use camctl_console::application::console::Console;
use camctl_console::application::matrix_reconciler::{MatrixClient, MatrixReconciler};
use camctl_console::application::scene_switcher::SceneSwitcher;
use camctl_console::application::status::{Severity, StatusMessage, StatusReporter};
use camctl_console::infrastructure::input::line_console::{run_line_reader, ConsoleCommand, HELP};
use camctl_console::infrastructure::network::camera_udp::UdpCameraTransport;
use camctl_console::infrastructure::network::matrix_http::HttpMatrixClient;
use camctl_console::infrastructure::network::scene_ws::{spawn_scene_link, LinkEvent};
use camctl_console::infrastructure::storage::config::{
    config_file_path, load_config_from, save_config, AppConfig,
};

/// How often panel hold timers are advanced.
const PANEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Capacity of the operator command and matrix intent channels.
const CHANNEL_CAPACITY: usize = 64;

/// Command-line arguments for `camctl`.
#[derive(Debug, Parser)]
#[command(
    name = "camctl",
    about = "Operator console for PTZ cameras, a scene switcher and a video matrix",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Defaults to `camctl/config.toml` in the platform config directory.
    #[arg(long, env = "CAMCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set.  Overrides `[console] log_level`.
    #[arg(long, env = "CAMCTL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write a default configuration file to the config path and exit.
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path().context("failed to determine the config file location")?,
    };

    if cli.init_config {
        save_config(&config_path, &AppConfig::default())
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!("wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let config = load_config_from(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    // Logs go to stderr so stdout stays free for operator status lines.
    let level = cli
        .log_level
        .unwrap_or_else(|| config.console.log_level.clone());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    info!("camctl starting with {}", config_path.display());

    if let Err(e) = run(config).await {
        error!("camctl failed: {e:#}");
        return Err(e);
    }
    info!("camctl stopped");
    Ok(())
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let (status, mut status_rx) = StatusReporter::channel();

    // ── Cameras ───────────────────────────────────────────────────────────────
    let (liveness_tx, mut liveness_rx) = mpsc::unbounded_channel::<u8>();
    let mut links = Vec::with_capacity(config.cameras.len());
    for camera in &config.cameras {
        let transport = UdpCameraTransport::connect(&camera.host, camera.port)
            .await
            .with_context(|| format!("failed to open camera {}", camera.id))?;
        transport.spawn_liveness_listener(camera.id, liveness_tx.clone());
        links.push(CameraLink::new(
            camera.id,
            camera.limits(),
            camera.protocol,
            Box::new(transport),
        ));
    }
    let timeout = config.console.command_timeout();
    let cameras = CameraControl::new(
        links,
        config.console.speed_rounding,
        timeout,
        status.clone(),
    );
    let mut console = Console::new(cameras, SceneSwitcher::new(status.clone()), status.clone());

    // ── Scene switcher ────────────────────────────────────────────────────────
    let mut scene_events = None;
    if let Some(scene) = &config.scene_switcher {
        let link = spawn_scene_link(scene.url(), scene.reconnect_delay());
        info!("scene switcher link started for {}", scene.url());
        console = console.with_scene_link(link.outbound);
        scene_events = Some(link.events);
    }

    // ── Matrix ────────────────────────────────────────────────────────────────
    let (matrix_events_tx, mut matrix_events_rx) = mpsc::unbounded_channel();
    let mut matrix_task = None;
    let mut matrix_grace = Duration::ZERO;
    if let Some(matrix) = &config.matrix {
        let settings = matrix.settings().context("invalid matrix configuration")?;
        let client: Arc<dyn MatrixClient> =
            Arc::new(HttpMatrixClient::new(matrix).context("failed to create matrix client")?);
        let (intents_tx, intents_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let reconciler =
            MatrixReconciler::new(client, settings, status.clone(), matrix_events_tx.clone());
        matrix_task = Some(tokio::spawn(reconciler.run(intents_rx)));
        matrix_grace = matrix.request_timeout() * 4;
        console = console.with_matrix(intents_tx);
    }

    // ── Operator input ────────────────────────────────────────────────────────
    let (commands_tx, mut commands_rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(run_line_reader(
        BufReader::new(tokio::io::stdin()),
        commands_tx,
        status.clone(),
    ));
    let mut input_open = true;

    let mut panel_tick = tokio::time::interval(PANEL_POLL_INTERVAL);
    panel_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    console.startup();
    println!("{HELP}");
    info!("camctl ready.  Press Ctrl-C or type 'quit' to exit.");

    // ── Event loop ────────────────────────────────────────────────────────────
    loop {
        let deadline = console.cameras().deadline();
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            command = commands_rx.recv(), if input_open => match command {
                Some(ConsoleCommand::Intent(intent)) => console.handle(intent, Instant::now()),
                Some(ConsoleCommand::Help) => println!("{HELP}"),
                Some(ConsoleCommand::Quit) => break,
                None => {
                    input_open = false;
                    info!("console input closed; press Ctrl-C to exit");
                }
            },
            Some(_camera_id) = liveness_rx.recv() => console.cameras_mut().on_liveness_signal(),
            _ = sleep_until_deadline(deadline) => console.cameras_mut().on_timeout(),
            event = next_link_event(&mut scene_events) => match event {
                Some(LinkEvent::Frame(text)) => console.on_scene_frame(&text),
                Some(LinkEvent::Disconnected) => console.on_scene_disconnected(),
                None => scene_events = None,
            },
            Some(event) = matrix_events_rx.recv() => console.on_matrix_event(event),
            Some(message) = status_rx.recv() => print_status(&message),
            _ = panel_tick.tick() => console.poll_panel(Instant::now()),
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    console.begin_shutdown();
    tokio::time::sleep(timeout).await;
    console.finish_shutdown();
    tokio::time::sleep(timeout).await;

    // Closing the intent channel lets the reconciler finish the reset and stop.
    drop(console);
    if let Some(task) = matrix_task {
        if tokio::time::timeout(matrix_grace, task).await.is_err() {
            error!("matrix reset did not finish in time");
        }
    }
    while let Ok(message) = status_rx.try_recv() {
        print_status(&message);
    }
    Ok(())
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_link_event(
    events: &mut Option<mpsc::UnboundedReceiver<LinkEvent>>,
) -> Option<LinkEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_status(message: &StatusMessage) {
    match message.severity {
        Severity::Info => println!("{}", message.text),
        Severity::Error => println!("error: {}", message.text),
    }
}

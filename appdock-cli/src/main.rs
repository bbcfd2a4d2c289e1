//! AppDock CLI - Command-line harness
//!
//! This binary exercises the appdock library against a real or local
//! backend: probe a remote bundle, send heartbeats, or run the in-process
//! demo wiring.

use appdock::bridge::{
    Action, BridgeOptions, ContextBridge, PlatformContext, StandaloneEnvironment,
};
use appdock::bus::{spawn_dispatch, BusIdentity, CommandBus, LocalHub};
use appdock::config::Settings;
use appdock::heartbeat::{
    HeartbeatConfig, HeartbeatEmitter, HeartbeatStatus, HttpHeartbeatTransport,
};
use appdock::loader::{AppLoader, HttpModuleHost};
use appdock::logging::init_logging;
use appdock::remote::RemoteDescriptor;
use clap::{Parser, Subcommand};
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "appdock")]
#[command(about = "Host runtime harness for federated remote apps", long_about = None)]
#[command(version = appdock::VERSION)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a remote's entry bundle and resolve one export
    Probe {
        /// Base URL the remote is served from
        #[arg(long)]
        url: String,

        /// Container scope the remote registers
        #[arg(long)]
        scope: String,

        /// Export to resolve, e.g. "./App"
        #[arg(long, default_value = "./App")]
        export: String,
    },
    /// Send heartbeats for an app against the configured backend
    Heartbeat {
        /// App identifier to report liveness for
        #[arg(long)]
        app_id: String,

        /// Number of online beats to send before going offline
        #[arg(long, default_value = "3")]
        count: u32,

        /// Seconds between beats
        #[arg(long, default_value = "2")]
        interval: u64,
    },
    /// Run the standalone demo: fallback context plus a local event bus
    Demo,
}

fn main() {
    let args = Args::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let _guard = match init_logging(&settings.log_dir, &settings.log_file) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error initializing logging: {}", e);
            process::exit(1);
        }
    };

    tracing::info!(version = appdock::VERSION, "appdock starting");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting async runtime: {}", e);
            process::exit(1);
        }
    };

    match args.command {
        Command::Probe { url, scope, export } => {
            runtime.block_on(run_probe(&settings, url, scope, export))
        }
        Command::Heartbeat {
            app_id,
            count,
            interval,
        } => runtime.block_on(run_heartbeat(&settings, app_id, count, interval)),
        Command::Demo => runtime.block_on(run_demo()),
    }
}

async fn run_probe(settings: &Settings, url: String, scope: String, export: String) {
    let descriptor = RemoteDescriptor::new(url, scope, export);
    println!("Probing remote:");
    println!("  Entry:  {}", descriptor.entry_url());
    println!("  Scope:  {}", descriptor.scope);
    println!("  Export: {}", descriptor.module_export);
    println!();

    let host = match HttpModuleHost::new() {
        Ok(host) => Arc::new(host),
        Err(e) => {
            eprintln!("Error creating HTTP module host: {}", e);
            process::exit(1);
        }
    };
    let loader = AppLoader::with_policy(host, settings.retry.clone());
    match loader.load_app(&descriptor).await {
        Ok(module) => {
            println!("Module resolved: {}", module.export());
            println!("Cached: {}", loader.is_cached(&descriptor));
        }
        Err(e) => {
            eprintln!("Error loading remote module: {}", e);
            process::exit(1);
        }
    }
}

async fn run_heartbeat(settings: &Settings, app_id: String, count: u32, interval: u64) {
    let mut config = HeartbeatConfig::new(app_id, settings.backend_url.clone());
    config.interval = Duration::from_secs(interval);
    println!("Sending {} beats to {}", count, config.endpoint_url());

    let transport = match HttpHeartbeatTransport::new() {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("Error creating heartbeat transport: {}", e);
            process::exit(1);
        }
    };
    let emitter = HeartbeatEmitter::new(transport, config);
    for beat in 1..=count {
        if let Err(e) = emitter.send_heartbeat(HeartbeatStatus::Online, None).await {
            eprintln!("Beat {}/{} failed: {}", beat, count, e);
        } else {
            println!("Beat {}/{} acknowledged", beat, count);
        }
        if beat < count {
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }

    if let Err(e) = emitter.send_heartbeat(HeartbeatStatus::Offline, None).await {
        eprintln!("Final offline beat failed: {}", e);
        process::exit(1);
    }
    let stats = emitter.stats();
    println!(
        "Done: {} sent, {} failed",
        stats.beats_sent, stats.send_failures
    );
}

async fn run_demo() {
    println!("Starting standalone demo");

    // Context bridge with the synthesized development identity.
    let bridge = match ContextBridge::initialize(
        Arc::new(StandaloneEnvironment),
        BridgeOptions::default(),
    ) {
        Ok(bridge) => Arc::new(bridge),
        Err(e) => {
            eprintln!("Error initializing context bridge: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = PlatformContext::install(Arc::clone(&bridge)) {
        eprintln!("Error installing platform context: {}", e);
        process::exit(1);
    }

    let (state, dispatcher) = match PlatformContext::use_platform() {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error reading platform context: {}", e);
            process::exit(1);
        }
    };
    let user = state.user.expect("standalone fallback always sets a user");
    println!("Signed in as {} <{}>", user.name, user.email);

    // Wire a container and one app through the in-process hub.
    let hub = LocalHub::new();

    let (container_channel, container_rx) = hub.connect(&BusIdentity::Container);
    let container = Arc::new(CommandBus::new(
        BusIdentity::Container,
        Arc::new(container_channel),
    ));

    let identity = BusIdentity::App("demo".into());
    let (app_channel, app_rx) = hub.connect(&identity);
    let app = Arc::new(CommandBus::new(identity, Arc::new(app_channel)));

    let replier = Arc::clone(&app);
    app.on("ping", move |payload| {
        println!("demo app received ping: {}", payload);
        let _ = replier.emit("pong", payload, Some("container".into()));
    });
    container.on("pong", |payload| {
        println!("container received pong: {}", payload);
    });

    let _app_task = spawn_dispatch(Arc::clone(&app), app_rx);
    let _container_task = spawn_dispatch(Arc::clone(&container), container_rx);

    if let Err(e) = container.emit("ping", serde_json::json!({"n": 1}), Some("demo".into())) {
        eprintln!("Error emitting ping: {}", e);
        process::exit(1);
    }

    dispatcher.dispatch(Action::SetActiveApp(Some("demo".into())));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = bridge.snapshot();
    println!(
        "Active app: {}",
        snapshot.active_app.as_deref().unwrap_or("none")
    );
    println!("Demo complete");
}

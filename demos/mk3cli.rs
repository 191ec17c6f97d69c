//! Demo CLI for the VE.Bus driver — `monitor` and `control` subcommands,
//! mirroring how a polling application drives the public facade.

use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use victron_mk3::{Response, Session, SessionConfig, SwitchState};

const DELAY_BETWEEN_COMMANDS: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "mk3cli", about = "Monitor or control an attached VE.Bus device")]
struct Cli {
    /// Increase logging output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor the status of the attached VE.Bus device
    Monitor { device: String },
    /// Set the switch state and current limit of the attached VE.Bus device
    Control {
        device: String,
        switch_state: CliSwitchState,
        /// Current limit in amps
        #[arg(long)]
        current_limit: Option<f64>,
        /// Keep monitoring the status after acknowledgment
        #[arg(long)]
        monitor: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CliSwitchState {
    On,
    Off,
    ChargerOnly,
    InverterOnly,
}

impl From<CliSwitchState> for SwitchState {
    fn from(s: CliSwitchState) -> Self {
        match s {
            CliSwitchState::On => SwitchState::On,
            CliSwitchState::Off => SwitchState::Off,
            CliSwitchState::ChargerOnly => SwitchState::ChargerOnly,
            CliSwitchState::InverterOnly => SwitchState::InverterOnly,
        }
    }
}

struct LoggingHandler {
    ack: Mutex<bool>,
}

impl victron_mk3::Handler for LoggingHandler {
    fn on_response(&self, response: Response) {
        info!(?response, "received");
        if matches!(response, Response::State(_)) {
            *self.ack.lock().unwrap() = true;
            info!("switch state change acknowledged!");
        }
    }

    fn on_idle(&self) {
        info!("device idle");
    }

    fn on_fault(&self, fault: victron_mk3::Fault) {
        tracing::error!(%fault, "session faulted");
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .compact()
        .init();

    match cli.command {
        Command::Monitor { device } => monitor(device).await,
        Command::Control { device, switch_state, current_limit, monitor: keep_monitoring } => {
            control(device, switch_state.into(), current_limit, keep_monitoring).await
        }
    }
}

fn open_session(device: String) -> Session<tokio_serial::SerialStream> {
    let handler = LoggingHandler { ack: Mutex::new(false) };
    Session::start(
        move || victron_mk3::serial::open(&device),
        handler,
        SessionConfig::default(),
    )
}

async fn monitor(device: String) {
    let session = open_session(device);
    let mut ac_num_phases = 1u8;

    loop {
        session.led().await;
        tokio::time::sleep(DELAY_BETWEEN_COMMANDS).await;
        if let Some(dc) = session.dc().await {
            info!(?dc, "dc telemetry");
        }
        tokio::time::sleep(DELAY_BETWEEN_COMMANDS).await;
        for phase in 1..=ac_num_phases {
            if let Some(ac) = session.ac(phase).await {
                if ac.ac_num_phases != 0 {
                    ac_num_phases = ac.ac_num_phases;
                }
            }
            tokio::time::sleep(DELAY_BETWEEN_COMMANDS).await;
        }
        session.config().await;
        tokio::time::sleep(DELAY_BETWEEN_COMMANDS).await;
    }
}

async fn control(device: String, switch_state: SwitchState, current_limit: Option<f64>, keep_monitoring: bool) {
    info!(?current_limit, "setting switch state");
    let session = open_session(device);

    loop {
        if session.state(switch_state, current_limit).await.is_some() {
            break;
        }
        session.config().await;
        tokio::time::sleep(DELAY_BETWEEN_COMMANDS).await;
    }

    if !keep_monitoring {
        session.stop();
        return;
    }

    let mut ac_num_phases = 1u8;
    loop {
        session.led().await;
        tokio::time::sleep(DELAY_BETWEEN_COMMANDS).await;
        session.dc().await;
        tokio::time::sleep(DELAY_BETWEEN_COMMANDS).await;
        for phase in 1..=ac_num_phases {
            if let Some(ac) = session.ac(phase).await {
                if ac.ac_num_phases != 0 {
                    ac_num_phases = ac.ac_num_phases;
                }
            }
            tokio::time::sleep(DELAY_BETWEEN_COMMANDS).await;
        }
        session.config().await;
        tokio::time::sleep(DELAY_BETWEEN_COMMANDS).await;
    }
}

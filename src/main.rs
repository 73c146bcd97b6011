//! Ambient display controller.
//!
//! Polls the ambient light sensor, maps it through the calibration and the
//! operating-point table to a brightness/contrast pair, and persists edits
//! made on the console.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ambient_display::calibration::{CalibrationSession, FieldErrors, SessionState};
use ambient_display::console::{self, ConsoleInput};
use ambient_display::panel::state::PanelState;
use ambient_display::panel::{
    DisplayPanel, PanelCommand, Reading, NOT_CALIBRATED_MESSAGE, NO_LIGHT_SENSOR_DATA_ERROR,
};
use ambient_display::persist::{Liveness, PersistOutcome, Persister, PERSIST_QUIET_WINDOW};
use ambient_display::sensor::{self, FileSensor, CALIBRATION_POLL_INTERVAL, POLL_INTERVAL};
use ambient_display::settings::store::{JsonFileStore, SettingsStore};
use ambient_display::table::FieldStatus;
use ambient_display::units::{self, Entry, AMBIENT_LIGHT_SUFFIX};

/// Poll ticks to wait for a first sample before giving up on calibration.
const WARMUP_TICKS: usize = 20;

#[derive(Parser)]
#[command(
    name = "ambient-display",
    about = "Ambient light driven display brightness and contrast"
)]
struct Args {
    /// Display settings file
    #[arg(long, default_value = "/var/lib/ambient-display/display-settings.json")]
    settings: PathBuf,

    /// Raw ambient light sensor attribute
    #[arg(
        long,
        default_value = "/sys/bus/iio/devices/iio:device0/in_illuminance_raw"
    )]
    sensor: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the sensor and accept edits on stdin (default)
    Run {
        /// Sensor poll period in milliseconds
        #[arg(long, default_value_t = POLL_INTERVAL.as_millis() as u64)]
        poll_ms: u64,

        /// Quiet window before edits are written, in milliseconds
        #[arg(long, default_value_t = PERSIST_QUIET_WINDOW.as_millis() as u64)]
        quiet_ms: u64,
    },
    /// Print the settings table and one reading
    Show,
    /// Capture the sensor bounds from live readings
    Calibrate {
        /// How long to capture for
        #[arg(long, default_value_t = 10)]
        seconds: u64,

        /// Sensor poll period in milliseconds
        #[arg(long, default_value_t = CALIBRATION_POLL_INTERVAL.as_millis() as u64)]
        poll_ms: u64,
    },
    /// Enter the sensor bounds by hand
    SetCalibration { min: String, max: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let store = Arc::new(JsonFileStore::new(&args.settings));
    let command = args.command.unwrap_or(Command::Run {
        poll_ms: POLL_INTERVAL.as_millis() as u64,
        quiet_ms: PERSIST_QUIET_WINDOW.as_millis() as u64,
    });

    match command {
        Command::Run { poll_ms, quiet_ms } => {
            info!("=== Ambient Display ===");
            info!("Settings: {}", args.settings.display());
            info!("Sensor: {}", args.sensor.display());
            run(
                store,
                FileSensor::new(&args.sensor),
                Duration::from_millis(poll_ms),
                Duration::from_millis(quiet_ms),
            )
            .await
        }
        Command::Show => {
            let mut panel = DisplayPanel::new(store.get()?);
            panel.set_raw_ambient(sensor::sample(&mut FileSensor::new(&args.sensor)));
            print_panel(&panel);
            Ok(())
        }
        Command::Calibrate { seconds, poll_ms } => {
            calibrate(
                store,
                FileSensor::new(&args.sensor),
                Duration::from_secs(seconds),
                Duration::from_millis(poll_ms),
            )
            .await
        }
        Command::SetCalibration { min, max } => set_calibration(store, min, max).await,
    }
}

async fn run(
    store: Arc<JsonFileStore>,
    feed: FileSensor,
    poll: Duration,
    quiet: Duration,
) -> anyhow::Result<()> {
    let mut panel = DisplayPanel::new(store.get()?);
    let liveness = Liveness::new();
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<PersistOutcome>(8);
    let persister = Persister::spawn(store.clone(), quiet, liveness.clone(), outcome_tx);
    let (mut samples, poller) = sensor::spawn_poller(feed, poll);

    // --- State emitter task (5Hz, only when changed) ---
    let panel_state = Arc::new(PanelState::new());
    let emitter_state = panel_state.clone();
    let emitter = tokio::spawn(async move {
        loop {
            if let Some(snapshot) = emitter_state.pop_if_changed() {
                match serde_json::to_string(&snapshot) {
                    Ok(json) => info!("[DISPLAY] {json}"),
                    Err(e) => warn!("[DISPLAY] Could not encode state: {e}"),
                }
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("[DISPLAY] Running. Type `show` for the table, `quit` to exit.");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("[DISPLAY] Shutting down...");
                break;
            }
            changed = samples.changed() => {
                if changed.is_err() {
                    error!("[SENSOR] Poller stopped");
                    break;
                }
                let raw = *samples.borrow_and_update();
                panel.set_raw_ambient(raw);
            }
            Some(outcome) = outcome_rx.recv() => panel.apply_persist_outcome(outcome),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match console::parse_console_line(&line, panel.stored().calibration) {
                    Some(ConsoleInput::Command(cmd)) => {
                        if panel.execute(cmd).persist {
                            persister.push(panel.stored().clone());
                        }
                    }
                    Some(ConsoleInput::Show) => print_panel(&panel),
                    Some(ConsoleInput::Quit) => break,
                    None => {}
                },
                Ok(None) => {
                    debug!("[CONSOLE] stdin closed");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("[CONSOLE] stdin error: {e}");
                    stdin_open = false;
                }
            },
        }
        panel_state.update(panel.snapshot());
    }

    liveness.close();
    emitter.abort();
    poller.abort();
    persister.finish().await;
    info!("Done.");
    Ok(())
}

async fn calibrate(
    store: Arc<JsonFileStore>,
    feed: FileSensor,
    length: Duration,
    poll: Duration,
) -> anyhow::Result<()> {
    let mut panel = DisplayPanel::new(store.get()?);
    let (mut samples, poller) = sensor::spawn_poller(feed, poll);

    samples.changed().await?;
    let first = *samples.borrow_and_update();
    let mut session = CalibrationSession::new(panel.stored().calibration, first);
    for _ in 0..WARMUP_TICKS {
        if session.receiving_sensor_data() {
            break;
        }
        samples.changed().await?;
        session.tick(*samples.borrow_and_update());
    }
    if !session.start() {
        poller.abort();
        bail!(NO_LIGHT_SENSOR_DATA_ERROR);
    }

    info!(
        "[CAL] Expose the sensor to the darkest and brightest light to handle ({}s, Ctrl-C to finish early)",
        length.as_secs()
    );
    let deadline = tokio::time::sleep(length);
    tokio::pin!(deadline);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut shutdown => {
                info!("[CAL] Finished early");
                break;
            }
            changed = samples.changed() => {
                changed?;
                session.tick(*samples.borrow_and_update());
                if let SessionState::Calibrating { min, max } = session.state() {
                    debug!("[CAL] min={min:?} max={max:?}");
                }
            }
        }
    }
    poller.abort();

    session.stop();
    if let Some(errors) = session.field_errors().filter(|e| !e.is_empty()) {
        report_field_errors(&errors);
        bail!("captured bounds are not usable");
    }
    match session.commit() {
        Some(calibration) => {
            panel.execute(PanelCommand::SetCalibration(calibration));
            save(store, &panel).await
        }
        None => {
            info!("[CAL] Calibration unchanged");
            Ok(())
        }
    }
}

async fn set_calibration(store: Arc<JsonFileStore>, min: String, max: String) -> anyhow::Result<()> {
    let mut panel = DisplayPanel::new(store.get()?);
    let mut session = CalibrationSession::new(panel.stored().calibration, None);
    session.set_min(Entry::from(min));
    session.set_max(Entry::from(max));

    if let Some(errors) = session.field_errors().filter(|e| !e.is_empty()) {
        report_field_errors(&errors);
        bail!("calibration not saved");
    }
    match session.commit() {
        Some(calibration) => {
            panel.execute(PanelCommand::SetCalibration(calibration));
            save(store, &panel).await
        }
        None => {
            info!("[CAL] Calibration unchanged");
            Ok(())
        }
    }
}

fn report_field_errors(errors: &FieldErrors) {
    if let Some(e) = errors.min {
        error!("[CAL] Minimum: {}", e.message());
    }
    if let Some(e) = errors.max {
        error!("[CAL] Maximum: {}", e.message());
    }
}

/// Write the panel's stored record once and wait for the result.
async fn save(store: Arc<JsonFileStore>, panel: &DisplayPanel) -> anyhow::Result<()> {
    let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
    let persister = Persister::spawn(store, Duration::ZERO, Liveness::new(), outcome_tx);
    persister.push(panel.stored().clone());
    persister.finish().await;
    match outcome_rx.recv().await {
        Some(PersistOutcome::Saved) => Ok(()),
        Some(PersistOutcome::Failed(message)) => bail!(message),
        None => bail!("settings writer exited without a result"),
    }
}

fn cell(entry: &Entry, status: FieldStatus, suffix: &str) -> String {
    let text = if entry.is_number() {
        format!("{entry}{suffix}")
    } else {
        "(Empty)".to_string()
    };
    match status {
        FieldStatus::Valid => text,
        _ => format!("{text} !"),
    }
}

fn print_panel(panel: &DisplayPanel) {
    let settings = panel.settings();

    match settings.stored.calibration {
        Some(c) => println!("Calibration: min {} max {}", c.min, c.max),
        None => println!("{NOT_CALIBRATED_MESSAGE}"),
    }
    let raw = panel
        .raw_ambient()
        .map_or_else(|| "-".to_string(), |r| r.to_string());
    match panel.reading() {
        Reading::Active {
            ambient_light,
            brightness,
            contrast,
        } => println!(
            "Ambient light: {}{AMBIENT_LIGHT_SUFFIX} (raw {raw})  Brightness: {brightness}%  Contrast: {contrast}%",
            units::format_readable(ambient_light)
        ),
        reading @ Reading::InvalidConfiguration { ambient_light } => println!(
            "Ambient light: {}{AMBIENT_LIGHT_SUFFIX} (raw {raw})  {}",
            units::format_readable(ambient_light),
            reading.message().unwrap_or_default()
        ),
        other => println!("{}", other.message().unwrap_or_default()),
    }

    let sleep = &settings.stored.sleep;
    println!(
        "Sleep: after {} minute{} of ambient light below {}{AMBIENT_LIGHT_SUFFIX}",
        sleep.duration,
        if sleep.duration == 1.0 { "" } else { "s" },
        units::format_readable(sleep.threshold)
    );

    println!(
        "{:>3}  {:>14}  {:>12}  {:>12}",
        "#", "Ambient Light", "Brightness", "Contrast"
    );
    let statuses = panel.row_statuses();
    for (i, (row, status)) in settings.editable.config_values.iter().zip(&statuses).enumerate() {
        println!(
            "{i:>3}  {:>14}  {:>12}  {:>12}",
            cell(&row.ambient_light, status.ambient_light, AMBIENT_LIGHT_SUFFIX),
            cell(&row.brightness, status.brightness, "%"),
            cell(&row.contrast, status.contrast, "%"),
        );
    }
    for (i, status) in statuses.iter().enumerate() {
        for (column, field) in [
            ("ambient light", status.ambient_light),
            ("brightness", status.brightness),
            ("contrast", status.contrast),
        ] {
            if let Some(message) = field.message() {
                println!("  row {i} {column}: {message}");
            }
        }
    }
    if let Some(e) = panel.persist_error() {
        println!("Error updating display settings: {e}");
    }
}

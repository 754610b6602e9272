use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rover_gateway::actuator::Actuator;
use rover_gateway::pipeline::normalize_command;
use rover_gateway::plan::{self, ActionPlan, ChatPlanner, FRONT_SENSOR, Planner, SensorSnapshot};
use rover_gateway::voice::{AudioCapture, peak_amplitude};
use rover_gateway::{Config, Daemon};

/// Rover - voice-commanded motion planning gateway
#[derive(Parser)]
#[command(name = "rover", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/rover/rover.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(long, env = "ROVER_PORT", global = true)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable voice capture (for headless servers without audio hardware)
    #[arg(long, env = "ROVER_DISABLE_VOICE", global = true)]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway (default)
    Serve,
    /// Run the robot-side poll loop against a serial motor controller
    Actuator,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Plan a typed command once and print the validated plan
    Plan {
        /// Command text, as it would be transcribed
        text: String,
        /// Front distance reading in metres
        #[arg(long, default_value = "100.0")]
        front: f64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,rover_gateway=info",
        1 => "info,rover_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_with_options(cli.config.as_deref(), cli.disable_voice)?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Actuator => actuator(config).await,
        Command::TestMic { duration } => test_mic(&config, duration).await,
        Command::Plan { text, front } => plan_once(&config, &text, front).await,
    }
}

#[allow(clippy::future_not_send)]
async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.api_server.port,
        voice = config.voice.enabled,
        planner = %config.planner.url,
        "starting rover gateway"
    );

    Daemon::new(config).run().await?;
    Ok(())
}

/// Run the blocking actuator loop until Ctrl-C
async fn actuator(config: Config) -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(true));

    let flag = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(false, Ordering::Relaxed);
        }
    });

    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut actuator = Actuator::connect(&config.actuator)?;
        actuator.run(&running);
        Ok(())
    })
    .await?
}

/// Peak and RMS accumulated by the audio callback between prints
#[derive(Default)]
struct Meter {
    peak: u16,
    sum_squares: f64,
    samples: usize,
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let meter = Arc::new(Mutex::new(Meter::default()));
    let mut capture = AudioCapture::new(config.voice.sample_rate)?;

    let sink = Arc::clone(&meter);
    capture.start(config.voice.frame_length, move |frame| {
        let mut meter = sink.lock().unwrap_or_else(PoisonError::into_inner);
        meter.peak = meter.peak.max(peak_amplitude(frame));
        meter.sum_squares += frame.iter().map(|&s| f64::from(s).powi(2)).sum::<f64>();
        meter.samples += frame.len();
    })?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!(
        "Silence threshold: {} | Trigger threshold: {}",
        config.voice.silence_threshold, config.voice.trigger_threshold
    );
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let reading = std::mem::take(&mut *meter.lock().unwrap_or_else(PoisonError::into_inner));
        #[allow(clippy::cast_precision_loss)]
        let rms = if reading.samples == 0 {
            0.0
        } else {
            (reading.sum_squares / reading.samples as f64).sqrt()
        };

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (f64::from(reading.peak) / 32768.0 * 50.0).min(50.0) as usize;
        let bar: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        let marker = if reading.peak >= config.voice.trigger_threshold {
            "trigger"
        } else if reading.peak >= config.voice.silence_threshold {
            "speech"
        } else {
            "silence"
        };

        println!(
            "[{:2}s] RMS: {:7.1} | Peak: {:5} | [{}] {}",
            i + 1,
            rms,
            reading.peak,
            bar,
            marker
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If the peak stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Plan a typed command and print the validated plan as JSON
async fn plan_once(config: &Config, text: &str, front: f64) -> anyhow::Result<()> {
    let planner = ChatPlanner::new(&config.planner)?;
    let snapshot: SensorSnapshot = [(FRONT_SENSOR, front)].into_iter().collect();
    let command = normalize_command(text);

    let plan = match planner.plan(&command, &snapshot).await {
        Ok(raw) => plan::validate(raw, &snapshot, &config.safety),
        Err(e) => {
            tracing::warn!(error = %e, "planning failed");
            ActionPlan::fallback(&e)
        }
    };

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

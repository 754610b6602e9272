//! Robot-side loop: read the sensor, report it, poll for a plan, drive motors
//!
//! Runs as its own process on the robot. The HTTP link is lossy; a failed
//! report or poll is logged and retried on the next cycle.

mod client;
mod serial;

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub use client::ActuatorClient;
pub use serial::{CANDIDATE_PORTS, MotorLink, MotorSettings, SerialMotorLink, motor_command};

use crate::Result;
use crate::config::ActuatorConfig;
use crate::plan::{ActionStep, FRONT_SENSOR, SensorSnapshot};

/// Pause between consecutive steps of a plan
const STEP_DELAY: Duration = Duration::from_millis(200);

/// Pause after a failed cycle
const ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Run every step in order; returns how many were acknowledged
///
/// # Errors
///
/// Returns error if the serial link fails
pub fn execute_plan<P: Read + Write>(
    link: &mut MotorLink<P>,
    steps: &[ActionStep],
    settings: &MotorSettings,
) -> Result<usize> {
    tracing::info!(steps = steps.len(), "executing plan");

    let mut acknowledged = 0;
    for (index, step) in steps.iter().enumerate() {
        if index > 0 {
            std::thread::sleep(STEP_DELAY);
        }
        tracing::info!(
            step = index + 1,
            action = %step.kind(),
            notes = step.notes().unwrap_or_default(),
            "executing step"
        );
        if link.execute(step, settings)? {
            acknowledged += 1;
        }
    }

    tracing::info!(acknowledged, "plan finished");
    Ok(acknowledged)
}

/// Actuator poll loop
pub struct Actuator<P> {
    client: ActuatorClient,
    link: MotorLink<P>,
    settings: MotorSettings,
    poll_interval: Duration,
}

impl<P: Read + Write> Actuator<P> {
    #[must_use]
    pub fn new(client: ActuatorClient, link: MotorLink<P>, config: &ActuatorConfig) -> Self {
        Self {
            client,
            link,
            settings: MotorSettings::from_config(config),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// One cycle; returns the number of steps executed
    ///
    /// # Errors
    ///
    /// Returns error if the serial link fails
    pub fn poll_once(&mut self) -> Result<usize> {
        let Some(front) = self.link.read_distance()? else {
            tracing::warn!("no distance reading from controller");
            return Ok(0);
        };
        tracing::debug!(front, "distance read");

        let snapshot: SensorSnapshot = [(FRONT_SENSOR, front)].into_iter().collect();
        if let Err(e) = self.client.submit_state(&snapshot) {
            tracing::warn!(error = %e, "failed to submit state");
        }

        let steps = match self.client.fetch_plan() {
            Ok(steps) => steps,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch plan");
                return Ok(0);
            }
        };

        if steps.is_empty() {
            return Ok(0);
        }

        execute_plan(&mut self.link, &steps, &self.settings)?;
        Ok(steps.len())
    }

    /// Poll until `running` is cleared
    pub fn run(&mut self, running: &AtomicBool) {
        tracing::info!(server = %self.client.base_url(), "actuator started");

        while running.load(Ordering::Relaxed) {
            match self.poll_once() {
                Ok(_) => std::thread::sleep(self.poll_interval),
                Err(e) => {
                    tracing::error!(error = %e, "actuator cycle failed");
                    std::thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        tracing::info!("actuator stopped");
    }
}

impl Actuator<Box<dyn serialport::SerialPort>> {
    /// Connect to the gateway and the first available motor controller
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built or no port opens
    pub fn connect(config: &ActuatorConfig) -> Result<Self> {
        let client = ActuatorClient::new(config)?;
        let link = SerialMotorLink::open(config)?;
        Ok(Self::new(client, link, config))
    }
}

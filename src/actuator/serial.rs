//! Line protocol to the motor controller
//!
//! `REQ` asks for the ultrasonic reading, answered with integer centimetres.
//! `action,duration_ms,speed` runs one motion and is answered with `DONE`.
//! The controller also echoes debug lines, which are skipped.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;

use crate::config::ActuatorConfig;
use crate::plan::ActionStep;
use crate::{Error, Result};

/// Ports probed when none is configured
pub const CANDIDATE_PORTS: [&str; 5] = [
    "/dev/ttyACM0",
    "/dev/ttyACM1",
    "/dev/ttyUSB0",
    "/dev/ttyUSB1",
    "/dev/ttyAMA0",
];

/// How long to wait for a distance reply
const DISTANCE_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-read timeout on the device
const SERIAL_TIMEOUT: Duration = Duration::from_millis(100);

/// Back-off between empty reads
const READ_SLEEP: Duration = Duration::from_millis(10);

/// The board resets when the port opens
const BOOT_DELAY: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 64;

/// Motion parameters used to turn plan steps into motor commands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorSettings {
    pub default_speed: u8,
    pub meters_per_second: f64,
}

impl MotorSettings {
    #[must_use]
    pub const fn from_config(config: &ActuatorConfig) -> Self {
        Self {
            default_speed: config.default_speed,
            meters_per_second: config.meters_per_second,
        }
    }
}

/// Command line for one plan step, without the newline
///
/// Stops run for one second at zero speed. Movements use `duration` when
/// present, else `distance` at the configured ground speed, else one second.
#[must_use]
pub fn motor_command(step: &ActionStep, settings: &MotorSettings) -> String {
    if step.is_stop() {
        return "stop,1000,0".to_string();
    }

    let seconds = step
        .duration()
        .filter(|d| *d > 0.0)
        .or_else(|| {
            step.distance()
                .filter(|d| *d > 0.0 && settings.meters_per_second > 0.0)
                .map(|d| d / settings.meters_per_second)
        })
        .unwrap_or(1.0);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let duration_ms = (seconds * 1000.0).round() as u64;

    format!("{},{duration_ms},{}", step.kind(), settings.default_speed)
}

/// Motor controller reached over a byte stream
pub struct MotorLink<P> {
    port: P,
    pending: String,
    ack_timeout: Duration,
}

/// Motor controller on a serial device
pub type SerialMotorLink = MotorLink<Box<dyn SerialPort>>;

impl<P: Read + Write> MotorLink<P> {
    #[must_use]
    pub const fn new(port: P, ack_timeout: Duration) -> Self {
        Self {
            port,
            pending: String::new(),
            ack_timeout,
        }
    }

    /// Ask for the front distance, in metres
    ///
    /// Returns `None` if no numeric reply arrives in time.
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be written or read
    pub fn read_distance(&mut self) -> Result<Option<f64>> {
        self.send_line("REQ")?;

        let deadline = Instant::now() + DISTANCE_TIMEOUT;
        while let Some(line) = self.read_line(deadline)? {
            if let Ok(cm) = line.parse::<i64>() {
                #[allow(clippy::cast_precision_loss)]
                let meters = cm as f64 / 100.0;
                return Ok(Some(meters));
            }
            tracing::trace!(line = %line, "ignoring controller output");
        }

        Ok(None)
    }

    /// Run one step and wait for `DONE`
    ///
    /// Returns `false` when the controller did not acknowledge in time; the
    /// step is treated as complete.
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be written or read
    pub fn execute(&mut self, step: &ActionStep, settings: &MotorSettings) -> Result<bool> {
        let command = motor_command(step, settings);
        self.send_line(&command)?;
        tracing::debug!(command = %command, "sent motor command");

        let deadline = Instant::now() + self.ack_timeout;
        while let Some(line) = self.read_line(deadline)? {
            if line == "DONE" {
                tracing::debug!(action = %step.kind(), "action complete");
                return Ok(true);
            }
            tracing::trace!(line = %line, "controller output");
        }

        tracing::warn!(action = %step.kind(), command = %command, "action timed out");
        Ok(false)
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.drain();
        self.port
            .write_all(line.as_bytes())
            .and_then(|()| self.port.write_all(b"\n"))
            .and_then(|()| self.port.flush())
            .map_err(|e| Error::Serial(format!("write failed: {e}")))
    }

    /// Discard stale input so replies line up with requests
    fn drain(&mut self) {
        self.pending.clear();
        let mut buffer = [0_u8; READ_CHUNK];
        loop {
            match self.port.read(&mut buffer) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    if !matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) {
                        tracing::debug!(error = %e, "serial drain error");
                    }
                    break;
                }
            }
        }
    }

    /// Next non-empty line, or `None` at the deadline
    fn read_line(&mut self, deadline: Instant) -> Result<Option<String>> {
        let mut scratch = [0_u8; READ_CHUNK];

        loop {
            while let Some(pos) = self.pending.find('\n') {
                let line: String = self.pending.drain(..=pos).collect();
                let line = line.trim();
                if !line.is_empty() {
                    return Ok(Some(line.to_string()));
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            match self.port.read(&mut scratch) {
                Ok(0) => std::thread::sleep(READ_SLEEP),
                Ok(n) => self
                    .pending
                    .push_str(&String::from_utf8_lossy(&scratch[..n]).replace('\r', "")),
                Err(e) => match e.kind() {
                    ErrorKind::WouldBlock | ErrorKind::TimedOut => std::thread::sleep(READ_SLEEP),
                    ErrorKind::Interrupted => {}
                    _ => return Err(Error::Serial(format!("read failed: {e}"))),
                },
            }
        }
    }

    /// Underlying port
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

impl SerialMotorLink {
    /// Open the configured port, or the first candidate that opens
    ///
    /// # Errors
    ///
    /// Returns error if no port can be opened
    pub fn open(config: &ActuatorConfig) -> Result<Self> {
        let candidates: Vec<&str> = match &config.serial_port {
            Some(port) => vec![port.as_str()],
            None => CANDIDATE_PORTS.to_vec(),
        };

        for path in candidates {
            match serialport::new(path, config.baud).timeout(SERIAL_TIMEOUT).open() {
                Ok(port) => {
                    std::thread::sleep(BOOT_DELAY);
                    tracing::info!(
                        port = path,
                        baud = config.baud,
                        "connected to motor controller"
                    );
                    return Ok(Self::new(port, Duration::from_secs(config.ack_timeout_secs)));
                }
                Err(e) => tracing::debug!(port = path, error = %e, "serial port unavailable"),
            }
        }

        Err(Error::Serial("no motor controller found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ActionKind, Motion};

    const SETTINGS: MotorSettings = MotorSettings {
        default_speed: 180,
        meters_per_second: 0.5,
    };

    #[test]
    fn test_stop_command() {
        assert_eq!(motor_command(&ActionStep::stop(), &SETTINGS), "stop,1000,0");
    }

    #[test]
    fn test_duration_command() {
        let step = ActionStep::movement(ActionKind::Right, Motion::duration(2.0));
        assert_eq!(motor_command(&step, &SETTINGS), "right,2000,180");
    }

    #[test]
    fn test_distance_command() {
        let step = ActionStep::movement(ActionKind::Forward, Motion::distance(0.5));
        assert_eq!(motor_command(&step, &SETTINGS), "forward,1000,180");
    }

    #[test]
    fn test_bare_movement_defaults_to_one_second() {
        let step = ActionStep::movement(ActionKind::Backward, Motion::default());
        assert_eq!(motor_command(&step, &SETTINGS), "backward,1000,180");
    }
}

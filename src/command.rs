use core::fmt::Write as _;

use heapless::String;

use crate::{sequencer::RangeSensor, Error, Measurement};

/// ASCII `Y` starts a measurement.
pub const MEASURE: u8 = b'Y';

/// The raw byte that also starts a measurement.
pub const MEASURE_RAW: u8 = 254;

/// What a timed out read turns into: the Pico SDK timeout code as a byte. Selects idle.
pub const NO_INPUT: u8 = 0xFF;

pub const TIMEOUT_LINE: &str = "Falha";
pub const IDLE_LINE: &str = "Parado";
pub const SCHEDULING_FAILURE_LINE: &str = "Failed to add timer";

pub const LINE_CAPACITY: usize = 96;

pub type Line = String<LINE_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Measure,
    Idle,
}

impl From<u8> for Command {
    fn from(byte: u8) -> Self {
        match byte {
            MEASURE | MEASURE_RAW => Command::Measure,
            _ => Command::Idle,
        }
    }
}

/// The line-oriented channel the commands come in on and the results go out on.
#[allow(async_fn_in_trait)]
pub trait Console {
    /// Wait for the next byte.
    async fn read_byte(&mut self) -> Result<u8, Error>;

    /// Wait at most `timeout_us` for a byte.
    async fn read_byte_timeout(&mut self, timeout_us: u32) -> Result<Option<u8>, Error>;

    /// Write `line` followed by a line break.
    async fn write_line(&mut self, line: &str) -> Result<(), Error>;
}

/// Render the outcome of a cycle as the line the console shows.
pub fn render(result: &Result<Measurement, Error>) -> Result<Line, Error> {
    let mut line = Line::new();
    match result {
        Ok(Measurement::Success {
            distance,
            measured_at,
        }) => write!(line, "{} - {:.6} cm", measured_at, distance.centimeters())
            .map_err(|_| Error::Console)?,
        Err(Error::SchedulingFailure) => line
            .push_str(SCHEDULING_FAILURE_LINE)
            .map_err(|_| Error::Console)?,
        Ok(Measurement::Timeout) | Err(_) => {
            line.push_str(TIMEOUT_LINE).map_err(|_| Error::Console)?
        }
    }
    Ok(line)
}

/// Reads commands forever and answers each with one line.
///
/// After a measurement the next byte is only waited for briefly, so a burst of commands is
/// served back to back. Any byte that is not a measure command prints the idle line and
/// drops back to a blocking read.
pub struct CommandLoop<CONSOLE, SENSOR> {
    console: CONSOLE,
    sensor: SENSOR,
    reread_timeout_us: u32,
    pending: Option<u8>,
}

impl<CONSOLE, SENSOR> CommandLoop<CONSOLE, SENSOR>
where
    CONSOLE: Console,
    SENSOR: RangeSensor,
{
    /// Requires the console, the sensor and how long to wait for a follow-up command after
    /// a measurement.
    pub fn new(console: CONSOLE, sensor: SENSOR, reread_timeout_us: u32) -> Self {
        Self {
            console,
            sensor,
            reread_timeout_us,
            pending: None,
        }
    }

    /// Returns the console.
    pub fn console(&self) -> &CONSOLE {
        &self.console
    }

    /// Returns the sensor.
    pub fn sensor(&self) -> &SENSOR {
        &self.sensor
    }

    /// Handle exactly one command byte.
    pub async fn step(&mut self) -> Result<Command, Error> {
        let byte = match self.pending.take() {
            Some(byte) => byte,
            None => self.console.read_byte().await?,
        };

        let command = Command::from(byte);
        match command {
            Command::Measure => {
                let result = self.sensor.measure();
                #[cfg(feature = "defmt")]
                {
                    if let Err(e) = &result {
                        defmt::warn!("measurement failed: {}", e);
                    }
                }
                let line = render(&result)?;
                self.console.write_line(&line).await?;

                let next = self
                    .console
                    .read_byte_timeout(self.reread_timeout_us)
                    .await?;
                self.pending = Some(next.unwrap_or(NO_INPUT));
            }
            Command::Idle => self.console.write_line(IDLE_LINE).await?,
        }
        Ok(command)
    }

    /// Serve commands forever. Errors are logged and the next byte is read.
    pub async fn run(&mut self) -> ! {
        loop {
            if let Err(_e) = self.step().await {
                #[cfg(feature = "defmt")]
                defmt::warn!("command loop: {}", _e);
            }
        }
    }
}

//! # hcsr04-irq
//!
//! This crate provides an interrupt-driven ranging core for the HC-SR04 ultrasonic distance sensor.
//!
//! A measurement cycle pulses the trigger pin, then busy-waits until either the echo's falling
//! edge has been stamped or a one-shot deadline has fired. The edges and the deadline are
//! produced outside the foreground loop, by whatever the platform uses for interrupts, and only
//! ever meet the sequencer through two shared cells:
//!
//! - [`EdgeTimestampRegister`], written by the echo edge handler ([`EdgeMonitor`] on async HALs),
//! - [`DeadlineGuard`], raised by the platform's [`Alarm`] when the horizon runs out.
//!
//! [`CommandLoop`] puts the sequencer behind a byte-command console: `Y` or `254` measures,
//! anything else answers `Parado`.
//!
//! ## Features
//!
//! - `defmt`: derives `defmt::Format` for the public types and logs the cycle through `defmt`.
//!
//! # Example
//!
//! ```rust, ignore
//! static EDGES: EdgeTimestampRegister = EdgeTimestampRegister::new();
//! static DEADLINE: DeadlineGuard = DeadlineGuard::new();
//!
//! // In a high priority task:
//! EdgeMonitor::new(echo, EmbassyClock, &EDGES).run().await;
//!
//! // In the foreground:
//! let mut sensor = RangeSequencer::new(trigger, Delay, alarm, rtc, &EDGES, &DEADLINE, Config::default());
//! match sensor.measure() {
//!     Ok(Measurement::Success { distance, .. }) => info!("Distance: {} cm", distance.centimeters()),
//!     Ok(Measurement::Timeout) => info!("No echo"),
//!     Err(e) => info!("Error: {:?}", e),
//! }
//! ```

#![no_std]

mod clock;
mod command;
mod config;
mod deadline;
mod error;
mod register;
mod sequencer;

pub use clock::{DateTime, Now, WallClock};
pub use command::{
    render, Command, CommandLoop, Console, Line, IDLE_LINE, LINE_CAPACITY, MEASURE, MEASURE_RAW,
    NO_INPUT, SCHEDULING_FAILURE_LINE, TIMEOUT_LINE,
};
pub use config::{
    Config, TemperatureUnit, COMMAND_REREAD_TIMEOUT_US, ECHO_TIMEOUT_MS, SOUND_SPEED_CM_PER_US,
    TRIGGER_PULSE_MS,
};
pub use deadline::{Alarm, AlarmId, DeadlineGuard};
pub use error::Error;
pub use register::{Edge, EdgeMonitor, EdgeTimestampRegister};
pub use sequencer::{distance_from_pulse, Distance, Measurement, RangeSensor, RangeSequencer, State};

use embedded_hal::digital::ErrorKind;
use thiserror::Error;

/// Everything that can go wrong during a ranging cycle or while talking to the console.
///
/// A missing echo is not an error, it is reported as [`Measurement::Timeout`](crate::Measurement::Timeout).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The one-shot deadline could not be scheduled, the cycle was aborted.
    #[error("failed to schedule the echo deadline")]
    SchedulingFailure,

    /// A deadline was requested while the previous one is still pending.
    #[error("a deadline is already armed")]
    AlreadyArmed,

    /// The falling edge was recorded without a rising edge, or before it.
    #[error("echo edges are incomplete or out of order")]
    InvalidEcho,

    /// Driving the trigger pin failed.
    #[error("error driving trigger pin: {0}")]
    Trigger(ErrorKind),

    /// Reading the echo pin failed.
    #[error("error reading echo pin: {0}")]
    Echo(ErrorKind),

    /// The command channel could not be read or written.
    #[error("console I/O failed")]
    Console,
}

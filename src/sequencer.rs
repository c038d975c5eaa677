use core::hint::spin_loop;

use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, OutputPin},
};

use crate::{
    clock::{DateTime, WallClock},
    config::Config,
    deadline::{Alarm, DeadlineGuard},
    register::EdgeTimestampRegister,
    Error,
};

/// Where a ranging cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Idle,
    Triggering,
    AwaitingEcho,
    Resolved,
    Timeout,
}

/// A measured distance.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Distance(f32);

impl Distance {
    /// Returns a distance of `centimeters`.
    pub fn from_centimeters(centimeters: f32) -> Self {
        Self(centimeters)
    }

    /// Returns the distance in centimeters.
    pub fn centimeters(&self) -> f32 {
        self.0
    }

    /// Returns the distance in inches.
    pub fn inches(&self) -> f32 {
        self.0 / 2.54
    }
}

/// The outcome of one ranging cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Measurement {
    Success {
        distance: Distance,
        measured_at: DateTime,
    },
    /// No falling edge before the deadline.
    Timeout,
}

/// Anything that can take a single measurement on demand.
pub trait RangeSensor {
    fn measure(&mut self) -> Result<Measurement, Error>;
}

/// Convert an echo pulse into a distance.
///
/// The pulse covers the round trip, hence the halving. Returns `None` if `fall` precedes
/// `rise`. The arithmetic is done in `f64` and narrowed afterwards.
pub fn distance_from_pulse(rise: u64, fall: u64, sound_speed_cm_per_us: f64) -> Option<Distance> {
    let width_us = fall.checked_sub(rise)?;
    let centimeters = width_us as f64 * sound_speed_cm_per_us / 2.0;
    Some(Distance(centimeters as f32))
}

/// Runs trigger, echo wait and result as one uninterruptible cycle.
///
/// The echo edges and the deadline expiry arrive asynchronously through the shared
/// `register` and `deadline`; the sequencer only polls them. Cycles never overlap since
/// `measure` holds `&mut self` until the cycle is back to [`State::Idle`].
pub struct RangeSequencer<'a, TRIGPIN, DELAY, ALARM, RTC> {
    trigger: TRIGPIN,
    delay: DELAY,
    alarm: ALARM,
    wall_clock: RTC,
    register: &'a EdgeTimestampRegister,
    deadline: &'a DeadlineGuard,
    config: Config,
    state: State,
}

impl<'a, TRIGPIN, DELAY, ALARM, RTC> RangeSequencer<'a, TRIGPIN, DELAY, ALARM, RTC>
where
    TRIGPIN: OutputPin,
    DELAY: DelayNs,
    ALARM: Alarm,
    RTC: WallClock,
{
    /// Requires the trigger pin, a delay for the pulse, the platform alarm, a wall clock for
    /// the timestamps and the two cells shared with the edge handler and the alarm.
    pub fn new(
        trigger: TRIGPIN,
        delay: DELAY,
        alarm: ALARM,
        wall_clock: RTC,
        register: &'a EdgeTimestampRegister,
        deadline: &'a DeadlineGuard,
        config: Config,
    ) -> Self {
        Self {
            trigger,
            delay,
            alarm,
            wall_clock,
            register,
            deadline,
            config,
            state: State::Idle,
        }
    }

    /// Returns the current cycle state, [`State::Idle`] between measurements.
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the timings and sound speed in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one full cycle and come back to [`State::Idle`], whatever the outcome.
    pub fn measure(&mut self) -> Result<Measurement, Error> {
        let result = self.cycle();
        self.state = State::Idle;
        result
    }

    fn cycle(&mut self) -> Result<Measurement, Error> {
        self.state = State::Triggering;
        self.register.reset();
        self.pulse_trigger()?;

        // Arming failure aborts the cycle instead of waiting without a bound.
        if let Err(e) = self
            .deadline
            .arm(&mut self.alarm, self.config.echo_timeout_ms)
        {
            #[cfg(feature = "defmt")]
            defmt::error!("could not arm echo deadline: {}", e);
            return Err(e);
        }

        self.state = State::AwaitingEcho;
        loop {
            // Echo first so a photo finish with the deadline counts as a reading.
            if self.register.is_complete() {
                self.state = State::Resolved;
                return self.resolve();
            }
            if self.deadline.is_expired() {
                self.state = State::Timeout;
                return Ok(self.time_out());
            }
            spin_loop();
        }
    }

    fn pulse_trigger(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        defmt::trace!("trigger pulse {=u32} ms", self.config.trigger_pulse_ms);

        self.trigger
            .set_high()
            .map_err(|e| Error::Trigger(e.kind()))?;
        self.delay.delay_ms(self.config.trigger_pulse_ms);
        self.trigger
            .set_low()
            .map_err(|e| Error::Trigger(e.kind()))
    }

    fn resolve(&mut self) -> Result<Measurement, Error> {
        self.deadline.cancel(&mut self.alarm);
        // The deadline may have fired between the echo and the cancel.
        self.deadline.clear();

        let (rise, fall) = self.register.read();
        let distance = match (rise, fall) {
            (Some(rise), Some(fall)) => {
                distance_from_pulse(rise, fall, self.config.sound_speed_cm_per_us)
            }
            _ => None,
        };
        let Some(distance) = distance else {
            #[cfg(feature = "defmt")]
            defmt::warn!("discarding echo: rise {} fall {}", rise, fall);
            return Err(Error::InvalidEcho);
        };

        #[cfg(feature = "defmt")]
        defmt::debug!("echo resolved: {} cm", distance.centimeters());

        Ok(Measurement::Success {
            distance,
            measured_at: self.wall_clock.now(),
        })
    }

    fn time_out(&mut self) -> Measurement {
        self.deadline.cancel(&mut self.alarm);
        self.deadline.clear();

        #[cfg(feature = "defmt")]
        defmt::warn!("no echo within {=u32} ms", self.config.echo_timeout_ms);

        Measurement::Timeout
    }
}

impl<TRIGPIN, DELAY, ALARM, RTC> RangeSensor for RangeSequencer<'_, TRIGPIN, DELAY, ALARM, RTC>
where
    TRIGPIN: OutputPin,
    DELAY: DelayNs,
    ALARM: Alarm,
    RTC: WallClock,
{
    fn measure(&mut self) -> Result<Measurement, Error> {
        RangeSequencer::measure(self)
    }
}

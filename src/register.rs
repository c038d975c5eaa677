use core::cell::Cell;

use critical_section::Mutex;
use embedded_hal::digital::Error as _;
use embedded_hal_async::digital::Wait;

use crate::{clock::Now, Error};

/// A transition on the echo pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
}

/// The rise and fall timestamps of the current echo pulse, in microseconds since boot.
///
/// The edge handler is the only writer and the sequencer only reads once it has seen the
/// falling edge or the deadline. Each field sits behind its own critical section, so a
/// handler never waits on anything longer than a single store.
pub struct EdgeTimestampRegister {
    rise: Mutex<Cell<Option<u64>>>,
    fall: Mutex<Cell<Option<u64>>>,
}

impl EdgeTimestampRegister {
    /// Returns an empty register, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            rise: Mutex::new(Cell::new(None)),
            fall: Mutex::new(Cell::new(None)),
        }
    }

    /// Forget both timestamps. Must happen before every trigger.
    pub fn reset(&self) {
        critical_section::with(|cs| self.rise.borrow(cs).set(None));
        critical_section::with(|cs| self.fall.borrow(cs).set(None));
    }

    /// Store the rising edge timestamp. Requires `micros` from the same clock as the fall.
    pub fn record_rise(&self, micros: u64) {
        critical_section::with(|cs| self.rise.borrow(cs).set(Some(micros)));
    }

    /// Store the falling edge timestamp, completing the cycle.
    pub fn record_fall(&self, micros: u64) {
        critical_section::with(|cs| self.fall.borrow(cs).set(Some(micros)));
    }

    /// Store `micros` in the field of `edge`.
    pub fn record(&self, edge: Edge, micros: u64) {
        match edge {
            Edge::Rising => self.record_rise(micros),
            Edge::Falling => self.record_fall(micros),
        }
    }

    /// The cycle is complete once the falling edge has been seen.
    pub fn is_complete(&self) -> bool {
        critical_section::with(|cs| self.fall.borrow(cs).get()).is_some()
    }

    /// Returns `(rise, fall)`.
    pub fn read(&self) -> (Option<u64>, Option<u64>) {
        let rise = critical_section::with(|cs| self.rise.borrow(cs).get());
        let fall = critical_section::with(|cs| self.fall.borrow(cs).get());
        (rise, fall)
    }
}

impl Default for EdgeTimestampRegister {
    fn default() -> Self {
        Self::new()
    }
}

/// Watches the echo pin and stamps every edge into a register.
///
/// Meant to run as its own task at a higher priority than the sequencer, standing in for
/// the GPIO edge interrupt handler. Edges are awaited in pulse order, rise then fall, so
/// the kind of an edge comes from what was waited for and never from a later level read.
pub struct EdgeMonitor<'a, ECHOPIN, CLOCK> {
    echo: ECHOPIN,
    clock: CLOCK,
    register: &'a EdgeTimestampRegister,
    expecting: Edge,
}

impl<'a, ECHOPIN, CLOCK> EdgeMonitor<'a, ECHOPIN, CLOCK>
where
    ECHOPIN: Wait,
    CLOCK: Now,
{
    /// Requires the echo pin, a microsecond clock and the register the sequencer polls.
    pub fn new(echo: ECHOPIN, clock: CLOCK, register: &'a EdgeTimestampRegister) -> Self {
        Self {
            echo,
            clock,
            register,
            expecting: Edge::Rising,
        }
    }

    /// Wait for the next edge of the pulse, record it and report which one it was.
    ///
    /// A pin error leaves the expected edge unchanged.
    pub async fn next_edge(&mut self) -> Result<Edge, Error> {
        let edge = self.expecting;
        let waited = match edge {
            Edge::Rising => self.echo.wait_for_rising_edge().await,
            Edge::Falling => self.echo.wait_for_falling_edge().await,
        };
        waited.map_err(|e| Error::Echo(e.kind()))?;

        self.register.record(edge, self.clock.now_micros());
        self.expecting = match edge {
            Edge::Rising => Edge::Falling,
            Edge::Falling => Edge::Rising,
        };
        Ok(edge)
    }

    /// Record edges forever. Pin errors are logged and the wait resumes.
    pub async fn run(&mut self) -> ! {
        loop {
            match self.next_edge().await {
                #[cfg(feature = "defmt")]
                Ok(edge) => defmt::trace!("echo {} edge", edge),
                #[cfg(not(feature = "defmt"))]
                Ok(_) => {}
                #[cfg(feature = "defmt")]
                Err(e) => defmt::warn!("echo monitor: {}", e),
                #[cfg(not(feature = "defmt"))]
                Err(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::sync::atomic::{AtomicU64, Ordering};
    use embedded_hal::digital::{ErrorKind, ErrorType};
    use futures::executor::block_on;
    use std::collections::VecDeque;

    /// Replays `events` as edges. There is no level to read back, as when the handler only
    /// runs after the pulse is already over.
    struct EchoPinMock {
        events: VecDeque<Edge>,
    }

    impl EchoPinMock {
        fn new(events: &[Edge]) -> Self {
            Self {
                events: events.iter().copied().collect(),
            }
        }

        /// An armed edge detector ignores the other kind of edge.
        fn next(&mut self, wanted: Edge) -> Result<(), ErrorKind> {
            while let Some(edge) = self.events.pop_front() {
                if edge == wanted {
                    return Ok(());
                }
            }
            Err(ErrorKind::Other)
        }
    }

    impl ErrorType for EchoPinMock {
        type Error = ErrorKind;
    }

    impl Wait for EchoPinMock {
        async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
        async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
        async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
            self.next(Edge::Rising)
        }
        async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
            self.next(Edge::Falling)
        }
        async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    struct StepClock {
        next: AtomicU64,
        step: u64,
    }

    impl Now for StepClock {
        fn now_micros(&self) -> u64 {
            self.next.fetch_add(self.step, Ordering::Relaxed)
        }
    }

    #[test]
    fn starts_unset() {
        let register = EdgeTimestampRegister::new();
        assert_eq!(register.read(), (None, None));
        assert!(!register.is_complete());
    }

    #[test]
    fn each_edge_writes_only_its_own_field() {
        let register = EdgeTimestampRegister::new();
        register.record_rise(1000);
        assert_eq!(register.read(), (Some(1000), None));
        assert!(!register.is_complete());

        register.record(Edge::Falling, 1582);
        assert_eq!(register.read(), (Some(1000), Some(1582)));
        assert!(register.is_complete());
    }

    #[test]
    fn reset_clears_both_fields() {
        let register = EdgeTimestampRegister::new();
        register.record_rise(10);
        register.record_fall(20);
        register.reset();
        assert_eq!(register.read(), (None, None));
    }

    #[test]
    fn monitor_records_rise_then_fall() {
        let register = EdgeTimestampRegister::new();
        let clock = StepClock {
            next: AtomicU64::new(1000),
            step: 582,
        };
        let mut monitor = EdgeMonitor::new(EchoPinMock::new(&[Edge::Rising, Edge::Falling]), &clock, &register);

        let edges = block_on(async {
            let first = monitor.next_edge().await.unwrap();
            let second = monitor.next_edge().await.unwrap();
            [first, second]
        });

        assert_eq!(edges, [Edge::Rising, Edge::Falling]);
        assert_eq!(register.read(), (Some(1000), Some(1582)));
    }

    #[test]
    fn late_handled_rise_is_still_a_rise() {
        let register = EdgeTimestampRegister::new();
        let clock = StepClock {
            next: AtomicU64::new(1000),
            step: 582,
        };
        let mut monitor = EdgeMonitor::new(EchoPinMock::new(&[Edge::Rising]), &clock, &register);

        assert_eq!(block_on(monitor.next_edge()), Ok(Edge::Rising));
        assert_eq!(register.read(), (Some(1000), None));
        assert!(!register.is_complete());
    }

    #[test]
    fn monitor_skips_a_stray_fall_before_the_pulse() {
        let register = EdgeTimestampRegister::new();
        let clock = StepClock {
            next: AtomicU64::new(1000),
            step: 582,
        };
        let mut monitor = EdgeMonitor::new(
            EchoPinMock::new(&[Edge::Falling, Edge::Rising, Edge::Falling]),
            &clock,
            &register,
        );

        let edges = block_on(async {
            let first = monitor.next_edge().await.unwrap();
            let second = monitor.next_edge().await.unwrap();
            [first, second]
        });

        assert_eq!(edges, [Edge::Rising, Edge::Falling]);
        assert_eq!(register.read(), (Some(1000), Some(1582)));
    }

    #[test]
    fn monitor_surfaces_pin_errors() {
        let register = EdgeTimestampRegister::new();
        let clock = StepClock {
            next: AtomicU64::new(0),
            step: 1,
        };
        let mut monitor = EdgeMonitor::new(EchoPinMock::new(&[]), &clock, &register);

        assert_eq!(
            block_on(monitor.next_edge()),
            Err(Error::Echo(ErrorKind::Other))
        );
        assert_eq!(register.read(), (None, None));
    }
}

//! The board side of the ranging core: clocks, the alarm, the RTC and the UART console.

use defmt::warn;
use embassy_futures::select::{Either, select};
use embassy_rp::{
    peripherals::{RTC, UART0},
    rtc::{DateTime as RtcDateTime, DayOfWeek, Rtc},
    uart::{Async, Uart},
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel, signal::Signal};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use hcsr04_irq::{Alarm, AlarmId, Console, DateTime, DeadlineGuard, Error, Now, WallClock};

static ARM_REQUESTS: Channel<CriticalSectionRawMutex, (AlarmId, u32), 1> = Channel::new();
static CANCELLED: Signal<CriticalSectionRawMutex, AlarmId> = Signal::new();

pub struct EmbassyClock;

impl Now for EmbassyClock {
    fn now_micros(&self) -> u64 {
        Instant::now().as_micros()
    }
}

/// Hands deadlines to [`run_deadlines`]. Only one may be in flight, a second one while the
/// timer task is still busy counts as exhausted.
pub struct EmbassyAlarm;

impl Alarm for EmbassyAlarm {
    fn schedule(&mut self, id: AlarmId, after_ms: u32) -> Result<(), Error> {
        ARM_REQUESTS
            .try_send((id, after_ms))
            .map_err(|_| Error::SchedulingFailure)
    }

    fn cancel(&mut self, id: AlarmId) {
        CANCELLED.signal(id);
    }
}

/// The timer side of [`EmbassyAlarm`]. Must run on an executor that preempts the sequencer.
pub async fn run_deadlines(guard: &DeadlineGuard) -> ! {
    loop {
        let (id, after_ms) = ARM_REQUESTS.receive().await;
        let cancelled = async {
            while CANCELLED.wait().await != id {}
        };
        match select(Timer::after_millis(after_ms.into()), cancelled).await {
            Either::First(()) => guard.expire(id),
            Either::Second(()) => {}
        }
    }
}

pub struct RtcClock {
    rtc: Rtc<'static, RTC>,
    last: DateTime,
}

impl RtcClock {
    /// Start the RTC at `epoch`.
    pub fn new(mut rtc: Rtc<'static, RTC>, epoch: DateTime) -> Self {
        if rtc.set_datetime(to_rtc(epoch)).is_err() {
            warn!("RTC rejected epoch {}", epoch);
        }
        Self { rtc, last: epoch }
    }
}

impl WallClock for RtcClock {
    fn now(&mut self) -> DateTime {
        match self.rtc.now() {
            Ok(now) => self.last = from_rtc(&now),
            Err(_) => warn!("RTC not running, reusing {}", self.last),
        }
        self.last
    }
}

fn to_rtc(t: DateTime) -> RtcDateTime {
    let day_of_week = match t.day_of_week {
        0 => DayOfWeek::Sunday,
        1 => DayOfWeek::Monday,
        2 => DayOfWeek::Tuesday,
        3 => DayOfWeek::Wednesday,
        4 => DayOfWeek::Thursday,
        5 => DayOfWeek::Friday,
        _ => DayOfWeek::Saturday,
    };
    RtcDateTime {
        year: t.year,
        month: t.month,
        day: t.day,
        day_of_week,
        hour: t.hour,
        minute: t.minute,
        second: t.second,
    }
}

fn from_rtc(t: &RtcDateTime) -> DateTime {
    DateTime {
        year: t.year,
        month: t.month,
        day: t.day,
        day_of_week: t.day_of_week as u8,
        hour: t.hour,
        minute: t.minute,
        second: t.second,
    }
}

pub struct UartConsole {
    uart: Uart<'static, UART0, Async>,
}

impl UartConsole {
    pub fn new(uart: Uart<'static, UART0, Async>) -> Self {
        Self { uart }
    }
}

impl Console for UartConsole {
    async fn read_byte(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        self.uart.read(&mut byte).await.map_err(|_| Error::Console)?;
        Ok(byte[0])
    }

    async fn read_byte_timeout(&mut self, timeout_us: u32) -> Result<Option<u8>, Error> {
        match with_timeout(Duration::from_micros(timeout_us.into()), self.read_byte()).await {
            Ok(byte) => byte.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), Error> {
        self.uart
            .write(line.as_bytes())
            .await
            .map_err(|_| Error::Console)?;
        self.uart.write(b"\r\n").await.map_err(|_| Error::Console)
    }
}

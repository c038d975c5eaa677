#![no_std]
#![no_main]

mod platform;

use cortex_m_rt::entry;
use defmt::{info, unwrap};
use embassy_executor::InterruptExecutor;
use embassy_futures::block_on;
use embassy_rp::{
    bind_interrupts,
    gpio::{Input, Level, Output, Pull},
    interrupt,
    interrupt::{InterruptExt, Priority},
    peripherals::UART0,
    rtc::Rtc,
    uart::{Config as ConfigUart, InterruptHandler as UartInterruptHandler, Uart},
};
use embassy_time::Delay;
use hcsr04_irq::{
    CommandLoop, Config, DateTime, DeadlineGuard, EdgeMonitor, EdgeTimestampRegister,
    RangeSequencer,
};
use {defmt_rtt as _, panic_probe as _};

use platform::{EmbassyAlarm, EmbassyClock, RtcClock, UartConsole};

/// Where the RTC starts counting from.
const EPOCH: DateTime = DateTime {
    year: 2020,
    month: 1,
    day: 13,
    day_of_week: 3, // Wednesday
    hour: 11,
    minute: 20,
    second: 0,
};

static EDGES: EdgeTimestampRegister = EdgeTimestampRegister::new();
static DEADLINE: DeadlineGuard = DeadlineGuard::new();

static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

bind_interrupts!(struct Irqs {
    UART0_IRQ => UartInterruptHandler<UART0>;
});

#[interrupt]
unsafe fn SWI_IRQ_1() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

#[embassy_executor::task]
async fn echo_task(echo: Input<'static>) {
    EdgeMonitor::new(echo, EmbassyClock, &EDGES).run().await
}

#[embassy_executor::task]
async fn deadline_task() {
    platform::run_deadlines(&DEADLINE).await
}

#[entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    info!("Running!");

    let echo = Input::new(p.PIN_2, Pull::Down);
    let trigger = Output::new(p.PIN_3, Level::Low);

    // Edges and deadlines preempt the busy-waiting foreground.
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    unwrap!(spawner.spawn(echo_task(echo)));
    unwrap!(spawner.spawn(deadline_task()));

    let rtc = RtcClock::new(Rtc::new(p.RTC), EPOCH);
    let uart = Uart::new(
        p.UART0,
        p.PIN_0,
        p.PIN_1,
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        ConfigUart::default(),
    );

    let config = Config::default();
    let sensor = RangeSequencer::new(
        trigger,
        Delay,
        EmbassyAlarm,
        rtc,
        &EDGES,
        &DEADLINE,
        config,
    );
    let mut commands = CommandLoop::new(
        UartConsole::new(uart),
        sensor,
        config.command_reread_timeout_us,
    );

    block_on(commands.run())
}

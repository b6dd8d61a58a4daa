#![no_std]
#![no_main]
mod display;
mod pulse_input;
mod web;

use core::cell::RefCell;

use assign_resources::assign_resources;
use embassy_executor::InterruptExecutor;
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use static_cell::StaticCell;
use twin_tach::{EdgeMailbox, Millis, Monitor, TachConfig, CHANNEL_COUNT};
use {defmt_rtt as _, panic_probe as _};

use crate::display::display_task;
use crate::pulse_input::pulse_input_task;
use crate::web::web_task;

/// how often the main loop drains the edge mailboxes. Edges closer together than this are
/// coalesced, which is fine as long as it stays below the debounce time.
const ESTIMATOR_POLL_INTERVAL: embassy_time::Duration = embassy_time::Duration::from_millis(1);

/// status line on the debug probe
const STATUS_LOG_INTERVAL: embassy_time::Duration = embassy_time::Duration::from_millis(2000);

pub type SharedMonitor = Mutex<CriticalSectionRawMutex, RefCell<Monitor>>;

/// written by the pulse input tasks, drained by the main loop
pub static EDGE_MAILBOXES: [EdgeMailbox; CHANNEL_COUNT] = [EdgeMailbox::new(), EdgeMailbox::new()];

pub static DISPLAY_CHANNEL: Channel<CriticalSectionRawMutex, [f32; CHANNEL_COUNT], 1> = Channel::new();

static MONITOR: StaticCell<SharedMonitor> = StaticCell::new();

/// pulse inputs run here so they preempt the estimator loop like a pin interrupt would
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

assign_resources! {
    pulse_inputs: PulseInputPins {
        sensor_1: PIN_6,
        sensor_2: PIN_7,
    }
    displays: DisplayPins {
        clk_1: PIN_2,
        dio_1: PIN_3,
        clk_2: PIN_4,
        dio_2: PIN_5,
    }
    ethernet: EthernetPins { // W5500, same wiring as the W5500-EVB-Pico
        spi: SPI0,
        clk: PIN_18,
        mosi: PIN_19,
        miso: PIN_16,
        cs: PIN_17,
        int: PIN_21,
        rst: PIN_20,
        tx_dma: DMA_CH0,
        rx_dma: DMA_CH1,
    }
    settings: SettingsResources {
        flash: FLASH,
    }
}

pub fn now_ms() -> Millis {
    // wraps after ~49 days, the core only ever looks at differences
    embassy_time::Instant::now().as_millis() as Millis
}

#[embassy_executor::main]
async fn main(spawner: embassy_executor::Spawner) {
    let p = embassy_rp::init(Default::default());

    let r = split_resources!(p);

    let config = TachConfig::builder()
        .build()
        .expect("built-in tachometer configuration is invalid");

    let monitor: &'static SharedMonitor = MONITOR.init(Mutex::new(RefCell::new(Monitor::new(config))));

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high_priority_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);

    // hall sensors pull the line low once per revolution
    let sensor_1 = Input::new(r.pulse_inputs.sensor_1, Pull::Up);
    let sensor_2 = Input::new(r.pulse_inputs.sensor_2, Pull::Up);
    high_priority_spawner
        .spawn(pulse_input_task(sensor_1, &EDGE_MAILBOXES[0], config.debounce_ms))
        .expect("failed to spawn pulse input task 1");
    high_priority_spawner
        .spawn(pulse_input_task(sensor_2, &EDGE_MAILBOXES[1], config.debounce_ms))
        .expect("failed to spawn pulse input task 2");

    spawner.spawn(display_task(r.displays)).expect("failed to spawn display task");

    let stack = web::start_network(&spawner, r.ethernet).await;
    let theme_store = web::open_theme_store(r.settings);
    spawner
        .spawn(web_task(stack, monitor, theme_store))
        .expect("failed to spawn web task");

    defmt::info!("twin-tach running");

    let mut ticker = embassy_time::Ticker::every(ESTIMATOR_POLL_INTERVAL);
    let mut last_status_log = embassy_time::Instant::now();

    loop {
        ticker.next().await;

        let outcome = monitor.lock(|m| m.borrow_mut().poll(&EDGE_MAILBOXES, now_ms()));

        if outcome.tick && DISPLAY_CHANNEL.try_send(outcome.rpm).is_err() {
            defmt::warn!("Display task is behind, skipping refresh");
        }

        if last_status_log.elapsed() > STATUS_LOG_INTERVAL {
            last_status_log = embassy_time::Instant::now();
            let recording = monitor.lock(|m| m.borrow().is_recording());
            defmt::info!(
                "RPM1: {}, RPM2: {}, recording: {}",
                outcome.rpm[0],
                outcome.rpm[1],
                recording
            );
        }
    }
}

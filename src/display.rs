//! Drives the two TM1637 four digit displays, one per sensor.

use core::convert::Infallible;

use defmt::*;
use embassy_rp::gpio::{Level, OutputOpenDrain};
use embassy_time::Delay;
use twin_tach::segment_display::{Tm1637, DEFAULT_BRIGHTNESS};

use crate::{DisplayPins, DISPLAY_CHANNEL};

#[embassy_executor::task]
pub async fn display_task(r: DisplayPins) {
    let receiver = DISPLAY_CHANNEL.receiver();

    let mut display_1 = Tm1637::new(
        OutputOpenDrain::new(r.clk_1, Level::High),
        OutputOpenDrain::new(r.dio_1, Level::High),
        Delay,
    );
    let mut display_2 = Tm1637::new(
        OutputOpenDrain::new(r.clk_2, Level::High),
        OutputOpenDrain::new(r.dio_2, Level::High),
        Delay,
    );
    display_1.set_brightness(DEFAULT_BRIGHTNESS);
    display_2.set_brightness(DEFAULT_BRIGHTNESS);

    infallible(display_1.init());
    infallible(display_2.init());
    infallible(display_1.show_rpm(0.0));
    infallible(display_2.show_rpm(0.0));

    info!("displays initialized");

    loop {
        let [rpm_1, rpm_2] = receiver.receive().await;
        infallible(display_1.show_rpm(rpm_1));
        infallible(display_2.show_rpm(rpm_2));
    }
}

/// rp2040 gpio writes cannot fail
fn infallible(result: Result<(), Infallible>) {
    result.unwrap_or_else(|never| match never {})
}

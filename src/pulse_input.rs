// Edge capture for one hall sensor. Runs on the interrupt executor: it must never block on
// anything but the pin, and never touches the monitor.

use embassy_rp::gpio::Input;
use twin_tach::{EdgeCapture, EdgeMailbox, Millis};

#[embassy_executor::task(pool_size = 2)]
pub async fn pulse_input_task(mut input: Input<'static>, mailbox: &'static EdgeMailbox, debounce_ms: Millis) {
    let mut capture = EdgeCapture::new(mailbox, debounce_ms);
    loop {
        input.wait_for_falling_edge().await;
        capture.on_edge(crate::now_ms());
    }
}

//! Dashboard web server on a W5500 ethernet module.
//!
//! One connection at a time, one request per connection. Every handler either copies what it needs
//! out of the monitor inside a short critical section or mutates a single flag, so a slow client
//! never holds up the estimator loop.

use defmt::*;
use embassy_net::tcp::{self, TcpSocket};
use embassy_net::{Stack, StackResources};
use embassy_net_wiznet::chip::W5500;
use embassy_net_wiznet::{Device, Runner, State};
use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{FLASH, SPI0};
use embassy_rp::spi::{Async, Config as SpiConfig, Spi};
use embassy_time::{Delay, Duration, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_io_async::Write;
use heapless::String;
use static_cell::StaticCell;
use twin_tach::config::DEFAULT_HISTORY_CAPACITY;
use twin_tach::http::{self, Route, Status, CONTENT_CSV, CONTENT_HTML, CONTENT_JSON, CONTENT_TEXT, CSV_DISPOSITION};
use twin_tach::settings::ThemeStore;
use twin_tach::{dashboard, export};

use crate::{EthernetPins, SettingsResources, SharedMonitor};

const HTTP_PORT: u16 = 80;

/// locally administered, unicast
const MAC_ADDRESS: [u8; 6] = [0x02, 0x74, 0x74, 0x61, 0x63, 0x68];

const ETHERNET_SPI_FREQ: u32 = 50_000_000;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

const SOCKET_BUFFER_LEN: usize = 1024;
const REQUEST_BUFFER_LEN: usize = 1024;
const HEAD_BUFFER_LEN: usize = 256;

/// fits the JSON snapshot and the CSV export of a full 60 sample history
const BODY_BUFFER_LEN: usize = 4096;

pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// last sector of flash, kept out of the program region by memory.x
const SETTINGS_SECTOR_SIZE: usize = 4096;
const SETTINGS_OFFSET: u32 = (FLASH_SIZE - SETTINGS_SECTOR_SIZE) as u32;

type EthernetSpi = ExclusiveDevice<Spi<'static, SPI0, Async>, Output<'static>, Delay>;
type EthernetRunner = Runner<'static, W5500, EthernetSpi, Input<'static>, Output<'static>>;
pub type NetStack = Stack<Device<'static>>;
pub type SettingsFlash = Flash<'static, FLASH, Blocking, FLASH_SIZE>;

#[embassy_executor::task]
async fn ethernet_task(runner: EthernetRunner) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(stack: &'static NetStack) -> ! {
    stack.run().await
}

/// Bring up the W5500 and a DHCP configured stack. Returns before an address is assigned.
pub async fn start_network(spawner: &embassy_executor::Spawner, r: EthernetPins) -> &'static NetStack {
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = ETHERNET_SPI_FREQ;
    let spi = Spi::new(r.spi, r.clk, r.mosi, r.miso, r.tx_dma, r.rx_dma, spi_config);
    let cs = Output::new(r.cs, Level::High);
    let int = Input::new(r.int, Pull::Up);
    let reset = Output::new(r.rst, Level::High);
    let spi_device = ExclusiveDevice::new(spi, cs, Delay).expect("setting chip select cannot fail");

    static STATE: StaticCell<State<8, 8>> = StaticCell::new();
    let state = STATE.init(State::<8, 8>::new());
    let (device, runner) = embassy_net_wiznet::new(MAC_ADDRESS, state, spi_device, int, reset).await;
    spawner.spawn(ethernet_task(runner)).expect("failed to spawn ethernet task");

    // only seeds TCP sequence numbers, boot time jitter is good enough
    let seed = embassy_time::Instant::now().as_ticks() ^ 0x7477_696e_7461_6368;

    static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    static STACK: StaticCell<NetStack> = StaticCell::new();
    let stack = &*STACK.init(Stack::new(
        device,
        embassy_net::Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::<3>::new()),
        seed,
    ));
    spawner.spawn(net_task(stack)).expect("failed to spawn net task");

    stack
}

pub fn open_theme_store(r: SettingsResources) -> ThemeStore<SettingsFlash> {
    let flash = Flash::<_, Blocking, FLASH_SIZE>::new_blocking(r.flash);
    ThemeStore::new(flash, SETTINGS_OFFSET).expect("settings sector is misaligned")
}

#[embassy_executor::task]
pub async fn web_task(stack: &'static NetStack, monitor: &'static SharedMonitor, mut theme: ThemeStore<SettingsFlash>) {
    let address = loop {
        if let Some(config) = stack.config_v4() {
            break config.address;
        }
        Timer::after_millis(100).await;
    };
    info!("dashboard at http://{}/", address.address());

    let mut dark_mode = theme.load_dark_mode().unwrap_or_else(|e| {
        warn!("could not read theme, using light: {}", e);
        false
    });

    let mut rx_buffer = [0u8; SOCKET_BUFFER_LEN];
    let mut tx_buffer = [0u8; SOCKET_BUFFER_LEN];
    let mut request = [0u8; REQUEST_BUFFER_LEN];
    let mut body = [0u8; BODY_BUFFER_LEN];

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        if let Err(e) = socket.accept(HTTP_PORT).await {
            warn!("accept error: {:?}", e);
            continue;
        }

        if let Err(e) = serve(&mut socket, &mut request, &mut body, monitor, &mut theme, &mut dark_mode).await {
            warn!("connection error: {:?}", e);
        }

        socket.close();
        if let Err(e) = socket.flush().await {
            debug!("flush on close failed: {:?}", e);
        }
    }
}

async fn serve(
    socket: &mut TcpSocket<'_>,
    request: &mut [u8],
    body: &mut [u8],
    monitor: &SharedMonitor,
    theme: &mut ThemeStore<SettingsFlash>,
    dark_mode: &mut bool,
) -> Result<(), tcp::Error> {
    let len = read_head(socket, request).await?;
    let route = match http::parse_request(&request[..len]) {
        Ok(route) => route,
        Err(e) => {
            warn!("rejected request: {}", e);
            let status = Status::from(e);
            return respond(socket, status, CONTENT_TEXT, status.reason().as_bytes(), None).await;
        }
    };
    debug!("{}", route);

    match route {
        Route::Index => {
            let mut head: String<HEAD_BUFFER_LEN> = String::new();
            if http::write_head(&mut head, Status::Ok, CONTENT_HTML, dashboard::page_len(*dark_mode), None).is_err() {
                error!("response head overflow");
                return Ok(());
            }
            socket.write_all(head.as_bytes()).await?;
            for part in dashboard::page_parts(*dark_mode) {
                socket.write_all(part.as_bytes()).await?;
            }
            Ok(())
        }
        Route::SensorData => {
            let snapshot = monitor.lock(|m| m.borrow().snapshot());
            match export::write_json(&snapshot, body) {
                Ok(n) => respond(socket, Status::Ok, CONTENT_JSON, &body[..n], None).await,
                Err(e) => {
                    error!("sensor data export failed: {}", e);
                    let status = Status::from(e);
                    respond(socket, status, CONTENT_TEXT, status.reason().as_bytes(), None).await
                }
            }
        }
        Route::DownloadData => {
            let history = monitor.lock(|m| m.borrow().history().clone());
            match export::csv_string::<DEFAULT_HISTORY_CAPACITY, BODY_BUFFER_LEN>(&history) {
                Ok(csv) => respond(socket, Status::Ok, CONTENT_CSV, csv.as_bytes(), Some(CSV_DISPOSITION)).await,
                Err(e) => {
                    error!("csv export failed: {}", e);
                    let status = Status::from(e);
                    respond(socket, status, CONTENT_TEXT, status.reason().as_bytes(), None).await
                }
            }
        }
        Route::ToggleRecording => {
            let recording = monitor.lock(|m| m.borrow_mut().toggle_recording());
            let state: &[u8] = if recording { b"1" } else { b"0" };
            respond(socket, Status::Ok, CONTENT_TEXT, state, None).await
        }
        Route::Theme { dark } => {
            if let Some(dark) = dark {
                *dark_mode = dark;
                if let Err(e) = theme.store_dark_mode(dark) {
                    warn!("could not save theme: {}", e);
                }
            }
            respond(socket, Status::Ok, CONTENT_TEXT, b"OK", None).await
        }
        Route::NotFound => respond(socket, Status::NotFound, CONTENT_TEXT, Status::NotFound.reason().as_bytes(), None).await,
    }
}

/// Read until the blank line ending the request head, the buffer is full, or the peer closes
async fn read_head(socket: &mut TcpSocket<'_>, buf: &mut [u8]) -> Result<usize, tcp::Error> {
    let mut len = 0;
    while len < buf.len() {
        let n = socket.read(&mut buf[len..]).await?;
        if n == 0 {
            break;
        }
        len += n;
        if http::is_head_complete(&buf[..len]) {
            break;
        }
    }
    Ok(len)
}

async fn respond(
    socket: &mut TcpSocket<'_>,
    status: Status,
    content_type: &str,
    body: &[u8],
    extra_header: Option<(&str, &str)>,
) -> Result<(), tcp::Error> {
    let mut head: String<HEAD_BUFFER_LEN> = String::new();
    if http::write_head(&mut head, status, content_type, body.len(), extra_header).is_err() {
        error!("response head overflow");
        return Ok(());
    }
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(body).await
}

#![no_std]
#![no_main]

use cyw43::aligned_bytes;
use cyw43_pio::{PioSpi, RM2_CLOCK_DIVIDER};
use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_net::tcp::TcpSocket;
use embassy_net::{Config as NetConfig, StackResources};
use embassy_rp::adc::{self, Adc, Channel as AdcChannel};
use embassy_rp::bind_interrupts;
use embassy_rp::dma;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::{self, Pio};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use mowbot_proto::MAX_HEADER_LEN;
use mowbot_rc_pico::{
    blink_period, require_radio, AdcStick, ConsoleAlerts, EngineConfig, InputTask, LinkConfig,
    MemoryImageStore, PollScheduler, Session, SessionManager, WsTransport,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => pio::InterruptHandler<PIO0>;
    DMA_IRQ_0 => dma::InterruptHandler<DMA_CH0>;
    ADC_IRQ_FIFO => adc::InterruptHandler;
});

const WIFI_SSID: &str = match option_env!("MOWBOT_WIFI_SSID") {
    Some(v) => v,
    None => "PiMowBot",
};
const WIFI_PASSWORD: &str = match option_env!("MOWBOT_WIFI_PASSWORD") {
    Some(v) => v,
    None => "",
};

const ENGINE: EngineConfig = EngineConfig {
    link: LinkConfig {
        host: match option_env!("MOWBOT_HOST") {
            Some(v) => v,
            None => LinkConfig::DEFAULT.host,
        },
        token: match option_env!("MOWBOT_TOKEN") {
            Some(v) => v,
            None => LinkConfig::DEFAULT.token,
        },
        ..LinkConfig::DEFAULT
    },
    ..EngineConfig::DEFAULT
};

/// Largest camera image kept.
const IMAGE_LEN: usize = 32 * 1024;

/// How long the radio gets to answer on the SPI bus before it is
/// considered absent.
const RADIO_DETECT_TIMEOUT: Duration = Duration::from_secs(3);

static SESSION: Session<CriticalSectionRawMutex> = Session::new(ENGINE.queue);

static IMAGES: StaticCell<MemoryImageStore<IMAGE_LEN>> = StaticCell::new();
static MESSAGE_BUF: StaticCell<[u8; IMAGE_LEN]> = StaticCell::new();
static FRAME_BUF: StaticCell<[u8; IMAGE_LEN + MAX_HEADER_LEN]> = StaticCell::new();
static TCP_RX: StaticCell<[u8; 4096]> = StaticCell::new();
static TCP_TX: StaticCell<[u8; 1024]> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

type Link = SessionManager<
    'static,
    WsTransport,
    &'static mut MemoryImageStore<IMAGE_LEN>,
    ConsoleAlerts,
>;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("PiMowBot remote starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- Radio Setup ---
    // Firmware blobs must be 4-byte aligned for DMA.
    let fw = aligned_bytes!("../../cyw43-firmware/43439A0.bin");
    let clm = aligned_bytes!("../../cyw43-firmware/43439A0_clm.bin");
    let nvram = aligned_bytes!("../../cyw43-firmware/nvram_rp2040.bin");

    let pwr = Output::new(p.PIN_23, Level::Low);
    let cs = Output::new(p.PIN_25, Level::High);
    let mut pio = Pio::new(p.PIO0, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        RM2_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        p.PIN_24,
        p.PIN_29,
        dma::Channel::new(p.DMA_CH0, Irqs),
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());

    let mut alerts = ConsoleAlerts::new();
    let detected = with_timeout(RADIO_DETECT_TIMEOUT, cyw43::new(state, pwr, spi, fw, nvram)).await;
    let (device, mut control, runner) = match detected {
        Ok(radio) => radio,
        Err(_) => {
            let _ = require_radio(false, &mut alerts, Instant::now()).await;
            // without a radio there is nothing to connect; keep the alert up
            loop {
                Timer::after(Duration::from_secs(60)).await;
            }
        }
    };

    spawner.spawn(cyw43_task(runner).unwrap());

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    // --- Network Setup ---
    let seed = Instant::now().as_ticks() ^ 0x5DEE_CE66_D1CE_4E5B;
    let (stack, net_runner) = embassy_net::new(
        device,
        NetConfig::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(net_task(net_runner).unwrap());

    loop {
        match control
            .join(WIFI_SSID, cyw43::JoinOptions::new(WIFI_PASSWORD.as_bytes()))
            .await
        {
            Ok(()) => break,
            Err(e) => {
                warn!("join {} failed: {:?}", WIFI_SSID, e);
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    }
    info!("joined {}, waiting for DHCP...", WIFI_SSID);
    stack.wait_config_up().await;
    if let Some(config) = stack.config_v4() {
        info!("address {}", config.address);
    }

    // --- Engine Setup ---
    let socket = TcpSocket::new(stack, TCP_RX.init([0; 4096]), TCP_TX.init([0; 1024]));
    let transport = WsTransport::new(stack, socket, FRAME_BUF.init([0; IMAGE_LEN + MAX_HEADER_LEN]));
    let link: Link = SessionManager::new(
        transport,
        IMAGES.init(MemoryImageStore::new()),
        alerts,
        ENGINE.link,
        ENGINE.queue.send_interval,
        MESSAGE_BUF.init([0; IMAGE_LEN]),
    );

    let adc = Adc::new(p.ADC, Irqs, adc::Config::default());
    let x = AdcChannel::new_pin(p.PIN_26, Pull::None);
    let y = AdcChannel::new_pin(p.PIN_27, Pull::None);
    let button = Input::new(p.PIN_22, Pull::Up);
    let stick = AdcStick::new(adc, x, y, button);

    spawner.spawn(session_task(link).unwrap());
    spawner.spawn(input_task(InputTask::new(stick, ENGINE.sampler, ENGINE.coalescer)).unwrap());
    spawner.spawn(poll_task(PollScheduler::new(ENGINE.poll)).unwrap());

    info!("PiMowBot remote initialized, connecting to {}", ENGINE.link.host);

    // --- Status LED ---
    let mut led_on = false;
    loop {
        led_on = !led_on;
        control.gpio_set(0, led_on).await;
        Timer::after(blink_period(SESSION.connection_state())).await;
    }
}

/// Radio driver task.
#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<'static, cyw43::SpiBus<Output<'static>, PioSpi<'static, PIO0, 0>>>,
) -> ! {
    runner.run().await
}

/// Network stack task.
#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// Session task - owns the connection to the robot.
#[embassy_executor::task]
async fn session_task(mut link: Link) {
    let e = link.run(&SESSION).await;
    error!("session task ended: {:?}", e);
}

/// Input task - samples the stick and enqueues commands.
#[embassy_executor::task]
async fn input_task(mut input: InputTask<AdcStick<'static>>) -> ! {
    input.run(&SESSION).await
}

/// Poll task - requests images and telemetry.
#[embassy_executor::task]
async fn poll_task(mut poll: PollScheduler) -> ! {
    poll.run(&SESSION).await
}

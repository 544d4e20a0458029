#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"), // version
    env!("CARGO_PKG_NAME"),    // project_name
    "00:00:00",                // build_time
    "2025-01-01",              // build_date
    "0.0.0",                   // idf_ver (not using IDF)
    0x10000,                   // mmu_page_size (64KB)
    0,                         // min_efuse_blk_rev_full (accept all)
    u16::MAX                   // max_efuse_blk_rev_full (accept all)
);

use embassy_time::{Duration, Ticker};
use esp_backtrace as _;
use esp_hal::gpio::{Flex, Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::timer::timg::TimerGroup;
use log::info;
use static_cell::StaticCell;

use transceiver_control_firmware::channel::VfoChannel;
use transceiver_control_firmware::control::ControlLoop;
use transceiver_control_firmware::rf::frontend::{Bk4819Frontend, RegisterBus};
use transceiver_control_firmware::store::{ChannelStore, ScanList};

/// Tick period driving the whole control core
const TICK_PERIOD_MS: u64 = 10;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Three-wire register bus to the transceiver chip, bit-banged over GPIO.
/// One transfer is an 8-bit register address followed by a 16-bit word,
/// MSB first, data clocked on the rising edge.
struct GpioBus {
    scn: Output<'static>,
    scl: Output<'static>,
    sda: Flex<'static>,
}

impl GpioBus {
    const READ_FLAG: u8 = 0x80;

    fn clock_out_bit(&mut self, bit: bool) {
        self.scl.set_low();
        if bit {
            self.sda.set_high();
        } else {
            self.sda.set_low();
        }
        self.scl.set_high();
    }

    fn clock_in_bit(&mut self) -> bool {
        self.scl.set_low();
        self.scl.set_high();
        self.sda.is_high()
    }

    fn send_address(&mut self, byte: u8) {
        self.sda.set_as_output();
        for i in (0..8).rev() {
            self.clock_out_bit(byte & (1 << i) != 0);
        }
    }
}

impl RegisterBus for GpioBus {
    fn read(&mut self, reg: u8) -> u16 {
        self.scn.set_low();
        self.send_address(reg | Self::READ_FLAG);
        self.sda.set_as_input(Pull::None);
        let mut word = 0u16;
        for _ in 0..16 {
            word = (word << 1) | u16::from(self.clock_in_bit());
        }
        self.scn.set_high();
        word
    }

    fn write(&mut self, reg: u8, value: u16) {
        self.scn.set_low();
        self.send_address(reg & !Self::READ_FLAG);
        for i in (0..16).rev() {
            self.clock_out_bit(value & (1 << i) != 0);
        }
        self.scn.set_high();
    }
}

/// Factory channel table baked into the image. A production build replaces
/// this with the EEPROM-backed table; the control core only sees the trait.
struct FactoryChannelTable {
    channels: [Option<VfoChannel>; 16],
}

impl FactoryChannelTable {
    fn new() -> Self {
        let mut channels = [None; 16];
        for (i, freq) in [43_300_000u32, 43_307_500, 43_315_000, 43_322_500]
            .iter()
            .enumerate()
        {
            let mut vfo = VfoChannel::on_frequency(*freq);
            vfo.channel_number = Some(i as u8);
            vfo.scan_lists.list1 = true;
            channels[i] = Some(vfo);
        }
        Self { channels }
    }
}

impl ChannelStore for FactoryChannelTable {
    fn channel_count(&self) -> u8 {
        self.channels.len() as u8
    }

    fn channel(&self, number: u8) -> Option<VfoChannel> {
        self.channels.get(number as usize).copied().flatten()
    }

    fn in_scan_list(&self, number: u8, list: ScanList) -> bool {
        match self.channel(number) {
            Some(vfo) => match list {
                ScanList::List1 => vfo.scan_lists.list1,
                ScanList::List2 => vfo.scan_lists.list2,
            },
            None => false,
        }
    }

    fn priority_channels(&self, _list: ScanList) -> [Option<u8>; 2] {
        [None, None]
    }

    fn save_last_position(&mut self, channel: Option<u8>, frequency: u32) {
        // No persistent storage on this board revision.
        info!("scan position: channel {:?} at {}", channel, frequency);
    }
}

type Radio = Bk4819Frontend<GpioBus>;

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Transceiver register bus
    let bus = GpioBus {
        scn: Output::new(peripherals.GPIO10, Level::High, OutputConfig::default()),
        scl: Output::new(peripherals.GPIO11, Level::High, OutputConfig::default()),
        sda: Flex::new(peripherals.GPIO12),
    };
    let radio = Bk4819Frontend::new(bus);

    // PTT switch, active low
    let ptt = Input::new(
        peripherals.GPIO13,
        InputConfig::default().with_pull(Pull::Up),
    );

    let control = ControlLoop::new(radio, FactoryChannelTable::new());

    info!("control core up");

    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(control_task(control, ptt));
    })
}

/// The single control task: every component runs from this loop, so no state
/// is shared across contexts and no locking is needed around the core.
#[embassy_executor::task]
async fn control_task(mut control: ControlLoop<Radio, FactoryChannelTable>, ptt: Input<'static>) {
    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));
    loop {
        ticker.next().await;
        control.hardware_tick();
        control.ptt_sample(ptt.is_low());
        control.poll();

        if control.take_beep_request() {
            info!("code search confirmation beep");
        }
        if control.take_status_dirty() {
            let status = control.status();
            info!(
                "state {:?} rx {:?} scan {:?} vfo {}",
                status.operating_state,
                status.reception_mode,
                status.scan_direction,
                status.active_vfo
            );
        }
        // DTMF decoding is handled by the keypad board; nothing to do here.
        let _ = control.take_dtmf_poll();
    }
}

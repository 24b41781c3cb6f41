use core::cell::RefCell;

use embassy_stm32::mode::Blocking;
use embassy_stm32::time::Hertz;
use embassy_stm32::usart::{BufferedUart, Config as UsartConfig};
use embassy_stm32::{bind_interrupts, gpio::Pull, i2c, peripherals, rcc, usart, Config};
use static_cell::StaticCell;

use crate::config::{I2C_FREQUENCY_HZ, UPLINK_BAUDRATE};

// ── IRQ table ─────────────────────────────────────────────
bind_interrupts!(pub struct Irqs {
    USART1 => usart::BufferedInterruptHandler<peripherals::USART1>;
});

/// I2C2 carries both the PPG front-end and the temperature sensor. Only the
/// sampler task touches it.
pub type SensorBus = RefCell<i2c::I2c<'static, Blocking>>;

static SENSOR_BUS: StaticCell<SensorBus> = StaticCell::new();
static UPLINK_TX_BUF: StaticCell<[u8; 512]> = StaticCell::new();
static UPLINK_RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

// ── Board struct ──────────────────────────────────────────
pub struct Board {
    pub sensor_bus: &'static SensorBus,
    pub uplink: BufferedUart<'static>,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();

        // HSI16 -> PLL -> 64MHz SYSCLK
        config.rcc.hsi = Some(rcc::Hsi {
            sys_div: rcc::HsiSysDiv::DIV1,
        });
        config.rcc.pll = Some(rcc::Pll {
            source: rcc::PllSource::HSI,    // Use HSI as PLL source
            prediv: rcc::PllPreDiv::DIV2,   // 16MHz / 2 = 8MHz
            mul: rcc::PllMul::MUL16,        // 8MHz * 16 = 128MHz
            divp: None,
            divq: None,
            divr: Some(rcc::PllRDiv::DIV2), // 128MHz / 2 = 64MHz
        });
        config.rcc.sys = rcc::Sysclk::PLL1_R;
        let p = embassy_stm32::init(config);

        // I²C2 on PB10/PB11, blocking: reads are a few bytes and must finish
        // inside one loop iteration anyway
        let mut i2c_cfg = i2c::Config::default();
        i2c_cfg.sda_pullup = false;
        i2c_cfg.scl_pullup = false;
        let i2c2 = i2c::I2c::new_blocking(p.I2C2, p.PB10, p.PB11, Hertz(I2C_FREQUENCY_HZ), i2c_cfg);

        // USART1 to the network co-processor (RX PC5, TX PC4)
        let mut us_cfg = UsartConfig::default();
        us_cfg.baudrate = UPLINK_BAUDRATE;
        us_cfg.rx_pull = Pull::Up;

        let tx_buf = UPLINK_TX_BUF.init([0; 512]);
        let rx_buf = UPLINK_RX_BUF.init([0; 256]);
        let uplink = match BufferedUart::new(p.USART1, Irqs, p.PC5, p.PC4, tx_buf, rx_buf, us_cfg) {
            Ok(uart) => uart,
            Err(e) => defmt::panic!("uplink UART config rejected: {:?}", e),
        };

        Self {
            sensor_bus: SENSOR_BUS.init(RefCell::new(i2c2)),
            uplink,
        }
    }
}

use embassy_stm32::i2c;
use embassy_time::{block_for, Duration};

use crate::board::SensorBus;
use crate::source::PulseSensor;

// MAX30102 I2C address
pub const MAX30102_ADDRESS: u8 = 0x57;

// Register addresses
const REG_FIFO_WR_PTR: u8 = 0x04;
const REG_OVF_COUNTER: u8 = 0x05;
const REG_FIFO_RD_PTR: u8 = 0x06;
const REG_FIFO_DATA: u8 = 0x07;
const REG_FIFO_CONFIG: u8 = 0x08;
const REG_MODE_CONFIG: u8 = 0x09;
const REG_SPO2_CONFIG: u8 = 0x0A;
const REG_LED1_PA: u8 = 0x0C; // red
const REG_LED2_PA: u8 = 0x0D; // IR
const REG_PART_ID: u8 = 0xFF;

const MAX30102_PART_ID: u8 = 0x15;

const MODE_RESET: u8 = 0x40;
const MODE_SPO2: u8 = 0x03; // red + IR
// 4-sample averaging, rollover on
const FIFO_CONFIG: u8 = (0b010 << 5) | 0x10;
// 4096nA range, 400sps, 411us pulse -> 100Hz out of the averager
const SPO2_CONFIG: u8 = (0b01 << 5) | (0b011 << 2) | 0b11;
const LED_AMPLITUDE: u8 = 0x1F;

const FIFO_DEPTH: u8 = 32;
const BYTES_PER_SAMPLE: usize = 6;

/// IR channel of a MAX30102 in SpO2 mode. Reads never wait for the FIFO:
/// if nothing new arrived, the previous value is repeated.
pub struct Max30102 {
    bus: &'static SensorBus,
    addr: u8,
    last_ir: i32,
    error_count: u32,
}

impl Max30102 {
    pub fn new(bus: &'static SensorBus, addr: u8) -> Result<Self, i2c::Error> {
        let mut ppg = Self {
            bus,
            addr,
            last_ir: 0,
            error_count: 0,
        };

        let id = ppg.read_byte(REG_PART_ID)?;
        if id != MAX30102_PART_ID {
            error!(
                "Invalid MAX30102 part id: 0x{:02X}, expected 0x{:02X}",
                id, MAX30102_PART_ID
            );
            return Err(i2c::Error::Nack);
        }

        ppg.write_byte(REG_MODE_CONFIG, MODE_RESET)?;
        // reset self-clears within a few hundred microseconds
        block_for(Duration::from_millis(2));

        ppg.write_byte(REG_FIFO_CONFIG, FIFO_CONFIG)?;
        ppg.write_byte(REG_MODE_CONFIG, MODE_SPO2)?;
        ppg.write_byte(REG_SPO2_CONFIG, SPO2_CONFIG)?;
        ppg.write_byte(REG_LED1_PA, LED_AMPLITUDE)?;
        ppg.write_byte(REG_LED2_PA, LED_AMPLITUDE)?;
        ppg.clear_fifo()?;

        info!("MAX30102 ready at 0x{:02X}", addr);
        Ok(ppg)
    }

    fn clear_fifo(&mut self) -> Result<(), i2c::Error> {
        self.write_byte(REG_FIFO_WR_PTR, 0)?;
        self.write_byte(REG_OVF_COUNTER, 0)?;
        self.write_byte(REG_FIFO_RD_PTR, 0)
    }

    /// Newest IR sample in the FIFO, or `None` if the FIFO is empty.
    fn read_newest_ir(&mut self) -> Result<Option<i32>, i2c::Error> {
        let wr = self.read_byte(REG_FIFO_WR_PTR)? % FIFO_DEPTH;
        let rd = self.read_byte(REG_FIFO_RD_PTR)? % FIFO_DEPTH;
        if wr == rd {
            return Ok(None);
        }

        // skip straight to the newest slot so one call is one burst read
        let newest = (wr + FIFO_DEPTH - 1) % FIFO_DEPTH;
        if newest != rd {
            self.write_byte(REG_FIFO_RD_PTR, newest)?;
        }
        let raw = self.read_bytes::<BYTES_PER_SAMPLE>(REG_FIFO_DATA)?;
        let ir = ((u32::from(raw[3]) << 16) | (u32::from(raw[4]) << 8) | u32::from(raw[5])) & 0x3_FFFF;
        Ok(Some(ir as i32))
    }

    fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), i2c::Error> {
        let mut i2c = self.bus.try_borrow_mut().map_err(|_| i2c::Error::Timeout)?;
        i2c.blocking_write(self.addr, &[reg, value])
    }

    fn read_byte(&mut self, reg: u8) -> Result<u8, i2c::Error> {
        Ok(self.read_bytes::<1>(reg)?[0])
    }

    fn read_bytes<const N: usize>(&mut self, reg: u8) -> Result<[u8; N], i2c::Error> {
        let mut buf = [0u8; N];
        let mut i2c = self.bus.try_borrow_mut().map_err(|_| i2c::Error::Timeout)?;
        i2c.blocking_write_read(self.addr, &[reg], &mut buf)?;
        Ok(buf)
    }
}

impl PulseSensor for Max30102 {
    fn read_ir(&mut self) -> i32 {
        match self.read_newest_ir() {
            Ok(Some(ir)) => self.last_ir = ir,
            Ok(None) => {}
            Err(e) => {
                self.error_count += 1;
                if self.error_count % 100 == 1 {
                    warn!("MAX30102 read error #{}: {:?}", self.error_count, e);
                }
            }
        }
        self.last_ir
    }
}

// Factory function for the PPG front-end; `None` means run simulated
pub fn create_default_ppg(bus: &'static SensorBus) -> Option<Max30102> {
    match Max30102::new(bus, MAX30102_ADDRESS) {
        Ok(ppg) => Some(ppg),
        Err(e) => {
            warn!("MAX30102 not found ({:?})", e);
            None
        }
    }
}

use embassy_stm32::i2c;

use crate::board::SensorBus;
use crate::source::TemperatureSensor;

pub const MAX30205_ADDRESS: u8 = 0x48;

const REG_TEMPERATURE: u8 = 0x00;
// 1/256 °C per LSB, two's complement
const CELSIUS_PER_LSB: f32 = 0.003_906_25;

/// MAX30205 clinical temperature sensor in continuous-conversion mode.
pub struct Max30205 {
    bus: &'static SensorBus,
    addr: u8,
}

impl Max30205 {
    pub fn new(bus: &'static SensorBus) -> Self {
        Self {
            bus,
            addr: MAX30205_ADDRESS,
        }
    }

    fn read_raw(&mut self) -> Result<i16, i2c::Error> {
        let mut buf = [0u8; 2];
        let mut i2c = self.bus.try_borrow_mut().map_err(|_| i2c::Error::Timeout)?;
        i2c.blocking_write_read(self.addr, &[REG_TEMPERATURE], &mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }
}

impl TemperatureSensor for Max30205 {
    /// NaN on any bus error; the session substitutes its fallback.
    fn read_celsius(&mut self) -> f32 {
        match self.read_raw() {
            Ok(raw) => f32::from(raw) * CELSIUS_PER_LSB,
            Err(e) => {
                debug!("MAX30205 read failed: {:?}", e);
                f32::NAN
            }
        }
    }
}

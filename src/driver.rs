//! BQ25703A register codec.
//! Each register access is a write of the address followed, for reads, by a
//! separate receive; both go through the shared bus.

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::bus::RegisterBus;
use crate::data_types::{ChargeCurrentLimit, ChargeStatus, Telemetry};
use crate::error::Error;
use crate::registers::{
    ADC_ENABLED_CHANNELS, ADC_IIN, ADC_ICHG, ADC_START_CONVERSION, ADC_VBAT, ADC_VBUS, ADC_VSYS,
    AdcChannel, AdcControl, CHARGE_OPTION_0_VALUE, ChargeVoltageSetting, DEVICE_ID, MANUFACTURER_ID, addr,
    charge_current_bytes, charge_voltage_setting,
};

/// Longest register read the codec performs.
pub const MAX_READ_LEN: usize = 4;

/// BQ25703A charger driver.
pub struct Bq25703a<B> {
    bus: B,
}

impl<B> Bq25703a<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Consume the driver and return the owned bus handle.
    pub fn free(self) -> B {
        self.bus
    }
}

impl<B: RegisterBus> Bq25703a<B> {
    /// Read `len` bytes starting at `reg`.
    pub fn read_register(&mut self, reg: u8, len: usize) -> Result<Vec<u8, MAX_READ_LEN>, Error<B::Error>> {
        let mut buf: Vec<u8, MAX_READ_LEN> = Vec::new();
        buf.resize_default(len).map_err(|_| Error::OutOfRange)?;
        self.bus.transfer(&[reg])?;
        self.bus.receive(&mut buf)?;
        Ok(buf)
    }

    fn read_byte(&mut self, reg: u8) -> Result<u8, Error<B::Error>> {
        let mut buf = [0u8; 1];
        self.bus.transfer(&[reg])?;
        self.bus.receive(&mut buf)?;
        Ok(buf[0])
    }

    /// Write a single register.
    pub fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<B::Error>> {
        self.bus.transfer(&[reg, value])
    }

    /// Write a two-byte register, LSB first.
    pub fn write_register16(&mut self, reg: u8, lsb: u8, msb: u8) -> Result<(), Error<B::Error>> {
        self.bus.transfer(&[reg, lsb, msb])
    }

    /// Read the identity registers and compare them with the BQ25703A ids.
    pub fn verify_identity(&mut self) -> Result<(), Error<B::Error>> {
        let manufacturer = self.read_byte(addr::MANUFACTURER_ID)?;
        let device = self.read_byte(addr::DEVICE_ID)?;
        debug!("manufacturer id 0x{:x}, device id 0x{:x}", manufacturer, device);
        if manufacturer == MANUFACTURER_ID && device == DEVICE_ID {
            Ok(())
        } else {
            Err(Error::WrongId { manufacturer, device })
        }
    }

    /// Read and decode the ChargerStatus register. Also returns the raw word.
    pub fn read_charge_status(&mut self) -> Result<(ChargeStatus, u16), Error<B::Error>> {
        let data = self.read_register(addr::CHARGE_STATUS, 2)?;
        let bytes = [data[0], data[1]];
        Ok((ChargeStatus::from_bytes(bytes), u16::from_le_bytes(bytes)))
    }

    /// Enable the ADC channels the control loop samples.
    pub fn set_adc_option(&mut self) -> Result<(), Error<B::Error>> {
        self.write_register(addr::ADC_OPTION, ADC_ENABLED_CHANNELS.bits())
    }

    /// Write the fixed start-up configuration: ChargeOption0 and the ADC channel enables.
    pub fn configure_fixed_options(&mut self) -> Result<(), Error<B::Error>> {
        let [lsb, msb] = CHARGE_OPTION_0_VALUE;
        self.write_register16(addr::CHARGE_OPTION_0, lsb, msb)?;
        self.set_adc_option()
    }

    /// Start a one-shot conversion and poll until the device clears the start bit.
    ///
    /// Sleeps `poll_interval_ms` before every poll and gives up after `poll_limit` polls.
    pub fn start_adc_conversion_and_wait<D: DelayNs>(
        &mut self,
        delay: &mut D,
        poll_interval_ms: u32,
        poll_limit: u16,
    ) -> Result<(), Error<B::Error>> {
        self.write_register(addr::ADC_OPTION_HI, ADC_START_CONVERSION.bits())?;
        for _ in 0..poll_limit {
            delay.delay_ms(poll_interval_ms);
            let control = AdcControl::from_bits_truncate(self.read_byte(addr::ADC_OPTION_HI)?);
            if !control.contains(AdcControl::START) {
                trace!("ADC conversion finished");
                return Ok(());
            }
        }
        warn!("ADC conversion still busy after {} polls", poll_limit);
        Err(Error::AdcTimeout)
    }

    fn read_channel(&mut self, channel: AdcChannel) -> Result<u32, Error<B::Error>> {
        Ok(channel.convert(self.read_byte(channel.addr)?))
    }

    /// Read all ADC result registers. Only returns a value once every channel was read.
    pub fn read_converted_telemetry(&mut self) -> Result<Telemetry, Error<B::Error>> {
        let battery_voltage_mv = self.read_channel(ADC_VBAT)?;
        let system_voltage_mv = self.read_channel(ADC_VSYS)?;
        let charge_current_ma = self.read_channel(ADC_ICHG)?;
        let input_current_ma = self.read_channel(ADC_IIN)?;
        let bus_voltage_mv = self.read_channel(ADC_VBUS)?;
        Ok(Telemetry {
            bus_voltage_mv,
            battery_voltage_mv,
            system_voltage_mv,
            charge_current_ma,
            input_current_ma,
        })
    }

    /// Program the charge current limit (mA), clamped to the hardware ceiling.
    pub fn set_max_charge_current(&mut self, limit_ma: u32) -> Result<ChargeCurrentLimit, Error<B::Error>> {
        let limit = ChargeCurrentLimit::new(limit_ma);
        let [lsb, msb] = charge_current_bytes(limit.setting);
        debug!("charge current limit {} mA, setting {}", limit.limit_ma, limit.setting);
        self.write_register16(addr::CHARGE_CURRENT, lsb, msb)?;
        Ok(limit)
    }

    /// Program minimum system and maximum charge voltage for a pack of `cells`.
    /// Unsupported cell counts disable charging.
    pub fn set_charge_voltage(&mut self, cells: u8) -> Result<ChargeVoltageSetting, Error<B::Error>> {
        let setting = charge_voltage_setting(cells);
        debug!(
            "charge voltage for {} cells: max {} mV",
            cells,
            crate::registers::max_charge_voltage_mv(setting.max_charge)
        );
        self.write_register(addr::MIN_SYSTEM_VOLTAGE, setting.min_system.bits())?;
        let [lsb, msb] = setting.max_charge.bits().to_le_bytes();
        self.write_register16(addr::MAX_CHARGE_VOLTAGE, lsb, msb)?;
        Ok(setting)
    }
}

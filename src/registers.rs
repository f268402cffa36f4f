//! Register map and constants for the BQ25703A.
//! Addresses, bit positions and ADC scale factors follow the datasheet.

/// 7-bit I2C address of the BQ25703A.
pub const DEFAULT_I2C_ADDRESS: u8 = 0x6B;

/// Expected contents of the identity registers.
pub const MANUFACTURER_ID: u8 = 0x40;
pub const DEVICE_ID: u8 = 0x78;

/// Register addresses (7-bit). Two-byte registers are addressed by their LSB.
pub mod addr {
    /// ChargeOption0 (0x01/0x00).
    pub const CHARGE_OPTION_0: u8 = 0x00;
    /// ChargeCurrent (0x03/0x02), 64 mA LSB in bits 12:6.
    pub const CHARGE_CURRENT: u8 = 0x02;
    /// MaxChargeVoltage (0x05/0x04), 16 mV LSB in bits 14:4.
    pub const MAX_CHARGE_VOLTAGE: u8 = 0x04;
    /// MinSystemVoltage MSB (0x0D), 256 mV LSB in bits 5:0.
    pub const MIN_SYSTEM_VOLTAGE: u8 = 0x0D;
    /// ChargerStatus (0x21/0x20). LSB holds fault latches, MSB the status bits.
    pub const CHARGE_STATUS: u8 = 0x20;
    /// ADC result registers, one byte each.
    pub const ADC_VBUS: u8 = 0x27;
    pub const ADC_ICHG: u8 = 0x29;
    pub const ADC_IIN: u8 = 0x2B;
    pub const ADC_VBAT: u8 = 0x2C;
    pub const ADC_VSYS: u8 = 0x2D;
    /// Identity registers.
    pub const MANUFACTURER_ID: u8 = 0x2E;
    pub const DEVICE_ID: u8 = 0x2F;
    /// ADCOption LSB (channel enables) and MSB (conversion control).
    pub const ADC_OPTION: u8 = 0x3A;
    pub const ADC_OPTION_HI: u8 = 0x3B;
}

/// Fixed ChargeOption0 contents written at start-up, `[lsb, msb]`.
pub const CHARGE_OPTION_0_VALUE: [u8; 2] = [0b0000_1110, 0b0010_0110];

/// Charge current DAC characteristics.
pub const CHARGE_CURRENT_STEP_MA: u32 = 64;
pub const MAX_CHARGE_CURRENT_SETTING: u8 = 128;
/// Board hardware ceiling for the programmed charge current.
pub const MAX_CHARGE_CURRENT_MA: u32 = 6_000;

/// Fixed per-channel ADC calibration: `value = raw * scale + offset`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AdcChannel {
    pub addr: u8,
    pub scale: u32,
    pub offset: u32,
}

impl AdcChannel {
    /// Convert a raw ADC byte into millivolts or milliamps.
    pub const fn convert(&self, raw: u8) -> u32 {
        raw as u32 * self.scale + self.offset
    }
}

pub const ADC_VBAT: AdcChannel = AdcChannel { addr: addr::ADC_VBAT, scale: 64, offset: 2_880 };
pub const ADC_VSYS: AdcChannel = AdcChannel { addr: addr::ADC_VSYS, scale: 64, offset: 2_880 };
pub const ADC_ICHG: AdcChannel = AdcChannel { addr: addr::ADC_ICHG, scale: 64, offset: 0 };
pub const ADC_IIN: AdcChannel = AdcChannel { addr: addr::ADC_IIN, scale: 50, offset: 0 };
pub const ADC_VBUS: AdcChannel = AdcChannel { addr: addr::ADC_VBUS, scale: 64, offset: 3_200 };

bitflags::bitflags! {
    /// ADCOption LSB (0x3A): per-channel enables.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct AdcChannels: u8 {
        const CMPIN = 1 << 7;
        const VBUS  = 1 << 6;
        const PSYS  = 1 << 5;
        const IIN   = 1 << 4;
        const IDCHG = 1 << 3;
        const ICHG  = 1 << 2;
        const VSYS  = 1 << 1;
        const VBAT  = 1 << 0;
    }

    /// ADCOption MSB (0x3B): conversion control.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct AdcControl: u8 {
        /// Continuous conversion (0 = one-shot).
        const CONV      = 1 << 7;
        /// Start a conversion; reads back 1 until the conversion completes.
        const START     = 1 << 6;
        /// 3.06 V full-scale input range.
        const FULLSCALE = 1 << 5;
    }

    /// ChargerStatus MSB (0x21).
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct StatusBits: u8 {
        const AC_STAT   = 1 << 7;
        const ICO_DONE  = 1 << 6;
        // Bit 5 reserved.
        const IN_VINDPM = 1 << 4;
        const IN_IINDPM = 1 << 3;
        const IN_FCHRG  = 1 << 2;
        const IN_PCHRG  = 1 << 1;
        const IN_OTG    = 1 << 0;
    }

    /// ChargerStatus LSB (0x20): latched faults.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct FaultBits: u8 {
        const ACOV     = 1 << 7;
        const BATOC    = 1 << 6;
        const ACOC     = 1 << 5;
        const SYSOVP   = 1 << 4;
        // Bit 3 reserved.
        const LATCHOFF = 1 << 2;
        const OTG_OVP  = 1 << 1;
        const OTG_UVP  = 1 << 0;
    }

    /// MaxChargeVoltage (0x05/0x04) as a 16-bit word; each flag adds its weight.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct MaxChargeVoltage: u16 {
        const MV16    = 1 << 4;
        const MV32    = 1 << 5;
        const MV64    = 1 << 6;
        const MV128   = 1 << 7;
        const MV256   = 1 << 8;
        const MV512   = 1 << 9;
        const MV1024  = 1 << 10;
        const MV2048  = 1 << 11;
        const MV4096  = 1 << 12;
        const MV8192  = 1 << 13;
        const MV16384 = 1 << 14;
    }

    /// MinSystemVoltage MSB (0x0D); each flag adds its weight.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct MinSystemVoltage: u8 {
        const MV256  = 1 << 0;
        const MV512  = 1 << 1;
        const MV1024 = 1 << 2;
        const MV2048 = 1 << 3;
        const MV4096 = 1 << 4;
        const MV8192 = 1 << 5;
    }
}

/// Channels enabled at start-up.
pub const ADC_ENABLED_CHANNELS: AdcChannels = AdcChannels::VBUS
    .union(AdcChannels::IIN)
    .union(AdcChannels::ICHG)
    .union(AdcChannels::VSYS)
    .union(AdcChannels::VBAT);

/// One-shot, full-scale conversion request.
pub const ADC_START_CONVERSION: AdcControl = AdcControl::START.union(AdcControl::FULLSCALE);

/// Minimum system voltage programmed when the cell count is unsupported.
pub const MIN_SYSTEM_VOLTAGE_FLOOR: MinSystemVoltage = MinSystemVoltage::MV1024;

/// Voltage limits for one supported pack size.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChargeVoltageSetting {
    pub max_charge: MaxChargeVoltage,
    pub min_system: MinSystemVoltage,
}

/// Look up the charge voltage limits for a pack of `cells` in series.
///
/// Maximum charge voltage is 4.2 V per cell within the 16 mV resolution, minimum
/// system voltage roughly 2.8 V per cell. Unsupported counts (including 0) yield
/// an all-zero maximum, which disables charging, and the fixed floor minimum.
pub fn charge_voltage_setting(cells: u8) -> ChargeVoltageSetting {
    use MaxChargeVoltage as Max;
    use MinSystemVoltage as Min;

    match cells {
        // 4.192 V / 2.816 V
        1 => ChargeVoltageSetting {
            max_charge: Max::MV4096 | Max::MV64 | Max::MV32,
            min_system: Min::MV2048 | Min::MV512 | Min::MV256,
        },
        // 8.400 V / 5.632 V
        2 => ChargeVoltageSetting {
            max_charge: Max::MV8192 | Max::MV128 | Max::MV64 | Max::MV16,
            min_system: Min::MV4096 | Min::MV1024 | Min::MV512,
        },
        // 12.592 V / 8.448 V
        3 => ChargeVoltageSetting {
            max_charge: Max::MV8192 | Max::MV4096 | Max::MV256 | Max::MV32 | Max::MV16,
            min_system: Min::MV8192 | Min::MV256,
        },
        // 16.800 V / 11.264 V
        4 => ChargeVoltageSetting {
            max_charge: Max::MV16384 | Max::MV256 | Max::MV128 | Max::MV32,
            min_system: Min::MV8192 | Min::MV2048 | Min::MV1024,
        },
        _ => ChargeVoltageSetting {
            max_charge: Max::empty(),
            min_system: MIN_SYSTEM_VOLTAGE_FLOOR,
        },
    }
}

/// Decode a MaxChargeVoltage word into millivolts.
pub fn max_charge_voltage_mv(bits: MaxChargeVoltage) -> u32 {
    // Flag weights equal their bit values.
    u32::from(bits.bits())
}

/// Decode a MinSystemVoltage byte into millivolts.
pub fn min_system_voltage_mv(bits: MinSystemVoltage) -> u32 {
    u32::from(bits.bits()) * 256
}

/// Convert a charge current limit (mA) to the 64 mA step setting.
/// Clamps to the hardware ceiling, then to the 0-128 step range.
pub fn charge_current_setting(limit_ma: u32) -> u8 {
    let ma = limit_ma.min(MAX_CHARGE_CURRENT_MA);
    (ma / CHARGE_CURRENT_STEP_MA).min(u32::from(MAX_CHARGE_CURRENT_SETTING)) as u8
}

/// Convert a step setting back to milliamps.
pub fn setting_to_ma(setting: u8) -> u32 {
    u32::from(setting) * CHARGE_CURRENT_STEP_MA
}

/// Split a step setting into ChargeCurrent register bytes `[lsb, msb]`:
/// the low 2 bits land in LSB bits 7:6, the rest in the MSB.
pub fn charge_current_bytes(setting: u8) -> [u8; 2] {
    [(setting & 0b11) << 6, setting >> 2]
}

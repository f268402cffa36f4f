//! Data types shared by the driver, the control loop and diagnostics.

use crate::registers::{
    FaultBits, MAX_CHARGE_CURRENT_MA, StatusBits, charge_current_setting, setting_to_ma,
};

/// Result of the identity query.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Connection {
    Connected,
    #[default]
    NotConnected,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        matches!(self, Connection::Connected)
    }
}

/// Converted ADC readings. Always replaced as a whole after a completed
/// conversion cycle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Telemetry {
    pub bus_voltage_mv: u32,
    pub battery_voltage_mv: u32,
    pub system_voltage_mv: u32,
    pub charge_current_ma: u32,
    pub input_current_ma: u32,
}

/// Decoded ChargerStatus word.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChargeStatus {
    /// Input source present.
    pub ac_stat: bool,
    /// Input current optimisation finished.
    pub ico_done: bool,
    pub in_vindpm: bool,
    pub in_iindpm: bool,
    /// Fast charging.
    pub in_fchrg: bool,
    /// Pre-charging.
    pub in_pchrg: bool,
    pub in_otg: bool,
    pub fault_acov: bool,
    pub fault_batoc: bool,
    pub fault_acoc: bool,
    pub sys_ovp: bool,
    pub fault_latchoff: bool,
    pub otg_ovp: bool,
    pub otg_uvp: bool,
}

impl ChargeStatus {
    /// Decode from the register bytes as read, `[lsb, msb]`.
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        let faults = FaultBits::from_bits_truncate(bytes[0]);
        let status = StatusBits::from_bits_truncate(bytes[1]);
        Self {
            ac_stat: status.contains(StatusBits::AC_STAT),
            ico_done: status.contains(StatusBits::ICO_DONE),
            in_vindpm: status.contains(StatusBits::IN_VINDPM),
            in_iindpm: status.contains(StatusBits::IN_IINDPM),
            in_fchrg: status.contains(StatusBits::IN_FCHRG),
            in_pchrg: status.contains(StatusBits::IN_PCHRG),
            in_otg: status.contains(StatusBits::IN_OTG),
            fault_acov: faults.contains(FaultBits::ACOV),
            fault_batoc: faults.contains(FaultBits::BATOC),
            fault_acoc: faults.contains(FaultBits::ACOC),
            sys_ovp: faults.contains(FaultBits::SYSOVP),
            fault_latchoff: faults.contains(FaultBits::LATCHOFF),
            otg_ovp: faults.contains(FaultBits::OTG_OVP),
            otg_uvp: faults.contains(FaultBits::OTG_UVP),
        }
    }

    /// Whether the charger reports it is currently charging.
    pub fn charging_enabled(&self) -> bool {
        self.in_fchrg
    }

    /// Whether any fault latch is set.
    pub fn has_any_fault(&self) -> bool {
        self.fault_acov
            || self.fault_batoc
            || self.fault_acoc
            || self.sys_ovp
            || self.fault_latchoff
            || self.otg_ovp
            || self.otg_uvp
    }
}

/// Regulator state owned by the charge controller.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RegulatorState {
    pub connected: bool,
    pub charging_enabled: bool,
    /// Raw 64 mA step value last programmed, 0-128.
    pub current_setting: u8,
    /// Last completed ADC cycle.
    pub telemetry: Telemetry,
    /// Charge current cap after clamping to the hardware ceiling.
    pub max_charge_current_ma: u32,
    /// Raw ChargerStatus word, `msb << 8 | lsb`.
    pub status_word: u16,
}

/// State of the power and balance connections, as seen by output control.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectionState {
    Ok,
    /// Battery voltage rose above the disconnect threshold while charging.
    NoLoadDetected,
    /// Charging from a fixed low-power supply without negotiation.
    NoSourcePower,
    #[default]
    Fault,
}

impl From<ConnectionState> for u8 {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Ok => 11,
            ConnectionState::NoLoadDetected => 12,
            ConnectionState::NoSourcePower => 13,
            ConnectionState::Fault => 14,
        }
    }
}

/// Phase of the periodic charge cycle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ChargeState {
    Charge,
    #[default]
    Recover,
    Measure,
}

impl From<ChargeState> for u8 {
    fn from(state: ChargeState) -> Self {
        match state {
            ChargeState::Charge => 21,
            ChargeState::Recover => 22,
            ChargeState::Measure => 23,
        }
    }
}

/// Input power classification reported by the source-negotiation module.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputPower {
    /// A negotiated supply is ready.
    Ready,
    /// A fixed 5 V / low-current supply without negotiation.
    NoStandardSupply,
    NotReady,
}

/// A charge current limit after clamping, with its 64 mA step setting.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChargeCurrentLimit {
    /// Requested limit clamped to the hardware ceiling, mA.
    pub limit_ma: u32,
    /// Step value written to the ChargeCurrent register.
    pub setting: u8,
}

impl ChargeCurrentLimit {
    pub fn new(requested_ma: u32) -> Self {
        let limit_ma = requested_ma.min(MAX_CHARGE_CURRENT_MA);
        Self {
            limit_ma,
            setting: charge_current_setting(limit_ma),
        }
    }

    /// Current the regulator is actually programmed for, mA.
    pub fn programmed_ma(&self) -> u32 {
        setting_to_ma(self.setting)
    }
}

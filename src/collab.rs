//! Interfaces of the neighbouring firmware modules the charge controller
//! depends on.

use crate::data_types::InputPower;

/// Cell measurement, balancing and connection sensing.
pub trait BatteryMonitor {
    /// Number of series cells detected on the balance lead, 0 if none.
    fn number_of_cells(&self) -> u8;
    /// Voltage of cell `index` (0 = bottom of the stack) in mV.
    fn cell_voltage_mv(&self, index: u8) -> u32;
    /// Pack voltage measured on the balance lead in mV.
    fn battery_voltage_mv(&self) -> u32;
    /// Any cell above its safe limit.
    fn cell_over_voltage(&self) -> bool;
    /// Main power lead to the pack is connected.
    fn load_connected(&self) -> bool;
    /// Balance lead is connected.
    fn balance_connected(&self) -> bool;
    /// Controller temperature in °C, used for charge power derating.
    fn temperature_c(&self) -> f32;

    /// Run one balancing pass.
    fn balance(&mut self);
    /// Switch off all balancing resistors.
    fn balance_off(&mut self);
    /// Currently active balancing resistors, bit N for cell N.
    fn balancing_state(&self) -> u8;
}

/// Input source negotiation.
pub trait PowerSource {
    /// Input voltage in mV.
    fn input_voltage_mv(&self) -> u32;
    fn input_power_ready(&self) -> InputPower;
    /// Maximum input current granted by the source, mA.
    fn max_input_current_ma(&self) -> u32;
    /// Maximum input power granted by the source, mW.
    fn max_input_power_mw(&self) -> u32;
}

//! Charge power budgeting and the power-to-current conversion.

/// Tunables for power budgeting.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PowerBudget {
    /// Derating for conversion losses, applied to everything drawn from the source.
    pub efficiency: f32,
    /// Absolute charge power ceiling of the hardware, mW.
    pub max_charging_power_mw: u32,
    /// Budget for supplies without negotiation (5 V / 500 mA), mW.
    pub fixed_supply_power_mw: u32,
    /// Temperature above which charge power is derated, °C.
    pub throttle_threshold_c: f32,
    /// Below this pack voltage the power/voltage division is not trusted and
    /// the target current is zero, mV.
    pub min_battery_voltage_mv: u32,
}

impl Default for PowerBudget {
    fn default() -> Self {
        Self {
            efficiency: 0.85,
            max_charging_power_mw: 60_000,
            fixed_supply_power_mw: 2_500,
            throttle_threshold_c: 40.0,
            min_battery_voltage_mv: 2_500,
        }
    }
}

// Derating ramp: 1.0 at 40 °C falling to 0.0 at ~70 °C.
const THROTTLE_SLOPE: f32 = 0.0333;
const THROTTLE_INTERCEPT: f32 = 1.33;

impl PowerBudget {
    /// Derating factor for `temperature_c`, in `[0.0, 1.0]`.
    ///
    /// An unreadable (NaN) temperature derates to zero.
    pub fn power_scalar(&self, temperature_c: f32) -> f32 {
        if temperature_c <= self.throttle_threshold_c {
            return 1.0;
        }
        let scalar = 1.0 - (THROTTLE_SLOPE * temperature_c - THROTTLE_INTERCEPT);
        if scalar.is_nan() { 0.0 } else { scalar.clamp(0.0, 1.0) }
    }

    /// Maximum charge power in mW for the present input and temperature.
    ///
    /// The result is always within `[0, max_charging_power_mw]`.
    pub fn max_charge_power_mw(
        &self,
        bus_voltage_mv: u32,
        max_input_current_ma: u32,
        max_input_power_mw: u32,
        temperature_c: f32,
    ) -> u32 {
        let bus_voltage_v = bus_voltage_mv as f32 / 1000.0;
        let mut power_mw = bus_voltage_v * max_input_current_ma as f32 * self.efficiency;

        power_mw = power_mw.min(self.max_charging_power_mw as f32);
        power_mw = power_mw.min(max_input_power_mw as f32 * self.efficiency);
        power_mw *= self.power_scalar(temperature_c);

        // Saturating cast: negative and NaN become 0.
        (power_mw as u32).min(self.max_charging_power_mw)
    }

    /// Charge current in mA that delivers `power_mw` into a pack at `battery_voltage_mv`.
    pub fn charge_current_ma(&self, power_mw: u32, battery_voltage_mv: u32) -> u32 {
        if battery_voltage_mv < self.min_battery_voltage_mv.max(1) {
            return 0;
        }
        let battery_voltage_v = battery_voltage_mv as f32 / 1000.0;
        (power_mw as f32 / battery_voltage_v) as u32
    }

    /// Charge current in mA for a supply without negotiation.
    pub fn fixed_supply_current_ma(&self, battery_voltage_mv: u32) -> u32 {
        let power_mw = (self.fixed_supply_power_mw as f32 * self.efficiency) as u32;
        self.charge_current_ma(power_mw, battery_voltage_mv)
    }
}

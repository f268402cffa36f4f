//! Digital lines between the MCU and the charger.

use embedded_hal::digital::{InputPin, OutputPin};

/// Control pins: ILIM_HIZ (active low), EN_OTG (active high) and CHRG_OK.
pub struct ControlPins<HIZ, OTG, OK> {
    hiz: HIZ,
    otg: OTG,
    charge_ok: OK,
}

impl<HIZ, OTG, OK> ControlPins<HIZ, OTG, OK>
where
    HIZ: OutputPin,
    OTG: OutputPin,
    OK: InputPin,
{
    pub fn new(hiz: HIZ, otg: OTG, charge_ok: OK) -> Self {
        Self { hiz, otg, charge_ok }
    }

    /// Disconnect (`true`) or reconnect the charger power path.
    pub fn set_output_high_impedance(&mut self, enabled: bool) {
        let result = if enabled { self.hiz.set_low() } else { self.hiz.set_high() };
        if result.is_err() {
            warn!("failed to drive ILIM_HIZ");
        }
    }

    /// Enable or disable on-the-go (reverse) mode.
    pub fn set_boost_mode(&mut self, enabled: bool) {
        let result = if enabled { self.otg.set_high() } else { self.otg.set_low() };
        if result.is_err() {
            warn!("failed to drive EN_OTG");
        }
    }

    /// Whether the input voltage is inside the accepted window.
    /// A pin read failure counts as not ok.
    pub fn charge_ok(&mut self) -> bool {
        self.charge_ok.is_high().unwrap_or(false)
    }

    pub fn free(self) -> (HIZ, OTG, OK) {
        (self.hiz, self.otg, self.charge_ok)
    }
}

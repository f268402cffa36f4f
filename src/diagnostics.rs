//! Per-period status line.
//!
//! Field order:
//! `state,timer,faults (binary),Vin,Vbat,Vsys,Ichg,Iin,charging,connection,cellsS,limit,setting*64,C4,C3,C2,C1,Bbalance,`

use core::fmt;

use crate::data_types::{ChargeState, ConnectionState};
use crate::faults::FaultFlags;

/// Snapshot of everything reported once per control period.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiagnosticsLine {
    pub charge_state: ChargeState,
    pub timer: u16,
    pub faults: FaultFlags,
    pub input_voltage_mv: u32,
    pub battery_voltage_mv: u32,
    pub system_voltage_mv: u32,
    pub charge_current_ma: u32,
    pub input_current_ma: u32,
    pub charging_enabled: bool,
    pub connection_state: ConnectionState,
    pub cells: u8,
    pub max_charge_current_ma: u32,
    pub current_setting: u8,
    /// Cell voltages, index 0 is the bottom cell.
    pub cell_voltages_mv: [u32; 4],
    pub balancing: u8,
}

fn volts(mv: u32) -> f32 {
    mv as f32 / 1000.0
}

impl fmt::Display for DiagnosticsLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faults = self.faults.bits();
        write!(f, "{},{},{} ({:06b}),", u8::from(self.charge_state), self.timer, faults, faults)?;
        write!(
            f,
            "{},{:.2},{:.2},{},{},",
            self.input_voltage_mv / 1000,
            volts(self.battery_voltage_mv),
            volts(self.system_voltage_mv),
            self.charge_current_ma,
            self.input_current_ma
        )?;
        write!(
            f,
            "{},{},{}S,{},{},",
            u8::from(self.charging_enabled),
            u8::from(self.connection_state),
            self.cells,
            self.max_charge_current_ma,
            u32::from(self.current_setting) * 64
        )?;
        for mv in self.cell_voltages_mv.iter().rev() {
            write!(f, "{:.3},", volts(*mv))?;
        }
        write!(f, "B{:04b},", self.balancing)
    }
}

//! The regulator task: start-up, the periodic charge/recover/measure cycle
//! and output control.

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::bus::RegisterBus;
use crate::clock::{Clock, Periodic};
use crate::collab::{BatteryMonitor, PowerSource};
use crate::data_types::{ChargeState, Connection, ConnectionState, InputPower, RegulatorState};
use crate::diagnostics::DiagnosticsLine;
use crate::driver::Bq25703a;
use crate::error::Error;
use crate::faults::{FaultFlags, FaultState};
use crate::pins::ControlPins;
use crate::power::PowerBudget;

/// Tunables of the control loop.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChargerConfig {
    /// Control period.
    pub period_ms: u32,
    /// Periods spent charging before a recover phase; the state is left once exceeded.
    pub charge_periods: u16,
    /// Periods spent in recover before measuring; the state is left once exceeded.
    pub recover_periods: u16,
    pub adc_poll_interval_ms: u32,
    /// Polls before a stuck ADC conversion is reported.
    pub adc_poll_limit: u16,
    /// Length of the high-impedance pulse after a suspected disconnect.
    pub hiz_pulse_ms: u32,
    /// Per-cell battery voltage above which the pack is considered disconnected, mV.
    pub disconnect_threshold_mv: u32,
    pub power: PowerBudget,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            period_ms: 500,
            charge_periods: 20,
            recover_periods: 4,
            adc_poll_interval_ms: 80,
            adc_poll_limit: 25,
            hiz_pulse_ms: 1_000,
            disconnect_threshold_mv: 4_250,
            power: PowerBudget::default(),
        }
    }
}

/// Charge controller owning the regulator, its control pins and the loop state.
pub struct ChargeController<B, HIZ, OTG, OK, D> {
    regulator: Bq25703a<B>,
    pins: ControlPins<HIZ, OTG, OK>,
    delay: D,
    config: ChargerConfig,
    state: RegulatorState,
    charge_state: ChargeState,
    timer: u16,
    connection_state: ConnectionState,
}

/// Log a failed regulator access and raise the communication fault if it is one.
/// Returns the value on success.
fn check<T, E, F>(faults: &mut F, result: Result<T, Error<E>>) -> Option<T>
where
    F: FaultState + ?Sized,
{
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            if e.is_communication_fault() {
                warn!("regulator communication fault");
                faults.set_fault(FaultFlags::REGULATOR_COMMUNICATION);
            } else {
                debug!("regulator access skipped");
            }
            None
        }
    }
}

impl<B, HIZ, OTG, OK, D> ChargeController<B, HIZ, OTG, OK, D>
where
    B: RegisterBus,
    HIZ: OutputPin,
    OTG: OutputPin,
    OK: InputPin,
    D: DelayNs,
{
    pub fn new(regulator: Bq25703a<B>, pins: ControlPins<HIZ, OTG, OK>, delay: D, config: ChargerConfig) -> Self {
        Self {
            regulator,
            pins,
            delay,
            config,
            state: RegulatorState::default(),
            charge_state: ChargeState::Recover,
            timer: 0,
            connection_state: ConnectionState::Fault,
        }
    }

    /// Task entry: put the output in a safe state, check the regulator and
    /// write the fixed configuration.
    pub fn start<F: FaultState>(&mut self, faults: &mut F) {
        info!("regulator task starting");
        self.pins.set_output_high_impedance(true);
        self.pins.set_boost_mode(false);

        self.state.connected = self.query_regulator_connection(faults).is_connected();
        check(faults, self.regulator.configure_fixed_options());

        self.charge_state = ChargeState::Recover;
        self.timer = 0;
    }

    /// Query the identity registers and update the communication fault.
    pub fn query_regulator_connection<F: FaultState>(&mut self, faults: &mut F) -> Connection {
        match self.regulator.verify_identity() {
            Ok(()) => {
                info!("BQ25703A connected");
                faults.clear_fault(FaultFlags::REGULATOR_COMMUNICATION);
                Connection::Connected
            }
            Err(_) => {
                warn!("BQ25703A not found");
                faults.set_fault(FaultFlags::REGULATOR_COMMUNICATION);
                Connection::NotConnected
            }
        }
    }

    /// Run one control period and return its diagnostics.
    pub fn step<BM, PS, F>(&mut self, battery: &mut BM, source: &PS, faults: &mut F) -> DiagnosticsLine
    where
        BM: BatteryMonitor,
        PS: PowerSource,
        F: FaultState,
    {
        if !self.pins.charge_ok() {
            faults.set_fault(FaultFlags::VOLTAGE_INPUT);
        } else if faults.has_fault(FaultFlags::VOLTAGE_INPUT) {
            faults.clear_fault(FaultFlags::VOLTAGE_INPUT);
        }

        if faults.has_fault(FaultFlags::REGULATOR_COMMUNICATION) {
            warn!("regulator communication fault, treated as disconnected");
            self.state.connected = false;
        }

        self.refresh_status(faults);
        self.refresh_telemetry(faults);

        let next = match self.charge_state {
            ChargeState::Charge => {
                self.control_charger_output(battery, source, faults);
                self.dwell_exceeded(self.config.charge_periods).then_some(ChargeState::Recover)
            }
            ChargeState::Recover => {
                battery.balance_off();
                self.pins.set_output_high_impedance(true);
                self.dwell_exceeded(self.config.recover_periods).then_some(ChargeState::Measure)
            }
            ChargeState::Measure => {
                battery.balance();
                Some(ChargeState::Charge)
            }
        };

        let line = self.diagnostics(battery, source, faults);

        match next {
            Some(state) if state != self.charge_state => {
                debug!("charge state {} -> {}", self.charge_state, state);
                self.charge_state = state;
                self.timer = 0;
            }
            _ => self.timer = self.timer.saturating_add(1),
        }

        line
    }

    /// Periods spent in the current state, counting this one, exceed `dwell`.
    fn dwell_exceeded(&self, dwell: u16) -> bool {
        u32::from(self.timer) + 1 > u32::from(dwell)
    }

    fn refresh_status<F: FaultState>(&mut self, faults: &mut F) {
        if let Some((status, word)) = check(faults, self.regulator.read_charge_status()) {
            self.state.charging_enabled = status.charging_enabled();
            self.state.status_word = word;
        }
    }

    fn refresh_telemetry<F: FaultState>(&mut self, faults: &mut F) {
        let converted = self.regulator.start_adc_conversion_and_wait(
            &mut self.delay,
            self.config.adc_poll_interval_ms,
            self.config.adc_poll_limit,
        );
        if check(faults, converted).is_none() {
            return;
        }
        if let Some(telemetry) = check(faults, self.regulator.read_converted_telemetry()) {
            self.state.telemetry = telemetry;
        }
    }

    fn set_charge_voltage<F: FaultState>(&mut self, cells: u8, faults: &mut F) {
        check(faults, self.regulator.set_charge_voltage(cells));
    }

    fn set_max_charge_current<F: FaultState>(&mut self, limit_ma: u32, faults: &mut F) {
        if let Some(limit) = check(faults, self.regulator.set_max_charge_current(limit_ma)) {
            self.state.max_charge_current_ma = limit.limit_ma;
            self.state.current_setting = limit.setting;
        }
    }

    fn set_connection_state(&mut self, state: ConnectionState) {
        if state != self.connection_state {
            debug!("connection state {}", state);
        }
        self.connection_state = state;
    }

    /// Decide whether the charger output should be on and program its limits.
    pub fn control_charger_output<BM, PS, F>(&mut self, battery: &mut BM, source: &PS, faults: &mut F)
    where
        BM: BatteryMonitor,
        PS: PowerSource,
        F: FaultState,
    {
        let cells = battery.number_of_cells();
        let ready = battery.load_connected()
            && battery.balance_connected()
            && faults.faults().is_empty()
            && !battery.cell_over_voltage();

        match (ready, source.input_power_ready()) {
            (true, InputPower::Ready) => {
                self.set_charge_voltage(cells, faults);

                let power_mw = self.config.power.max_charge_power_mw(
                    self.state.telemetry.bus_voltage_mv,
                    source.max_input_current_ma(),
                    source.max_input_power_mw(),
                    battery.temperature_c(),
                );
                let current_ma = self.config.power.charge_current_ma(power_mw, battery.battery_voltage_mv());
                self.set_max_charge_current(current_ma, faults);

                self.pins.set_output_high_impedance(false);
                self.set_connection_state(ConnectionState::Ok);

                let threshold_mv = self.config.disconnect_threshold_mv * u32::from(cells);
                if self.state.telemetry.battery_voltage_mv > threshold_mv {
                    info!("battery voltage above disconnect threshold");
                    self.pins.set_output_high_impedance(true);
                    self.delay.delay_ms(self.config.hiz_pulse_ms);
                    self.pins.set_output_high_impedance(false);
                    self.set_connection_state(ConnectionState::NoLoadDetected);
                }
            }
            (true, InputPower::NoStandardSupply) => {
                self.set_charge_voltage(cells, faults);

                let current_ma = self.config.power.fixed_supply_current_ma(battery.battery_voltage_mv());
                self.set_max_charge_current(current_ma, faults);

                self.pins.set_output_high_impedance(false);
                self.set_connection_state(ConnectionState::NoSourcePower);
            }
            _ => {
                self.pins.set_output_high_impedance(true);
                self.set_charge_voltage(0, faults);
                self.set_max_charge_current(0, faults);
                self.set_connection_state(ConnectionState::Fault);
            }
        }
    }

    fn diagnostics<BM, PS, F>(&self, battery: &BM, source: &PS, faults: &F) -> DiagnosticsLine
    where
        BM: BatteryMonitor,
        PS: PowerSource,
        F: FaultState,
    {
        let telemetry = &self.state.telemetry;
        DiagnosticsLine {
            charge_state: self.charge_state,
            timer: self.timer,
            faults: faults.faults(),
            input_voltage_mv: source.input_voltage_mv(),
            battery_voltage_mv: telemetry.battery_voltage_mv,
            system_voltage_mv: telemetry.system_voltage_mv,
            charge_current_ma: telemetry.charge_current_ma,
            input_current_ma: telemetry.input_current_ma,
            charging_enabled: self.state.charging_enabled,
            connection_state: self.connection_state,
            cells: battery.number_of_cells(),
            max_charge_current_ma: self.state.max_charge_current_ma,
            current_setting: self.state.current_setting,
            cell_voltages_mv: core::array::from_fn(|i| battery.cell_voltage_mv(i as u8)),
            balancing: battery.balancing_state(),
        }
    }

    /// Run the regulator task forever, one step per period boundary.
    /// Each period's diagnostics line is written to `out`; sink errors are ignored.
    pub fn run<BM, PS, F, C, W>(&mut self, battery: &mut BM, source: &PS, faults: &mut F, clock: &C, out: &mut W) -> !
    where
        BM: BatteryMonitor,
        PS: PowerSource,
        F: FaultState,
        C: Clock,
        W: Write,
    {
        self.start(faults);
        let mut period = Periodic::new(clock, self.config.period_ms);
        loop {
            let line = self.step(battery, source, faults);
            let _ = write!(out, "{}\r\n", line);
            period.wait(clock, &mut self.delay);
        }
    }

    pub fn state(&self) -> &RegulatorState {
        &self.state
    }

    pub fn connection(&self) -> Connection {
        if self.state.connected { Connection::Connected } else { Connection::NotConnected }
    }

    pub fn is_charging(&self) -> bool {
        self.state.charging_enabled
    }

    pub fn charge_state(&self) -> ChargeState {
        self.charge_state
    }

    /// Periods completed in the current charge state.
    pub fn timer(&self) -> u16 {
        self.timer
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn battery_voltage_mv(&self) -> u32 {
        self.state.telemetry.battery_voltage_mv
    }

    pub fn bus_voltage_mv(&self) -> u32 {
        self.state.telemetry.bus_voltage_mv
    }

    pub fn charge_current_ma(&self) -> u32 {
        self.state.telemetry.charge_current_ma
    }

    pub fn input_current_ma(&self) -> u32 {
        self.state.telemetry.input_current_ma
    }

    pub fn max_charge_current_ma(&self) -> u32 {
        self.state.max_charge_current_ma
    }

    /// Raw 64 mA step value last programmed.
    pub fn current_setting(&self) -> u8 {
        self.state.current_setting
    }

    /// Raw ChargerStatus word from the last successful read.
    pub fn status_word(&self) -> u16 {
        self.state.status_word
    }

    pub fn config(&self) -> &ChargerConfig {
        &self.config
    }

    /// Consume the controller and return its parts.
    pub fn free(self) -> (Bq25703a<B>, ControlPins<HIZ, OTG, OK>, D) {
        (self.regulator, self.pins, self.delay)
    }
}

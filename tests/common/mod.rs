#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use bq25703a_rs::bus::{RegisterBus, Transport};
use bq25703a_rs::clock::Clock;
use bq25703a_rs::collab::{BatteryMonitor, PowerSource};
use bq25703a_rs::data_types::InputPower;
use bq25703a_rs::error::Error;
use bq25703a_rs::registers::{AdcControl, addr};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal::i2c::ErrorKind;

/// Clock that advances by `step` ms on every read.
pub struct FakeClock {
    now: Cell<u64>,
    step: u64,
}

impl FakeClock {
    pub fn new(step: u64) -> Self {
        Self { now: Cell::new(0), step }
    }

    pub fn elapsed(&self) -> u64 {
        self.now.get()
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + self.step);
        t
    }
}

/// Delay that only records what was requested.
#[derive(Clone, Default)]
pub struct RecordingDelay(pub Rc<RefCell<Vec<u32>>>);

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().push(ms);
    }
}

/// Transport that never becomes idle.
pub struct StuckTransport;

impl Transport for StuckTransport {
    type Error = ErrorKind;

    fn write(&mut self, _address: u8, _bytes: &[u8]) -> nb::Result<(), Self::Error> {
        Err(nb::Error::WouldBlock)
    }

    fn read(&mut self, _address: u8, _buffer: &mut [u8]) -> nb::Result<(), Self::Error> {
        Err(nb::Error::WouldBlock)
    }
}

/// Register-level model of the charger.
pub struct Device {
    pub regs: [u8; 0x40],
    pointer: u8,
    /// Polls of ADCOption MSB that still report a running conversion.
    pub adc_busy_polls: u8,
    busy_left: u8,
    pub conversions: u32,
    /// Another bus user holds the lock: every access is skipped.
    pub locked_out: bool,
}

impl Device {
    pub fn new() -> Self {
        let mut regs = [0u8; 0x40];
        regs[addr::MANUFACTURER_ID as usize] = 0x40;
        regs[addr::DEVICE_ID as usize] = 0x78;
        Self {
            regs,
            pointer: 0,
            adc_busy_polls: 0,
            busy_left: 0,
            conversions: 0,
            locked_out: false,
        }
    }

    pub fn word(&self, reg: u8) -> u16 {
        u16::from_le_bytes([self.regs[reg as usize], self.regs[reg as usize + 1]])
    }

    /// Programmed maximum charge voltage, mV.
    pub fn max_charge_voltage_mv(&self) -> u32 {
        u32::from(self.word(addr::MAX_CHARGE_VOLTAGE))
    }

    /// Programmed charge current, mA.
    pub fn charge_current_ma(&self) -> u32 {
        u32::from(self.word(addr::CHARGE_CURRENT))
    }

    pub fn set_adc(&mut self, vbat: u8, vsys: u8, ichg: u8, iin: u8, vbus: u8) {
        self.regs[addr::ADC_VBAT as usize] = vbat;
        self.regs[addr::ADC_VSYS as usize] = vsys;
        self.regs[addr::ADC_ICHG as usize] = ichg;
        self.regs[addr::ADC_IIN as usize] = iin;
        self.regs[addr::ADC_VBUS as usize] = vbus;
    }
}

#[derive(Clone)]
pub struct FakeBus(pub Rc<RefCell<Device>>);

impl RegisterBus for FakeBus {
    type Error = Infallible;

    fn transfer(&mut self, bytes: &[u8]) -> Result<(), Error<Self::Error>> {
        let mut dev = self.0.borrow_mut();
        if dev.locked_out {
            return Err(Error::Busy);
        }
        dev.pointer = bytes[0];
        for (i, b) in bytes[1..].iter().enumerate() {
            let reg = dev.pointer as usize + i;
            dev.regs[reg] = *b;
        }
        if bytes[0] == addr::ADC_OPTION_HI && bytes.len() > 1 && bytes[1] & AdcControl::START.bits() != 0 {
            dev.busy_left = dev.adc_busy_polls;
            dev.conversions += 1;
        }
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error<Self::Error>> {
        let mut dev = self.0.borrow_mut();
        if dev.locked_out {
            return Err(Error::Busy);
        }
        if dev.pointer == addr::ADC_OPTION_HI {
            if dev.busy_left == 0 {
                dev.regs[addr::ADC_OPTION_HI as usize] &= !AdcControl::START.bits();
            } else {
                dev.busy_left -= 1;
            }
        }
        let start = dev.pointer as usize;
        buffer.copy_from_slice(&dev.regs[start..start + buffer.len()]);
        Ok(())
    }
}

/// Output pin recording every level written (`true` = high).
#[derive(Clone, Default)]
pub struct RecordingPin(pub Rc<RefCell<Vec<bool>>>);

impl RecordingPin {
    pub fn history(&self) -> Vec<bool> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn last(&self) -> Option<bool> {
        self.0.borrow().last().copied()
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(true);
        Ok(())
    }
}

#[derive(Clone)]
pub struct LevelPin(pub Rc<Cell<bool>>);

impl ErrorType for LevelPin {
    type Error = Infallible;
}

impl InputPin for LevelPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

pub struct FakeBattery {
    pub cells: u8,
    pub cell_mv: [u32; 4],
    pub battery_mv: u32,
    pub over_voltage: bool,
    pub load: bool,
    pub balance_lead: bool,
    pub temperature_c: f32,
    pub balance_calls: u32,
    pub balance_off_calls: u32,
    pub balancing: u8,
}

impl FakeBattery {
    /// A healthy, fully connected pack of `cells` at 3.7 V per cell.
    pub fn healthy(cells: u8) -> Self {
        Self {
            cells,
            cell_mv: [3_700; 4],
            battery_mv: 3_700 * u32::from(cells),
            over_voltage: false,
            load: true,
            balance_lead: true,
            temperature_c: 25.0,
            balance_calls: 0,
            balance_off_calls: 0,
            balancing: 0,
        }
    }
}

impl BatteryMonitor for FakeBattery {
    fn number_of_cells(&self) -> u8 {
        self.cells
    }

    fn cell_voltage_mv(&self, index: u8) -> u32 {
        self.cell_mv.get(index as usize).copied().unwrap_or(0)
    }

    fn battery_voltage_mv(&self) -> u32 {
        self.battery_mv
    }

    fn cell_over_voltage(&self) -> bool {
        self.over_voltage
    }

    fn load_connected(&self) -> bool {
        self.load
    }

    fn balance_connected(&self) -> bool {
        self.balance_lead
    }

    fn temperature_c(&self) -> f32 {
        self.temperature_c
    }

    fn balance(&mut self) {
        self.balance_calls += 1;
    }

    fn balance_off(&mut self) {
        self.balance_off_calls += 1;
        self.balancing = 0;
    }

    fn balancing_state(&self) -> u8 {
        self.balancing
    }
}

pub struct FakeSource {
    pub input_mv: u32,
    pub ready: InputPower,
    pub max_current_ma: u32,
    pub max_power_mw: u32,
}

impl FakeSource {
    pub fn negotiated() -> Self {
        Self {
            input_mv: 20_000,
            ready: InputPower::Ready,
            max_current_ma: 3_000,
            max_power_mw: 60_000,
        }
    }
}

impl PowerSource for FakeSource {
    fn input_voltage_mv(&self) -> u32 {
        self.input_mv
    }

    fn input_power_ready(&self) -> InputPower {
        self.ready
    }

    fn max_input_current_ma(&self) -> u32 {
        self.max_current_ma
    }

    fn max_input_power_mw(&self) -> u32 {
        self.max_power_mw
    }
}

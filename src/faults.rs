//! System fault bits and the capability interface used to report them.

bitflags::bitflags! {
    /// System-wide fault bitmask. This core raises and clears only
    /// `VOLTAGE_INPUT` and `REGULATOR_COMMUNICATION`; the other bits belong to
    /// neighbouring modules but still block charging.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct FaultFlags: u8 {
        /// Charge-ok input deasserted: input voltage outside the accepted window.
        const VOLTAGE_INPUT           = 1 << 0;
        /// Regulator identity mismatch, bus timeout or stuck ADC.
        const REGULATOR_COMMUNICATION = 1 << 1;
        const CELL_VOLTAGE            = 1 << 2;
        const OVER_TEMPERATURE        = 1 << 3;
        const POWER_DELIVERY          = 1 << 4;
        const BALANCE_CONNECTION      = 1 << 5;
    }
}

/// Shared fault-state sink.
pub trait FaultState {
    fn set_fault(&mut self, fault: FaultFlags);
    fn clear_fault(&mut self, fault: FaultFlags);
    fn faults(&self) -> FaultFlags;

    fn has_fault(&self, fault: FaultFlags) -> bool {
        self.faults().intersects(fault)
    }
}

impl<F: FaultState + ?Sized> FaultState for &mut F {
    fn set_fault(&mut self, fault: FaultFlags) {
        (**self).set_fault(fault)
    }

    fn clear_fault(&mut self, fault: FaultFlags) {
        (**self).clear_fault(fault)
    }

    fn faults(&self) -> FaultFlags {
        (**self).faults()
    }
}

/// Plain in-memory fault store.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FaultRegister {
    flags: FaultFlags,
}

impl FaultRegister {
    pub const fn new() -> Self {
        Self {
            flags: FaultFlags::empty(),
        }
    }
}

impl FaultState for FaultRegister {
    fn set_fault(&mut self, fault: FaultFlags) {
        if !self.flags.contains(fault) {
            debug!("fault raised: {=u8:b}", fault.bits());
        }
        self.flags.insert(fault);
    }

    fn clear_fault(&mut self, fault: FaultFlags) {
        if self.flags.intersects(fault) {
            debug!("fault cleared: {=u8:b}", fault.bits());
        }
        self.flags.remove(fault);
    }

    fn faults(&self) -> FaultFlags {
        self.flags
    }
}

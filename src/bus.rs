//! Shared two-wire bus access: bounded-wait locking, idle polling with a
//! deadline, and transparent retry on arbitration loss.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::clock::{Clock, RetryError, retry_with_deadline};
use crate::error::Error;
use crate::registers::DEFAULT_I2C_ADDRESS;

/// Non-blocking bus transport.
///
/// `WouldBlock` means the peripheral is not idle yet and the same call should
/// be repeated; `Other` ends the attempt.
pub trait Transport {
    type Error: embedded_hal::i2c::Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> nb::Result<(), Self::Error>;
    fn read(&mut self, address: u8, buffer: &mut [u8]) -> nb::Result<(), Self::Error>;
}

/// Adapter for any blocking `embedded-hal` I2C bus. Never reports `WouldBlock`.
pub struct BlockingI2c<I2C>(pub I2C);

impl<I2C: I2c> Transport for BlockingI2c<I2C> {
    type Error = I2C::Error;

    fn write(&mut self, address: u8, bytes: &[u8]) -> nb::Result<(), Self::Error> {
        self.0.write(address, bytes).map_err(nb::Error::Other)
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> nb::Result<(), Self::Error> {
        self.0.read(address, buffer).map_err(nb::Error::Other)
    }
}

/// Mutual exclusion shared with every other user of the bus.
pub trait BusLock {
    /// Take the lock if it is free. Must not block.
    fn try_acquire(&self) -> bool;
    fn release(&self);
}

impl<L: BusLock + ?Sized> BusLock for &L {
    fn try_acquire(&self) -> bool {
        (**self).try_acquire()
    }

    fn release(&self) {
        (**self).release()
    }
}

/// Lock for a bus with a single owner.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLock;

impl BusLock for NoLock {
    fn try_acquire(&self) -> bool {
        true
    }

    fn release(&self) {}
}

/// Atomic flag lock, typically placed in a `static` shared by all bus users.
#[derive(Debug, Default)]
pub struct FlagLock {
    taken: AtomicBool,
}

impl FlagLock {
    pub const fn new() -> Self {
        Self {
            taken: AtomicBool::new(false),
        }
    }

    pub fn is_taken(&self) -> bool {
        self.taken.load(Ordering::Relaxed)
    }
}

impl BusLock for FlagLock {
    fn try_acquire(&self) -> bool {
        self.taken
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn release(&self) {
        self.taken.store(false, Ordering::Release);
    }
}

/// Releases the lock on every exit path.
struct LockGuard<'a, L: BusLock>(&'a L);

impl<L: BusLock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Wait for the lock, sleeping `poll_ms` after every failed attempt.
fn acquire<'a, L, C, D>(lock: &'a L, clock: &C, delay: &mut D, wait_ms: u32, poll_ms: u32) -> Option<LockGuard<'a, L>>
where
    L: BusLock,
    C: Clock,
    D: DelayNs,
{
    let taken: Result<(), RetryError<()>> = retry_with_deadline(clock, wait_ms, || {
        if lock.try_acquire() {
            Ok(())
        } else {
            delay.delay_ms(poll_ms);
            Err(nb::Error::WouldBlock)
        }
    });
    taken.ok().map(|()| LockGuard(lock))
}

/// Timing bounds for [`SharedBus`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BusTiming {
    /// Maximum wait for the bus lock before the operation is skipped.
    pub lock_wait_ms: u32,
    /// Sleep between lock attempts.
    pub lock_poll_ms: u32,
    /// Maximum time a single transfer may stay busy.
    pub transfer_timeout_ms: u32,
    /// Arbitration-loss restarts before the loss is reported as a transport error.
    pub max_arbitration_retries: u8,
}

impl Default for BusTiming {
    fn default() -> Self {
        Self {
            lock_wait_ms: 300,
            lock_poll_ms: 1,
            transfer_timeout_ms: 200,
            max_arbitration_retries: 16,
        }
    }
}

/// Byte-level access to one device on the bus.
pub trait RegisterBus {
    type Error: core::fmt::Debug;

    /// Write `bytes` to the device.
    fn transfer(&mut self, bytes: &[u8]) -> Result<(), Error<Self::Error>>;
    /// Read `buffer.len()` bytes from the device.
    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error<Self::Error>>;
}

/// A device handle on a bus shared with other tasks.
///
/// `delay` is only used to sleep while another bus user holds the lock.
pub struct SharedBus<T, L, C, D> {
    transport: T,
    lock: L,
    clock: C,
    delay: D,
    address: u8,
    timing: BusTiming,
}

impl<T, L, C, D> SharedBus<T, L, C, D> {
    /// Create a handle for the BQ25703A at its fixed address.
    pub fn new(transport: T, lock: L, clock: C, delay: D) -> Self {
        Self::with_address(transport, lock, clock, delay, DEFAULT_I2C_ADDRESS)
    }

    pub fn with_address(transport: T, lock: L, clock: C, delay: D, address: u8) -> Self {
        Self {
            transport,
            lock,
            clock,
            delay,
            address,
            timing: BusTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: BusTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Consume the handle and return the owned transport.
    pub fn free(self) -> T {
        self.transport
    }
}

impl<T, L, C, D> SharedBus<T, L, C, D>
where
    T: Transport,
    L: BusLock,
    C: Clock,
    D: DelayNs,
{
    fn exchange(
        &mut self,
        mut op: impl FnMut(&mut T, u8) -> nb::Result<(), T::Error>,
    ) -> Result<(), Error<T::Error>> {
        let Some(_guard) = acquire(
            &self.lock,
            &self.clock,
            &mut self.delay,
            self.timing.lock_wait_ms,
            self.timing.lock_poll_ms,
        ) else {
            debug!("bus lock not acquired, skipping");
            return Err(Error::Busy);
        };

        let address = self.address;
        let mut restarts = 0u8;
        loop {
            let transport = &mut self.transport;
            match retry_with_deadline(&self.clock, self.timing.transfer_timeout_ms, || op(transport, address)) {
                Ok(()) => return Ok(()),
                Err(RetryError::TimedOut) => {
                    warn!("bus transfer to 0x{:x} timed out", address);
                    return Err(Error::Timeout);
                }
                Err(RetryError::Failed(e))
                    if e.kind() == ErrorKind::ArbitrationLoss
                        && restarts < self.timing.max_arbitration_retries =>
                {
                    restarts += 1;
                    trace!("arbitration lost, restarting transfer");
                }
                Err(RetryError::Failed(e)) => return Err(Error::Transport(e)),
            }
        }
    }
}

impl<T, L, C, D> RegisterBus for SharedBus<T, L, C, D>
where
    T: Transport,
    L: BusLock,
    C: Clock,
    D: DelayNs,
{
    type Error = T::Error;

    fn transfer(&mut self, bytes: &[u8]) -> Result<(), Error<Self::Error>> {
        self.exchange(|transport, address| transport.write(address, bytes))
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Error<Self::Error>> {
        self.exchange(|transport, address| transport.read(address, &mut *buffer))
    }
}

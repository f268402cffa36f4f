//! Error definitions for the BQ25703A charge control core.

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// Bus lock was not acquired within the wait bound; the operation was skipped.
    Busy,
    /// Transport never went idle before the transfer deadline.
    Timeout,
    /// Underlying transport failed with a non-retryable error.
    Transport(E),
    /// Identity registers did not match the BQ25703A.
    WrongId { manufacturer: u8, device: u8 },
    /// ADC conversion did not complete within the poll limit.
    AdcTimeout,
    /// Provided parameter was outside the supported range.
    OutOfRange,
}

impl<E> Error<E> {
    /// Whether this error counts as a regulator communication fault.
    ///
    /// A skipped operation (`Busy`) and plain transport errors only leave
    /// readings stale.
    pub fn is_communication_fault(&self) -> bool {
        matches!(self, Error::Timeout | Error::WrongId { .. } | Error::AdcTimeout)
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Busy => write!(f, "bus busy, operation skipped"),
            Error::Timeout => write!(f, "bus transfer timed out"),
            Error::Transport(e) => write!(f, "transport error: {:?}", e),
            Error::WrongId { manufacturer, device } => write!(
                f,
                "unexpected identity: manufacturer 0x{:02x}, device 0x{:02x}",
                manufacturer, device
            ),
            Error::AdcTimeout => write!(f, "ADC conversion did not complete"),
            Error::OutOfRange => write!(f, "parameter out of range"),
        }
    }
}

//! BQ25703A charge control core
//!
//! Drives a TI BQ25703A buck-boost charger over I2C for 1-4 cell packs: register
//! codec, ADC telemetry, power budgeting and the periodic charge/recover/measure
//! control loop. Hardware access goes through `embedded-hal` 1.0 traits; cell
//! sensing, source negotiation and fault storage are supplied by the firmware
//! through the traits in [`collab`] and [`faults`].

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod bus;
pub mod clock;
pub mod collab;
pub mod control;
pub mod data_types;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod faults;
pub mod pins;
pub mod power;
pub mod registers;

pub use bus::{BlockingI2c, FlagLock, NoLock, SharedBus};
pub use control::{ChargeController, ChargerConfig};
pub use driver::Bq25703a;
pub use error::Error;
pub use registers::DEFAULT_I2C_ADDRESS;

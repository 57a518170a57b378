//! Backing Store.
//!
//! The backing store is three serial memory banks behind one controller.

/// Triple-bank controller and bank timing models.
pub mod controller;

pub use controller::{
    BankTimingModel, FixedTiming, MemRequest, MemResponse, SerialTiming, TripleBankController,
};

//! Binary Loader and System Initialization.
//!
//! This module provides utilities for loading flat binary images into
//! system memory and for building a ready-to-run `Cpu` from a configuration.

use std::fs;
use std::path::Path;

use crate::common::SimError;
use crate::config::Config;
use crate::core::Cpu;
use crate::soc::System;

/// Loads a binary file from disk.
///
/// # Errors
///
/// Returns `SimError::Io` if the file cannot be read.
pub fn load_binary(path: impl AsRef<Path>) -> Result<Vec<u8>, SimError> {
    let path = path.as_ref();
    fs::read(path).map_err(|source| SimError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Writes `image` to `addr` and points fetch at it.
///
/// # Errors
///
/// Returns `SimError::ProgramTooLarge` if the image does not fit in the
/// slave mapped at `addr`.
pub fn load_program(cpu: &mut Cpu, image: &[u8], addr: u32) -> Result<(), SimError> {
    cpu.system.load_binary_at(image, addr)?;
    cpu.set_entry(addr);
    tracing::info!("loader: entry point {:#010x}", addr);
    Ok(())
}

/// Builds the system described by `config` and loads `image` at
/// `general.start_pc`.
///
/// # Errors
///
/// Returns the construction or load error.
pub fn boot(config: &Config, image: &[u8]) -> Result<Cpu, SimError> {
    let system = System::new(config)?;
    let mut cpu = Cpu::new(system, config);
    load_program(&mut cpu, image, config.general.start_pc)?;
    Ok(cpu)
}

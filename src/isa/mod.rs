//! RV32IM + Zicsr Instruction Set.
//!
//! Field extraction, immediate decoding, the opcode and function-code
//! constants the decoder matches on, and a small encoder used to build test
//! programs.

/// Decoder producing `Decoded` instructions.
pub mod decode;
/// Instruction encoders.
pub mod encode;
/// `funct3` values.
pub mod funct3;
/// `funct7` values.
pub mod funct7;
/// Field extraction.
pub mod instruction;
/// Major opcodes.
pub mod opcodes;
/// Fixed SYSTEM / MISC-MEM encodings.
pub mod sys_ops;

pub use decode::decode;
pub use instruction::{Decoded, InstructionBits};

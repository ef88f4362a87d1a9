//! # nevars-core
//!
//! Core protocol implementation for IEC 61107 electricity meters.
//!
//! This crate provides the low-level protocol primitives:
//! - Block check character (BCC) calculation
//! - OBIS address parsing and compaction
//! - Command frame encoding, response decoding
//! - Schedule table decoding
//! - Session state tracking
//! - Protocol constants

pub mod checksum;
pub mod constants;
pub mod error;
pub mod frame;
pub mod obis;
pub mod response;
pub mod schedule;
pub mod session;

pub use error::{Error, Result};
pub use frame::{CommandFrame, Mode, ProtocolMode};
pub use obis::ObisAddress;
pub use response::{check_ack, DataFrame, IdentificationFrame, PasswordFrame};
pub use session::{Session, SessionState};

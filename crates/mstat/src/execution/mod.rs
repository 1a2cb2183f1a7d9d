//! Execution layer: launching the measured command
//!
//! The supervisor (parent) and the bootstrap hop (child) are two runs of the
//! same binary joined by a one-shot handshake pipe.

pub mod bootstrap;
pub mod handshake;
pub mod process;
pub mod supervisor;

pub use process::{ExitOutcome, LaunchedChild};
pub use supervisor::{LaunchOutcome, Supervisor};

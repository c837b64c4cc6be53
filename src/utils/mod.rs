//! Process-wide utilities.

pub mod log;

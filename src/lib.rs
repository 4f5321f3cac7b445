//! Hexwar combat core - engagement resolution for a hex-grid RTS

pub mod battle;
pub mod core;

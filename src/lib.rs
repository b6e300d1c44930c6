//! Bode Bridge - live frequency-response viewer bridge
//!
//! Connects measurement devices on a pub/sub bus to browser viewers over
//! WebSocket: device rooms drive bus subscriptions, measurements are parsed
//! into Bode and Nyquist series, and sweeps are paced per viewer session.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

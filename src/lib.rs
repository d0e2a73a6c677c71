//! Space Battle Server Library
//!
//! Authoritative server for a shared 2-D space battle. Ships and rockets are
//! tracked on a uniform cell grid so that every event reaches only the
//! players whose area of interest covers it.

pub mod config;
pub mod game;
pub mod interest;
pub mod metrics;
pub mod net;
pub mod util;

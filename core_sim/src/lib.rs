pub mod access;
pub mod cache;
pub mod common;
pub mod memory;
pub mod observer;
pub mod scenario;
pub mod sim;

#[cfg(feature = "stat")]
pub mod stat;

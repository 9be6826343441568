//! ESP32-S3 firmware-specific modules for ember
//!
//! This crate contains the code that cannot compile on desktop targets: the
//! esp-hal conversion unit and GPIO bindings, Wi-Fi station bring-up, the
//! embassy-net HTTP workers, and the values baked in by the build script.
//!
//! The device joins an existing Wi-Fi network as a station (see [`wifi`]);
//! it does not host its own access point.

#![no_std]

extern crate alloc;

pub mod hardware;
pub mod http;
pub mod wifi;
pub mod wifi_secrets;

/// Monitor overrides baked in by the build script, `key=value` separated by commas
pub const CONFIG_OVERRIDES: &str = env!("EMBER_CONFIG_OVERRIDES");

/// Iterate the baked-in overrides, skipping empty entries.
pub fn config_overrides() -> impl Iterator<Item = &'static str> {
    CONFIG_OVERRIDES
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

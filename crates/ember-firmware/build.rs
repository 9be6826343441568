//! Bakes Wi-Fi credentials and monitor overrides into the firmware.
//!
//! Values come from the process environment or a `.env` file (see
//! `.env.example`). Monitor overrides are passed on as a single
//! `EMBER_CONFIG_OVERRIDES` variable of comma-separated `key=value` pairs.

use std::env;

/// Environment variable to monitor option name
const OVERRIDE_KEYS: [(&str, &str); 5] = [
    ("EMBER_GAS_THRESHOLD", "gas_threshold"),
    ("EMBER_IR_THRESHOLD", "ir_threshold"),
    ("EMBER_SAMPLE_COUNT", "sample_count"),
    ("EMBER_INTER_SAMPLE_DELAY_MS", "inter_sample_delay_ms"),
    ("EMBER_CYCLE_PERIOD_MS", "cycle_period_ms"),
];

fn main() {
    println!("cargo:rerun-if-changed=.env");

    if let Ok(path) = dotenvy::dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for key in ["WIFI_SSID", "WIFI_PASSWORD"] {
        println!("cargo:rerun-if-env-changed={}", key);
        match env::var(key) {
            Ok(value) => println!("cargo:rustc-env={}={}", key, value),
            Err(_) => panic!("{} must be set in the environment or in .env", key),
        }
    }

    let mut overrides = Vec::new();
    for (var, option) in OVERRIDE_KEYS {
        println!("cargo:rerun-if-env-changed={}", var);
        if let Ok(value) = env::var(var) {
            overrides.push(format!("{}={}", option, value.trim()));
        }
    }
    println!(
        "cargo:rustc-env=EMBER_CONFIG_OVERRIDES={}",
        overrides.join(",")
    );
}

//! Entropy adapter for backoff jitter.
//!
//! Implements [`JitterRng`].
//!
//! ESP-IDF: delegates to the hardware RNG via `esp_fill_random`, so retry
//! jitter across a fleet is decorrelated even when thousands of devices
//! reconnect after the same outage. Host targets fall back to hasher
//! entropy — non-cryptographic, dev/test only.

use crate::app::ports::JitterRng;

/// Hardware-seeded jitter source.
pub struct HardwareRng;

impl HardwareRng {
    pub fn new() -> Self {
        Self
    }
}

impl JitterRng for HardwareRng {
    #[cfg(target_os = "espidf")]
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        // SAFETY: esp_fill_random writes to the provided buffer using
        // the hardware RNG. Buffer is valid and exclusively owned.
        unsafe {
            esp_idf_sys::esp_fill_random(buf.as_mut_ptr().cast(), buf.len());
        }
        u32::from_le_bytes(buf)
    }

    #[cfg(not(target_os = "espidf"))]
    fn next_u32(&mut self) -> u32 {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};

        let s = RandomState::new();
        s.build_hasher().finish() as u32
    }
}

//! ESP32 clock adapter.
//!
//! Implements [`ClockPort`] — monotonic time plus cooperative sleep.
//!
//! - **`target_os = "espidf"`** — `esp_timer_get_time()` (microsecond
//!   precision, monotonic) and the FreeRTOS task delay, which yields the
//!   calling task instead of spinning.
//! - **all other targets** — `std::time::Instant` and `std::thread::sleep`
//!   for host-side testing and simulation.

use core::time::Duration;

use crate::app::ports::ClockPort;

/// Clock adapter for the ESP32-S3 platform.
pub struct Esp32Clock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl ClockPort for Esp32Clock {
    #[cfg(target_os = "espidf")]
    fn now(&self) -> Duration {
        Duration::from_micros((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64)
    }

    #[cfg(not(target_os = "espidf"))]
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    #[cfg(target_os = "espidf")]
    fn sleep(&self, duration: Duration) {
        esp_idf_hal::delay::FreeRtos::delay_ms(duration.as_millis() as u32);
    }

    #[cfg(not(target_os = "espidf"))]
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

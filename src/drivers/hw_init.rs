//! One-shot hardware peripheral initialization.
//!
//! Configures the two output GPIOs using raw ESP-IDF sys calls and
//! parks them at their rest level (HIGH — both the relay module and the
//! indicator LED are active-low). Called once from `main()` before the
//! polling loop starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::pins;

#[cfg(target_os = "espidf")]
use log::info;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

// ── GPIO outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn init_outputs() -> Result<(), HwInitError> {
    let output_pins = [pins::RELAY_GPIO, pins::INDICATOR_LED_GPIO];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: called once from main() before the polling loop;
        // single-threaded.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        // Rest level HIGH — relay open, LED dark.
        unsafe { gpio_set_level(pin, 1) };
    }

    info!("hw_init: relay + indicator outputs configured (rest HIGH)");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_outputs() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): output init skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_outputs(). Main-loop only.
    unsafe {
        gpio_set_level(pin, if high { 1 } else { 0 });
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── Blocking delay ────────────────────────────────────────────

/// Block the calling task. Used only for the relay pulse hold, from
/// the polling-loop context.
#[cfg(target_os = "espidf")]
pub fn delay_ms(ms: u32) {
    esp_idf_hal::delay::FreeRtos::delay_ms(ms);
}

#[cfg(not(target_os = "espidf"))]
pub fn delay_ms(ms: u32) {
    std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
}

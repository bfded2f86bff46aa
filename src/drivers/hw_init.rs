//! One-shot hardware peripheral initialization.
//!
//! Configures the ADC1 oneshot unit for the battery sense pin and the rail
//! gate GPIO using raw ESP-IDF sys calls.  Called once from `main()` right
//! after wake, before the cycle starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    /// The pin is not routed to ADC1.
    NotAnAdcPin(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::NotAnAdcPin(pin) => write!(f, "GPIO{} has no ADC1 channel", pin),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

/// ESP32 ADC1 channel for a GPIO, if it has one.
pub fn adc1_channel_for_gpio(pin: i32) -> Option<u32> {
    match pin {
        36 => Some(0),
        37 => Some(1),
        38 => Some(2),
        39 => Some(3),
        32 => Some(4),
        33 => Some(5),
        34 => Some(6),
        35 => Some(7),
        _ => None,
    }
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only after `init_adc()` from the single cycle
/// task.  No concurrent access is possible: the firmware never spawns.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

/// Bring up ADC1 and configure the channel behind `pin` (12-bit, 12 dB).
#[cfg(target_os = "espidf")]
pub fn init_adc(pin: i32) -> Result<u32, HwInitError> {
    let channel = adc1_channel_for_gpio(pin).ok_or(HwInitError::NotAnAdcPin(pin))?;
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once per wake.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!("hw_init: ADC1 CH{} configured (GPIO{} = battery)", channel, pin);
    Ok(channel)
}

#[cfg(not(target_os = "espidf"))]
pub fn init_adc(pin: i32) -> Result<u32, HwInitError> {
    let channel = adc1_channel_for_gpio(pin).ok_or(HwInitError::NotAnAdcPin(pin))?;
    log::info!("hw_init(sim): ADC1 CH{} skipped", channel);
    Ok(channel)
}

/// One raw conversion.  `Err(rc)` on a driver error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Result<u16, i32> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single-task access after init_adc().
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return Err(ret);
    }
    Ok(raw.max(0) as u16)
}

/// Simulation: mid-charge cell (~3.9 V through the 1:1 divider).
#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> Result<u16, i32> {
    Ok(2230)
}

// ── GPIO output with sleep hold ───────────────────────────────

/// Configure `pin` as a push-pull output starting at `initial_high`.
///
/// The level is written before and after `gpio_config` so the pad never
/// drives the reset latch value (0).  While a pad hold from the previous
/// sleep is active the pin keeps its held level regardless.
#[cfg(target_os = "espidf")]
pub fn init_output(pin: i32, initial_high: bool) -> Result<(), HwInitError> {
    // SAFETY: single-task init path; the output latch can be written
    // before the pad is switched to output.
    unsafe {
        gpio_set_level(pin, u32::from(initial_high));
    }
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    // SAFETY: single-task init path.
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    // SAFETY: pin configured as output above.
    unsafe {
        gpio_set_level(pin, u32::from(initial_high));
    }
    info!("hw_init: GPIO{} output, initial {}", pin, if initial_high { "high" } else { "low" });
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_output(_pin: i32, _initial_high: bool) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): GPIO output skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

/// Latch (or release) the pad level so it survives deep sleep.
#[cfg(target_os = "espidf")]
pub fn gpio_hold(pin: i32, hold: bool) {
    // SAFETY: pad hold registers; single-task access.
    unsafe {
        if hold {
            gpio_hold_en(pin);
            gpio_deep_sleep_hold_en();
        } else {
            gpio_hold_dis(pin);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_hold(_pin: i32, _hold: bool) {}

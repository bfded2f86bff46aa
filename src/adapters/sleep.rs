//! Deep-sleep adapter.
//!
//! Implements [`DeepSleepPort`].  On ESP-IDF the timer wake source is armed
//! (or left unarmed for an indefinite sleep) and `esp_deep_sleep_start()`
//! never returns; the next wake boots the firmware from the top.  On host
//! there is nothing to sleep into, so the simulation logs and exits the
//! process.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{DeepSleepPort, SleepDirective};

/// Timer wake source in microseconds, or `None` for no timer.
pub fn timer_wakeup_us(directive: SleepDirective) -> Option<u64> {
    match directive {
        SleepDirective::Timed(ms) => Some(ms.saturating_mul(1_000)),
        SleepDirective::Indefinite => None,
    }
}

#[derive(Debug, Default)]
pub struct DeepSleep;

impl DeepSleep {
    pub fn new() -> Self {
        Self
    }
}

impl DeepSleepPort for DeepSleep {
    #[cfg(target_os = "espidf")]
    fn enter(&mut self, directive: SleepDirective) -> ! {
        match timer_wakeup_us(directive) {
            Some(us) => {
                info!("Deep sleep for {} ms", us / 1_000);
                // SAFETY: arms the RTC timer wake source before the call
                // that powers the core down.
                let rc = unsafe { esp_idf_svc::sys::esp_sleep_enable_timer_wakeup(us) };
                if rc != esp_idf_svc::sys::ESP_OK as i32 {
                    warn!("Deep sleep: timer wake source rejected (rc={}), no timed wake", rc);
                }
            }
            None => info!("Deep sleep until reset"),
        }
        // SAFETY: powers the core down; the next wake is a fresh boot.
        unsafe {
            esp_idf_svc::sys::esp_deep_sleep_start();
        }
        #[allow(unreachable_code)]
        {
            unreachable!("esp_deep_sleep_start returned")
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn enter(&mut self, directive: SleepDirective) -> ! {
        info!("(sim) deep sleep: {:?} (timer {:?} us)", directive, timer_wakeup_us(directive));
        std::process::exit(0)
    }
}

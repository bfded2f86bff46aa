//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to              |
//! |-------------|--------------------|--------------------------|
//! | `log_sink`  | EventSink          | Serial log output        |
//! | `mqtt`      | DeliveryTransport  | ESP-IDF MQTT client      |
//! | `sleep`     | DeepSleepPort      | RTC timer + deep sleep   |
//! | `time`      | WakeClock, DelayNs | ESP32 system timer       |
//! | `wifi`      | Radio              | ESP-IDF WiFi STA         |
//! | `device_id` | —                  | eFuse factory MAC        |

pub mod device_id;
pub mod log_sink;
pub mod mqtt;
pub mod sleep;
pub mod time;
pub mod wifi;

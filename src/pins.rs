//! GPIO / peripheral pin assignments for the shuntmeter node (FireBeetle
//! ESP32 carrier board).
//!
//! Single source of truth for the defaults in [`crate::config`].  A JSON
//! config override may still move the sensor bus or rail to other pins.

// ---------------------------------------------------------------------------
// I²C bus (INA226)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;

// ---------------------------------------------------------------------------
// Sensor power rail (AO3401 P-channel high-side switch)
// ---------------------------------------------------------------------------

/// Gate of the rail switch.  Must be an RTC-capable GPIO so its level can be
/// held through deep sleep.
pub const SENSOR_RAIL_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// Battery sense (1 MΩ + 1 MΩ divider)
// ---------------------------------------------------------------------------

/// ADC1 channel 6 on the ESP32.
pub const BATTERY_SENSE_GPIO: i32 = 34;

use libm::sqrt;

/// Speed of sound in centimeters per microsecond (roughly 343 m/s).
pub const SOUND_SPEED_CM_PER_US: f64 = 0.0343;

/// How long the trigger pin is held high.
pub const TRIGGER_PULSE_MS: u32 = 5;

/// How long to wait for the echo to fall before giving up on a cycle.
///
/// Must exceed the round trip for the sensor's rated range (about 24 ms for 4 m).
pub const ECHO_TIMEOUT_MS: u32 = 100;

/// How long to wait for a follow-up command after a measurement.
pub const COMMAND_REREAD_TIMEOUT_US: u32 = 100;

/// The temperature unit used to adjust the speed of sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// The configuration for a ranging cycle and the command loop.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub trigger_pulse_ms: u32,
    pub echo_timeout_ms: u32,
    pub sound_speed_cm_per_us: f64,
    pub command_reread_timeout_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trigger_pulse_ms: TRIGGER_PULSE_MS,
            echo_timeout_ms: ECHO_TIMEOUT_MS,
            sound_speed_cm_per_us: SOUND_SPEED_CM_PER_US,
            command_reread_timeout_us: COMMAND_REREAD_TIMEOUT_US,
        }
    }
}

impl Config {
    /// Replace the fixed speed of sound with one adjusted for the ambient temperature.
    pub fn with_temperature(self, temperature: f64, unit: TemperatureUnit) -> Self {
        let meters_per_second = speed_of_sound_temperature_adjusted(temperature, unit);
        Self {
            sound_speed_cm_per_us: meters_per_second * 100.0 / 1_000_000.0,
            ..self
        }
    }
}

/// Calculate the speed of sound in meters per second, adjusted for temperature.
fn speed_of_sound_temperature_adjusted(temperature: f64, unit: TemperatureUnit) -> f64 {
    let temp = match unit {
        TemperatureUnit::Celsius => temperature,
        TemperatureUnit::Fahrenheit => (temperature - 32.0) * 5.0 / 9.0,
    };
    331.5 * sqrt(1.0 + (temp / 273.15))
}

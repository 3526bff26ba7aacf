use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;

/// One synthetic sensor sweep, pushed as a single bulk update.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub battery: f64,
}

impl Reading {
    pub fn random(rng: &mut impl Rng) -> Self {
        let temperature = if rng.gen_bool(0.05) {
            rng.gen_range(-50.0..100.0) // 5% outliers
        } else {
            rng.gen_range(15.0..35.0) // Normal range
        };

        let humidity = if rng.gen_bool(0.05) {
            rng.gen_range(0.0..100.0) // 5% outliers
        } else {
            rng.gen_range(30.0..80.0) // Normal range
        };

        let pressure = rng.gen_range(980.0..1040.0);

        let battery = if rng.gen_bool(0.02) {
            rng.gen_range(0.0..20.0) // 2% low battery
        } else {
            rng.gen_range(20.0..100.0) // Normal range
        };

        Self {
            temperature,
            humidity,
            pressure,
            battery,
        }
    }

    /// Field map keyed the way the bulk update endpoint expects.
    pub fn field_map(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("1".to_string(), self.temperature),
            ("2".to_string(), self.humidity),
            ("3".to_string(), self.pressure),
            ("4".to_string(), self.battery),
        ])
    }
}

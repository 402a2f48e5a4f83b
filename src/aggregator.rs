/// Accumulation of Signal K measurements between report submissions
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use serde_json::Value;
use time::OffsetDateTime;

use crate::config::{HumidityMode, StationConfig, WindMode};
use crate::models::{MeasurementKind, Position};
use crate::utils::{kelvin_to_celsius, radians_to_degrees, round_to};

/// Per-kind folding choices that vary between deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FoldRules {
    pub humidity: HumidityMode,
    pub wind: WindMode,
}

impl From<&StationConfig> for FoldRules {
    fn from(config: &StationConfig) -> Self {
        FoldRules {
            humidity: config.humidity,
            wind: config.wind,
        }
    }
}

/// Latest value per measurement since the last successful submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulationBuffer {
    pub position: Option<Position>,
    pub wind_speed: Vec<f64>,
    pub wind_gust: Option<f64>,
    pub wind_direction: Option<i64>,
    pub water_temperature: Option<f64>,
    pub air_temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
}

/// Required fields absent from the buffer at flush time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFields(pub Vec<&'static str>);

impl fmt::Display for MissingFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

impl AccumulationBuffer {
    pub fn is_empty(&self) -> bool {
        *self == AccumulationBuffer::default()
    }

    /// Fold one measurement into the buffer
    ///
    /// Values of the wrong shape are logged and dropped.
    pub fn fold(&mut self, kind: MeasurementKind, value: &Value, rules: FoldRules) {
        let folded = match kind {
            MeasurementKind::Position => self.fold_position(value),
            MeasurementKind::WindSpeed => value.as_f64().map(|speed| {
                let speed = round_to(speed, 2);
                match rules.wind {
                    WindMode::Median => self.wind_speed.push(speed),
                    WindMode::Latest => self.wind_speed = vec![speed],
                }
                if self.wind_gust.map_or(true, |gust| speed > gust) {
                    self.wind_gust = Some(speed);
                }
            }),
            MeasurementKind::WindDirection => value.as_f64().map(|rad| {
                self.wind_direction = Some(radians_to_degrees(rad).round() as i64);
            }),
            MeasurementKind::WaterTemperature => value.as_f64().map(|kelvin| {
                self.water_temperature = Some(round_to(kelvin_to_celsius(kelvin), 1));
            }),
            MeasurementKind::AirTemperature => value.as_f64().map(|kelvin| {
                self.air_temperature = Some(round_to(kelvin_to_celsius(kelvin), 1));
            }),
            MeasurementKind::Pressure => numeric(value).map(|pressure| {
                self.pressure = Some(pressure);
            }),
            MeasurementKind::Humidity => numeric(value).map(|humidity| {
                self.humidity = Some(match rules.humidity {
                    HumidityMode::Ratio => (humidity * 100.0).round(),
                    HumidityMode::Percent => humidity,
                });
            }),
        };

        if folded.is_none() {
            warn!("Ignoring malformed {:?} value: {}", kind, value);
        }
    }

    fn fold_position(&mut self, value: &Value) -> Option<()> {
        let position = serde_json::from_value::<Position>(value.clone()).ok()?;
        self.position = Some(position);
        Some(())
    }

    /// Names of the fields a report cannot be built without
    pub fn missing_fields(&self) -> MissingFields {
        let mut missing = Vec::new();
        if self.position.is_none() {
            missing.push("position");
        }
        if self.wind_speed.is_empty() {
            missing.push("wind speed");
        }
        if self.wind_direction.is_none() {
            missing.push("wind direction");
        }
        if self.air_temperature.is_none() {
            missing.push("temperature");
        }
        MissingFields(missing)
    }

    /// Put an older snapshot back underneath the current contents
    ///
    /// Values folded since the snapshot was taken win. Older wind samples
    /// precede newer ones and the gust is the larger of both.
    fn merge_older(&mut self, older: AccumulationBuffer, rules: FoldRules) {
        self.position = self.position.or(older.position);
        self.wind_direction = self.wind_direction.or(older.wind_direction);
        self.water_temperature = self.water_temperature.or(older.water_temperature);
        self.air_temperature = self.air_temperature.or(older.air_temperature);
        self.pressure = self.pressure.or(older.pressure);
        self.humidity = self.humidity.or(older.humidity);

        match rules.wind {
            WindMode::Median => {
                let mut samples = older.wind_speed;
                samples.append(&mut self.wind_speed);
                self.wind_speed = samples;
            }
            WindMode::Latest => {
                if self.wind_speed.is_empty() {
                    self.wind_speed = older.wind_speed;
                }
            }
        }

        self.wind_gust = match (self.wind_gust, older.wind_gust) {
            (Some(newer), Some(older)) => Some(newer.max(older)),
            (newer, older) => newer.or(older),
        };
    }
}

/// Number or numeric string
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Owner of the accumulation buffer and the last-success timestamp
///
/// Folds and flushes only touch the buffer through this type, and never
/// hold its lock across an await point.
#[derive(Debug, Default)]
pub struct Aggregator {
    rules: FoldRules,
    buffer: Mutex<AccumulationBuffer>,
    last_success: Mutex<Option<OffsetDateTime>>,
}

impl Aggregator {
    pub fn new(rules: FoldRules) -> Self {
        Aggregator {
            rules,
            buffer: Mutex::new(AccumulationBuffer::default()),
            last_success: Mutex::new(None),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, AccumulationBuffer> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Route a Signal K path/value pair to its measurement
    pub fn ingest(&self, path: &str, value: &Value) {
        match MeasurementKind::from_path(path) {
            Some(kind) => self.fold(kind, value),
            None => debug!("Unknown path: {}", path),
        }
    }

    pub fn fold(&self, kind: MeasurementKind, value: &Value) {
        self.buffer().fold(kind, value, self.rules);
    }

    /// Take the buffer contents for submission, leaving it empty
    ///
    /// Nothing is taken when a required field is missing.
    pub fn take_snapshot(&self) -> Result<AccumulationBuffer, MissingFields> {
        let mut buffer = self.buffer();
        let missing = buffer.missing_fields();
        if !missing.0.is_empty() {
            return Err(missing);
        }
        Ok(std::mem::take(&mut *buffer))
    }

    /// Return a snapshot whose submission failed
    pub fn restore(&self, snapshot: AccumulationBuffer) {
        self.buffer().merge_older(snapshot, self.rules);
    }

    /// Copy of the current buffer contents
    pub fn pending(&self) -> AccumulationBuffer {
        self.buffer().clone()
    }

    pub fn record_success(&self, at: OffsetDateTime) {
        *self
            .last_success
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(at);
    }

    pub fn last_success(&self) -> Option<OffsetDateTime> {
        *self
            .last_success
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

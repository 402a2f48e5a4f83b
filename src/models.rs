use serde::{Deserialize, Serialize};

use crate::aggregator::AccumulationBuffer;
use crate::config::StationConfig;
use crate::utils::median;

/// Station type reported to Windy.com
pub const STATION_TYPE: &str = "Signal K Windy Relay";
const SHARE_OPTION: &str = "Open";
const ELEVATION: u32 = 1;

/// Measurements the relay folds into a weather report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    Position,
    WindSpeed,
    WindDirection,
    WaterTemperature,
    AirTemperature,
    Pressure,
    Humidity,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 7] = [
        MeasurementKind::Position,
        MeasurementKind::WindSpeed,
        MeasurementKind::WindDirection,
        MeasurementKind::WaterTemperature,
        MeasurementKind::AirTemperature,
        MeasurementKind::Pressure,
        MeasurementKind::Humidity,
    ];

    /// Signal K path carrying this measurement
    pub fn path(&self) -> &'static str {
        match self {
            Self::Position => "navigation.position",
            Self::WindSpeed => "environment.wind.speedOverGround",
            Self::WindDirection => "environment.wind.directionGround",
            Self::WaterTemperature => "environment.water.temperature",
            Self::AirTemperature => "environment.outside.temperature",
            Self::Pressure => "environment.outside.pressure",
            Self::Humidity => "environment.outside.humidity",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.path() == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Request body for the Windy.com station update endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub stations: Vec<StationRecord>,
    pub observations: Vec<ObservationRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    pub station: u32,
    pub name: String,
    pub share_option: String,
    #[serde(rename = "type")]
    pub station_type: String,
    pub provider: String,
    pub url: String,
    pub lat: f64,
    pub lon: f64,
    pub elevation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRecord {
    pub station: u32,
    pub temp: f64,
    pub wind: f64,
    pub gust: Option<f64>,
    pub winddir: i64,
    pub pressure: Option<f64>,
    pub rh: Option<f64>,
}

impl WeatherReport {
    /// Build a report from a complete buffer snapshot
    ///
    /// Returns None when a required field is missing; callers are expected
    /// to have passed the snapshot through the completeness check first.
    pub fn from_snapshot(config: &StationConfig, snapshot: &AccumulationBuffer) -> Option<Self> {
        let position = snapshot.position?;
        let wind = median(&snapshot.wind_speed)?;
        let winddir = snapshot.wind_direction?;
        let temp = snapshot.air_temperature?;

        Some(WeatherReport {
            stations: vec![StationRecord {
                station: config.station_id,
                name: config.station_name.clone(),
                share_option: SHARE_OPTION.to_string(),
                station_type: STATION_TYPE.to_string(),
                provider: config.provider.clone(),
                url: config.site_url.clone(),
                lat: position.latitude,
                lon: position.longitude,
                elevation: ELEVATION,
            }],
            observations: vec![ObservationRecord {
                station: config.station_id,
                temp,
                wind,
                gust: snapshot.wind_gust,
                winddir,
                pressure: snapshot.pressure,
                rh: snapshot.humidity,
            }],
        })
    }
}

use std::env;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE: &str = "https://stations.windy.com/pws/update/";
const DEFAULT_SUBMIT_INTERVAL_MINUTES: u64 = 5;
const DEFAULT_STATUS_INTERVAL_SECS: u64 = 60;
const DEFAULT_STATION_ID: u32 = 100;
const DEFAULT_STATION_NAME: &str = "Unknown";
const DEFAULT_SIGNALK_ADDR: &str = "localhost:8375";
const MAX_SUBMIT_INTERVAL_MINUTES: u64 = 525_600; // one year
const MAX_STATUS_INTERVAL_SECS: u64 = 31_536_000; // one year

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WINDY_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("invalid submission endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// How humidity readings are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HumidityMode {
    /// Readings are a 0..1 ratio, reported as a rounded percentage
    #[default]
    Ratio,
    /// Readings are passed through unchanged
    Percent,
}

/// How wind speed samples are reduced to one value per report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindMode {
    /// Keep every sample and report the median
    #[default]
    Median,
    /// Keep only the latest sample
    Latest,
}

/// Which HTTP responses count as an accepted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Only 2xx responses
    #[default]
    Strict,
    /// Any response that arrived without a transport error
    Lenient,
}

impl FromStr for HumidityMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ratio" => Ok(Self::Ratio),
            "percent" => Ok(Self::Percent),
            _ => Err(()),
        }
    }
}

impl FromStr for WindMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "median" => Ok(Self::Median),
            "latest" => Ok(Self::Latest),
            _ => Err(()),
        }
    }
}

impl FromStr for StatusPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub api_base: String,
    pub endpoint: Url,
    pub submit_interval_minutes: u64,
    pub status_interval_secs: u64,
    pub station_id: u32,
    pub station_name: String,
    pub provider: String,
    pub site_url: String,
    pub humidity: HumidityMode,
    pub wind: WindMode,
    pub status_policy: StatusPolicy,
    pub signalk_addr: String,
}

impl StationConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from a key lookup
    ///
    /// Blank values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = get("WINDY_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let api_key = api_key.trim();
        // The key is appended as the last path segment
        if !api_key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
        {
            return Err(ConfigError::Invalid {
                key: "WINDY_API_KEY",
                value: api_key.to_string(),
                reason: "may only contain letters, digits, '-', '.', '_' and '~'",
            });
        }
        let api_base = get("WINDY_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let endpoint = Url::parse(&format!("{}{}", api_base, api_key))?;

        let submit_interval_minutes = parse_positive(
            "WINDY_SUBMIT_INTERVAL",
            get("WINDY_SUBMIT_INTERVAL"),
            DEFAULT_SUBMIT_INTERVAL_MINUTES,
            MAX_SUBMIT_INTERVAL_MINUTES,
        )?;
        let status_interval_secs = parse_positive(
            "WINDY_STATUS_INTERVAL",
            get("WINDY_STATUS_INTERVAL"),
            DEFAULT_STATUS_INTERVAL_SECS,
            MAX_STATUS_INTERVAL_SECS,
        )?;

        let station_id: u32 = match get("WINDY_STATION_ID") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "WINDY_STATION_ID",
                value,
                reason: "expected a non-negative integer",
            })?,
            None => DEFAULT_STATION_ID,
        };

        let humidity: HumidityMode = parse_choice(
            "WINDY_HUMIDITY_MODE",
            get("WINDY_HUMIDITY_MODE"),
            "expected 'ratio' or 'percent'",
        )?;
        let wind: WindMode = parse_choice(
            "WINDY_WIND_MODE",
            get("WINDY_WIND_MODE"),
            "expected 'median' or 'latest'",
        )?;
        let status_policy: StatusPolicy = parse_choice(
            "WINDY_STATUS_POLICY",
            get("WINDY_STATUS_POLICY"),
            "expected 'strict' or 'lenient'",
        )?;

        Ok(StationConfig {
            api_base,
            endpoint,
            submit_interval_minutes,
            status_interval_secs,
            station_id,
            station_name: get("WINDY_STATION_NAME")
                .unwrap_or_else(|| DEFAULT_STATION_NAME.to_string()),
            provider: lookup("WINDY_PROVIDER").unwrap_or_default(),
            site_url: lookup("WINDY_URL").unwrap_or_default(),
            humidity,
            wind,
            status_policy,
            signalk_addr: get("SIGNALK_ADDR").unwrap_or_else(|| DEFAULT_SIGNALK_ADDR.to_string()),
        })
    }
}

/// Parse an interval in `1..=max`, falling back to `default` when unset
fn parse_positive(
    key: &'static str,
    value: Option<String>,
    default: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let parsed = value.trim().parse::<u64>();
    match parsed {
        Ok(parsed) if parsed > 0 && parsed <= max => Ok(parsed),
        Ok(parsed) if parsed > max => Err(ConfigError::Invalid {
            key,
            value,
            reason: "interval is longer than one year",
        }),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected a positive integer",
        }),
    }
}

fn parse_choice<T>(key: &'static str, value: Option<String>, reason: &'static str) -> Result<T, ConfigError>
where
    T: FromStr + Default,
{
    match value {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value, reason }),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    /// Configuration with a test API key plus the given overrides
    pub(crate) fn config_with(pairs: &[(&str, &str)]) -> StationConfig {
        let mut all = vec![("WINDY_API_KEY", "test-key")];
        all.extend_from_slice(pairs);
        StationConfig::from_lookup(lookup_from(&all)).unwrap()
    }

    #[test]
    fn defaults_apply_when_only_api_key_is_set() {
        let config = config_with(&[]);

        assert_eq!(config.submit_interval_minutes, 5);
        assert_eq!(config.status_interval_secs, 60);
        assert_eq!(config.station_id, 100);
        assert_eq!(config.station_name, "Unknown");
        assert_eq!(config.provider, "");
        assert_eq!(config.site_url, "");
        assert_eq!(config.humidity, HumidityMode::Ratio);
        assert_eq!(config.wind, WindMode::Median);
        assert_eq!(config.status_policy, StatusPolicy::Strict);
        assert_eq!(config.signalk_addr, "localhost:8375");
        assert_eq!(
            config.endpoint.as_str(),
            "https://stations.windy.com/pws/update/test-key"
        );
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = StationConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));

        let err = StationConfig::from_lookup(lookup_from(&[("WINDY_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_with(&[
            ("WINDY_API_BASE", "http://127.0.0.1:9000/update/"),
            ("WINDY_SUBMIT_INTERVAL", "10"),
            ("WINDY_STATION_ID", "7"),
            ("WINDY_HUMIDITY_MODE", "Percent"),
            ("WINDY_WIND_MODE", "latest"),
            ("WINDY_STATUS_POLICY", "lenient"),
        ]);

        assert_eq!(config.endpoint.as_str(), "http://127.0.0.1:9000/update/test-key");
        assert_eq!(config.submit_interval_minutes, 10);
        assert_eq!(config.station_id, 7);
        assert_eq!(config.humidity, HumidityMode::Percent);
        assert_eq!(config.wind, WindMode::Latest);
        assert_eq!(config.status_policy, StatusPolicy::Lenient);
    }

    #[test]
    fn invalid_values_are_reported_with_their_key() {
        let cases = [
            ("WINDY_SUBMIT_INTERVAL", "0"),
            ("WINDY_SUBMIT_INTERVAL", "five"),
            ("WINDY_STATION_ID", "-1"),
            ("WINDY_WIND_MODE", "mean"),
        ];
        for (key, value) in cases {
            let err = StationConfig::from_lookup(lookup_from(&[
                ("WINDY_API_KEY", "test-key"),
                (key, value),
            ]))
            .unwrap_err();
            match err {
                ConfigError::Invalid { key: k, .. } => assert_eq!(k, key),
                other => panic!("unexpected error for {}: {}", key, other),
            }
        }
    }

    #[test]
    fn oversized_intervals_are_rejected() {
        let cases = [
            ("WINDY_SUBMIT_INTERVAL", "307445734561825860"),
            ("WINDY_SUBMIT_INTERVAL", "525601"),
            ("WINDY_STATUS_INTERVAL", "18446744073709551615"),
            ("WINDY_STATUS_INTERVAL", "31536001"),
        ];
        for (key, value) in cases {
            let err = StationConfig::from_lookup(lookup_from(&[
                ("WINDY_API_KEY", "test-key"),
                (key, value),
            ]))
            .unwrap_err();
            match err {
                ConfigError::Invalid { key: k, value: v, .. } => {
                    assert_eq!(k, key);
                    assert_eq!(v, value);
                }
                other => panic!("unexpected error for {}={}: {}", key, value, other),
            }
        }

        let config = config_with(&[
            ("WINDY_SUBMIT_INTERVAL", "525600"),
            ("WINDY_STATUS_INTERVAL", "31536000"),
        ]);
        assert_eq!(config.submit_interval_minutes, 525_600);
        assert_eq!(config.status_interval_secs, 31_536_000);
    }

    #[test]
    fn api_key_with_url_syntax_is_rejected() {
        for api_key in ["abc?x=1", "a/b", "k#frag", "../admin", "key with space"] {
            let err = StationConfig::from_lookup(lookup_from(&[("WINDY_API_KEY", api_key)])).unwrap_err();
            match err {
                ConfigError::Invalid { key, .. } => assert_eq!(key, "WINDY_API_KEY"),
                other => panic!("unexpected error for {:?}: {}", api_key, other),
            }
        }

        let config = config_with(&[("WINDY_API_KEY", " eyJhbGci.OiJIUzI1-NiJ9_x~ ")]);
        assert_eq!(
            config.endpoint.as_str(),
            "https://stations.windy.com/pws/update/eyJhbGci.OiJIUzI1-NiJ9_x~"
        );
    }

    #[test]
    fn unparsable_endpoint_is_rejected() {
        let err = StationConfig::from_lookup(lookup_from(&[
            ("WINDY_API_KEY", "test-key"),
            ("WINDY_API_BASE", "not a url/"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Endpoint(_)));
    }
}

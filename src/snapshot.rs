/*
 *  snapshot.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Immutable weather readings and the fetch outcome model
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Unit system for temperature and wind speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn wind_speed_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

/// Label language for the rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    De,
}

/// The closed set of conditions a snapshot may carry. Upstream codes that
/// do not map onto this set normalize to `Unknown`, never propagate raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    ClearDay,
    ClearNight,
    Cloudy1,
    Cloudy2,
    Cloudy3,
    Rain,
    Snow,
    Fog,
    Thunderstorm,
    Mixed,
    Unknown,
}

impl Condition {
    pub const ALL: [Condition; 11] = [
        Condition::ClearDay,
        Condition::ClearNight,
        Condition::Cloudy1,
        Condition::Cloudy2,
        Condition::Cloudy3,
        Condition::Rain,
        Condition::Snow,
        Condition::Fog,
        Condition::Thunderstorm,
        Condition::Mixed,
        Condition::Unknown,
    ];

    /// Normalize a WMO weather interpretation code (as served by Open-Meteo)
    /// into the condition set. Total over all inputs.
    pub fn from_wmo(code: u16, is_day: bool) -> Self {
        match code {
            0 => {
                if is_day {
                    Condition::ClearDay
                } else {
                    Condition::ClearNight
                }
            }
            1 => Condition::Cloudy1,
            2 => Condition::Cloudy2,
            3 => Condition::Cloudy3,
            45 | 48 => Condition::Fog,
            // drizzle and rain, incl. showers
            51 | 53 | 55 | 61 | 63 | 65 | 80 | 81 | 82 => Condition::Rain,
            // freezing drizzle / freezing rain
            56 | 57 | 66 | 67 => Condition::Mixed,
            // snowfall, snow grains, snow showers
            71 | 73 | 75 | 77 | 85 | 86 => Condition::Snow,
            95 | 96 | 99 => Condition::Thunderstorm,
            _ => Condition::Unknown,
        }
    }

    /// Stable identifier used for asset file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Condition::ClearDay => "clear_day",
            Condition::ClearNight => "clear_night",
            Condition::Cloudy1 => "cloudy_1",
            Condition::Cloudy2 => "cloudy_2",
            Condition::Cloudy3 => "cloudy_3",
            Condition::Rain => "rain",
            Condition::Snow => "snow",
            Condition::Fog => "fog",
            Condition::Thunderstorm => "thunderstorm",
            Condition::Mixed => "mixed",
            Condition::Unknown => "unknown",
        }
    }

    /// Human readable description, localized.
    pub fn description(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match self {
                Condition::ClearDay => "Clear",
                Condition::ClearNight => "Clear",
                Condition::Cloudy1 => "Mostly Clear",
                Condition::Cloudy2 => "Partly Cloudy",
                Condition::Cloudy3 => "Overcast",
                Condition::Rain => "Rain",
                Condition::Snow => "Snow",
                Condition::Fog => "Fog",
                Condition::Thunderstorm => "Thunderstorm",
                Condition::Mixed => "Freezing Rain",
                Condition::Unknown => "Unknown",
            },
            Locale::De => match self {
                Condition::ClearDay => "Klar",
                Condition::ClearNight => "Klar",
                Condition::Cloudy1 => "Überwiegend klar",
                Condition::Cloudy2 => "Teilweise bewölkt",
                Condition::Cloudy3 => "Bedeckt",
                Condition::Rain => "Regen",
                Condition::Snow => "Schnee",
                Condition::Fog => "Nebel",
                Condition::Thunderstorm => "Gewitter",
                Condition::Mixed => "Gefrierender Regen",
                Condition::Unknown => "Unbekannt",
            },
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// One immutable reading of weather conditions at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub units: Units,
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub condition: Condition,
    /// Relative humidity, 0-100 percent.
    pub humidity: u8,
    pub pressure_hpa: f64,
    pub wind_speed: f64,
    /// Meteorological bearing, 0-360 degrees.
    pub wind_direction_deg: u16,
}

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

impl WeatherSnapshot {
    /// 16-point compass label for the wind bearing.
    pub fn wind_compass(&self) -> &'static str {
        let sector = (((self.wind_direction_deg as f64 / 22.5) + 0.5) as usize) % 16;
        COMPASS_POINTS[sector]
    }

    /// Age of this reading relative to `now`. Zero if the clock stepped back.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Result of one acquisition attempt, after retries and cache consultation.
/// A failure with no cached reading stays visible as `Unavailable`; it is
/// never papered over with placeholder data.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Snapshot straight off the wire this cycle.
    Fresh(WeatherSnapshot),
    /// Fetch failed but a cached snapshot of the given age stands in.
    StaleFallback(WeatherSnapshot, Duration),
    /// Fetch failed and nothing cached; the tag is the failure reason
    /// (`network`, `http_status:<code>`, `schema`).
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_bearing(deg: u16) -> WeatherSnapshot {
        WeatherSnapshot {
            fetched_at: Utc::now(),
            location: "Stralsund".to_string(),
            latitude: 54.3091,
            longitude: 13.0818,
            units: Units::Metric,
            temperature: 5.0,
            apparent_temperature: 3.0,
            condition: Condition::Rain,
            humidity: 80,
            pressure_hpa: 1005.0,
            wind_speed: 4.0,
            wind_direction_deg: deg,
        }
    }

    #[test]
    fn wmo_normalization_is_total() {
        // every representable code lands inside the enumerated set
        for code in 0..=u16::MAX {
            for is_day in [true, false] {
                let c = Condition::from_wmo(code, is_day);
                assert!(Condition::ALL.contains(&c), "code {code} escaped the set");
            }
        }
    }

    #[test]
    fn wmo_known_codes() {
        assert_eq!(Condition::from_wmo(0, true), Condition::ClearDay);
        assert_eq!(Condition::from_wmo(0, false), Condition::ClearNight);
        assert_eq!(Condition::from_wmo(3, true), Condition::Cloudy3);
        assert_eq!(Condition::from_wmo(45, false), Condition::Fog);
        assert_eq!(Condition::from_wmo(61, true), Condition::Rain);
        assert_eq!(Condition::from_wmo(66, true), Condition::Mixed);
        assert_eq!(Condition::from_wmo(75, true), Condition::Snow);
        assert_eq!(Condition::from_wmo(95, true), Condition::Thunderstorm);
        assert_eq!(Condition::from_wmo(42, true), Condition::Unknown);
    }

    #[test]
    fn compass_sectors() {
        assert_eq!(snapshot_with_bearing(0).wind_compass(), "N");
        assert_eq!(snapshot_with_bearing(90).wind_compass(), "E");
        assert_eq!(snapshot_with_bearing(270).wind_compass(), "W");
        assert_eq!(snapshot_with_bearing(360).wind_compass(), "N");
        assert_eq!(snapshot_with_bearing(337).wind_compass(), "NNW");
    }

    #[test]
    fn snapshot_age() {
        let mut s = snapshot_with_bearing(0);
        s.fetched_at = Utc::now() - chrono::Duration::seconds(90);
        let age = s.age(Utc::now());
        assert!(age >= Duration::from_secs(89) && age <= Duration::from_secs(95));
        // clock stepping backwards clamps to zero
        s.fetched_at = Utc::now() + chrono::Duration::seconds(60);
        assert_eq!(s.age(Utc::now()), Duration::ZERO);
    }
}

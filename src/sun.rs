/*
 *  sun.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Day/night determination: NOAA sunrise/sunset with a fixed-hour fallback
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
//! Sunrise/sunset (NOAA method, zenith 90.833°) for the display's day/night
//! switch. Times are UTC. The cutover rule is configurable: solar by
//! default, fixed local hours otherwise or when the sun never rises/sets.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

const ZENITH_DEG: f64 = 90.833; // official sunrise/sunset, refraction included
const DEG: f64 = std::f64::consts::PI / 180.0;

/// Rule deciding whether it is "day" for icon selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DayNightPolicy {
    /// Sunrise/sunset computed for the configured coordinates.
    Solar,
    /// Fixed local-hour window, `day_start <= hour < day_end`.
    Fixed { day_start: u32, day_end: u32 },
}

impl Default for DayNightPolicy {
    fn default() -> Self {
        DayNightPolicy::Solar
    }
}

/// Fallback window when solar times are undefined (polar day/night).
const FALLBACK_DAY_START: u32 = 6;
const FALLBACK_DAY_END: u32 = 18;

#[derive(Debug, Clone)]
pub struct SunTimes {
    pub sunrise_utc: Option<DateTime<Utc>>,
    pub sunset_utc: Option<DateTime<Utc>>,
}

fn norm360(x: f64) -> f64 {
    let a = x % 360.0;
    if a < 0.0 { a + 360.0 } else { a }
}

/// One NOAA pass; `is_rise` selects the 06:00/18:00 local-solar seed.
/// Returns UT hours in [0,24), or None when the sun never crosses the
/// zenith that day.
fn event_ut_hours(lat_deg: f64, lon_deg: f64, doy: u32, is_rise: bool) -> Option<f64> {
    let lng_hour = lon_deg / 15.0;
    let seed = if is_rise { 6.0 } else { 18.0 };
    let t = doy as f64 + (seed - lng_hour) / 24.0;

    let m = 0.9856 * t - 3.289; // mean anomaly
    let l = norm360(m + 1.916 * (m * DEG).sin() + 0.020 * (2.0 * m * DEG).sin() + 282.634);

    let mut ra = norm360((0.91764 * (l * DEG).tan()).atan() / DEG);
    // keep RA in the same quadrant as L, then convert to hours
    ra += (l / 90.0).floor() * 90.0 - (ra / 90.0).floor() * 90.0;
    ra /= 15.0;

    let sin_dec = 0.39782 * (l * DEG).sin();
    let cos_dec = (1.0 - sin_dec * sin_dec).sqrt();
    let cos_h = ((ZENITH_DEG * DEG).cos() - sin_dec * (lat_deg * DEG).sin())
        / (cos_dec * (lat_deg * DEG).cos());
    if !(-1.0..=1.0).contains(&cos_h) {
        return None; // never rises or never sets at this latitude/date
    }

    let h = if is_rise {
        360.0 - cos_h.acos() / DEG
    } else {
        cos_h.acos() / DEG
    } / 15.0;

    let t_local = h + ra - 0.06571 * t - 6.622;
    Some(((t_local - lng_hour) % 24.0 + 24.0) % 24.0)
}

fn ut_hours_to_utc(date: NaiveDate, ut_hours: f64) -> DateTime<Utc> {
    let secs = (ut_hours * 3600.0).round() as i64;
    let base = NaiveDateTime::new(date, NaiveTime::from_hms_opt(0, 0, 0).expect("midnight"));
    DateTime::<Utc>::from_naive_utc_and_offset(base + chrono::Duration::seconds(secs), Utc)
}

/// Sunrise/sunset for a civil UTC date.
pub fn sun_times_for_date(lat_deg: f64, lon_deg: f64, date: NaiveDate) -> SunTimes {
    let doy = date.ordinal();
    SunTimes {
        sunrise_utc: event_ut_hours(lat_deg, lon_deg, doy, true).map(|h| ut_hours_to_utc(date, h)),
        sunset_utc: event_ut_hours(lat_deg, lon_deg, doy, false).map(|h| ut_hours_to_utc(date, h)),
    }
}

fn in_fixed_window(local_hour: u32, day_start: u32, day_end: u32) -> bool {
    if day_start <= day_end {
        (day_start..day_end).contains(&local_hour)
    } else {
        // window wraps midnight
        local_hour >= day_start || local_hour < day_end
    }
}

/// Apply the policy at `now_utc` for the given coordinates. Total: when the
/// solar pass yields no event, the fixed 06-18 window decides.
pub fn is_daytime(policy: DayNightPolicy, lat_deg: f64, lon_deg: f64, now_utc: DateTime<Utc>) -> bool {
    match policy {
        DayNightPolicy::Solar => {
            let times = sun_times_for_date(lat_deg, lon_deg, now_utc.date_naive());
            match (times.sunrise_utc, times.sunset_utc) {
                (Some(rise), Some(set)) if rise <= set => now_utc >= rise && now_utc < set,
                _ => {
                    // polar edge case: fall back to local solar hour
                    let local_hour = solar_local_hour(lon_deg, now_utc);
                    in_fixed_window(local_hour, FALLBACK_DAY_START, FALLBACK_DAY_END)
                }
            }
        }
        DayNightPolicy::Fixed { day_start, day_end } => {
            let local_hour = solar_local_hour(lon_deg, now_utc);
            in_fixed_window(local_hour, day_start, day_end)
        }
    }
}

/// Approximate local hour from longitude alone (15° per hour). Good enough
/// for a day/night switch without a timezone database.
fn solar_local_hour(lon_deg: f64, now_utc: DateTime<Utc>) -> u32 {
    let offset_hours = (lon_deg / 15.0).round() as i64;
    let local = now_utc + chrono::Duration::hours(offset_hours);
    local.hour()
}

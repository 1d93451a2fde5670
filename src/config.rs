/*
 *  config.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Layered configuration: defaults, YAML file, CLI overrides, validation
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

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::client::DEFAULT_ENDPOINT;
use crate::snapshot::{Locale, Units};
use crate::sun::DayNightPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

const DEFAULT_INTERVAL_MINS: u64 = 30;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_WIDTH: u32 = 250;
const DEFAULT_HEIGHT: u32 = 122;
const DEFAULT_JITTER_SECS: u64 = 30;
const DEFAULT_DEGRADED_THRESHOLD: u32 = 3;
const DEFAULT_FULL_REFRESH_EVERY: u32 = 10;
const DEFAULT_OUTPUT: &str = "paperwx.pbm";
const DEGRADED_INTERVAL_CAP: Duration = Duration::from_secs(2 * 3600);

/// Top-level configuration. Every field is optional so the YAML layer and
/// the CLI layer can each contribute what they have.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,
    pub location: Option<LocationConfig>,
    pub weather: Option<WeatherConfig>,
    pub display: Option<DisplayConfig>,
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocationConfig {
    /// Human-readable name rendered in the identity band.
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeatherConfig {
    pub endpoint: Option<String>,
    pub units: Option<Units>,
    pub update_interval_mins: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    /// Retry attempts per fetch before the cycle gives up.
    pub retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub rotate_deg: Option<u16>,
    pub locale: Option<Locale>,
    pub sink: Option<SinkKind>,
    /// Target path for the file sink.
    pub output: Option<PathBuf>,
    /// Directory of `<condition>.bin` icon files; built-ins when absent.
    pub assets_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    pub jitter_secs: Option<u64>,
    pub degraded_threshold: Option<u32>,
    pub degraded_interval_mins: Option<u64>,
    pub full_refresh_every: Option<u32>,
    pub stale_after_mins: Option<u64>,
    pub day_night: Option<DayNightPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// PBM file, the development and headless default.
    File,
    /// In-memory recording sink, for dry runs.
    Mock,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "paperwx", about = "Weather on an e-paper panel", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub location_name: Option<String>,
    #[arg(long)]
    pub latitude: Option<f64>,
    #[arg(long)]
    pub longitude: Option<f64>,
    /// "metric" or "imperial"
    #[arg(long)]
    pub units: Option<String>,
    #[arg(long)]
    pub update_interval_mins: Option<u64>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(long)]
    pub display_rotate_deg: Option<u16>,
    /// "en" or "de"
    #[arg(long)]
    pub locale: Option<String>,
    /// File-sink output path
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub assets_dir: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    load_with_cli(cli)
}

pub fn load_with_cli(cli: Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, &cli)?;

    // 4) Validate
    validate(&cfg)?;

    if cli.dump_config {
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/paperwx/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/paperwx/config.yaml");
        if p.exists() {
            return Some(p);
        }
        let p = home.join(".config/paperwx.yaml");
        if p.exists() {
            return Some(p);
        }
    }
    // project local
    for candidate in &["paperwx.yaml", "config.yaml", "config/paperwx.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() {
        dst.log_level = src.log_level;
    }
    merge_group(&mut dst.location, src.location, merge_location);
    merge_group(&mut dst.weather, src.weather, merge_weather);
    merge_group(&mut dst.display, src.display, merge_display);
    merge_group(&mut dst.schedule, src.schedule, merge_schedule);
}

fn merge_group<T>(dst: &mut Option<T>, src: Option<T>, merge_fields: fn(&mut T, T)) {
    match (dst.as_mut(), src) {
        (None, Some(s)) => *dst = Some(s),
        (Some(d), Some(s)) => merge_fields(d, s),
        _ => {}
    }
}

fn merge_location(dst: &mut LocationConfig, src: LocationConfig) {
    if src.name.is_some() {
        dst.name = src.name;
    }
    if src.latitude.is_some() {
        dst.latitude = src.latitude;
    }
    if src.longitude.is_some() {
        dst.longitude = src.longitude;
    }
}

fn merge_weather(dst: &mut WeatherConfig, src: WeatherConfig) {
    if src.endpoint.is_some() {
        dst.endpoint = src.endpoint;
    }
    if src.units.is_some() {
        dst.units = src.units;
    }
    if src.update_interval_mins.is_some() {
        dst.update_interval_mins = src.update_interval_mins;
    }
    if src.timeout_secs.is_some() {
        dst.timeout_secs = src.timeout_secs;
    }
    if src.connect_timeout_secs.is_some() {
        dst.connect_timeout_secs = src.connect_timeout_secs;
    }
    if src.retries.is_some() {
        dst.retries = src.retries;
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.width.is_some() {
        dst.width = src.width;
    }
    if src.height.is_some() {
        dst.height = src.height;
    }
    if src.rotate_deg.is_some() {
        dst.rotate_deg = src.rotate_deg;
    }
    if src.locale.is_some() {
        dst.locale = src.locale;
    }
    if src.sink.is_some() {
        dst.sink = src.sink;
    }
    if src.output.is_some() {
        dst.output = src.output;
    }
    if src.assets_dir.is_some() {
        dst.assets_dir = src.assets_dir;
    }
}

fn merge_schedule(dst: &mut ScheduleConfig, src: ScheduleConfig) {
    if src.jitter_secs.is_some() {
        dst.jitter_secs = src.jitter_secs;
    }
    if src.degraded_threshold.is_some() {
        dst.degraded_threshold = src.degraded_threshold;
    }
    if src.degraded_interval_mins.is_some() {
        dst.degraded_interval_mins = src.degraded_interval_mins;
    }
    if src.full_refresh_every.is_some() {
        dst.full_refresh_every = src.full_refresh_every;
    }
    if src.stale_after_mins.is_some() {
        dst.stale_after_mins = src.stale_after_mins;
    }
    if src.day_night.is_some() {
        dst.day_night = src.day_night;
    }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) -> Result<(), ConfigError> {
    if cli.log_level.is_some() {
        cfg.log_level = cli.log_level.clone();
    }

    if cli.location_name.is_some() || cli.latitude.is_some() || cli.longitude.is_some() {
        let location = cfg.location.get_or_insert_with(LocationConfig::default);
        if cli.location_name.is_some() {
            location.name = cli.location_name.clone();
        }
        if cli.latitude.is_some() {
            location.latitude = cli.latitude;
        }
        if cli.longitude.is_some() {
            location.longitude = cli.longitude;
        }
    }

    if cli.units.is_some() || cli.update_interval_mins.is_some() {
        let weather = cfg.weather.get_or_insert_with(WeatherConfig::default);
        if let Some(units) = cli.units.as_deref() {
            weather.units = Some(match units {
                "metric" => Units::Metric,
                "imperial" => Units::Imperial,
                other => {
                    return Err(ConfigError::Validation(format!(
                        "units must be metric|imperial, got '{other}'"
                    )));
                }
            });
        }
        if cli.update_interval_mins.is_some() {
            weather.update_interval_mins = cli.update_interval_mins;
        }
    }

    let any_display = cli.display_width.is_some()
        || cli.display_height.is_some()
        || cli.display_rotate_deg.is_some()
        || cli.locale.is_some()
        || cli.output.is_some()
        || cli.assets_dir.is_some();
    if any_display {
        let display = cfg.display.get_or_insert_with(DisplayConfig::default);
        if cli.display_width.is_some() {
            display.width = cli.display_width;
        }
        if cli.display_height.is_some() {
            display.height = cli.display_height;
        }
        if cli.display_rotate_deg.is_some() {
            display.rotate_deg = cli.display_rotate_deg;
        }
        if let Some(locale) = cli.locale.as_deref() {
            display.locale = Some(match locale {
                "en" => Locale::En,
                "de" => Locale::De,
                other => {
                    return Err(ConfigError::Validation(format!(
                        "locale must be en|de, got '{other}'"
                    )));
                }
            });
        }
        if cli.output.is_some() {
            display.output = cli.output.clone();
        }
        if cli.assets_dir.is_some() {
            display.assets_dir = cli.assets_dir.clone();
        }
    }
    Ok(())
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let location = cfg
        .location
        .as_ref()
        .ok_or_else(|| ConfigError::Validation("location is required".into()))?;
    match (location.latitude, location.longitude) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ConfigError::Validation(
                    "location latitude must be -90..=90".into(),
                ));
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err(ConfigError::Validation(
                    "location longitude must be -180..=180".into(),
                ));
            }
        }
        _ => {
            return Err(ConfigError::Validation(
                "location latitude and longitude are required".into(),
            ));
        }
    }

    if let Some(weather) = cfg.weather.as_ref() {
        if weather.update_interval_mins == Some(0) {
            return Err(ConfigError::Validation(
                "weather update_interval_mins must be > 0".into(),
            ));
        }
        if weather.retries == Some(0) {
            return Err(ConfigError::Validation("weather retries must be > 0".into()));
        }
    }

    if let Some(display) = cfg.display.as_ref() {
        if let (Some(w), Some(h)) = (display.width, display.height) {
            if w == 0 || h == 0 {
                return Err(ConfigError::Validation(
                    "display width/height must be > 0".into(),
                ));
            }
        }
        if let Some(rot) = display.rotate_deg {
            match rot {
                0 | 90 | 180 | 270 => {}
                _ => {
                    return Err(ConfigError::Validation(
                        "display rotate_deg must be 0|90|180|270".into(),
                    ));
                }
            }
        }
    }

    if let Some(schedule) = cfg.schedule.as_ref() {
        if schedule.degraded_threshold == Some(0) {
            return Err(ConfigError::Validation(
                "schedule degraded_threshold must be > 0".into(),
            ));
        }
        if let Some(DayNightPolicy::Fixed { day_start, day_end }) = schedule.day_night {
            if day_start > 23 || day_end > 23 {
                return Err(ConfigError::Validation(
                    "day_night hours must be 0..=23".into(),
                ));
            }
        }
    }
    Ok(())
}

/// Resolved accessors: merged value or the documented default.
impl Config {
    pub fn location_name(&self) -> String {
        self.location
            .as_ref()
            .and_then(|l| l.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Validated to exist before use.
    pub fn coordinates(&self) -> (f64, f64) {
        let location = self.location.as_ref();
        (
            location.and_then(|l| l.latitude).unwrap_or(0.0),
            location.and_then(|l| l.longitude).unwrap_or(0.0),
        )
    }

    pub fn endpoint(&self) -> String {
        self.weather
            .as_ref()
            .and_then(|w| w.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    pub fn units(&self) -> Units {
        self.weather.as_ref().and_then(|w| w.units).unwrap_or_default()
    }

    pub fn update_interval(&self) -> Duration {
        let mins = self
            .weather
            .as_ref()
            .and_then(|w| w.update_interval_mins)
            .unwrap_or(DEFAULT_INTERVAL_MINS);
        Duration::from_secs(mins * 60)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.weather
                .as_ref()
                .and_then(|w| w.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.weather
                .as_ref()
                .and_then(|w| w.connect_timeout_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    pub fn retries(&self) -> u32 {
        self.weather
            .as_ref()
            .and_then(|w| w.retries)
            .unwrap_or(DEFAULT_RETRIES)
    }

    pub fn display_size(&self) -> (u32, u32) {
        let display = self.display.as_ref();
        (
            display.and_then(|d| d.width).unwrap_or(DEFAULT_WIDTH),
            display.and_then(|d| d.height).unwrap_or(DEFAULT_HEIGHT),
        )
    }

    pub fn rotation(&self) -> u16 {
        self.display.as_ref().and_then(|d| d.rotate_deg).unwrap_or(0)
    }

    pub fn locale(&self) -> Locale {
        self.display.as_ref().and_then(|d| d.locale).unwrap_or_default()
    }

    pub fn sink_kind(&self) -> SinkKind {
        self.display
            .as_ref()
            .and_then(|d| d.sink)
            .unwrap_or(SinkKind::File)
    }

    pub fn output_path(&self) -> PathBuf {
        self.display
            .as_ref()
            .and_then(|d| d.output.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }

    pub fn assets_dir(&self) -> Option<PathBuf> {
        self.display.as_ref().and_then(|d| d.assets_dir.clone())
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(
            self.schedule
                .as_ref()
                .and_then(|s| s.jitter_secs)
                .unwrap_or(DEFAULT_JITTER_SECS),
        )
    }

    pub fn degraded_threshold(&self) -> u32 {
        self.schedule
            .as_ref()
            .and_then(|s| s.degraded_threshold)
            .unwrap_or(DEFAULT_DEGRADED_THRESHOLD)
    }

    /// Default: 4x the update interval, capped at two hours.
    pub fn degraded_interval(&self) -> Duration {
        match self.schedule.as_ref().and_then(|s| s.degraded_interval_mins) {
            Some(mins) => Duration::from_secs(mins * 60),
            None => (self.update_interval() * 4).min(DEGRADED_INTERVAL_CAP),
        }
    }

    pub fn full_refresh_every(&self) -> u32 {
        self.schedule
            .as_ref()
            .and_then(|s| s.full_refresh_every)
            .unwrap_or(DEFAULT_FULL_REFRESH_EVERY)
    }

    /// Default: 3x the update interval.
    pub fn stale_after(&self) -> Duration {
        match self.schedule.as_ref().and_then(|s| s.stale_after_mins) {
            Some(mins) => Duration::from_secs(mins * 60),
            None => self.update_interval() * 3,
        }
    }

    pub fn day_night(&self) -> DayNightPolicy {
        self.schedule
            .as_ref()
            .and_then(|s| s.day_night)
            .unwrap_or_default()
    }
}

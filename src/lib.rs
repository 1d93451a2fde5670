/*
 *  lib.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Library root: the weather-to-panel pipeline
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
//! Fetch current weather, compose a 1-bit frame, push it to an e-paper
//! panel (or a file), forever. The pipeline is one directional flow:
//! client -> cache fallback -> layout -> sink, driven by the scheduler.

pub mod assets;
pub mod cache;
pub mod client;
pub mod config;
pub mod frame;
pub mod layout;
pub mod retry;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod sun;

pub use client::{FetchError, WeatherClient, WeatherSource};
pub use frame::Frame;
pub use layout::{LayoutEngine, RenderContext};
pub use scheduler::{SchedulerConfig, SchedulerState, UpdateScheduler};
pub use sink::{DisplaySink, FileSink, MockSink, RefreshMode, SinkError};
pub use snapshot::{Condition, FetchOutcome, Locale, Units, WeatherSnapshot};

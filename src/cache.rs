/*
 *  cache.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Single-slot last-known-good snapshot cache
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
use std::time::Duration;

use crate::snapshot::WeatherSnapshot;

/// Holds the most recent successfully fetched snapshot. One slot,
/// last-write-wins, replaced whole so a reader never sees a partial value.
/// No TTL here: staleness is a presentation decision made upstream, because
/// on an isolated device an old reading beats no reading.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slot: Option<WeatherSnapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self { slot: None }
    }

    pub fn put(&mut self, snapshot: WeatherSnapshot) {
        self.slot = Some(snapshot);
    }

    pub fn get(&self) -> Option<&WeatherSnapshot> {
        self.slot.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Age of the cached reading, if any.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.slot.as_ref().map(|s| s.age(now))
    }
}

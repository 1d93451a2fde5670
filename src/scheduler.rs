/*
 *  scheduler.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Update loop: tick, fetch, fall back, render, show, escalate, recover
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
//! One logical task owns the whole pipeline; there is no shared mutable
//! state to lock. A cycle is fetch -> (cache fallback) -> render -> show.
//! Repeated full-cycle failures move the loop into Degraded, which only
//! stretches the tick interval; the next fully successful cycle heals it.

use std::time::Duration;

use chrono::{Local, Utc};
use log::{debug, error, info, warn};
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

use crate::cache::SnapshotCache;
use crate::client::WeatherSource;
use crate::layout::{LayoutEngine, RenderContext};
use crate::sink::{DisplaySink, RefreshMode};
use crate::snapshot::{FetchOutcome, Locale};
use crate::sun::{self, DayNightPolicy};

/// Pipeline phase, advanced cycle by cycle. `Degraded` replaces `Idle`
/// between cycles once the failure threshold is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Fetching,
    Rendering,
    Displaying,
    Degraded,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Upper bound of the random delay added to each tick.
    pub jitter_max: Duration,
    /// Consecutive full-cycle failures before entering Degraded.
    pub degraded_threshold: u32,
    pub degraded_interval: Duration,
    /// Request a full panel refresh every this many shown frames; the first
    /// frame is always full.
    pub full_refresh_every: u32,
    /// Cached snapshots older than this render with a staleness marker.
    pub stale_after: Duration,
    pub latitude: f64,
    pub longitude: f64,
    pub locale: Locale,
    pub rotation: u16,
    pub width: u32,
    pub height: u32,
    pub day_night: DayNightPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let interval = Duration::from_secs(30 * 60);
        Self {
            interval,
            jitter_max: Duration::from_secs(30),
            degraded_threshold: 3,
            degraded_interval: (interval * 4).min(Duration::from_secs(2 * 3600)),
            full_refresh_every: 10,
            stale_after: interval * 3,
            latitude: 0.0,
            longitude: 0.0,
            locale: Locale::default(),
            rotation: 0,
            width: 250,
            height: 122,
            day_night: DayNightPolicy::default(),
        }
    }
}

/// What a single cycle did, broadcast on the watch channel after each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fresh snapshot fetched, rendered and shown.
    FreshShown,
    /// Fetch failed, cached snapshot rendered and shown.
    StaleShown,
    /// Fetch failed with an empty cache; the one-time error frame went out.
    ErrorShown,
    /// Fetch failed with an empty cache and the panel already shows
    /// something; nothing rendered.
    Skipped,
    /// A frame was composed but the sink rejected it.
    SinkFailed,
}

#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub consecutive_failures: u32,
    pub degraded: bool,
}

/// The control loop. Owns the source, the layout engine, the sink and the
/// cache; nothing else writes to any of them.
pub struct UpdateScheduler<S: WeatherSource> {
    source: S,
    layout: LayoutEngine,
    sink: Box<dyn DisplaySink>,
    cache: SnapshotCache,
    cfg: SchedulerConfig,
    state: SchedulerState,
    consecutive_failures: u32,
    /// Weather frames only; the error frame never advances this.
    weather_frames_shown: u64,
    error_frame_shown: bool,
    report_tx: watch::Sender<Option<CycleReport>>,
}

impl<S: WeatherSource> UpdateScheduler<S> {
    pub fn new(
        source: S,
        layout: LayoutEngine,
        sink: Box<dyn DisplaySink>,
        cfg: SchedulerConfig,
    ) -> Self {
        let (report_tx, _) = watch::channel(None);
        Self {
            source,
            layout,
            sink,
            cache: SnapshotCache::new(),
            cfg,
            state: SchedulerState::Idle,
            consecutive_failures: 0,
            weather_frames_shown: 0,
            error_frame_shown: false,
            report_tx,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Latest cycle report; `None` until the first cycle completes.
    pub fn subscribe(&self) -> watch::Receiver<Option<CycleReport>> {
        self.report_tx.subscribe()
    }

    fn is_degraded(&self) -> bool {
        self.state == SchedulerState::Degraded
    }

    fn render_context(&self, stale_age: Option<Duration>) -> RenderContext {
        let now_utc = Utc::now();
        // marker only once the reading is genuinely old
        let stale_age = stale_age.filter(|age| *age >= self.cfg.stale_after);
        RenderContext {
            now: Local::now(),
            is_daytime: sun::is_daytime(
                self.cfg.day_night,
                self.cfg.latitude,
                self.cfg.longitude,
                now_utc,
            ),
            width: self.cfg.width,
            height: self.cfg.height,
            rotation: self.cfg.rotation,
            locale: self.cfg.locale,
            stale_age,
        }
    }

    fn next_refresh_mode(&self) -> RefreshMode {
        if self.weather_frames_shown == 0 {
            RefreshMode::Full
        } else if self.cfg.full_refresh_every > 0
            && self.weather_frames_shown % self.cfg.full_refresh_every as u64 == 0
        {
            RefreshMode::Full
        } else {
            RefreshMode::Partial
        }
    }

    /// Push one frame to the sink. Callers count what was shown; this only
    /// picks the refresh mode and reports the sink verdict.
    fn show(&mut self, frame: &crate::frame::Frame) -> bool {
        self.state = SchedulerState::Displaying;
        let mode = self.next_refresh_mode();
        match self.sink.show(frame, mode) {
            Ok(()) => {
                debug!("frame shown ({mode:?})");
                true
            }
            Err(e) => {
                error!("display failed: {e}");
                false
            }
        }
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.cfg.degraded_threshold && !self.is_degraded() {
            warn!(
                "{} consecutive cycle failures, entering degraded mode (interval {:?})",
                self.consecutive_failures, self.cfg.degraded_interval
            );
            self.state = SchedulerState::Degraded;
        } else if !self.is_degraded() {
            self.state = SchedulerState::Idle;
        }
    }

    fn record_success(&mut self) {
        if self.is_degraded() {
            info!(
                "recovered after {} failed cycles, resuming normal interval",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.state = SchedulerState::Idle;
    }

    /// One full pipeline pass. Public so tests can drive the scheduler
    /// without the timer.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let was_degraded = self.is_degraded();
        self.state = SchedulerState::Fetching;
        let fetched = self.source.fetch().await;

        // upgrade a failed fetch to a cache fallback when possible; the
        // source never sees the cache
        let outcome = match fetched {
            FetchOutcome::Unavailable(reason) => match self.cache.get() {
                Some(snapshot) => {
                    let age = snapshot.age(Utc::now());
                    warn!(
                        "fetch failed ({reason}), falling back to cached snapshot ({}s old)",
                        age.as_secs()
                    );
                    FetchOutcome::StaleFallback(snapshot.clone(), age)
                }
                None => FetchOutcome::Unavailable(reason),
            },
            other => other,
        };

        let cycle = match outcome {
            FetchOutcome::Fresh(snapshot) => {
                info!(
                    "fresh snapshot: {} {:.1}{} {}",
                    snapshot.location,
                    snapshot.temperature,
                    snapshot.units.temperature_suffix(),
                    snapshot.condition.slug()
                );
                self.cache.put(snapshot.clone());
                self.state = SchedulerState::Rendering;
                let frame = self.layout.render(&snapshot, &self.render_context(None));
                if self.show(&frame) {
                    self.weather_frames_shown += 1;
                    self.record_success();
                    CycleOutcome::FreshShown
                } else {
                    self.record_failure();
                    CycleOutcome::SinkFailed
                }
            }
            FetchOutcome::StaleFallback(snapshot, age) => {
                self.state = SchedulerState::Rendering;
                let frame = self
                    .layout
                    .render(&snapshot, &self.render_context(Some(age)));
                if self.show(&frame) {
                    self.weather_frames_shown += 1;
                    // a fallback cycle is not a full failure, but it does
                    // not heal a degraded loop either
                    if !self.is_degraded() {
                        self.state = SchedulerState::Idle;
                    }
                    CycleOutcome::StaleShown
                } else {
                    self.record_failure();
                    CycleOutcome::SinkFailed
                }
            }
            FetchOutcome::Unavailable(reason) => {
                error!("cycle failed with empty cache: {reason}");
                let cycle = if self.weather_frames_shown == 0 && !self.error_frame_shown {
                    // never leave a blank panel: one error frame, once
                    self.state = SchedulerState::Rendering;
                    let frame = self
                        .layout
                        .render_error_frame(&reason, &self.render_context(None));
                    if self.show(&frame) {
                        self.error_frame_shown = true;
                        CycleOutcome::ErrorShown
                    } else {
                        CycleOutcome::SinkFailed
                    }
                } else {
                    CycleOutcome::Skipped
                };
                self.record_failure();
                cycle
            }
        };

        if was_degraded != self.is_degraded() {
            debug!("scheduler state now {:?}", self.state);
        }

        let report = CycleReport {
            outcome: cycle,
            consecutive_failures: self.consecutive_failures,
            degraded: self.is_degraded(),
        };
        let _ = self.report_tx.send(Some(report));
        report
    }

    fn tick_interval(&self) -> Duration {
        let base = if self.is_degraded() {
            self.cfg.degraded_interval
        } else {
            self.cfg.interval
        };
        let jitter_ms = self.cfg.jitter_max.as_millis() as u64;
        if jitter_ms == 0 {
            base
        } else {
            base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        }
    }

    /// Run until the stop channel fires. The first cycle runs immediately;
    /// shutdown is only observed between cycles, never mid-pipeline.
    pub async fn run(&mut self, mut stop_rx: mpsc::Receiver<()>) {
        info!(
            "scheduler running: interval {:?}, degraded {:?} after {} failures",
            self.cfg.interval, self.cfg.degraded_interval, self.cfg.degraded_threshold
        );
        self.run_cycle().await;
        loop {
            let pause = self.tick_interval();
            tokio::select! {
                _ = sleep(pause) => {
                    self.run_cycle().await;
                }
                _ = stop_rx.recv() => {
                    info!("scheduler stopping");
                    break;
                }
            }
        }
    }
}

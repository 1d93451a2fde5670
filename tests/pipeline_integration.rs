/*
 *  pipeline_integration.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  End-to-end pipeline tests against the mock sink
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

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use paperwx::assets::AssetResolver;
use paperwx::scheduler::{CycleOutcome, SchedulerConfig, SchedulerState, UpdateScheduler};
use paperwx::sink::{MockSink, MockSinkState, RefreshMode};
use paperwx::{
    Condition, FetchOutcome, LayoutEngine, Units, WeatherSnapshot, WeatherSource,
};

struct ScriptedSource {
    script: VecDeque<FetchOutcome>,
}

impl ScriptedSource {
    fn new(script: impl IntoIterator<Item = FetchOutcome>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl WeatherSource for ScriptedSource {
    async fn fetch(&mut self) -> FetchOutcome {
        self.script
            .pop_front()
            .unwrap_or_else(|| FetchOutcome::Unavailable("script exhausted".to_string()))
    }
}

fn snapshot(temp: f64, condition: Condition) -> WeatherSnapshot {
    WeatherSnapshot {
        fetched_at: Utc::now(),
        location: "Stralsund".to_string(),
        latitude: 54.3091,
        longitude: 13.0818,
        units: Units::Metric,
        temperature: temp,
        apparent_temperature: temp - 2.0,
        condition,
        humidity: 80,
        pressure_hpa: 1005.0,
        wind_speed: 4.0,
        wind_direction_deg: 270,
    }
}

fn fresh(temp: f64) -> FetchOutcome {
    FetchOutcome::Fresh(snapshot(temp, Condition::Rain))
}

fn unavailable() -> FetchOutcome {
    FetchOutcome::Unavailable("network".to_string())
}

fn pipeline(
    script: impl IntoIterator<Item = FetchOutcome>,
    tweak: impl FnOnce(&mut SchedulerConfig),
) -> (UpdateScheduler<ScriptedSource>, Arc<Mutex<MockSinkState>>) {
    let sink = MockSink::new(250, 122);
    let state = sink.state();
    let mut cfg = SchedulerConfig {
        jitter_max: Duration::ZERO,
        ..SchedulerConfig::default()
    };
    tweak(&mut cfg);
    let scheduler = UpdateScheduler::new(
        ScriptedSource::new(script),
        LayoutEngine::new(AssetResolver::builtin_only()),
        Box::new(sink),
        cfg,
    );
    (scheduler, state)
}

#[tokio::test]
async fn happy_path_puts_weather_on_the_panel() {
    let (mut scheduler, sink) = pipeline([fresh(5.0)], |_| {});
    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::FreshShown);
    let sink = sink.lock().unwrap();
    assert_eq!(sink.show_count, 1);
    assert_eq!(sink.refresh_modes, vec![RefreshMode::Full]);
    let frame = sink.last_frame.as_ref().unwrap();
    assert_eq!((frame.width(), frame.height()), (250, 122));
    assert!(frame.count_on_pixels() > 0);
}

#[tokio::test]
async fn outage_after_one_success_keeps_showing_cached_weather() {
    let (mut scheduler, sink) = pipeline(
        [fresh(5.0), unavailable(), unavailable(), unavailable()],
        |_| {},
    );
    for _ in 0..4 {
        scheduler.run_cycle().await;
    }
    // every outage cycle still produced a frame from the cache
    assert_eq!(sink.lock().unwrap().show_count, 4);
    assert_eq!(scheduler.consecutive_failures(), 0);
    assert_ne!(scheduler.state(), SchedulerState::Degraded);
}

#[tokio::test]
async fn stale_frames_differ_from_fresh_ones_once_old_enough() {
    // stale_after zero: any cached age counts as stale
    let (mut scheduler, sink) = pipeline([fresh(5.0), unavailable()], |cfg| {
        cfg.stale_after = Duration::ZERO;
    });
    scheduler.run_cycle().await;
    let fresh_frame = sink.lock().unwrap().last_frame.clone().unwrap();
    let report = scheduler.run_cycle().await;
    assert_eq!(report.outcome, CycleOutcome::StaleShown);
    let stale_frame = sink.lock().unwrap().last_frame.clone().unwrap();
    // the header marker is the visible difference
    assert_ne!(fresh_frame, stale_frame);
}

#[tokio::test]
async fn cold_start_outage_escalates_and_heals() {
    let (mut scheduler, sink) = pipeline(
        [unavailable(), unavailable(), unavailable(), fresh(5.0)],
        |cfg| cfg.degraded_threshold = 3,
    );

    let first = scheduler.run_cycle().await;
    assert_eq!(first.outcome, CycleOutcome::ErrorShown);

    scheduler.run_cycle().await;
    let third = scheduler.run_cycle().await;
    assert_eq!(third.outcome, CycleOutcome::Skipped);
    assert!(third.degraded);
    // one error frame, nothing else while dark
    assert_eq!(sink.lock().unwrap().show_count, 1);

    let healed = scheduler.run_cycle().await;
    assert_eq!(healed.outcome, CycleOutcome::FreshShown);
    assert!(!healed.degraded);
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(sink.lock().unwrap().show_count, 2);
}

#[tokio::test]
async fn refresh_modes_follow_the_configured_cadence() {
    let (mut scheduler, sink) = pipeline(
        (0..6).map(|i| fresh(i as f64)).collect::<Vec<_>>(),
        |cfg| cfg.full_refresh_every = 3,
    );
    for _ in 0..6 {
        scheduler.run_cycle().await;
    }
    let modes = sink.lock().unwrap().refresh_modes.clone();
    assert_eq!(
        modes,
        vec![
            RefreshMode::Full,
            RefreshMode::Partial,
            RefreshMode::Partial,
            RefreshMode::Full,
            RefreshMode::Partial,
            RefreshMode::Partial,
        ]
    );
}

#[tokio::test]
async fn watch_channel_reports_each_cycle() {
    let (mut scheduler, _) = pipeline([fresh(5.0), unavailable()], |_| {});
    let mut rx = scheduler.subscribe();
    assert!(rx.borrow().is_none());

    scheduler.run_cycle().await;
    let report = (*rx.borrow_and_update()).expect("report after first cycle");
    assert_eq!(report.outcome, CycleOutcome::FreshShown);

    scheduler.run_cycle().await;
    let report = (*rx.borrow_and_update()).expect("report after second cycle");
    assert_eq!(report.outcome, CycleOutcome::StaleShown);
}

#[tokio::test]
async fn run_loop_stops_on_channel_close() {
    let (mut scheduler, sink) = pipeline([fresh(5.0)], |cfg| {
        cfg.interval = Duration::from_secs(3600);
    });
    let (stop_tx, stop_rx) = tokio::sync::mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        scheduler.run(stop_rx).await;
    });
    // first cycle fires immediately; give it a moment, then stop
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert_eq!(sink.lock().unwrap().show_count, 1);
}

#[tokio::test]
async fn sink_fault_feeds_the_failure_counter() {
    let sink = MockSink::new(250, 122);
    let state = sink.state();
    sink.set_simulate_failure(true);
    let cfg = SchedulerConfig {
        jitter_max: Duration::ZERO,
        degraded_threshold: 2,
        ..SchedulerConfig::default()
    };
    let mut scheduler = UpdateScheduler::new(
        ScriptedSource::new([fresh(5.0), fresh(6.0), fresh(7.0)]),
        LayoutEngine::new(AssetResolver::builtin_only()),
        Box::new(sink),
        cfg,
    );

    scheduler.run_cycle().await;
    let second = scheduler.run_cycle().await;
    assert_eq!(second.outcome, CycleOutcome::SinkFailed);
    assert!(second.degraded);
    assert_eq!(state.lock().unwrap().show_count, 0);

    // hardware comes back; next fresh cycle heals the loop
    state.lock().unwrap().simulate_failure = false;
    let healed = scheduler.run_cycle().await;
    assert_eq!(healed.outcome, CycleOutcome::FreshShown);
    assert!(!healed.degraded);
}

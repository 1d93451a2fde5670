/*
 *  main.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Binary entry point: wire config, client, layout and sink together
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

use anyhow::Context;
use env_logger::Env;
use log::info;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use paperwx::assets::AssetResolver;
use paperwx::client::{Place, WeatherClient};
use paperwx::config::{self, SinkKind};
use paperwx::layout::LayoutEngine;
use paperwx::retry::RetryPolicy;
use paperwx::scheduler::{SchedulerConfig, UpdateScheduler};
use paperwx::sink::{DisplaySink, FileSink, MockSink};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP; any of them means shut down.
async fn signal_handler() -> anyhow::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load().context("loading configuration")?;

    let filter = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(filter)).init();

    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let (latitude, longitude) = cfg.coordinates();
    let place = Place {
        name: cfg.location_name(),
        latitude,
        longitude,
    };
    info!("location {} ({:.4}, {:.4})", place.name, latitude, longitude);

    let client = WeatherClient::new(
        cfg.endpoint(),
        place,
        cfg.units(),
        cfg.timeout(),
        cfg.connect_timeout(),
        RetryPolicy::with_attempts(cfg.retries()),
    )
    .context("building weather client")?;

    let resolver = match cfg.assets_dir() {
        Some(dir) => AssetResolver::with_icon_dir(&dir),
        None => AssetResolver::builtin_only(),
    };
    let layout = LayoutEngine::new(resolver);

    let (width, height) = cfg.display_size();
    // the sink receives post-rotation frames
    let (sink_w, sink_h) = match cfg.rotation() {
        90 | 270 => (height, width),
        _ => (width, height),
    };
    let sink: Box<dyn DisplaySink> = match cfg.sink_kind() {
        SinkKind::File => {
            let path = cfg.output_path();
            info!("file sink -> {}", path.display());
            Box::new(FileSink::new(path, sink_w, sink_h))
        }
        SinkKind::Mock => Box::new(MockSink::new(sink_w, sink_h)),
    };

    let sched_cfg = SchedulerConfig {
        interval: cfg.update_interval(),
        jitter_max: cfg.jitter(),
        degraded_threshold: cfg.degraded_threshold(),
        degraded_interval: cfg.degraded_interval(),
        full_refresh_every: cfg.full_refresh_every(),
        stale_after: cfg.stale_after(),
        latitude,
        longitude,
        locale: cfg.locale(),
        rotation: cfg.rotation(),
        width,
        height,
        day_night: cfg.day_night(),
    };

    let mut scheduler = UpdateScheduler::new(client, layout, sink, sched_cfg);
    let (stop_tx, stop_rx) = mpsc::channel::<()>(1);

    let pipeline = tokio::spawn(async move {
        scheduler.run(stop_rx).await;
    });

    signal_handler().await?;
    let _ = stop_tx.send(()).await;
    pipeline.await.context("pipeline task panicked")?;

    info!("shutdown complete");
    Ok(())
}

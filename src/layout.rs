/*
 *  layout.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Frame composition: pure function of (snapshot, context) -> bitmap
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

use chrono::{DateTime, Datelike, Local};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use std::time::Duration;

use crate::assets::{AssetResolver, FontHandle, FontRole, FontWeight};
use crate::frame::Frame;
use crate::snapshot::{Locale, WeatherSnapshot};

/// Everything the layout needs besides the snapshot itself. Ephemeral,
/// rebuilt each cycle; rendering never samples the clock on its own, so
/// identical contexts produce byte-identical frames.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub now: DateTime<Local>,
    pub is_daytime: bool,
    pub width: u32,
    pub height: u32,
    /// Quarter-turn rotation applied after composition.
    pub rotation: u16,
    pub locale: Locale,
    /// Set when the snapshot came out of the cache; renders a marker.
    pub stale_age: Option<Duration>,
}

impl RenderContext {
    /// Landscape 2.13" panel, the deployment default.
    pub fn with_defaults(now: DateTime<Local>, is_daytime: bool) -> Self {
        Self {
            now,
            is_daytime,
            width: 250,
            height: 122,
            rotation: 0,
            locale: Locale::default(),
            stale_age: None,
        }
    }
}

const MARGIN: i32 = 4;
const DETAIL_PANEL_WIDTH: u32 = 116;

struct Labels {
    humidity: &'static str,
    pressure: &'static str,
    wind: &'static str,
    direction: &'static str,
    no_data: &'static str,
    feels_like: &'static str,
    weekdays: [&'static str; 7],
}

const LABELS_EN: Labels = Labels {
    humidity: "Humidity",
    pressure: "Pressure",
    wind: "Wind",
    direction: "Dir",
    no_data: "No weather data",
    feels_like: "feels",
    weekdays: ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
};

const LABELS_DE: Labels = Labels {
    humidity: "Luftfeuchte",
    pressure: "Luftdruck",
    wind: "Wind",
    direction: "Richtung",
    no_data: "Keine Wetterdaten",
    feels_like: "gefühlt",
    weekdays: ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"],
};

fn labels(locale: Locale) -> &'static Labels {
    match locale {
        Locale::En => &LABELS_EN,
        Locale::De => &LABELS_DE,
    }
}

/// Whole degrees with a degree sign, no unit letter; "--°" for a value the
/// snapshot invariant should have kept out.
fn format_temperature(value: f64) -> String {
    if value.is_finite() {
        format!("{:.0}°", value)
    } else {
        "--°".to_string()
    }
}

fn format_float(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}")
    } else {
        "--".to_string()
    }
}

fn format_age(age: Duration) -> String {
    let mins = age.as_secs() / 60;
    if mins >= 60 {
        format!("+{}h{:02}m", mins / 60, mins % 60)
    } else {
        format!("+{mins}m")
    }
}

/// Composes display frames from snapshots. Pure and deterministic; all
/// asset lookups go through the resolver's total fallback chains, so
/// composition itself cannot fail.
pub struct LayoutEngine {
    resolver: AssetResolver,
}

impl LayoutEngine {
    pub fn new(resolver: AssetResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    /// Render one weather frame.
    pub fn render(&self, snapshot: &WeatherSnapshot, ctx: &RenderContext) -> Frame {
        let mut frame = Frame::new(ctx.width, ctx.height);
        match self.compose(&mut frame, snapshot, ctx) {
            Ok(()) => {}
            Err(e) => match e {}, // Infallible
        }
        if ctx.rotation != 0 {
            frame.rotated(ctx.rotation)
        } else {
            frame
        }
    }

    /// Distinct placeholder frame for the only case that earns one: retries
    /// exhausted, cache empty, and nothing ever shown before.
    pub fn render_error_frame(&self, reason: &str, ctx: &RenderContext) -> Frame {
        let mut frame = Frame::new(ctx.width, ctx.height);
        match self.compose_error(&mut frame, reason, ctx) {
            Ok(()) => {}
            Err(e) => match e {},
        }
        if ctx.rotation != 0 {
            frame.rotated(ctx.rotation)
        } else {
            frame
        }
    }

    fn compose<D>(&self, target: &mut D, snapshot: &WeatherSnapshot, ctx: &RenderContext)
        -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let caption = self.resolver.font_for(FontRole::Caption, FontWeight::Regular);
        let body = self.resolver.font_for(FontRole::Body, FontWeight::Regular);
        let identity = self.resolver.font_for(FontRole::Body, FontWeight::Semibold);
        let title = self.resolver.font_for(FontRole::Title, FontWeight::Regular);

        self.draw_chrome(target, ctx, &caption)?;

        // identity band
        draw_text(target, &snapshot.location, Point::new(MARGIN + 2, 18), &identity)?;

        // primary emphasis: current temperature, largest glyph size
        let temp = format_temperature(snapshot.temperature);
        draw_text(target, &temp, Point::new(MARGIN + 2, 40), &title)?;
        let feels = format!(
            "{} {}",
            labels(ctx.locale).feels_like,
            format_temperature(snapshot.apparent_temperature)
        );
        draw_text(target, &feels, Point::new(MARGIN + 2, 63), &caption)?;

        // condition band: icon plus localized description
        let icon = self.resolver.icon_for(snapshot.condition, ctx.is_daytime);
        let icon_y = ctx.height as i32 - MARGIN - 36;
        icon.draw(target, Point::new(MARGIN + 2, icon_y))?;
        draw_text(
            target,
            snapshot.condition.description(ctx.locale),
            Point::new(MARGIN + 2 + icon.size() as i32 + 6, icon_y + 10),
            &body,
        )?;

        self.draw_detail_panel(target, snapshot, ctx, &caption)?;
        Ok(())
    }

    /// Border, header band (date, weekday, time) and the staleness marker.
    fn draw_chrome<D>(&self, target: &mut D, ctx: &RenderContext, caption: &FontHandle)
        -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        Rectangle::new(Point::zero(), Size::new(ctx.width, ctx.height))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(target)?;

        let l = labels(ctx.locale);
        let weekday = l.weekdays[ctx.now.weekday().num_days_from_monday() as usize];
        let date = match ctx.locale {
            Locale::En => format!("{} {}", weekday, ctx.now.format("%Y-%m-%d")),
            Locale::De => format!("{} {}", weekday, ctx.now.format("%d.%m.%Y")),
        };
        draw_text(target, &date, Point::new(MARGIN + 2, 3), caption)?;

        let mut clock = ctx.now.format("%H:%M").to_string();
        if let Some(age) = ctx.stale_age {
            clock = format!("{clock} {}", format_age(age));
        }
        let clock_w = clock.chars().count() as i32 * caption.font.character_size.width as i32;
        draw_text(
            target,
            &clock,
            Point::new(ctx.width as i32 - MARGIN - 2 - clock_w, 3),
            caption,
        )?;

        // header separator
        Line::new(
            Point::new(MARGIN, 15),
            Point::new(ctx.width as i32 - MARGIN, 15),
        )
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
        .draw(target)?;
        Ok(())
    }

    /// Bordered panel on the right: humidity, pressure, wind speed and the
    /// wind-direction arrow.
    fn draw_detail_panel<D>(
        &self,
        target: &mut D,
        snapshot: &WeatherSnapshot,
        ctx: &RenderContext,
        caption: &FontHandle,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let l = labels(ctx.locale);
        let panel_w = DETAIL_PANEL_WIDTH.min(ctx.width / 2);
        let x0 = ctx.width as i32 - MARGIN - panel_w as i32;
        let y0 = 18;
        let panel_h = ctx.height - y0 as u32 - MARGIN as u32;
        Rectangle::new(Point::new(x0, y0), Size::new(panel_w, panel_h))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(target)?;

        let tx = x0 + 4;
        let line_h = caption.font.character_size.height as i32 + 2;
        let mut ty = y0 + 3;

        let wind_unit = snapshot.units.wind_speed_suffix();
        let rows = [
            format!("{}: {}%", l.humidity, snapshot.humidity),
            format!("{}: {} hPa", l.pressure, format_float(snapshot.pressure_hpa, 0)),
            format!("{}: {} {}", l.wind, format_float(snapshot.wind_speed, 1), wind_unit),
            format!(
                "{}: {}° {}",
                l.direction, snapshot.wind_direction_deg, snapshot.wind_compass()
            ),
        ];
        for row in &rows {
            draw_text(target, row, Point::new(tx, ty), caption)?;
            ty += line_h;
        }

        // direction arrow, centered under the text rows
        let center = Point::new(x0 + panel_w as i32 / 2, ty + 18);
        draw_bearing_arrow(target, center, 14, snapshot.wind_direction_deg)?;
        Ok(())
    }

    fn compose_error<D>(&self, target: &mut D, reason: &str, ctx: &RenderContext)
        -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let caption = self.resolver.font_for(FontRole::Caption, FontWeight::Regular);
        let body = self.resolver.font_for(FontRole::Body, FontWeight::Semibold);

        self.draw_chrome(target, ctx, &caption)?;
        draw_text(
            target,
            labels(ctx.locale).no_data,
            Point::new(MARGIN + 2, ctx.height as i32 / 2 - 14),
            &body,
        )?;
        draw_text(
            target,
            reason,
            Point::new(MARGIN + 2, ctx.height as i32 / 2 + 4),
            &caption,
        )?;
        Ok(())
    }
}

fn draw_text<D>(target: &mut D, text: &str, top_left: Point, handle: &FontHandle)
    -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let style = MonoTextStyle::new(handle.font, BinaryColor::On);
    Text::with_baseline(text, top_left, style, Baseline::Top).draw(target)?;
    Ok(())
}

/// Line-and-head arrow pointing along a meteorological bearing (0° = north,
/// clockwise, screen-up = north).
fn draw_bearing_arrow<D>(target: &mut D, center: Point, radius: i32, bearing_deg: u16)
    -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let theta = (bearing_deg as f64).to_radians();
    let (sin, cos) = theta.sin_cos();
    let tip = Point::new(
        center.x + (sin * radius as f64).round() as i32,
        center.y - (cos * radius as f64).round() as i32,
    );
    let tail = Point::new(2 * center.x - tip.x, 2 * center.y - tip.y);
    let style = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
    Line::new(tail, tip).into_styled(style).draw(target)?;

    // two short head strokes at ±150° off the shaft
    for offset in [150.0f64, -150.0] {
        let phi = theta + offset.to_radians();
        let (hs, hc) = phi.sin_cos();
        let head = Point::new(
            tip.x + (hs * 6.0).round() as i32,
            tip.y - (hc * 6.0).round() as i32,
        );
        Line::new(tip, head).into_styled(style).draw(target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Condition, Units};
    use chrono::TimeZone;

    fn engine() -> LayoutEngine {
        LayoutEngine::new(AssetResolver::builtin_only())
    }

    fn rain_snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            fetched_at: chrono::Utc.with_ymd_and_hms(2026, 2, 11, 9, 0, 0).unwrap(),
            location: "Stralsund".to_string(),
            latitude: 54.3091,
            longitude: 13.0818,
            units: Units::Metric,
            temperature: 5.0,
            apparent_temperature: 2.4,
            condition: Condition::Rain,
            humidity: 80,
            pressure_hpa: 1005.0,
            wind_speed: 4.0,
            wind_direction_deg: 270,
        }
    }

    fn context() -> RenderContext {
        RenderContext::with_defaults(
            Local.with_ymd_and_hms(2026, 2, 11, 10, 30, 0).unwrap(),
            true,
        )
    }

    #[test]
    fn rendering_is_deterministic() {
        let engine = engine();
        let snapshot = rain_snapshot();
        let ctx = context();
        let a = engine.render(&snapshot, &ctx);
        let b = engine.render(&snapshot, &ctx);
        assert_eq!(a, b);
        assert!(a.count_on_pixels() > 0);
    }

    #[test]
    fn daytime_rain_frame_has_all_bands() {
        let frame = engine().render(&rain_snapshot(), &context());
        assert_eq!((frame.width(), frame.height()), (250, 122));
        // border present
        assert_eq!(frame.pixel(0, 0), Some(BinaryColor::On));
        assert_eq!(frame.pixel(249, 121), Some(BinaryColor::On));
        // something drawn in the temperature region and the detail panel
        let temp_region: usize = (40..60)
            .flat_map(|y| (6..60).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) == Some(BinaryColor::On))
            .count();
        assert!(temp_region > 0, "temperature band is blank");
        let panel_region: usize = (20..118)
            .flat_map(|y| (136..246).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) == Some(BinaryColor::On))
            .count();
        assert!(panel_region > 0, "detail panel is blank");
    }

    #[test]
    fn condition_changes_the_frame() {
        let engine = engine();
        let ctx = context();
        let rain = engine.render(&rain_snapshot(), &ctx);
        let mut snow = rain_snapshot();
        snow.condition = Condition::Snow;
        assert_ne!(rain, engine.render(&snow, &ctx));
    }

    #[test]
    fn wind_bearing_changes_the_frame() {
        let engine = engine();
        let ctx = context();
        let west = engine.render(&rain_snapshot(), &ctx);
        let mut east = rain_snapshot();
        east.wind_direction_deg = 90;
        assert_ne!(west, engine.render(&east, &ctx));
    }

    #[test]
    fn stale_marker_changes_the_header() {
        let engine = engine();
        let snapshot = rain_snapshot();
        let fresh_ctx = context();
        let mut stale_ctx = context();
        stale_ctx.stale_age = Some(Duration::from_secs(45 * 60));
        assert_ne!(
            engine.render(&snapshot, &fresh_ctx),
            engine.render(&snapshot, &stale_ctx)
        );
    }

    #[test]
    fn rotation_swaps_dimensions() {
        let mut ctx = context();
        ctx.rotation = 90;
        let frame = engine().render(&rain_snapshot(), &ctx);
        assert_eq!((frame.width(), frame.height()), (122, 250));
    }

    #[test]
    fn non_finite_values_render_placeholders() {
        let mut snapshot = rain_snapshot();
        snapshot.temperature = f64::NAN;
        snapshot.pressure_hpa = f64::INFINITY;
        // must not panic, and still produces a non-blank frame
        let frame = engine().render(&snapshot, &context());
        assert!(frame.count_on_pixels() > 0);
    }

    #[test]
    fn error_frame_is_distinct_and_nonblank() {
        let engine = engine();
        let ctx = context();
        let error = engine.render_error_frame("network", &ctx);
        assert!(error.count_on_pixels() > 0);
        assert_ne!(error, engine.render(&rain_snapshot(), &ctx));
    }

    #[test]
    fn locale_switches_labels() {
        let engine = engine();
        let mut de = context();
        de.locale = Locale::De;
        assert_ne!(
            engine.render(&rain_snapshot(), &context()),
            engine.render(&rain_snapshot(), &de)
        );
    }

    #[test]
    fn age_formatting() {
        assert_eq!(format_age(Duration::from_secs(120)), "+2m");
        assert_eq!(format_age(Duration::from_secs(3900)), "+1h05m");
    }
}

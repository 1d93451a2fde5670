/*
 *  assets.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Icon and font resolution with ordered fallback tiers
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

use embedded_graphics::image::{Image, ImageRaw};
use embedded_graphics::mono_font::iso_8859_1::{FONT_6X10, FONT_9X15, FONT_9X15_BOLD, FONT_10X20};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use log::{debug, info};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::snapshot::Condition;

/// Primary icon tier geometry: raw 1bpp bitmaps, MSB-first rows.
pub const ICON_SIZE: u32 = 32;
const ICON_BYTES: usize = (ICON_SIZE as usize / 8) * ICON_SIZE as usize;

/// Built-in placeholder, 16x16: bordered question mark. Compiled in as the
/// unknown-condition image when no disk asset covers it; a question mark
/// says nothing useful about a condition we did recognize.
const PLACEHOLDER_SIZE: u32 = 16;
const PLACEHOLDER_GLYPH: [u8; 32] = [
    0xff, 0xff, 0x80, 0x01, 0x80, 0x01, 0x87, 0xe1, 0x8c, 0x31, 0x8c, 0x31, 0x80, 0x31, 0x80,
    0x61, 0x81, 0xc1, 0x81, 0x81, 0x80, 0x01, 0x81, 0x81, 0x81, 0x81, 0x80, 0x01, 0x80, 0x01,
    0xff, 0xff,
];

/// Which tier of the fallback chain produced a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconTier {
    /// Exact condition match from the configured asset directory.
    Primary,
    /// Nearest condition-family match from the asset directory.
    Family,
    /// Compiled-in placeholder bitmap.
    Placeholder,
    /// Minimal procedurally drawn glyph; the guaranteed terminal tier.
    Procedural,
}

/// A resolved, always-drawable icon. Resolution failure is designed out:
/// every chain ends in a drawable handle.
#[derive(Debug, Clone)]
pub enum IconHandle {
    Bitmap {
        data: Cow<'static, [u8]>,
        size: u32,
        tier: IconTier,
    },
    Procedural(Condition),
}

impl IconHandle {
    pub fn tier(&self) -> IconTier {
        match self {
            IconHandle::Bitmap { tier, .. } => *tier,
            IconHandle::Procedural(_) => IconTier::Procedural,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            IconHandle::Bitmap { size, .. } => *size,
            IconHandle::Procedural(_) => ICON_SIZE,
        }
    }

    /// Draw the icon with its top-left corner at `top_left`.
    pub fn draw<D>(&self, target: &mut D, top_left: Point) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        match self {
            IconHandle::Bitmap { data, size, .. } => {
                let raw = ImageRaw::<BinaryColor>::new(data.as_ref(), *size);
                Image::new(&raw, top_left).draw(target)
            }
            IconHandle::Procedural(condition) => {
                // bordered box with the condition's initial, nothing fancier
                Rectangle::new(top_left, Size::new(ICON_SIZE, ICON_SIZE))
                    .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
                    .draw(target)?;
                let initial = condition
                    .slug()
                    .chars()
                    .next()
                    .unwrap_or('?')
                    .to_ascii_uppercase();
                let mut buf = [0u8; 4];
                let style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
                Text::with_baseline(
                    initial.encode_utf8(&mut buf),
                    top_left + Point::new(ICON_SIZE as i32 / 2 - 5, 6),
                    style,
                    Baseline::Top,
                )
                .draw(target)?;
                Ok(())
            }
        }
    }
}

/// Font roles used by the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontRole {
    /// Primary emphasis (the temperature figure).
    Title,
    /// Location name, condition text.
    Body,
    /// Header band and detail panel.
    Caption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Semibold,
}

/// Bundled families plus the platform terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFamily {
    Display,
    Text,
    Small,
    PlatformDefault,
}

#[derive(Debug, Clone, Copy)]
pub struct FontHandle {
    pub font: &'static MonoFont<'static>,
    pub family: FontFamily,
    pub weight: FontWeight,
}

impl FontRole {
    fn family(&self) -> FontFamily {
        match self {
            FontRole::Title => FontFamily::Display,
            FontRole::Body => FontFamily::Text,
            FontRole::Caption => FontFamily::Small,
        }
    }
}

/// Weight lookup within a bundled family. Display and Small carry no
/// semibold cut; Text does.
fn family_font(family: FontFamily, weight: FontWeight) -> Option<&'static MonoFont<'static>> {
    match (family, weight) {
        (FontFamily::Display, FontWeight::Regular) => Some(&FONT_10X20),
        (FontFamily::Display, FontWeight::Semibold) => None,
        (FontFamily::Text, FontWeight::Regular) => Some(&FONT_9X15),
        (FontFamily::Text, FontWeight::Semibold) => Some(&FONT_9X15_BOLD),
        (FontFamily::Small, FontWeight::Regular) => Some(&FONT_6X10),
        (FontFamily::Small, FontWeight::Semibold) => None,
        (FontFamily::PlatformDefault, _) => Some(&FONT_6X10),
    }
}

/// Maps weather conditions and font requests to drawable assets. Both
/// resolution chains are deterministic and total.
#[derive(Debug, Default)]
pub struct AssetResolver {
    disk_icons: HashMap<Condition, Vec<u8>>,
}

impl AssetResolver {
    /// Resolver with no primary tier; everything lands on the built-in tiers.
    pub fn builtin_only() -> Self {
        Self::default()
    }

    /// Load the primary icon tier from `dir`. Files are `<slug>.bin`, raw
    /// 1bpp 32x32. Missing or malformed files just thin out the tier.
    pub fn with_icon_dir(dir: &Path) -> Self {
        let mut disk_icons = HashMap::new();
        for condition in Condition::ALL {
            let path = dir.join(format!("{}.bin", condition.slug()));
            match fs::read(&path) {
                Ok(data) if data.len() == ICON_BYTES => {
                    disk_icons.insert(condition, data);
                }
                Ok(data) => {
                    debug!(
                        "icon {} has {} bytes, expected {ICON_BYTES}; skipped",
                        path.display(),
                        data.len()
                    );
                }
                Err(_) => {}
            }
        }
        info!(
            "loaded {} of {} primary icons from {}",
            disk_icons.len(),
            Condition::ALL.len(),
            dir.display()
        );
        Self { disk_icons }
    }

    /// Nearest-family candidates, most specific first.
    fn family_candidates(condition: Condition) -> &'static [Condition] {
        match condition {
            Condition::ClearDay => &[Condition::ClearNight, Condition::Cloudy1],
            Condition::ClearNight => &[Condition::ClearDay, Condition::Cloudy1],
            Condition::Cloudy1 => &[Condition::Cloudy2, Condition::Cloudy3],
            Condition::Cloudy2 => &[Condition::Cloudy1, Condition::Cloudy3],
            Condition::Cloudy3 => &[Condition::Cloudy2, Condition::Cloudy1],
            Condition::Rain => &[Condition::Mixed, Condition::Cloudy3],
            Condition::Snow => &[Condition::Mixed, Condition::Cloudy3],
            Condition::Mixed => &[Condition::Rain, Condition::Snow],
            Condition::Fog => &[Condition::Cloudy3],
            Condition::Thunderstorm => &[Condition::Rain],
            Condition::Unknown => &[],
        }
    }

    /// Fold the day/night flag into the condition. Only clear skies carry
    /// day/night variants.
    fn effective_condition(condition: Condition, is_daytime: bool) -> Condition {
        match (condition, is_daytime) {
            (Condition::ClearDay, false) => Condition::ClearNight,
            (Condition::ClearNight, true) => Condition::ClearDay,
            (c, _) => c,
        }
    }

    /// Resolve an icon. Tier order: exact disk match, disk family match,
    /// compiled-in placeholder (covers `Unknown`), procedural glyph for
    /// everything else. Always returns a handle.
    pub fn icon_for(&self, condition: Condition, is_daytime: bool) -> IconHandle {
        let wanted = Self::effective_condition(condition, is_daytime);

        if let Some(data) = self.disk_icons.get(&wanted) {
            return IconHandle::Bitmap {
                data: Cow::Owned(data.clone()),
                size: ICON_SIZE,
                tier: IconTier::Primary,
            };
        }
        for &candidate in Self::family_candidates(wanted) {
            if let Some(data) = self.disk_icons.get(&candidate) {
                return IconHandle::Bitmap {
                    data: Cow::Owned(data.clone()),
                    size: ICON_SIZE,
                    tier: IconTier::Family,
                };
            }
        }
        if wanted == Condition::Unknown {
            return IconHandle::Bitmap {
                data: Cow::Borrowed(&PLACEHOLDER_GLYPH),
                size: PLACEHOLDER_SIZE,
                tier: IconTier::Placeholder,
            };
        }
        IconHandle::Procedural(wanted)
    }

    /// Resolve a font. Order: requested family+weight, requested family
    /// with substituted weight, bundled fallback family, platform default.
    pub fn font_for(&self, role: FontRole, weight: FontWeight) -> FontHandle {
        let family = role.family();
        if let Some(font) = family_font(family, weight) {
            return FontHandle { font, family, weight };
        }
        if let Some(font) = family_font(family, FontWeight::Regular) {
            return FontHandle {
                font,
                family,
                weight: FontWeight::Regular,
            };
        }
        if let Some(font) = family_font(FontFamily::Text, weight) {
            return FontHandle {
                font,
                family: FontFamily::Text,
                weight,
            };
        }
        FontHandle {
            font: family_font(FontFamily::PlatformDefault, FontWeight::Regular)
                .expect("platform default font is always present"),
            family: FontFamily::PlatformDefault,
            weight: FontWeight::Regular,
        }
    }
}

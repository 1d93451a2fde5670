/*
 *  frame.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Runtime-sized monochrome framebuffer for embedded-graphics
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use std::io::Write;

/// One composed display frame. `On` pixels are ink (black on paper).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    buf: Vec<BinaryColor>,
    w: usize,
    h: usize,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self {
            buf: vec![BinaryColor::Off; w * h],
            w,
            h,
        }
    }

    pub fn width(&self) -> u32 {
        self.w as u32
    }

    pub fn height(&self) -> u32 {
        self.h as u32
    }

    pub fn as_slice(&self) -> &[BinaryColor] {
        &self.buf
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<BinaryColor> {
        if (x as usize) < self.w && (y as usize) < self.h {
            Some(self.buf[y as usize * self.w + x as usize])
        } else {
            None
        }
    }

    pub fn count_on_pixels(&self) -> usize {
        self.buf.iter().filter(|&&p| p == BinaryColor::On).count()
    }

    /// Map (x,y) to linear index; None if out of bounds.
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }

    /// Pack into 1bpp rows, MSB first, each row padded to a byte boundary.
    /// This is the layout the panel transfer and the PBM P4 format share.
    pub fn to_packed_1bpp(&self) -> Vec<u8> {
        let stride = (self.w + 7) / 8;
        let mut out = vec![0u8; stride * self.h];
        for y in 0..self.h {
            for x in 0..self.w {
                if self.buf[y * self.w + x] == BinaryColor::On {
                    out[y * stride + x / 8] |= 0x80 >> (x % 8);
                }
            }
        }
        out
    }

    /// Serialize as binary PBM (P4); 1 bits are black, matching ink-on.
    pub fn write_pbm<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        writeln!(writer, "P4")?;
        writeln!(writer, "{} {}", self.w, self.h)?;
        writer.write_all(&self.to_packed_1bpp())
    }

    /// Return a rotated copy. Only quarter turns are meaningful for the
    /// panel; any other angle returns the frame unrotated.
    pub fn rotated(&self, degrees: u16) -> Frame {
        match degrees {
            90 | 270 => {
                let mut out = Frame::new(self.h as u32, self.w as u32);
                for y in 0..self.h {
                    for x in 0..self.w {
                        let (nx, ny) = if degrees == 90 {
                            (self.h - 1 - y, x)
                        } else {
                            (y, self.w - 1 - x)
                        };
                        out.buf[ny * out.w + nx] = self.buf[y * self.w + x];
                    }
                }
                out
            }
            180 => {
                let mut out = Frame::new(self.w as u32, self.h as u32);
                for (i, &p) in self.buf.iter().enumerate() {
                    out.buf[self.buf.len() - 1 - i] = p;
                }
                out
            }
            _ => self.clone(),
        }
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.buf.fill(color);
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        // fast path for the rectangular fills the primitives use; colors
        // map to area positions, so clipped pixels are consumed, not shifted
        let Size { width, height } = area.size;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let mut it = colors.into_iter();
        for row in 0..height as i32 {
            for col in 0..width as i32 {
                let Some(c) = it.next() else {
                    return Ok(());
                };
                let (x, y) = (area.top_left.x + col, area.top_left.y + row);
                if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
                    self.buf[y as usize * self.w + x as usize] = c;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{Line, PrimitiveStyle};

    #[test]
    fn starts_blank() {
        let f = Frame::new(250, 122);
        assert_eq!(f.count_on_pixels(), 0);
        assert_eq!(f.width(), 250);
        assert_eq!(f.height(), 122);
    }

    #[test]
    fn drawing_sets_pixels() {
        let mut f = Frame::new(32, 16);
        Line::new(Point::new(0, 0), Point::new(10, 0))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut f)
            .unwrap();
        assert_eq!(f.pixel(0, 0), Some(BinaryColor::On));
        assert_eq!(f.pixel(10, 0), Some(BinaryColor::On));
        assert_eq!(f.pixel(11, 0), Some(BinaryColor::Off));
    }

    #[test]
    fn out_of_bounds_pixels_dropped() {
        let mut f = Frame::new(8, 8);
        f.draw_iter([Pixel(Point::new(-1, 2), BinaryColor::On)]).unwrap();
        f.draw_iter([Pixel(Point::new(8, 8), BinaryColor::On)]).unwrap();
        assert_eq!(f.count_on_pixels(), 0);
    }

    #[test]
    fn packs_msb_first_with_row_padding() {
        let mut f = Frame::new(10, 2);
        f.draw_iter([
            Pixel(Point::new(0, 0), BinaryColor::On),
            Pixel(Point::new(9, 1), BinaryColor::On),
        ])
        .unwrap();
        let packed = f.to_packed_1bpp();
        // 10px wide -> 2 bytes per row
        assert_eq!(packed.len(), 4);
        assert_eq!(packed[0], 0x80);
        assert_eq!(packed[1], 0x00);
        assert_eq!(packed[2], 0x00);
        assert_eq!(packed[3], 0x40);
    }

    #[test]
    fn contiguous_fill_clips_at_the_edges() {
        use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
        let mut f = Frame::new(8, 8);
        // extends two pixels past the right and bottom edges
        Rectangle::new(Point::new(6, 6), Size::new(4, 4))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut f)
            .unwrap();
        assert_eq!(f.count_on_pixels(), 4);
        assert_eq!(f.pixel(6, 6), Some(BinaryColor::On));
        assert_eq!(f.pixel(7, 7), Some(BinaryColor::On));
        assert_eq!(f.pixel(5, 5), Some(BinaryColor::Off));
    }

    #[test]
    fn pbm_has_header_and_payload() {
        let f = Frame::new(16, 4);
        let mut out = Vec::new();
        f.write_pbm(&mut out).unwrap();
        assert!(out.starts_with(b"P4\n16 4\n"));
        assert_eq!(out.len(), "P4\n16 4\n".len() + 2 * 4);
    }

    #[test]
    fn quarter_turn_rotation() {
        let mut f = Frame::new(4, 2);
        f.draw_iter([Pixel(Point::new(0, 0), BinaryColor::On)]).unwrap();

        let r90 = f.rotated(90);
        assert_eq!((r90.width(), r90.height()), (2, 4));
        assert_eq!(r90.pixel(1, 0), Some(BinaryColor::On));

        let r180 = f.rotated(180);
        assert_eq!((r180.width(), r180.height()), (4, 2));
        assert_eq!(r180.pixel(3, 1), Some(BinaryColor::On));

        let r270 = f.rotated(270);
        assert_eq!((r270.width(), r270.height()), (2, 4));
        assert_eq!(r270.pixel(0, 3), Some(BinaryColor::On));
    }
}

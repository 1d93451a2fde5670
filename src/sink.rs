/*
 *  sink.rs
 *
 *  PaperWx - weather on paper
 *  (c) 2024-26 PaperWx authors
 *
 *  Display output boundary: sink trait, file sink, mock sink
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
//! The last stage of the pipeline. Everything upstream works on [`Frame`]s;
//! only a sink knows where the pixels actually go. Sinks are synchronous:
//! an e-paper refresh blocks for a couple of seconds anyway, and the update
//! loop has nothing better to do meanwhile.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use thiserror::Error;

use crate::frame::Frame;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame is {got_w}x{got_h}, sink expects {want_w}x{want_h}")]
    SizeMismatch {
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// E-paper refresh strategy. Full refreshes clear ghosting but flash the
/// panel; partials are quiet but accumulate artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Full,
    Partial,
}

/// Anything that can put a composed frame in front of the user.
pub trait DisplaySink: Send {
    /// Native (width, height) of the sink. Frames of any other size are
    /// rejected rather than silently scaled.
    fn dimensions(&self) -> (u32, u32);

    fn show(&mut self, frame: &Frame, mode: RefreshMode) -> Result<(), SinkError>;
}

fn check_dimensions(sink: &dyn DisplaySink, frame: &Frame) -> Result<(), SinkError> {
    let (want_w, want_h) = sink.dimensions();
    if frame.width() != want_w || frame.height() != want_h {
        return Err(SinkError::SizeMismatch {
            got_w: frame.width(),
            got_h: frame.height(),
            want_w,
            want_h,
        });
    }
    Ok(())
}

/// Writes each frame as a binary PBM. This is the development sink: point
/// an image viewer at the file and watch updates land.
pub struct FileSink {
    path: PathBuf,
    width: u32,
    height: u32,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl DisplaySink for FileSink {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn show(&mut self, frame: &Frame, mode: RefreshMode) -> Result<(), SinkError> {
        check_dimensions(self, frame)?;
        let mut writer = BufWriter::new(File::create(&self.path)?);
        frame.write_pbm(&mut writer)?;
        writer.flush()?;
        debug!(
            "frame written to {} ({:?}, {} ink px)",
            self.path.display(),
            mode,
            frame.count_on_pixels()
        );
        Ok(())
    }
}

/// Shared observable state of a [`MockSink`].
#[derive(Debug, Default)]
pub struct MockSinkState {
    pub show_count: usize,
    pub refresh_modes: Vec<RefreshMode>,
    pub last_frame: Option<Frame>,
    pub simulate_failure: bool,
}

/// Records every call instead of displaying anything. Tests keep a clone of
/// the state handle and assert on it after driving the pipeline.
pub struct MockSink {
    width: u32,
    height: u32,
    state: Arc<Mutex<MockSinkState>>,
}

impl MockSink {
    pub fn new(width: u32, height: u32) -> Self {
        info!("mock sink {}x{}", width, height);
        Self {
            width,
            height,
            state: Arc::new(Mutex::new(MockSinkState::default())),
        }
    }

    pub fn state(&self) -> Arc<Mutex<MockSinkState>> {
        Arc::clone(&self.state)
    }

    pub fn set_simulate_failure(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.simulate_failure = fail;
        }
    }
}

impl DisplaySink for MockSink {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn show(&mut self, frame: &Frame, mode: RefreshMode) -> Result<(), SinkError> {
        check_dimensions(self, frame)?;
        let mut state = self
            .state
            .lock()
            .map_err(|_| SinkError::Unavailable("mock state poisoned".to_string()))?;
        if state.simulate_failure {
            return Err(SinkError::Unavailable("simulated failure".to_string()));
        }
        state.show_count += 1;
        state.refresh_modes.push(mode);
        state.last_frame = Some(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::BinaryColor;
    use embedded_graphics::prelude::*;

    fn dotted_frame(w: u32, h: u32) -> Frame {
        let mut f = Frame::new(w, h);
        f.draw_iter([Pixel(Point::new(1, 1), BinaryColor::On)]).unwrap();
        f
    }

    #[test]
    fn mock_records_shows_and_modes() {
        let mut sink = MockSink::new(250, 122);
        let state = sink.state();
        sink.show(&dotted_frame(250, 122), RefreshMode::Full).unwrap();
        sink.show(&dotted_frame(250, 122), RefreshMode::Partial).unwrap();

        let state = state.lock().unwrap();
        assert_eq!(state.show_count, 2);
        assert_eq!(state.refresh_modes, vec![RefreshMode::Full, RefreshMode::Partial]);
        assert_eq!(state.last_frame.as_ref().unwrap().count_on_pixels(), 1);
    }

    #[test]
    fn mock_simulated_failure() {
        let mut sink = MockSink::new(250, 122);
        sink.set_simulate_failure(true);
        let err = sink.show(&dotted_frame(250, 122), RefreshMode::Full);
        assert!(matches!(err, Err(SinkError::Unavailable(_))));
        assert_eq!(sink.state().lock().unwrap().show_count, 0);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mut sink = MockSink::new(250, 122);
        let err = sink.show(&dotted_frame(122, 250), RefreshMode::Full);
        assert!(matches!(err, Err(SinkError::SizeMismatch { .. })));
    }

    #[test]
    fn file_sink_writes_pbm() {
        let path = std::env::temp_dir().join("paperwx_sink_test.pbm");
        let mut sink = FileSink::new(&path, 16, 8);
        sink.show(&dotted_frame(16, 8), RefreshMode::Full).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P4\n16 8\n"));
        let _ = std::fs::remove_file(&path);
    }
}

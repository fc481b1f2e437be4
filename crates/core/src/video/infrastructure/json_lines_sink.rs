use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::video::domain::overlay::Overlay;
use crate::video::domain::overlay_sink::OverlaySink;
use crate::video::domain::video_error::VideoError;

/// Writes one JSON object per presented frame.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    label: PathBuf,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self, VideoError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            label: path.to_path_buf(),
        })
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer,
            label: PathBuf::from("<writer>"),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_error(&self, e: impl std::fmt::Display) -> VideoError {
        VideoError::Write {
            path: self.label.clone(),
            message: e.to_string(),
        }
    }
}

impl<W: Write + Send> OverlaySink for JsonLinesSink<W> {
    fn present(&mut self, _frame: &Frame, overlay: &Overlay) -> Result<(), VideoError> {
        let line = serde_json::to_string(overlay).map_err(|e| self.write_error(e))?;
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), VideoError> {
        self.writer.flush()?;
        Ok(())
    }
}

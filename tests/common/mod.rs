//! Scripted stand-ins for the external prober and encoder.

#![allow(dead_code)]

use media_archiver::core::cancel::CancelFlag;
use media_archiver::core::convert::{EncodeRequest, ProgressSample, VideoEncoder};
use media_archiver::core::probe::MediaProber;
use media_archiver::error::ConvertError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Answers from a table keyed by file name
#[derive(Default)]
pub struct TableProber {
    pub codecs: HashMap<String, String>,
    pub durations: HashMap<String, f64>,
}

impl TableProber {
    pub fn codec(mut self, name: &str, codec: &str) -> Self {
        self.codecs.insert(name.to_string(), codec.to_string());
        self
    }

    pub fn duration(mut self, name: &str, seconds: f64) -> Self {
        self.durations.insert(name.to_string(), seconds);
        self
    }

    fn key(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl MediaProber for TableProber {
    fn video_codec(&self, path: &Path) -> Option<String> {
        self.codecs.get(&Self::key(path)).cloned()
    }

    fn duration(&self, path: &Path) -> Option<f64> {
        self.durations.get(&Self::key(path)).copied()
    }
}

/// Writes a fixed payload and records every input it was asked to encode
#[derive(Default)]
pub struct RecordingEncoder {
    pub inputs: Mutex<Vec<PathBuf>>,
}

impl RecordingEncoder {
    pub fn calls(&self) -> Vec<PathBuf> {
        self.inputs.lock().unwrap().clone()
    }
}

impl VideoEncoder for RecordingEncoder {
    fn encode(
        &self,
        request: &EncodeRequest,
        on_progress: &mut dyn FnMut(ProgressSample),
        _cancel: &CancelFlag,
    ) -> Result<(), ConvertError> {
        self.inputs.lock().unwrap().push(request.input.clone());
        on_progress(ProgressSample {
            out_time_seconds: Some(1.0),
            speed: Some(1.0),
            finished: true,
        });
        fs::write(&request.output, b"h264 payload").map_err(|source| ConvertError::Output {
            path: request.input.clone(),
            source,
        })
    }
}

/// Backdate a file so the stability gate treats it as settled
pub fn settle(path: &Path) {
    let old = filetime::FileTime::from_system_time(SystemTime::now() - Duration::from_secs(3600));
    filetime::set_file_times(path, old, old).unwrap();
}

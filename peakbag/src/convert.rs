use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

/// Track formats accepted as input, keyed by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackFormat {
    Gdb,
    Gpx,
    Kml,
    Kmz,
    Fit,
    Tcx,
}

impl TrackFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "gdb" => Some(TrackFormat::Gdb),
            "gpx" => Some(TrackFormat::Gpx),
            "kml" => Some(TrackFormat::Kml),
            "kmz" => Some(TrackFormat::Kmz),
            "fit" => Some(TrackFormat::Fit),
            "tcx" => Some(TrackFormat::Tcx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Input format name understood by gpsbabel.
    pub fn gpsbabel_code(self) -> &'static str {
        match self {
            TrackFormat::Gdb => "gdb",
            TrackFormat::Gpx => "gpx",
            TrackFormat::Kml => "kml",
            TrackFormat::Kmz => "kmz",
            TrackFormat::Fit => "garmin_fit",
            TrackFormat::Tcx => "gtrnctr",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("file extension {0:?} is not a known GPS format")]
    UnsupportedFormat(String),
    #[error("failed to create temp gpx output file: {0}")]
    TempFile(#[source] io::Error),
    #[error("failed to launch {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("gpsbabel conversion failed {status}: {output}")]
    Failed { status: String, output: String },
}

/// Turns a track file of any supported format into GPX at `output`.
pub trait TrackConverter {
    fn convert(&self, input: &Path, format: TrackFormat, output: &Path) -> Result<(), ConvertError>;
}

/// Conversion through the `gpsbabel` command line tool.
#[derive(Clone, Debug)]
pub struct GpsBabel {
    program: PathBuf,
    simplify_count: usize,
}

impl Default for GpsBabel {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gpsbabel"),
            simplify_count: 2900,
        }
    }
}

impl GpsBabel {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Cap on points kept per track.
    pub fn with_simplify_count(mut self, count: usize) -> Self {
        self.simplify_count = count.max(2);
        self
    }

    fn args(&self, input: &Path, format: TrackFormat, output: &Path) -> Vec<OsString> {
        vec![
            "-t".into(),
            "-i".into(),
            format.gpsbabel_code().into(),
            "-f".into(),
            input.as_os_str().to_owned(),
            "-x".into(),
            format!("simplify,count={}", self.simplify_count).into(),
            "-o".into(),
            "gpx,garminextensions".into(),
            "-F".into(),
            output.as_os_str().to_owned(),
        ]
    }
}

impl TrackConverter for GpsBabel {
    fn convert(&self, input: &Path, format: TrackFormat, output: &Path) -> Result<(), ConvertError> {
        let result = Command::new(&self.program)
            .args(self.args(input, format, output))
            .output()
            .map_err(|source| ConvertError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        if !result.status.success() {
            let mut combined = String::from_utf8_lossy(&result.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&result.stderr));
            return Err(ConvertError::Failed {
                status: result.status.to_string(),
                output: combined.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Convert `input` into a temporary GPX file that is deleted when dropped.
pub fn convert_to_gpx<V: TrackConverter + ?Sized>(
    converter: &V,
    input: &Path,
) -> Result<NamedTempFile, ConvertError> {
    let format = TrackFormat::from_path(input).ok_or_else(|| {
        let ext = input
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        ConvertError::UnsupportedFormat(ext)
    })?;

    let output = tempfile::Builder::new()
        .prefix("peakbag.")
        .suffix(".gpx")
        .tempfile()
        .map_err(ConvertError::TempFile)?;

    info!("Converting {:?} to {:?}", input, output.path());
    converter.convert(input, format, output.path())?;
    Ok(output)
}

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::convert::convert_to_gpx;
use crate::{
    analyze, build_ascent, match_peak, parse_gpx, BatchError, ClimberId, Credentials, FileError,
    HistoryStore, PeakCatalog, Track, TrackConverter, TrackError, TrackFailure,
    TrackFormat,
};

/// What to process: one file, or every track file in a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Directory(PathBuf),
}

/// Settings for one run, built once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub input: Input,
    /// Build ascents but never submit them.
    pub dry_run: bool,
    /// Reprocess files whose last attempt failed.
    pub retry_failures: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub eligible: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub submitted: usize,
}

enum TrackOutcome {
    Submitted,
    DryRun,
}

/// Walks input files through conversion, parsing and the per-track ascent
/// pipeline, one file and one track at a time.
pub struct BatchRunner<C, V> {
    config: Config,
    catalog: C,
    converter: V,
    climber: ClimberId,
}

impl<C: PeakCatalog, V: TrackConverter> BatchRunner<C, V> {
    /// Log in to the catalog. Failing here aborts before any file is touched.
    pub fn connect(config: Config, mut catalog: C, converter: V) -> Result<Self, BatchError> {
        let climber = catalog
            .authenticate(&config.credentials)
            .map_err(BatchError::Authentication)?;
        info!("Logged in as {}", climber);
        Ok(Self {
            config,
            catalog,
            converter,
            climber,
        })
    }

    pub fn climber(&self) -> ClimberId {
        self.climber
    }

    pub fn run(&mut self) -> Result<RunSummary, BatchError> {
        let summary = match self.config.input.clone() {
            Input::File(path) => self.run_file(&path)?,
            Input::Directory(dir) => self.run_directory(&dir)?,
        };
        info!(
            "Done: {} eligible, {} skipped, {} succeeded, {} failed, {} ascents uploaded",
            summary.eligible, summary.skipped, summary.succeeded, summary.failed, summary.submitted
        );
        Ok(summary)
    }

    /// A single named file bypasses history and reports its failure directly.
    fn run_file(&mut self, path: &Path) -> Result<RunSummary, BatchError> {
        let mut summary = RunSummary {
            eligible: 1,
            ..RunSummary::default()
        };
        match self.process_file(path, &mut summary) {
            Ok(()) => {
                summary.succeeded += 1;
                Ok(summary)
            }
            Err(err) => {
                let source = escalate(err)?;
                Err(BatchError::File {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    fn run_directory(&mut self, dir: &Path) -> Result<RunSummary, BatchError> {
        let files = eligible_files(dir)?;
        let mut history = HistoryStore::load(dir)?;
        let mut summary = RunSummary {
            eligible: files.len(),
            ..RunSummary::default()
        };
        info!("Found {} track files in {:?}", files.len(), dir);

        for name in files {
            if history.should_skip(&name, self.config.retry_failures) {
                info!("Skipping already processed file {:?}", name);
                summary.skipped += 1;
                continue;
            }

            let message = match self.process_file(&dir.join(&name), &mut summary) {
                Ok(()) => {
                    info!("Finished {:?}", name);
                    summary.succeeded += 1;
                    String::new()
                }
                Err(err) => {
                    let err = escalate(err)?;
                    warn!("Failed {:?}: {}", name, err);
                    summary.failed += 1;
                    err.to_string()
                }
            };

            history.record(&name, message);
            history.save()?;
        }

        Ok(summary)
    }

    fn process_file(&mut self, path: &Path, summary: &mut RunSummary) -> Result<(), FileError> {
        info!("Processing {:?}", path);
        let gpx_file = convert_to_gpx(&self.converter, path)?;
        let bytes = fs::read(gpx_file.path()).map_err(|source| FileError::Read {
            path: gpx_file.path().to_path_buf(),
            source,
        })?;
        let tracks = parse_gpx(&bytes)?;
        if tracks.is_empty() {
            warn!("No tracks in {:?}", path);
        }

        let mut failures = Vec::new();
        for track in &tracks {
            let name = track.display_name().to_string();
            match self.process_track(track) {
                Ok(TrackOutcome::Submitted) => summary.submitted += 1,
                Ok(TrackOutcome::DryRun) => {}
                Err(error) => match error.into_session_lost() {
                    Ok(source) => return Err(FileError::SessionLost { track: name, source }),
                    Err(error) => {
                        let failure = TrackFailure { track: name, error };
                        warn!("{}", failure);
                        failures.push(failure);
                    }
                },
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FileError::Tracks(failures))
        }
    }

    fn process_track(&mut self, track: &Track) -> Result<TrackOutcome, TrackError> {
        let bounds = analyze(track)?;
        info!(
            "Highest point is {:.5},{:.5} at {:.1} m on {}",
            bounds.highest.latitude,
            bounds.highest.longitude,
            bounds.summit_elevation,
            bounds.summit_time
        );

        let matched = match_peak(&bounds.highest, &self.catalog)?;
        let peak = matched.peak;
        info!("Highest point corresponds to {:?}", peak.name);

        let ascents = self.catalog.list_ascents().map_err(TrackError::ListAscents)?;
        debug!("Loaded {} ascents", ascents.len());
        if ascents.has(peak.id, &bounds.summit_time) {
            return Err(TrackError::DuplicateAscent {
                peak: peak.name,
                date: bounds.summit_time,
            });
        }

        let ascent = build_ascent(track, &bounds, &peak, Utc::now());
        info!(
            "Adding ascent of {:?} on {} (up {} min, down {} min)",
            peak.name,
            ascent.date,
            ascent.time_up.num_minutes(),
            ascent.time_down.num_minutes()
        );

        if self.config.dry_run {
            info!("DRY RUN, skipping ascent add");
            return Ok(TrackOutcome::DryRun);
        }

        let id = self
            .catalog
            .submit_ascent(&ascent)
            .map_err(TrackError::Upload)?;
        info!("Uploaded new ascent {} for {:?}", id, peak.name);
        Ok(TrackOutcome::Submitted)
    }
}

/// Abort the run on a lost catalog session; anything else stays a file failure.
fn escalate(err: FileError) -> Result<FileError, BatchError> {
    match err {
        FileError::SessionLost { source, .. } => Err(BatchError::Authentication(source)),
        other => Ok(other),
    }
}

/// Regular files (symlinks followed) with a known track extension, sorted by name.
fn eligible_files(dir: &Path) -> Result<Vec<String>, BatchError> {
    let read_err = |source: std::io::Error| BatchError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let file_name = entry.file_name();
        match fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(err) => {
                warn!("Skipping unreadable entry {:?}: {}", file_name, err);
                continue;
            }
        }
        let Some(name) = file_name.to_str() else {
            warn!("Skipping file with non UTF-8 name {:?}", file_name);
            continue;
        };
        if TrackFormat::from_path(Path::new(name)).is_none() {
            debug!("Ignoring {:?}: not a track format", name);
            continue;
        }
        names.push(name.to_string());
    }
    names.sort();
    Ok(names)
}

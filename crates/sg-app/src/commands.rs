//! Subcommand execution

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use sg_core::events::events::FileSaved;
use sg_core::settings::DEFAULT_SETTINGS_FILE;
use sg_core::{AppState, DateRange, Series, SeriesHandle, SeriesId, Settings};
use sg_data::{ReaderConfig, ReaderRegistry};
use tracing::{info, warn};

use crate::cli::{Command, FileArgs, WindowArgs};

/// Application state plus the readers configured for it
pub struct App {
    state: AppState,
    readers: ReaderRegistry,
}

/// One line of `info` output
#[derive(Debug, Serialize)]
struct SeriesSummary {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    unit: String,
    items: usize,
    file: Option<String>,
    range: Option<DateRange>,
}

impl SeriesSummary {
    fn of(series: &Series) -> Self {
        let series_type = series.series_type();
        Self {
            name: series.name().to_string(),
            type_name: series_type.name.clone(),
            unit: series_type.unit.clone(),
            items: series.len(),
            file: series.origin().map(|o| o.file_name()),
            range: (!series.is_empty()).then(|| series.current_range()),
        }
    }
}

impl App {
    pub fn new(settings: Settings, reader_config: &ReaderConfig) -> Self {
        Self {
            state: AppState::new(settings),
            readers: ReaderRegistry::new(reader_config),
        }
    }

    /// Build the app from `path`, or from the default settings file when present
    pub fn from_config(path: Option<&Path>) -> Result<Self> {
        let (settings, reader_config) = match path {
            Some(path) => {
                let settings = Settings::load_from_path(path)?;
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let reader_config = ReaderConfig::from_toml(&text)
                    .map_err(|e| anyhow!("Invalid reader settings in {}: {}", path.display(), e))?;
                (settings, reader_config)
            }
            None => {
                let path = Path::new(DEFAULT_SETTINGS_FILE);
                let settings = Settings::load_or_default(path);
                let reader_config = match fs::read_to_string(path) {
                    Ok(text) => ReaderConfig::from_toml(&text).unwrap_or_else(|e| {
                        warn!("Invalid reader settings in {}: {}; using defaults", path.display(), e);
                        ReaderConfig::default()
                    }),
                    Err(_) => ReaderConfig::default(),
                };
                (settings, reader_config)
            }
        };
        Ok(Self::new(settings, &reader_config))
    }

    pub fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Info { files, json } => self.info(&files, json),
            Command::Convert { files, output } => {
                self.load(&files)?;
                self.save_all(&output).map(drop)
            }
            Command::Shift {
                io,
                amount,
                unit,
                series,
            } => {
                let (id, all) = self.target(&io, series.as_deref())?;
                let shifted = self.state.shift(id, amount, unit, all)?;
                println!("Shifted {} series by {:+} {}", shifted, amount, unit);
                self.save_all(&io.output).map(drop)
            }
            Command::Resample { io, series, bucket } => {
                self.load_file(&io)?;
                let handle = self.state.resample(self.series_named(&series)?, bucket)?;
                self.report_derived(&handle);
                self.save_all(&io.output).map(drop)
            }
            Command::Cumulate { io, series } => {
                self.load_file(&io)?;
                let handle = self.state.cumulate(self.series_named(&series)?)?;
                self.report_derived(&handle);
                self.save_all(&io.output).map(drop)
            }
            Command::Recalibrate {
                io,
                reference,
                target,
                window,
            } => {
                self.load_file(&io)?;
                let reference_id = self.series_named(&reference)?;
                let target_id = self.series_named(&target)?;
                let window = self.window(&window, reference_id)?;
                let offset = self.state.recalibrate(reference_id, target_id, window)?;
                println!("Removed an offset of {:.4} from {}", offset, target);
                self.save_all(&io.output).map(drop)
            }
            Command::WaterHeight { io, standard, target } => {
                self.load_file(&io)?;
                let handle = self
                    .state
                    .water_height(self.series_named(&standard)?, self.series_named(&target)?)?;
                self.report_derived(&handle);
                self.save_all(&io.output).map(drop)
            }
            Command::Limit { io, series, window } => {
                if window.from.is_none() && window.to.is_none() {
                    bail!("limit needs --from, --to or both");
                }
                let (id, all) = self.target(&io, series.as_deref())?;
                let window = self.window(&window, id)?;
                let limited = self.state.limit(id, window, all)?;
                println!("Limited {} series to {} .. {}", limited, window.start, window.end);
                self.save_all(&io.output).map(drop)
            }
        }
    }

    /// Load every file, keeping the ones that could be read.
    /// Fails only when no series at all was loaded.
    fn load(&self, files: &[PathBuf]) -> Result<Vec<SeriesHandle>> {
        let results = self
            .readers
            .load_into(files, &self.state.types, &self.state.repository);
        let mut handles = Vec::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(loaded) => handles.extend(loaded),
                Err(e) => {
                    eprintln!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if handles.is_empty() {
            return match first_error {
                Some(e) => Err(anyhow::Error::new(e).context("No file could be read")),
                None => Err(anyhow!("No series found")),
            };
        }
        Ok(handles)
    }

    fn load_file(&self, io: &FileArgs) -> Result<Vec<SeriesHandle>> {
        self.load(std::slice::from_ref(&io.file))
    }

    /// The named series alone, or the first series of the file with all its siblings
    fn target(&self, io: &FileArgs, series: Option<&str>) -> Result<(SeriesId, bool)> {
        let handles = self.load_file(io)?;
        match series {
            Some(name) => Ok((self.series_named(name)?, false)),
            None => {
                let first = handles.first().context("File holds no series")?;
                let id = first.read().id();
                Ok((id, true))
            }
        }
    }

    fn series_named(&self, name: &str) -> Result<SeriesId> {
        let handle = self
            .state
            .repository
            .find_by_name(name)
            .with_context(|| format!("No series named '{}'", name))?;
        let id = handle.read().id();
        Ok(id)
    }

    /// `--from`/`--to`, defaulting to the range of series `id`
    fn window(&self, args: &WindowArgs, id: SeriesId) -> Result<DateRange> {
        let range = self.state.repository.require(id)?.read().current_range();
        Ok(DateRange::new(
            args.from.unwrap_or(range.start),
            args.to.unwrap_or(range.end),
        ))
    }

    fn report_derived(&self, handle: &SeriesHandle) {
        let series = handle.read();
        println!("Created '{}' with {} items", series.name(), series.len());
    }

    fn info(&self, files: &[PathBuf], json: bool) -> Result<()> {
        let handles = self.load(files)?;
        let summaries: Vec<SeriesSummary> = handles.iter().map(|h| SeriesSummary::of(&h.read())).collect();
        if json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            return Ok(());
        }
        for summary in &summaries {
            let range = summary
                .range
                .map(|r| format!("{} .. {}", r.start.format("%Y-%m-%d %H:%M:%S"), r.end.format("%Y-%m-%d %H:%M:%S")))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<32} {:<22} {:<6} {:>8}  {}",
                summary.name, summary.type_name, summary.unit, summary.items, range
            );
        }
        Ok(())
    }

    /// Save every series in the repository to `output`
    fn save_all(&self, output: &Path) -> Result<PathBuf> {
        let handles = self.state.repository.instances();
        let (path, count) = {
            let guards: Vec<_> = handles.iter().map(|h| h.read()).collect();
            let series: Vec<&Series> = guards.iter().map(|g| &**g).collect();
            let path = sg_data::save(output, &series)
                .with_context(|| format!("Failed to save {}", output.display()))?;
            (path, series.len())
        };
        info!("Wrote {}", path.display());
        self.state.event_bus.publish(FileSaved {
            path: path.clone(),
            series_count: count,
        });
        println!("Saved {} series to {}", count, path.display());
        Ok(path)
    }
}

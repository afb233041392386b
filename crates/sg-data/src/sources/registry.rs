//! Reader selection and batch loading

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sg_core::events::events;
use sg_core::types::TypeRegistry;
use sg_core::{Series, SeriesHandle, SeriesRepository};
use tracing::{debug, info, warn};

use super::{
    first_lines, read_text, DataFileReader, HoboReader, ReefnetReader, SpeleoReader, WundergroundReader,
    SNIFF_LINES,
};
use crate::config::ReaderConfig;
use crate::FileReadingError;

/// Series read from one file
#[derive(Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub reader: &'static str,
    pub series: Vec<Series>,
}

/// Ordered list of readers, tried until one recognizes the file
pub struct ReaderRegistry {
    readers: Vec<Box<dyn DataFileReader>>,
}

impl ReaderRegistry {
    /// Native, Reefnet, Hobo then Wunderground readers
    pub fn new(config: &ReaderConfig) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(SpeleoReader::new(config.clone())));
        registry.register(Box::new(ReefnetReader::new(config.clone())));
        registry.register(Box::new(HoboReader::new(config.clone())));
        registry.register(Box::new(WundergroundReader::new(config.clone())));
        registry
    }

    pub fn empty() -> Self {
        Self { readers: Vec::new() }
    }

    /// Append a reader, tried after the ones already registered
    pub fn register(&mut self, reader: Box<dyn DataFileReader>) {
        self.readers.push(reader);
    }

    pub fn readers(&self) -> impl Iterator<Item = &dyn DataFileReader> {
        self.readers.iter().map(|r| r.as_ref())
    }

    /// The first reader whose sniff accepts the file
    pub fn find(&self, path: &Path) -> Result<&dyn DataFileReader, FileReadingError> {
        let text = read_text(path)?;
        let lines = first_lines(&text, SNIFF_LINES);
        self.readers()
            .find(|reader| reader.sniff(path, &lines))
            .ok_or_else(|| FileReadingError::head(path, 0, "unknown file format"))
    }

    /// Read one file with the reader that recognizes it
    pub fn read(&self, path: &Path, types: &TypeRegistry) -> Result<LoadedFile, FileReadingError> {
        let reader = self.find(path)?;
        debug!("Reading {} as {}", path.display(), reader.name());
        let series = reader.read_file(path, types)?;
        Ok(LoadedFile {
            path: path.to_path_buf(),
            reader: reader.name(),
            series,
        })
    }

    /// Read several files in parallel. Results are in the order of `paths`.
    pub fn read_all(&self, paths: &[PathBuf], types: &TypeRegistry) -> Vec<Result<LoadedFile, FileReadingError>> {
        paths.par_iter().map(|path| self.read(path, types)).collect()
    }

    /// Read files in parallel and register their series, file by file.
    ///
    /// Publishes `FileLoaded` or `FileReadFailed` for each path.
    pub fn load_into(
        &self,
        paths: &[PathBuf],
        types: &TypeRegistry,
        repository: &SeriesRepository,
    ) -> Vec<Result<Vec<SeriesHandle>, FileReadingError>> {
        let bus = repository.event_bus().clone();
        self.read_all(paths, types)
            .into_iter()
            .zip(paths)
            .map(|(result, path)| match result {
                Ok(loaded) => {
                    let count = loaded.series.len();
                    let handles = repository.add_all(loaded.series);
                    info!("Loaded {} series from {} ({})", count, path.display(), loaded.reader);
                    bus.publish(events::FileLoaded {
                        path: loaded.path,
                        reader: loaded.reader.to_string(),
                        series_count: count,
                    });
                    Ok(handles)
                }
                Err(e) => {
                    warn!("{}", e);
                    bus.publish(events::FileReadFailed {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                    Err(e)
                }
            })
            .collect()
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::new(&ReaderConfig::default())
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::predict::elements::TleRecord;
use crate::predict::error::PredictError;
use crate::predict::stores::{build_satellites, CatalogStore};
use crate::predict::types::SatelliteInfo;
use crate::predict::Satellite;

pub struct TleEntry {
    pub info: SatelliteInfo,
    pub record: TleRecord,
}

/// Catalog backed by a folder of `.tle`/`.txt` files.
///
/// Files are only split into records here; element sets are parsed when a
/// round asks for them so that one bad entry only drops that satellite.
pub struct TleLoader {
    tle_dir: PathBuf,
    satellites: HashMap<u32, TleEntry>,
}

impl TleLoader {
    pub fn new(tle_dir: PathBuf) -> Self {
        Self {
            tle_dir,
            satellites: HashMap::new(),
        }
    }

    /// Load all TLE files from the directory
    pub fn load_all(&mut self) -> Result<(), PredictError> {
        if !self.tle_dir.exists() {
            return Err(PredictError::DirectoryNotFound(
                self.tle_dir.display().to_string(),
            ));
        }

        self.satellites.clear();

        let entries = fs::read_dir(&self.tle_dir)?;
        for entry in entries {
            let path = entry?.path();
            let is_tle = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == "tle" || ext == "txt");
            if !is_tle {
                continue;
            }

            match self.parse_tle_file(&path) {
                Ok(entries) => {
                    for tle_entry in entries {
                        self.satellites.insert(tle_entry.info.norad_id, tle_entry);
                    }
                }
                Err(e) => {
                    log::warn!("Failed to parse TLE file {}: {}", path.display(), e);
                }
            }
        }

        log::info!(
            "Loaded {} TLE records from {}",
            self.satellites.len(),
            self.tle_dir.display()
        );
        Ok(())
    }

    /// Split a single TLE file (may contain multiple satellites) into records
    fn parse_tle_file(&self, path: &Path) -> Result<Vec<TleEntry>, PredictError> {
        let content = fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let mut results = Vec::new();
        for record in parse_multi_tle(&content) {
            let Some(norad_id) = record.norad_id() else {
                log::warn!("{}: skipping TLE without catalog number", filename);
                continue;
            };
            let name = record
                .name
                .clone()
                .unwrap_or_else(|| format!("NORAD {}", norad_id));

            results.push(TleEntry {
                info: SatelliteInfo {
                    name,
                    norad_id,
                    tle_source: filename.clone(),
                },
                record,
            });
        }

        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.satellites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.satellites.is_empty()
    }

    /// Parse every record, returning the ones that fail to load.
    pub fn invalid_entries(&self) -> Vec<(&SatelliteInfo, PredictError)> {
        let mut invalid: Vec<_> = self
            .satellites
            .values()
            .filter_map(|entry| {
                Satellite::from_tle(&entry.record)
                    .err()
                    .map(|e| (&entry.info, e))
            })
            .collect();
        invalid.sort_by_key(|(info, _)| info.norad_id);
        invalid
    }
}

impl CatalogStore for TleLoader {
    fn selected_satellites(&self, norad_ids: &[u32]) -> Vec<Satellite> {
        build_satellites(norad_ids, |id| self.satellites.get(&id).map(|e| &e.record))
    }

    fn entries(&self) -> Vec<SatelliteInfo> {
        let mut entries: Vec<_> = self.satellites.values().map(|e| e.info.clone()).collect();
        entries.sort_by_key(|e| e.norad_id);
        entries
    }
}

/// Parse multi-satellite TLE content
fn parse_multi_tle(content: &str) -> Vec<TleRecord> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            // 2-line TLE (no name)
            result.push(TleRecord::new(None, lines[i], lines[i + 1]));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            // 3-line TLE, name may carry a "0 " prefix
            let name = lines[i].strip_prefix("0 ").unwrap_or(lines[i]);
            result.push(TleRecord::new(Some(name), lines[i + 1], lines[i + 2]));
            i += 3;
        } else {
            i += 1; // Skip unknown line
        }
    }

    result
}

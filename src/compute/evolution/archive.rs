//! Generation archive: one best-creature file per generation plus an index.
//!
//! Layout of the output directory:
//!
//! ```text
//! creature_0.json
//! creature_1.json
//! ...
//! creatures.json     ["creature_0.json", "creature_1.json", ...]
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::schema::Creature;

use super::search::GenerationReport;

/// File name of the generation index.
pub const INDEX_FILE: &str = "creatures.json";

/// File name for a generation's best creature.
pub fn generation_file(generation: usize) -> String {
    format!("creature_{generation}.json")
}

fn is_generation_file(name: &str) -> bool {
    name.strip_prefix("creature_")
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Writes per-generation results to a directory.
#[derive(Debug)]
pub struct GenerationArchive {
    output_dir: PathBuf,
    /// Saved file names, in generation order.
    files: Vec<String>,
}

impl GenerationArchive {
    /// Open an archive, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let output_dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            files: Vec::new(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File names saved so far, in generation order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Delete every generation file and the index from the directory.
    pub fn reset(&mut self) -> io::Result<()> {
        for entry in fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == INDEX_FILE || is_generation_file(name) {
                fs::remove_file(&path)?;
            }
        }
        self.files.clear();
        Ok(())
    }

    /// Save a generation's best creature.
    pub fn save_generation(&mut self, report: &GenerationReport) -> io::Result<PathBuf> {
        let filename = generation_file(report.generation);
        let path = self.output_dir.join(&filename);

        let json = report.best.to_json_pretty()?;
        fs::write(&path, json)?;

        self.files.push(filename);
        Ok(path)
    }

    /// Write the index listing every saved generation file.
    pub fn write_index(&self) -> io::Result<PathBuf> {
        let path = self.output_dir.join(INDEX_FILE);
        let json = serde_json::to_string_pretty(&self.files)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    /// Read the index of a directory.
    pub fn load_index<P: AsRef<Path>>(dir: P) -> io::Result<Vec<String>> {
        let content = fs::read_to_string(dir.as_ref().join(INDEX_FILE))?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Load a creature from file.
pub fn load_creature<P: AsRef<Path>>(path: P) -> io::Result<Creature> {
    let content = fs::read_to_string(path)?;
    Creature::from_json(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

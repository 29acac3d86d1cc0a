//! On-disk layout of a persisted vector store.
//!
//! Two artifacts share a base path: the bincode-encoded index at the base
//! path itself and the chunk log as a JSON array at `<base>.texts.json`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;
use crate::services::index::FlatL2Index;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFiles {
    index_path: PathBuf,
    texts_path: PathBuf,
}

impl IndexFiles {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let index_path = base.into();
        let texts_path = index_path.with_extension("texts.json");
        Self {
            index_path,
            texts_path,
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn texts_path(&self) -> &Path {
        &self.texts_path
    }

    /// Write both artifacts. Each file is written to a sibling temp file
    /// first and renamed into place.
    pub fn save(&self, index: &FlatL2Index, texts: &[String]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.index_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        write_atomic(&self.index_path, |writer| {
            bincode::serialize_into(writer, index).map_err(PersistenceError::from)
        })?;
        write_atomic(&self.texts_path, |writer| {
            serde_json::to_writer(writer, texts).map_err(PersistenceError::from)
        })?;
        Ok(())
    }

    /// Load both artifacts.
    ///
    /// Returns `Ok(None)` when neither file exists. A lone file, a decoding
    /// failure or disagreeing counts are errors.
    pub fn load(&self) -> Result<Option<(FlatL2Index, Vec<String>)>, PersistenceError> {
        let has_index = self.index_path.exists();
        let has_texts = self.texts_path.exists();

        match (has_index, has_texts) {
            (false, false) => return Ok(None),
            (true, false) => {
                return Err(PersistenceError::Incomplete(format!(
                    "missing chunk log {}",
                    self.texts_path.display()
                )));
            }
            (false, true) => {
                return Err(PersistenceError::Incomplete(format!(
                    "missing index {}",
                    self.index_path.display()
                )));
            }
            (true, true) => {}
        }

        let index: FlatL2Index =
            bincode::deserialize_from(BufReader::new(File::open(&self.index_path)?))?;
        let texts: Vec<String> =
            serde_json::from_reader(BufReader::new(File::open(&self.texts_path)?))?;

        if !index.is_consistent() {
            return Err(PersistenceError::Incomplete(
                "index buffer is not a whole number of vectors".to_string(),
            ));
        }
        if index.len() != texts.len() {
            return Err(PersistenceError::CountMismatch {
                vectors: index.len(),
                texts: texts.len(),
            });
        }

        Ok(Some((index, texts)))
    }

    /// Delete both artifacts. Missing files are not an error.
    pub fn remove(&self) -> Result<(), PersistenceError> {
        for path in [&self.index_path, &self.texts_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn write_atomic<F>(path: &Path, write: F) -> Result<(), PersistenceError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), PersistenceError>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut writer = BufWriter::new(File::create(&tmp)?);
    write(&mut writer)?;
    writer.flush()?;
    drop(writer);

    fs::rename(&tmp, path)?;
    Ok(())
}

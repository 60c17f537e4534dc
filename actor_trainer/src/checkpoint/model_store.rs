//! Directory-backed store of named burn modules.

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "bin";
const TARGET_SUFFIX: &str = "_target";

/// Error type for persistence operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    /// No stored model at this path.
    NotFound(PathBuf),
    /// Model name is empty or contains a path separator.
    InvalidName(String),
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::NotFound(p) => write!(f, "No model stored at {}", p.display()),
            CheckpointError::InvalidName(n) => write!(f, "Invalid model name: {:?}", n),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// Which of an agent's two models a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelKind {
    /// The model being trained and queried for actions.
    Online,
    /// The slowly tracking copy used for bootstrapped targets.
    Target,
}

/// A record found in the store directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredModel {
    pub name: String,
    pub kind: ModelKind,
    pub path: PathBuf,
}

/// Saves and loads burn modules by name under one directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Open a store, creating `dir` if it doesn't exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path of `name`'s `kind` record.
    pub fn path_for(&self, name: &str, kind: ModelKind) -> Result<PathBuf, CheckpointError> {
        validate_name(name)?;
        let stem = match kind {
            ModelKind::Online => name.to_string(),
            ModelKind::Target => format!("{}{}", name, TARGET_SUFFIX),
        };
        Ok(self.dir.join(format!("{}.{}", stem, EXTENSION)))
    }

    /// Write `model` as `name`'s `kind` record, replacing any previous one.
    pub fn save<B: Backend, M: Module<B>>(
        &self,
        model: &M,
        name: &str,
        kind: ModelKind,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self.path_for(name, kind)?;
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(&path, &recorder)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))?;
        log::debug!("Saved {:?} model {} to {}", kind, name, path.display());
        Ok(path)
    }

    /// Load `name`'s `kind` record into `template`.
    ///
    /// The template must have the architecture the record was saved from,
    /// typically a freshly initialized model.
    pub fn load<B: Backend, M: Module<B>>(
        &self,
        template: M,
        name: &str,
        kind: ModelKind,
        device: &B::Device,
    ) -> Result<M, CheckpointError> {
        let path = self.path_for(name, kind)?;
        if !path.exists() {
            return Err(CheckpointError::NotFound(path));
        }
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        template
            .load_file(&path, &recorder, device)
            .map_err(|e| CheckpointError::Recorder(e.to_string()))
    }

    /// Whether `name`'s `kind` record exists.
    pub fn contains(&self, name: &str, kind: ModelKind) -> bool {
        self.path_for(name, kind)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    /// Every record in the directory, sorted by name then kind.
    pub fn list(&self) -> Result<Vec<StoredModel>, CheckpointError> {
        let mut models: Vec<StoredModel> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                if path.extension()?.to_str()? != EXTENSION {
                    return None;
                }
                let stem = path.file_stem()?.to_str()?;
                let (name, kind) = match stem.strip_suffix(TARGET_SUFFIX) {
                    Some(name) if !name.is_empty() => (name.to_string(), ModelKind::Target),
                    _ => (stem.to_string(), ModelKind::Online),
                };
                Some(StoredModel { name, kind, path })
            })
            .collect();

        models.sort_by(|a, b| (&a.name, a.kind).cmp(&(&b.name, b.kind)));
        Ok(models)
    }
}

fn validate_name(name: &str) -> Result<(), CheckpointError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.ends_with(TARGET_SUFFIX);
    if bad {
        return Err(CheckpointError::InvalidName(name.to_string()));
    }
    Ok(())
}

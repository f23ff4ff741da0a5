//! Approximator checkpoints on disk.
//!
//! Layout under the store directory:
//!
//! ```text
//! ep00025.bin
//! ep00050.bin
//! final.bin
//! ```

use crate::approximator::QFunction;
use crate::error::Result;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

const FINAL_NAME: &str = "final.bin";

#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        CheckpointStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn episode_path(&self, episode: usize) -> PathBuf {
        self.dir.join(format!("ep{:05}.bin", episode))
    }

    pub fn final_path(&self) -> PathBuf {
        self.dir.join(FINAL_NAME)
    }

    pub fn save_episode<Q: QFunction + ?Sized>(&self, q: &Q, episode: usize) -> Result<PathBuf> {
        self.write(q, self.episode_path(episode))
    }

    pub fn save_final<Q: QFunction + ?Sized>(&self, q: &Q) -> Result<PathBuf> {
        self.write(q, self.final_path())
    }

    fn write<Q: QFunction + ?Sized>(&self, q: &Q, path: PathBuf) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        q.save(&path)?;
        info!("Saved checkpoint {}", path.display());
        Ok(path)
    }

    /// Episode indices with a checkpoint, ascending. A missing directory has none.
    pub fn episodes(&self) -> Result<Vec<usize>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut episodes = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let parsed = name
                .to_str()
                .and_then(|n| n.strip_prefix("ep"))
                .and_then(|n| n.strip_suffix(".bin"))
                .and_then(|n| n.parse::<usize>().ok());
            if let Some(episode) = parsed {
                episodes.push(episode);
            }
        }
        episodes.sort_unstable();
        Ok(episodes)
    }

    pub fn load_episode<Q: QFunction + ?Sized>(&self, q: &mut Q, episode: usize) -> Result<PathBuf> {
        let path = self.episode_path(episode);
        q.load(&path)?;
        info!("Loaded checkpoint {}", path.display());
        Ok(path)
    }

    /// Loads the checkpoint of the highest episode, or `final.bin` when no
    /// episode checkpoint exists.
    ///
    /// Returns `Ok(None)` and leaves `q` untouched when there is nothing to
    /// load, including when the directory does not exist.
    pub fn load_latest<Q: QFunction + ?Sized>(&self, q: &mut Q) -> Result<Option<PathBuf>> {
        let path = match self.episodes()?.last() {
            Some(&episode) => self.episode_path(episode),
            None if self.final_path().is_file() => self.final_path(),
            None => {
                debug!("No checkpoint found in {}", self.dir.display());
                return Ok(None);
            }
        };
        q.load(&path)?;
        info!("Loaded checkpoint {}", path.display());
        Ok(Some(path))
    }
}

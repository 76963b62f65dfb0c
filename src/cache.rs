use anyhow::Context;
use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::{types::ScrapeResult, utils::get_random_string};

/// Durable home of the single last good [`ScrapeResult`].
///
/// Writes go to a sibling temp file that is renamed over the record, so a
/// reader sees either the old record or the new one and a crash mid-write
/// leaves the old one untouched.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CacheStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when nothing was ever stored. An unreadable record counts as
    /// missing so the next scrape can replace it.
    pub fn load(&self) -> anyhow::Result<Option<ScrapeResult>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).context(format!("could not read cache at {:?}", self.path))
            }
        };
        match serde_json::from_slice::<ScrapeResult>(&bytes) {
            Ok(r) => Ok(Some(r)),
            Err(e) => {
                warn!("ignoring corrupt cache at {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, result: &ScrapeResult) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(result).context("could not serialize result")?;
        let tmp = self.write_temp(&bytes)?;
        if let Err(e) = self.commit(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        debug!("cache written to {:?} ({} banners)", self.path, result.count);
        Ok(())
    }

    pub(crate) fn write_temp(&self, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("could not create cache directory {:?}", parent))?;
            }
        }
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("cache");
        let tmp = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, get_random_string(8)));

        fill_temp(&tmp, |file| {
            file.write_all(bytes)
                .context(format!("could not write temp file {:?}", tmp))?;
            file.sync_all()
                .context(format!("could not flush temp file {:?}", tmp))
        })?;
        Ok(tmp)
    }

    pub(crate) fn commit(&self, tmp: &Path) -> anyhow::Result<()> {
        fs::rename(tmp, &self.path).context(format!(
            "could not move {:?} over {:?}",
            tmp, self.path
        ))
    }
}

// a temp file that could not be filled is removed again
fn fill_temp<F>(tmp: &Path, fill: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut File) -> anyhow::Result<()>,
{
    let mut file = File::create(tmp).context(format!("could not create temp file {:?}", tmp))?;
    if let Err(e) = fill(&mut file) {
        drop(file);
        let _ = fs::remove_file(tmp);
        return Err(e);
    }
    Ok(())
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::composite::StyleOptions;
use crate::metadata::MusicMetadata;

const INDEX_FILE: &str = "history.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub metadata: MusicMetadata,
    pub options: StyleOptions,
    /// PNG file name relative to the history directory
    pub image_file: String,
}

pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_path(&self, entry: &HistoryEntry) -> PathBuf {
        self.dir.join(&entry.image_file)
    }

    /// Records a rendered card. Failures are logged and otherwise ignored.
    pub fn save(&self, image: &RgbaImage, metadata: &MusicMetadata, options: &StyleOptions) {
        match self.try_save(image, metadata, options) {
            Ok(entry) => info!("Saved {} to history", entry.image_file),
            Err(e) => warn!("could not save to history: {e:#}"),
        }
    }

    fn try_save(
        &self,
        image: &RgbaImage,
        metadata: &MusicMetadata,
        options: &StyleOptions,
    ) -> Result<HistoryEntry> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        // A broken index must not leave an orphaned image behind.
        let mut entries = self.load()?;

        let id = Uuid::new_v4();
        let entry = HistoryEntry {
            id,
            created_at: Utc::now(),
            metadata: metadata.clone(),
            options: options.clone(),
            image_file: format!("{id}.png"),
        };

        image
            .save(self.image_path(&entry))
            .context("Failed to write history image")?;

        entries.insert(0, entry.clone());
        self.write_index(&entries)?;
        Ok(entry)
    }

    /// All entries, newest first. No index yet means no history.
    pub fn load(&self) -> Result<Vec<HistoryEntry>> {
        let path = self.dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Deletes one entry and its image. Returns whether it existed.
    pub fn remove(&self, id: Uuid) -> Result<bool> {
        let mut entries = self.load()?;
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        let entry = entries.remove(pos);
        self.delete_image(&entry);
        self.write_index(&entries)?;
        Ok(true)
    }

    /// Deletes every entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let entries = self.load()?;
        for entry in &entries {
            self.delete_image(entry);
        }
        self.write_index(&[])?;
        Ok(entries.len())
    }

    fn delete_image(&self, entry: &HistoryEntry) {
        let path = self.image_path(entry);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("could not delete {}: {e}", path.display());
        }
    }

    fn write_index(&self, entries: &[HistoryEntry]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(INDEX_FILE);
        let tmp = self.dir.join(format!("{INDEX_FILE}.tmp"));
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

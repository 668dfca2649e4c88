//! File-backed persistence for the dashboard records.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use replymate_core::{DataPaths, Result};

use crate::records::*;
use crate::stats::{review_stats, ReviewPeriod, ReviewStats, SentimentFilter};

/// Read a JSON file; a missing or malformed file yields the default value.
pub fn load_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => {
            debug!("{} not found, starting empty", path.display());
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Ignoring malformed {}: {}", path.display(), e);
        T::default()
    })
}

/// Read a JSON file before rewriting it. A missing file yields the default
/// value; a file that exists but does not parse is an error, so the caller
/// never writes a fresh list over records it could not read.
pub fn load_json_strict<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&raw).map_err(|e| {
        warn!("Refusing to rewrite malformed {}: {}", path.display(), e);
        e.into()
    })
}

/// Write pretty-printed UTF-8 JSON, creating parent directories.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    debug!("Saved {}", path.display());
    Ok(())
}

/// Owns the JSON files under the data directory.
///
/// Every operation reads the file fresh so edits made by other tools are
/// picked up. Writes are serialized through one lock.
pub struct DataStore {
    templates_file: PathBuf,
    menu_file: PathBuf,
    saved_reviews_file: PathBuf,
    drafts_file: PathBuf,
    store_file: PathBuf,
    default_store_name: String,
    write_lock: Mutex<()>,
}

impl DataStore {
    pub fn new(paths: &DataPaths, default_store_name: impl Into<String>) -> Self {
        Self {
            templates_file: paths.templates_file.clone(),
            menu_file: paths.menu_file.clone(),
            saved_reviews_file: paths.saved_reviews_file.clone(),
            drafts_file: paths.drafts_file.clone(),
            store_file: paths.store_file.clone(),
            default_store_name: default_store_name.into(),
            write_lock: Mutex::new(()),
        }
    }

    // ---------------------------------------------------------------
    // Templates
    // ---------------------------------------------------------------

    pub fn load_templates(&self) -> Vec<Template> {
        load_json(&self.templates_file)
    }

    pub fn save_templates(&self, templates: &[Template]) -> Result<()> {
        let _guard = self.write_lock.lock();
        save_json(&self.templates_file, templates)
    }

    /// Append a template; existing entries are untouched.
    pub fn add_template(&self, template: Template) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let mut templates: Vec<Template> = load_json_strict(&self.templates_file)?;
        templates.push(template);
        save_json(&self.templates_file, &templates)?;
        Ok(templates.len())
    }

    pub fn owner_templates(&self) -> Vec<Template> {
        self.load_templates()
            .into_iter()
            .filter(Template::is_owner_custom)
            .collect()
    }

    // ---------------------------------------------------------------
    // Menu
    // ---------------------------------------------------------------

    pub fn load_menu(&self) -> Vec<MenuItem> {
        load_json(&self.menu_file)
    }

    /// Replace the whole menu. Blank names are dropped.
    pub fn save_menu(&self, items: &[MenuItem]) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let kept: Vec<&MenuItem> = items
            .iter()
            .filter(|m| !m.menu_name.trim().is_empty())
            .collect();
        save_json(&self.menu_file, &kept)?;
        info!("Saved {} menu items", kept.len());
        Ok(kept.len())
    }

    // ---------------------------------------------------------------
    // Completed reviews
    // ---------------------------------------------------------------

    pub fn load_completed_reviews(&self) -> Vec<CompletedReview> {
        load_json(&self.saved_reviews_file)
    }

    /// Replace the record with the same id in place, or append it.
    pub fn upsert_completed_review(&self, review: CompletedReview) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut reviews: Vec<CompletedReview> = load_json_strict(&self.saved_reviews_file)?;
        match reviews.iter_mut().find(|r| r.id == review.id) {
            Some(existing) => {
                debug!("Updating completed review {}", review.id);
                *existing = review;
            }
            None => reviews.push(review),
        }
        save_json(&self.saved_reviews_file, &reviews)
    }

    pub fn review_stats(&self, period: ReviewPeriod, filter: SentimentFilter) -> ReviewStats {
        let now = chrono::Local::now().naive_local();
        review_stats(&self.load_completed_reviews(), period, filter, now)
    }

    // ---------------------------------------------------------------
    // Drafts
    // ---------------------------------------------------------------

    pub fn load_drafts(&self) -> Vec<Draft> {
        load_json(&self.drafts_file)
    }

    /// Drafts for a read-modify-write cycle; malformed files are an error.
    pub fn read_drafts(&self) -> Result<Vec<Draft>> {
        load_json_strict(&self.drafts_file)
    }

    pub fn save_drafts(&self, drafts: &[Draft]) -> Result<()> {
        let _guard = self.write_lock.lock();
        save_json(&self.drafts_file, drafts)
    }

    /// Drafts not yet saved as completed reviews.
    pub fn active_drafts(&self) -> Vec<Draft> {
        self.load_drafts()
            .into_iter()
            .filter(|d| d.status != DraftStatus::Saved)
            .collect()
    }

    // ---------------------------------------------------------------
    // Store profile
    // ---------------------------------------------------------------

    pub fn store_profile(&self) -> StoreProfile {
        let profile: Option<StoreProfile> = load_json(&self.store_file);
        profile
            .filter(|p| !p.store_name.trim().is_empty())
            .unwrap_or_else(|| StoreProfile {
                store_name: self.default_store_name.clone(),
            })
    }

    pub fn save_store_profile(&self, profile: &StoreProfile) -> Result<()> {
        let _guard = self.write_lock.lock();
        save_json(&self.store_file, profile)
    }

    // ---------------------------------------------------------------
    // Reset
    // ---------------------------------------------------------------

    /// Clear completed reviews and drop owner-custom templates. Seed
    /// templates are kept as they are. Returns the number of templates removed.
    pub fn reset(&self) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let templates: Vec<Template> = load_json_strict(&self.templates_file)?;
        save_json::<[CompletedReview]>(&self.saved_reviews_file, &[])?;

        let before = templates.len();
        let kept: Vec<Template> = templates
            .into_iter()
            .filter(|t| !t.is_owner_custom())
            .collect();
        let removed = before - kept.len();

        if removed > 0 {
            save_json(&self.templates_file, &kept)?;
            info!("Removed {} custom templates", removed);
        } else {
            info!("No custom templates to remove");
        }
        Ok(removed)
    }
}

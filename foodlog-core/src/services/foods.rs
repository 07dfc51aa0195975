// Foods catalog: one note per distinct ingredient name

use std::path::{Path, PathBuf};

use color_eyre::Result;
use tracing::debug;

use crate::markdown::{original_name_line, render_catalog_note};
use crate::normalize::{sanitize_filename, DEFAULT_MAX_FILENAME_LEN};
use crate::store::{Ensured, FileStore};

use super::FOODS_DIR;

/// Creates catalog notes on first sight of an ingredient
#[derive(Debug, Clone)]
pub struct FoodsService {
    store: FileStore,
    foods_dir: PathBuf,
}

impl FoodsService {
    pub fn new(store: FileStore) -> Self {
        Self::with_dir(store, FOODS_DIR)
    }

    pub fn with_dir(store: FileStore, foods_dir: impl Into<PathBuf>) -> Self {
        FoodsService {
            store,
            foods_dir: foods_dir.into(),
        }
    }

    pub fn foods_dir(&self) -> &Path {
        &self.foods_dir
    }

    /// Make sure every name has a catalog note; returns one path per input name.
    ///
    /// Existing notes are never touched. Names whose slugs coincide get
    /// separate, suffixed files.
    pub fn ensure_notes<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(names.len());

        for name in names.iter().map(AsRef::as_ref) {
            let filename = format!("{}.md", sanitize_filename(name, DEFAULT_MAX_FILENAME_LEN));
            let ensured = self.store.ensure_file(
                self.foods_dir.join(filename),
                &render_catalog_note(name),
                &original_name_line(name),
            )?;

            if let Ensured::Created(ref path) = ensured {
                debug!(food = name, path = %path.display(), "created catalog note");
            }
            paths.push(ensured.into_path());
        }

        Ok(paths)
    }
}

// Scoped file store for markdown notes
// Every path is confined under one data root; writes go through a temp file + rename

use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use rand::Rng;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Upper bound on `-N` suffixes tried before giving up on a crowded slug
const MAX_COLLISION_SUFFIX: usize = 1000;

/// What `ensure_file` did for a requested note
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensured {
    /// A new file was written
    Created(PathBuf),
    /// A file for the same identity already existed and was left untouched
    Existing(PathBuf),
}

impl Ensured {
    pub fn path(&self) -> &Path {
        match self {
            Ensured::Created(path) | Ensured::Existing(path) => path,
        }
    }

    pub fn into_path(self) -> PathBuf {
        match self {
            Ensured::Created(path) | Ensured::Existing(path) => path,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Ensured::Created(_))
    }
}

/// File store rooted at the configured data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore { root: root.into() }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path against the root, rejecting anything that escapes it
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        let mut resolved = self.root.clone();
        let mut depth = 0usize;

        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(eyre!(
                        "Path escapes the data root: {}",
                        relative.display()
                    ));
                }
            }
        }

        if depth == 0 {
            return Err(eyre!("Path does not name a file: {}", relative.display()));
        }

        Ok(resolved)
    }

    /// Write (or overwrite) a file atomically and return its absolute path
    pub fn write_text(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let target = self.resolve(relative)?;
        let tmp_path = self.write_temp(&target, content)?;

        if let Err(e) = fs::rename(&tmp_path, &target) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e)
                .with_context(|| format!("Failed to move {} into place", target.display()));
        }

        Ok(target)
    }

    /// Create a file with `default_content` unless one for the same identity exists.
    ///
    /// `identity` is a line that only files written for the same logical name
    /// contain. When the requested filename is taken by a file lacking that
    /// line, `name-2.ext`, `name-3.ext`, ... are tried instead.
    pub fn ensure_file(
        &self,
        relative: impl AsRef<Path>,
        default_content: &str,
        identity: &str,
    ) -> Result<Ensured> {
        let first = self.resolve(relative)?;

        for attempt in 1..=MAX_COLLISION_SUFFIX {
            let candidate = if attempt == 1 {
                first.clone()
            } else {
                with_suffix(&first, attempt)
            };

            if candidate.exists() {
                if file_has_line(&candidate, identity)? {
                    return Ok(Ensured::Existing(candidate));
                }
                continue;
            }

            if self.create_new(&candidate, default_content)? {
                return Ok(Ensured::Created(candidate));
            }

            // Lost a race with another writer: re-check what landed there
            if file_has_line(&candidate, identity)? {
                return Ok(Ensured::Existing(candidate));
            }
        }

        Err(eyre!(
            "Too many colliding files for {}",
            first.display()
        ))
    }

    /// Append text to a file, creating it and its directories if needed
    pub fn append_text(&self, relative: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let target = self.resolve(relative)?;
        ensure_parent(&target)?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target)
            .with_context(|| format!("Failed to open {}", target.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to append to {}", target.display()))?;

        Ok(target)
    }

    /// Count `.md` files directly inside a subdirectory of the root
    pub fn count_notes(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = self.resolve(dir)?;
        if !dir.exists() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Write content to a hidden sibling temp file, flushed to disk
    fn write_temp(&self, target: &Path, content: &str) -> Result<PathBuf> {
        ensure_parent(target)?;

        let file_name = target
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| eyre!("Invalid file name: {}", target.display()))?;
        let nonce: u32 = rand::thread_rng().gen();
        let tmp_path = target.with_file_name(format!(".{}.{:08x}.tmp", file_name, nonce));

        let mut tmp_file = fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        tmp_file.write_all(content.as_bytes())?;
        tmp_file.sync_all()?;

        Ok(tmp_path)
    }

    /// Publish content at `target` only if nothing is there yet.
    ///
    /// Returns false when another file won the race.
    fn create_new(&self, target: &Path, content: &str) -> Result<bool> {
        let tmp_path = self.write_temp(target, content)?;

        // hard_link refuses to replace an existing file, unlike rename
        let linked = fs::hard_link(&tmp_path, target);
        let _ = fs::remove_file(&tmp_path);

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to create {}", target.display())),
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn file_has_line(path: &Path, line: &str) -> Result<bool> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content.lines().any(|l| l.trim_end() == line))
}

/// `dir/name.ext` -> `dir/name-N.ext`
fn with_suffix(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}-{}", stem, n),
    };
    path.with_file_name(file_name)
}

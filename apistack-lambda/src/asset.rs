//! Function code sources

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::FileOptions;

use crate::function::{LambdaError, Runtime};

pub use apistack_core::assets::ASSETS_BUCKET;

/// Where a function's code comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Code {
    /// Local directory, zipped and uploaded to the assets bucket at deploy
    Asset { path: PathBuf, hash: String },
    /// Inline source, limited to a single file
    Inline(String),
}

impl Code {
    /// Load a local directory as an asset, hashing its contents
    pub fn from_asset(path: impl AsRef<Path>) -> Result<Self, LambdaError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(LambdaError::Asset(format!(
                "Cannot find asset at {}",
                path.display()
            )));
        }

        let hash = hash_directory(path)?;
        debug!(path = %path.display(), hash = %hash, "Hashed code asset");
        Ok(Self::Asset {
            path: path.to_path_buf(),
            hash,
        })
    }

    pub fn from_inline(source: impl Into<String>) -> Result<Self, LambdaError> {
        let source = source.into();
        if source.is_empty() {
            return Err(LambdaError::InvalidProps("inline code must not be empty".to_string()));
        }
        Ok(Self::Inline(source))
    }

    /// Content hash of an asset directory
    pub fn asset_hash(&self) -> Option<&str> {
        match self {
            Self::Asset { hash, .. } => Some(hash),
            Self::Inline(_) => None,
        }
    }

    /// S3 key of the uploaded asset, `<hash>.zip`
    pub fn object_key(&self) -> Option<String> {
        match self {
            Self::Asset { hash, .. } => Some(format!("{hash}.zip")),
            Self::Inline(_) => None,
        }
    }

    pub fn to_cfn(&self) -> serde_json::Value {
        match self {
            Self::Asset { hash, .. } => serde_json::json!({
                "S3Bucket": { "Fn::Sub": ASSETS_BUCKET },
                "S3Key": format!("{hash}.zip"),
            }),
            Self::Inline(source) => serde_json::json!({ "ZipFile": source }),
        }
    }

    /// Name of the staged archive inside the output directory
    pub fn staged_file_name(&self) -> Option<String> {
        match self {
            Self::Asset { hash, .. } => Some(format!("asset.{hash}.zip")),
            Self::Inline(_) => None,
        }
    }

    /// Zip the asset directory into `out_dir`, ready for upload
    ///
    /// Entries are written in sorted order with a fixed timestamp, so the
    /// archive only changes when the hashed contents do. Inline code has
    /// nothing to stage.
    pub fn stage(&self, out_dir: &Path) -> Result<Option<PathBuf>, LambdaError> {
        let Self::Asset { path, hash } = self else {
            return Ok(None);
        };

        let target = out_dir.join(format!("asset.{hash}.zip"));
        let file = fs::File::create(&target).map_err(|e| {
            LambdaError::Asset(format!("Cannot create {}: {e}", target.display()))
        })?;

        let mut writer = zip::ZipWriter::new(file);
        let options = FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let files = asset_files(path)?;
        for relative in &files {
            let contents = read_asset_file(path, relative)?;
            writer
                .start_file(entry_name(relative), options)
                .map_err(|e| LambdaError::Asset(e.to_string()))?;
            writer.write_all(&contents).map_err(|e| {
                LambdaError::Asset(format!("Cannot write {}: {e}", target.display()))
            })?;
        }
        writer
            .finish()
            .map_err(|e| LambdaError::Asset(e.to_string()))?;

        info!(path = %target.display(), files = files.len(), "Staged code asset");
        Ok(Some(target))
    }

    /// Warn when the asset has no module matching the handler's entry point
    ///
    /// The asset is opaque to the stack, so a mismatch is not an error.
    pub fn check_entry_point(&self, handler: &str, runtime: Runtime) -> bool {
        let Self::Asset { path, .. } = self else {
            return true;
        };
        let Some((module, _export)) = handler.rsplit_once('.') else {
            return false;
        };

        let found = runtime
            .module_extensions()
            .iter()
            .any(|ext| path.join(format!("{module}.{ext}")).is_file());
        if !found {
            warn!(
                path = %path.display(),
                handler = %handler,
                "Asset has no module for the handler entry point"
            );
        }
        found
    }
}

/// SHA-256 over every file's relative path and contents, in sorted order
fn hash_directory(root: &Path) -> Result<String, LambdaError> {
    let mut hasher = Sha256::new();
    for relative in asset_files(root)? {
        let contents = read_asset_file(root, &relative)?;
        hasher.update(entry_name(&relative).as_bytes());
        hasher.update([0u8]);
        hasher.update(&contents);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Regular files below `root`, relative and sorted
fn asset_files(root: &Path) -> Result<Vec<PathBuf>, LambdaError> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

fn read_asset_file(root: &Path, relative: &Path) -> Result<Vec<u8>, LambdaError> {
    fs::read(root.join(relative))
        .map_err(|e| LambdaError::Asset(format!("Cannot read {}: {e}", relative.display())))
}

/// Archive entry name, always with forward slashes
fn entry_name(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}

// Symlinks are skipped so a link to an ancestor cannot recurse.
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), LambdaError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| LambdaError::Asset(format!("Cannot list {}: {e}", dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| LambdaError::Asset(e.to_string()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| LambdaError::Asset(format!("Cannot stat {}: {e}", path.display())))?;

        if file_type.is_symlink() {
            warn!(path = %path.display(), "Skipping symlink in code asset");
        } else if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

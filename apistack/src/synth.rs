//! Cloud assembly output
//!
//! Synthesis writes the template, the staged code archive and the asset
//! manifest naming where the publisher uploads each of them.

use apistack_core::assets::{manifest_file_name, AssetManifest, AssetSource, Packaging};
use apistack_core::{ErrorCode, StackError};
use clap::ValueEnum;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::StackConfig;
use crate::stack::define;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TemplateFormat {
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Files written by one synthesis
#[derive(Debug, Clone)]
pub struct Assembly {
    pub template: PathBuf,
    pub asset_manifest: PathBuf,
    /// Staged code archives
    pub assets: Vec<PathBuf>,
}

/// Define the stack and write its assembly into `out_dir`
pub fn synthesize(
    config: &StackConfig,
    out_dir: &Path,
    format: TemplateFormat,
) -> Result<Assembly, StackError> {
    let defined = define(config)?;
    let stack = &defined.stack;

    let body = match format {
        TemplateFormat::Json => stack.to_json()?,
        TemplateFormat::Yaml => stack.to_yaml()?,
    };
    fs::create_dir_all(out_dir).map_err(|e| write_error(out_dir, e))?;

    let template_name = stack.template_file_name(format.extension());
    let template = out_dir.join(&template_name);
    write_file(&template, &body)?;

    let mut manifest = AssetManifest::new();
    let template_hash = hex::encode(Sha256::digest(body.as_bytes()));
    manifest.add_file(
        stack.env(),
        template_hash.as_str(),
        AssetSource {
            path: template_name,
            packaging: Packaging::File,
        },
        format!("{template_hash}.{}", format.extension()),
    );

    let mut assets = Vec::new();
    let code = &defined.function.props().code;
    if let (Some(hash), Some(file_name), Some(object_key)) =
        (code.asset_hash(), code.staged_file_name(), code.object_key())
    {
        assets.extend(code.stage(out_dir)?);
        manifest.add_file(
            stack.env(),
            hash,
            AssetSource {
                path: file_name,
                packaging: Packaging::File,
            },
            object_key,
        );
    }

    let asset_manifest = out_dir.join(manifest_file_name(stack.name()));
    write_file(&asset_manifest, &manifest.to_json()?)?;

    info!(
        template = %template.display(),
        manifest = %asset_manifest.display(),
        assets = assets.len(),
        "Assembly written"
    );
    Ok(Assembly {
        template,
        asset_manifest,
        assets,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), StackError> {
    fs::write(path, contents).map_err(|e| write_error(path, e))
}

fn write_error(path: &Path, err: std::io::Error) -> StackError {
    StackError::new(
        ErrorCode::AssetError,
        format!("Cannot write {}: {err}", path.display()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(TemplateFormat::Json.extension(), "json");
        assert_eq!(TemplateFormat::Yaml.extension(), "yaml");
    }

    #[test]
    fn test_unwritable_output_is_asset_error() {
        let asset = tempfile::tempdir().unwrap();
        fs::write(asset.path().join("default-handler.js"), "exports.main = 1;").unwrap();
        let mut config = StackConfig::default();
        config.handler.asset_path = asset.path().to_path_buf();

        // A file where the output directory should be
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let err = synthesize(&config, blocker.path(), TemplateFormat::Json).unwrap_err();
        assert_eq!(err.code, ErrorCode::AssetError);
    }
}

use crate::error::{PipelineError, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

pub const CREDENTIALS_FILE: &str = "kaggle.json";

/// Copy the API token into `dest_dir/kaggle.json`, owner-readable only.
/// A missing source is fatal: no download can succeed without it.
pub fn install(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    if !source.is_file() {
        return Err(PipelineError::MissingCredentials(source.to_path_buf()));
    }
    fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(CREDENTIALS_FILE);
    fs::copy(source, &dest)?;
    restrict_permissions(&dest)?;
    info!(path = %dest.display(), "credentials installed");
    Ok(dest)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

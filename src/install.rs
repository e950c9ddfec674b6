//! `--install`: link the running executable into a user bin directory.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Directory the executable link goes into. `VOXJOT_INSTALL_DIR` overrides
/// the platform default.
fn install_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("VOXJOT_INSTALL_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = dirs::executable_dir() {
        return Ok(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".local").join("bin"))
        .context("could not determine a user bin directory")
}

#[cfg(unix)]
pub fn install_symlink() -> Result<PathBuf> {
    let exe = env::current_exe().context("could not locate the running executable")?;
    let exe = exe
        .canonicalize()
        .with_context(|| format!("could not canonicalize '{}'", exe.display()))?;
    let dir = install_dir()?;
    fs::create_dir_all(&dir).with_context(|| format!("could not create '{}'", dir.display()))?;
    let link = dir.join("voxjot");

    match fs::symlink_metadata(&link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let points_here = fs::read_link(&link)
                .map(|target| target == exe)
                .unwrap_or(false);
            if points_here {
                return Ok(link);
            }
            // Stale link from an earlier build; replace it.
            fs::remove_file(&link)
                .with_context(|| format!("could not replace '{}'", link.display()))?;
        }
        Ok(_) => bail!(
            "'{}' already exists and is not a symlink; remove it first",
            link.display()
        ),
        Err(_) => {}
    }

    std::os::unix::fs::symlink(&exe, &link)
        .with_context(|| format!("could not link '{}'", link.display()))?;
    Ok(link)
}

#[cfg(not(unix))]
pub fn install_symlink() -> Result<PathBuf> {
    bail!("--install is only supported on Unix-like systems");
}

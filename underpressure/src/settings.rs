use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// User preferences remembered between runs. Simulation state is not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) fluid: String,
    pub(crate) object: String,
    pub(crate) fps_cap: u32,
    pub(crate) enable_color: bool,
    pub(crate) level_amplification: f64,
    /// Force arrows and force readouts in the tank.
    pub(crate) show_forces: bool,
    /// Depth line and pressure readouts in the tank.
    pub(crate) show_gauge: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fluid: "water".to_string(),
            object: "cube".to_string(),
            fps_cap: 60,
            enable_color: true,
            level_amplification: 4000.0,
            show_forces: true,
            show_gauge: true,
        }
    }
}

pub(crate) fn settings_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("com", "underpressure", "UnderPressure")
        .context("could not resolve project directories")?;
    let dir = proj.config_dir().to_path_buf();
    fs::create_dir_all(&dir)
        .with_context(|| format!("could not create {}", dir.display()))?;
    Ok(dir.join("settings.json"))
}

pub(crate) fn load_settings(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str::<Settings>(&s).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable {}: {e}", path.display());
            Settings::default()
        }),
        Err(_) => Settings::default(),
    }
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data).with_context(|| format!("could not write {}", tmp.display()))?;
    // replaces the old file in one step; it stays intact if we die before this
    fs::rename(&tmp, path)
        .with_context(|| format!("could not move settings into {}", path.display()))?;
    Ok(())
}

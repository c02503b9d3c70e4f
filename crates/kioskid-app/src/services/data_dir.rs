// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::PathBuf;

/// Return the kiosk data directory, creating it if needed.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = base_dir(
        std::env::var("XDG_DATA_HOME").ok(),
        std::env::var("HOME").ok(),
    )
    .join("kioskid");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

// XDG data dir, then ~/.local/share
fn base_dir(xdg_data_home: Option<String>, home: Option<String>) -> PathBuf {
    if let Some(xdg) = xdg_data_home.filter(|xdg| !xdg.is_empty()) {
        return PathBuf::from(xdg);
    }
    if let Some(home) = home {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}

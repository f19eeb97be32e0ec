//! Session snapshots
//!
//! The grid and compounding state are written as JSON on clean shutdown and
//! read back at startup. A restored grid is not trusted as-is: the next
//! refresh reconciles it against the orders actually resting on the exchange.

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use stablegrid_core::{CompoundingState, Grid, Timestamp};
use stablegrid_strategy::GridConfig;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::Result;
use crate::session::GridSession;

/// Persisted part of a [`GridSession`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub saved_at: Timestamp,
    pub grid: Option<Grid>,
    pub compounding: CompoundingState,
}

impl SessionSnapshot {
    pub fn capture(session: &GridSession) -> Self {
        Self {
            saved_at: Utc::now(),
            grid: session.grid().cloned(),
            compounding: session.compounding().clone(),
        }
    }

    /// Session under `config` resuming from this snapshot
    pub fn into_session(self, config: GridConfig) -> GridSession {
        GridSession::restore(config, self.grid, self.compounding)
    }
}

/// Write `session` to `path`, replacing any previous snapshot
pub fn save(path: &Path, session: &GridSession) -> Result<()> {
    let snapshot = SessionSnapshot::capture(session);
    let json = serde_json::to_string_pretty(&snapshot)?;

    // Atomic replace
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;

    info!(
        "Saved session to {} ({} levels)",
        path.display(),
        snapshot.grid.as_ref().map_or(0, Grid::len)
    );
    Ok(())
}

/// Read the snapshot at `path`; `None` when there is none yet
pub fn load(path: &Path) -> Result<Option<SessionSnapshot>> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let snapshot: SessionSnapshot = serde_json::from_str(&json)?;
    info!(
        "Loaded session from {} saved at {}",
        path.display(),
        snapshot.saved_at
    );
    Ok(Some(snapshot))
}

/// Session for `config`, resumed from `config.state_path` when a snapshot exists
pub fn resume_or_new(config: GridConfig) -> Result<GridSession> {
    let snapshot = match &config.state_path {
        Some(path) => load(path)?,
        None => None,
    };
    Ok(match snapshot {
        Some(snapshot) => snapshot.into_session(config),
        None => GridSession::new(config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stablegrid_core::{GridLevel, LevelState, OrderRef, Side};
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stablegrid-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let path = scratch("missing");
        let _ = fs::remove_file(&path);
        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn test_saved_session_restores_levels() {
        let path = scratch("restore");
        let config = GridConfig {
            state_path: Some(path.clone()),
            ..Default::default()
        };
        let mut session = GridSession::new(config.clone());
        let mut grid = Grid::new(
            vec![
                GridLevel::new(dec!(0.9900), Side::Buy, dec!(11.11)),
                GridLevel::new(dec!(1.0100), Side::Sell, dec!(11)),
            ],
            config.shape(),
            dec!(1.0202),
            dec!(1.0000),
        )
        .unwrap();
        grid.level_mut(1).unwrap().mark_open(OrderRef(42));
        session.replace_grid(grid);
        session.compounding_mut().record_round_trip(dec!(0.1));

        save(&path, &session).unwrap();
        let restored = resume_or_new(config).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(restored.grid(), session.grid());
        assert_eq!(restored.compounding(), session.compounding());
        let level = &restored.grid().unwrap().levels()[1];
        assert_eq!(level.state(), LevelState::Open);
        assert_eq!(level.order_ref(), Some(OrderRef(42)));
    }
}

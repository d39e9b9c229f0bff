use std::time::SystemTime;

use tracing::{error, info, warn};

use crate::state::{AppState, IndexStatus};

/// Starts indexing the configured roots in the background. Returns `false`
/// when a run is already in progress or no root is configured.
pub fn start_index(state: AppState) -> bool {
    if state.song_roots.is_empty() {
        warn!("No song directories configured; set ULTRA_START_SONGS_DIR_PATH1");
        *state.index_status.write() = IndexStatus::Unconfigured;
        return false;
    }
    {
        let mut guard = state.index_status.write();
        if matches!(*guard, IndexStatus::Indexing { .. }) {
            return false;
        }
        *guard = IndexStatus::Indexing {
            started: SystemTime::now(),
        };
    }
    for root in state.song_roots.iter() {
        info!("Song directory: {}", root.display());
    }

    tokio::spawn(async move {
        let indexer = state.indexer.clone();
        let roots = state.song_roots.clone();
        let result = tokio::task::spawn_blocking(move || indexer.index_roots(&roots)).await;

        match result {
            Ok(stats) => {
                info!(
                    "Indexing finished: {} songs from {} directories",
                    stats.total_songs,
                    stats.roots.len()
                );
                *state.index_status.write() = IndexStatus::Ready(stats);
            }
            Err(err) => {
                error!("Indexing task failed: {}", err);
                *state.index_status.write() = IndexStatus::Error(err.to_string());
            }
        }
    });
    true
}

pub fn status_label(status: &IndexStatus) -> &'static str {
    match status {
        IndexStatus::Unconfigured => "unconfigured",
        IndexStatus::Indexing { .. } => "indexing",
        IndexStatus::Ready(_) => "ready",
        IndexStatus::Error(_) => "error",
    }
}

pub fn status_message(status: &IndexStatus) -> Option<String> {
    match status {
        IndexStatus::Unconfigured => Some("song directories must be set".to_string()),
        IndexStatus::Indexing { started } => {
            let elapsed = started.elapsed().map(|d| d.as_secs()).unwrap_or(0);
            Some(format!("indexing for {}s", elapsed))
        }
        IndexStatus::Ready(_) => None,
        IndexStatus::Error(message) => Some(format!("indexing error: {}", message)),
    }
}

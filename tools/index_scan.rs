use std::env;
use std::path::PathBuf;

use library::{song_roots_from_vars, Catalog, IndexPolicy, Indexer, SONG_ROOT_VAR};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut roots: Vec<PathBuf> = env::args().skip(1).map(PathBuf::from).collect();
    if roots.is_empty() {
        roots = song_roots_from_vars(env::vars())
            .into_iter()
            .map(PathBuf::from)
            .collect();
        if roots.is_empty() {
            return Err(format!("{}* not set and no path argument", SONG_ROOT_VAR).into());
        }
    }
    let workers = env::var("SONGBOOK_INDEX_WORKERS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    let indexer = Indexer::new(Catalog::new(), IndexPolicy::Additive, workers)?;
    let stats = indexer.index_roots(&roots);

    for root in &stats.roots {
        if root.missing {
            println!("{}: missing", root.root);
            continue;
        }
        if let Some(error) = &root.error {
            println!("{}: error: {}", root.root, error);
            continue;
        }
        println!(
            "{}: {} dirs, {} songs, {} duplicates, {} without definition, {} failed ({} ms)",
            root.root,
            root.song_dirs,
            root.inserted,
            root.duplicates.len(),
            root.without_definition,
            root.failed,
            root.elapsed_ms
        );
        for duplicate in &root.duplicates {
            println!("  duplicate {:?} in {}", duplicate.id, duplicate.directory);
        }
    }
    println!("Indexed: {} songs", stats.total_songs);

    if env::var("SONGBOOK_DUMP_JSON").is_ok() {
        println!("{}", serde_json::to_string_pretty(&indexer.catalog().list_all())?);
    }

    Ok(())
}

use std::path::PathBuf;
use std::thread;

use crate::cli::Args;

/// Engine configuration, independent of how it was obtained.
#[derive(Debug, Clone)]
pub struct Config {
    /// Items kept decoded on each side of the cursor.
    pub preload: usize,
    pub mark_directory: Option<PathBuf>,
    pub files: Vec<PathBuf>,
    pub loader_threads: usize,
    /// Maximum number of files being opened concurrently during enumeration.
    pub open_concurrency: usize,
}

fn parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preload: 100,
            mark_directory: None,
            files: vec![PathBuf::from(".")],
            loader_threads: parallelism(),
            open_concurrency: parallelism() * 2,
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            preload: args.preload,
            mark_directory: args.mark_directory.clone(),
            files: args.files.clone(),
            ..Self::default()
        }
    }
}

use clap::Parser;
use std::path::PathBuf;

pub const HELP_COMMANDS: &str = "\
Commands (one per line on stdin):
  n / Enter     : Next image
  p             : Previous image
  f             : First image
  l             : Last image
  r / R         : Rotate 90° CCW / CW
  h / v         : Flip horizontally / vertically
  m             : Toggle mark on current file
  t             : Load embedded thumbnail
  i             : Show image info
  ?             : Show this help
  q             : Quit
";

#[derive(Parser, Debug)]
#[command(name = "fiv", about = "Fast image viewer", after_help = HELP_COMMANDS)]
pub struct Args {
    /// Files or directories to view
    #[arg(value_name = "FILE", default_value = ".")]
    pub files: Vec<PathBuf>,

    /// Number of images to keep decoded on each side of the current one
    #[arg(short, long, value_name = "COUNT", default_value_t = 100)]
    pub preload: usize,

    /// Directory where marked files are symlinked
    #[arg(short, long, value_name = "PATH")]
    pub mark_directory: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Default `env_logger` filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

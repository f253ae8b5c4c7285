use clap::Parser;

use crate::dataset::ReadMethod;
use crate::io::OpenMode;

#[derive(Parser, Debug)]
#[command(name = "mmzip")]
#[command(version)]
#[command(about = "Memory-mapped access to (sharded) ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  mmzip -l -a data.zip                       list members of data.zip\n  \
  mmzip -a shard0.zip -a shard1.zip -p cats/1.jpg   send one member to stdout\n  \
  mmzip -a shard0.zip -a shard1.zip --bench 8 --split train --ext .JPEG\n  \
                                             read every training sample on 8 workers")]
pub struct Cli {
    /// Archive shard; repeat for several, later shards win on name clashes
    #[arg(short = 'a', long = "archive", value_name = "ZIP", required = true)]
    pub archives: Vec<String>,

    /// Members to select (default: all); `*` and `?` wildcards allowed
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Open archives read-write (the mapping is never written)
    #[arg(long)]
    pub read_write: bool,

    /// Read every selected member on this many worker threads and report throughput
    #[arg(long, value_name = "WORKERS")]
    pub bench: Option<usize>,

    /// Benchmark dataset samples below this split directory (e.g. train, val)
    #[arg(long, requires = "bench")]
    pub split: Option<String>,

    /// Sample file extension used with --split
    #[arg(long, requires = "split")]
    pub ext: Option<String>,

    /// How benchmark workers fetch member bytes: open or read
    #[arg(long, default_value = "open")]
    pub method: ReadMethod,

    /// Log library events at info level (RUST_LOG overrides)
    #[arg(long)]
    pub verbose_log: bool,
}

impl Cli {
    pub fn open_mode(&self) -> OpenMode {
        if self.read_write {
            OpenMode::ReadWrite
        } else {
            OpenMode::ReadOnly
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}

//! Main entry point for the mmzip CLI application.
//!
//! Lists, pipes and extracts members of one or more archive shards, and can
//! emulate a pool of data-loading workers reading them concurrently.

use anyhow::{Context, Result, bail};
use clap::Parser;
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use mmzip::{ArchiveCollection, ArchiveRead, Cli, LabeledDataset, ReadMethod, ZipFileEntry};

/// Application entry point.
///
/// Opens every `-a` archive as a shard of one collection and dispatches to
/// listing, extraction or benchmarking.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let collection = ArchiveCollection::with_mode(&cli.archives, cli.open_mode())
        .context("Failed to open archives")?;

    if let Some(workers) = cli.bench {
        return bench(&collection, workers, &cli);
    }

    process_archives(&collection, &cli)
}

/// Log to stderr so piped member bytes on stdout stay clean.
fn init_logging(cli: &Cli) {
    let default = if cli.verbose_log { "mmzip=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

/// Process the collection based on CLI options.
///
/// - List mode (`-l` or `-v`): Display the merged namespace
/// - Extract mode: Extract (or pipe) members matching the filters
fn process_archives(collection: &ArchiveCollection, cli: &Cli) -> Result<()> {
    // One entry per distinct name, from the shard that serves it
    let entries = collection
        .namelist()
        .iter()
        .map(|name| collection.getinfo(name))
        .collect::<mmzip::Result<Vec<_>>>()?;

    if cli.list || cli.verbose {
        return list_files(collection, &entries, cli.verbose);
    }

    let files_to_extract: Vec<_> = entries
        .into_iter()
        .filter(|e| !e.is_directory && is_selected(&e.file_name, cli))
        .collect();

    if files_to_extract.is_empty() && !cli.files.is_empty() {
        bail!("No members match {}", cli.files.join(" "));
    }

    let multiple_files = cli.pipe && files_to_extract.len() > 1;
    for entry in files_to_extract {
        extract_file(collection, entry, cli, multiple_files)?;
    }

    Ok(())
}

/// Whether a member passes the positional selection and `-x` exclusions.
fn is_selected(name: &str, cli: &Cli) -> bool {
    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, name)
            } else {
                // No wildcards: exact match on member name or base name
                f.as_str() == name || base_name(name) == f.as_str()
            }
        });
        if !matches {
            return false;
        }
    }

    !cli
        .exclude
        .iter()
        .any(|x| name.contains(x.as_str()) || glob_match(x, name))
}

fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// List the merged namespace.
///
/// Verbose format adds sizes, compression ratio, timestamp and the shard
/// serving each member.
fn list_files(collection: &ArchiveCollection, entries: &[&ZipFileEntry], verbose: bool) -> Result<()> {
    let mut stdout = io::stdout().lock();

    if verbose {
        writeln!(
            stdout,
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time", "Shard"
        )?;
        writeln!(stdout, "{}", "-".repeat(77))?;
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        if !verbose {
            writeln!(stdout, "{}", entry.file_name)?;
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        writeln!(
            stdout,
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {:>5}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            collection.shard_index(&entry.file_name)?,
            entry.file_name
        )?;

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        writeln!(stdout, "{}", "-".repeat(77))?;
        writeln!(
            stdout,
            "{:>10}  {:>10}  {}  {:>28}  {} files in {} shards",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count,
            collection.len()
        )?;
        if collection.collisions() > 0 {
            writeln!(
                stdout,
                "{} names shadowed by later shards",
                collection.collisions()
            )?;
        }
    }

    Ok(())
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!(
            "{:>4}%",
            100i64 - (compressed.saturating_mul(100) / uncompressed) as i64
        )
    } else {
        "  0%".to_string()
    }
}

/// Extract a single member.
///
/// - Pipe mode (`-p`): Write to stdout instead of a file
/// - Custom output directory (`-d`): Extract below the given directory
/// - Junk paths (`-j`): Ignore the directory structure in the archive
/// - Overwrite control (`-n`, `-o`): Handle existing files
fn extract_file(
    collection: &ArchiveCollection,
    entry: &ZipFileEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    if cli.pipe {
        let data = collection
            .read(&entry.file_name)
            .with_context(|| format!("Failed to read {}", entry.file_name))?;
        let mut stdout = io::stdout().lock();
        if show_filename {
            writeln!(stdout, "--- {} ---", entry.file_name)?;
        }
        stdout.write_all(&data)?;
        return Ok(());
    }

    let Some(output_path) = destination(entry, cli) else {
        if !cli.is_very_quiet() {
            eprintln!("Skipping: {} (unsafe path)", entry.file_name);
        }
        return Ok(());
    };

    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.file_name);
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.file_name);
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.file_name);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let data = collection
        .read(&entry.file_name)
        .with_context(|| format!("Failed to read {}", entry.file_name))?;
    fs::write(&output_path, &data)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    Ok(())
}

/// Destination of a member on disk, or `None` if its name would escape the
/// output directory.
fn destination(entry: &ZipFileEntry, cli: &Cli) -> Option<PathBuf> {
    let relative = if cli.junk_paths {
        PathBuf::from(base_name(&entry.file_name))
    } else {
        PathBuf::from(&entry.file_name)
    };

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    Some(match &cli.extract_dir {
        Some(dir) => Path::new(dir).join(relative),
        None => relative,
    })
}

/// Read every selected member (or dataset sample) on a pool of `workers`
/// threads, the way data-loader workers would, and report throughput.
fn bench(collection: &ArchiveCollection, workers: usize, cli: &Cli) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("Failed to start worker pool")?;

    let start = Instant::now();

    let sizes: Vec<u64> = if let Some(split) = &cli.split {
        let dataset = LabeledDataset::new(collection, split, cli.ext.as_deref().unwrap_or(""))
            .with_method(cli.method);
        if !cli.is_quiet() {
            eprintln!(
                "{} samples in {} classes",
                dataset.len(),
                dataset.labels().len()
            );
        }
        pool.install(|| {
            (0..dataset.len())
                .into_par_iter()
                .map(|i| dataset.get(i).map(|(bytes, _label)| bytes.len() as u64))
                .collect::<mmzip::Result<_>>()
        })?
    } else {
        let names: Vec<&String> = collection
            .namelist()
            .iter()
            .filter(|name| !name.ends_with('/') && is_selected(name, cli))
            .collect();
        pool.install(|| {
            names
                .par_iter()
                .map(|name| read_member(collection, name, cli.method))
                .collect::<mmzip::Result<_>>()
        })?
    };

    let elapsed = start.elapsed();
    let count = sizes.len();
    let bytes: u64 = sizes.iter().sum();
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);

    println!(
        "{} members, {} in {:.2?} with {} workers ({:.0} members/s, {}/s)",
        count,
        format_size(bytes),
        elapsed,
        workers,
        count as f64 / secs,
        format_size((bytes as f64 / secs) as u64)
    );

    Ok(())
}

fn read_member<S: ArchiveRead>(source: &S, name: &str, method: ReadMethod) -> mmzip::Result<u64> {
    match method {
        ReadMethod::Read => Ok(source.read(name)?.len() as u64),
        ReadMethod::Open => {
            let mut reader = source.open(name)?;
            Ok(io::copy(&mut reader, &mut io::sink())?)
        }
    }
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Last star seen and the text position it is currently matched up to
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                // Let the star absorb one more character
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

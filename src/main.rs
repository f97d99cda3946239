mod config;
mod ct;
mod metadata;
mod models;
mod record;
mod run;

use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use env_logger::Env;
use rayon::prelude::*;
use structopt::StructOpt;

use crate::metadata::MetadataIndex;
use crate::models::{AssayPanel, Record};

#[macro_use]
extern crate log;

type Result<T> = std::result::Result<T, Box<dyn Error>>;

/// Opens a table for reading, "-" being stdin
fn open_input(path: &Path) -> Result<(Box<dyn Read>, String)> {
    if path.as_os_str() == "-" {
        Ok((Box::new(std::io::stdin()), String::from("<stdin>")))
    } else {
        let f = File::open(path).map_err(|e| format!("Cannot open {}: {}", path.display(), e))?;
        Ok((Box::new(f), path.display().to_string()))
    }
}

/// Writes lines to `out`. A reader that goes away early is not an error.
fn print_to<W: Write>(out: W, lines: &[String]) -> Result<()> {
    match metadata::write_lines(BufWriter::new(out), lines) {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("Output closed early, stopping");
            Ok(())
        }
        r => Ok(r?),
    }
}

fn print_lines(lines: &[String]) -> Result<()> {
    let stdout = std::io::stdout();
    print_to(stdout.lock(), lines)
}

fn clean(all_metadata: &Path, panel: &AssayPanel) -> Result<()> {
    let (input, origin) = open_input(all_metadata)?;
    let records = metadata::read_table(input, &origin, panel)?;
    info!("Cleaning {} records from {}...", records.len(), origin);

    let cleaned: Vec<Record> = records
        .into_par_iter()
        .map(|r| record::clean(r, panel))
        .collect::<std::result::Result<_, _>>()?;

    print_lines(&metadata::format_table(&cleaned, panel)?)
}

fn normalize(values: Vec<String>) -> Result<()> {
    // collect values from either stdin or the positional arguments
    let mut raw_values: Vec<String> = Vec::new();
    for v in values {
        if v == "-" {
            for line in std::io::stdin().lock().lines() {
                raw_values.push(line?);
            }
        } else {
            raw_values.push(v);
        }
    }

    let lines: Vec<String> = raw_values
        .iter()
        .map(|raw| {
            let outcome = ct::classify(raw);
            format!("{}\t{}\t{}", raw, ct::normalize(raw), outcome.rule())
        })
        .collect();
    print_lines(&lines)
}

fn match_run(
    run_id: &str,
    fastq_dir: &Path,
    negative_prefix: &str,
    unassigned_prefix: &str,
    all_metadata_cleaned: &Path,
) -> Result<()> {
    let library_ids = run::library_ids(fastq_dir, run_id, unassigned_prefix)?;
    info!("{}: {} libraries found", run_id, library_ids.len());

    let (input, origin) = open_input(all_metadata_cleaned)?;
    let index = MetadataIndex::from_reader(input, &origin)?;
    if index.is_empty() {
        warn!("{}: no metadata entries, nothing will match", origin);
    }

    print_lines(&index.format_matches(&library_ids, negative_prefix))
}

fn main() -> Result<()> {
    let config = config::Opt::from_args();

    // set up logging
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // set up global thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build_global()?;

    let panel = match &config.assay_fields {
        Some(list) => AssayPanel::from_list(list).ok_or("No assay fields given in --assay-fields")?,
        None => AssayPanel::default(),
    };
    debug!("Assay priority: {}", panel.priority.join(", "));

    match config.cmd {
        config::Command::Clean { all_metadata } => clean(&all_metadata, &panel),

        config::Command::Normalize { values } => normalize(values),

        config::Command::Match {
            run_id,
            fastq_dir,
            negative_prefix,
            unassigned_prefix,
            all_metadata_cleaned,
        } => match_run(
            &run_id,
            &fastq_dir,
            &negative_prefix,
            &unassigned_prefix,
            &all_metadata_cleaned,
        ),
    }
}

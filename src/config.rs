
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Clean the Ct values of a metadata table and print the cleaned table
    Clean {
        /// Metadata table (CSV). Use "-" to read from stdin
        #[structopt(parse(from_os_str))]
        all_metadata: PathBuf,
    },

    /// Show how single Ct values would be cleaned
    Normalize {
        /// Raw Ct values. Use "-" to read one value per line from stdin
        #[structopt(required = true, allow_hyphen_values = true)]
        values: Vec<String>,
    },

    /// Look up Ct and collection date for the libraries of a sequencing run
    Match {
        /// Run name, a folder or zip archive of that name is expected in the fastq folder
        #[structopt(short, long)]
        run_id: String,

        /// Root folder for per-run fastq output
        #[structopt(short, long, parse(from_os_str))]
        fastq_dir: PathBuf,

        /// Libraries starting with this prefix are negative controls
        #[structopt(default_value = "NEG", long)]
        negative_prefix: String,

        /// Fastq files starting with this prefix hold unassigned reads
        #[structopt(default_value = "Undetermined", long)]
        unassigned_prefix: String,

        /// Cleaned metadata table, as printed by `clean`
        #[structopt(parse(from_os_str))]
        all_metadata_cleaned: PathBuf,
    },
}

#[derive(StructOpt, Debug)]
pub struct Opt {
    /// Number of threads to use (default: all cores)
    #[structopt(default_value = "0", long, short)]
    pub threads: usize,

    /// Ct assay columns in priority order (comma-separated). Defaults to the SARS-CoV-2 panel
    #[structopt(long)]
    pub assay_fields: Option<String>,

    #[structopt(subcommand)]
    pub cmd: Command,
}

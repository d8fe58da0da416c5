use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mirdb::config::{DEFAULT_KMER_LEN, DEFAULT_MIN_VALID_LEN};
use mirdb::io::fasta;
use mirdb::{build_database, prepare_records, BuildConfig, Database, PrepareOptions};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "mirdb", author, version, about = "Build binary k-mer databases from reference RNA sequences", arg_required_else_help = true)]
struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a gzipped k-mer database from a multi-FASTA file
    Build(BuildArgs),
    /// Print summary of a database and optionally look up k-mers
    Inspect {
        /// Database file (.db.gz)
        db: PathBuf,
        /// K-mer to look up (repeatable)
        #[arg(long = "kmer")]
        kmers: Vec<String>,
        /// K-mer length the database was built with
        #[arg(short = 'k', long = "kmer-len", default_value_t = DEFAULT_KMER_LEN)]
        kmer_len: usize,
    },
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Reference sequences, multi-FASTA (DNA, or RNA with --rna); .gz accepted
    #[arg(short, long)]
    sequences: PathBuf,
    /// Output database, should end with '.gz'
    #[arg(short, long)]
    out: PathBuf,
    #[arg(short = 'k', long = "kmer-len", default_value_t = DEFAULT_KMER_LEN)]
    kmer_len: usize,
    /// Sequences shorter than this are kept but reported
    #[arg(long = "min-valid-len", default_value_t = DEFAULT_MIN_VALID_LEN)]
    min_valid_len: usize,
    /// gzip level (0-9)
    #[arg(long, default_value_t = 6)]
    level: u32,
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,
    /// Input is RNA: convert U to T
    #[arg(long)]
    rna: bool,
    /// Store each sequence as forward@@@reverse-complement, renamed seq_N
    #[arg(long = "strand-pair")]
    strand_pair: bool,
    /// Write an empty database when the FASTA file does not exist
    #[arg(long = "allow-missing")]
    allow_missing: bool,
    /// Write build report (JSON) to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    match cli.command {
        Commands::Build(args) => run_build(args),
        Commands::Inspect { db, kmers, kmer_len } => run_inspect(&db, &kmers, kmer_len),
    }
}

fn run_build(args: BuildArgs) -> Result<()> {
    let cfg = BuildConfig::default()
        .with_kmer_len(args.kmer_len)
        .with_min_valid_len(args.min_valid_len)
        .with_compression_level(args.level)
        .with_threads(args.threads);
    cfg.validate()?;

    let records = if args.allow_missing && !args.sequences.exists() {
        warn!(
            path = %args.sequences.display(),
            "sequence file missing, creating an empty database"
        );
        Vec::new()
    } else {
        fasta::read_fasta_path(&args.sequences)
            .with_context(|| format!("cannot read sequences from '{}'", args.sequences.display()))?
    };
    info!(path = %args.sequences.display(), records = records.len(), "sequences loaded");

    let opts = PrepareOptions { rna: args.rna, strand_pair: args.strand_pair };
    let records = prepare_records(records, opts);

    let mut report = build_database(records, &cfg, &args.out)
        .with_context(|| format!("cannot build database '{}'", args.out.display()))?;
    report.sequences_file = Some(args.sequences.clone());
    report.build_args = Some(std::env::args().collect::<Vec<_>>().join(" "));

    if report.stats.is_empty() {
        warn!(
            path = %args.out.display(),
            "database is empty; delete it if an existing database for this category should be used instead"
        );
    }
    if let Some(path) = &args.report {
        report
            .save_json(path)
            .with_context(|| format!("cannot write build report to '{}'", path.display()))?;
    }

    println!("sequences: {}", report.stats.sequences.seen);
    println!("accepted:  {}", report.stats.sequences.accepted);
    println!("kmers:     {}", report.stats.distinct_kmers);
    println!("positions: {}", report.stats.positions);
    println!("database:  {}", args.out.display());
    Ok(())
}

fn run_inspect(path: &Path, kmers: &[String], kmer_len: usize) -> Result<()> {
    let db = Database::load(path).with_context(|| format!("cannot load database '{}'", path.display()))?;

    println!("database:        {}", path.display());
    println!("ref sequences:   {}", db.ref_seq_count());
    println!("ref bytes:       {}", db.ref_seqs().len());
    println!("distinct kmers:  {}", db.kmer_count());
    println!("positions:       {}", db.position_count());

    for kmer in kmers {
        match db.lookup(kmer.as_bytes(), kmer_len) {
            None => println!("{kmer}\tnot found"),
            Some(offsets) => {
                for off in offsets {
                    let id = db
                        .ref_seq_index(off as usize)
                        .and_then(|i| db.ref_seq_id(i))
                        .unwrap_or("?");
                    println!("{kmer}\t{off}\t{id}");
                }
            }
        }
    }
    Ok(())
}

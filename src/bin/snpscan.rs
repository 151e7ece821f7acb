use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use snpscan::{driver, Params, RunOptions};
use tracing::info;

/// Genotype sequencing reads against a precomputed 31-mer SNP database.
#[derive(Parser, Debug)]
#[command(name = "snpscan", version, about)]
struct Args {
    /// Source kmer/SNP database
    #[arg(short = 'd', long = "db")]
    db: PathBuf,

    /// Lmer prefix width in bits
    #[arg(short = 'l', long = "lmer-bits", default_value_t = 29,
          value_parser = clap::value_parser!(u32).range(1..=32))]
    lmer_bits: u32,

    /// Bloom index width in bits
    #[arg(short = 'm', long = "mmer-bits", default_value_t = 36,
          value_parser = clap::value_parser!(u32).range(1..=62))]
    mmer_bits: u32,

    /// Concurrent scanners per round
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,

    /// Output prefix; each input writes <prefix>.<channel>.tsv
    #[arg(short = 'o', long = "out-prefix", default_value = "./out")]
    out_prefix: String,

    /// Preload index files into memory instead of mmap
    #[arg(short = 'p', long = "preload")]
    preload: bool,

    /// Input FASTQ files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Usage problems exit 1 regardless of clap's own convention.
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };
    init_tracing();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let params = Params::new(args.lmer_bits, args.mmer_bits)?;
    info!(
        db = %args.db.display(),
        l2 = args.lmer_bits,
        m3 = args.mmer_bits,
        threads = args.threads,
        inputs = args.inputs.len(),
        "starting"
    );
    let opts = RunOptions {
        db_path: args.db,
        params,
        n_threads: args.threads,
        out_prefix: args.out_prefix,
        preload: args.preload,
        inputs: args.inputs,
    };
    driver::run(&opts)?;
    Ok(())
}

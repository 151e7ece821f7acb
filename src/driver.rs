//! Pipeline orchestration: build-or-load the indices, then fan scanners out
//! across input files in bulk-synchronous rounds.

use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use tracing::info;

use crate::db::SourceDb;
use crate::error::Result;
use crate::optimize::optimize;
use crate::params::Params;
use crate::scan::Scanner;
use crate::store::IndexSet;

/// Everything the pipeline needs; argument parsing stays at the binary edge.
pub struct RunOptions {
    pub db_path: PathBuf,
    pub params: Params,
    pub n_threads: usize,
    pub out_prefix: String,
    pub preload: bool,
    pub inputs: Vec<PathBuf>,
}

/// Run the full pipeline. The source DB mapping is released before any
/// scanner starts; the indices stay immutable from then on, so scanners
/// share them without synchronization.
pub fn run(opts: &RunOptions) -> Result<()> {
    let db = SourceDb::open(&opts.db_path)?;
    info!(
        db = %opts.db_path.display(),
        records = db.record_count(),
        "source DB mapped"
    );

    let mut set = IndexSet::open(&opts.db_path, db.record_count(), &opts.params, opts.preload)?;
    optimize(&db, &mut set, &opts.params)?;
    drop(db);

    let views = set.views();
    let n_threads = opts.n_threads.max(1);
    let started = Instant::now();

    // Rounds of up to n_threads workers; a round joins fully before the next
    // dispatch. Channel numbers follow command-line position, so outputs are
    // deterministic across reruns.
    for (round, files) in opts.inputs.chunks(n_threads).enumerate() {
        let base = round * n_threads;
        info!(round, workers = files.len(), "dispatching scanner round");
        thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::with_capacity(files.len());
            for (i, input) in files.iter().enumerate() {
                let channel = base + i;
                let out_path = PathBuf::from(format!("{}.{}.tsv", opts.out_prefix, channel));
                let scanner = Scanner::new(&opts.params, views);
                handles.push(scope.spawn(move || scanner.scan_file(input, &out_path)));
            }
            for handle in handles {
                match handle.join() {
                    Ok(result) => result?,
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            Ok(())
        })?;
        info!(round, "scanner round joined");
    }

    info!(
        files = opts.inputs.len(),
        elapsed_s = started.elapsed().as_secs(),
        "all inputs processed"
    );
    Ok(())
}

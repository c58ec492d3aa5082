#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use rand::Rng;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

use crate::lib_mem::MIB;
use crate::metrics::Metrics;

#[derive(Clone, Copy, Debug)]
pub struct IoPlan {
    pub block_size: usize,
    pub blocks: usize,
    pub pause: Duration,
}

impl Default for IoPlan {
    fn default() -> Self {
        Self {
            block_size: MIB,
            blocks: 100,
            pause: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IoStats {
    pub iterations: u64,
    pub errors: u64,
}

/// One write/sync/read pass over a fresh temp file in `dir`.
///
/// The file is removed before returning, on the error paths too. Returns the
/// number of bytes read back.
pub fn run_io_iteration(dir: &Path, plan: &IoPlan) -> AnyResult<u64> {
    run_io_iteration_with(dir, plan, File::sync_all)
}

/// [`run_io_iteration`] with a caller-supplied sync step.
pub fn run_io_iteration_with(
    dir: &Path,
    plan: &IoPlan,
    mut sync: impl FnMut(&File) -> io::Result<()>,
) -> AnyResult<u64> {
    let mut file = tempfile::Builder::new()
        .prefix("io-test-")
        .suffix(".dat")
        .tempfile_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    // dropping `file` on error unlinks it
    let read_total = write_sync_read(&mut file, plan, |f: &mut NamedTempFile| sync(f.as_file()))?;
    file.close().context("remove temp file")?;
    Ok(read_total)
}

/// Writes `plan.blocks` random blocks, syncing after each, then reads the
/// whole stream back from the start.
pub fn write_sync_read<F: Read + Write + Seek>(
    file: &mut F,
    plan: &IoPlan,
    mut sync: impl FnMut(&mut F) -> io::Result<()>,
) -> AnyResult<u64> {
    let mut block = vec![0u8; plan.block_size];
    rand::thread_rng().fill(&mut block[..]);
    for _ in 0..plan.blocks {
        file.write_all(&block).context("write error")?;
        sync(file).context("sync error")?;
    }

    file.seek(SeekFrom::Start(0)).context("seek error")?;
    let mut read_total = 0u64;
    loop {
        let n = file.read(&mut block).context("read error")?;
        if n == 0 {
            break;
        }
        read_total += n as u64;
    }
    Ok(read_total)
}

/// Repeats [`run_io_iteration`] until `deadline`, pausing between passes.
/// Failures are logged and counted, never returned.
pub async fn io_load(
    worker: usize,
    dir: PathBuf,
    deadline: Instant,
    plan: IoPlan,
    mtr: Metrics,
) -> IoStats {
    let mut stats = IoStats::default();
    while Instant::now() < deadline {
        let pass_dir = dir.clone();
        let outcome = tokio::task::spawn_blocking(move || run_io_iteration(&pass_dir, &plan))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|res| res);
        match outcome {
            Ok(bytes) => {
                stats.iterations += 1;
                mtr.io_iterations_total.inc();
                debug!(worker, bytes, "io iteration done");
            }
            Err(e) => {
                stats.errors += 1;
                mtr.io_errors_total.inc();
                warn!(worker, error=%format!("{e:#}"), "io simulation error");
            }
        }
        sleep(plan.pause).await;
    }
    stats
}

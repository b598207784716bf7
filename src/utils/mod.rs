use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// Wall-clock timer that logs how long a named stage took when dropped.
pub struct Timer {
    stage: String,
    start: Instant,
}

impl Timer {
    pub fn start(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        info!("Starting {}", stage);
        Self {
            stage,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("Finished {} in {:.2?}", self.stage, self.elapsed());
    }
}

/// Buffered writer for `path`, or stdout when no path is given or it is `-`.
pub fn output_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if p != Path::new("-") => {
            let file = File::create(p).with_context(|| format!("Cannot create {:?}", p))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

//! Pipeline orchestrator: ties surface → harvester → supervisor → sink together.
//!
//! ## Run
//!
//! 1. Navigate to the job url and replay its setup steps (clicks, waits, frame entry).
//! 2. Run the plan's harvester under the supervisor; with `fresh_page_per_attempt`
//!    every retry reloads the page first.
//! 3. Normalize the validated mapping and stream the records into the sink.

use crate::config::{AppConfig, JobConfig, SetupStep};
use crate::harvest::error::HarvestResult;
use crate::sink::{Normalizer, RecordSink, emit};
use crate::supervisor::Supervisor;
use crate::surface::Surface;
use anyhow::{Context, Result, anyhow};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How long a setup click waits for its target to exist.
const SETUP_CLICK_TIMEOUT: Duration = Duration::from_secs(30);

/// Load the job's page and bring the visual into view.
pub async fn prepare(surface: &mut dyn Surface, job: &JobConfig) -> HarvestResult<()> {
    info!("Loading {}", job.url);
    surface.navigate(&job.url).await?;

    for step in &job.setup {
        debug!("setup: {:?}", step);
        match step {
            SetupStep::Click { selector, button } => {
                let target = surface
                    .wait_for(selector, SETUP_CLICK_TIMEOUT)
                    .await?
                    .ok_or_else(|| anyhow!("setup click target {:?} never appeared", selector))?;
                surface.click(target, *button).await?;
            }
            SetupStep::WaitFor { selector, timeout_ms } => {
                surface
                    .wait_for(selector, Duration::from_millis(*timeout_ms))
                    .await?
                    .ok_or_else(|| anyhow!("{:?} did not appear within {}ms", selector, timeout_ms))?;
            }
            SetupStep::Pause { ms } => surface.wait(Duration::from_millis(*ms)).await,
            SetupStep::EnterFrame { selector } => surface.enter_frame(selector).await?,
        }
    }
    Ok(())
}

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Harvest the job on `surface` and write every record to `sink`.
    pub async fn run<S: Surface>(&self, surface: S, sink: &mut dyn RecordSink) -> Result<PipelineStats> {
        let job = &self.config.job;
        let fresh = self.config.supervisor.fresh_page_per_attempt;
        let supervisor = Supervisor::from_config(&self.config.supervisor);
        let harvester = job.plan.harvester();

        // One attempt at a time holds the page.
        let surface = Mutex::new(surface);
        let (surface, harvester) = (&surface, &harvester);
        let mut attempts = 0u32;

        info!("=== Harvesting {} ({}) ===", job.url, job.plan.kind());
        let harvest = supervisor
            .supervise(|n| {
                attempts = n;
                async move {
                    let mut page = surface.lock().await;
                    if fresh || n == 1 {
                        prepare(&mut *page, job).await?;
                    }
                    harvester.harvest(&mut *page).await
                }
            })
            .await
            .context("Harvest failed")?;

        if harvest.is_empty() {
            warn!("Harvest of {} produced an empty mapping", job.url);
        }

        let normalizer = Normalizer::new(&job.plan, &self.config.output);
        let records = emit(normalizer.normalize(&harvest), sink).context("Writing records failed")?;

        let stats = PipelineStats {
            kind: job.plan.kind(),
            attempts,
            records,
        };
        info!(
            "=== Done: {} records from {} in {} attempt(s) ===",
            stats.records, stats.kind, stats.attempts
        );
        Ok(stats)
    }
}

#[derive(Debug)]
pub struct PipelineStats {
    pub kind: &'static str,
    pub attempts: u32,
    pub records: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::error::HarvestError;
    use crate::models::{BoundingBox, Record};
    use crate::sink::CsvSink;
    use crate::surface::scripted::{Cell, Event, ScriptedSurface, Tooltip, tip};
    use std::collections::VecDeque;

    const CHART_JOB: &str = r#"
[supervisor]
max_attempts = 3
backoff_ms = 0

[job]
url = "https://tableau.example.org/views/tests"

[[job.setup]]
action = "pause"
ms = 0

[job.plan]
kind = "chart_sweep"
chart = "canvas"
settle_ms = 0

[job.plan.margins]
left = 3
right = 3

[job.plan.tooltip]
container = ".tip"

[job.plan.tooltip.fields]
date = ".d"
value = ".v"
"#;

    const TABLE_JOB: &str = r#"
[supervisor]
backoff_ms = 0

[job]
url = "https://app.example.org/view"

[job.plan]
kind = "table_scroll"
cells = ".cell"
scroll_forward = ".down"
scroll_clicks = 15
cycle_settle_ms = 0

[job.plan.shape]
min_rows = 6
min_columns = 3

[job.plan.output]
row_header = "Type"

[job.plan.tooltip]
container = ".tip"

[job.plan.tooltip.fields]
row = ".r"
column = ".c"
value = ".v"
"#;

    fn day(date: &str, value: &str) -> Option<Tooltip> {
        Some(tip(&[(".d", date), (".v", value)]))
    }

    fn chart_surface(tips: Vec<Option<Tooltip>>) -> ScriptedSurface {
        let mut queue = VecDeque::from(tips);
        ScriptedSurface::new(".tip")
            .element("canvas", BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 30.0 })
            .on_point(move |_| queue.pop_front().flatten())
    }

    async fn run_to_csv(job: &str, surface: ScriptedSurface) -> Result<(PipelineStats, String)> {
        let config = AppConfig::from_toml(job)?;
        let mut sink = CsvSink::new(Vec::new());
        let stats = Pipeline::new(config).run(surface, &mut sink).await?;
        Ok((stats, String::from_utf8(sink.into_inner()?)?))
    }

    /// Sink that keeps records in memory.
    #[derive(Default)]
    struct Capture {
        headers: Vec<String>,
        records: Vec<Record>,
        closed: bool,
    }

    impl RecordSink for Capture {
        fn open(&mut self, headers: &[String]) -> Result<()> {
            self.headers = headers.to_vec();
            Ok(())
        }

        fn write_record(&mut self, record: &Record) -> Result<()> {
            assert!(!self.closed, "write after close");
            self.records.push(record.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_chart_sweep_end_to_end() {
        let surface = chart_surface(vec![
            day("Jan 1, 2021", "1,000"),
            day("Jan 1, 2021", "1,000"),
            day("Jan 2, 2021", "1,050"),
            day("Jan 3, 2021", "1,100"),
        ]);

        let (stats, csv) = run_to_csv(CHART_JOB, surface).await.unwrap();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.attempts, 1);
        assert_eq!(csv, "date,value\n2021-01-01,1000\n2021-01-02,1050\n2021-01-03,1100\n");
    }

    #[tokio::test]
    async fn test_chart_gap_is_retried_on_a_fresh_page() {
        let surface = chart_surface(vec![
            // attempt 1: Jan 2 missed by the renderer
            day("Jan 1, 2021", "1"),
            day("Jan 3, 2021", "3"),
            // attempt 2
            day("Jan 1, 2021", "1"),
            day("Jan 2, 2021", "2"),
            day("Jan 3, 2021", "3"),
            day("Jan 3, 2021", "3"),
        ]);
        let config = AppConfig::from_toml(CHART_JOB).unwrap();
        let mut capture = Capture::default();
        let stats = Pipeline::new(config).run(surface, &mut capture).await.unwrap();

        assert_eq!(stats.attempts, 2);
        assert_eq!(capture.headers, vec!["date", "value"]);
        assert_eq!(capture.records.len(), 3);
        assert_eq!(capture.records[1].get("value"), Some("2"));
        assert!(capture.closed);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_causal_error() {
        let surface = chart_surface(Vec::new());
        let config = AppConfig::from_toml(CHART_JOB).unwrap();
        let mut capture = Capture::default();
        let err = Pipeline::new(config).run(surface, &mut capture).await.unwrap_err();

        let exhausted = err.downcast_ref::<HarvestError>().unwrap();
        assert!(matches!(exhausted, HarvestError::HarvestExhausted { attempts: 3, .. }));
        assert!(format!("{:#}", err).contains("tooltip unavailable"));
        assert!(capture.records.is_empty());
        assert!(!capture.closed);
    }

    fn table_pages() -> Vec<Vec<Cell>> {
        let row = |key: &str| -> Vec<Cell> {
            ["Tested", "Positive", "Rate"]
                .iter()
                .map(|c| Cell::visible(tip(&[(".r", key), (".c", *c), (".v", "2,048")])))
                .collect()
        };
        let page = |keys: &[&str]| -> Vec<Cell> { keys.iter().flat_map(|k| row(*k)).collect() };

        let mut last = page(&["Molecular", "Antibody"]);
        last.push(Cell::visible(tip(&[(".r", "undefined"), (".c", "Tested"), (".v", "0")])));
        vec![
            page(&["Total", "Antigen"]),
            page(&["Antigen", "Residents", "Visitors"]),
            last,
        ]
    }

    #[tokio::test]
    async fn test_table_harvest_end_to_end() {
        let surface = ScriptedSurface::new(".tip").pages(".cell", ".down", 15, table_pages());
        let (stats, csv) = run_to_csv(TABLE_JOB, surface).await.unwrap();

        assert_eq!(stats.records, 6);
        assert!(!csv.contains("undefined"));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Type,Tested,Positive,Rate");
        assert_eq!(lines[1], "Total,2048,2048,2048");
        assert_eq!(lines[6], "Antibody,2048,2048,2048");
    }

    #[tokio::test]
    async fn test_setup_steps_replayed_before_harvest() {
        let job = CHART_JOB.replace(
            "[[job.setup]]\naction = \"pause\"\nms = 0",
            "[[job.setup]]\naction = \"click\"\nselector = \"canvas\"\n\n[[job.setup]]\naction = \"enter_frame\"\nselector = \"iframe.viz\"",
        );
        let surface = chart_surface(vec![day("Jan 1, 2021", "1"); 4]);
        let config = AppConfig::from_toml(&job).unwrap();

        let mut page = surface;
        prepare(&mut page, &config.job).await.unwrap();
        assert_eq!(page.events[0], Event::Navigate(config.job.url.clone()));
        assert!(matches!(page.events[1], Event::ClickElement(..)));
        assert_eq!(page.events[2], Event::EnterFrame("iframe.viz".into()));
    }
}

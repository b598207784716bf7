use crate::models::MouseButton;
use anyhow::{Context, Result, bail};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub job: JobConfig,
}

/// Browser host configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// A wide viewport keeps one chart column per calendar day.
    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

/// Retry policy around a whole harvest attempt
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Reload the target and replay setup steps before every attempt.
    #[serde(default = "default_true")]
    pub fresh_page_per_attempt: bool,
}

/// Output formatting
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// chrono format for emitted dates.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

// ── Job ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobConfig {
    pub url: String,

    #[serde(default)]
    pub setup: Vec<SetupStep>,

    pub plan: HarvestPlan,
}

/// Interaction replayed after navigation to reach the visual to harvest.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SetupStep {
    Click {
        selector: String,
        #[serde(default)]
        button: MouseButton,
    },
    WaitFor {
        selector: String,
        #[serde(default = "default_setup_timeout_ms")]
        timeout_ms: u64,
    },
    Pause {
        ms: u64,
    },
    EnterFrame {
        selector: String,
    },
}

/// Which harvester runs, and how.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HarvestPlan {
    ChartSweep(ChartSweepPlan),
    TableScroll(TableScrollPlan),
    GridProbe(GridProbePlan),
}

/// What to do when a trigger produces no tooltip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    Fail,
    Skip,
}

/// Tooltip container plus named field selectors relative to it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TooltipLayout {
    pub container: String,

    pub fields: HashMap<String, String>,

    #[serde(default = "default_tooltip_timeout_ms")]
    pub timeout_ms: u64,
}

impl TooltipLayout {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Pixels excluded at the chart edges, relative to its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SweepMargins {
    #[serde(default = "default_margin_left")]
    pub left: u32,
    #[serde(default = "default_margin_right")]
    pub right: u32,
    /// Distance of the sweep line above the bottom edge.
    #[serde(default = "default_margin_bottom")]
    pub bottom: u32,
}

impl Default for SweepMargins {
    fn default() -> Self {
        Self {
            left: default_margin_left(),
            right: default_margin_right(),
            bottom: default_margin_bottom(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChartSweepPlan {
    /// Selector of the chart's plotting element.
    pub chart: String,

    pub tooltip: TooltipLayout,

    #[serde(default)]
    pub margins: SweepMargins,

    #[serde(default = "default_overshoot")]
    pub overshoot: u32,

    #[serde(default = "default_chart_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,

    #[serde(default = "default_fail")]
    pub on_missing_tooltip: MissPolicy,
}

/// Acceptance rule for a converged table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShapeRule {
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,

    #[serde(default = "default_min_columns")]
    pub min_columns: usize,

    /// Row key produced by partial reads; ignored and never emitted.
    #[serde(default = "default_noise_key")]
    pub noise_key: String,
}

impl Default for ShapeRule {
    fn default() -> Self {
        Self {
            min_rows: default_min_rows(),
            min_columns: default_min_columns(),
            noise_key: default_noise_key(),
        }
    }
}

/// Output shape for table-style harvests.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableOutput {
    /// Header of the row-key column.
    #[serde(default = "default_row_header")]
    pub row_header: String,

    /// If set, row keys are parsed with these formats and re-emitted as dates.
    #[serde(default)]
    pub row_date_formats: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableScrollPlan {
    /// Selector of the interactive cells, re-queried every cycle.
    pub cells: String,

    /// Selector of the control that scrolls the table forward.
    pub scroll_forward: String,

    #[serde(default = "default_scroll_clicks")]
    pub scroll_clicks: u32,

    #[serde(default = "default_cycle_settle_ms")]
    pub cycle_settle_ms: u64,

    #[serde(default)]
    pub hover_settle_ms: u64,

    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,

    pub tooltip: TooltipLayout,

    #[serde(default)]
    pub shape: ShapeRule,

    #[serde(default)]
    pub output: TableOutput,

    #[serde(default = "default_fail")]
    pub on_missing_tooltip: MissPolicy,
}

/// Lattice of hover points over an image-rendered table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GridGeometry {
    #[serde(default = "default_grid_start_x")]
    pub start_x: u32,
    #[serde(default = "default_grid_start_y")]
    pub start_y: u32,
    #[serde(default = "default_grid_step_x")]
    pub step_x: u32,
    #[serde(default = "default_grid_step_y")]
    pub step_y: u32,
    #[serde(default = "default_grid_margin")]
    pub margin_right: u32,
    #[serde(default = "default_grid_margin")]
    pub margin_bottom: u32,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self {
            start_x: default_grid_start_x(),
            start_y: default_grid_start_y(),
            step_x: default_grid_step_x(),
            step_y: default_grid_step_y(),
            margin_right: default_grid_margin(),
            margin_bottom: default_grid_margin(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GridProbePlan {
    /// Selector of the element the table is painted on.
    pub target: String,

    pub tooltip: TooltipLayout,

    #[serde(default)]
    pub grid: GridGeometry,

    #[serde(default = "default_grid_settle_ms")]
    pub settle_ms: u64,

    #[serde(default)]
    pub shape: ShapeRule,

    #[serde(default)]
    pub output: TableOutput,

    #[serde(default = "default_skip")]
    pub on_missing_tooltip: MissPolicy,
}

// ── Field names the harvesters read ───────────────────────────────────────────

pub const FIELD_DATE: &str = "date";
pub const FIELD_VALUE: &str = "value";
pub const FIELD_ROW: &str = "row";
pub const FIELD_COLUMN: &str = "column";

impl HarvestPlan {
    pub fn kind(&self) -> &'static str {
        match self {
            HarvestPlan::ChartSweep(_) => "chart_sweep",
            HarvestPlan::TableScroll(_) => "table_scroll",
            HarvestPlan::GridProbe(_) => "grid_probe",
        }
    }

    pub fn tooltip(&self) -> &TooltipLayout {
        match self {
            HarvestPlan::ChartSweep(p) => &p.tooltip,
            HarvestPlan::TableScroll(p) => &p.tooltip,
            HarvestPlan::GridProbe(p) => &p.tooltip,
        }
    }

    fn required_fields(&self) -> &'static [&'static str] {
        match self {
            HarvestPlan::ChartSweep(_) => &[FIELD_DATE, FIELD_VALUE],
            HarvestPlan::TableScroll(_) | HarvestPlan::GridProbe(_) => {
                &[FIELD_ROW, FIELD_COLUMN, FIELD_VALUE]
            }
        }
    }

    /// Reject plans that could never produce a valid harvest.
    pub fn validate(&self) -> Result<()> {
        let layout = self.tooltip();
        for field in self.required_fields() {
            if !layout.fields.contains_key(*field) {
                bail!("{} plan: tooltip layout has no `{}` field", self.kind(), field);
            }
        }
        if layout.timeout_ms == 0 {
            bail!("{} plan: tooltip timeout must be positive", self.kind());
        }

        match self {
            HarvestPlan::ChartSweep(p) => {
                if p.date_formats.is_empty() {
                    bail!("chart_sweep plan: no date formats configured");
                }
            }
            HarvestPlan::TableScroll(p) => {
                if p.scroll_clicks == 0 {
                    bail!("table_scroll plan: scroll_clicks must be positive");
                }
                if p.max_cycles == 0 {
                    bail!("table_scroll plan: max_cycles must be positive");
                }
            }
            HarvestPlan::GridProbe(p) => {
                if p.grid.step_x == 0 || p.grid.step_y == 0 {
                    bail!("grid_probe plan: grid steps must be positive");
                }
            }
        }
        Ok(())
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_window_width() -> u32 {
    2280
}
fn default_window_height() -> u32 {
    1024
}
fn default_idle_timeout_secs() -> u64 {
    300
}
fn default_max_attempts() -> u32 {
    4
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}
fn default_setup_timeout_ms() -> u64 {
    30_000
}
fn default_tooltip_timeout_ms() -> u64 {
    5_000
}
fn default_margin_left() -> u32 {
    4
}
fn default_margin_right() -> u32 {
    46
}
fn default_margin_bottom() -> u32 {
    2
}
fn default_overshoot() -> u32 {
    1
}
fn default_chart_settle_ms() -> u64 {
    300
}
pub fn default_date_formats() -> Vec<String> {
    ["%B %d, %Y", "%b %d, %Y", "%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_fail() -> MissPolicy {
    MissPolicy::Fail
}
fn default_skip() -> MissPolicy {
    MissPolicy::Skip
}
fn default_min_rows() -> usize {
    1
}
fn default_min_columns() -> usize {
    1
}
fn default_noise_key() -> String {
    "undefined".to_string()
}
fn default_row_header() -> String {
    "key".to_string()
}
fn default_scroll_clicks() -> u32 {
    15
}
fn default_cycle_settle_ms() -> u64 {
    2000
}
fn default_max_cycles() -> u32 {
    200
}
fn default_grid_start_x() -> u32 {
    30
}
fn default_grid_start_y() -> u32 {
    15
}
fn default_grid_step_x() -> u32 {
    85
}
fn default_grid_step_y() -> u32 {
    10
}
fn default_grid_margin() -> u32 {
    20
}
fn default_grid_settle_ms() -> u64 {
    3000
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            fresh_page_per_attempt: true,
        }
    }
}

impl Default for TableOutput {
    fn default() -> Self {
        Self {
            row_header: default_row_header(),
            row_date_formats: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { date_format: default_date_format() }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load shared defaults, then the job file, then environment overrides.
    pub fn load(job_file: &Path) -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::File::from(job_file).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix("HARVEST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read job file {:?}", job_file))?;

        Self::from_config(cfg)
    }

    /// Parse a job from TOML text, with no file or environment layering.
    pub fn from_toml(text: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Self::from_config(cfg)
    }

    fn from_config(cfg: config::Config) -> Result<Self> {
        let app_cfg: AppConfig = cfg.try_deserialize().context("Invalid job configuration")?;
        app_cfg.job.plan.validate()?;
        if app_cfg.supervisor.max_attempts == 0 {
            bail!("supervisor.max_attempts must be at least 1");
        }
        url::Url::parse(&app_cfg.job.url)
            .with_context(|| format!("Invalid target url {:?}", app_cfg.job.url))?;
        let bad_format = StrftimeItems::new(&app_cfg.output.date_format)
            .any(|item| matches!(item, Item::Error));
        if bad_format {
            bail!("output.date_format {:?} is not a valid chrono format", app_cfg.output.date_format);
        }
        Ok(app_cfg)
    }
}

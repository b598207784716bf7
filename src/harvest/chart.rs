use crate::config::{ChartSweepPlan, FIELD_DATE, FIELD_VALUE, MissPolicy, SweepMargins};
use crate::harvest::Harvester;
use crate::harvest::error::{HarvestError, HarvestResult};
use crate::models::{BoundingBox, Harvest, Point, SeriesMapping};
use crate::surface::Surface;
use crate::tooltip::cleaner::parse_date;
use crate::tooltip::{TooltipReader, Trigger, field};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, info, warn};

// ── Continuity ────────────────────────────────────────────────────────────────

/// Sweep-order date check: each date repeats the previous one or follows it
/// by exactly one calendar day.
#[derive(Debug, Default)]
pub struct DateContinuity {
    last: Option<NaiveDate>,
}

impl DateContinuity {
    pub fn observe(&mut self, date: NaiveDate) -> HarvestResult<()> {
        if let Some(previous) = self.last {
            if date != previous && previous.succ_opt() != Some(date) {
                return Err(HarvestError::DateContinuityViolation { previous, current: date });
            }
        }
        self.last = Some(date);
        Ok(())
    }
}

/// Column offsets inside the chart box, one pixel apart.
pub fn sweep_columns(bbox: &BoundingBox, margins: &SweepMargins) -> impl Iterator<Item = f64> {
    let end = bbox.width - f64::from(margins.right);
    (margins.left..)
        .map(f64::from)
        .take_while(move |x| *x < end)
}

// ── Harvester ─────────────────────────────────────────────────────────────────

pub struct ChartSweep<'a> {
    plan: &'a ChartSweepPlan,
}

impl<'a> ChartSweep<'a> {
    pub fn new(plan: &'a ChartSweepPlan) -> Self {
        Self { plan }
    }
}

#[async_trait]
impl<'a> Harvester for ChartSweep<'a> {
    async fn harvest(&self, surface: &mut dyn Surface) -> HarvestResult<Harvest> {
        let plan = self.plan;
        let chart = surface
            .locate(&plan.chart)
            .await?
            .ok_or_else(|| anyhow!("chart {:?} not found", plan.chart))?;
        let bbox = surface.bounding_box(chart).await?;
        let baseline = bbox.y + bbox.height - f64::from(plan.margins.bottom);
        let overshoot = f64::from(plan.overshoot);

        debug!("Sweeping chart {:?} ({}x{})", plan.chart, bbox.width, bbox.height);

        let reader = TooltipReader::new(&plan.tooltip, Duration::from_millis(plan.settle_ms));
        let mut series = SeriesMapping::new();
        let mut continuity = DateContinuity::default();
        let mut skipped = 0usize;

        for dx in sweep_columns(&bbox, &plan.margins) {
            let at = Point::new(bbox.x + dx, baseline);
            // Overshooting then clicking back avoids columns the renderer lags past.
            let approach = (overshoot > 0.0).then(|| Point::new(at.x + overshoot, baseline));

            let content = match reader.read(surface, Trigger::Click { approach, at }).await {
                Ok(c) => c,
                Err(HarvestError::TooltipUnavailable(reason))
                    if plan.on_missing_tooltip == MissPolicy::Skip =>
                {
                    debug!("column {}: {}", dx, reason);
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let raw_date = field(&content, FIELD_DATE)?;
            let date = parse_date(raw_date, &plan.date_formats)
                .ok_or_else(|| HarvestError::UnparseableDate(raw_date.to_string()))?;
            continuity.observe(date)?;

            let value = field(&content, FIELD_VALUE)?;
            series.insert(date, value.to_string());
        }

        if series.is_empty() {
            warn!("Chart sweep read no tooltips (chart width {})", bbox.width);
        }
        info!(
            "Chart sweep: {} days ({:?} → {:?}), {} columns skipped",
            series.len(),
            series.keys().next(),
            series.keys().last(),
            skipped
        );

        Ok(Harvest::Series(series))
    }
}

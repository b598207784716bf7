use crate::config::{GridGeometry, GridProbePlan, MissPolicy};
use crate::harvest::Harvester;
use crate::harvest::error::{HarvestError, HarvestResult};
use crate::harvest::shape::{merge_cell, validate_shape};
use crate::models::{BoundingBox, Harvest, Point, TableMapping};
use crate::surface::{HoverTarget, Surface};
use crate::tooltip::{TooltipReader, Trigger};
use anyhow::anyhow;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Hover points over the element, column by column, top to bottom.
pub fn probe_points(bbox: &BoundingBox, grid: &GridGeometry) -> Vec<Point> {
    let x_max = bbox.width - f64::from(grid.margin_right);
    let y_max = bbox.height - f64::from(grid.margin_bottom);
    let step = |start: u32, step: u32, max: f64| {
        (0..)
            .map(move |i: u32| f64::from(start) + f64::from(i) * f64::from(step))
            .take_while(move |v| *v < max)
    };

    step(grid.start_x, grid.step_x, x_max)
        .flat_map(|x| step(grid.start_y, grid.step_y, y_max).map(move |y| bbox.offset(x, y)))
        .collect()
}

/// Harvester for tables painted as a single image: every cell is reached by
/// hovering a fixed lattice of points.
pub struct GridProbe<'a> {
    plan: &'a GridProbePlan,
}

impl<'a> GridProbe<'a> {
    pub fn new(plan: &'a GridProbePlan) -> Self {
        Self { plan }
    }
}

#[async_trait]
impl<'a> Harvester for GridProbe<'a> {
    async fn harvest(&self, surface: &mut dyn Surface) -> HarvestResult<Harvest> {
        let plan = self.plan;
        let target = surface
            .locate(&plan.target)
            .await?
            .ok_or_else(|| anyhow!("grid target {:?} not found", plan.target))?;
        let bbox = surface.bounding_box(target).await?;
        let points = probe_points(&bbox, &plan.grid);
        debug!("Probing {} points over {:?}", points.len(), plan.target);

        let reader = TooltipReader::new(&plan.tooltip, Duration::from_millis(plan.settle_ms));
        let mut mapping = TableMapping::default();
        let mut misses = 0usize;

        for at in points {
            let content = match reader.read(surface, Trigger::Hover(HoverTarget::Point(at))).await {
                Ok(c) => c,
                Err(HarvestError::TooltipUnavailable(_))
                    if plan.on_missing_tooltip == MissPolicy::Skip =>
                {
                    misses += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            merge_cell(&mut mapping, &content, &plan.shape.noise_key)?;
        }

        info!(
            "Grid probe: {} rows, {} keys, {} points without tooltip",
            mapping.row_count(),
            mapping.key_count(),
            misses
        );
        validate_shape(&mapping, &plan.shape)?;
        Ok(Harvest::Table(mapping))
    }
}

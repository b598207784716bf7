use crate::config::{MissPolicy, TableScrollPlan};
use crate::harvest::Harvester;
use crate::harvest::error::{HarvestError, HarvestResult};
use crate::harvest::shape::{merge_cell, validate_shape};
use crate::models::{Harvest, MouseButton, TableMapping};
use crate::surface::{HoverTarget, Surface};
use crate::tooltip::{TooltipReader, Trigger};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Scroll-and-hover harvester for virtualized tables. Stops at the first
/// cycle that adds no (row, column) key.
pub struct TableConvergence<'a> {
    plan: &'a TableScrollPlan,
}

impl<'a> TableConvergence<'a> {
    pub fn new(plan: &'a TableScrollPlan) -> Self {
        Self { plan }
    }

    /// Hover every visible cell once. Returns the number of cells read.
    async fn sweep_visible(
        &self,
        surface: &mut dyn Surface,
        reader: &TooltipReader<'_>,
        mapping: &mut TableMapping,
    ) -> HarvestResult<usize> {
        // Virtualization recycles nodes, so handles are only good for this pass.
        let cells = surface.locate_all(&self.plan.cells).await?;
        let mut read = 0usize;

        for cell in cells {
            if surface.is_hidden(cell).await? {
                continue;
            }
            surface.scroll_into_view(cell).await?;

            let content = match reader.read(surface, Trigger::Hover(HoverTarget::Element(cell))).await {
                Ok(c) => c,
                Err(HarvestError::TooltipUnavailable(reason))
                    if self.plan.on_missing_tooltip == MissPolicy::Skip =>
                {
                    debug!("cell {:?}: {}", cell, reason);
                    continue;
                }
                Err(e) => return Err(e),
            };

            merge_cell(mapping, &content, &self.plan.shape.noise_key)?;
            read += 1;
        }
        Ok(read)
    }

    async fn scroll_forward(&self, surface: &mut dyn Surface) -> HarvestResult<()> {
        match surface.locate(&self.plan.scroll_forward).await? {
            Some(control) => {
                for _ in 0..self.plan.scroll_clicks {
                    surface.click(control, MouseButton::Left).await?;
                }
            }
            None => warn!("Scroll control {:?} not found", self.plan.scroll_forward),
        }
        surface.wait(Duration::from_millis(self.plan.cycle_settle_ms)).await;
        Ok(())
    }
}

#[async_trait]
impl<'a> Harvester for TableConvergence<'a> {
    async fn harvest(&self, surface: &mut dyn Surface) -> HarvestResult<Harvest> {
        let plan = self.plan;
        let reader = TooltipReader::new(&plan.tooltip, Duration::from_millis(plan.hover_settle_ms));
        let mut mapping = TableMapping::default();

        for cycle in 1..=plan.max_cycles {
            let before = mapping.key_count();
            let read = self.sweep_visible(surface, &reader, &mut mapping).await?;
            let after = mapping.key_count();
            debug!(
                "cycle {}: {} cells read, {} new keys ({} total)",
                cycle,
                read,
                after - before,
                after
            );

            self.scroll_forward(surface).await?;

            if after == before {
                info!(
                    "Table converged after {} cycles: {} rows, {} keys",
                    cycle,
                    mapping.row_count(),
                    after
                );
                validate_shape(&mapping, &plan.shape)?;
                return Ok(Harvest::Table(mapping));
            }
        }

        Err(HarvestError::NoConvergence { cycles: plan.max_cycles })
    }
}

//! Harvesters: turn a rendered visual into a validated mapping.
//!
//! ## Variants
//!
//! `chart_sweep`: step the pointer one pixel at a time across a chart,
//!   reading a (date, value) tooltip per column; the dates must form a
//!   gapless series.
//!
//! `table_scroll`: hover every visible cell of a virtualized table, scroll,
//!   and repeat until a cycle adds no new (row, column) keys.
//!
//! `grid_probe`: hover a fixed lattice of points over a table painted as an
//!   image.
//!
//! Each call is one complete attempt that starts from an empty mapping.

pub mod chart;
pub mod error;
pub mod grid;
pub mod shape;
pub mod table;

use crate::config::HarvestPlan;
use crate::models::Harvest;
use crate::surface::Surface;
use async_trait::async_trait;

use self::chart::ChartSweep;
use self::error::HarvestResult;
use self::grid::GridProbe;
use self::table::TableConvergence;

/// One full harvest attempt against a surface the caller owns.
#[async_trait]
pub trait Harvester: Send + Sync {
    async fn harvest(&self, surface: &mut dyn Surface) -> HarvestResult<Harvest>;
}

impl HarvestPlan {
    pub fn harvester(&self) -> Box<dyn Harvester + '_> {
        match self {
            HarvestPlan::ChartSweep(p) => Box::new(ChartSweep::new(p)),
            HarvestPlan::TableScroll(p) => Box::new(TableConvergence::new(p)),
            HarvestPlan::GridProbe(p) => Box::new(GridProbe::new(p)),
        }
    }
}

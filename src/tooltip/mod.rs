pub mod cleaner;

use crate::config::TooltipLayout;
use crate::harvest::error::{HarvestError, HarvestResult};
use crate::models::{MouseButton, Point, TooltipContent};
use crate::surface::{HoverTarget, Surface};
use std::time::Duration;
use tracing::trace;

use self::cleaner::clean_field;

/// Pointer action expected to reveal a tooltip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    /// Move to `approach` first, then click at `at`.
    Click { approach: Option<Point>, at: Point },
    Hover(HoverTarget),
}

/// Reads one tooltip per trigger using a fixed field layout.
pub struct TooltipReader<'a> {
    layout: &'a TooltipLayout,
    settle: Duration,
}

impl<'a> TooltipReader<'a> {
    pub fn new(layout: &'a TooltipLayout, settle: Duration) -> Self {
        Self { layout, settle }
    }

    /// Fire `trigger`, wait for the container and read every layout field.
    ///
    /// A missing container or field is `TooltipUnavailable`; host faults pass
    /// through as `Surface`.
    pub async fn read(
        &self,
        surface: &mut dyn Surface,
        trigger: Trigger,
    ) -> HarvestResult<TooltipContent> {
        match trigger {
            Trigger::Click { approach, at } => {
                if let Some(p) = approach {
                    surface.pointer_move(p).await?;
                }
                surface.pointer_click(at, MouseButton::Left).await?;
            }
            Trigger::Hover(target) => surface.hover(target).await?,
        }
        if !self.settle.is_zero() {
            surface.wait(self.settle).await;
        }

        let container = surface
            .wait_for(&self.layout.container, self.layout.timeout())
            .await?
            .ok_or_else(|| {
                HarvestError::TooltipUnavailable(format!(
                    "{} did not appear within {:?}",
                    self.layout.container,
                    self.layout.timeout()
                ))
            })?;

        let mut content = TooltipContent::default();
        for (name, selector) in &self.layout.fields {
            let handle = surface
                .locate_within(container, selector)
                .await?
                .ok_or_else(|| {
                    HarvestError::TooltipUnavailable(format!("field `{}` ({}) missing", name, selector))
                })?;
            let raw = surface.text_content(handle).await?;
            content.insert(name.clone(), clean_field(&raw));
        }

        trace!("tooltip at {:?}: {:?}", trigger, content);
        Ok(content)
    }
}

/// Look up a field the layout is known to carry.
pub fn field<'c>(content: &'c TooltipContent, name: &str) -> HarvestResult<&'c str> {
    content
        .get(name)
        .ok_or_else(|| HarvestError::TooltipUnavailable(format!("field `{}` not read", name)))
}

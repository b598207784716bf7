//! The automation host the harvesters drive.
//!
//! A [`Surface`] is a single page (or frame) that one harvest attempt owns
//! exclusively. Every method is a suspension point; harvesters issue them
//! strictly one after another.

#[cfg(feature = "chrome")]
pub mod chrome;
#[cfg(test)]
pub(crate) mod scripted;

use crate::models::{BoundingBox, ElementHandle, MouseButton, Point};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Where a hover lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoverTarget {
    Element(ElementHandle),
    Point(Point),
}

/// Swappable browser-automation host.
///
/// `Err` means an automation fault (detached node, crashed tab, navigation
/// failure). Absence is reported through `Ok(None)` / `Ok(false)` so callers
/// can tell "not there yet" from "broken".
#[async_trait]
pub trait Surface: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Continue inside the frame matched by `selector`.
    async fn enter_frame(&mut self, selector: &str) -> Result<()>;

    async fn locate(&mut self, selector: &str) -> Result<Option<ElementHandle>>;
    async fn locate_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>>;
    async fn locate_within(
        &mut self,
        parent: ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>>;

    async fn bounding_box(&mut self, handle: ElementHandle) -> Result<BoundingBox>;

    async fn pointer_move(&mut self, at: Point) -> Result<()>;
    async fn pointer_click(&mut self, at: Point, button: MouseButton) -> Result<()>;
    async fn click(&mut self, handle: ElementHandle, button: MouseButton) -> Result<()>;
    async fn hover(&mut self, target: HoverTarget) -> Result<()>;
    async fn scroll_into_view(&mut self, handle: ElementHandle) -> Result<()>;
    async fn is_hidden(&mut self, handle: ElementHandle) -> Result<bool>;

    /// Wait until `selector` matches, or return `Ok(None)` once `timeout` passes.
    async fn wait_for(&mut self, selector: &str, timeout: Duration)
    -> Result<Option<ElementHandle>>;

    async fn text_content(&mut self, handle: ElementHandle) -> Result<String>;

    /// Fixed settle delay.
    async fn wait(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

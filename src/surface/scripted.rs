//! In-memory surface for tests: tooltips are scripted per pointer point or
//! per table cell, and every action is recorded.

use super::{HoverTarget, Surface};
use crate::models::{BoundingBox, ElementHandle, MouseButton, Point};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// field selector → text
pub(crate) type Tooltip = Vec<(String, String)>;

pub(crate) fn tip(fields: &[(&str, &str)]) -> Tooltip {
    fields
        .iter()
        .map(|(s, t)| (s.to_string(), t.to_string()))
        .collect()
}

const CONTAINER: u64 = 10_000;
const FIELD_BASE: u64 = 20_000;
const CELL_BASE: u64 = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Navigate(String),
    EnterFrame(String),
    Move(Point),
    Click(Point, MouseButton),
    ClickElement(ElementHandle, MouseButton),
    Hover(HoverTarget),
    ScrollIntoView(ElementHandle),
    Wait(Duration),
}

#[derive(Debug, Clone)]
pub(crate) struct Cell {
    pub hidden: bool,
    pub tooltip: Option<Tooltip>,
}

impl Cell {
    pub fn visible(tooltip: Tooltip) -> Self {
        Self { hidden: false, tooltip: Some(tooltip) }
    }

    pub fn hidden() -> Self {
        Self { hidden: true, tooltip: None }
    }
}

type PointScript = Box<dyn FnMut(Point) -> Option<Tooltip> + Send>;

pub(crate) struct ScriptedSurface {
    container: String,
    elements: HashMap<String, (ElementHandle, BoundingBox)>,
    on_point: Option<PointScript>,
    cells_selector: Option<String>,
    scroll_selector: Option<String>,
    clicks_per_page: usize,
    pages: Vec<Vec<Cell>>,
    scroll_clicks: usize,
    current: Option<Tooltip>,
    pub events: Vec<Event>,
    pub enumerations: usize,
}

impl ScriptedSurface {
    pub fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
            elements: HashMap::new(),
            on_point: None,
            cells_selector: None,
            scroll_selector: None,
            clicks_per_page: 1,
            pages: Vec::new(),
            scroll_clicks: 0,
            current: None,
            events: Vec::new(),
            enumerations: 0,
        }
    }

    pub fn element(mut self, selector: &str, bbox: BoundingBox) -> Self {
        let handle = ElementHandle::new(self.elements.len() as u64 + 1);
        self.elements.insert(selector.to_string(), (handle, bbox));
        self
    }

    pub fn on_point(
        mut self,
        script: impl FnMut(Point) -> Option<Tooltip> + Send + 'static,
    ) -> Self {
        self.on_point = Some(Box::new(script));
        self
    }

    /// Virtualized table: each page is the visible cell set after
    /// `clicks_per_page` clicks on the scroll control.
    pub fn pages(
        mut self,
        cells: &str,
        scroll: &str,
        clicks_per_page: usize,
        pages: Vec<Vec<Cell>>,
    ) -> Self {
        self = self.element(scroll, BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 });
        self.cells_selector = Some(cells.to_string());
        self.scroll_selector = Some(scroll.to_string());
        self.clicks_per_page = clicks_per_page.max(1);
        self.pages = pages;
        self
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Click(p, _) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn page_index(&self) -> usize {
        (self.scroll_clicks / self.clicks_per_page).min(self.pages.len().saturating_sub(1))
    }

    fn cell(&self, handle: ElementHandle) -> Option<&Cell> {
        let idx = handle.id().checked_sub(CELL_BASE)? as usize;
        self.pages.get(self.page_index())?.get(idx)
    }

    fn handle_of(&self, selector: &str) -> Option<ElementHandle> {
        self.elements.get(selector).map(|(h, _)| *h)
    }

    fn trigger_point(&mut self, at: Point) {
        self.current = self.on_point.as_mut().and_then(|f| f(at));
    }
}

#[async_trait]
impl Surface for ScriptedSurface {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.events.push(Event::Navigate(url.to_string()));
        self.current = None;
        Ok(())
    }

    async fn enter_frame(&mut self, selector: &str) -> Result<()> {
        self.events.push(Event::EnterFrame(selector.to_string()));
        Ok(())
    }

    async fn locate(&mut self, selector: &str) -> Result<Option<ElementHandle>> {
        Ok(self.handle_of(selector))
    }

    async fn locate_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        if self.cells_selector.as_deref() != Some(selector) {
            return Ok(self.handle_of(selector).into_iter().collect());
        }
        self.enumerations += 1;
        let count = self.pages.get(self.page_index()).map_or(0, Vec::len);
        Ok((0..count as u64).map(|i| ElementHandle::new(CELL_BASE + i)).collect())
    }

    async fn locate_within(
        &mut self,
        parent: ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>> {
        if parent.id() != CONTAINER {
            return Ok(None);
        }
        Ok(self
            .current
            .as_ref()
            .and_then(|t| t.iter().position(|(s, _)| s == selector))
            .map(|i| ElementHandle::new(FIELD_BASE + i as u64)))
    }

    async fn bounding_box(&mut self, handle: ElementHandle) -> Result<BoundingBox> {
        match self.elements.values().find(|(h, _)| *h == handle) {
            Some((_, b)) => Ok(*b),
            None => bail!("no bounding box for {:?}", handle),
        }
    }

    async fn pointer_move(&mut self, at: Point) -> Result<()> {
        self.events.push(Event::Move(at));
        self.current = None;
        Ok(())
    }

    async fn pointer_click(&mut self, at: Point, button: MouseButton) -> Result<()> {
        self.events.push(Event::Click(at, button));
        self.trigger_point(at);
        Ok(())
    }

    async fn click(&mut self, handle: ElementHandle, button: MouseButton) -> Result<()> {
        self.events.push(Event::ClickElement(handle, button));
        let is_scroll = self
            .scroll_selector
            .as_deref()
            .and_then(|s| self.handle_of(s))
            .is_some_and(|h| h == handle);
        if is_scroll {
            self.scroll_clicks += 1;
        }
        Ok(())
    }

    async fn hover(&mut self, target: HoverTarget) -> Result<()> {
        self.events.push(Event::Hover(target));
        match target {
            HoverTarget::Point(p) => self.trigger_point(p),
            HoverTarget::Element(h) => {
                self.current = self.cell(h).and_then(|c| c.tooltip.clone());
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&mut self, handle: ElementHandle) -> Result<()> {
        self.events.push(Event::ScrollIntoView(handle));
        Ok(())
    }

    async fn is_hidden(&mut self, handle: ElementHandle) -> Result<bool> {
        match self.cell(handle) {
            Some(c) => Ok(c.hidden),
            None => bail!("stale cell handle {:?}", handle),
        }
    }

    async fn wait_for(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<Option<ElementHandle>> {
        if selector == self.container {
            return Ok(self.current.as_ref().map(|_| ElementHandle::new(CONTAINER)));
        }
        Ok(self.handle_of(selector))
    }

    async fn text_content(&mut self, handle: ElementHandle) -> Result<String> {
        let idx = handle.id().checked_sub(FIELD_BASE).map(|i| i as usize);
        match (idx, self.current.as_ref()) {
            (Some(i), Some(t)) if i < t.len() => Ok(t[i].1.clone()),
            _ if self.elements.values().any(|(h, _)| *h == handle) => Ok(String::new()),
            _ => bail!("element {:?} is detached", handle),
        }
    }

    async fn wait(&mut self, duration: Duration) {
        self.events.push(Event::Wait(duration));
    }
}

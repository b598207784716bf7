//! Chrome DevTools host backed by `headless_chrome`.
//!
//! DevTools calls block the calling thread. Harvests are strictly sequential,
//! so the binary runs them on a current-thread runtime.

use super::{HoverTarget, Surface};
use crate::config::BrowserConfig;
use crate::models::{BoundingBox, ElementHandle, MouseButton, Point};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use headless_chrome::browser::tab::point::Point as CdpPoint;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const IS_HIDDEN_JS: &str = r#"function() {
    const r = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return r.width === 0 || r.height === 0
        || style.visibility === 'hidden' || style.display === 'none';
}"#;

const CONTEXT_MENU_JS: &str = r#"function() {
    const r = this.getBoundingClientRect();
    this.dispatchEvent(new MouseEvent('contextmenu', {
        bubbles: true, button: 2,
        clientX: r.x + r.width / 2, clientY: r.y + r.height / 2,
    }));
}"#;

pub struct ChromeSurface {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSurface {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(Duration::from_secs(config.idle_timeout_secs))
            .build()
            .map_err(|e| anyhow!("Invalid Chrome launch options: {}", e))?;

        let browser = Browser::new(options).context("Failed to launch Chrome")?;
        let tab = browser.new_tab().context("Failed to open a tab")?;
        info!(
            "Chrome ready ({}x{}, headless={})",
            config.window_width, config.window_height, config.headless
        );
        Ok(Self { _browser: browser, tab })
    }

    fn element(&self, handle: ElementHandle) -> Result<Element<'_>> {
        Element::new(&self.tab, handle.id() as _)
            .with_context(|| format!("Element {:?} is no longer attached", handle))
    }
}

fn handle_of(el: &Element<'_>) -> ElementHandle {
    ElementHandle::new(u64::from(el.node_id))
}

fn cdp(p: Point) -> CdpPoint {
    CdpPoint { x: p.x, y: p.y }
}

#[async_trait]
impl Surface for ChromeSurface {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?
            .wait_until_navigated()
            .with_context(|| format!("Page {} never finished loading", url))?;
        Ok(())
    }

    /// Frames are entered by loading the iframe's document in the tab itself.
    async fn enter_frame(&mut self, selector: &str) -> Result<()> {
        let target = {
            let frame = self
                .tab
                .wait_for_element(selector)
                .with_context(|| format!("Frame {:?} not found", selector))?;
            let src = frame
                .get_attribute_value("src")?
                .ok_or_else(|| anyhow!("Frame {:?} has no src", selector))?;
            url::Url::parse(&self.tab.get_url())?.join(&src)?
        };
        debug!("Entering frame {}", target);
        self.navigate(target.as_str()).await
    }

    async fn locate(&mut self, selector: &str) -> Result<Option<ElementHandle>> {
        Ok(self.tab.find_element(selector).ok().map(|el| handle_of(&el)))
    }

    async fn locate_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>> {
        match self.tab.find_elements(selector) {
            Ok(els) => Ok(els.iter().map(handle_of).collect()),
            Err(e) => {
                debug!("{:?} matched nothing: {}", selector, e);
                Ok(Vec::new())
            }
        }
    }

    async fn locate_within(
        &mut self,
        parent: ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>> {
        let parent = self.element(parent)?;
        Ok(parent.find_element(selector).ok().map(|el| handle_of(&el)))
    }

    async fn bounding_box(&mut self, handle: ElementHandle) -> Result<BoundingBox> {
        let model = self.element(handle)?.get_box_model()?;
        let vp = model.content_viewport();
        Ok(BoundingBox { x: vp.x, y: vp.y, width: vp.width, height: vp.height })
    }

    async fn pointer_move(&mut self, at: Point) -> Result<()> {
        self.tab.move_mouse_to_point(cdp(at))?;
        Ok(())
    }

    async fn pointer_click(&mut self, at: Point, button: MouseButton) -> Result<()> {
        match button {
            MouseButton::Left => {
                self.tab.click_point(cdp(at))?;
            }
            MouseButton::Right => {
                let js = format!(
                    "document.elementFromPoint({x}, {y})?.dispatchEvent(new MouseEvent('contextmenu', \
                     {{ bubbles: true, button: 2, clientX: {x}, clientY: {y} }}))",
                    x = at.x,
                    y = at.y
                );
                self.tab.evaluate(&js, false)?;
            }
        }
        Ok(())
    }

    async fn click(&mut self, handle: ElementHandle, button: MouseButton) -> Result<()> {
        let el = self.element(handle)?;
        match button {
            MouseButton::Left => {
                el.click()?;
            }
            MouseButton::Right => {
                el.call_js_fn(CONTEXT_MENU_JS, vec![], false)?;
            }
        }
        Ok(())
    }

    async fn hover(&mut self, target: HoverTarget) -> Result<()> {
        match target {
            HoverTarget::Element(handle) => {
                self.element(handle)?.move_mouse_over()?;
            }
            HoverTarget::Point(p) => {
                self.tab.move_mouse_to_point(cdp(p))?;
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&mut self, handle: ElementHandle) -> Result<()> {
        self.element(handle)?.scroll_into_view()?;
        Ok(())
    }

    async fn is_hidden(&mut self, handle: ElementHandle) -> Result<bool> {
        let result = self.element(handle)?.call_js_fn(IS_HIDDEN_JS, vec![], false)?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(true))
    }

    async fn wait_for(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>> {
        match self.tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(el) => Ok(Some(handle_of(&el))),
            Err(e) => {
                debug!("{:?} not present after {:?}: {}", selector, timeout, e);
                Ok(None)
            }
        }
    }

    async fn text_content(&mut self, handle: ElementHandle) -> Result<String> {
        Ok(self.element(handle)?.get_inner_text()?)
    }
}

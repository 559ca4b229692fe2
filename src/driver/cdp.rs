//! `chromiumoxide`-backed [`Driver`] implementation.
//!
//! Element handles are indices into a page-side registry
//! (`window.__swcReg`). Every lookup runs as a small JS evaluation; ops on
//! a handle re-check `isConnected` first so a DOM mutation between
//! interactions reads as "absent" rather than a hard failure. The registry
//! is reset by each [`Query::VisibleProfileSection`] lookup, which bounds
//! its growth to one iteration's worth of elements.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{browser, Driver, DriverError, DriverResult, Handle, Key, Query};
use crate::core::HarvestConfig;

const REG: &str = "window.__swcReg";

pub struct CdpDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

impl CdpDriver {
    /// Launch the browser, navigate to `target_url`, and hand back the
    /// session handle. The caller owns teardown via [`CdpDriver::shutdown`].
    pub async fn launch(config: &HarvestConfig, target_url: &str) -> anyhow::Result<Self> {
        let exe = browser::find_browser_executable(
            config.resolve_browser_executable().as_deref(),
        )
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No browser found. Install Chrome, Chromium, or Brave, or set CHROME_EXECUTABLE."
            )
        })?;

        info!("🚀 Launching browser session ({})", exe);

        let user_data_dir = config.resolve_user_data_dir();
        let browser_config =
            browser::build_session_config(&exe, config.resolve_headless(), user_data_dir.as_ref())?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to launch browser ({}): {}", exe, e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser
            .new_page(target_url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", target_url, e))?;

        info!("🌐 Navigated to {}", target_url);

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task,
        })
    }

    /// Close the browser and stop the event pump. Idempotent; called on
    /// every exit path (normal, interrupt, fatal).
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut b) = guard.take() {
            if let Err(e) = b.close().await {
                warn!("Browser close error (non-fatal): {}", e);
            }
            info!("🛑 Browser session shut down");
        }
        self.handler_task.abort();
    }

    async fn eval(&self, js: String, timeout: Duration) -> DriverResult<serde_json::Value> {
        match tokio::time::timeout(timeout, self.page.evaluate(js)).await {
            Err(_) => Err(DriverError::Timeout(timeout)),
            Ok(Err(e)) => Err(DriverError::Fatal(format!("CDP evaluate failed: {}", e))),
            Ok(Ok(res)) => Ok(res
                .into_value::<serde_json::Value>()
                .unwrap_or(serde_json::Value::Null)),
        }
    }

    async fn eval_handle(&self, js: String, timeout: Duration) -> DriverResult<Option<Handle>> {
        Ok(self.eval(js, timeout).await?.as_u64().map(Handle))
    }

    /// CSS selector for the scoped queries; `None` for the document-level
    /// compound ones that need bespoke JS.
    fn selector_for(query: &Query) -> Option<String> {
        match query {
            Query::PhotoSlot(n) => Some(format!(r#"div[aria-label="Profile Photo {}"]"#, n)),
            Query::NextPhotoControl => Some(r#"button[aria-label="Next Photo"]"#.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl Driver for CdpDriver {
    async fn find_section(&self, query: &Query, timeout: Duration) -> DriverResult<Option<Handle>> {
        let js = match query {
            Query::VisibleProfileSection => format!(
                r#"(() => {{
                    const reg = {reg} = [];
                    const secs = Array.from(document.querySelectorAll(`section[aria-label*="'s photos"]`));
                    for (const s of secs) {{
                        const g = s.parentElement && s.parentElement.parentElement;
                        if (g && g.getAttribute('aria-hidden') === 'false') {{
                            reg.push(s);
                            return reg.length - 1;
                        }}
                    }}
                    return null;
                }})()"#,
                reg = REG,
            ),
            Query::HeadingExact(label) => {
                let needle = serde_json::to_string(label)
                    .map_err(|e| DriverError::Fatal(e.to_string()))?;
                format!(
                    r#"(() => {{
                        const reg = ({reg} ||= []);
                        const h = Array.from(document.querySelectorAll('h2'))
                            .find(e => (e.textContent || '').trim() === {needle});
                        if (!h || !h.parentElement) return null;
                        reg.push(h.parentElement);
                        return reg.length - 1;
                    }})()"#,
                    reg = REG,
                    needle = needle,
                )
            }
            other => {
                let sel = Self::selector_for(other)
                    .ok_or_else(|| DriverError::Fatal(format!("unsupported query: {:?}", other)))?;
                format!(
                    r#"(() => {{
                        const reg = ({reg} ||= []);
                        const el = document.querySelector({sel});
                        if (!el) return null;
                        reg.push(el);
                        return reg.length - 1;
                    }})()"#,
                    reg = REG,
                    sel = serde_json::to_string(&sel).map_err(|e| DriverError::Fatal(e.to_string()))?,
                )
            }
        };
        self.eval_handle(js, timeout).await
    }

    async fn find_child(
        &self,
        of: Handle,
        query: &Query,
        timeout: Duration,
    ) -> DriverResult<Option<Handle>> {
        let sel = Self::selector_for(query)
            .ok_or_else(|| DriverError::Fatal(format!("unsupported child query: {:?}", query)))?;
        let js = format!(
            r#"(() => {{
                const reg = ({reg} ||= []);
                const root = reg[{idx}];
                if (!root || !root.isConnected) return null;
                const el = root.querySelector({sel});
                if (!el) return null;
                reg.push(el);
                return reg.length - 1;
            }})()"#,
            reg = REG,
            idx = of.0,
            sel = serde_json::to_string(&sel).map_err(|e| DriverError::Fatal(e.to_string()))?,
        );
        self.eval_handle(js, timeout).await
    }

    async fn find_sibling(&self, of: Handle, timeout: Duration) -> DriverResult<Option<Handle>> {
        let js = format!(
            r#"(() => {{
                const reg = ({reg} ||= []);
                const el = reg[{idx}];
                if (!el || !el.isConnected || !el.nextElementSibling) return null;
                reg.push(el.nextElementSibling);
                return reg.length - 1;
            }})()"#,
            reg = REG,
            idx = of.0,
        );
        self.eval_handle(js, timeout).await
    }

    async fn attribute(
        &self,
        el: Handle,
        name: &str,
        timeout: Duration,
    ) -> DriverResult<Option<String>> {
        let js = format!(
            r#"(() => {{
                const el = ({reg} || [])[{idx}];
                if (!el || !el.isConnected) return null;
                return el.getAttribute({name});
            }})()"#,
            reg = REG,
            idx = el.0,
            name = serde_json::to_string(name).map_err(|e| DriverError::Fatal(e.to_string()))?,
        );
        Ok(self
            .eval(js, timeout)
            .await?
            .as_str()
            .map(|s| s.to_string()))
    }

    async fn text(&self, el: Handle, timeout: Duration) -> DriverResult<Option<String>> {
        // innerText keeps the UI's line breaks, matching how a human reads
        // the panel top to bottom.
        let js = format!(
            r#"(() => {{
                const el = ({reg} || [])[{idx}];
                if (!el || !el.isConnected) return null;
                return el.innerText || '';
            }})()"#,
            reg = REG,
            idx = el.0,
        );
        Ok(self
            .eval(js, timeout)
            .await?
            .as_str()
            .map(|s| s.to_string()))
    }

    async fn click(&self, el: Handle, timeout: Duration) -> DriverResult<bool> {
        let js = format!(
            r#"(() => {{
                const el = ({reg} || [])[{idx}];
                if (!el || !el.isConnected) return false;
                el.click();
                return true;
            }})()"#,
            reg = REG,
            idx = el.0,
        );
        Ok(self.eval(js, timeout).await?.as_bool().unwrap_or(false))
    }

    async fn send_key(&self, key: Key, timeout: Duration) -> DriverResult<()> {
        // Trusted CDP input events — synthetic DOM KeyboardEvents are
        // ignored by the app's key handlers.
        for event_type in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let params = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(key.key_name())
                .code(key.key_name())
                .windows_virtual_key_code(key.virtual_key_code())
                .native_virtual_key_code(key.virtual_key_code())
                .build()
                .map_err(DriverError::Fatal)?;

            match tokio::time::timeout(timeout, self.page.execute(params)).await {
                Err(_) => return Err(DriverError::Timeout(timeout)),
                Ok(Err(e)) => {
                    return Err(DriverError::Fatal(format!("key dispatch failed: {}", e)))
                }
                Ok(Ok(_)) => {}
            }
        }
        Ok(())
    }

    async fn is_enabled(&self, el: Handle, timeout: Duration) -> DriverResult<bool> {
        // Stale elements count as disabled so walkers terminate instead of
        // clicking into the void.
        let js = format!(
            r#"(() => {{
                const el = ({reg} || [])[{idx}];
                if (!el || !el.isConnected) return false;
                return !(el.disabled || el.getAttribute('aria-disabled') === 'true');
            }})()"#,
            reg = REG,
            idx = el.0,
        );
        Ok(self.eval(js, timeout).await?.as_bool().unwrap_or(false))
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        // Best-effort backstop; Drop cannot await. The orchestrator calls
        // shutdown() on every exit path, so this only fires on panics.
        self.handler_task.abort();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if let Ok(mut guard) = self.browser.try_lock() {
            if let Some(mut b) = guard.take() {
                handle.spawn(async move {
                    let _ = b.close().await;
                });
            }
        }
    }
}

//! CDP-backed [`PageDriver`] (feature `browser`).
//!
//! Talks to a real Chromium over the DevTools protocol via `chromiumoxide`.
//! Selector interpretation runs in-page: the [`SelectorSpec`] is serialized
//! to JSON and evaluated by an injected interpreter that mirrors the
//! in-memory matcher, including shadow-root traversal and the exact-text
//! preference. DOM snapshots register every serialized element in
//! `window.__grabar_nodes` so mutations can address nodes by snapshot id.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;

use crate::page::{DomMutation, DomNode, NodeId, PageDriver};
use crate::result::{GrabarError, GrabarResult};
use crate::selector::SelectorSpec;

/// Attach polling interval.
const ATTACH_POLL_INTERVAL_MS: u64 = 50;

/// Launch options for the managed browser.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Keep the Chromium sandbox enabled
    pub sandbox: bool,
    /// Explicit Chromium binary, system default when `None`
    pub chromium_path: Option<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
        }
    }
}

/// Owns the browser process and its CDP event loop.
#[derive(Debug)]
pub struct BrowserSession {
    inner: Arc<Mutex<Browser>>,
    #[allow(dead_code)]
    handle: tokio::task::JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chromium and start draining its event stream.
    ///
    /// # Errors
    ///
    /// Returns [`GrabarError::PageError`] when the browser cannot start.
    pub async fn launch(options: BrowserOptions) -> GrabarResult<Self> {
        let mut builder = BrowserConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(|e| GrabarError::PageError {
            message: format!("browser config: {e}"),
        })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| GrabarError::PageError {
                    message: format!("browser launch: {e}"),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            inner: Arc::new(Mutex::new(browser)),
            handle,
        })
    }

    /// Open a new page at the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`GrabarError::PageError`] when the page cannot be created.
    pub async fn new_page(&self, url: &str) -> GrabarResult<CdpPage> {
        let browser = self.inner.lock().await;
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| GrabarError::PageError {
                message: format!("new page: {e}"),
            })?;
        Ok(CdpPage {
            inner: Arc::new(Mutex::new(page)),
        })
    }

    /// Close the browser process.
    ///
    /// # Errors
    ///
    /// Returns [`GrabarError::PageError`] when shutdown fails.
    pub async fn close(self) -> GrabarResult<()> {
        let mut browser = self.inner.lock().await;
        browser.close().await.map_err(|e| GrabarError::PageError {
            message: format!("browser close: {e}"),
        })?;
        Ok(())
    }
}

/// One live page behind the driver trait.
#[derive(Debug, Clone)]
pub struct CdpPage {
    inner: Arc<Mutex<Page>>,
}

impl CdpPage {
    async fn eval<T: serde::de::DeserializeOwned>(&self, expression: String) -> GrabarResult<T> {
        let page = self.inner.lock().await;
        page.evaluate(expression)
            .await
            .map_err(|e| GrabarError::PageError {
                message: format!("evaluate: {e}"),
            })?
            .into_value()
            .map_err(|e| GrabarError::PageError {
                message: format!("evaluation result: {e}"),
            })
    }
}

#[async_trait::async_trait]
impl PageDriver for CdpPage {
    async fn wait_for_attached(
        &self,
        spec: &SelectorSpec,
        timeout: Duration,
    ) -> GrabarResult<()> {
        let script = count_script(spec)?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let count: u64 = self.eval(script.clone()).await?;
            if count > 0 {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(GrabarError::Timeout {
                    ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(Duration::from_millis(ATTACH_POLL_INTERVAL_MS)).await;
        }
    }

    async fn count_matches(&self, spec: &SelectorSpec) -> GrabarResult<usize> {
        let count: u64 = self.eval(count_script(spec)?).await?;
        Ok(count as usize)
    }

    async fn document(&self) -> GrabarResult<DomNode> {
        let json: String = self.eval(SNAPSHOT_SCRIPT.to_string()).await?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn apply(&self, node: NodeId, mutation: &DomMutation) -> GrabarResult<()> {
        let script = match mutation {
            DomMutation::DispatchEvent { event } => format!(
                r"(() => {{
  const el = window.__grabar_nodes && window.__grabar_nodes[{node}];
  if (!el) return false;
  el.dispatchEvent(new Event({event:?}, {{ bubbles: true, composed: true }}));
  return true;
}})()"
            ),
            DomMutation::SetValue { value } => format!(
                r"(() => {{
  const el = window.__grabar_nodes && window.__grabar_nodes[{node}];
  if (!el) return false;
  el.value = {value:?};
  return true;
}})()"
            ),
        };
        let applied: bool = self.eval(script).await?;
        if applied {
            Ok(())
        } else {
            Err(GrabarError::PageError {
                message: format!("node {node} is not in the current snapshot"),
            })
        }
    }

    async fn storage_get(
        &self,
        location: crate::model::StorageLocation,
        key: &str,
    ) -> GrabarResult<Option<String>> {
        use crate::model::StorageLocation;
        let script = match location {
            StorageLocation::LocalStorage => format!("window.localStorage.getItem({key:?})"),
            StorageLocation::SessionStorage => format!("window.sessionStorage.getItem({key:?})"),
            StorageLocation::Cookie => format!(
                r"(document.cookie.split('; ').find(c => c.startsWith({key:?} + '=')) || '').split('=').slice(1).join('=') || null"
            ),
        };
        self.eval(script).await
    }

    async fn screenshot(&self, path: &Path) -> GrabarResult<()> {
        let page = self.inner.lock().await;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = page
            .execute(params)
            .await
            .map_err(|e| GrabarError::ScreenshotError {
                message: e.to_string(),
            })?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| GrabarError::ScreenshotError {
                message: e.to_string(),
            })?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// In-page match count for one selector. The selector ships as JSON and an
/// injected interpreter mirrors the in-memory matcher.
fn count_script(spec: &SelectorSpec) -> GrabarResult<String> {
    let spec_json = serde_json::to_string(spec)?;
    Ok(format!(
        r"(() => {{
  {MATCHER_JS}
  return matchSpec(document, {spec_json}).length;
}})()"
    ))
}

/// Shadow-piercing selector interpreter, kept in lockstep with the Rust
/// matcher in `force`.
const MATCHER_JS: &str = r"
  const walk = (root, out) => {
    for (const el of root.querySelectorAll('*')) {
      out.push(el);
      if (el.shadowRoot) walk(el.shadowRoot, out);
    }
    return out;
  };
  const implicitRole = (el) => {
    const tag = el.tagName.toLowerCase();
    if (tag === 'button') return 'button';
    if (tag === 'a' && el.hasAttribute('href')) return 'link';
    if (tag === 'input') {
      const t = el.getAttribute('type');
      if (t === 'submit' || t === 'button' || t === 'reset') return 'button';
      if (t === 'checkbox') return 'checkbox';
      if (t === 'radio') return 'radio';
      return 'textbox';
    }
    if (tag === 'textarea') return 'textbox';
    if (tag === 'select') return 'combobox';
    if (tag === 'img') return 'img';
    if (/^h[1-6]$/.test(tag)) return 'heading';
    if (tag === 'nav') return 'navigation';
    if (tag === 'ul' || tag === 'ol') return 'list';
    if (tag === 'li') return 'listitem';
    if (tag === 'table') return 'table';
    return '';
  };
  const accessibleName = (el) => {
    const label = (el.getAttribute('aria-label') || '').trim();
    if (label) return label;
    const labelledby = el.getAttribute('aria-labelledby');
    if (labelledby) {
      const joined = labelledby
        .split(/\s+/)
        .map((id) => {
          const ref = document.getElementById(id);
          return ref ? (ref.innerText || '').trim() : '';
        })
        .filter(Boolean)
        .join(' ');
      if (joined) return joined;
    }
    return (
      el.getAttribute('alt') ||
      el.getAttribute('title') ||
      el.innerText ||
      ''
    ).trim();
  };
  const matchSpec = (scope, spec) => {
    if (spec.kind === 'child') {
      const out = [];
      for (const p of matchSpec(scope, spec.parent)) {
        for (const c of matchSpec(p, spec.child)) {
          if (!out.includes(c)) out.push(c);
        }
      }
      return out;
    }
    const all = walk(scope, []);
    switch (spec.kind) {
      case 'css':
        return all.filter(el => el.matches(spec.value));
      case 'test_id':
        return all.filter(el => el.getAttribute('data-testid') === spec.value);
      case 'text': {
        const wanted = spec.value.trim();
        const exact = all.filter(el => (el.innerText || '').trim() === wanted);
        if (exact.length) return exact;
        return all.filter(el => (el.innerText || '').includes(wanted));
      }
      case 'label': {
        const wanted = spec.value.trim();
        const out = [];
        for (const label of all) {
          if (label.tagName !== 'LABEL') continue;
          if ((label.innerText || '').trim() !== wanted) continue;
          const control = (label.htmlFor && document.getElementById(label.htmlFor))
            || label.querySelector('input,select,textarea');
          if (control && !out.includes(control)) out.push(control);
        }
        return out;
      }
      case 'role':
        return all.filter(el => {
          const role = el.getAttribute('role') || implicitRole(el);
          if (role !== spec.role) return false;
          if (!spec.name) return true;
          return accessibleName(el).toLowerCase() === spec.name.trim().toLowerCase();
        });
      case 'placeholder':
        return all.filter(el => el.getAttribute('placeholder') === spec.value);
      case 'alt_text':
        return all.filter(el => el.getAttribute('alt') === spec.value);
      case 'title':
        return all.filter(el => el.getAttribute('title') === spec.value);
      default:
        return [];
    }
  };
";

/// Serializes the live DOM into the snapshot shape, registering each element
/// under its snapshot id for later mutation.
const SNAPSHOT_SCRIPT: &str = r"(() => {
  window.__grabar_nodes = [];
  const serialize = (el) => {
    const id = window.__grabar_nodes.push(el) - 1;
    let text = '';
    for (const n of el.childNodes) {
      if (n.nodeType === Node.TEXT_NODE) text += n.textContent;
    }
    return {
      id,
      tag: el.tagName.toLowerCase(),
      attributes: Array.from(el.attributes || []).map(a => [a.name, a.value]),
      text,
      children: Array.from(el.children).map(serialize),
      shadow_children: el.shadowRoot ? Array.from(el.shadowRoot.children).map(serialize) : [],
    };
  };
  return JSON.stringify(serialize(document.documentElement));
})()";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_script_embeds_tagged_selector_json() {
        let spec = SelectorSpec::TestId {
            value: "save".to_string(),
        };
        let script = count_script(&spec).expect("script");
        assert!(script.contains(r#"{"kind":"test_id","value":"save"}"#));
        assert!(script.contains("matchSpec(document"));
    }

    #[test]
    fn test_matcher_resolves_labelledby_references() {
        // Name precedence must match accessible_name in the forced-action
        // interpreter: aria-label, then aria-labelledby, then the rest.
        let label_at = MATCHER_JS.find("aria-label'").expect("aria-label");
        let labelledby_at = MATCHER_JS.find("aria-labelledby").expect("labelledby");
        let alt_at = MATCHER_JS.find("'alt'").expect("alt");
        assert!(label_at < labelledby_at && labelledby_at < alt_at);
        assert!(MATCHER_JS.contains("getElementById(id)"));
    }

    #[test]
    fn test_snapshot_round_trips_into_dom_node() {
        // The shape the snapshot script emits must deserialize losslessly.
        let json = r#"{
            "id": 0,
            "tag": "html",
            "attributes": [["lang", "en"]],
            "text": "",
            "children": [{
                "id": 1,
                "tag": "body",
                "attributes": [],
                "text": "hi",
                "children": [],
                "shadow_children": []
            }],
            "shadow_children": []
        }"#;
        let node: DomNode = serde_json::from_str(json).expect("parse");
        assert_eq!(node.tag, "html");
        assert_eq!(node.children[0].text, "hi");
    }
}

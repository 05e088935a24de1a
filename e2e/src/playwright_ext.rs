use anyhow::Result;
use async_trait::async_trait;
use playwright::api::page::Page;
use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};

/// Wraps a body in an async page function taking `[chain, arg]`, with
/// `resolve(chain)` (all matches) and `visible(el)` in scope.
macro_rules! in_page {
    ($body:literal) => {
        concat!(
            "async ([chain, arg]) => {\n",
            r#"
            const resolve = (segments) => {
                let scope = [document];
                for (const segment of segments) {
                    const found = [];
                    for (const root of scope) {
                        for (const el of root.querySelectorAll(segment.css)) {
                            if (!found.includes(el)) found.push(el);
                        }
                    }
                    if (segment.nth === null || segment.nth === undefined) {
                        scope = found;
                    } else {
                        scope = found[segment.nth] ? [found[segment.nth]] : [];
                    }
                }
                return scope;
            };
            const visible = (el) => {
                if (window.getComputedStyle(el).visibility === 'hidden') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            };
            "#,
            $body,
            "\n}"
        )
    };
}

const COUNT_JS: &str = in_page!("return resolve(chain).length;");

const TAG_JS: &str = in_page!(
    r#"
    document.querySelectorAll('[data-e2e-target]').forEach((node) => node.removeAttribute('data-e2e-target'));
    const el = resolve(chain)[0];
    if (!el) return false;
    el.setAttribute('data-e2e-target', arg);
    return true;
    "#
);

const READ_JS: &str = in_page!(
    r#"
    const el = resolve(chain)[0];
    if (!el) return { found: false, value: null };
    let value = null;
    switch (arg.kind) {
        case 'attribute': value = el.getAttribute(arg.name); break;
        case 'style': value = window.getComputedStyle(el).getPropertyValue(arg.name); break;
        case 'text': value = el.textContent; break;
        case 'value': value = el.value; break;
        case 'visible': value = visible(el); break;
        case 'checked': value = !!el.checked; break;
        case 'rect': {
            const rect = el.getBoundingClientRect();
            value = {
                top: rect.top,
                bottom: rect.bottom,
                width: rect.width,
                height: rect.height,
                viewportHeight: window.innerHeight,
            };
            break;
        }
        case 'function': value = await new Function('return (' + arg.source + ')')()(el); break;
    }
    return { found: true, value };
    "#
);

const SCROLL_JS: &str = in_page!(
    r#"
    const el = resolve(chain)[0];
    if (!el) return false;
    const rect = el.getBoundingClientRect();
    if (rect.top < 0 || rect.bottom > window.innerHeight || rect.left < 0 || rect.right > window.innerWidth) {
        el.scrollIntoView({ block: 'center', inline: 'nearest' });
    }
    return true;
    "#
);

// Awaits the finite CSS animations/transitions running in the element's subtree.
const SETTLE_JS: &str = in_page!(
    r#"
    const el = resolve(chain)[0];
    if (!el) return 'missing';
    window.getComputedStyle(el).getPropertyValue('opacity');
    const running = el.getAnimations({ subtree: true }).filter((animation) => {
        const timing = animation.effect && animation.effect.getComputedTiming();
        return animation.playState === 'running' && timing && Number.isFinite(timing.endTime);
    });
    if (running.length === 0) return 'idle';
    const limit = new Promise((resolve) => setTimeout(() => resolve('timeout'), arg));
    const finished = Promise.all(running.map((animation) => animation.finished.catch(() => null)))
        .then(() => 'finished');
    return Promise.race([finished, limit]);
    "#
);

const ACCEPT_DIALOGS_JS: &str = r#"() => {
    window.e2eDialogs = window.e2eDialogs ?? [];
    window.alert = (message) => { window.e2eDialogs.push(String(message)); };
    window.confirm = (message) => { window.e2eDialogs.push(String(message)); return true; };
    window.prompt = (message, value) => { window.e2eDialogs.push(String(message)); return value ?? ''; };
}"#;

const DIALOG_MESSAGES_JS: &str = r#"() => window.e2eDialogs ?? []"#;

// Renders a colour through a throwaway element so the page normalises it to rgb().
const COMPUTED_COLOR_JS: &str = r#"(color) => {
    const probe = document.createElement('div');
    probe.style.color = color;
    document.body.appendChild(probe);
    const rgb = window.getComputedStyle(probe).color;
    document.body.removeChild(probe);
    return rgb;
}"#;

/// One step of a locator chain: every match of `css` inside the previous
/// step's matches, optionally narrowed to the n-th.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub css: String,
    pub nth: Option<usize>,
}

/// What to read from a resolved element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Read {
    Attribute { name: String },
    Style { name: String },
    Text,
    Value,
    Visible,
    Checked,
    Rect,
    Function { source: String },
}

#[derive(Debug, Deserialize)]
#[serde(bound = "U: DeserializeOwned")]
pub struct Probe<U> {
    pub found: bool,
    pub value: Option<U>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Settled {
    /// Running animations completed.
    Finished,
    /// Nothing was animating.
    Idle,
    TimedOut,
    Missing,
}

#[async_trait]
pub trait PageScriptExt {
    async fn count_matches(&self, chain: &[Segment]) -> Result<usize>;

    /// Marks the first match with `data-e2e-target="token"`.
    async fn tag_target(&self, chain: &[Segment], token: &str) -> Result<bool>;

    async fn read_element<U: DeserializeOwned + Send>(
        &self,
        chain: &[Segment],
        read: &Read,
    ) -> Result<Probe<U>>;

    async fn scroll_into_view_if_needed(&self, chain: &[Segment]) -> Result<bool>;

    async fn settle_animations(&self, chain: &[Segment], limit_ms: u64) -> Result<Settled>;

    async fn accept_dialogs(&self) -> Result<()>;

    async fn dialog_messages(&self) -> Result<Vec<String>>;

    async fn computed_color(&self, color: &str) -> Result<String>;
}

#[async_trait]
impl PageScriptExt for Page {
    async fn count_matches(&self, chain: &[Segment]) -> Result<usize> {
        // numbers cross the wire as floats
        let count = self.evaluate::<_, f64>(COUNT_JS, (chain, ())).await?;
        Ok(count as usize)
    }

    async fn tag_target(&self, chain: &[Segment], token: &str) -> Result<bool> {
        Ok(self.evaluate::<_, bool>(TAG_JS, (chain, token)).await?)
    }

    async fn read_element<U: DeserializeOwned + Send>(
        &self,
        chain: &[Segment],
        read: &Read,
    ) -> Result<Probe<U>> {
        Ok(self.evaluate::<_, Probe<U>>(READ_JS, (chain, read)).await?)
    }

    async fn scroll_into_view_if_needed(&self, chain: &[Segment]) -> Result<bool> {
        Ok(self.evaluate::<_, bool>(SCROLL_JS, (chain, ())).await?)
    }

    async fn settle_animations(&self, chain: &[Segment], limit_ms: u64) -> Result<Settled> {
        let settled = self
            .evaluate::<_, String>(SETTLE_JS, (chain, limit_ms))
            .await?;
        Ok(match settled.as_str() {
            "finished" => Settled::Finished,
            "idle" => Settled::Idle,
            "timeout" => Settled::TimedOut,
            _ => Settled::Missing,
        })
    }

    async fn accept_dialogs(&self) -> Result<()> {
        Ok(self.eval::<()>(ACCEPT_DIALOGS_JS).await?)
    }

    async fn dialog_messages(&self) -> Result<Vec<String>> {
        Ok(self.eval::<Vec<String>>(DIALOG_MESSAGES_JS).await?)
    }

    async fn computed_color(&self, color: &str) -> Result<String> {
        Ok(self.evaluate::<_, String>(COMPUTED_COLOR_JS, color).await?)
    }
}

/// Playwright selector for an element marked by [`PageScriptExt::tag_target`].
pub fn tagged(token: &str) -> String {
    format!(r#"[data-e2e-target="{}"]"#, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scripts_share_the_resolver() {
        for script in [COUNT_JS, TAG_JS, READ_JS, SCROLL_JS, SETTLE_JS] {
            assert!(script.starts_with("async ([chain, arg]) => {"));
            assert!(script.contains("const resolve = (segments)"));
            assert!(script.trim_end().ends_with('}'));
        }
    }

    #[test]
    fn reads_serialise_with_their_kind() {
        assert_eq!(
            serde_json::to_value(Read::Style { name: "--bg-color".into() }).unwrap(),
            json!({ "kind": "style", "name": "--bg-color" })
        );
        assert_eq!(serde_json::to_value(Read::Checked).unwrap(), json!({ "kind": "checked" }));
        assert_eq!(
            serde_json::to_value(Read::Function { source: "el => el.complete".into() }).unwrap(),
            json!({ "kind": "function", "source": "el => el.complete" })
        );
    }

    #[test]
    fn chain_serialises_nth_as_null() {
        let chain = vec![
            Segment { css: "#accessibility".into(), nth: None },
            Segment { css: "button".into(), nth: Some(1) },
        ];
        assert_eq!(
            serde_json::to_value(&chain).unwrap(),
            json!([
                { "css": "#accessibility", "nth": null },
                { "css": "button", "nth": 1 }
            ])
        );
    }

    #[test]
    fn probes_deserialise() {
        let probe: Probe<String> =
            serde_json::from_value(json!({ "found": true, "value": "50%" })).unwrap();
        assert!(probe.found);
        assert_eq!(probe.value.as_deref(), Some("50%"));

        let missing: Probe<bool> =
            serde_json::from_value(json!({ "found": false, "value": null })).unwrap();
        assert!(!missing.found && missing.value.is_none());
    }

    #[test]
    fn tagged_selector() {
        assert_eq!(tagged("7"), r#"[data-e2e-target="7"]"#);
    }
}

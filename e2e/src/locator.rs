//! Lazy element references.
//!
//! A [`Locator`] is only a chain of CSS segments. It is resolved inside the
//! page every time it is used, so it stays valid across re-renders and
//! navigation. Resolving to nothing is not an error until an action, read or
//! expectation gives up waiting for a match.

use crate::{
    context::{millis, poll_presence, Context, Poll, Step, POLL_INTERVAL},
    playwright_ext::{tagged, PageScriptExt, Probe, Read, Segment, Settled},
    style::Rect,
};
use anyhow::{Context as _, Result};
use serde::de::DeserializeOwned;
use std::{
    fmt::{self, Debug, Display, Formatter},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Locator<'a> {
    ctx: &'a Context,
    chain: Vec<Segment>,
}

impl<'a> Locator<'a> {
    pub(crate) fn new(ctx: &'a Context, css: &str) -> Self {
        Locator {
            ctx,
            chain: vec![Segment {
                css: css.to_string(),
                nth: None,
            }],
        }
    }

    /// Descendants of this locator's matches.
    pub fn locator(&self, css: &str) -> Locator<'a> {
        let mut chain = self.chain.clone();
        chain.push(Segment {
            css: css.to_string(),
            nth: None,
        });
        Locator { ctx: self.ctx, chain }
    }

    pub fn first(&self) -> Locator<'a> {
        self.nth(0)
    }

    pub fn nth(&self, index: usize) -> Locator<'a> {
        let mut chain = self.chain.clone();
        if let Some(last) = chain.last_mut() {
            last.nth = Some(index);
        }
        Locator { ctx: self.ctx, chain }
    }

    /// Number of matches right now, without waiting.
    pub async fn count(&self) -> Result<usize> {
        self.ctx.page.count_matches(&self.chain).await
    }

    /// One locator per current match.
    pub async fn all(&self) -> Result<Vec<Locator<'a>>> {
        let count = self.count().await?;
        Ok((0..count).map(|index| self.nth(index)).collect())
    }

    pub async fn click(&self) -> Result<()> {
        let (step, selector) = self.target("click").await?;
        let timeout = self.ctx.config().expect_timeout;
        let call = self
            .ctx
            .page
            .click_builder(&selector)
            .timeout(millis(timeout))
            .click();
        self.ctx.bounded(&step, timeout, call).await
    }

    pub async fn fill(&self, value: &str) -> Result<()> {
        let (step, selector) = self.target(&format!("fill {:?} into", value)).await?;
        let timeout = self.ctx.config().expect_timeout;
        let call = self
            .ctx
            .page
            .fill_builder(&selector, value)
            .timeout(millis(timeout))
            .fill();
        self.ctx.bounded(&step, timeout, call).await
    }

    pub async fn check(&self) -> Result<()> {
        let (step, selector) = self.target("check").await?;
        let timeout = self.ctx.config().expect_timeout;
        let call = self
            .ctx
            .page
            .check_builder(&selector)
            .timeout(millis(timeout))
            .check();
        self.ctx.bounded(&step, timeout, call).await
    }

    pub async fn uncheck(&self) -> Result<()> {
        let (step, selector) = self.target("uncheck").await?;
        let timeout = self.ctx.config().expect_timeout;
        let call = self
            .ctx
            .page
            .uncheck_builder(&selector)
            .timeout(millis(timeout))
            .uncheck();
        self.ctx.bounded(&step, timeout, call).await
    }

    pub async fn select_option(&self, value: &str) -> Result<()> {
        let (step, selector) = self.target(&format!("select {:?} in", value)).await?;
        let timeout = self.ctx.config().expect_timeout;
        let call = self
            .ctx
            .page
            .select_option_builder(&selector)
            .add_value(value.to_string())
            .timeout(millis(timeout))
            .select_option();
        self.ctx.bounded(&step, timeout, call).await?;
        Ok(())
    }

    pub async fn hover(&self) -> Result<()> {
        let (step, selector) = self.target("hover").await?;
        let timeout = self.ctx.config().expect_timeout;
        // the hover builder's terminal method is named `goto`
        let call = self
            .ctx
            .page
            .hover_builder(&selector)
            .timeout(millis(timeout))
            .goto();
        self.ctx.bounded(&step, timeout, call).await
    }

    /// Focuses the element, then presses `key`.
    pub async fn press(&self, key: &str) -> Result<()> {
        let (step, selector) = self.target(&format!("press {} on", key)).await?;
        let timeout = self.ctx.config().expect_timeout;
        let focus = self.ctx.page.focus(&selector, Some(millis(timeout)));
        self.ctx.bounded(&step, timeout, focus).await?;
        self.ctx
            .page
            .keyboard
            .press(key, None)
            .await
            .with_context(|| step.to_string())?;
        Ok(())
    }

    /// Scrolls only when the element is not already fully in view.
    pub async fn scroll_into_view(&self) -> Result<()> {
        let step = self.ctx.step(format!("scroll `{}` into view", self));
        let page = &self.ctx.page;
        let chain = &self.chain;
        self.poll_found(&step, || async move {
            Ok(page.scroll_into_view_if_needed(chain).await?.then(|| ()))
        })
        .await
    }

    /// Waits for CSS animations and transitions running on the element (and
    /// its descendants) to finish. When nothing is animating, sleeps
    /// `minimum` instead so the page still gets its settle time.
    pub async fn settle(&self, minimum: Duration) -> Result<()> {
        let step = self.ctx.step(format!("settle `{}` (at least {:?})", self, minimum));
        let limit = self.ctx.config().settle_timeout.max(minimum);
        let settled = self
            .ctx
            .page
            .settle_animations(&self.chain, limit.as_millis() as u64)
            .await
            .with_context(|| step.to_string())?;

        match settled {
            Settled::Finished => debug!("{}: animations finished", step),
            Settled::Idle | Settled::Missing => tokio::time::sleep(minimum).await,
            Settled::TimedOut => warn!("{}: animations still running after {:?}", step, limit),
        }
        Ok(())
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.read(
            Read::Attribute {
                name: name.to_string(),
            },
            format!("read [{}] of `{}`", name, self),
        )
        .await
    }

    pub async fn computed_style(&self, property: &str) -> Result<String> {
        let value: Option<String> = self
            .read(
                Read::Style { name: property.to_string() },
                format!("read computed {} of `{}`", property, self),
            )
            .await?;
        Ok(value.unwrap_or_default())
    }

    /// Computed value of a CSS custom property, trimmed.
    pub async fn custom_property(&self, name: &str) -> Result<String> {
        Ok(self.computed_style(name).await?.trim().to_string())
    }

    pub async fn text_content(&self) -> Result<Option<String>> {
        self.read(Read::Text, format!("read text of `{}`", self)).await
    }

    pub async fn input_value(&self) -> Result<String> {
        let value: Option<String> = self
            .read(Read::Value, format!("read value of `{}`", self))
            .await?;
        Ok(value.unwrap_or_default())
    }

    pub async fn bounding_rect(&self) -> Result<Rect> {
        let step_action = format!("measure `{}`", self);
        let rect: Option<Rect> = self.read(Read::Rect, step_action.clone()).await?;
        rect.with_context(|| format!("{}: element has no layout box", step_action))
    }

    /// Runs `function` (JS source taking the element) and deserialises its result.
    pub async fn evaluate<U: DeserializeOwned + Send>(&self, function: &str) -> Result<U> {
        let action = format!("evaluate on `{}`", self);
        let value: Option<U> = self
            .read(Read::Function { source: function.to_string() }, action.clone())
            .await?;
        value.with_context(|| format!("{}: function returned nothing", action))
    }

    pub async fn expect_visible(&self) -> Result<()> {
        self.expect(
            Read::Visible,
            format!("expect `{}` to be visible", self),
            "visible",
            false,
            |visible: Option<&bool>| visible == Some(&true),
        )
        .await
    }

    /// Hidden or absent.
    pub async fn expect_hidden(&self) -> Result<()> {
        self.expect(
            Read::Visible,
            format!("expect `{}` to be hidden", self),
            "hidden",
            true,
            |visible: Option<&bool>| visible != Some(&true),
        )
        .await
    }

    pub async fn expect_attribute(&self, name: &str, value: &str) -> Result<()> {
        self.expect(
            Read::Attribute { name: name.to_string() },
            format!("expect `{}` to have [{}={:?}]", self, name, value),
            Some(value),
            false,
            |actual: Option<&String>| actual.map(String::as_str) == Some(value),
        )
        .await
    }

    pub async fn expect_attribute_not(&self, name: &str, value: &str) -> Result<()> {
        self.expect(
            Read::Attribute { name: name.to_string() },
            format!("expect `{}` not to have [{}={:?}]", self, name, value),
            format!("anything but {:?}", value),
            false,
            |actual: Option<&String>| actual.map(String::as_str) != Some(value),
        )
        .await
    }

    pub async fn expect_checked(&self) -> Result<()> {
        self.expect(
            Read::Checked,
            format!("expect `{}` to be checked", self),
            "checked",
            false,
            |checked: Option<&bool>| checked == Some(&true),
        )
        .await
    }

    pub async fn expect_unchecked(&self) -> Result<()> {
        self.expect(
            Read::Checked,
            format!("expect `{}` not to be checked", self),
            "unchecked",
            false,
            |checked: Option<&bool>| checked != Some(&true),
        )
        .await
    }

    /// Text content with whitespace collapsed on both sides.
    pub async fn expect_text(&self, text: &str) -> Result<()> {
        self.expect(
            Read::Text,
            format!("expect `{}` to have text {:?}", self, text),
            text,
            false,
            |actual: Option<&String>| text_matches(actual, text),
        )
        .await
    }

    /// Text content exactly as the page renders it.
    pub async fn expect_exact_text(&self, text: &str) -> Result<()> {
        self.expect(
            Read::Text,
            format!("expect `{}` to have exactly the text {:?}", self, text),
            text,
            false,
            |actual: Option<&String>| text_is_exactly(actual, text),
        )
        .await
    }

    /// Polls `function` (JS source taking the element) until it returns `true`.
    pub async fn expect_function(&self, function: &str) -> Result<()> {
        self.expect(
            Read::Function {
                source: function.to_string(),
            },
            format!("expect `{}` to satisfy {}", self, function),
            true,
            false,
            |actual: Option<&bool>| actual == Some(&true),
        )
        .await
    }

    /// Waits for a match, marks it, and returns the selector Playwright
    /// should act on.
    async fn target(&self, verb: &str) -> Result<(Step, String)> {
        let step = self.ctx.step(format!("{} `{}`", verb, self));
        let token = self.ctx.next_token();
        let page = &self.ctx.page;
        let chain = &self.chain;
        let marker = &token;
        self.poll_found(&step, || async move {
            Ok(page.tag_target(chain, marker).await?.then(|| ()))
        })
        .await?;
        Ok((step, tagged(&token)))
    }

    async fn read<U>(&self, read: Read, action: String) -> Result<Option<U>>
    where
        U: DeserializeOwned + Send,
    {
        let step = self.ctx.step(action);
        let page = &self.ctx.page;
        let chain = &self.chain;
        let read = &read;
        self.poll_found(&step, || async move {
            let probe = page.read_element::<U>(chain, read).await?;
            Ok(if probe.found { Some(probe.value) } else { None })
        })
        .await
    }

    /// Retries `attempt` until it reports a match; times out with `step`.
    async fn poll_found<T, F, Fut>(&self, step: &Step, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Option<T>>>,
    {
        let timeout = self.ctx.config().expect_timeout;
        let started = Instant::now();
        loop {
            let value = attempt().await.with_context(|| step.to_string())?;
            match poll_presence(step, value, started.elapsed(), timeout) {
                Poll::Ready(value) => return Ok(value),
                Poll::Failed(failure) => return Err(failure.into()),
                Poll::Pending => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    /// Polls `read` until `predicate` holds. See [`Expectation::observe`]
    /// for how the outcome is decided.
    async fn expect<U, E, P>(
        &self,
        read: Read,
        action: String,
        expected: E,
        absent_ok: bool,
        predicate: P,
    ) -> Result<()>
    where
        U: DeserializeOwned + Send + Debug,
        E: Debug,
        P: Fn(Option<&U>) -> bool,
    {
        let step = self.ctx.step(action);
        let timeout = self.ctx.config().expect_timeout;
        let started = Instant::now();
        let mut expectation = Expectation::new(expected, absent_ok, predicate);

        loop {
            let probe = self
                .ctx
                .page
                .read_element::<U>(&self.chain, &read)
                .await
                .with_context(|| step.to_string())?;

            match expectation.observe(&step, probe, started.elapsed(), timeout) {
                Poll::Ready(()) => return Ok(()),
                Poll::Failed(failure) => return Err(failure.into()),
                Poll::Pending => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }
}

/// Polling state of one expectation.
struct Expectation<U, E, P> {
    expected: E,
    absent_ok: bool,
    predicate: P,
    last_seen: Option<Option<U>>,
}

impl<U, E, P> Expectation<U, E, P>
where
    U: Debug,
    E: Debug,
    P: Fn(Option<&U>) -> bool,
{
    fn new(expected: E, absent_ok: bool, predicate: P) -> Self {
        Expectation {
            expected,
            absent_ok,
            predicate,
            last_seen: None,
        }
    }

    /// A match that never appears is a timeout unless `absent_ok`; a match
    /// that keeps the wrong value is an assertion failure carrying the last
    /// observed value.
    fn observe(
        &mut self,
        step: &Step,
        probe: Probe<U>,
        elapsed: Duration,
        timeout: Duration,
    ) -> Poll<()> {
        if probe.found {
            if (self.predicate)(probe.value.as_ref()) {
                return Poll::Ready(());
            }
            self.last_seen = Some(probe.value);
        } else if self.absent_ok {
            return Poll::Ready(());
        }

        if elapsed < timeout {
            return Poll::Pending;
        }
        match &self.last_seen {
            Some(actual) => Poll::Failed(step.mismatch(&self.expected, actual)),
            None => Poll::Failed(step.timeout(timeout)),
        }
    }
}

impl Display for Locator<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&describe(&self.chain))
    }
}

impl Debug for Locator<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self)
    }
}

/// Playwright-style selector text, used in step descriptions.
fn describe(chain: &[Segment]) -> String {
    chain
        .iter()
        .map(|segment| match segment.nth {
            Some(nth) => format!("{} >> nth={}", segment.css, nth),
            None => segment.css.clone(),
        })
        .collect::<Vec<_>>()
        .join(" >> ")
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_is_exactly(actual: Option<&String>, wanted: &str) -> bool {
    actual.map(String::as_str) == Some(wanted)
}

fn text_matches(actual: Option<&String>, wanted: &str) -> bool {
    actual.map(|text| normalize_whitespace(text)) == Some(normalize_whitespace(wanted))
}

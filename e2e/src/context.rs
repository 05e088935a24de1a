use crate::{
    config::RunnerConfig,
    locator::Locator,
    outcome::Failure,
    playwright_ext::{PageScriptExt, Segment},
    style, BrowserType,
};
use anyhow::{Context as _, Result};
use playwright::api::{page::Media, BrowserContext, Page, Viewport};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt::{self, Debug, Display, Formatter},
    future::Future,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::debug;

/// Interval between polls of auto-waiting actions and expectations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Slack on top of a Playwright-side timeout before the runner gives up on
/// the call itself.
const ACTION_GRACE: Duration = Duration::from_millis(500);

/// What one round of polling decided.
#[derive(Debug)]
pub(crate) enum Poll<T> {
    Ready(T),
    Pending,
    Failed(Failure),
}

/// Presence polling: a value ends the wait, nothing past the deadline is a
/// timeout of `step`.
pub(crate) fn poll_presence<T>(
    step: &Step,
    value: Option<T>,
    elapsed: Duration,
    timeout: Duration,
) -> Poll<T> {
    match value {
        Some(value) => Poll::Ready(value),
        None if elapsed >= timeout => Poll::Failed(step.timeout(timeout)),
        None => Poll::Pending,
    }
}

/// Whether a Playwright error message reports an exceeded timeout.
pub(crate) fn is_timeout_message(message: &str) -> bool {
    message.contains("TimeoutError")
        || (message.contains("Timeout") && message.contains("exceeded"))
        || message.contains("Timed out")
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaType {
    Screen,
    Print,
}

/// Everything a scenario drives: one fresh page in its own browser context.
pub struct Context {
    pub page: Page,
    pub browser_context: BrowserContext,
    pub browser: BrowserType,
    config: Arc<RunnerConfig>,
    scenario: &'static str,
    steps: Arc<AtomicUsize>,
    tokens: AtomicU64,
}

/// One numbered interaction within a scenario, used to label failures.
pub struct Step {
    pub index: usize,
    pub action: String,
}

impl Step {
    pub fn mismatch(&self, expected: impl Debug, actual: impl Debug) -> Failure {
        Failure::Assertion {
            step: self.index,
            action: self.action.clone(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    pub fn timeout(&self, waited: Duration) -> Failure {
        Failure::Timeout {
            step: self.index,
            action: self.action.clone(),
            waited,
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.index, self.action)
    }
}

impl Context {
    pub(crate) fn new(
        page: Page,
        browser_context: BrowserContext,
        browser: BrowserType,
        config: Arc<RunnerConfig>,
        scenario: &'static str,
        steps: Arc<AtomicUsize>,
    ) -> Self {
        Context {
            page,
            browser_context,
            browser,
            config,
            scenario,
            steps,
            tokens: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn step(&self, action: impl Into<String>) -> Step {
        let step = Step {
            index: self.steps.fetch_add(1, Ordering::SeqCst) + 1,
            action: action.into(),
        };
        debug!(scenario = self.scenario, browser = %self.browser, "{}", step);
        step
    }

    pub(crate) fn next_token(&self) -> String {
        self.tokens.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Loads `path` and waits for the landmark element.
    pub async fn navigate(&self, path: &str) -> Result<()> {
        let url = self.config.url(path);
        let step = self.step(format!("navigate to {}", url));
        let timeout = self.config.navigation_timeout;
        let started = Instant::now();

        self.bounded(
            &step,
            timeout,
            self.page
                .goto_builder(&url)
                .timeout(millis(timeout))
                .goto(),
        )
        .await?;

        let landmark = [Segment {
            css: self.config.landmark.clone(),
            nth: None,
        }];
        loop {
            let present = self.page.count_matches(&landmark).await? > 0;
            match poll_presence(&step, present.then(|| ()), started.elapsed(), timeout) {
                Poll::Ready(()) => return Ok(()),
                Poll::Failed(failure) => return Err(failure.into()),
                Poll::Pending => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    /// Runs one Playwright call that was itself given `timeout`. Running out
    /// of time on either side is a timeout of `step`; other errors keep the
    /// step as context.
    pub(crate) async fn bounded<T, E, F>(
        &self,
        step: &Step,
        timeout: Duration,
        call: F,
    ) -> Result<T>
    where
        E: std::error::Error + Send + Sync + 'static,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(timeout + ACTION_GRACE, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) if is_timeout_message(&err.to_string()) => {
                debug!("{}: {}", step, err);
                Err(step.timeout(timeout).into())
            }
            Ok(Err(err)) => Err(anyhow::Error::new(err).context(step.to_string())),
            Err(_) => Err(step.timeout(timeout).into()),
        }
    }

    pub fn locator(&self, css: &str) -> Locator<'_> {
        Locator::new(self, css)
    }

    pub async fn title(&self) -> Result<String> {
        let step = self.step("read page title");
        Ok(self.page.title().await.with_context(|| step.to_string())?)
    }

    /// Presses `key` on whatever currently has focus.
    pub async fn press(&self, key: &str) -> Result<()> {
        let step = self.step(format!("press {}", key));
        Ok(self
            .page
            .keyboard
            .press(key, None)
            .await
            .with_context(|| step.to_string())?)
    }

    pub async fn mouse_click(&self, x: f64, y: f64) -> Result<()> {
        let step = self.step(format!("click at ({}, {})", x, y));
        Ok(self
            .page
            .mouse
            .click_builder(x, y)
            .click()
            .await
            .with_context(|| step.to_string())?)
    }

    pub async fn scroll_to_top(&self) -> Result<()> {
        let step = self.step("scroll to top");
        Ok(self
            .page
            .eval::<()>("() => window.scrollTo(0, 0)")
            .await
            .with_context(|| step.to_string())?)
    }

    pub async fn evaluate<T, U>(&self, expression: &str, arg: T) -> Result<U>
    where
        T: Serialize + Send + Sync,
        U: DeserializeOwned,
    {
        let step = self.step("evaluate in page");
        Ok(self
            .page
            .evaluate::<T, U>(expression, arg)
            .await
            .with_context(|| step.to_string())?)
    }

    pub async fn set_viewport(&self, width: i32, height: i32) -> Result<()> {
        let step = self.step(format!("resize viewport to {}x{}", width, height));
        Ok(self
            .page
            .set_viewport_size(Viewport { width, height })
            .await
            .with_context(|| step.to_string())?)
    }

    pub async fn emulate_media(&self, media: MediaType) -> Result<()> {
        let step = self.step(format!("emulate {:?} media", media));
        let media = match media {
            MediaType::Screen => Media::Screen,
            MediaType::Print => Media::Print,
        };
        Ok(self
            .page
            .emulate_media_builder()
            .media(media)
            .emulate_media()
            .await
            .with_context(|| step.to_string())?)
    }

    pub async fn grant_permissions(&self, permissions: &[&str]) -> Result<()> {
        let step = self.step(format!("grant {}", permissions.join(", ")));
        Ok(self
            .browser_context
            .grant_permissions(
                &permissions.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
                None,
            )
            .await
            .with_context(|| step.to_string())?)
    }

    /// Answers every `alert`/`confirm`/`prompt` raised from now on with
    /// "accept" and records its message.
    pub async fn accept_dialogs(&self) -> Result<()> {
        let step = self.step("accept dialogs");
        self.page
            .accept_dialogs()
            .await
            .with_context(|| step.to_string())
    }

    /// Messages of the dialogs accepted so far.
    pub async fn dialog_messages(&self) -> Result<Vec<String>> {
        self.page.dialog_messages().await
    }

    /// Renders `color` in the page and classifies the resulting `rgb()` triple.
    pub async fn is_dark(&self, color: &str) -> Result<bool> {
        let step = self.step(format!("classify luminance of {:?}", color));
        let rgb = self
            .page
            .computed_color(color)
            .await
            .with_context(|| step.to_string())?;
        let dark = style::is_dark(&rgb);
        debug!(color, %rgb, dark, "luminance");
        Ok(dark)
    }

    /// Fixed delay, for waits with no element to observe.
    pub async fn pause(&self, duration: Duration) {
        self.step(format!("wait {:?}", duration));
        tokio::time::sleep(duration).await;
    }

    /// Polls `probe` until it yields a value or the expectation timeout passes.
    pub async fn wait_for<T, F, Fut>(&self, action: impl Into<String>, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let step = self.step(action);
        let timeout = self.config.expect_timeout;
        let started = Instant::now();
        loop {
            let value = probe().await.with_context(|| step.to_string())?;
            match poll_presence(&step, value, started.elapsed(), timeout) {
                Poll::Ready(value) => return Ok(value),
                Poll::Failed(failure) => return Err(failure.into()),
                Poll::Pending => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    /// Saves a screenshot as supplementary evidence.
    pub async fn capture(&self, name: &str) -> Result<PathBuf> {
        let step = self.step(format!("capture {}", name));
        std::fs::create_dir_all(&self.config.artifacts_dir)
            .with_context(|| format!("creating {}", self.config.artifacts_dir.display()))?;

        let path = self
            .config
            .artifacts_dir
            .join(artifact_name(self.scenario, self.browser, name));
        self.page
            .screenshot_builder()
            .path(path.clone())
            .screenshot()
            .await
            .with_context(|| step.to_string())?;
        debug!(path = %path.display(), "captured");
        Ok(path)
    }

    pub fn expect_eq<T>(&self, what: &str, actual: T, expected: T) -> Result<()>
    where
        T: PartialEq + Debug,
    {
        let step = self.step(format!("{} equals {:?}", what, expected));
        if actual == expected {
            Ok(())
        } else {
            Err(step.mismatch(expected, actual).into())
        }
    }

    pub fn expect_ne<T>(&self, what: &str, actual: T, unexpected: T) -> Result<()>
    where
        T: PartialEq + Debug,
    {
        let step = self.step(format!("{} differs from {:?}", what, unexpected));
        if actual != unexpected {
            Ok(())
        } else {
            Err(step.mismatch(format!("anything but {:?}", unexpected), actual).into())
        }
    }

    pub fn expect_gt(&self, what: &str, actual: f64, bound: f64) -> Result<()> {
        let step = self.step(format!("{} is greater than {}", what, bound));
        if actual > bound {
            Ok(())
        } else {
            Err(step.mismatch(format!("> {}", bound), actual).into())
        }
    }

    pub fn expect_contains(&self, what: &str, haystack: &str, needle: &str) -> Result<()> {
        let step = self.step(format!("{} contains {:?}", what, needle));
        if haystack.contains(needle) {
            Ok(())
        } else {
            Err(step.mismatch(format!("to contain {:?}", needle), haystack).into())
        }
    }

    pub fn expect_not_contains(&self, what: &str, haystack: &str, needle: &str) -> Result<()> {
        let step = self.step(format!("{} does not contain {:?}", what, needle));
        if haystack.contains(needle) {
            Err(step.mismatch(format!("not to contain {:?}", needle), haystack).into())
        } else {
            Ok(())
        }
    }

    pub fn expect_true(&self, what: &str, actual: bool) -> Result<()> {
        self.expect_eq(what, actual, true)
    }
}

/// Playwright takes timeouts as fractional milliseconds.
pub(crate) fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// `<scenario>-<browser>-<name>.png` with path-unfriendly characters replaced.
pub fn artifact_name(scenario: &str, browser: BrowserType, name: &str) -> String {
    let raw = format!("{}-{}-{}", scenario, browser, name);
    let mut file: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    while file.contains("--") {
        file = file.replace("--", "-");
    }
    format!("{}.png", file.trim_matches('-').to_ascii_lowercase())
}

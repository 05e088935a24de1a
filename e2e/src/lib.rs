//! Browser-driven scenarios against the showcase page.
//!
//! Scenario binaries under `tests/` opt into this crate's runner:
//!
//! ```ignore
//! #![feature(custom_test_frameworks)]
//! #![test_runner(e2e::e2e_test_runner)]
//!
//! #[test_case]
//! async fn title(ctx: Context) -> Result<Outcome> {
//!     ctx.expect_eq("title", ctx.title().await?, TITLE.to_string())?;
//!     Ok(Outcome::Pass)
//! }
//! ```
//!
//! Every scenario runs once per configured browser, in a fresh browser
//! context, after the start page has loaded.

pub mod config;
pub mod context;
pub mod locator;
pub mod outcome;
pub mod page_contract;
pub mod playwright_ext;
pub mod server;
pub mod style;

pub use config::RunnerConfig;
pub use context::{Context, MediaType};
pub use locator::Locator;
pub use outcome::{Failure, Outcome};

use anyhow::Result;
use async_trait::async_trait;
use futures::{stream, FutureExt, StreamExt};
use playwright::{
    api::{Browser, BrowserContext, Page},
    Playwright,
};
use serde_derive::Serialize;
use std::{
    any::{type_name, Any},
    collections::BTreeMap,
    error::Error,
    fmt::{Debug, Display, Formatter},
    fs::File,
    future::Future,
    panic::AssertUnwindSafe,
    path::PathBuf,
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::runtime::Runtime;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub fn e2e_test_runner(tests: &[&dyn Testable]) {
    init_tracing();

    let config = match RunnerConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            println!("Invalid configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            println!("Failed to start the async runtime: {}", err);
            std::process::exit(1);
        }
    };

    let results = runtime.block_on(run(tests, config.clone()));

    let exit_code = match results {
        Ok(mut test_results) => {
            test_results.sort_by(|a, b| {
                (a.test_name, a.browser_type).cmp(&(b.test_name, b.browser_type))
            });

            println!("\nSummary:");
            for test_result in &test_results {
                println!("{}", test_result);
            }

            let summary = Summary::of(&test_results);
            println!("{}", summary);
            write_report(&config, &test_results);

            if summary.failed == 0 {
                0
            } else {
                1
            }
        }
        Err(error) => {
            println!("{:#?}", error);
            1
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("e2e=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Brings the web server up (unless told not to) and runs every scenario.
async fn run(tests: &[&dyn Testable], config: Arc<RunnerConfig>) -> Result<Vec<TestResult>> {
    let _server = if config.spawn_server {
        Some(server::WebServer::spawn()?)
    } else {
        None
    };
    server::wait_until_ready(&config.server_addr()?, config.server_timeout).await?;

    run_tests(tests, config).await
}

async fn run_tests(tests: &[&dyn Testable], config: Arc<RunnerConfig>) -> Result<Vec<TestResult>> {
    let playwright = Playwright::initialize().await?;
    playwright.prepare()?; // Install browsers

    let mut browser_map = BTreeMap::new();
    let mut initialization_errors: Option<ErrorList<FailedToInitialize>> = None;
    for &browser_type in &config.browsers {
        let launcher = match browser_type {
            BrowserType::Chromium => playwright.chromium(),
            BrowserType::Firefox => playwright.firefox(),
            BrowserType::Webkit => playwright.webkit(),
        };
        match launcher.launcher().headless(config.headless).launch().await {
            Ok(browser) => {
                info!(browser = %browser_type, "launched");
                browser_map.insert(browser_type, browser);
            }
            Err(err) => {
                if let Some(errs) = &mut initialization_errors {
                    errs.push(FailedToInitialize(browser_type), err);
                } else {
                    initialization_errors =
                        Some(ErrorList::new(FailedToInitialize(browser_type), err));
                }
            }
        }
    }

    if let Some(errors) = initialization_errors {
        return Err(errors.into());
    }

    let browsers = &browser_map;
    let pairs = tests.iter().flat_map(move |&test| {
        browsers
            .iter()
            .map(move |(&browser_type, browser)| (test, browser_type, browser))
    });

    let results = stream::iter(pairs)
        .map(|(test, browser_type, browser)| {
            run_scenario(test, browser_type, browser, config.clone())
        })
        .buffer_unordered(config.concurrency)
        .collect::<Vec<_>>()
        .await;

    for (browser_type, browser) in browser_map {
        if let Err(err) = browser.close().await {
            warn!(browser = %browser_type, "failed to close browser: {}", err);
        }
    }

    Ok(results)
}

/// One scenario on one browser: fresh context, start page, bounded run.
async fn run_scenario(
    test: &dyn Testable,
    browser_type: BrowserType,
    browser: &Browser,
    config: Arc<RunnerConfig>,
) -> TestResult {
    let test_name = test.name();
    let started = Instant::now();

    let outcome = match open_page(browser).await {
        Ok((browser_context, page)) => {
            let outcome = drive(test, browser_type, &browser_context, page, &config).await;
            if let Err(err) = browser_context.close().await {
                warn!(
                    scenario = test_name,
                    browser = %browser_type,
                    "failed to close context: {}",
                    err
                );
            }
            outcome
        }
        Err(err) => open_failure(test_name, browser_type, err),
    };

    let test_result = TestResult {
        test_name,
        browser_type,
        outcome,
        duration: started.elapsed(),
    };
    log_result(&test_result);
    println!("{}", test_result);

    test_result
}

async fn open_page(browser: &Browser) -> Result<(BrowserContext, Page)> {
    let browser_context = browser.context_builder().build().await?;
    match browser_context.new_page().await {
        Ok(page) => Ok((browser_context, page)),
        Err(err) => {
            let _ = browser_context.close().await;
            Err(err.into())
        }
    }
}

/// Keeps a context or page that failed to open local to its scenario.
fn open_failure(
    test_name: &'static str,
    browser_type: BrowserType,
    err: anyhow::Error,
) -> Outcome {
    Outcome::Fail(err.context(FailedToOpenPage {
        test_name,
        browser_type,
    }))
}

async fn drive(
    test: &dyn Testable,
    browser_type: BrowserType,
    browser_context: &BrowserContext,
    page: Page,
    config: &Arc<RunnerConfig>,
) -> Outcome {
    let steps = Arc::new(AtomicUsize::new(0));
    // `BrowserContext` is not `Clone`; `Page::context` yields another handle
    // to the same context the page was opened in.
    let _ = browser_context;
    let page_context = page.context();
    let ctx = Context::new(
        page,
        page_context,
        browser_type,
        config.clone(),
        test.name(),
        steps.clone(),
    );

    match ctx.navigate(&config.start_page).await {
        Err(err) => Outcome::Fail(err),
        Ok(()) => match tokio::time::timeout(config.scenario_timeout, test.run(ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::Fail(
                Failure::Timeout {
                    step: steps.load(Ordering::SeqCst),
                    action: "scenario".to_string(),
                    waited: config.scenario_timeout,
                }
                .into(),
            ),
        },
    }
}

fn log_result(result: &TestResult) {
    let (scenario, browser) = (result.test_name, result.browser_type);
    match &result.outcome {
        Outcome::Fail(err) => match err.downcast_ref::<Failure>() {
            Some(failure) => error!(
                scenario,
                browser = %browser,
                step = failure.step(),
                "{}",
                failure
            ),
            None => error!(scenario, browser = %browser, "{:#}", err),
        },
        Outcome::Skipped(reason) => {
            info!(scenario, browser = %browser, "skipped: {}", reason)
        }
        Outcome::Pass => info!(scenario, browser = %browser, "passed"),
    }
}

pub struct TestResult {
    pub test_name: &'static str,
    pub browser_type: BrowserType,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl Display for TestResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            Outcome::Pass => write!(f, "{} in {}...\t[OK]", self.test_name, self.browser_type),
            Outcome::Skipped(reason) => write!(
                f,
                "{} in {}...\t[SKIPPED] {}",
                self.test_name, self.browser_type, reason
            ),
            Outcome::Fail(err) => write!(
                f,
                "{} in {}...\t[{}]\n{:?}",
                self.test_name,
                self.browser_type,
                self.outcome.label(),
                err
            ),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn of(results: &[TestResult]) -> Summary {
        results
            .iter()
            .fold(Summary::default(), |mut summary, result| {
                match result.outcome {
                    Outcome::Pass => summary.passed += 1,
                    Outcome::Fail(_) => summary.failed += 1,
                    Outcome::Skipped(_) => summary.skipped += 1,
                }
                summary
            })
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed, self.failed, self.skipped
        )
    }
}

#[derive(Debug, Serialize)]
struct ReportEntry {
    scenario: &'static str,
    browser: String,
    outcome: &'static str,
    detail: Option<String>,
    duration_ms: u128,
}

impl From<&TestResult> for ReportEntry {
    fn from(result: &TestResult) -> Self {
        ReportEntry {
            scenario: result.test_name,
            browser: result.browser_type.to_string(),
            outcome: result.outcome.label(),
            detail: match &result.outcome {
                Outcome::Pass => None,
                Outcome::Skipped(reason) => Some(reason.to_string()),
                Outcome::Fail(err) => Some(format!("{:#}", err)),
            },
            duration_ms: result.duration.as_millis(),
        }
    }
}

/// Machine-readable copy of the summary, next to the screenshots.
fn write_report(config: &RunnerConfig, results: &[TestResult]) {
    let binary = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "e2e".to_string());
    let path: PathBuf = config.artifacts_dir.join(format!("report-{}.json", binary));

    let entries: Vec<ReportEntry> = results.iter().map(ReportEntry::from).collect();
    let written = std::fs::create_dir_all(&config.artifacts_dir)
        .map_err(anyhow::Error::from)
        .and_then(|()| Ok(File::create(&path)?))
        .and_then(|file| Ok(serde_json::to_writer_pretty(file, &entries)?));

    match written {
        Ok(()) => info!(path = %path.display(), "wrote report"),
        Err(err) => warn!(path = %path.display(), "failed to write report: {:#}", err),
    }
}

#[derive(Debug, Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub enum BrowserType {
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserType {
    pub const ALL: [BrowserType; 3] = [
        BrowserType::Chromium,
        BrowserType::Firefox,
        BrowserType::Webkit,
    ];
}

impl Display for BrowserType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                BrowserType::Chromium => "Chromium",
                BrowserType::Firefox => "Firefox",
                BrowserType::Webkit => "Webkit",
            }
        )
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown browser {0:?}, expected chromium, firefox or webkit")]
pub struct UnknownBrowser(String);

impl FromStr for BrowserType {
    type Err = UnknownBrowser;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserType::Chromium),
            "firefox" => Ok(BrowserType::Firefox),
            "webkit" => Ok(BrowserType::Webkit),
            _ => Err(UnknownBrowser(s.to_string())),
        }
    }
}

#[async_trait]
pub trait Testable {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: Context) -> Outcome;
}

#[async_trait]
impl<F, FF> Testable for F
where
    F: Fn(Context) -> FF + Sync,
    FF: Future<Output = Result<Outcome>> + Send,
{
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    async fn run(&self, ctx: Context) -> Outcome {
        match AssertUnwindSafe(self(ctx)).catch_unwind().await {
            Ok(result) => Outcome::from_result(result),
            Err(err) => Outcome::Fail(CaughtPanic::new(err).into()),
        }
    }
}

struct ErrorList<C> {
    vec: Vec<(C, anyhow::Error)>,
}

impl<C> ErrorList<C> {
    fn new<E: Into<anyhow::Error>>(context: C, error: E) -> Self {
        ErrorList {
            vec: vec![(context, error.into())],
        }
    }

    fn push<E: Into<anyhow::Error>>(&mut self, context: C, error: E) {
        self.vec.push((context, error.into()));
    }
}

impl<C: Display> Debug for ErrorList<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ErrorList:")?;
        for (context, error) in &self.vec {
            writeln!(f, "\t- {}: {:#?}", context, error)?;
        }
        Ok(())
    }
}

impl<C: Display> Display for ErrorList<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ErrorList:")?;
        for (context, error) in &self.vec {
            writeln!(f, "\t- {}: {}", context, error)?;
        }
        Ok(())
    }
}

impl<C: Display> Error for ErrorList<C> {}

struct FailedToInitialize(BrowserType);

impl Display for FailedToInitialize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to initialize {}", self.0)
    }
}

struct FailedToOpenPage {
    test_name: &'static str,
    browser_type: BrowserType,
}

impl Display for FailedToOpenPage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Failed to open page in {} of {}",
            self.browser_type, self.test_name
        )
    }
}

struct CaughtPanic(Option<Box<str>>);

impl CaughtPanic {
    fn new(err: Box<dyn Any + Send + 'static>) -> Self {
        match err.downcast::<String>() {
            Ok(str) => CaughtPanic(Some(str.into_boxed_str())),
            Err(err) => match err.downcast::<&str>() {
                Ok(str) => CaughtPanic(Some(str.to_string().into_boxed_str())),
                Err(_) => CaughtPanic(None),
            },
        }
    }
}

impl Debug for CaughtPanic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for CaughtPanic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(str_err) => write!(f, "panicked: {}", str_err),
            None => write!(f, "panicked: unknown payload"),
        }
    }
}

impl Error for CaughtPanic {}

#![feature(custom_test_frameworks)]
#![test_runner(e2e::e2e_test_runner)]

use anyhow::Result;
use e2e::{Context, Outcome};

#[test_case]
async fn skip_link_moves_focus(ctx: Context) -> Result<Outcome> {
    ctx.locator("#accessibility").scroll_into_view().await?;

    let skip_link = ctx.locator(".skip-link");
    ctx.press("Tab").await?;
    skip_link.expect_visible().await?;
    skip_link.click().await?;

    let focused: String = ctx
        .evaluate("() => document.activeElement ? document.activeElement.id : ''", ())
        .await?;
    ctx.expect_eq("focused element id", focused, "main-content".to_string())?;

    Ok(Outcome::Pass)
}

#[test_case]
async fn aria_attributes(ctx: Context) -> Result<Outcome> {
    ctx.locator("#accessibility").scroll_into_view().await?;

    ctx.locator(r#"[role="alert"][aria-live="assertive"]"#)
        .expect_visible()
        .await?;

    let described_by = ctx
        .locator("#accessible-name")
        .attribute("aria-describedby")
        .await?
        .unwrap_or_default();
    ctx.expect_ne("aria-describedby of #accessible-name", described_by.as_str(), "")?;
    ctx.locator(&format!("#{}", described_by))
        .expect_visible()
        .await?;

    Ok(Outcome::Pass)
}

#[test_case]
async fn focus_styles(ctx: Context) -> Result<Outcome> {
    ctx.locator("#accessibility").scroll_into_view().await?;

    for _ in 0..3 {
        ctx.press("Tab").await?;
    }
    ctx.capture("focus-styles").await?;

    ctx.press("Tab").await?;
    ctx.capture("enhanced-focus-styles").await?;

    Ok(Outcome::Pass)
}

#[test_case]
async fn semantic_structure(ctx: Context) -> Result<Outcome> {
    ctx.locator("#semantic-structure").scroll_into_view().await?;

    for landmark in ["article", "section", "header", "footer"] {
        ctx.locator(landmark).first().expect_visible().await?;
    }
    ctx.locator("nav").expect_visible().await?;

    for (scoped, element) in [
        ("#semantic-structure aside", "aside"),
        ("#semantic-structure time[datetime]", "time[datetime]"),
        ("#semantic-structure address", "address"),
    ] {
        ctx.locator(scoped).scroll_into_view().await?;
        ctx.locator(element).first().expect_visible().await?;
    }

    Ok(Outcome::Pass)
}

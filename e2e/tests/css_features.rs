#![feature(custom_test_frameworks)]
#![test_runner(e2e::e2e_test_runner)]

use anyhow::Result;
use e2e::{
    page_contract::{settle, THEME_BG_PROPERTY, THEME_DEMO, THEME_TOGGLE, VIEWPORTS},
    style, Context, MediaType, Outcome,
};

#[test_case]
async fn dark_mode_toggle(ctx: Context) -> Result<Outcome> {
    ctx.locator("#dark-mode").scroll_into_view().await?;

    let demo = ctx.locator(THEME_DEMO);
    let toggle = ctx.locator(THEME_TOGGLE);

    // Start from light whatever the emulated colour scheme is.
    let current = demo.custom_property(THEME_BG_PROPERTY).await?;
    if ctx.is_dark(&current).await? {
        toggle.click().await?;
        demo.settle(settle::THEME).await?;
    }

    let initial = demo.custom_property(THEME_BG_PROPERTY).await?;

    toggle.click().await?;
    demo.settle(settle::THEME).await?;
    let toggled = demo.custom_property(THEME_BG_PROPERTY).await?;
    ctx.expect_ne("background after one toggle", toggled.as_str(), initial.as_str())?;
    ctx.expect_true("background after one toggle is dark", ctx.is_dark(&toggled).await?)?;

    toggle.click().await?;
    demo.settle(settle::THEME).await?;
    let restored = demo.custom_property(THEME_BG_PROPERTY).await?;
    ctx.expect_eq("background after two toggles", restored, initial)?;

    Ok(Outcome::Pass)
}

#[test_case]
async fn animations(ctx: Context) -> Result<Outcome> {
    ctx.locator("#css-animations").scroll_into_view().await?;

    let expand_box = ctx.locator(".expand-box");
    let initial = expand_box.computed_style("height").await?;

    expand_box.hover().await?;
    expand_box.settle(settle::EXPAND).await?;

    let expanded = expand_box.computed_style("height").await?;
    ctx.expect_ne("expanded height", expanded.as_str(), initial.as_str())?;
    ctx.expect_gt(
        "expanded height in px",
        style::parse_px(&expanded).unwrap_or(0.0),
        style::parse_px(&initial).unwrap_or(f64::INFINITY),
    )?;

    let animation = ctx
        .locator(r#"#css-animations div[style*="animation: pulse"]"#)
        .computed_style("animation-name")
        .await?;
    ctx.expect_ne("pulse animation-name", animation.as_str(), "none")?;

    Ok(Outcome::Pass)
}

#[test_case]
async fn responsive_design(ctx: Context) -> Result<Outcome> {
    let section = ctx.locator("#responsive-design");
    let heading = ctx.locator(r#"#responsive-design h4[style*="clamp"]"#);

    for (width, height) in VIEWPORTS.iter().copied() {
        ctx.set_viewport(width, height).await?;
        section.scroll_into_view().await?;
        ctx.capture(&format!("responsive-{}x{}", width, height)).await?;

        let font_size = heading.computed_style("font-size").await?;
        ctx.expect_not_contains("computed font-size", &font_size, "clamp")?;
        ctx.expect_gt(
            &format!("font-size at {}x{}", width, height),
            style::parse_px(&font_size).unwrap_or(0.0),
            0.0,
        )?;
    }

    Ok(Outcome::Pass)
}

#[test_case]
async fn print_styles(ctx: Context) -> Result<Outcome> {
    ctx.locator("#print-styles").scroll_into_view().await?;

    ctx.emulate_media(MediaType::Print).await?;
    let display = ctx.locator(".print-sidebar").computed_style("display").await?;
    ctx.expect_eq("print sidebar display", display.as_str(), "none")?;
    ctx.capture("print-mode").await?;

    ctx.emulate_media(MediaType::Screen).await?;

    Ok(Outcome::Pass)
}

#![feature(custom_test_frameworks)]
#![test_runner(e2e::e2e_test_runner)]

use anyhow::Result;
use e2e::{page_contract::settle, BrowserType, Context, Outcome};

// Stands in for the IntersectionObserver when it has not fired yet.
const REVEAL_FIRST_JS: &str = r#"() => {
    const el = document.querySelector('.scroll-animate');
    if (el && !el.classList.contains('is-visible')) {
        el.style.opacity = '1';
        el.style.transform = 'translateY(0)';
    }
}"#;

#[test_case]
async fn clipboard_copy(ctx: Context) -> Result<Outcome> {
    if matches!(ctx.browser, BrowserType::Firefox | BrowserType::Webkit) {
        return Ok(Outcome::skipped(
            "clipboard permissions cannot be granted headless in Firefox and WebKit",
        ));
    }
    ctx.locator("#minimal-js-features").scroll_into_view().await?;

    let code = ctx
        .locator(".copy-section pre")
        .text_content()
        .await?
        .unwrap_or_default();
    ctx.expect_ne("copyable code", code.trim(), "")?;

    ctx.grant_permissions(&["clipboard-read", "clipboard-write"])
        .await?;
    ctx.accept_dialogs().await?;

    ctx.locator(".copy-section button").click().await?;
    ctx.pause(settle::CLIPBOARD).await;

    // Either outcome of the write is reported through an alert.
    let ctx_ref = &ctx;
    let messages = ctx
        .wait_for("alert after copying", || async move {
            let messages = ctx_ref.dialog_messages().await?;
            Ok((!messages.is_empty()).then(|| messages))
        })
        .await?;
    ctx.expect_contains("alert message", &messages.join("\n"), "Cop")?;

    Ok(Outcome::Pass)
}

#[test_case]
async fn lazy_image(ctx: Context) -> Result<Outcome> {
    ctx.locator("#minimal-js-features").scroll_into_view().await?;

    let image = ctx.locator(r#"img[loading="lazy"]"#);
    image.expect_attribute("loading", "lazy").await?;

    image.scroll_into_view().await?;
    image.expect_visible().await?;

    image
        .expect_function("img => img.complete && img.naturalHeight !== 0")
        .await?;

    Ok(Outcome::Pass)
}

#[test_case]
async fn scroll_reveal(ctx: Context) -> Result<Outcome> {
    if ctx.browser == BrowserType::Firefox {
        return Ok(Outcome::skipped(
            "IntersectionObserver is unreliable in headless Firefox",
        ));
    }

    ctx.scroll_to_top().await?;
    ctx.pause(settle::SCROLL_STEP).await;

    ctx.locator("#minimal-js-features").scroll_into_view().await?;
    ctx.pause(settle::SCROLL_STEP).await;

    ctx.locator(".scroll-animate-container")
        .scroll_into_view()
        .await?;
    ctx.pause(settle::SCROLL_STEP).await;

    let first = ctx.locator(".scroll-animate").first();
    ctx.evaluate::<_, ()>(REVEAL_FIRST_JS, ()).await?;
    first.settle(settle::REVEAL).await?;

    let opacity = first.computed_style("opacity").await?;
    ctx.expect_eq("revealed opacity", opacity.as_str(), "1")?;

    Ok(Outcome::Pass)
}

#[test_case]
async fn css_variables(ctx: Context) -> Result<Outcome> {
    ctx.locator("#minimal-js-features").scroll_into_view().await?;

    let container = ctx.locator(".theme-container");
    let primary = ctx.locator("#primary-color");
    let text = ctx.locator("#text-color");

    let initial_primary = primary.input_value().await?;
    let initial_text = text.input_value().await?;

    primary.fill("#ff0000").await?;
    ctx.expect_eq(
        "--primary-color",
        container.custom_property("--primary-color").await?,
        "#ff0000".to_string(),
    )?;

    text.fill("#00ff00").await?;
    ctx.expect_eq(
        "--text-color",
        container.custom_property("--text-color").await?,
        "#00ff00".to_string(),
    )?;

    container.locator("button").click().await?;
    ctx.expect_eq("reset #primary-color", primary.input_value().await?, initial_primary)?;
    ctx.expect_eq("reset #text-color", text.input_value().await?, initial_text)?;

    Ok(Outcome::Pass)
}

#![feature(custom_test_frameworks)]
#![test_runner(e2e::e2e_test_runner)]

use anyhow::Result;
use e2e::{
    page_contract::{settle, HEADING, SECTIONS, TITLE},
    Context, Outcome,
};

#[test_case]
async fn title_and_structure(ctx: Context) -> Result<Outcome> {
    ctx.expect_eq("page title", ctx.title().await?, TITLE.to_string())?;
    ctx.locator("header h1").expect_text(HEADING).await?;
    ctx.locator("nav").expect_visible().await?;

    let footer = ctx.locator("footer").first();
    footer.scroll_into_view().await?;
    footer.expect_visible().await?;

    for section in SECTIONS.iter() {
        let section = ctx.locator(section);
        section.scroll_into_view().await?;
        section.expect_visible().await?;
    }

    Ok(Outcome::Pass)
}

#[test_case]
async fn nav_links_scroll_to_sections(ctx: Context) -> Result<Outcome> {
    let links = ctx.locator("nav a").all().await?;
    ctx.expect_eq("number of nav links", links.len(), SECTIONS.len())?;

    for link in links {
        let href = link.attribute("href").await?.unwrap_or_default();
        let target = ctx.locator(&href);

        link.scroll_into_view().await?;
        link.click().await?;
        target.settle(settle::SCROLL).await?;

        let rect = target.bounding_rect().await?;
        ctx.expect_true(&format!("{} is in the viewport", href), rect.in_viewport())?;
    }

    Ok(Outcome::Pass)
}

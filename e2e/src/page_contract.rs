//! What the scenarios rely on the showcase page to expose.

/// Present once the main content has rendered.
pub const LANDMARK: &str = "main#main-content";

pub const TITLE: &str = "Modern HTML & CSS Showcase - May 2025";
pub const HEADING: &str = "Modern HTML & CSS Showcase";

pub const SECTIONS: [&str; 13] = [
    "#semantic-structure",
    "#text-formatting",
    "#interactive-elements",
    "#forms",
    "#advanced-features",
    "#accessibility",
    "#css-animations",
    "#responsive-design",
    "#advanced-layouts",
    "#modern-selectors",
    "#dark-mode",
    "#print-styles",
    "#minimal-js-features",
];

pub const THEME_DEMO: &str = ".theme-demo";
pub const THEME_TOGGLE: &str = r#"label[for="theme-switch"]"#;
pub const THEME_BG_PROPERTY: &str = "--bg-color";

/// Mobile, tablet, desktop.
pub const VIEWPORTS: [(i32, i32); 3] = [(375, 667), (768, 1024), (1440, 900)];

/// Settle delays the page's transitions need, used as the fallback minimum.
pub mod settle {
    use std::time::Duration;

    pub const THEME: Duration = Duration::from_millis(300);
    pub const SCROLL: Duration = Duration::from_millis(500);
    /// Between the incremental scrolls that lead up to the reveal.
    pub const SCROLL_STEP: Duration = Duration::from_millis(300);
    pub const EXPAND: Duration = Duration::from_millis(600);
    pub const REVEAL: Duration = Duration::from_millis(1100);
    pub const CLIPBOARD: Duration = Duration::from_millis(500);
}

//! Interpreting values read back from computed styles.
//!
//! Browsers report computed colours as `rgb(r, g, b)` / `rgba(r, g, b, a)` and
//! lengths as `<number>px`. Everything here is pure so it can be checked
//! without a browser.

use serde_derive::Deserialize;

/// Average channel value below which a colour counts as dark.
pub const DARK_THRESHOLD: u32 = 128;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parses the serialisation browsers use for computed colours.
    pub fn parse(computed: &str) -> Option<Rgb> {
        let computed = computed.trim();
        let inner = computed
            .strip_prefix("rgba(")
            .or_else(|| computed.strip_prefix("rgb("))?
            .strip_suffix(')')?;

        let mut channels = inner
            .split(|c: char| c == ',' || c.is_whitespace() || c == '/')
            .filter(|part| !part.is_empty());

        let mut next = || channels.next()?.parse::<f64>().ok();
        let (r, g, b) = (next()?, next()?, next()?);

        Some(Rgb {
            r: channel(r)?,
            g: channel(g)?,
            b: channel(b)?,
        })
    }

    /// `(r + g + b) / 3 < 128`
    pub fn is_dark(&self) -> bool {
        (u32::from(self.r) + u32::from(self.g) + u32::from(self.b)) < DARK_THRESHOLD * 3
    }
}

fn channel(value: f64) -> Option<u8> {
    if (0.0..=255.0).contains(&value) {
        Some(value.round() as u8)
    } else {
        None
    }
}

/// Classifies a computed colour string. Anything unparseable is not dark.
pub fn is_dark(computed: &str) -> bool {
    Rgb::parse(computed).map_or(false, |rgb| rgb.is_dark())
}

/// Parses a computed length such as `"200px"` or `"18.5px"`.
pub fn parse_px(computed: &str) -> Option<f64> {
    computed.trim().strip_suffix("px")?.trim().parse().ok()
}

/// Client rect of an element together with the viewport height it was measured in.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
    pub viewport_height: f64,
}

impl Rect {
    pub fn in_viewport(&self) -> bool {
        in_viewport(self.top, self.bottom, self.viewport_height)
    }
}

/// An element is visible enough when its top or bottom edge lies inside the
/// viewport, or when it spans the whole viewport.
pub fn in_viewport(top: f64, bottom: f64, viewport_height: f64) -> bool {
    let inside = |edge: f64| edge >= 0.0 && edge <= viewport_height;
    inside(top) || inside(bottom) || (top < 0.0 && bottom > viewport_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rgb_and_rgba() {
        assert_eq!(Rgb::parse("rgb(34, 34, 34)"), Some(Rgb { r: 34, g: 34, b: 34 }));
        assert_eq!(
            Rgb::parse(" rgba(255, 0, 0, 0.5) "),
            Some(Rgb { r: 255, g: 0, b: 0 })
        );
        assert_eq!(Rgb::parse("rgb(10 20 30 / 50%)"), Some(Rgb { r: 10, g: 20, b: 30 }));
    }

    #[test]
    fn rejects_other_notations() {
        assert_eq!(Rgb::parse("#222222"), None);
        assert_eq!(Rgb::parse("hsl(0, 0%, 13%)"), None);
        assert_eq!(Rgb::parse("rgb(1, 2)"), None);
        assert_eq!(Rgb::parse("rgb(300, 0, 0)"), None);
    }

    #[test]
    fn luminance_threshold() {
        assert!(is_dark("rgb(34, 34, 34)"));
        assert!(!is_dark("rgb(255, 255, 255)"));
        // 127.67 average is still dark, 128 is not
        assert!(is_dark("rgb(128, 128, 127)"));
        assert!(!is_dark("rgb(128, 128, 128)"));
        assert!(!is_dark("transparent"));
    }

    #[test]
    fn parses_pixel_lengths() {
        assert_eq!(parse_px("200px"), Some(200.0));
        assert_eq!(parse_px(" 18.5px"), Some(18.5));
        assert_eq!(parse_px("clamp(1rem, 2.5vw, 2rem)"), None);
        assert_eq!(parse_px("auto"), None);
    }

    #[test]
    fn viewport_predicate() {
        let height = 720.0;
        assert!(in_viewport(0.0, 300.0, height));
        assert!(in_viewport(-200.0, 100.0, height));
        assert!(in_viewport(700.0, 1400.0, height));
        assert!(in_viewport(-100.0, 2000.0, height));
        assert!(!in_viewport(-500.0, -10.0, height));
        assert!(!in_viewport(721.0, 900.0, height));
    }

    #[test]
    fn rect_uses_its_viewport() {
        let rect = Rect {
            top: 10.0,
            bottom: 110.0,
            width: 300.0,
            height: 100.0,
            viewport_height: 5.0,
        };
        assert!(!rect.in_viewport());
    }
}

use ratatui::style::Color;

use crate::color::{ColorDepth, Rgb, approximate_rgb, blend};

// Centralized theme colours. A missing or odd palette only changes how
// things look; nothing in the core depends on these values.

pub const FLASH_RGB: Rgb = (255, 165, 0);
pub const FRAME_RGB: Rgb = (90, 90, 90);
pub const ACTIVE_FRAME_RGB: Rgb = (80, 140, 220);

pub fn rgb_to_color(rgb: Rgb) -> Color {
    ColorDepth::detect().map(rgb)
}

// Window frame
pub fn frame_fg() -> Color {
    rgb_to_color(FRAME_RGB)
}
pub fn active_frame_fg() -> Color {
    rgb_to_color(ACTIVE_FRAME_RGB)
}
pub fn title_fg() -> Color {
    Color::White
}
pub fn window_bg() -> Color {
    Color::Black
}

// Toasts
pub fn notice_bg() -> Color {
    Color::DarkGray
}
pub fn notice_fg() -> Color {
    Color::White
}

/// Attention flash colour at `intensity` (0..=1), blended over `base`.
/// Falls back to the plain flash colour when `base` has no RGB value.
pub fn flash_over(base: Color, intensity: f32) -> Color {
    let from = approximate_rgb(base).unwrap_or(FRAME_RGB);
    rgb_to_color(blend(from, FLASH_RGB, intensity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_colors_are_rgb_or_indexed() {
        for color in [frame_fg(), active_frame_fg(), flash_over(Color::Reset, 0.5)] {
            match color {
                Color::Rgb(_, _, _) | Color::Indexed(_) => {}
                other => panic!("unexpected color variant {other:?}"),
            }
        }
    }
}

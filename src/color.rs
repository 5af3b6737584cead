use ratatui::style::Color;

pub type Rgb = (u8, u8, u8);

/// Colour depth the terminal advertises through `COLORTERM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    TrueColor,
    Xterm256,
}

impl ColorDepth {
    pub fn detect() -> Self {
        match std::env::var("COLORTERM") {
            Ok(value) => Self::from_colorterm(&value),
            Err(_) => Self::Xterm256,
        }
    }

    fn from_colorterm(value: &str) -> Self {
        let value = value.to_ascii_lowercase();
        if value.contains("truecolor") || value.contains("24bit") {
            Self::TrueColor
        } else {
            Self::Xterm256
        }
    }

    pub fn map(self, rgb: Rgb) -> Color {
        match self {
            Self::TrueColor => Color::Rgb(rgb.0, rgb.1, rgb.2),
            Self::Xterm256 => Color::Indexed(nearest_xterm_index(rgb)),
        }
    }
}

/// Linear blend from `from` toward `to`; `t` is clamped to 0..=1.
pub fn blend(from: Rgb, to: Rgb, t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    (mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

/// Best-effort RGB value for a palette colour, used as the base of a blend.
pub fn approximate_rgb(color: Color) -> Option<Rgb> {
    let rgb = match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Black => (0, 0, 0),
        Color::Red => (205, 0, 0),
        Color::Green => (0, 205, 0),
        Color::Yellow => (205, 205, 0),
        Color::Blue => (0, 0, 238),
        Color::Magenta => (205, 0, 205),
        Color::Cyan => (0, 205, 205),
        Color::Gray => (229, 229, 229),
        Color::DarkGray => (127, 127, 127),
        Color::White => (255, 255, 255),
        Color::Indexed(idx) if idx >= 16 => xterm_index_rgb(idx),
        _ => return None,
    };
    Some(rgb)
}

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

fn cube_level(v: u8) -> usize {
    ((v as u16 * 5 + 127) / 255) as usize
}

fn gray_step(v: u8) -> u8 {
    ((v as u16 * 23 + 127) / 255) as u8
}

fn gray_value(step: u8) -> u8 {
    (8 + step as u16 * 10).min(255) as u8
}

fn xterm_index_rgb(idx: u8) -> Rgb {
    if idx >= 232 {
        let v = gray_value(idx - 232);
        return (v, v, v);
    }
    let cube = idx.saturating_sub(16);
    (
        CUBE_LEVELS[(cube / 36) as usize % 6],
        CUBE_LEVELS[((cube / 6) % 6) as usize],
        CUBE_LEVELS[(cube % 6) as usize],
    )
}

fn distance_sq(a: Rgb, b: Rgb) -> u32 {
    let d = |x: u8, y: u8| (x as i32 - y as i32).pow(2) as u32;
    d(a.0, b.0) + d(a.1, b.1) + d(a.2, b.2)
}

/// Nearest entry in the xterm 6x6x6 cube or the 24-step gray ramp.
fn nearest_xterm_index(rgb: Rgb) -> u8 {
    let (r, g, b) = (cube_level(rgb.0), cube_level(rgb.1), cube_level(rgb.2));
    let cube_index = (16 + 36 * r + 6 * g + b) as u8;
    let cube_rgb = (CUBE_LEVELS[r], CUBE_LEVELS[g], CUBE_LEVELS[b]);

    let avg = ((rgb.0 as u16 + rgb.1 as u16 + rgb.2 as u16) / 3) as u8;
    let step = gray_step(avg);
    let gray = gray_value(step);

    if distance_sq(rgb, (gray, gray, gray)) < distance_sq(rgb, cube_rgb) {
        232 + step
    } else {
        cube_index
    }
}

use ratatui::style::Color;

pub type Rgb = (u8, u8, u8);

/// Used whenever a configured candidate color fails to parse.
pub const DEFAULT_BASE_COLOR: Rgb = (66, 135, 245);

// Darkest factor a zero-valued unit is drawn with, so it stays visible
// against the terminal background.
const BRIGHTNESS_FLOOR: f64 = 0.08;

// Dark navy through blue, teal, green, lime and amber up to near-white.
// Stop colors are ordered by increasing luminance.
const GRADIENT_STOPS: [(f64, Rgb); 8] = [
    (0.00, (10, 18, 92)),
    (0.14, (28, 76, 208)),
    (0.30, (24, 152, 158)),
    (0.45, (44, 182, 86)),
    (0.60, (100, 195, 45)),
    (0.74, (203, 168, 44)),
    (0.87, (255, 150, 95)),
    (1.00, (255, 244, 230)),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    SingleHue,
    MultiHue,
}

impl ColorMode {
    pub fn toggled(self) -> Self {
        match self {
            ColorMode::SingleHue => ColorMode::MultiHue,
            ColorMode::MultiHue => ColorMode::SingleHue,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorMode::SingleHue => "single hue",
            ColorMode::MultiHue => "multi hue",
        }
    }
}

/// Maps a normalized statistic to a fill color. Values outside [0, 1] are
/// clamped; the square root stretches differences among low values, where
/// most units sit.
pub fn color_for(value: f64, mode: ColorMode, base: Rgb) -> Rgb {
    let t = value.clamp(0.0, 1.0).sqrt();
    match mode {
        ColorMode::SingleHue => {
            let factor = BRIGHTNESS_FLOOR + t * (1.0 - BRIGHTNESS_FLOOR);
            (
                (base.0 as f64 * factor).round() as u8,
                (base.1 as f64 * factor).round() as u8,
                (base.2 as f64 * factor).round() as u8,
            )
        }
        ColorMode::MultiHue => gradient_at(t),
    }
}

pub fn parse_hex_color(hex: &str) -> Option<Rgb> {
    let hex = hex.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

pub fn base_color_or_default(hex: &str) -> Rgb {
    parse_hex_color(hex).unwrap_or(DEFAULT_BASE_COLOR)
}

pub fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn gradient_at(t: f64) -> Rgb {
    for pair in GRADIENT_STOPS.windows(2) {
        let (lo_pos, lo) = pair[0];
        let (hi_pos, hi) = pair[1];
        if t >= lo_pos && t <= hi_pos {
            let span = (hi_pos - lo_pos).max(f64::EPSILON);
            let f = (t - lo_pos) / span;
            return (
                lerp_channel(lo.0, hi.0, f),
                lerp_channel(lo.1, hi.1, f),
                lerp_channel(lo.2, hi.2, f),
            );
        }
    }
    GRADIENT_STOPS[GRADIENT_STOPS.len() - 1].1
}

fn lerp_channel(a: u8, b: u8, f: f64) -> u8 {
    let f = f.clamp(0.0, 1.0);
    (a as f64 + (b as f64 - a as f64) * f).round() as u8
}

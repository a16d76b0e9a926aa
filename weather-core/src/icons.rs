//! OpenWeatherMap icon codes to display glyphs.

/// Shown for any code missing from [`ICONS`].
pub const FALLBACK_GLYPH: &str = "🌡️";

pub const ICONS: [(&str, &str); 18] = [
    ("01d", "☀️"),
    ("01n", "🌙"),
    ("02d", "⛅"),
    ("02n", "☁️"),
    ("03d", "☁️"),
    ("03n", "☁️"),
    ("04d", "☁️"),
    ("04n", "☁️"),
    ("09d", "🌧️"),
    ("09n", "🌧️"),
    ("10d", "🌦️"),
    ("10n", "🌧️"),
    ("11d", "⛈️"),
    ("11n", "⛈️"),
    ("13d", "❄️"),
    ("13n", "❄️"),
    ("50d", "🌫️"),
    ("50n", "🌫️"),
];

pub fn resolve_glyph(code: &str) -> &'static str {
    ICONS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, glyph)| *glyph)
        .unwrap_or(FALLBACK_GLYPH)
}

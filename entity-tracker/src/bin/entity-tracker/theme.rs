use colored::Color;
use once_cell::sync::Lazy;

/// Colors of the replay CLI.
pub struct Palette {
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub info: Color,
    pub heading: Color,
    pub emphasis: Color,
    pub command: Color,
    pub muted: Color,
    /// Value recorded before the flush.
    pub original: Color,
    /// Value the entity holds when notified.
    pub current: Color,
}

pub static THEME: Lazy<Palette> = Lazy::new(|| Palette {
    success: Color::Green,
    error: Color::Red,
    warning: Color::Yellow,
    info: Color::Blue,
    heading: Color::Cyan,
    emphasis: Color::BrightBlue,
    command: Color::Magenta,
    muted: Color::BrightBlack,
    original: Color::BrightRed,
    current: Color::BrightGreen,
});

pub const ARROW: &str = "→";
pub const BULLET: &str = "•";

/// Kind of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
    Warning,
    Info,
}

impl Tone {
    pub fn icon(self) -> &'static str {
        match self {
            Tone::Success => "✓",
            Tone::Error => "✗",
            Tone::Warning => "⚠",
            Tone::Info => "ℹ",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Tone::Success => THEME.success,
            Tone::Error => THEME.error,
            Tone::Warning => THEME.warning,
            Tone::Info => THEME.info,
        }
    }
}

/// Marker in front of a notified entity: `+` when it had no original, `~`
/// when fields changed.
pub fn change_mark(is_new: bool) -> &'static str {
    if is_new { "+" } else { "~" }
}

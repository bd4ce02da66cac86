//! Terminal color schemes. One `ColorScheme` value is built at process
//! start (from the environment) and passed by reference into the
//! presenter; nothing looks colors up ambiently.

use colored::{Color, Colorize};

/// Env var selecting the color scheme by name ("clear" or "dark").
pub const COLOR_SCHEME_ENV: &str = "EXERCHECK_COLORS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Paint {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
}

impl Paint {
    pub const fn none() -> Self {
        Self { fg: None, bg: None }
    }

    pub const fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            bg: None,
        }
    }

    pub const fn fg_bg(fg: Color, bg: Color) -> Self {
        Self {
            fg: Some(fg),
            bg: Some(bg),
        }
    }

    pub fn apply(&self, text: &str) -> String {
        let mut s = text.normal();
        if let Some(fg) = self.fg {
            s = s.color(fg);
        }
        if let Some(bg) = self.bg {
            s = s.on_color(bg);
        }
        s.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorScheme {
    pub expected: Paint,
    pub found: Paint,
    pub diff_mark: Paint,
    pub line_number: Paint,
    pub pass_banner: Paint,
    pub fail_banner: Paint,
    pub command: Paint,
    pub command_args: Paint,
    pub warning: Paint,
    pub error: Paint,
}

impl ColorScheme {
    pub fn clear() -> Self {
        Self {
            expected: Paint::fg(Color::Green),
            found: Paint::fg(Color::Blue),
            diff_mark: Paint::fg(Color::Red),
            line_number: Paint::fg(Color::Magenta),
            pass_banner: Paint::fg(Color::Green),
            fail_banner: Paint::fg_bg(Color::Black, Color::Red),
            command: Paint::fg(Color::Magenta),
            command_args: Paint::fg(Color::Cyan),
            warning: Paint::fg(Color::Red),
            error: Paint::fg(Color::Red),
        }
    }

    /// Variant with backing shades that read better on dark terminals.
    pub fn dark() -> Self {
        Self {
            expected: Paint::fg_bg(Color::Green, Color::BrightBlack),
            found: Paint::fg_bg(Color::Blue, Color::BrightBlack),
            diff_mark: Paint::fg(Color::White),
            line_number: Paint::fg(Color::Yellow),
            pass_banner: Paint::fg(Color::Green),
            fail_banner: Paint::fg_bg(Color::Black, Color::Red),
            command: Paint::fg(Color::White),
            command_args: Paint::fg(Color::Yellow),
            warning: Paint::fg(Color::Yellow),
            error: Paint::fg(Color::Red),
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "clear" => Some(Self::clear()),
            "dark" => Some(Self::dark()),
            _ => None,
        }
    }

    /// Scheme selected by the environment; a second value names the
    /// rejected scheme when the env var holds an unknown one, so the
    /// caller can warn the user (the fallback is "clear").
    pub fn from_env() -> (Self, Option<String>) {
        let Ok(name) = std::env::var(COLOR_SCHEME_ENV) else {
            return (Self::clear(), None);
        };
        match Self::by_name(&name) {
            Some(scheme) => (scheme, None),
            None => (Self::clear(), Some(name)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn by_name_knows_both_schemes() {
        assert_eq!(ColorScheme::by_name("clear"), Some(ColorScheme::clear()));
        assert_eq!(ColorScheme::by_name("dark"), Some(ColorScheme::dark()));
        assert_eq!(ColorScheme::by_name("solarized"), None);
    }

    #[test]
    fn from_env_reports_an_unknown_scheme_name() {
        std::env::remove_var(COLOR_SCHEME_ENV);
        assert_eq!(ColorScheme::from_env(), (ColorScheme::clear(), None));

        std::env::set_var(COLOR_SCHEME_ENV, "dark");
        assert_eq!(ColorScheme::from_env(), (ColorScheme::dark(), None));

        std::env::set_var(COLOR_SCHEME_ENV, "solarized");
        assert_eq!(
            ColorScheme::from_env(),
            (ColorScheme::clear(), Some("solarized".to_owned()))
        );
        std::env::remove_var(COLOR_SCHEME_ENV);
    }

    #[test]
    fn paint_without_colors_is_the_identity() {
        colored::control::set_override(false);
        assert_eq!(Paint::none().apply("hello"), "hello");
        assert_eq!(Paint::fg(Color::Red).apply("hello"), "hello");
    }
}

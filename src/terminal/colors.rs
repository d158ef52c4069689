//! ANSI styling for status output.
//!
//! Colour is used only when the stream is a terminal and `NO_COLOR` is unset.

use std::fmt;
use std::io::{self, IsTerminal};

const RESET: &str = "\x1b[0m";

/// Whether stdout should receive escape sequences.
pub fn stdout_supports_color() -> bool {
    io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Whether stderr should receive escape sequences.
pub fn stderr_supports_color() -> bool {
    io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Foreground colours used by PIE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Cyan,
}

impl Color {
    fn code(self) -> &'static str {
        match self {
            Color::Red => "31",
            Color::Green => "32",
            Color::Yellow => "33",
            Color::Blue => "34",
            Color::Cyan => "36",
        }
    }
}

/// Text with optional colour, bold and dim attributes.
#[derive(Debug, Clone)]
pub struct Styled {
    content: String,
    color: Option<Color>,
    bold: bool,
    dim: bool,
    enabled: bool,
}

impl Styled {
    /// Style `content`; escapes are only emitted when `enabled`.
    pub fn with_color_support(content: impl Into<String>, enabled: bool) -> Self {
        Self {
            content: content.into(),
            color: None,
            bold: false,
            dim: false,
            enabled,
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn dim(mut self) -> Self {
        self.dim = true;
        self
    }

    pub fn red(self) -> Self {
        self.color(Color::Red)
    }

    pub fn green(self) -> Self {
        self.color(Color::Green)
    }

    pub fn yellow(self) -> Self {
        self.color(Color::Yellow)
    }

    pub fn blue(self) -> Self {
        self.color(Color::Blue)
    }

    pub fn cyan(self) -> Self {
        self.color(Color::Cyan)
    }

    fn codes(&self) -> Vec<&'static str> {
        let mut codes = Vec::with_capacity(3);
        if self.bold {
            codes.push("1");
        }
        if self.dim {
            codes.push("2");
        }
        if let Some(color) = self.color {
            codes.push(color.code());
        }
        codes
    }
}

impl fmt::Display for Styled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes = self.codes();
        if !self.enabled || codes.is_empty() {
            return f.write_str(&self.content);
        }
        write!(f, "\x1b[{}m{}{}", codes.join(";"), self.content, RESET)
    }
}

/// Status line markers.
pub struct Symbols {
    enabled: bool,
}

impl Symbols {
    pub fn new(color_enabled: bool) -> Self {
        Self {
            enabled: color_enabled,
        }
    }

    pub fn success(&self) -> Styled {
        Styled::with_color_support("\u{2713}", self.enabled).green().bold()
    }

    pub fn error(&self) -> Styled {
        Styled::with_color_support("\u{2717}", self.enabled).red().bold()
    }

    pub fn warning(&self) -> Styled {
        Styled::with_color_support("\u{26A0}", self.enabled).yellow().bold()
    }

    pub fn info(&self) -> Styled {
        Styled::with_color_support("\u{2139}", self.enabled).blue().bold()
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", Symbols::new(stdout_supports_color()).success(), message);
}

/// Print an error line to stderr.
pub fn print_error(message: &str) {
    eprintln!("{} {}", Symbols::new(stderr_supports_color()).error(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", Symbols::new(stdout_supports_color()).warning(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", Symbols::new(stdout_supports_color()).info(), message);
}

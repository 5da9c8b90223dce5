//! CSS-style colors as they appear in persisted documents.
//!
//! Documents store colors as strings (`#ff0000`, `rgba(255,255,0,0.3)`,
//! `transparent`, or an empty string meaning "no paint"). In memory a color
//! is four `f32` channels in `[0.0, 1.0]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use winnow::ascii::{float, multispace0};
use winnow::combinator::{alt, delimited, separated};
use winnow::error::{ContextError, ErrMode, ParserError};
use winnow::prelude::*;
use winnow::token::take_while;

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    /// Default highlighter ink.
    pub const YELLOW: Color = Color::rgba(1.0, 1.0, 0.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self::rgba(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            a.clamp(0.0, 1.0),
        )
    }

    /// Parse a hex color string: `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`.
    /// The leading `#` is optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        let short = |i: usize| hex_val(bytes[i]).map(|v| v * 17);
        let long = |i: usize| Some(hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?);

        let (r, g, b, a) = match bytes.len() {
            3 => (short(0)?, short(1)?, short(2)?, 255),
            4 => (short(0)?, short(1)?, short(2)?, short(3)?),
            6 => (long(0)?, long(2)?, long(4)?, 255),
            8 => (long(0)?, long(2)?, long(4)?, long(6)?),
            _ => return None,
        };
        Some(Self::from_rgba8(r, g, b, f32::from(a) / 255.0))
    }

    /// Emit as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Same color with its alpha multiplied by `opacity`.
    pub fn with_opacity(self, opacity: f32) -> Self {
        Self {
            a: (self.a * opacity).clamp(0.0, 1.0),
            ..self
        }
    }

    /// Serialized form used in documents.
    pub fn to_css(&self) -> String {
        if self.is_transparent() {
            return "transparent".to_string();
        }
        if self.a >= 1.0 {
            return self.to_hex();
        }
        let [r, g, b, _] = self.to_rgba8();
        format!("rgba({r},{g},{b},{})", (self.a * 1000.0).round() / 1000.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::TRANSPARENT
    }
}

// ─── Parsing ─────────────────────────────────────────────────────────────

/// Parse a CSS color. Empty input is "no paint" and maps to transparent.
pub fn parse_color(input: &str) -> Option<Color> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return Some(Color::TRANSPARENT);
    }
    let color = css_color.parse_next(&mut rest).ok()?;
    rest.trim().is_empty().then_some(color)
}

fn css_color(input: &mut &str) -> ModalResult<Color> {
    alt((hex_color, rgb_function, named_color)).parse_next(input)
}

fn hex_color(input: &mut &str) -> ModalResult<Color> {
    let _ = '#'.parse_next(input)?;
    let digits = take_while(3..=8, |c: char| c.is_ascii_hexdigit()).parse_next(input)?;
    Color::from_hex(digits).ok_or_else(|| ErrMode::Backtrack(ContextError::new()))
}

fn rgb_function(input: &mut &str) -> ModalResult<Color> {
    let _ = alt(("rgba", "rgb")).parse_next(input)?;
    let channels: Vec<f64> =
        delimited(ws('('), separated(3..=4, ws(float::<_, f64, _>), ','), ws(')')).parse_next(input)?;
    let channel = |v: f64| v.clamp(0.0, 255.0).round() as u8;
    let alpha = channels.get(3).copied().unwrap_or(1.0) as f32;
    Ok(Color::from_rgba8(
        channel(channels[0]),
        channel(channels[1]),
        channel(channels[2]),
        alpha,
    ))
}

fn named_color(input: &mut &str) -> ModalResult<Color> {
    let name = take_while(1.., |c: char| c.is_ascii_alphabetic()).parse_next(input)?;
    match name.to_ascii_lowercase().as_str() {
        "transparent" | "none" => Ok(Color::TRANSPARENT),
        "black" => Ok(Color::BLACK),
        "white" => Ok(Color::WHITE),
        "yellow" => Ok(Color::YELLOW),
        "red" => Ok(Color::rgba(1.0, 0.0, 0.0, 1.0)),
        "green" => Ok(Color::from_rgba8(0, 128, 0, 1.0)),
        "blue" => Ok(Color::rgba(0.0, 0.0, 1.0, 1.0)),
        _ => Err(ErrMode::Backtrack(ContextError::new())),
    }
}

fn ws<'a, O, E, P>(inner: P) -> impl Parser<&'a str, O, E>
where
    E: ParserError<&'a str>,
    P: Parser<&'a str, O, E>,
{
    delimited(multispace0, inner, multispace0)
}

// ─── Serde ───────────────────────────────────────────────────────────────

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_css())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `null` and `""` both mean "no paint".
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(Color::TRANSPARENT),
            Some(s) => parse_color(&s)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid color `{s}`"))),
        }
    }
}

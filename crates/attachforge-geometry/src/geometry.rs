//! Geometry string grammar.
//!
//! | Pattern  | Mode                                   |
//! |----------|----------------------------------------|
//! | `WxH`    | cover `W`x`H`, center-crop the overflow |
//! | `[WxH]`  | fit inside `W`x`H`, pad with white      |
//! | `Nw`     | constrain width                        |
//! | `Nh`     | constrain height                       |
//! | `Nl`     | constrain the longer source side       |

use std::fmt;
use std::str::FromStr;

use crate::error::GeometryError;

/// A parsed geometry specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Geometry {
    /// `WxH`: scale to cover the box, center, trim overflow.
    Cover { width: u32, height: u32 },
    /// `[WxH]`: scale to fit inside the box, center, pad with white.
    Band { width: u32, height: u32 },
    /// `Nw`: proportional scale to a target width.
    Width(u32),
    /// `Nh`: proportional scale to a target height.
    Height(u32),
    /// `Nl`: proportional scale so the longer source side hits the target.
    LongSide(u32),
}

impl Geometry {
    /// Whether the output canvas is exactly the requested box.
    pub fn is_boxed(&self) -> bool {
        matches!(self, Self::Cover { .. } | Self::Band { .. })
    }
}

fn parse_dimension(s: &str, original: &str) -> Result<u32, GeometryError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GeometryError::InvalidGeometry(original.to_string()));
    }
    match s.parse::<u32>() {
        Ok(0) | Err(_) => Err(GeometryError::InvalidGeometry(original.to_string())),
        Ok(n) => Ok(n),
    }
}

fn parse_box(s: &str, original: &str) -> Result<(u32, u32), GeometryError> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| GeometryError::InvalidGeometry(original.to_string()))?;
    Ok((parse_dimension(w, original)?, parse_dimension(h, original)?))
}

impl FromStr for Geometry {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let (width, height) = parse_box(inner, s)?;
            return Ok(Self::Band { width, height });
        }

        if s.contains('x') {
            let (width, height) = parse_box(s, s)?;
            return Ok(Self::Cover { width, height });
        }

        let Some(mode) = s.chars().last() else {
            return Err(GeometryError::InvalidGeometry(s.to_string()));
        };
        let n = parse_dimension(&s[..s.len() - mode.len_utf8()], s)?;
        match mode {
            'w' => Ok(Self::Width(n)),
            'h' => Ok(Self::Height(n)),
            'l' => Ok(Self::LongSide(n)),
            _ => Err(GeometryError::InvalidGeometry(s.to_string())),
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cover { width, height } => write!(f, "{}x{}", width, height),
            Self::Band { width, height } => write!(f, "[{}x{}]", width, height),
            Self::Width(n) => write!(f, "{}w", n),
            Self::Height(n) => write!(f, "{}h", n),
            Self::LongSide(n) => write!(f, "{}l", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_modes() {
        assert_eq!(
            "100x50".parse::<Geometry>().unwrap(),
            Geometry::Cover { width: 100, height: 50 }
        );
        assert_eq!(
            "[300x100]".parse::<Geometry>().unwrap(),
            Geometry::Band { width: 300, height: 100 }
        );
        assert_eq!("640w".parse::<Geometry>().unwrap(), Geometry::Width(640));
        assert_eq!("480h".parse::<Geometry>().unwrap(), Geometry::Height(480));
        assert_eq!("800l".parse::<Geometry>().unwrap(), Geometry::LongSide(800));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "", "x", "100", "100x", "x100", "[100x100", "100x100]", "[100w]", "0x10", "10x0",
            "0w", "-5w", "10q", "1.5w", "10 x 10", "100X100", "w",
        ] {
            assert!(bad.parse::<Geometry>().is_err(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_display_matches_input() {
        for s in ["100x100", "[300x100]", "99w", "10h", "5l"] {
            assert_eq!(s.parse::<Geometry>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_is_boxed() {
        assert!(Geometry::Cover { width: 1, height: 1 }.is_boxed());
        assert!(Geometry::Band { width: 1, height: 1 }.is_boxed());
        assert!(!Geometry::Width(10).is_boxed());
    }
}

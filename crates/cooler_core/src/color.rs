//! Cores do display: tipo [`Rgb`], paleta configurável e o gradiente
//! azul → verde → vermelho usado para qualquer métrica limitada.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cor RGB de 8 bits por canal.
///
/// Serializada como `"#RRGGBB"` no `config.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const GRAY: Rgb = Rgb::new(80, 80, 80);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Aceita `"#RRGGBB"` ou `"RRGGBB"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("cor inválida: {s:?} (esperado #RRGGBB)"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| format!("cor inválida: {s:?}"))
        };
        Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

/// Cores fixas do display (o gradiente não depende dela).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// Rótulos ("CPU", "RAM"…)
    pub label: Rgb,
    /// Fundo de cada linha
    pub background: Rgb,
    /// Valores informativos (relógio, uptime)
    pub muted: Rgb,
    /// Estado bom (cooler ON, RAID saudável)
    pub good: Rgb,
    /// Estado ruim
    pub bad: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            label: Rgb::WHITE,
            background: Rgb::BLACK,
            muted: Rgb::GRAY,
            good: Rgb::GREEN,
            bad: Rgb::RED,
        }
    }
}

/// Gradiente frio → quente para um valor dentro de `[min, max]`.
///
/// O valor é limitado ao intervalo e normalizado para `[0, 1]`. Abaixo da
/// metade vai de azul para verde, a partir da metade de verde para vermelho.
/// Intervalos degenerados (`max <= min`) ou NaN resultam em azul puro.
pub fn interpolate_color(value: f64, min: f64, max: f64) -> Rgb {
    let normalized = if max > min && !value.is_nan() {
        (value.clamp(min, max) - min) / (max - min)
    } else {
        0.0
    };

    if normalized < 0.5 {
        let ratio = normalized * 2.0;
        Rgb::new(0, channel(ratio), channel(1.0 - ratio))
    } else {
        let ratio = (normalized - 0.5) * 2.0;
        Rgb::new(channel(ratio), channel(1.0 - ratio), 0)
    }
}

/// Truncamento para 0–255.
fn channel(ratio: f64) -> u8 {
    (ratio * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_endpoints() {
        assert_eq!(interpolate_color(0.0, 0.0, 100.0), Rgb::BLUE);
        assert_eq!(interpolate_color(50.0, 0.0, 100.0), Rgb::GREEN);
        assert_eq!(interpolate_color(100.0, 0.0, 100.0), Rgb::RED);
    }

    #[test]
    fn values_outside_range_are_clamped() {
        let at_min = interpolate_color(30.0, 30.0, 100.0);
        assert_eq!(interpolate_color(-40.0, 30.0, 100.0), at_min);
        assert_eq!(interpolate_color(29.9, 30.0, 100.0), at_min);
        assert_eq!(interpolate_color(250.0, 30.0, 100.0), Rgb::RED);
    }

    #[test]
    fn gradient_halves() {
        // 25% → meio caminho entre azul e verde
        assert_eq!(interpolate_color(25.0, 0.0, 100.0), Rgb::new(0, 127, 127));
        // 75% → meio caminho entre verde e vermelho
        assert_eq!(interpolate_color(75.0, 0.0, 100.0), Rgb::new(127, 127, 0));
    }

    #[test]
    fn degenerate_range_is_blue() {
        assert_eq!(interpolate_color(0.0, 0.0, 0.0), Rgb::BLUE);
        assert_eq!(interpolate_color(5.0, 10.0, 1.0), Rgb::BLUE);
        assert_eq!(interpolate_color(f64::NAN, 0.0, 1.0), Rgb::BLUE);
    }

    #[test]
    fn hex_roundtrip_and_errors() {
        assert_eq!("#ff0000".parse::<Rgb>(), Ok(Rgb::RED));
        assert_eq!("505050".parse::<Rgb>(), Ok(Rgb::GRAY));
        assert_eq!(Rgb::GRAY.to_string(), "#505050");
        assert!("#ff00".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn palette_from_partial_toml() {
        let palette: Palette = toml::from_str(r##"bad = "#cc2222""##).unwrap();
        assert_eq!(palette.bad, Rgb::new(0xcc, 0x22, 0x22));
        assert_eq!(palette.good, Rgb::GREEN);
    }
}

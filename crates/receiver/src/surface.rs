//! Superfície de desenho do display.
//!
//! O driver real (ST7789 via SPI, por exemplo) só precisa implementar
//! [`DrawSurface`]. [`AnsiSurface`] desenha num terminal com cores 24-bit,
//! mapeando pixels para células de texto.

use rpcooler_core::color::Rgb;
use std::io::{self, Write};

/// Primitivas mínimas de desenho.
pub trait DrawSurface {
    fn text(&mut self, x: u16, y: u16, text: &str, fg: Rgb, bg: Rgb) -> io::Result<()>;

    fn rect(&mut self, x: u16, y: u16, w: u16, h: u16, color: Rgb, filled: bool) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Terminal ANSI: cada célula vale `cell_w × cell_h` pixels.
pub struct AnsiSurface<W: Write> {
    out: W,
    cell_w: u16,
    cell_h: u16,
}

impl<W: Write> AnsiSurface<W> {
    /// Fonte 8 px de largura, linhas de 15 px.
    pub fn new(out: W) -> Self {
        Self::with_cell_size(out, 8, 15)
    }

    pub fn with_cell_size(out: W, cell_w: u16, cell_h: u16) -> Self {
        Self {
            out,
            cell_w: cell_w.max(1),
            cell_h: cell_h.max(1),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Posição 1-based do terminal.
    fn cell(&self, x: u16, y: u16) -> (u16, u16) {
        (y / self.cell_h + 1, x / self.cell_w + 1)
    }

    fn cells(&self, pixels: u16, cell: u16) -> usize {
        usize::from(pixels.div_ceil(cell))
    }

    fn goto(&mut self, x: u16, y: u16) -> io::Result<()> {
        let (row, col) = self.cell(x, y);
        write!(self.out, "\x1b[{row};{col}H")
    }
}

fn fg_code(c: Rgb) -> String {
    format!("\x1b[38;2;{};{};{}m", c.r, c.g, c.b)
}

fn bg_code(c: Rgb) -> String {
    format!("\x1b[48;2;{};{};{}m", c.r, c.g, c.b)
}

const RESET: &str = "\x1b[0m";

impl<W: Write> DrawSurface for AnsiSurface<W> {
    fn text(&mut self, x: u16, y: u16, text: &str, fg: Rgb, bg: Rgb) -> io::Result<()> {
        self.goto(x, y)?;
        write!(self.out, "{}{}{text}{RESET}", fg_code(fg), bg_code(bg))
    }

    fn rect(&mut self, x: u16, y: u16, w: u16, h: u16, color: Rgb, filled: bool) -> io::Result<()> {
        let cols = self.cells(w, self.cell_w);
        let rows = self.cells(h, self.cell_h);
        if cols == 0 || rows == 0 {
            return Ok(());
        }

        for r in 0..rows {
            let row_y = y.saturating_add(u16::try_from(r).unwrap_or(u16::MAX).saturating_mul(self.cell_h));
            self.goto(x, row_y)?;
            let line = if filled {
                format!("{}{}", bg_code(color), " ".repeat(cols))
            } else if r == 0 || r == rows - 1 {
                format!("{}{}", fg_code(color), "─".repeat(cols))
            } else if cols > 1 {
                format!("{}│{}│", fg_code(color), " ".repeat(cols - 2))
            } else {
                format!("{}│", fg_code(color))
            };
            write!(self.out, "{line}{RESET}")?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut AnsiSurface<Vec<u8>>) -> io::Result<()>) -> String {
        let mut surface = AnsiSurface::new(Vec::new());
        f(&mut surface).unwrap();
        String::from_utf8(surface.into_inner()).unwrap()
    }

    #[test]
    fn text_is_positioned_by_cell() {
        let out = render(|s| s.text(40, 30, "RAM", Rgb::WHITE, Rgb::BLACK));
        assert_eq!(
            out,
            "\x1b[3;6H\x1b[38;2;255;255;255m\x1b[48;2;0;0;0mRAM\x1b[0m"
        );
    }

    #[test]
    fn filled_rect_paints_background() {
        let out = render(|s| s.rect(0, 15, 16, 15, Rgb::RED, true));
        assert_eq!(out, "\x1b[2;1H\x1b[48;2;255;0;0m  \x1b[0m");
    }

    #[test]
    fn outline_rect_draws_borders() {
        let out = render(|s| s.rect(0, 0, 24, 45, Rgb::GREEN, false));
        assert!(out.contains("───"));
        assert!(out.contains("│ │"));
    }

    #[test]
    fn empty_rect_draws_nothing() {
        assert_eq!(render(|s| s.rect(10, 10, 0, 15, Rgb::RED, true)), "");
    }
}

//! Layout do display de 128×160: uma linha de 15 px por métrica, rótulo na
//! primeira coluna e valor no deslocamento fixo de cada linha.

use crate::surface::DrawSurface;
use rpcooler_core::color::{Palette, Rgb};
use rpcooler_core::display::{DisplayModel, Field};
use std::io;

pub const SCREEN_WIDTH: u16 = 128;
pub const SCREEN_HEIGHT: u16 = 160;
pub const ROW_HEIGHT: u16 = 15;

/// Posição do aviso de enlace perdido, na linha do relógio.
const BANNER_X: u16 = 72;
const BANNER_TEXT: &str = "NO LINK";

/// Primeira linha das unidades externas.
const EXTERNAL_FIRST_ROW: u16 = 9;

/// Rótulo e deslocamento do valor de cada linha fixa.
const ROWS: [(u16, &str, u16); 8] = [
    (1, "Uptime", 55),
    (2, "CPU", 30),
    (3, "CPU-temp", 70),
    (4, "Cooler", 60),
    (5, "RAM", 40),
    (6, "Swap", 45),
    (7, "RAID", 50),
    (8, "Disk", 45),
];

/// Deslocamento da frequência, à direita da carga na linha "CPU".
const CPU_FREQ_X: u16 = 80;

#[derive(Debug, Clone, Copy)]
pub struct Screen {
    width: u16,
    height: u16,
    row_height: u16,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            width: SCREEN_WIDTH,
            height: SCREEN_HEIGHT,
            row_height: ROW_HEIGHT,
        }
    }
}

impl Screen {
    fn row_y(&self, row: u16) -> u16 {
        row.saturating_mul(self.row_height)
    }

    /// A linha cabe inteira na tela?
    fn fits(&self, row: u16) -> bool {
        self.row_y(row).saturating_add(self.row_height) <= self.height
    }

    /// Quantas unidades externas cabem abaixo do disco.
    #[cfg(test)]
    pub fn external_capacity(&self) -> usize {
        (EXTERNAL_FIRST_ROW..)
            .take_while(|&row| self.fits(row))
            .count()
    }

    pub fn clear(&self, surface: &mut dyn DrawSurface, palette: &Palette) -> io::Result<()> {
        surface.rect(0, 0, self.width, self.height, palette.background, true)?;
        surface.flush()
    }

    /// Desenha os rótulos fixos (uma vez, após limpar a tela).
    pub fn draw_labels(&self, surface: &mut dyn DrawSurface, palette: &Palette) -> io::Result<()> {
        for (row, label, _) in ROWS {
            surface.text(0, self.row_y(row), label, palette.label, palette.background)?;
        }
        surface.flush()
    }

    /// Limpa a área de valor e escreve o campo.
    fn value(
        &self,
        surface: &mut dyn DrawSurface,
        x: u16,
        row: u16,
        field: &Field,
        background: Rgb,
    ) -> io::Result<()> {
        let y = self.row_y(row);
        surface.rect(x, y, self.width.saturating_sub(x), self.row_height, background, true)?;
        surface.text(x, y, &field.text, field.color, background)
    }

    pub fn render(
        &self,
        surface: &mut dyn DrawSurface,
        model: &DisplayModel,
        palette: &Palette,
    ) -> io::Result<()> {
        let bg = palette.background;
        self.value(surface, 0, 0, &model.time, bg)?;

        let fields = [
            &model.uptime,
            &model.cpu_load,
            &model.cpu_temp,
            &model.cooler,
            &model.ram,
            &model.swap,
            &model.raid,
            &model.disk,
        ];
        for ((row, _, x), field) in ROWS.into_iter().zip(fields) {
            self.value(surface, x, row, field, bg)?;
        }
        let cpu_y = self.row_y(2);
        surface.text(CPU_FREQ_X, cpu_y, &model.cpu_freq.text, model.cpu_freq.color, bg)?;

        // Linhas que sobram são limpas, para não ficar unidade removida na tela
        let mut externals = model.external_storages.iter();
        let mut row = EXTERNAL_FIRST_ROW;
        while self.fits(row) {
            match externals.next() {
                Some(field) => self.value(surface, 0, row, field, bg)?,
                None => surface.rect(0, self.row_y(row), self.width, self.row_height, bg, true)?,
            }
            row += 1;
        }

        surface.flush()
    }

    /// Aviso de enlace perdido; some no próximo `render`.
    pub fn draw_no_link(&self, surface: &mut dyn DrawSurface, palette: &Palette) -> io::Result<()> {
        surface.text(BANNER_X, 0, BANNER_TEXT, palette.bad, palette.background)?;
        surface.flush()
    }
}

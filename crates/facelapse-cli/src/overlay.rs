//! Day-counter text overlay drawn onto each frame before alignment.

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use std::path::Path;

const LABEL_ORIGIN: (i32, i32) = (40, 40);
const LABEL_SCALE: f32 = 30.0;
const LABEL_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Text of the overlay label, e.g. `Dia 31 - 16/04/2021`.
pub fn label_text(day: i64, date: NaiveDate) -> String {
    format!("Dia {day} - {}", date.format("%d/%m/%Y"))
}

/// Draws the day label onto frames with a TTF font loaded once at startup.
pub struct DayLabeler {
    font: FontArc,
}

impl DayLabeler {
    pub fn load(font_path: &Path) -> Result<Self> {
        let bytes = std::fs::read(font_path)
            .with_context(|| format!("reading font {}", font_path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .with_context(|| format!("{} is not a valid font", font_path.display()))?;
        Ok(Self { font })
    }

    pub fn draw(&self, frame: &mut RgbImage, day: i64, date: NaiveDate) {
        draw_text_mut(
            frame,
            LABEL_COLOR,
            LABEL_ORIGIN.0,
            LABEL_ORIGIN.1,
            PxScale::from(LABEL_SCALE),
            &self.font,
            &label_text(day, date),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_format() {
        let date = NaiveDate::from_ymd_opt(2021, 4, 16).unwrap();
        assert_eq!(label_text(31, date), "Dia 31 - 16/04/2021");
    }

    #[test]
    fn test_label_zero_pads_day_and_month() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 7).unwrap();
        assert_eq!(label_text(1, date), "Dia 1 - 07/03/2021");
    }
}

//! Colour palette and style bits
//!
//! The palette is built once at startup and shared read-only (behind an `Arc`)
//! by every buffer and cursor that needs default or indexed colours.

use bitflags::bitflags;

/// 24-bit colour value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

bitflags! {
    /// Text style bits. The empty set is the regular style.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StyleFlags: u8 {
        const BOLD      = 0b001;
        const ITALIC    = 0b010;
        const UNDERLINE = 0b100;
    }
}

/// 256-entry xterm colour table plus the default foreground/background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [Rgb; 256],
    foreground: Rgb,
    background: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FOREGROUND, Self::DEFAULT_BACKGROUND)
    }
}

impl Palette {
    pub const DEFAULT_FOREGROUND: u8 = 7;
    pub const DEFAULT_BACKGROUND: u8 = 0;

    /// Build the table; `foreground`/`background` are indices into it.
    pub fn new(foreground: u8, background: u8) -> Self {
        let mut colors = [Rgb::default(); 256];
        let mut index = 0;

        // 8 base colours
        for i in 0..8u8 {
            let channel = |bit: u8| if i & bit != 0 { 187 } else { 0 };
            colors[index] = Rgb::new(channel(1), channel(2), channel(4));
            index += 1;
        }

        // 8 bright colours
        for i in 0..8u8 {
            let channel = |bit: u8| if i & bit != 0 { 255 } else { 85 };
            colors[index] = Rgb::new(channel(1), channel(2), channel(4));
            index += 1;
        }

        // 6x6x6 colour cube
        let level = |n: u8| if n == 0 { 0 } else { n * 40 + 55 };
        for r in 0..6u8 {
            for g in 0..6u8 {
                for b in 0..6u8 {
                    colors[index] = Rgb::new(level(r), level(g), level(b));
                    index += 1;
                }
            }
        }

        // 24 grey levels
        for i in 0..24u8 {
            let grey = i * 10 + 8;
            colors[index] = Rgb::new(grey, grey, grey);
            index += 1;
        }

        Self {
            colors,
            foreground: colors[foreground as usize],
            background: colors[background as usize],
        }
    }

    pub fn color(&self, index: u8) -> Rgb {
        self.colors[index as usize]
    }

    pub fn foreground(&self) -> Rgb {
        self.foreground
    }

    pub fn background(&self) -> Rgb {
        self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_layout() {
        let palette = Palette::default();

        assert_eq!(palette.color(0), Rgb::new(0, 0, 0));
        assert_eq!(palette.color(1), Rgb::new(187, 0, 0));
        assert_eq!(palette.color(7), Rgb::new(187, 187, 187));
        assert_eq!(palette.color(8), Rgb::new(85, 85, 85));
        assert_eq!(palette.color(15), Rgb::new(255, 255, 255));
        assert_eq!(palette.color(16), Rgb::new(0, 0, 0));
        assert_eq!(palette.color(21), Rgb::new(0, 0, 255));
        assert_eq!(palette.color(231), Rgb::new(255, 255, 255));
        assert_eq!(palette.color(232), Rgb::new(8, 8, 8));
        assert_eq!(palette.color(255), Rgb::new(238, 238, 238));
    }

    #[test]
    fn test_default_colors_follow_indices() {
        let palette = Palette::default();
        assert_eq!(palette.foreground(), palette.color(7));
        assert_eq!(palette.background(), palette.color(0));

        let light = Palette::new(0, 15);
        assert_eq!(light.foreground(), Rgb::new(0, 0, 0));
        assert_eq!(light.background(), Rgb::new(255, 255, 255));
    }
}

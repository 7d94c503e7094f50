//! Nebula color presets with dark and light theme variants.

use rand::Rng;

/// A color in HSL space. Hue in degrees, saturation and lightness in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    pub const fn new(h: f32, s: f32, l: f32) -> Self {
        Self { h, s, l }
    }

    /// Convert to non-linear sRGB in `[0, 1]`.
    pub fn to_srgb(self) -> [f32; 3] {
        let h = self.h.rem_euclid(360.0) / 360.0;
        let s = self.s.clamp(0.0, 1.0);
        let l = self.l.clamp(0.0, 1.0);

        if s == 0.0 {
            return [l, l, l];
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        [
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        ]
    }

    /// Convert to linear RGB for blending on an sRGB surface.
    pub fn to_linear_rgb(self) -> [f32; 3] {
        self.to_srgb().map(srgb_to_linear)
    }
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Which palette variant the backdrop uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

const DARK_PRESETS: [Hsl; 7] = [
    Hsl::new(249.0, 0.37, 0.89),
    Hsl::new(244.0, 0.33, 0.85),
    Hsl::new(249.0, 0.36, 0.66),
    Hsl::new(270.0, 0.60, 0.65),
    Hsl::new(220.0, 0.70, 0.60),
    Hsl::new(310.0, 0.55, 0.60),
    Hsl::new(180.0, 0.50, 0.55),
];

const LIGHT_PRESETS: [Hsl; 7] = [
    Hsl::new(244.0, 0.33, 0.85),
    Hsl::new(249.0, 0.36, 0.66),
    Hsl::new(253.0, 0.28, 0.54),
    Hsl::new(270.0, 0.45, 0.45),
    Hsl::new(220.0, 0.50, 0.42),
    Hsl::new(310.0, 0.40, 0.42),
    Hsl::new(180.0, 0.40, 0.38),
];

/// Fixed set of cloud colors for one theme.
#[derive(Clone, Debug, PartialEq)]
pub struct NebulaPalette {
    theme: Theme,
    colors: Vec<[f32; 3]>,
}

impl NebulaPalette {
    /// The preset palette for `theme`.
    pub fn for_theme(theme: Theme) -> Self {
        let presets: &[Hsl] = match theme {
            Theme::Dark => &DARK_PRESETS,
            Theme::Light => &LIGHT_PRESETS,
        };
        Self {
            theme,
            colors: presets.iter().map(|c| c.to_linear_rgb()).collect(),
        }
    }

    /// Which theme this palette belongs to.
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Linear RGB colors in the palette.
    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    /// Pick one color uniformly at random.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> [f32; 3] {
        match self.colors.len() {
            0 => [1.0, 1.0, 1.0],
            n => self.colors[rng.random_range(0..n)],
        }
    }
}

impl Default for NebulaPalette {
    fn default() -> Self {
        Self::for_theme(Theme::default())
    }
}

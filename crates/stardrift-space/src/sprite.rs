//! Soft circular sprite bitmap shared by every nebula particle.

/// One color stop of a radial alpha gradient.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    /// Distance from the center divided by the radius, in `[0, 1]`.
    pub offset: f32,
    /// Alpha at this offset, in `[0, 1]`.
    pub alpha: f32,
}

impl GradientStop {
    pub const fn new(offset: f32, alpha: f32) -> Self {
        Self { offset, alpha }
    }
}

/// Default side length of the sprite bitmap.
pub const DEFAULT_SPRITE_SIZE: u32 = 256;

/// White fading to transparent, with a bright core and a long soft tail.
pub const DEFAULT_STOPS: [GradientStop; 5] = [
    GradientStop::new(0.0, 1.0),
    GradientStop::new(0.3, 0.9),
    GradientStop::new(0.5, 0.7),
    GradientStop::new(0.7, 0.4),
    GradientStop::new(1.0, 0.0),
];

/// A square RGBA8 radial gradient of white.
#[derive(Clone, Debug)]
pub struct SpriteBitmap {
    size: u32,
    pixels: Vec<u8>,
}

impl SpriteBitmap {
    /// Render the gradient described by `stops` into a `size`×`size`
    /// bitmap. Pixels outside the unit radius are fully transparent.
    ///
    /// `stops` must be sorted by offset.
    pub fn generate(size: u32, stops: &[GradientStop]) -> Self {
        let size = size.max(1);
        let radius = size as f32 * 0.5;
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);

        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 + 0.5 - radius;
                let dy = y as f32 + 0.5 - radius;
                let offset = (dx * dx + dy * dy).sqrt() / radius;
                let alpha = if offset > 1.0 {
                    0.0
                } else {
                    sample_gradient(stops, offset)
                };
                pixels.extend_from_slice(&[255, 255, 255, (alpha * 255.0).round() as u8]);
            }
        }

        log::debug!("Generated {size}x{size} sprite bitmap");
        Self { size, pixels }
    }

    /// Side length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Tightly packed RGBA8 pixel rows.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Alpha of the pixel at `(x, y)` in `[0, 1]`, or 0 outside the bitmap.
    pub fn alpha_at(&self, x: u32, y: u32) -> f32 {
        if x >= self.size || y >= self.size {
            return 0.0;
        }
        let index = ((y * self.size + x) * 4 + 3) as usize;
        self.pixels[index] as f32 / 255.0
    }
}

impl Default for SpriteBitmap {
    fn default() -> Self {
        Self::generate(DEFAULT_SPRITE_SIZE, &DEFAULT_STOPS)
    }
}

/// Linear interpolation between the two stops surrounding `offset`.
fn sample_gradient(stops: &[GradientStop], offset: f32) -> f32 {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return 0.0;
    };
    if offset <= first.offset {
        return first.alpha;
    }
    if offset >= last.offset {
        return last.alpha;
    }

    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if offset <= b.offset {
            let span = b.offset - a.offset;
            if span <= f32::EPSILON {
                return b.alpha;
            }
            let t = (offset - a.offset) / span;
            return a.alpha + (b.alpha - a.alpha) * t;
        }
    }
    last.alpha
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_has_rgba_bytes_for_every_pixel() {
        let sprite = SpriteBitmap::generate(64, &DEFAULT_STOPS);
        assert_eq!(sprite.size(), 64);
        assert_eq!(sprite.pixels().len(), 64 * 64 * 4);
    }

    #[test]
    fn test_center_is_opaque_and_corners_transparent() {
        let sprite = SpriteBitmap::default();
        let c = sprite.size() / 2;
        assert!(sprite.alpha_at(c, c) > 0.98);
        assert_eq!(sprite.alpha_at(0, 0), 0.0);
        assert_eq!(sprite.alpha_at(sprite.size() - 1, sprite.size() - 1), 0.0);
    }

    #[test]
    fn test_alpha_falls_off_monotonically_from_center() {
        let sprite = SpriteBitmap::generate(128, &DEFAULT_STOPS);
        let c = 64;
        let mut previous = f32::MAX;
        for x in c..128 {
            let alpha = sprite.alpha_at(x, c);
            assert!(alpha <= previous + 1e-6, "alpha rose at x={x}");
            previous = alpha;
        }
    }

    #[test]
    fn test_color_channels_are_white() {
        let sprite = SpriteBitmap::generate(16, &DEFAULT_STOPS);
        for px in sprite.pixels().chunks_exact(4) {
            assert_eq!(&px[..3], &[255, 255, 255]);
        }
    }

    #[test]
    fn test_gradient_interpolates_between_stops() {
        assert!((sample_gradient(&DEFAULT_STOPS, 0.0) - 1.0).abs() < 1e-6);
        assert!((sample_gradient(&DEFAULT_STOPS, 0.3) - 0.9).abs() < 1e-6);
        assert!((sample_gradient(&DEFAULT_STOPS, 0.6) - 0.55).abs() < 1e-6);
        assert!((sample_gradient(&DEFAULT_STOPS, 1.0)).abs() < 1e-6);
        assert_eq!(sample_gradient(&[], 0.5), 0.0);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = SpriteBitmap::generate(32, &DEFAULT_STOPS);
        let b = SpriteBitmap::generate(32, &DEFAULT_STOPS);
        assert_eq!(a.pixels(), b.pixels());
    }
}

//! Viewport bookkeeping for the backdrop surface.
//!
//! Tracks physical size and scale factor independently of the GPU so the
//! camera and point-size math stay correct even before a device exists.

/// Physical pixel dimensions of a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhysicalSize {
    /// Width in physical pixels.
    pub width: u32,
    /// Height in physical pixels.
    pub height: u32,
}

impl PhysicalSize {
    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Event produced when the surface dimensions or scale factor change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceResizeEvent {
    /// New physical pixel dimensions.
    pub physical: PhysicalSize,
    /// Current scale factor.
    pub scale_factor: f64,
}

/// Current viewport size and device pixel ratio.
///
/// Zero-area sizes (minimized windows, Wayland before the first configure)
/// are rejected so the last usable size stays in effect.
#[derive(Debug, Clone)]
pub struct SurfaceWrapper {
    physical_width: u32,
    physical_height: u32,
    scale_factor: f64,
}

impl SurfaceWrapper {
    /// Creates a wrapper from initial physical dimensions and scale factor.
    ///
    /// Zero dimensions fall back to 1 until the first real resize arrives.
    pub fn new(physical_width: u32, physical_height: u32, scale_factor: f64) -> Self {
        Self {
            physical_width: physical_width.max(1),
            physical_height: physical_height.max(1),
            scale_factor: sanitize_scale(scale_factor),
        }
    }

    /// Handle a window resize. Returns an event only when the size actually
    /// changed to a non-zero area.
    pub fn handle_resize(
        &mut self,
        physical_width: u32,
        physical_height: u32,
    ) -> Option<SurfaceResizeEvent> {
        if physical_width == 0 || physical_height == 0 {
            return None;
        }
        if physical_width == self.physical_width && physical_height == self.physical_height {
            return None;
        }

        self.physical_width = physical_width;
        self.physical_height = physical_height;
        Some(self.event())
    }

    /// Handle a scale factor change. Always reports an event for a usable
    /// size, because point sprites scale with the pixel ratio.
    pub fn handle_scale_factor_changed(
        &mut self,
        new_scale_factor: f64,
        new_physical_width: u32,
        new_physical_height: u32,
    ) -> Option<SurfaceResizeEvent> {
        let scale = sanitize_scale(new_scale_factor);
        let scale_changed = (scale - self.scale_factor).abs() > f64::EPSILON;
        self.scale_factor = scale;

        match self.handle_resize(new_physical_width, new_physical_height) {
            Some(event) => Some(event),
            None if scale_changed => Some(self.event()),
            None => None,
        }
    }

    /// Current physical pixel dimensions.
    pub fn physical_size(&self) -> PhysicalSize {
        PhysicalSize {
            width: self.physical_width,
            height: self.physical_height,
        }
    }

    /// Physical pixels per logical pixel.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    fn event(&self) -> SurfaceResizeEvent {
        SurfaceResizeEvent {
            physical: self.physical_size(),
            scale_factor: self.scale_factor,
        }
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_initial_size_is_clamped() {
        let wrapper = SurfaceWrapper::new(0, 0, 1.0);
        let size = wrapper.physical_size();
        assert_eq!(size, PhysicalSize { width: 1, height: 1 });
    }

    #[test]
    fn test_resize_to_zero_is_ignored() {
        let mut wrapper = SurfaceWrapper::new(800, 600, 1.0);
        assert!(wrapper.handle_resize(0, 0).is_none());
        assert!(wrapper.handle_resize(0, 600).is_none());
        assert_eq!(wrapper.physical_size(), PhysicalSize { width: 800, height: 600 });
    }

    #[test]
    fn test_resize_after_zero_applies() {
        let mut wrapper = SurfaceWrapper::new(1280, 720, 1.0);
        assert!(wrapper.handle_resize(0, 0).is_none());
        let event = wrapper.handle_resize(800, 600).unwrap();
        assert_eq!(event.physical, PhysicalSize { width: 800, height: 600 });
        assert!((event.physical.aspect_ratio() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_same_size_resize_returns_none() {
        let mut wrapper = SurfaceWrapper::new(1920, 1080, 1.0);
        assert!(wrapper.handle_resize(1920, 1080).is_none());
    }

    #[test]
    fn test_scale_factor_change_reports_event() {
        let mut wrapper = SurfaceWrapper::new(1440, 900, 1.0);
        let event = wrapper.handle_scale_factor_changed(2.0, 1440, 900).unwrap();
        assert_eq!(event.scale_factor, 2.0);
        assert_eq!(wrapper.scale_factor(), 2.0);

        // Same scale, same size: nothing to do.
        assert!(wrapper.handle_scale_factor_changed(2.0, 1440, 900).is_none());
    }

    #[test]
    fn test_invalid_scale_falls_back_to_one() {
        let wrapper = SurfaceWrapper::new(800, 600, 0.0);
        assert_eq!(wrapper.scale_factor(), 1.0);
        let wrapper = SurfaceWrapper::new(800, 600, f64::NAN);
        assert_eq!(wrapper.scale_factor(), 1.0);
    }
}

//! The animated backdrop bound to one window.
//!
//! A [`Backdrop`] starts inert. [`Backdrop::mount`] creates the GPU context,
//! compiles both sprite programs, uploads the nebula sprite and seeds the
//! simulation. Each redraw runs one scheduler tick: simulate, upload, then a
//! single render pass with stars first and nebula clouds on top.
//! [`Backdrop::unmount`] stops the scheduler before any GPU object is
//! released.

use std::sync::Arc;

use stardrift_config::{Config, ThemePreference};
use stardrift_render::{
    Camera, CameraBinding, FrameEncoder, PhysicalSize, RenderContext, RenderContextError,
    RenderPassBuilder, ShaderError, ShaderLibrary, SurfaceError, SurfaceWrapper,
    camera_bind_group_layout, init_render_context_blocking,
};
use stardrift_space::{
    CloudGpu, DEFAULT_STOPS, NebulaPalette, NebulaRenderer, NebulaRendererError,
    SimulationConfig, SpaceSimulation, SpriteBitmap, StarfieldRenderer, Theme,
};
use tracing::{debug, info, warn};
use winit::window::Window;

use crate::scheduler::FrameScheduler;

/// Why a mount attempt left the backdrop inert.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("GPU context: {0}")]
    Context(#[from] RenderContextError),
    #[error("starfield shader: {0}")]
    Shader(#[from] ShaderError),
    #[error("nebula renderer: {0}")]
    Nebula(#[from] NebulaRendererError),
}

/// Backdrop parameters derived from the user config.
#[derive(Debug, Clone, PartialEq)]
pub struct BackdropSettings {
    pub simulation: SimulationConfig,
    pub sprite_size: u32,
    pub vsync: bool,
    pub theme: ThemePreference,
}

/// Largest star pool accepted from the config.
pub const MAX_STAR_COUNT: u32 = 100_000;
/// Largest live cloud cap accepted from the config.
pub const MAX_CLOUD_CAP: u32 = 256;
/// Largest sprite bitmap side accepted from the config, before the device
/// limit is applied at mount.
pub const MAX_SPRITE_SIZE: u32 = 4096;

impl BackdropSettings {
    /// Build settings from the user config, correcting out-of-range values
    /// with a warning.
    pub fn from_config(config: &Config) -> Self {
        let background = &config.background;
        let defaults = SimulationConfig::default();

        let star_speed = if background.star_speed.is_finite() && background.star_speed >= 0.0 {
            background.star_speed
        } else {
            warn!(
                "Config star_speed {} is invalid, using {}",
                background.star_speed, defaults.star_speed
            );
            defaults.star_speed
        };

        let mut simulation = defaults;
        simulation.starfield.count =
            bounded("star_count", background.star_count, 0, MAX_STAR_COUNT);
        simulation.nebula.cap =
            bounded("cloud_cap", background.cloud_cap, 0, MAX_CLOUD_CAP) as usize;
        simulation.star_speed = star_speed;
        simulation.seed = background.seed;

        Self {
            simulation,
            sprite_size: bounded("sprite_size", background.sprite_size, 1, MAX_SPRITE_SIZE),
            vsync: config.window.vsync,
            theme: background.theme,
        }
    }
}

fn bounded(name: &str, value: u32, min: u32, max: u32) -> u32 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!("Config {name} {value} is out of range, using {clamped}");
    }
    clamped
}

/// Shrink the sprite side to what the device can sample.
fn fit_sprite_size(requested: u32, device_limit: u32) -> u32 {
    let size = requested.min(device_limit).max(1);
    if size != requested {
        warn!("Sprite size {requested} exceeds the device limit, using {size}");
    }
    size
}

impl Default for BackdropSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Pick the palette theme from the user preference and the window's theme.
pub fn resolve_theme(
    preference: ThemePreference,
    system: Option<winit::window::Theme>,
) -> Theme {
    match preference {
        ThemePreference::Dark => Theme::Dark,
        ThemePreference::Light => Theme::Light,
        ThemePreference::System => match system {
            Some(winit::window::Theme::Light) => Theme::Light,
            _ => Theme::Dark,
        },
    }
}

/// GPU objects and simulation that exist only while mounted.
struct MountedScene {
    gpu: RenderContext,
    shaders: ShaderLibrary,
    camera_binding: CameraBinding,
    stars: StarfieldRenderer,
    nebula: NebulaRenderer,
    simulation: SpaceSimulation<CloudGpu>,
}

impl MountedScene {
    fn new(
        window: Arc<Window>,
        settings: &BackdropSettings,
        camera: &Camera,
        viewport: &SurfaceWrapper,
        theme: Theme,
    ) -> Result<Self, MountError> {
        let gpu = init_render_context_blocking(window, settings.vsync)?;
        let mut shaders = ShaderLibrary::new();

        let camera_layout = camera_bind_group_layout(&gpu.device);
        let camera_binding = CameraBinding::new(
            &gpu.device,
            &camera_layout,
            &camera.to_uniform(viewport.physical_size(), viewport.scale_factor() as f32),
        );

        let sprite_size = fit_sprite_size(
            settings.sprite_size,
            gpu.device.limits().max_texture_dimension_2d,
        );
        let sprite = SpriteBitmap::generate(sprite_size, &DEFAULT_STOPS);
        let mut nebula = NebulaRenderer::new(
            &gpu.device,
            &gpu.queue,
            &mut shaders,
            gpu.surface_format,
            &camera_layout,
            &sprite,
        )?;
        let stars = StarfieldRenderer::new(
            &gpu.device,
            &mut shaders,
            gpu.surface_format,
            &camera_layout,
            &settings.simulation.starfield,
        )?;

        // Seeding attaches cloud GPU objects; nothing fallible may follow it.
        let simulation = SpaceSimulation::new(
            settings.simulation.clone(),
            NebulaPalette::for_theme(theme),
            &mut nebula,
        );

        Ok(Self {
            gpu,
            shaders,
            camera_binding,
            stars,
            nebula,
            simulation,
        })
    }

    /// Advance by `dt` and draw one frame.
    fn render_frame(&mut self, dt: f32) {
        let report = self.simulation.step(dt, &mut self.nebula);
        if let Some(id) = report.spawned {
            debug!("Spawned nebula cloud {}", id.0);
        }
        if report.culled > 0 {
            debug!("Culled {} expired nebula clouds", report.culled);
        }

        self.stars
            .update(&self.gpu.queue, self.simulation.starfield());
        self.nebula.update(self.simulation.nebula());

        let surface_texture = match self.gpu.get_current_texture() {
            Ok(texture) => texture,
            Err(SurfaceError::Timeout) => {
                debug!("Surface timeout, skipping frame");
                return;
            }
            Err(e) => {
                warn!("Skipping frame: {e}");
                return;
            }
        };

        let mut frame = FrameEncoder::new(&self.gpu.device, &self.gpu.queue, surface_texture);
        let builder = RenderPassBuilder::new().label("backdrop-pass");
        if let Some(mut pass) = frame.begin_render_pass(&builder) {
            let camera = &self.camera_binding.bind_group;
            self.stars.draw(&mut pass, camera);
            self.nebula
                .draw(&mut pass, camera, self.simulation.nebula());
        }
        frame.submit();
    }

    /// Release every GPU object. The surface goes with the context.
    fn teardown(mut self) {
        self.simulation.teardown(&mut self.nebula);
        self.nebula.dispose();
        self.stars.destroy();
        self.camera_binding.destroy();
        self.shaders.clear();
    }
}

/// Starfield and nebula backdrop for one window.
pub struct Backdrop {
    settings: BackdropSettings,
    viewport: SurfaceWrapper,
    camera: Camera,
    scheduler: FrameScheduler,
    theme: Theme,
    mounted: Option<MountedScene>,
}

impl Backdrop {
    /// An inert backdrop. Nothing touches the GPU until [`mount`](Self::mount).
    pub fn new(settings: BackdropSettings) -> Self {
        let theme = resolve_theme(settings.theme, None);
        Self {
            settings,
            viewport: SurfaceWrapper::new(1, 1, 1.0),
            camera: Camera::default(),
            scheduler: FrameScheduler::new(),
            theme,
            mounted: None,
        }
    }

    /// Attach to `window`. On failure the error is logged once and the
    /// backdrop stays inert. Returns whether the backdrop is mounted.
    pub fn mount(&mut self, window: Arc<Window>) -> bool {
        if self.mounted.is_some() {
            return true;
        }

        let size = window.inner_size();
        self.viewport = SurfaceWrapper::new(size.width, size.height, window.scale_factor());
        let physical = self.viewport.physical_size();
        self.camera
            .set_aspect_ratio(physical.width as f32, physical.height as f32);
        self.theme = resolve_theme(self.settings.theme, window.theme());

        match MountedScene::new(
            window,
            &self.settings,
            &self.camera,
            &self.viewport,
            self.theme,
        ) {
            Ok(scene) => {
                info!(
                    "Backdrop mounted at {}x{} (scale {:.2}, {:?} theme, {} stars)",
                    physical.width,
                    physical.height,
                    self.viewport.scale_factor(),
                    self.theme,
                    scene.simulation.starfield().len()
                );
                self.mounted = Some(scene);
                self.scheduler.start();
                true
            }
            Err(e) => {
                warn!("Backdrop disabled, mount failed: {e}");
                false
            }
        }
    }

    /// Apply a new physical size. Zero-area and unchanged sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        match self.viewport.handle_resize(width, height) {
            Some(event) => {
                self.apply_viewport(event.physical);
                true
            }
            None => false,
        }
    }

    /// Apply a new scale factor together with the size it implies.
    pub fn set_scale_factor(&mut self, scale_factor: f64, width: u32, height: u32) -> bool {
        match self
            .viewport
            .handle_scale_factor_changed(scale_factor, width, height)
        {
            Some(event) => {
                self.apply_viewport(event.physical);
                true
            }
            None => false,
        }
    }

    fn apply_viewport(&mut self, size: PhysicalSize) {
        self.camera
            .set_aspect_ratio(size.width as f32, size.height as f32);

        if let Some(scene) = &mut self.mounted {
            scene.gpu.resize(size.width, size.height);
            scene.camera_binding.update(
                &scene.gpu.queue,
                &self.camera,
                size,
                self.viewport.scale_factor() as f32,
            );
        }

        info!(
            "Backdrop resized to {}x{} (scale {:.2})",
            size.width,
            size.height,
            self.viewport.scale_factor()
        );
    }

    /// Re-resolve the palette theme. Only clouds spawned afterwards change
    /// color. Returns whether the theme changed.
    pub fn sync_theme(&mut self, system: Option<winit::window::Theme>) -> bool {
        let theme = resolve_theme(self.settings.theme, system);
        if theme == self.theme {
            return false;
        }
        self.theme = theme;
        if let Some(scene) = &mut self.mounted {
            scene.simulation.set_palette(NebulaPalette::for_theme(theme));
        }
        info!("Backdrop theme changed to {theme:?}");
        true
    }

    /// Run one scheduler tick. Returns `false` when the backdrop is inert or
    /// stopped and nothing was drawn.
    pub fn frame(&mut self) -> bool {
        let Some(scene) = self.mounted.as_mut() else {
            return false;
        };
        self.scheduler.on_frame(|dt| scene.render_frame(dt))
    }

    /// Whether the host should schedule another redraw.
    pub fn request_frame(&self) -> bool {
        self.scheduler.request_frame()
    }

    /// Stop the scheduler, then release every GPU resource. Safe to call more
    /// than once.
    pub fn unmount(&mut self) {
        self.scheduler.stop();
        if let Some(scene) = self.mounted.take() {
            scene.teardown();
            info!("Backdrop unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> PhysicalSize {
        self.viewport.physical_size()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn settings(&self) -> &BackdropSettings {
        &self.settings
    }
}

impl Drop for Backdrop {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerState;
    use winit::window::Theme as WindowTheme;

    #[test]
    fn test_new_backdrop_is_inert() {
        let mut backdrop = Backdrop::new(BackdropSettings::default());
        assert!(!backdrop.is_mounted());
        assert!(!backdrop.frame());
        assert!(!backdrop.request_frame());
        assert_eq!(backdrop.scheduler().state(), SchedulerState::Idle);
    }

    #[test]
    fn test_zero_resize_then_real_resize() {
        let mut backdrop = Backdrop::new(BackdropSettings::default());
        assert!(!backdrop.resize(0, 0));
        assert!(backdrop.camera().aspect_ratio.is_finite());

        assert!(backdrop.resize(800, 600));
        assert!((backdrop.camera().aspect_ratio - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(
            backdrop.viewport(),
            PhysicalSize {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn test_same_size_resize_is_a_no_op() {
        let mut backdrop = Backdrop::new(BackdropSettings::default());
        assert!(backdrop.resize(1024, 768));
        assert!(!backdrop.resize(1024, 768));
    }

    #[test]
    fn test_scale_factor_change_without_resize() {
        let mut backdrop = Backdrop::new(BackdropSettings::default());
        backdrop.resize(800, 600);
        assert!(backdrop.set_scale_factor(2.0, 800, 600));
        assert!(!backdrop.set_scale_factor(2.0, 800, 600));
    }

    #[test]
    fn test_unmount_twice_is_harmless() {
        let mut backdrop = Backdrop::new(BackdropSettings::default());
        backdrop.unmount();
        backdrop.unmount();
        assert!(!backdrop.is_mounted());
        assert_eq!(backdrop.scheduler().state(), SchedulerState::Stopped);
        assert!(!backdrop.frame());
    }

    #[test]
    fn test_resolve_theme() {
        assert_eq!(resolve_theme(ThemePreference::System, None), Theme::Dark);
        assert_eq!(
            resolve_theme(ThemePreference::System, Some(WindowTheme::Light)),
            Theme::Light
        );
        assert_eq!(
            resolve_theme(ThemePreference::Dark, Some(WindowTheme::Light)),
            Theme::Dark
        );
        assert_eq!(resolve_theme(ThemePreference::Light, None), Theme::Light);
    }

    #[test]
    fn test_sync_theme_follows_system_preference() {
        let mut backdrop = Backdrop::new(BackdropSettings::default());
        assert_eq!(backdrop.theme(), Theme::Dark);
        assert!(backdrop.sync_theme(Some(WindowTheme::Light)));
        assert_eq!(backdrop.theme(), Theme::Light);
        assert!(!backdrop.sync_theme(Some(WindowTheme::Light)));
    }

    #[test]
    fn test_forced_theme_ignores_system() {
        let settings = BackdropSettings {
            theme: ThemePreference::Light,
            ..Default::default()
        };
        let mut backdrop = Backdrop::new(settings);
        assert_eq!(backdrop.theme(), Theme::Light);
        assert!(!backdrop.sync_theme(Some(WindowTheme::Dark)));
    }

    #[test]
    fn test_invalid_star_speed_falls_back() {
        for speed in [f32::NAN, f32::INFINITY, -3.0] {
            let mut config = Config::default();
            config.background.star_speed = speed;
            let settings = BackdropSettings::from_config(&config);
            assert_eq!(settings.simulation.star_speed, 12.0);
        }
    }

    #[test]
    fn test_huge_counts_are_bounded() {
        let mut config = Config::default();
        config.background.cloud_cap = 4_000_000_000;
        config.background.star_count = u32::MAX;
        let settings = BackdropSettings::from_config(&config);
        assert_eq!(settings.simulation.nebula.cap, MAX_CLOUD_CAP as usize);
        assert_eq!(settings.simulation.starfield.count, MAX_STAR_COUNT);
    }

    #[test]
    fn test_sprite_size_is_bounded() {
        let mut config = Config::default();
        config.background.sprite_size = 0;
        assert_eq!(BackdropSettings::from_config(&config).sprite_size, 1);
        config.background.sprite_size = 1 << 20;
        assert_eq!(
            BackdropSettings::from_config(&config).sprite_size,
            MAX_SPRITE_SIZE
        );
    }

    #[test]
    fn test_sprite_size_fits_device_limit() {
        assert_eq!(fit_sprite_size(4096, 2048), 2048);
        assert_eq!(fit_sprite_size(256, 2048), 256);
        assert_eq!(fit_sprite_size(256, 0), 1);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.background.star_count = 1200;
        config.background.cloud_cap = 8;
        config.background.star_speed = 6.0;
        config.background.seed = Some(9);
        config.window.vsync = false;

        let settings = BackdropSettings::from_config(&config);
        assert_eq!(settings.simulation.starfield.count, 1200);
        assert_eq!(settings.simulation.nebula.cap, 8);
        assert_eq!(settings.simulation.star_speed, 6.0);
        assert_eq!(settings.simulation.seed, Some(9));
        assert!(!settings.vsync);
        assert_eq!(settings.sprite_size, 256);
    }
}

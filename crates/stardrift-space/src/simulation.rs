//! The per-mount simulation context: RNG, starfield and nebula field.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::nebula::{CloudBackend, CloudId, NebulaConfig, NebulaField};
use crate::palette::NebulaPalette;
use crate::starfield::{Starfield, StarfieldConfig};

/// Everything needed to build a [`SpaceSimulation`].
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub starfield: StarfieldConfig,
    pub nebula: NebulaConfig,
    /// Star travel speed in world units per second.
    pub star_speed: f32,
    /// Fixed seed for a reproducible sky; `None` seeds from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            starfield: StarfieldConfig::default(),
            nebula: NebulaConfig::default(),
            star_speed: 12.0,
            seed: None,
        }
    }
}

/// What happened during one [`SpaceSimulation::step`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub recycled_stars: usize,
    pub spawned: Option<CloudId>,
    pub culled: usize,
}

/// Simulation state for one mounted backdrop.
pub struct SpaceSimulation<H> {
    rng: ChaCha8Rng,
    starfield: Starfield,
    nebula: NebulaField<H>,
    star_speed: f32,
}

impl<H> SpaceSimulation<H> {
    /// Build the starfield and a half-populated nebula field.
    pub fn new<B: CloudBackend<Handle = H>>(
        config: SimulationConfig,
        palette: NebulaPalette,
        backend: &mut B,
    ) -> Self {
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };

        let starfield = Starfield::new(config.starfield, &mut rng);
        let mut nebula = NebulaField::new(config.nebula, palette, &mut rng);
        nebula.populate(&mut rng, backend);

        Self {
            rng,
            starfield,
            nebula,
            star_speed: sanitize_star_speed(config.star_speed),
        }
    }

    /// Advance by `dt` seconds: stars first, then spawn, age and cull clouds.
    pub fn step<B: CloudBackend<Handle = H>>(&mut self, dt: f32, backend: &mut B) -> StepReport {
        let recycled_stars = self.starfield.advance(self.star_speed * dt, &mut self.rng);
        let spawned = self.nebula.maybe_spawn(dt, &mut self.rng, backend);
        self.nebula.tick(dt);
        let culled = self.nebula.cull(backend);

        StepReport {
            recycled_stars,
            spawned,
            culled,
        }
    }

    /// Release every cloud handle. Safe to call more than once.
    pub fn teardown<B: CloudBackend<Handle = H>>(&mut self, backend: &mut B) {
        self.nebula.teardown(backend);
    }

    /// Palette for clouds spawned from now on.
    pub fn set_palette(&mut self, palette: NebulaPalette) {
        self.nebula.set_palette(palette);
    }

    pub fn starfield(&self) -> &Starfield {
        &self.starfield
    }

    pub fn nebula(&self) -> &NebulaField<H> {
        &self.nebula
    }
}

/// Non-finite speeds fall back to the default; negative speeds stop the
/// stars instead of sending them away from the recycle threshold forever.
fn sanitize_star_speed(speed: f32) -> f32 {
    if !speed.is_finite() {
        let fallback = SimulationConfig::default().star_speed;
        log::warn!("Star speed {speed} is not finite, using {fallback}");
        return fallback;
    }
    if speed < 0.0 {
        log::warn!("Star speed {speed} is negative, stopping stars");
        return 0.0;
    }
    speed
}

//! Recycling star pool that simulates forward travel.
//!
//! Every star drifts toward the camera along +Z. Once it passes the near
//! threshold it is respawned at the far plane with a new position and size,
//! so the pool never grows or shrinks.

use std::ops::RangeInclusive;

use rand::Rng;
use stardrift_render::PointInstance;

/// Starfield volume and particle parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct StarfieldConfig {
    /// Number of stars in the pool.
    pub count: u32,
    /// Stars span `[-half_extent, half_extent]` in X and Y.
    pub half_extent: f32,
    /// Depth at which recycled stars reappear.
    pub far_z: f32,
    /// Depth past which a star is recycled.
    pub near_z: f32,
    /// World-space sprite size range.
    pub size: RangeInclusive<f32>,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            count: 800,
            half_extent: 50.0,
            far_z: -100.0,
            near_z: 10.0,
            size: 0.2..=1.0,
        }
    }
}

/// Fixed-size pool of white point stars.
pub struct Starfield {
    config: StarfieldConfig,
    stars: Vec<PointInstance>,
}

impl Starfield {
    /// Allocate `config.count` stars spread through the whole depth range.
    pub fn new<R: Rng>(config: StarfieldConfig, rng: &mut R) -> Self {
        let span = config.near_z - config.far_z;
        let stars = (0..config.count)
            .map(|_| {
                // 1 - u is in (0, 1], which keeps the spawn depth in (far, near].
                let z = config.far_z + span * (1.0 - rng.random::<f32>());
                Self::spawn(&config, rng, z)
            })
            .collect();

        log::info!("Starfield initialized with {} stars", config.count);
        Self { config, stars }
    }

    /// Move every star `delta_depth` units toward the camera, recycling
    /// those that cross the near threshold. Returns how many were recycled.
    pub fn advance<R: Rng>(&mut self, delta_depth: f32, rng: &mut R) -> usize {
        let mut recycled = 0;
        for i in 0..self.stars.len() {
            self.stars[i].position[2] += delta_depth;
            let z = self.stars[i].position[2];
            if z.is_nan() || z > self.config.near_z {
                self.stars[i] = Self::spawn(&self.config, rng, self.config.far_z);
                recycled += 1;
            }
        }
        recycled
    }

    /// Current star instances, ready for upload.
    pub fn instances(&self) -> &[PointInstance] {
        &self.stars
    }

    /// Number of stars in the pool.
    pub fn len(&self) -> usize {
        self.stars.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    /// The configuration the pool was built with.
    pub fn config(&self) -> &StarfieldConfig {
        &self.config
    }

    fn spawn<R: Rng>(config: &StarfieldConfig, rng: &mut R, z: f32) -> PointInstance {
        let e = config.half_extent;
        PointInstance {
            position: [rng.random_range(-e..=e), rng.random_range(-e..=e), z],
            size: rng.random_range(config.size.clone()),
        }
    }
}

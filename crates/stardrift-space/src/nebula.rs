//! Nebula cloud lifecycle: spawning, aging, drift, pulsation and culling.
//!
//! Each [`NebulaCloud`] is a small volumetric cluster of sprites with an
//! age-driven opacity envelope. [`NebulaField`] owns the live population and
//! pairs every cloud with a handle from a [`CloudBackend`], which is how GPU
//! objects are created on spawn and released on cull. Clouds never come back
//! once they expire.

use std::f32::consts::TAU;
use std::ops::RangeInclusive;

use glam::{EulerRot, Mat4, Quat, Vec3};
use rand::Rng;
use stardrift_render::PointInstance;

use crate::palette::NebulaPalette;

/// Flicker amplitude while fading in.
pub const FADE_IN_FLICKER: f32 = 0.20;
/// Flicker amplitude while fully visible.
pub const STEADY_FLICKER: f32 = 0.15;
/// Flicker amplitude while fading out.
pub const FADE_OUT_FLICKER: f32 = 0.10;
/// Flicker frequency as a multiple of the cloud's pulse frequency.
pub const FLICKER_RATE: f32 = 8.0;
/// Effective opacity never exceeds `max_opacity` by more than this factor.
pub const OPACITY_HEADROOM: f32 = 1.2;

/// Randomization ranges for new clouds and the spawn cadence.
#[derive(Clone, Debug, PartialEq)]
pub struct NebulaConfig {
    /// Hard cap on live clouds.
    pub cap: usize,
    /// Cloud center X and Y.
    pub center_xy: RangeInclusive<f32>,
    /// Cloud center Z.
    pub center_z: RangeInclusive<f32>,
    pub base_radius: RangeInclusive<f32>,
    pub max_opacity: RangeInclusive<f32>,
    /// Seconds.
    pub lifespan: RangeInclusive<f32>,
    /// Seconds.
    pub fade_in: RangeInclusive<f32>,
    /// Seconds.
    pub fade_out: RangeInclusive<f32>,
    /// Per-axis drift bound in units per second.
    pub max_drift: f32,
    /// Per-axis spin bound in radians per second.
    pub max_spin: f32,
    pub pulse_speed: RangeInclusive<f32>,
    pub pulse_amount: RangeInclusive<f32>,
    /// Sprites per cloud.
    pub points: RangeInclusive<u32>,
    /// World-space size of each sprite.
    pub point_size: RangeInclusive<f32>,
    /// Seconds between spawn attempts.
    pub spawn_interval: RangeInclusive<f32>,
}

impl Default for NebulaConfig {
    fn default() -> Self {
        Self {
            cap: 32,
            center_xy: -30.0..=30.0,
            center_z: -60.0..=-10.0,
            base_radius: 5.0..=15.0,
            max_opacity: 0.10..=0.25,
            lifespan: 10.0..=25.0,
            fade_in: 1.0..=3.0,
            fade_out: 2.0..=5.0,
            max_drift: 0.6,
            max_spin: 0.15,
            pulse_speed: 0.5..=1.5,
            pulse_amount: 0.1..=0.3,
            points: 80..=130,
            point_size: 1.5..=4.5,
            spawn_interval: 0.5..=2.0,
        }
    }
}

/// Stable identity of a cloud within one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CloudId(pub u64);

/// Where a cloud is in its life, derived purely from its age.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloudPhase {
    Spawning,
    FadingIn,
    Steady,
    FadingOut,
    Expired,
}

/// One ephemeral glowing cluster.
#[derive(Clone, Debug)]
pub struct NebulaCloud {
    pub id: CloudId,
    pub center: Vec3,
    pub base_radius: f32,
    /// Linear RGB.
    pub color: [f32; 3],
    pub max_opacity: f32,
    /// Seconds since spawn, never above `lifespan`.
    pub age: f32,
    pub lifespan: f32,
    pub fade_in: f32,
    pub fade_out: f32,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Accumulated XYZ Euler angles.
    pub rotation: Vec3,
    pub pulse_speed: f32,
    pub pulse_amount: f32,
    pub pulse_phase: f32,
    /// Render scale from the last tick.
    pub scale: f32,
    /// Effective opacity from the last tick.
    pub opacity: f32,
    points: Vec<PointInstance>,
}

impl NebulaCloud {
    /// Roll a fresh cloud with every attribute drawn from `config`.
    pub fn random<R: Rng>(
        id: CloudId,
        config: &NebulaConfig,
        palette: &NebulaPalette,
        rng: &mut R,
    ) -> Self {
        let center = Vec3::new(
            rng.random_range(config.center_xy.clone()),
            rng.random_range(config.center_xy.clone()),
            rng.random_range(config.center_z.clone()),
        );
        let base_radius = rng.random_range(config.base_radius.clone());
        let mut symmetric = |bound: f32| {
            Vec3::new(
                rng.random_range(-bound..=bound),
                rng.random_range(-bound..=bound),
                rng.random_range(-bound..=bound),
            )
        };
        let velocity = symmetric(config.max_drift);
        let angular_velocity = symmetric(config.max_spin);

        let count = rng.random_range(config.points.clone());
        let points = (0..count)
            .map(|_| {
                // Power-law radius packs points toward the middle.
                let r = base_radius * rng.random::<f32>().powf(1.5);
                let theta = rng.random::<f32>() * TAU;
                let phi = (1.0 - 2.0 * rng.random::<f32>()).acos();
                let dir = Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos());
                PointInstance {
                    position: (dir * r).to_array(),
                    size: rng.random_range(config.point_size.clone()),
                }
            })
            .collect();

        Self {
            id,
            center,
            base_radius,
            color: palette.pick(rng),
            max_opacity: rng.random_range(config.max_opacity.clone()),
            age: 0.0,
            lifespan: rng.random_range(config.lifespan.clone()),
            fade_in: rng.random_range(config.fade_in.clone()),
            fade_out: rng.random_range(config.fade_out.clone()),
            velocity,
            angular_velocity,
            rotation: Vec3::ZERO,
            pulse_speed: rng.random_range(config.pulse_speed.clone()),
            pulse_amount: rng.random_range(config.pulse_amount.clone()),
            pulse_phase: rng.random::<f32>() * TAU,
            scale: 1.0,
            opacity: 0.0,
            points,
        }
    }

    /// Sprites in cloud-local space.
    pub fn points(&self) -> &[PointInstance] {
        &self.points
    }

    /// Envelope opacity at the current age, before flicker, and the flicker
    /// amplitude that goes with it.
    fn envelope(&self) -> (f32, f32) {
        let age = self.age;
        if age < self.fade_in {
            (self.max_opacity * age / self.fade_in, FADE_IN_FLICKER)
        } else if age > self.lifespan - self.fade_out {
            let remaining = (self.lifespan - age).max(0.0);
            (self.max_opacity * remaining / self.fade_out, FADE_OUT_FLICKER)
        } else {
            (self.max_opacity, STEADY_FLICKER)
        }
    }

    /// Opacity at the current age without flicker.
    pub fn base_opacity(&self) -> f32 {
        self.envelope().0.clamp(0.0, self.max_opacity)
    }

    /// Effective opacity at field time `t`, flicker included.
    pub fn opacity_at(&self, t: f32) -> f32 {
        let (base, amplitude) = self.envelope();
        let flicker = 1.0 + amplitude * self.flicker_wave(t);
        (base * flicker).clamp(0.0, self.max_opacity * OPACITY_HEADROOM)
    }

    /// Render scale at field time `t`.
    pub fn pulse(&self, t: f32) -> f32 {
        1.0 + self.pulse_amount * (t * self.pulse_speed + self.pulse_phase).sin()
    }

    fn flicker_wave(&self, t: f32) -> f32 {
        (t * self.pulse_speed * FLICKER_RATE + self.pulse_phase).sin()
    }

    /// Age by `dt` seconds, move, spin, and refresh scale and opacity for
    /// field time `t`.
    pub fn advance(&mut self, dt: f32, t: f32) {
        self.age = (self.age + dt).min(self.lifespan);
        self.center += self.velocity * dt;
        self.rotation += self.angular_velocity * dt;
        self.scale = self.pulse(t);
        self.opacity = self.opacity_at(t);
    }

    pub fn phase(&self) -> CloudPhase {
        if self.age >= self.lifespan {
            CloudPhase::Expired
        } else if self.age <= 0.0 {
            CloudPhase::Spawning
        } else if self.age < self.fade_in {
            CloudPhase::FadingIn
        } else if self.age > self.lifespan - self.fade_out {
            CloudPhase::FadingOut
        } else {
            CloudPhase::Steady
        }
    }

    pub fn is_expired(&self) -> bool {
        self.age >= self.lifespan
    }

    /// Local-to-world transform: pulse scale, Euler rotation, then center.
    pub fn model_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), rotation, self.center)
    }
}

/// Creates and releases the per-cloud resources that make a cloud visible.
///
/// A handle is released exactly once, by [`NebulaField::cull`] or
/// [`NebulaField::teardown`].
pub trait CloudBackend {
    type Handle;

    fn attach(&mut self, cloud: &NebulaCloud) -> Self::Handle;

    fn release(&mut self, handle: Self::Handle);
}

struct LiveCloud<H> {
    cloud: NebulaCloud,
    handle: H,
}

/// The bounded population of live clouds.
pub struct NebulaField<H> {
    config: NebulaConfig,
    palette: NebulaPalette,
    clouds: Vec<LiveCloud<H>>,
    next_id: u64,
    elapsed: f32,
    spawn_countdown: f32,
}

impl<H> NebulaField<H> {
    /// An empty field. Call [`NebulaField::populate`] to seed the sky.
    pub fn new<R: Rng>(config: NebulaConfig, palette: NebulaPalette, rng: &mut R) -> Self {
        let spawn_countdown = rng.random_range(config.spawn_interval.clone());
        Self {
            clouds: Vec::new(),
            config,
            palette,
            next_id: 0,
            elapsed: 0.0,
            spawn_countdown,
        }
    }

    /// Spawn `cap / 2` clouds at random points in their lives so the sky is
    /// not empty on the first frame.
    pub fn populate<R: Rng, B: CloudBackend<Handle = H>>(&mut self, rng: &mut R, backend: &mut B) {
        for _ in 0..self.config.cap / 2 {
            let mut cloud = self.roll(rng);
            cloud.age = rng.random::<f32>() * cloud.lifespan;
            cloud.scale = cloud.pulse(self.elapsed);
            cloud.opacity = cloud.opacity_at(self.elapsed);
            if self.insert(cloud, backend).is_none() {
                break;
            }
        }
        log::info!("Nebula field populated with {} clouds", self.clouds.len());
    }

    /// Spawn one random cloud. Refuses when the field is at capacity.
    pub fn spawn_cloud<R: Rng, B: CloudBackend<Handle = H>>(
        &mut self,
        rng: &mut R,
        backend: &mut B,
    ) -> Option<CloudId> {
        if self.is_full() {
            return None;
        }
        let cloud = self.roll(rng);
        self.insert(cloud, backend)
    }

    /// Add a prepared cloud, assigning it a fresh id. Refuses when the
    /// field is at capacity.
    pub fn insert<B: CloudBackend<Handle = H>>(
        &mut self,
        mut cloud: NebulaCloud,
        backend: &mut B,
    ) -> Option<CloudId> {
        if self.is_full() {
            return None;
        }
        cloud.id = CloudId(self.next_id);
        self.next_id += 1;

        let handle = backend.attach(&cloud);
        log::debug!(
            "Spawned cloud {} ({} points, lifespan {:.1}s)",
            cloud.id.0,
            cloud.points.len(),
            cloud.lifespan
        );
        let id = cloud.id;
        self.clouds.push(LiveCloud { cloud, handle });
        Some(id)
    }

    /// Count down the spawn timer and spawn when it elapses. The timer is
    /// re-rolled every time it elapses, even when the field is full.
    pub fn maybe_spawn<R: Rng, B: CloudBackend<Handle = H>>(
        &mut self,
        dt: f32,
        rng: &mut R,
        backend: &mut B,
    ) -> Option<CloudId> {
        self.spawn_countdown -= dt;
        if self.spawn_countdown > 0.0 {
            return None;
        }
        self.spawn_countdown = rng.random_range(self.config.spawn_interval.clone());
        self.spawn_cloud(rng, backend)
    }

    /// Advance field time and every live cloud by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.elapsed += dt;
        let t = self.elapsed;
        for live in &mut self.clouds {
            live.cloud.advance(dt, t);
        }
    }

    /// Remove every expired cloud and release its handle. Returns how many
    /// were removed.
    pub fn cull<B: CloudBackend<Handle = H>>(&mut self, backend: &mut B) -> usize {
        if !self.clouds.iter().any(|c| c.cloud.is_expired()) {
            return 0;
        }

        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.clouds)
            .into_iter()
            .partition(|c| c.cloud.is_expired());
        self.clouds = live;

        let count = expired.len();
        for LiveCloud { cloud, handle } in expired {
            log::debug!("Culled cloud {}", cloud.id.0);
            backend.release(handle);
        }
        count
    }

    /// Release every live cloud. Safe to call more than once.
    pub fn teardown<B: CloudBackend<Handle = H>>(&mut self, backend: &mut B) {
        if self.clouds.is_empty() {
            return;
        }
        let count = self.clouds.len();
        for live in self.clouds.drain(..) {
            backend.release(live.handle);
        }
        log::info!("Nebula field released {count} clouds");
    }

    /// Use `palette` for clouds spawned from now on.
    pub fn set_palette(&mut self, palette: NebulaPalette) {
        self.palette = palette;
    }

    pub fn palette(&self) -> &NebulaPalette {
        &self.palette
    }

    /// Live clouds with their handles, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&NebulaCloud, &H)> {
        self.clouds.iter().map(|c| (&c.cloud, &c.handle))
    }

    pub fn len(&self) -> usize {
        self.clouds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clouds.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.config.cap
    }

    /// Seconds of field time since creation.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    fn is_full(&self) -> bool {
        self.clouds.len() >= self.config.cap
    }

    fn roll<R: Rng>(&self, rng: &mut R) -> NebulaCloud {
        NebulaCloud::random(CloudId(self.next_id), &self.config, &self.palette, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Theme;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    /// Records attachments and releases instead of touching a GPU.
    #[derive(Default)]
    struct MockBackend {
        attached: BTreeSet<CloudId>,
        released: Vec<CloudId>,
    }

    struct MockHandle(CloudId);

    impl CloudBackend for MockBackend {
        type Handle = MockHandle;

        fn attach(&mut self, cloud: &NebulaCloud) -> MockHandle {
            assert!(self.attached.insert(cloud.id), "cloud attached twice");
            MockHandle(cloud.id)
        }

        fn release(&mut self, handle: MockHandle) {
            assert!(self.attached.remove(&handle.0), "handle released twice");
            self.released.push(handle.0);
        }
    }

    fn setup(cap: usize, seed: u64) -> (NebulaField<MockHandle>, MockBackend, ChaCha8Rng) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let config = NebulaConfig {
            cap,
            ..Default::default()
        };
        let field = NebulaField::new(config, NebulaPalette::default(), &mut rng);
        (field, MockBackend::default(), rng)
    }

    fn cloud_with_envelope(lifespan: f32, fade_in: f32, fade_out: f32, max: f32) -> NebulaCloud {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut cloud = NebulaCloud::random(
            CloudId(0),
            &NebulaConfig::default(),
            &NebulaPalette::default(),
            &mut rng,
        );
        cloud.lifespan = lifespan;
        cloud.fade_in = fade_in;
        cloud.fade_out = fade_out;
        cloud.max_opacity = max;
        cloud
    }

    fn at_age(cloud: &NebulaCloud, age: f32) -> f32 {
        NebulaCloud {
            age,
            ..cloud.clone()
        }
        .base_opacity()
    }

    #[test]
    fn test_random_cloud_within_ranges() {
        let config = NebulaConfig::default();
        let palette = NebulaPalette::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for i in 0..200 {
            let c = NebulaCloud::random(CloudId(i), &config, &palette, &mut rng);
            assert!((-30.0..=30.0).contains(&c.center.x));
            assert!((-30.0..=30.0).contains(&c.center.y));
            assert!((-60.0..=-10.0).contains(&c.center.z));
            assert!((5.0..=15.0).contains(&c.base_radius));
            assert!((0.10..=0.25).contains(&c.max_opacity));
            assert!((10.0..=25.0).contains(&c.lifespan));
            assert!((1.0..=3.0).contains(&c.fade_in));
            assert!((2.0..=5.0).contains(&c.fade_out));
            assert!(c.velocity.abs().max_element() <= 0.6);
            assert!(c.angular_velocity.abs().max_element() <= 0.15);
            assert!((80..=130).contains(&c.points().len()));
            assert!((0.0..TAU).contains(&c.pulse_phase));
            assert!(palette.colors().contains(&c.color));
            assert_eq!(c.age, 0.0);
            for p in c.points() {
                let r = Vec3::from_array(p.position).length();
                assert!(r <= c.base_radius + 1e-4);
            }
        }
    }

    #[test]
    fn test_points_are_denser_toward_center() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let config = NebulaConfig {
            points: 2000..=2000,
            ..Default::default()
        };
        let c = NebulaCloud::random(CloudId(0), &config, &NebulaPalette::default(), &mut rng);
        let inner = c
            .points()
            .iter()
            .filter(|p| Vec3::from_array(p.position).length() < c.base_radius * 0.5)
            .count();
        // u^1.5 < 0.5 for u < 0.63, so well over half land in the inner half.
        assert!(inner > 1100, "only {inner} inner points");
    }

    #[test]
    fn test_envelope_continuity() {
        let cloud = cloud_with_envelope(15.0, 2.0, 3.0, 0.2);
        assert!(at_age(&cloud, 0.0).abs() < 1e-6);
        assert!((at_age(&cloud, 1.0) - 0.1).abs() < 1e-6);
        assert!((at_age(&cloud, 2.0) - 0.2).abs() < 1e-6);
        assert!((at_age(&cloud, 7.0) - 0.2).abs() < 1e-6);
        assert!((at_age(&cloud, 12.0) - 0.2).abs() < 1e-6);
        assert!((at_age(&cloud, 13.5) - 0.1).abs() < 1e-5);
        assert!(at_age(&cloud, 15.0).abs() < 1e-6);

        // No jumps anywhere along the curve.
        let mut previous = at_age(&cloud, 0.0);
        for step in 1..=1500 {
            let value = at_age(&cloud, step as f32 * 0.01);
            assert!((value - previous).abs() < 0.002, "jump at step {step}");
            previous = value;
        }
    }

    #[test]
    fn test_lifecycle_scenario() {
        let (mut field, mut backend, _) = setup(4, 1);
        let id = field
            .insert(cloud_with_envelope(10.0, 1.0, 1.0, 0.2), &mut backend)
            .unwrap();
        let cloud = |f: &NebulaField<MockHandle>| f.iter().next().map(|(c, _)| c.clone());

        field.tick(0.5);
        assert!((cloud(&field).unwrap().base_opacity() - 0.1).abs() < 1e-6);
        assert_eq!(cloud(&field).unwrap().phase(), CloudPhase::FadingIn);

        field.tick(4.5);
        assert!((cloud(&field).unwrap().base_opacity() - 0.2).abs() < 1e-6);
        assert_eq!(cloud(&field).unwrap().phase(), CloudPhase::Steady);

        field.tick(4.7);
        assert!((cloud(&field).unwrap().base_opacity() - 0.06).abs() < 1e-4);
        assert_eq!(cloud(&field).unwrap().phase(), CloudPhase::FadingOut);
        assert_eq!(field.cull(&mut backend), 0);

        field.tick(0.5);
        assert_eq!(cloud(&field).unwrap().age, 10.0);
        assert_eq!(cloud(&field).unwrap().phase(), CloudPhase::Expired);
        assert_eq!(field.cull(&mut backend), 1);
        assert!(field.is_empty());
        assert_eq!(backend.released, vec![id]);
        assert!(backend.attached.is_empty());
    }

    #[test]
    fn test_age_is_clamped_at_lifespan() {
        let mut cloud = cloud_with_envelope(10.0, 1.0, 1.0, 0.2);
        cloud.advance(25.0, 25.0);
        assert_eq!(cloud.age, 10.0);
        assert!(cloud.is_expired());
        assert_eq!(cloud.base_opacity(), 0.0);
    }

    #[test]
    fn test_fresh_cloud_is_spawning() {
        let cloud = cloud_with_envelope(10.0, 1.0, 1.0, 0.2);
        assert_eq!(cloud.phase(), CloudPhase::Spawning);
        assert_eq!(cloud.base_opacity(), 0.0);
    }

    #[test]
    fn test_effective_opacity_stays_in_bounds() {
        let (mut field, mut backend, mut rng) = setup(32, 5);
        field.populate(&mut rng, &mut backend);
        for _ in 0..3000 {
            field.maybe_spawn(1.0 / 30.0, &mut rng, &mut backend);
            field.tick(1.0 / 30.0);
            for (cloud, _) in field.iter() {
                assert!(cloud.opacity >= 0.0);
                assert!(cloud.opacity <= cloud.max_opacity * OPACITY_HEADROOM + 1e-6);
                assert!(cloud.age <= cloud.lifespan);
            }
            field.cull(&mut backend);
        }
    }

    #[test]
    fn test_flicker_amplitude_by_phase() {
        let mut cloud = cloud_with_envelope(15.0, 2.0, 3.0, 0.2);
        cloud.pulse_speed = 1.0;
        cloud.pulse_phase = 0.0;
        let peak = std::f32::consts::FRAC_PI_2 / FLICKER_RATE;

        cloud.age = 1.0;
        assert!((cloud.opacity_at(peak) - 0.1 * 1.2).abs() < 1e-5);
        cloud.age = 7.0;
        assert!((cloud.opacity_at(peak) - 0.2 * 1.15).abs() < 1e-5);
        cloud.age = 13.5;
        assert!((cloud.opacity_at(peak) - 0.1 * 1.1).abs() < 1e-5);
    }

    #[test]
    fn test_flicker_is_faster_than_pulse() {
        let mut cloud = cloud_with_envelope(100.0, 1.0, 1.0, 0.2);
        cloud.age = 50.0;
        cloud.pulse_speed = 1.0;
        cloud.pulse_amount = 0.2;
        cloud.pulse_phase = 0.3;

        let sign_changes = |f: &dyn Fn(f32) -> f32| {
            let samples: Vec<f32> = (0..4000).map(|i| f(i as f32 * TAU / 4000.0)).collect();
            samples
                .windows(2)
                .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
                .count()
        };
        let pulse_crossings = sign_changes(&|t| cloud.pulse(t) - 1.0);
        let flicker_crossings = sign_changes(&|t| cloud.opacity_at(t) / 0.2 - 1.0);

        assert_eq!(pulse_crossings, 2);
        assert!(flicker_crossings >= 4 * pulse_crossings);
    }

    #[test]
    fn test_advance_applies_drift_and_spin() {
        let mut cloud = cloud_with_envelope(20.0, 1.0, 1.0, 0.2);
        let start = cloud.center;
        cloud.velocity = Vec3::new(0.5, 0.0, -0.25);
        cloud.angular_velocity = Vec3::new(0.0, 0.1, 0.0);
        cloud.advance(2.0, 2.0);
        assert!((cloud.center - (start + Vec3::new(1.0, 0.0, -0.5))).length() < 1e-5);
        assert!((cloud.rotation - Vec3::new(0.0, 0.2, 0.0)).length() < 1e-6);
        assert!((cloud.scale - cloud.pulse(2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_model_matrix_places_center() {
        let mut cloud = cloud_with_envelope(20.0, 1.0, 1.0, 0.2);
        cloud.center = Vec3::new(3.0, -2.0, -40.0);
        cloud.scale = 1.2;
        let origin = cloud.model_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - cloud.center).length() < 1e-5);
    }

    #[test]
    fn test_populate_spawns_half_cap_mid_life() {
        let (mut field, mut backend, mut rng) = setup(32, 9);
        field.populate(&mut rng, &mut backend);
        assert_eq!(field.len(), 16);
        assert_eq!(backend.attached.len(), 16);
        assert!(field.iter().all(|(c, _)| c.age < c.lifespan));
        assert!(field.iter().any(|(c, _)| c.age > 0.0));
    }

    #[test]
    fn test_population_never_exceeds_cap() {
        let (mut field, mut backend, mut rng) = setup(5, 21);
        field.populate(&mut rng, &mut backend);
        for _ in 0..500 {
            field.maybe_spawn(3.0, &mut rng, &mut backend);
            assert!(field.len() <= 5);
        }
        assert_eq!(field.len(), 5);
        assert!(field.spawn_cloud(&mut rng, &mut backend).is_none());
    }

    #[test]
    fn test_countdown_rerolls_when_full() {
        let (mut field, mut backend, mut rng) = setup(1, 2);
        field.spawn_cloud(&mut rng, &mut backend).unwrap();
        assert!(field.maybe_spawn(10.0, &mut rng, &mut backend).is_none());
        assert!((0.5..=2.0).contains(&field.spawn_countdown));
    }

    #[test]
    fn test_maybe_spawn_waits_for_countdown() {
        let (mut field, mut backend, mut rng) = setup(8, 4);
        assert!(field.maybe_spawn(0.1, &mut rng, &mut backend).is_none());
        assert!(field.maybe_spawn(2.0, &mut rng, &mut backend).is_some());
        assert_eq!(field.len(), 1);
    }

    #[test]
    fn test_cull_releases_exactly_the_expired() {
        let (mut field, mut backend, mut rng) = setup(32, 8);
        field.populate(&mut rng, &mut backend);
        for _ in 0..600 {
            field.maybe_spawn(0.1, &mut rng, &mut backend);
            field.tick(0.1);
            field.cull(&mut backend);

            let live: BTreeSet<CloudId> = field.iter().map(|(c, _)| c.id).collect();
            assert_eq!(live, backend.attached, "backend out of sync with field");
            assert!(field.iter().all(|(c, _)| !c.is_expired()));
        }
        assert!(!backend.released.is_empty());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (mut field, mut backend, mut rng) = setup(10, 13);
        field.populate(&mut rng, &mut backend);
        assert_eq!(field.len(), 5);

        field.teardown(&mut backend);
        assert!(field.is_empty());
        assert!(backend.attached.is_empty());
        assert_eq!(backend.released.len(), 5);

        field.teardown(&mut backend);
        assert_eq!(backend.released.len(), 5);
    }

    #[test]
    fn test_ids_are_unique_and_monotonic() {
        let (mut field, mut backend, mut rng) = setup(4, 17);
        let a = field.spawn_cloud(&mut rng, &mut backend).unwrap();
        let b = field.spawn_cloud(&mut rng, &mut backend).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_palette_change_only_affects_new_clouds() {
        let (mut field, mut backend, mut rng) = setup(64, 19);
        for _ in 0..10 {
            field.spawn_cloud(&mut rng, &mut backend);
        }
        let before: Vec<[f32; 3]> = field.iter().map(|(c, _)| c.color).collect();

        let light = NebulaPalette::for_theme(Theme::Light);
        field.set_palette(light.clone());
        let after: Vec<[f32; 3]> = field.iter().map(|(c, _)| c.color).collect();
        assert_eq!(before, after);

        for _ in 0..10 {
            field.spawn_cloud(&mut rng, &mut backend);
        }
        for (cloud, _) in field.iter().skip(10) {
            assert!(light.colors().contains(&cloud.color));
        }
    }
}

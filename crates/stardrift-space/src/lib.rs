//! Backdrop simulation and rendering: the recycling starfield, ephemeral
//! nebula clouds, their palette and sprite, and the GPU passes that draw them.

pub mod nebula;
pub mod palette;
pub mod renderer;
pub mod simulation;
pub mod sprite;
pub mod starfield;

pub use nebula::{CloudBackend, CloudId, CloudPhase, NebulaCloud, NebulaConfig, NebulaField};
pub use palette::{Hsl, NebulaPalette, Theme};
pub use renderer::{
    CloudGpu, CloudUniform, NEBULA_SHADER, NebulaRenderer, NebulaRendererError, STAR_SHADER,
    StarfieldRenderer,
};
pub use simulation::{SimulationConfig, SpaceSimulation, StepReport};
pub use sprite::{DEFAULT_SPRITE_SIZE, DEFAULT_STOPS, GradientStop, SpriteBitmap};
pub use starfield::{Starfield, StarfieldConfig};

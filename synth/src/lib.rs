//! Morph Synth
//!
//! Derive create/update input shapes from registered entity metadata.
//!
//! Responsibilities:
//! - Build an add shape and an update shape per entity
//! - Reduce relations to id references, nested shapes or collection deltas
//! - Resolve embedded dependencies with a bounded fixed-point loop
//! - Attach self-referencing collection deltas in a second phase
//! - Check argument trees against synthesized shapes

mod error;
mod shape;
mod synthesizer;

pub use error::{InputError, SynthError, SynthResult};
pub use shape::{EntityInputs, InputCatalog, InputField, InputShape, InputType};
pub use synthesizer::{add_shape_name, delta_name, update_shape_name, Synthesizer};

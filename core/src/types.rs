//! Shared primitive types used across the entire generator.

/// Position of a particle inside an event's arena. Immutable once assigned.
pub type ParticleIndex = usize;

/// Sequential number of an emitted event within a run.
pub type EventId = u64;

/// The canonical run identifier.
pub type RunId = String;

/// PDG species code.
pub type Pdg = i32;

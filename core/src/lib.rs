//! photogen-core: the generation core of a Monte Carlo generator for
//! exclusive photo- and electroproduction.
//!
//! MODULE ORDER (dependencies point upward only):
//!   types, error, rng, sampler, kinematics   numerical foundation
//!   particle, event                          data model
//!   config, generator, registry              component plumbing
//!   initial, process, decay, detector,
//!   reconstruction                           built-in components
//!   pipeline, output, store                  orchestration and sinks

pub mod types;
pub mod error;
pub mod rng;
pub mod sampler;
pub mod kinematics;
pub mod particle;
pub mod event;
pub mod config;
pub mod generator;
pub mod registry;
pub mod initial;
pub mod process;
pub mod decay;
pub mod detector;
pub mod reconstruction;
pub mod pipeline;
pub mod output;
pub mod store;

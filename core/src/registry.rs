//! Name → constructor registries for every component family.
//!
//! RULES:
//!   - Registration happens once, in the order written in `builtin()`,
//!     before the first `create`. After that the tables are read-only.
//!   - Registering a name twice keeps the first constructor.
//!   - Creating an unknown name is a fatal `GenError::UnknownType`.
//!
//! `global()` is the process-wide instance: it is built on first use and
//! lives until process exit. Tests and embedders that need extra types
//! build their own `ComponentRegistry` instead of mutating the global.

use crate::{
    config::Config,
    decay::TwoBodyDecay,
    detector::{AcceptanceDetector, CompositeDetector, PerfectDetector},
    error::{GenError, GenResult},
    generator::{
        DecayProcessor, DetectorSimulator, InitialStateGenerator, ParticleGenerator,
        PhotonGenerator, ProcessGenerator, Reconstruction, VertexGenerator,
    },
    initial::{
        ConstantParticle, FlatZVertex, GaussianVertex, OriginVertex, PhotoproductionGenerator,
        PhotonBeam, RealPhoton, VirtualPhoton,
    },
    process::ExponentialTProcess,
    reconstruction::{NoReconstruction, RequireDetected},
};
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

/// Builds one component from its configuration sub-tree. Composite
/// components use the registry argument to build their children.
pub type Constructor<T> = fn(&Config, &ComponentRegistry) -> GenResult<Box<T>>;

/// Constructor table for one polymorphic family.
pub struct Registry<T: ?Sized> {
    family: &'static str,
    ctors:  RwLock<HashMap<String, Constructor<T>>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(family: &'static str) -> Self {
        Self { family, ctors: RwLock::new(HashMap::new()) }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Add a constructor. Returns false (and keeps the existing binding)
    /// if `name` is already registered.
    pub fn register(&self, name: &str, ctor: Constructor<T>) -> bool {
        let mut ctors = self.ctors.write().unwrap_or_else(PoisonError::into_inner);
        if ctors.contains_key(name) {
            log::warn!("{} '{name}' already registered; keeping the first constructor", self.family);
            return false;
        }
        ctors.insert(name.to_string(), ctor);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctors.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .ctors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Instantiate the component registered under `name`.
    pub fn create(&self, name: &str, cfg: &Config, components: &ComponentRegistry) -> GenResult<Box<T>> {
        let ctor = self
            .ctors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .ok_or_else(|| GenError::UnknownType { family: self.family, name: name.to_string() })?;
        log::debug!("creating {} '{name}' from '{}'", self.family, cfg.path());
        ctor(cfg, components)
    }

    /// Instantiate the component named by the `"type"` key of `cfg`.
    pub fn create_from(&self, cfg: &Config, components: &ComponentRegistry) -> GenResult<Box<T>> {
        let name = cfg.type_name()?;
        self.create(&name, cfg, components)
    }
}

/// One registry per component family.
pub struct ComponentRegistry {
    pub vertex:         Registry<dyn VertexGenerator>,
    pub beam:           Registry<dyn ParticleGenerator>,
    pub target:         Registry<dyn ParticleGenerator>,
    pub photon:         Registry<dyn PhotonGenerator>,
    pub process:        Registry<dyn ProcessGenerator>,
    pub initial:        Registry<dyn InitialStateGenerator>,
    pub decay:          Registry<dyn DecayProcessor>,
    pub detector:       Registry<dyn DetectorSimulator>,
    pub reconstruction: Registry<dyn Reconstruction>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ComponentRegistry {
    /// Registries with nothing registered.
    pub fn empty() -> Self {
        Self {
            vertex:         Registry::new("vertex generator"),
            beam:           Registry::new("beam generator"),
            target:         Registry::new("target generator"),
            photon:         Registry::new("photon generator"),
            process:        Registry::new("process generator"),
            initial:        Registry::new("initial-state generator"),
            decay:          Registry::new("decay processor"),
            detector:       Registry::new("detector simulator"),
            reconstruction: Registry::new("reconstruction"),
        }
    }

    /// All built-in components, registered leaves first.
    pub fn builtin() -> Self {
        let reg = Self::empty();

        reg.vertex.register("origin", OriginVertex::create);
        reg.vertex.register("gaussian", GaussianVertex::create);
        reg.vertex.register("flat_z", FlatZVertex::create);

        reg.beam.register("constant", ConstantParticle::create_beam);
        reg.target.register("constant", ConstantParticle::create_target);

        reg.photon.register("beam", PhotonBeam::create);
        reg.photon.register("real", RealPhoton::create);
        reg.photon.register("virtual", VirtualPhoton::create);

        reg.process.register("exponential_t", ExponentialTProcess::create);

        reg.initial.register("photoproduction", PhotoproductionGenerator::create);

        reg.decay.register("vm_leptonic", TwoBodyDecay::create_vm_leptonic);
        reg.decay.register("two_body", TwoBodyDecay::create);

        reg.detector.register("perfect", PerfectDetector::create);
        reg.detector.register("acceptance", AcceptanceDetector::create);
        reg.detector.register("composite", CompositeDetector::create);

        reg.reconstruction.register("none", NoReconstruction::create);
        reg.reconstruction.register("require_detected", RequireDetected::create);

        reg
    }
}

/// The process-wide registry of built-in components.
pub fn global() -> &'static ComponentRegistry {
    static GLOBAL: OnceLock<ComponentRegistry> = OnceLock::new();
    GLOBAL.get_or_init(|| {
        log::info!("initialising global component registry");
        ComponentRegistry::builtin()
    })
}

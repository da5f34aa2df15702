//! The event record: an append-only particle arena plus weight metadata.
//!
//! RULES:
//!   - Particles are only ever appended; none is removed or reordered.
//!   - A daughter range is only widened by `add_daughter`, so every
//!     particle in `[begin, end)` lists the parent among its parents.
//!   - `cross_section` and `weight` are set when the event is created
//!     and afterwards only scaled by processing stages.

use crate::{
    generator::GeneratorData,
    particle::{Particle, Status},
    types::ParticleIndex,
};
use serde::{Deserialize, Serialize};

/// Named positions of the particles with a role in the reaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRoles {
    pub beam:      Option<ParticleIndex>,
    pub target:    Option<ParticleIndex>,
    pub scattered: Option<ParticleIndex>,
    pub photon:    Option<ParticleIndex>,
    pub leading:   Option<ParticleIndex>,
    pub recoil:    Option<ParticleIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    particles:         Vec<Particle>,
    pub cross_section: f64,
    pub weight:        f64,
    pub roles:         EventRoles,
    pub kinematics:    GeneratorData,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    pub fn new() -> Self {
        Self {
            particles:     Vec::new(),
            cross_section: 1.0,
            weight:        1.0,
            roles:         EventRoles::default(),
            kinematics:    GeneratorData::default(),
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn get(&self, index: ParticleIndex) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn particle(&self, index: ParticleIndex) -> &Particle {
        &self.particles[index]
    }

    /// Change a particle's status. The only in-place mutation allowed
    /// besides momentum updates by the generating stage.
    pub fn set_status(&mut self, index: ParticleIndex, status: Status) {
        self.particles[index].status = status;
    }

    /// Append a particle with no parents. Returns its index.
    pub fn add_particle(&mut self, mut particle: Particle) -> ParticleIndex {
        let index = self.particles.len();
        particle.index = index;
        particle.parents = [None, None];
        particle.daughters = (index, index);
        self.particles.push(particle);
        index
    }

    /// Append `particle` as a daughter of `parent` and widen the parent's
    /// daughter range to include it.
    ///
    /// Panics if the parent already has daughters that are not the
    /// immediately preceding particles: daughter ranges must stay
    /// contiguous.
    pub fn add_daughter(&mut self, parent: ParticleIndex, particle: Particle) -> ParticleIndex {
        self.add_daughter_of(&[parent], particle)
    }

    /// Append a daughter of one or two parents.
    pub fn add_daughter_of(&mut self, parents: &[ParticleIndex], mut particle: Particle) -> ParticleIndex {
        assert!(
            !parents.is_empty() && parents.len() <= 2,
            "a particle has one or two parents, got {}",
            parents.len()
        );
        let index = self.particles.len();
        for &parent in parents {
            assert!(parent < index, "parent {parent} does not exist yet");
            let (begin, end) = self.particles[parent].daughters;
            assert!(
                begin == end || end == index,
                "daughters of particle {parent} would become non-contiguous"
            );
            self.particles[parent].daughters =
                if begin == end { (index, index + 1) } else { (begin, index + 1) };
        }
        particle.index = index;
        particle.parents = [parents.first().copied(), parents.get(1).copied()];
        particle.daughters = (index, index);
        self.particles.push(particle);
        index
    }

    /// Append a record derived from `origin` (e.g. a detected copy)
    /// without registering it as a daughter.
    pub fn add_derived(&mut self, origin: ParticleIndex, mut particle: Particle) -> ParticleIndex {
        let index = self.particles.len();
        assert!(origin < index, "origin {origin} does not exist yet");
        particle.index = index;
        particle.parents = [Some(origin), None];
        particle.daughters = (index, index);
        self.particles.push(particle);
        index
    }

    pub fn daughters(&self, index: ParticleIndex) -> &[Particle] {
        let (begin, end) = self.particles[index].daughters;
        &self.particles[begin..end]
    }

    /// Indices of particles with the given status.
    pub fn indices_with_status(&self, status: Status) -> Vec<ParticleIndex> {
        self.particles
            .iter()
            .filter(|p| p.status == status)
            .map(|p| p.index)
            .collect()
    }

    /// The detected copy of `origin`, if a detector produced one.
    pub fn detected_copy_of(&self, origin: ParticleIndex) -> Option<ParticleIndex> {
        self.particles
            .iter()
            .skip(origin + 1)
            .find(|p| p.detector_id.is_some() && p.parents[0] == Some(origin))
            .map(|p| p.index)
    }

    pub fn detected(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.detector_id.is_some())
    }

    /// Scale both accumulators (branching ratios, acceptance factors).
    pub fn scale(&mut self, factor: f64) {
        self.cross_section *= factor;
        self.weight *= factor;
    }

    /// Every daughter lists its parent, and every index matches its slot.
    pub fn relations_consistent(&self) -> bool {
        self.particles.iter().enumerate().all(|(i, p)| {
            let (begin, end) = p.daughters;
            p.index == i
                && begin <= end
                && end <= self.particles.len()
                && (begin == end || begin > i)
                && self.particles[begin..end].iter().all(|d| d.has_parent(i))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str) -> Particle {
        Particle::named(name, Status::FinalState).unwrap()
    }

    #[test]
    fn daughters_extend_contiguously() {
        let mut event = Event::new();
        let parent = event.add_particle(part("J/psi"));
        let a = event.add_daughter(parent, part("e-"));
        let b = event.add_daughter(parent, part("e+"));
        assert_eq!((a, b), (1, 2));
        assert_eq!(event.particle(parent).daughters, (1, 3));
        assert_eq!(event.daughters(parent).len(), 2);
        assert!(event.relations_consistent());
    }

    #[test]
    fn two_parents_are_both_recorded() {
        let mut event = Event::new();
        let a = event.add_particle(part("e-"));
        let b = event.add_particle(part("p"));
        let c = event.add_daughter_of(&[a, b], part("gamma"));
        assert_eq!(event.particle(c).parent_codes(), [0, 1]);
        assert_eq!(event.particle(a).daughters, (2, 3));
        assert_eq!(event.particle(b).daughters, (2, 3));
        assert!(event.relations_consistent());
    }

    #[test]
    #[should_panic(expected = "non-contiguous")]
    fn interleaved_daughters_are_rejected() {
        let mut event = Event::new();
        let a = event.add_particle(part("phi"));
        let b = event.add_particle(part("phi"));
        event.add_daughter(a, part("K+"));
        event.add_daughter(b, part("K+"));
        event.add_daughter(a, part("K-"));
    }

    #[test]
    fn derived_records_do_not_touch_daughter_ranges() {
        let mut event = Event::new();
        let a = event.add_particle(part("p"));
        let mut copy = part("p");
        copy.detector_id = Some(3);
        let c = event.add_derived(a, copy);
        assert_eq!(event.particle(a).n_daughters(), 0);
        assert_eq!(event.detected_copy_of(a), Some(c));
        assert!(event.relations_consistent());
    }

    #[test]
    fn scaling_is_multiplicative() {
        let mut event = Event::new();
        event.cross_section = 4.0;
        event.scale(0.5);
        event.scale(0.25);
        assert_eq!(event.cross_section, 0.5);
        assert_eq!(event.weight, 0.125);
    }

    #[test]
    fn clone_copies_the_arena() {
        let mut event = Event::new();
        event.add_particle(part("p"));
        let copy = event.clone();
        event.add_particle(part("p"));
        assert_eq!(copy.len(), 1);
        assert_eq!(event.len(), 2);
    }
}

//! Arena invariants on fully built events.

use photogen_core::{
    config::Config,
    event::Event,
    output::MemorySink,
    particle::Status,
    pipeline::Pipeline,
    registry::ComponentRegistry,
};
use serde_json::json;

fn generate(beam: serde_json::Value, photon: serde_json::Value, n: u64) -> Vec<Event> {
    let registry = ComponentRegistry::builtin();
    let cfg = Config::new(json!({
        "seed": 11,
        "generator": {
            "mode": "weighted",
            "initial": {
                "type": "photoproduction",
                "beam": beam,
                "target": { "type": "constant", "particle": "p" },
                "photon": photon,
                "process": {
                    "type": "exponential_t", "recoil": "p", "leading": "J/psi",
                    "leading_status": "unstable_helicity", "b": 1.13, "sigma0": 1.0
                }
            },
            "decays": [{ "type": "vm_leptonic", "parent": "J/psi", "branching_ratio": 0.06 }],
            "detector": { "type": "perfect", "id": 4 }
        }
    }));
    let mut pipeline = Pipeline::build(&cfg, &registry).expect("pipeline");
    let mut sink = MemorySink::new();
    pipeline.run(n, &mut sink).expect("run");
    sink.events
}

fn assert_daughters_list_parent(event: &Event) {
    for (i, particle) in event.particles().iter().enumerate() {
        assert_eq!(particle.index, i);
        let (begin, end) = particle.daughters;
        for d in begin..end {
            assert!(
                event.particle(d).has_parent(i),
                "particle {d} is in the daughter range of {i} but does not list it"
            );
        }
    }
    assert!(event.relations_consistent());
}

#[test]
fn photon_beam_events() {
    for event in generate(
        json!({ "type": "constant", "particle": "gamma", "energy": 11.0 }),
        json!({ "type": "beam" }),
        300,
    ) {
        assert_daughters_list_parent(&event);
        let roles = event.roles;
        assert_eq!((roles.beam, roles.target, roles.photon), (Some(0), Some(1), Some(0)));
        assert_eq!((roles.recoil, roles.leading, roles.scattered), (Some(2), Some(3), None));

        // 2→2 momentum balance
        let before = event.particle(0).p + event.particle(1).p;
        let after = event.particle(2).p + event.particle(3).p;
        assert!((before.e - after.e).abs() < 1e-9 && (before.pz - after.pz).abs() < 1e-9);

        let jpsi = event.particle(3);
        assert_eq!(jpsi.status, Status::Decayed);
        assert_eq!(jpsi.daughters, (4, 6));
        assert_eq!(event.particle(4).parents, [Some(3), None]);
        assert!((event.cross_section - 0.06 * event.kinematics.cross_section).abs() < 1e-12);

        // perfect detector: recoil and both leptons
        let detected: Vec<_> = event.detected().map(|d| d.parents[0]).collect();
        assert_eq!(detected, vec![Some(2), Some(4), Some(5)]);
        assert!(event.detected().all(|d| d.status == Status::InfoOnly && d.detector_id == Some(4)));
    }
}

#[test]
fn electron_beam_events() {
    for event in generate(
        json!({ "type": "constant", "particle": "e-", "energy": 10.6 }),
        json!({ "type": "virtual", "q2_range": [0.05, 1.0], "y_range": [0.8, 0.98] }),
        200,
    ) {
        assert_daughters_list_parent(&event);
        let roles = event.roles;
        assert_eq!((roles.scattered, roles.photon), (Some(2), Some(3)));
        assert_eq!((roles.recoil, roles.leading), (Some(4), Some(5)));
        assert_eq!(event.particle(0).daughters, (2, 4));
        assert_eq!(event.particle(3).daughters, (4, 6));
        assert_eq!(event.particle(1).daughters, (4, 6));
        assert_eq!(event.particle(2).status, Status::Scattered);
        assert_eq!(event.particle(3).status, Status::InfoOnly);

        // lepton vertex: beam = scattered + photon
        let beam = event.particle(0).p;
        let sum = event.particle(2).p + event.particle(3).p;
        assert!((beam.e - sum.e).abs() < 1e-9 && (beam.pz - sum.pz).abs() < 1e-9);
        assert!(event.kinematics.q2 > 0.05 - 1e-9 && event.kinematics.q2 < 1.0 + 1e-9);
    }
}

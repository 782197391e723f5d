use approx::assert_relative_eq;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use seqjet::cluster_sequence::{ee_reconstruct, Algorithm, ClusterSequence, RecombinationScheme};
use seqjet::constants::LARGE_DIJ;
use seqjet::error::JetError;
use seqjet::history::HistoryElement;
use seqjet::pseudo_jet::PseudoJet;

fn cluster(
    particles: Vec<PseudoJet>,
    algorithm: Algorithm,
    p: Option<f64>,
    r: f64,
) -> Result<ClusterSequence, JetError> {
    ee_reconstruct(particles, algorithm, p, r, RecombinationScheme::EScheme, None)
}

/// Massless particle of energy `e` along the polar/azimuthal direction.
fn along(theta: f64, phi: f64, e: f64) -> PseudoJet {
    PseudoJet::new(
        e * theta.sin() * phi.cos(),
        e * theta.sin() * phi.sin(),
        e * theta.cos(),
        e,
    )
}

fn random_event(n: usize, seed: u64) -> Vec<PseudoJet> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let e = rng.gen_range(0.5..50.0);
            let cos_theta: f64 = rng.gen_range(-1.0..1.0);
            let theta = cos_theta.acos();
            let phi = rng.gen_range(0.0..std::f64::consts::TAU);
            along(theta, phi, e)
        })
        .collect()
}

fn merge_steps(history: &[HistoryElement], init_n: usize) -> Vec<&HistoryElement> {
    history[init_n..].iter().filter(|h| !h.is_beam_step()).collect()
}

fn beam_steps(history: &[HistoryElement], init_n: usize) -> Vec<&HistoryElement> {
    history[init_n..].iter().filter(|h| h.is_beam_step()).collect()
}

#[test]
fn durham_collinear_pair_merges_then_terminates() {
    let particles = vec![along(1.0, 0.0, 10.0), along(1.0, 0.0, 10.0)];
    let seq = cluster(particles, Algorithm::Durham, None, 4.0).unwrap();

    let merges = merge_steps(seq.history(), 2);
    let beams = beam_steps(seq.history(), 2);
    assert_eq!(merges.len(), 1);
    assert_eq!(beams.len(), 1);
    assert_relative_eq!(merges[0].dij, 0.0, epsilon = 1e-12);
    // the final lone jet terminates at the out-of-band distance
    assert_eq!(beams[0].dij, LARGE_DIJ);

    let inclusive = seq.inclusive_jets(0.0);
    assert_eq!(inclusive.len(), 1);
    assert_eq!(inclusive[0].e(), 20.0);
}

#[test]
fn durham_double_pair_merges_symmetrically_first() {
    // two tight pairs, the pairs back to back; the within-pair distances
    // are identical by construction
    let eps = 0.02;
    let particles = vec![
        along(eps, 0.0, 10.0),
        along(-eps, 0.0, 10.0),
        along(std::f64::consts::PI - eps, 0.0, 10.0),
        along(std::f64::consts::PI + eps, 0.0, 10.0),
    ];
    let seq = cluster(particles, Algorithm::Durham, None, 4.0).unwrap();

    let steps = &seq.history()[4..];
    assert_eq!(steps.len(), 4);
    // the two pair merges come first, at equal dij
    assert!(!steps[0].is_beam_step());
    assert!(!steps[1].is_beam_step());
    assert_relative_eq!(steps[0].dij, steps[1].dij, max_relative = 1e-9);
    let expected = 2.0 * 100.0 * (1.0 - (2.0 * eps).cos());
    assert_relative_eq!(steps[0].dij, expected, max_relative = 1e-9);

    // Durham has no beam distance, so the two remaining back-to-back jets
    // still merge before the final termination
    assert!(!steps[2].is_beam_step());
    assert!(steps[3].is_beam_step());
    assert_relative_eq!(seq.jets().last().unwrap().e(), 40.0, max_relative = 1e-12);
}

#[test]
fn durham_energy_is_conserved_through_every_merge() {
    let n = 40;
    let particles = random_event(n, 13);
    let seq = cluster(particles, Algorithm::Durham, None, 4.0).unwrap();

    for h in merge_steps(seq.history(), n) {
        let child = &seq.jets()[h.jet_index];
        let p1 = &seq.jets()[seq.history()[h.parent1].jet_index];
        let p2 = &seq.jets()[seq.history()[h.parent2].jet_index];
        assert_eq!(child.e(), p1.e() + p2.e());
    }
    // one termination, everything else merges
    assert_eq!(beam_steps(seq.history(), n).len(), 1);
    assert_eq!(merge_steps(seq.history(), n).len(), n - 1);
}

// Replays the history against a brute-force Durham metric.
#[test]
fn durham_takes_the_global_minimum_at_every_step() {
    let n = 25;
    let particles = random_event(n, 29);
    let seq = cluster(particles, Algorithm::Durham, None, 4.0).unwrap();

    let jets = seq.jets();
    let mut live: Vec<usize> = (0..n).collect();

    for h in &seq.history()[n..] {
        if h.is_beam_step() {
            assert_eq!(live.len(), 1);
            break;
        }
        let mut expected = f64::MAX;
        for (a, &i) in live.iter().enumerate() {
            for &j in live.iter().skip(a + 1) {
                let di = jets[i].direction();
                let dj = jets[j].direction();
                let ang = 1.0 - di.0 * dj.0 - di.1 * dj.1 - di.2 * dj.2;
                let e2 = (jets[i].e() * jets[i].e()).min(jets[j].e() * jets[j].e());
                expected = expected.min(2.0 * e2 * ang);
            }
        }
        assert_relative_eq!(h.dij, expected, max_relative = 1e-9);

        let gone1 = seq.history()[h.parent1].jet_index;
        let gone2 = seq.history()[h.parent2].jet_index;
        live.retain(|&i| i != gone1 && i != gone2);
        live.push(h.jet_index);
    }
}

#[test]
fn eekt_uses_the_wide_angle_factor_beyond_pi() {
    // R > pi selects the 1/(3 + cos R) normalisation
    let r: f64 = 3.5;
    let theta = 0.2;
    let particles = vec![along(0.0, 0.0, 10.0), along(theta, 0.0, 10.0)];
    let seq = cluster(particles, Algorithm::EEKt, Some(1.0), r).unwrap();

    let merges = merge_steps(seq.history(), 2);
    assert_eq!(merges.len(), 1);
    let expected = 100.0 * (1.0 - theta.cos()) / (3.0 + r.cos());
    assert_relative_eq!(merges[0].dij, expected, max_relative = 1e-9);

    // the merged jet then recombines with the beam at its own E^2p
    let beams = beam_steps(seq.history(), 2);
    assert_eq!(beams.len(), 1);
    assert_relative_eq!(beams[0].dij, 400.0, max_relative = 1e-9);
}

#[test]
fn eekt_sends_wide_pairs_to_the_beam_first() {
    // R < pi: a pair separated by more than R is beyond the beam threshold,
    // so both jets terminate without merging
    let r = 0.3;
    let particles = vec![along(0.3, 0.0, 10.0), along(1.3, 0.0, 8.0)];
    let seq = cluster(particles, Algorithm::EEKt, Some(1.0), r).unwrap();

    assert_eq!(merge_steps(seq.history(), 2).len(), 0);
    let beams = beam_steps(seq.history(), 2);
    assert_eq!(beams.len(), 2);
    // the softer jet has the smaller beam distance and goes first
    assert_relative_eq!(beams[0].dij, 64.0, max_relative = 1e-9);
    assert_relative_eq!(beams[1].dij, 100.0, max_relative = 1e-9);
}

#[test]
fn eekt_negative_power_prefers_hard_jets() {
    // p = -1 is the anti-kt analogue; it must run and terminate cleanly
    let n = 30;
    let particles = random_event(n, 37);
    let seq = cluster(particles, Algorithm::EEKt, Some(-1.0), 1.0).unwrap();

    let merges = merge_steps(seq.history(), n).len();
    let beams = beam_steps(seq.history(), n).len();
    assert_eq!(merges + beams, n);
    assert_eq!(seq.jets().len(), n + merges);
}

#[test]
fn ee_clustering_is_deterministic() {
    let particles = random_event(60, 41);
    let a = cluster(particles.clone(), Algorithm::Durham, None, 4.0).unwrap();
    let b = cluster(particles, Algorithm::Durham, None, 4.0).unwrap();

    assert_eq!(a.history().len(), b.history().len());
    for (ha, hb) in a.history().iter().zip(b.history()) {
        assert_eq!(ha.parent1, hb.parent1);
        assert_eq!(ha.parent2, hb.parent2);
        assert_eq!(ha.dij.to_bits(), hb.dij.to_bits());
    }
}

#[test]
fn single_particle_event_terminates_immediately() {
    let particles = vec![along(0.7, 0.1, 5.0)];
    let seq = cluster(particles, Algorithm::Durham, None, 4.0).unwrap();
    assert_eq!(seq.history().len(), 2);
    assert!(seq.history()[1].is_beam_step());
    assert_eq!(seq.inclusive_jets(0.0).len(), 1);
    assert_eq!(seq.qtot(), 5.0);
}

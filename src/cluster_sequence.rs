use log::{debug, warn};

use crate::constants::{KT2_FLOOR, KT2_OVERFLOW};
use crate::error::JetError;
use crate::history::{ClusterHistory, HistoryElement};
use crate::pseudo_jet::PseudoJet;

/// Members of the generalised-kT family. The first four run on the
/// (rapidity, phi) cylinder, the last two in e+e- direction space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Kt,
    AntiKt,
    Cambridge,
    GenKt,
    EEKt,
    Durham,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Kt => "kt",
            Algorithm::AntiKt => "anti-kt",
            Algorithm::Cambridge => "cambridge/aachen",
            Algorithm::GenKt => "genkt",
            Algorithm::EEKt => "ee-genkt",
            Algorithm::Durham => "durham",
        }
    }

    /// The power this algorithm pins down, if any; GenKt and EEKt leave it
    /// to the caller.
    pub fn fixed_power(&self) -> Option<f64> {
        match self {
            Algorithm::Kt | Algorithm::Durham => Some(1.0),
            Algorithm::AntiKt => Some(-1.0),
            Algorithm::Cambridge => Some(0.0),
            Algorithm::GenKt | Algorithm::EEKt => None,
        }
    }

    pub fn is_ee(&self) -> bool {
        matches!(self, Algorithm::EEKt | Algorithm::Durham)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Tiled O(N^1.5) strategy for hadron-collider geometry.
    N2Tiled,
    /// Plain O(N^2) structure-of-arrays strategy for e+e- geometry.
    N2PlainEE,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::N2Tiled => "tiled",
            Strategy::N2PlainEE => "plain-ee",
        }
    }
}

/// Binary recombination of two jets into one; the engine stamps the
/// cluster-history index on the result.
pub type RecombineFn = Box<dyn Fn(&PseudoJet, &PseudoJet) -> PseudoJet>;

/// How two jets are combined at a merge step.
pub enum RecombinationScheme {
    /// Plain four-vector addition.
    EScheme,
    /// Caller-supplied recombiner, applied at every merge step.
    Custom(RecombineFn),
}

impl std::fmt::Debug for RecombinationScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecombinationScheme::EScheme => write!(f, "EScheme"),
            RecombinationScheme::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Validated clustering configuration.
#[derive(Debug)]
pub struct JetDefinition {
    pub algorithm: Algorithm,
    pub r: f64,
    pub scheme: RecombinationScheme,
    pub strategy: Strategy,
    pub extra_param: Option<f64>,
}

impl JetDefinition {
    /// Checks the algorithm/power pairing and the algorithm/strategy
    /// pairing before anything is clustered. Durham pins R to 4.
    pub fn new(
        algorithm: Algorithm,
        r: f64,
        scheme: RecombinationScheme,
        strategy: Strategy,
        extra_param: Option<f64>,
    ) -> Result<Self, JetError> {
        match (algorithm.fixed_power(), extra_param) {
            (Some(fixed), Some(p)) if p != fixed => {
                return Err(JetError::InvalidPower {
                    algorithm: algorithm.name(),
                    expected: fixed,
                    got: p,
                })
            }
            (None, None) => return Err(JetError::MissingPower(algorithm.name())),
            _ => {}
        }

        if algorithm.is_ee() != (strategy == Strategy::N2PlainEE) {
            return Err(JetError::UnsupportedAlgorithm {
                algorithm: algorithm.name(),
                strategy: strategy.name(),
            });
        }

        let mut r = r;
        if algorithm == Algorithm::Durham && r != 4.0 {
            warn!("durham fixes R = 4, ignoring R = {r}");
            r = 4.0;
        }

        Ok(JetDefinition {
            algorithm,
            r,
            scheme,
            strategy,
            extra_param,
        })
    }

    /// The effective power p of the metric.
    pub fn power(&self) -> f64 {
        match self.algorithm.fixed_power() {
            Some(p) => p,
            None => self.extra_param.unwrap_or(0.0),
        }
    }

    pub fn recombine(&self, jet_a: &PseudoJet, jet_b: &PseudoJet) -> PseudoJet {
        match &self.scheme {
            RecombinationScheme::EScheme => jet_a + jet_b,
            RecombinationScheme::Custom(f) => f(jet_a, jet_b),
        }
    }
}

/// The result of clustering one event.
///
/// `jets` holds the inputs first, then every merged jet in creation order;
/// `history` records one entry per input plus one per step. Neither ever
/// shrinks, so history indices stay stable.
#[derive(Debug)]
pub struct ClusterSequence {
    pub(crate) jets: Vec<PseudoJet>,
    pub(crate) jetdef: JetDefinition,
    pub(crate) history: ClusterHistory,
    pub(crate) init_n: usize,
    pub(crate) r2: f64,
    pub(crate) invr2: f64,
}

/// Per-particle hook applied while the inputs are seeded into the engine's
/// jet type, before the history indices are assigned.
pub type PreprocessFn<'a> = &'a dyn Fn(&mut PseudoJet);

/// Clusters `particles` with a hadron-collider algorithm on the tiled
/// strategy and returns the finished sequence.
///
/// Pass [`RecombinationScheme::EScheme`] for plain four-vector addition and
/// `None` for `preprocess` when the inputs need no conversion beyond
/// `Into<PseudoJet>`.
pub fn tiled_reconstruct<P: Into<PseudoJet>>(
    particles: impl IntoIterator<Item = P>,
    algorithm: Algorithm,
    p: Option<f64>,
    r: f64,
    recombine: RecombinationScheme,
    preprocess: Option<PreprocessFn<'_>>,
) -> Result<ClusterSequence, JetError> {
    let jetdef = JetDefinition::new(algorithm, r, recombine, Strategy::N2Tiled, p)?;
    let mut seq = ClusterSequence::new(seed_particles(particles, preprocess), jetdef)?;
    seq.initialize_and_run()?;
    Ok(seq)
}

/// Clusters `particles` with an e+e- algorithm on the plain strategy and
/// returns the finished sequence. Durham ignores `r`.
///
/// `recombine` and `preprocess` behave as in [`tiled_reconstruct`].
pub fn ee_reconstruct<P: Into<PseudoJet>>(
    particles: impl IntoIterator<Item = P>,
    algorithm: Algorithm,
    p: Option<f64>,
    r: f64,
    recombine: RecombinationScheme,
    preprocess: Option<PreprocessFn<'_>>,
) -> Result<ClusterSequence, JetError> {
    let jetdef = JetDefinition::new(algorithm, r, recombine, Strategy::N2PlainEE, p)?;
    let mut seq = ClusterSequence::new(seed_particles(particles, preprocess), jetdef)?;
    seq.initialize_and_run()?;
    Ok(seq)
}

// Converts the caller's particles into engine jets, applying the optional
// per-particle hook.
fn seed_particles<P: Into<PseudoJet>>(
    particles: impl IntoIterator<Item = P>,
    preprocess: Option<PreprocessFn<'_>>,
) -> Vec<PseudoJet> {
    let mut jets: Vec<PseudoJet> = particles.into_iter().map(Into::into).collect();
    if let Some(f) = preprocess {
        for jet in &mut jets {
            f(jet);
        }
    }
    jets
}

impl ClusterSequence {
    /// Validates the event and seeds the history; no clustering happens
    /// until [`initialize_and_run`](Self::initialize_and_run).
    pub fn new(particles: Vec<PseudoJet>, jetdef: JetDefinition) -> Result<Self, JetError> {
        if particles.is_empty() {
            return Err(JetError::EmptyEvent);
        }
        for (index, p) in particles.iter().enumerate() {
            let finite =
                p.px().is_finite() && p.py().is_finite() && p.pz().is_finite() && p.e().is_finite();
            if !finite {
                return Err(JetError::NonFiniteInput { index });
            }
        }

        let r2 = jetdef.r * jetdef.r;
        let init_n = particles.len();
        let mut jets = particles;
        // merging can at most double the store
        jets.reserve(init_n);

        let mut history = ClusterHistory::with_capacity(init_n);
        for (i, jet) in jets.iter_mut().enumerate() {
            jet.set_cluster_hist_index(i);
            history.push_initial(i, jet.e());
        }

        Ok(ClusterSequence {
            jets,
            jetdef,
            history,
            init_n,
            r2,
            invr2: 1.0 / r2,
        })
    }

    /// Runs the strategy selected by the jet definition to completion.
    pub fn initialize_and_run(&mut self) -> Result<(), JetError> {
        debug!(
            "clustering {} particles: {} (p = {}, R = {}) on the {} strategy",
            self.init_n,
            self.jetdef.algorithm.name(),
            self.jetdef.power(),
            self.jetdef.r,
            self.jetdef.strategy.name()
        );
        match self.jetdef.strategy {
            Strategy::N2Tiled => {
                self.tiled_n2_cluster();
                Ok(())
            }
            Strategy::N2PlainEE => self.ee_n2_cluster(),
        }
    }

    // Beam scale of one jet under the active algorithm; this is kt^2 raised
    // to the metric power, with guards for degenerate transverse momenta.
    pub(crate) fn jet_scale(&self, jet: &PseudoJet) -> f64 {
        let kt2 = jet.kt2();
        match self.jetdef.algorithm {
            Algorithm::Kt => kt2,
            Algorithm::AntiKt => {
                if kt2 > KT2_FLOOR {
                    1.0 / kt2
                } else {
                    KT2_OVERFLOW
                }
            }
            Algorithm::Cambridge => 1.0,
            Algorithm::GenKt => {
                let p = self.jetdef.power();
                let kt2 = if p <= 0.0 && kt2 < KT2_FLOOR {
                    KT2_FLOOR
                } else {
                    kt2
                };
                kt2.powf(p)
            }
            Algorithm::EEKt | Algorithm::Durham => {
                unreachable!("ee algorithms use the plain strategy")
            }
        }
    }

    // Merges the stored jets `jet_a_idx` and `jet_b_idx`, appends the
    // result to the store and the step to the history, and returns the new
    // jet's store index.
    pub(crate) fn do_ij_recombination(
        &mut self,
        jet_a_idx: usize,
        jet_b_idx: usize,
        dij: f64,
    ) -> usize {
        let new_jet = self
            .jetdef
            .recombine(&self.jets[jet_a_idx], &self.jets[jet_b_idx]);
        self.jets.push(new_jet);
        let newjet_k = self.jets.len() - 1;

        let hist_a = self.jets[jet_a_idx].cluster_hist_index();
        let hist_b = self.jets[jet_b_idx].cluster_hist_index();
        let child = self.history.record_merge(hist_a, hist_b, newjet_k, dij);
        self.jets[newjet_k].set_cluster_hist_index(child);
        newjet_k
    }

    // Recombines the stored jet `jet_idx` with the beam.
    pub(crate) fn do_beam_recombination(&mut self, jet_idx: usize, dij: f64) {
        let hist = self.jets[jet_idx].cluster_hist_index();
        self.history.record_beam(hist, dij);
    }

    // ---------- observers ----------

    pub fn algorithm(&self) -> Algorithm {
        self.jetdef.algorithm
    }

    pub fn power(&self) -> f64 {
        self.jetdef.power()
    }

    pub fn r(&self) -> f64 {
        self.jetdef.r
    }

    pub fn strategy(&self) -> Strategy {
        self.jetdef.strategy
    }

    pub fn n_particles(&self) -> usize {
        self.init_n
    }

    /// Full jet store: the inputs followed by every merged jet.
    pub fn jets(&self) -> &[PseudoJet] {
        &self.jets
    }

    pub fn history(&self) -> &[HistoryElement] {
        self.history.steps()
    }

    /// Total visible energy of the event.
    pub fn qtot(&self) -> f64 {
        self.history.qtot()
    }

    /// Jets recombined with the beam, above a transverse-momentum cut.
    /// For kt the cut is applied to the termination dij instead, walking
    /// back only as far as the running maximum allows.
    pub fn inclusive_jets(&self, pt_min: f64) -> Vec<&PseudoJet> {
        let dcut = pt_min * pt_min;
        match self.jetdef.algorithm {
            Algorithm::Kt => self
                .history
                .steps()
                .iter()
                .rev()
                .take_while(|h| h.max_dij_so_far >= dcut)
                .filter_map(|h| {
                    if h.is_beam_step() && h.dij >= dcut {
                        Some(self.jet_of_history_entry(h.parent1))
                    } else {
                        None
                    }
                })
                .collect(),
            Algorithm::Cambridge => self
                .history
                .steps()
                .iter()
                .rev()
                .take_while(|h| h.is_beam_step())
                .filter_map(|h| {
                    let jet = self.jet_of_history_entry(h.parent1);
                    if jet.perp2() >= dcut {
                        Some(jet)
                    } else {
                        None
                    }
                })
                .collect(),
            Algorithm::AntiKt | Algorithm::GenKt | Algorithm::EEKt | Algorithm::Durham => self
                .history
                .steps()
                .iter()
                .rev()
                .filter_map(|h| {
                    if !h.is_beam_step() {
                        return None;
                    }
                    let jet = self.jet_of_history_entry(h.parent1);
                    if jet.perp2() >= dcut {
                        Some(jet)
                    } else {
                        None
                    }
                })
                .collect(),
        }
    }

    /// Number of jets that survive when clustering is stopped at `dcut`,
    /// capped at the event size.
    pub fn n_exclusive_jets(&self, dcut: f64) -> usize {
        // the count can cover the whole history (2n entries), which is more
        // than the jet store ever holds
        let above = self
            .history
            .steps()
            .iter()
            .rev()
            .take_while(|h| h.max_dij_so_far > dcut)
            .count()
            .min(self.jets.len());
        (2 * self.init_n - (self.jets.len() - above)).min(self.init_n)
    }

    pub fn exclusive_jets_dcut(&self, dcut: f64) -> Vec<&PseudoJet> {
        self.exclusive_jets(self.n_exclusive_jets(dcut))
    }

    /// The event clustered down to exactly `n_jets` jets.
    ///
    /// Panics when more jets are requested than the event has particles.
    pub fn exclusive_jets(&self, n_jets: usize) -> Vec<&PseudoJet> {
        if n_jets > self.init_n {
            panic!(
                "requesting {} exclusive jets from an event of {} particles",
                n_jets, self.init_n
            );
        }
        self.exclusive_jets_up_to(n_jets)
    }

    /// Like [`exclusive_jets`](Self::exclusive_jets) but silently capped at
    /// the number of particles.
    pub fn exclusive_jets_up_to(&self, n_jets: usize) -> Vec<&PseudoJet> {
        match self.jetdef.algorithm {
            Algorithm::Kt | Algorithm::Cambridge | Algorithm::GenKt | Algorithm::Durham => {}
            _ => warn!(
                "exclusive jets for {} should be interpreted with care",
                self.jetdef.algorithm.name()
            ),
        }

        // every merge removes one jet, so stopping after 2n - n_jets
        // history entries leaves n_jets of them
        let stop_idx = (2 * self.init_n - n_jets).max(self.init_n);

        let mut out = Vec::new();
        for h in self.history.steps().iter().skip(stop_idx) {
            if h.parent1 < stop_idx {
                out.push(self.jet_of_history_entry(h.parent1));
            }
            if h.parent2 < stop_idx {
                out.push(self.jet_of_history_entry(h.parent2));
            }
        }
        out
    }

    // The stored jet a history entry describes. Beam sentinels must be
    // filtered by the caller.
    fn jet_of_history_entry(&self, hist_idx: usize) -> &PseudoJet {
        debug_assert!(hist_idx < self.history.len(), "beam sentinel {hist_idx}");
        &self.jets[self.history.steps()[hist_idx].jet_index]
    }
}

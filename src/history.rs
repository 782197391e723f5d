use crate::constants::{BEAM_JET, INEXISTENT_PARENT, INVALID};

/// One step of the clustering history.
///
/// The first `n` entries describe the input particles; every later entry is
/// either a jet-jet merge or a recombination with the beam. `parent1` and
/// `parent2` are history indices with `parent1 <= parent2`; beam steps carry
/// `parent2 == BEAM_JET`. `jet_index` points into the jet store at the jet
/// created by this step (`INVALID` for beam steps).
#[derive(Debug, Clone)]
pub struct HistoryElement {
    pub parent1: usize,
    pub parent2: usize,
    pub child: usize,
    pub jet_index: usize,
    pub dij: f64,
    pub max_dij_so_far: f64,
}

impl HistoryElement {
    pub fn is_beam_step(&self) -> bool {
        self.parent2 == BEAM_JET
    }
}

/// Append-only recorder of merge and beam-termination steps.
///
/// Also owns the total visible energy of the event, fixed while seeding the
/// initial entries.
#[derive(Debug, Default)]
pub struct ClusterHistory {
    steps: Vec<HistoryElement>,
    qtot: f64,
}

impl ClusterHistory {
    /// Capacity hint: a full clustering of n particles writes 2n - 1 entries.
    pub fn with_capacity(n: usize) -> Self {
        ClusterHistory {
            steps: Vec::with_capacity(2 * n),
            qtot: 0.0,
        }
    }

    /// Seeds the entry for input particle `jet_index` and accumulates its
    /// energy into Qtot. Must precede any recorded step.
    pub fn push_initial(&mut self, jet_index: usize, energy: f64) {
        self.steps.push(HistoryElement {
            parent1: INEXISTENT_PARENT,
            parent2: INEXISTENT_PARENT,
            child: INVALID,
            jet_index,
            dij: 0.0,
            max_dij_so_far: 0.0,
        });
        self.qtot += energy;
    }

    /// Records the merge of the jets at history indices `hist_a` and
    /// `hist_b` into the stored jet `jet_index`. Returns the history index
    /// of the new step, which becomes the merged jet's
    /// `cluster_hist_index`.
    pub fn record_merge(&mut self, hist_a: usize, hist_b: usize, jet_index: usize, dij: f64) -> usize {
        let parent1 = hist_a.min(hist_b);
        let parent2 = hist_a.max(hist_b);
        self.push_step(parent1, parent2, jet_index, dij)
    }

    /// Records the recombination of the jet at history index `hist` with the
    /// beam.
    pub fn record_beam(&mut self, hist: usize, dij: f64) -> usize {
        self.push_step(hist, BEAM_JET, INVALID, dij)
    }

    fn push_step(&mut self, parent1: usize, parent2: usize, jet_index: usize, dij: f64) -> usize {
        let max_so_far = match self.steps.last() {
            Some(prev) => dij.max(prev.max_dij_so_far),
            None => dij,
        };
        self.steps.push(HistoryElement {
            parent1,
            parent2,
            child: INVALID,
            jet_index,
            dij,
            max_dij_so_far: max_so_far,
        });

        let child = self.steps.len() - 1;
        debug_assert_eq!(
            self.steps[parent1].child, INVALID,
            "history parent {parent1} merged twice"
        );
        self.steps[parent1].child = child;
        if parent2 != BEAM_JET {
            debug_assert_eq!(
                self.steps[parent2].child, INVALID,
                "history parent {parent2} merged twice"
            );
            self.steps[parent2].child = child;
        }
        child
    }

    pub fn steps(&self) -> &[HistoryElement] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total visible energy of the event.
    pub fn qtot(&self) -> f64 {
        self.qtot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_entries_accumulate_qtot() {
        let mut h = ClusterHistory::with_capacity(2);
        h.push_initial(0, 10.0);
        h.push_initial(1, 5.5);
        assert_eq!(h.qtot(), 15.5);
        assert_eq!(h.len(), 2);
        assert!(!h.steps()[0].is_beam_step());
    }

    #[test]
    fn merge_links_children_and_orders_parents() {
        let mut h = ClusterHistory::with_capacity(2);
        h.push_initial(0, 1.0);
        h.push_initial(1, 1.0);
        let child = h.record_merge(1, 0, 2, 0.25);
        assert_eq!(child, 2);
        assert_eq!(h.steps()[0].child, 2);
        assert_eq!(h.steps()[1].child, 2);
        assert_eq!(h.steps()[2].parent1, 0);
        assert_eq!(h.steps()[2].parent2, 1);
        assert_eq!(h.steps()[2].jet_index, 2);
    }

    #[test]
    fn beam_step_uses_sentinels() {
        let mut h = ClusterHistory::with_capacity(1);
        h.push_initial(0, 2.0);
        let child = h.record_beam(0, 0.5);
        assert!(h.steps()[child].is_beam_step());
        assert_eq!(h.steps()[child].jet_index, INVALID);
        assert_eq!(h.steps()[0].child, child);
    }

    #[test]
    fn running_maximum_tracks_largest_dij() {
        let mut h = ClusterHistory::with_capacity(3);
        for i in 0..3 {
            h.push_initial(i, 1.0);
        }
        h.record_merge(0, 1, 3, 2.0);
        h.record_merge(2, 3, 4, 0.5);
        assert_eq!(h.steps()[3].max_dij_so_far, 2.0);
        assert_eq!(h.steps()[4].max_dij_so_far, 2.0);
    }
}

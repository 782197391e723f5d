use crate::cluster_sequence::{Algorithm, ClusterSequence};
use crate::constants::{INVALID, LARGE_DIJ, LARGE_DISTANCE, PI};
use crate::error::JetError;
use crate::geometry::{angular, min_prefix};

/// `nni` value meaning the beam beats every pair distance for this slot.
pub(crate) const BEAM_SLOT: usize = usize::MAX;

/// Structure-of-arrays state for the e+e- strategy: one slot per live jet,
/// eight parallel columns. Slots are compacted from the back, so the live
/// set is always `0..len`.
pub(crate) struct EERecords {
    pub index: Vec<usize>,
    pub nni: Vec<usize>,
    pub nndist: Vec<f64>,
    pub dijdist: Vec<f64>,
    pub nx: Vec<f64>,
    pub ny: Vec<f64>,
    pub nz: Vec<f64>,
    pub e2p: Vec<f64>,
}

impl EERecords {
    fn with_capacity(n: usize) -> Self {
        EERecords {
            index: Vec::with_capacity(n),
            nni: Vec::with_capacity(n),
            nndist: Vec::with_capacity(n),
            dijdist: Vec::with_capacity(n),
            nx: Vec::with_capacity(n),
            ny: Vec::with_capacity(n),
            nz: Vec::with_capacity(n),
            e2p: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, index: usize, direction: (f64, f64, f64), e2p: f64) {
        let slot = self.index.len();
        self.index.push(index);
        self.nni.push(slot);
        self.nndist.push(LARGE_DISTANCE);
        self.dijdist.push(LARGE_DIJ);
        self.nx.push(direction.0);
        self.ny.push(direction.1);
        self.nz.push(direction.2);
        self.e2p.push(e2p);
    }

    /// Pure geometric distance 1 - cos(theta_ij) between two slots.
    #[inline]
    fn angular_dist(&self, i: usize, j: usize) -> f64 {
        angular(
            (self.nx[i], self.ny[i], self.nz[i]),
            (self.nx[j], self.ny[j], self.nz[j]),
        )
    }

    /// Writes a freshly merged jet over slot `slot`. The neighbour fields
    /// are placeholders; the caller must rescan the slot before the next
    /// minimum search.
    fn insert_new_jet(
        &mut self,
        slot: usize,
        index: usize,
        direction: (f64, f64, f64),
        e2p: f64,
        r2: f64,
    ) {
        self.index[slot] = index;
        self.nni[slot] = BEAM_SLOT;
        self.nndist[slot] = r2;
        self.nx[slot] = direction.0;
        self.ny[slot] = direction.1;
        self.nz[slot] = direction.2;
        self.e2p[slot] = e2p;
    }

    /// Moves slot `from` into slot `to`, all eight columns.
    fn copy_slot(&mut self, from: usize, to: usize) {
        self.index[to] = self.index[from];
        self.nni[to] = self.nni[from];
        self.nndist[to] = self.nndist[from];
        self.dijdist[to] = self.dijdist[from];
        self.nx[to] = self.nx[from];
        self.ny[to] = self.ny[from];
        self.nz[to] = self.nz[from];
        self.e2p[to] = self.e2p[from];
    }

    // Initial-pass update of slot i against all earlier slots, improving
    // both sides of every pair exactly once.
    fn set_nn_crosscheck(&mut self, i: usize) {
        let mut nn_dist = LARGE_DISTANCE;
        let mut nn = i;
        for j in 0..i {
            let d = self.angular_dist(i, j);
            if d < nn_dist {
                nn_dist = d;
                nn = j;
            }
            if d < self.nndist[j] {
                self.nndist[j] = d;
                self.nni[j] = i;
            }
        }
        self.nndist[i] = nn_dist;
        self.nni[i] = nn;
    }

    // Metric distance for slot i from its current geometric neighbour,
    // applying the beam clamp where the algorithm has one. A slot whose
    // scan found no partner gets the out-of-band large dij.
    fn finalise_dij(&mut self, i: usize, dij_factor: f64, beam_active: bool) {
        let j = self.nni[i];
        let mut d = if j == i {
            LARGE_DIJ
        } else {
            self.e2p[i].min(self.e2p[j]) * dij_factor * self.nndist[i]
        };
        if beam_active && self.e2p[i] < d {
            d = self.e2p[i];
            self.nni[i] = BEAM_SLOT;
        }
        self.dijdist[i] = d;
    }

    /// Rescans slot i against every live slot without touching the others.
    fn update_nn_no_cross(&mut self, i: usize, n_live: usize, dij_factor: f64, beam_active: bool) {
        let mut nn_dist = LARGE_DISTANCE;
        let mut nn = i;
        for j in 0..n_live {
            if j == i {
                continue;
            }
            let d = self.angular_dist(i, j);
            if d < nn_dist {
                nn_dist = d;
                nn = j;
            }
        }
        self.nndist[i] = nn_dist;
        self.nni[i] = nn;
        self.finalise_dij(i, dij_factor, beam_active);
    }

    /// Rescans slot i and lets every visited slot profit from i as a new
    /// neighbour, updating its metric distance on the spot.
    fn update_nn_cross(&mut self, i: usize, n_live: usize, dij_factor: f64, beam_active: bool) {
        let mut nn_dist = LARGE_DISTANCE;
        let mut nn = i;
        for j in 0..n_live {
            if j == i {
                continue;
            }
            let d = self.angular_dist(i, j);
            if d < nn_dist {
                nn_dist = d;
                nn = j;
            }
            if d < self.nndist[j] {
                self.nndist[j] = d;
                self.nni[j] = i;
                let mut dj = self.e2p[i].min(self.e2p[j]) * dij_factor * d;
                if beam_active && self.e2p[j] < dj {
                    dj = self.e2p[j];
                    self.nni[j] = BEAM_SLOT;
                }
                self.dijdist[j] = dj;
            }
        }
        self.nndist[i] = nn_dist;
        self.nni[i] = nn;
        self.finalise_dij(i, dij_factor, beam_active);
    }
}

// E^(2p); squared directly when p == 1 so Durham scales stay exact.
#[inline]
fn e2p(energy: f64, p: f64) -> f64 {
    if p == 1.0 {
        energy * energy
    } else {
        (energy * energy).powf(p)
    }
}

impl ClusterSequence {
    /// O(N^2) plain clustering in 3D direction space.
    pub(crate) fn ee_n2_cluster(&mut self) -> Result<(), JetError> {
        let n = self.init_n;
        let p = self.jetdef.power();
        let beam_active = self.jetdef.algorithm == Algorithm::EEKt;
        let r = self.jetdef.r;
        let dij_factor = match self.jetdef.algorithm {
            Algorithm::Durham => 2.0,
            Algorithm::EEKt => {
                if r < PI {
                    1.0 / (1.0 - r.cos())
                } else {
                    1.0 / (3.0 + r.cos())
                }
            }
            _ => unreachable!("pp algorithms use the tiled strategy"),
        };

        let mut rec = EERecords::with_capacity(n);
        for i in 0..n {
            let jet = &self.jets[i];
            rec.push(i, jet.direction(), e2p(jet.e(), p));
        }
        for i in 1..n {
            rec.set_nn_crosscheck(i);
        }
        for i in 0..n {
            rec.finalise_dij(i, dij_factor, beam_active);
        }
        self.ee_check_consistency(&rec, n)?;

        let mut n_live = n;
        for _ in 0..n {
            let (dij_min, mut ia) = min_prefix(&rec.dijdist, n_live);
            let mut ib = rec.nni[ia];

            if ib == BEAM_SLOT || ib == ia || n_live == 1 {
                self.do_beam_recombination(rec.index[ia], dij_min);
                ib = ia;
            } else {
                if ia > ib {
                    std::mem::swap(&mut ia, &mut ib);
                }
                let newjet_k =
                    self.do_ij_recombination(rec.index[ia], rec.index[ib], dij_min);
                let merged = &self.jets[newjet_k];
                let direction = merged.direction();
                let energy = merged.e();
                rec.insert_new_jet(ia, newjet_k, direction, e2p(energy, p), self.r2);
            }

            // squash: the vacated slot inherits the last live one
            let last = n_live - 1;
            if ib != last {
                rec.copy_slot(last, ib);
            }
            n_live -= 1;

            // neighbour repair: relabel references to the moved slot, rescan
            // anything that pointed at a consumed jet
            for i in 0..n_live {
                if ib != last && rec.nni[i] == last {
                    rec.nni[i] = ib;
                } else if rec.nni[i] == ia
                    || rec.nni[i] == ib
                    || (rec.nni[i] != BEAM_SLOT && rec.nni[i] >= n_live)
                {
                    rec.update_nn_no_cross(i, n_live, dij_factor, beam_active);
                }
            }

            if ia != ib {
                rec.update_nn_cross(ia, n_live, dij_factor, beam_active);
            }

            #[cfg(debug_assertions)]
            self.ee_check_consistency(&rec, n_live)?;
        }

        Ok(())
    }

    // Invariant sweep over the live slots: neighbour indices must stay in
    // range and no live jet may already have a child in the history.
    pub(crate) fn ee_check_consistency(
        &self,
        rec: &EERecords,
        n_live: usize,
    ) -> Result<(), JetError> {
        for i in 0..n_live {
            let nni = rec.nni[i];
            if nni != BEAM_SLOT && nni >= n_live {
                log::error!("slot {i} points at dead neighbour slot {nni} (live = {n_live})");
                return Err(JetError::CorruptedState(format!(
                    "slot {i} points at dead neighbour slot {nni}"
                )));
            }
            if nni == i && n_live > 1 {
                log::error!("slot {i} is its own neighbour with {n_live} live jets");
                return Err(JetError::CorruptedState(format!(
                    "slot {i} is its own neighbour"
                )));
            }
            let hist = self.jets[rec.index[i]].cluster_hist_index();
            if self.history.steps()[hist].child != INVALID {
                log::error!("live jet at slot {i} already has history child");
                return Err(JetError::CorruptedState(format!(
                    "live jet at slot {i} already has a history child"
                )));
            }
        }
        Ok(())
    }
}

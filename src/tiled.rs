use crate::cluster_sequence::ClusterSequence;
use crate::geometry::{dist_yphi, min_prefix};
use crate::tiling::{Tiling, TILE_UNION_CAPACITY};

/// Per-jet mutable state for the tiled strategy.
///
/// Jets live in an arena indexed by slot; `prev`/`next` chain the jets of
/// one tile, `nn` points at the current nearest neighbour, and `dij_posn`
/// is the back-index into the compact diJ array. A slot is never reused
/// for a different jet except that a merge writes the merged jet over the
/// slot of its lower-numbered parent.
pub(crate) struct TiledJet {
    pub eta: f64,
    pub phi: f64,
    pub kt2: f64,
    pub nn_dist: f64,
    pub nn: Option<usize>,
    pub prev: Option<usize>,
    pub next: Option<usize>,
    pub tile_index: usize,
    pub jets_index: usize,
    pub dij_posn: usize,
}

impl TiledJet {
    #[cfg(test)]
    pub fn placeholder(jets_index: usize) -> Self {
        TiledJet {
            eta: 0.0,
            phi: 0.0,
            kt2: 0.0,
            nn_dist: 0.0,
            nn: None,
            prev: None,
            next: None,
            tile_index: 0,
            jets_index,
            dij_posn: 0,
        }
    }
}

#[inline]
fn tj_dist(a: &TiledJet, b: &TiledJet) -> f64 {
    dist_yphi(a.eta, a.phi, b.eta, b.phi)
}

// diJ without the 1/R^2 normalisation; a jet without a neighbour keeps
// nn_dist == R^2, which makes this its beam distance.
#[inline]
fn tj_dij(jets: &[TiledJet], i: usize) -> f64 {
    let jet = &jets[i];
    let scale = match jet.nn {
        Some(nn) => jet.kt2.min(jets[nn].kt2),
        None => jet.kt2,
    };
    scale * jet.nn_dist
}

// Rescan of a single jet's 3x3 tile neighbourhood after its neighbour
// disappeared. Resets to "no neighbour within R" first.
fn tj_recompute_nn(tiling: &Tiling, jets: &mut [TiledJet], i: usize, r2: f64) {
    let mut nn_dist = r2;
    let mut nn = None;
    for &t in tiling.neighbourhood(jets[i].tile_index) {
        let mut walk = tiling.tiles[t].head;
        while let Some(j) = walk {
            walk = jets[j].next;
            if j == i {
                continue;
            }
            let d = tj_dist(&jets[i], &jets[j]);
            if d < nn_dist {
                nn_dist = d;
                nn = Some(j);
            }
        }
    }
    jets[i].nn_dist = nn_dist;
    jets[i].nn = nn;
}

impl ClusterSequence {
    /// O(N^1.5) tiled clustering on the (rapidity, phi) cylinder.
    ///
    /// Runs exactly `init_n` iterations; each one either merges the closest
    /// pair or recombines a jet with the beam, then repairs nearest
    /// neighbours across at most three 3x3 tile neighbourhoods.
    pub(crate) fn tiled_n2_cluster(&mut self) {
        let n = self.init_n;
        let mut tiling = Tiling::new(self.jetdef.r, &self.jets[..n]);

        let mut briefjets: Vec<TiledJet> = Vec::with_capacity(n);
        for i in 0..n {
            let jet = &self.jets[i];
            briefjets.push(TiledJet {
                eta: jet.rap(),
                phi: jet.phi(),
                kt2: self.jet_scale(jet),
                nn_dist: self.r2,
                nn: None,
                prev: None,
                next: None,
                tile_index: 0,
                jets_index: i,
                dij_posn: i,
            });
            let tile = tiling.tile_of(jet.rap(), jet.phi());
            tiling.insert_at_head(&mut briefjets, i, tile);
        }

        self.tiled_init_nn(&tiling, &mut briefjets);

        // compact arrays; briefjets[nns[k]].dij_posn == k for every live k
        let mut di_j: Vec<f64> = (0..n).map(|i| tj_dij(&briefjets, i)).collect();
        let mut nns: Vec<usize> = (0..n).collect();

        let mut tile_union = [0usize; TILE_UNION_CAPACITY];
        let mut n_live = n;

        for _ in 0..n {
            let (dij_min_raw, ibest) = min_prefix(&di_j, n_live);
            let dij_min = dij_min_raw * self.invr2;
            let mut a_slot = nns[ibest];

            let mut n_union = 0usize;
            let jet_b: Option<usize> = match briefjets[a_slot].nn {
                Some(mut b_slot) => {
                    // the merged jet reuses the lower slot
                    if a_slot < b_slot {
                        std::mem::swap(&mut a_slot, &mut b_slot);
                    }
                    let newjet_k = self.do_ij_recombination(
                        briefjets[a_slot].jets_index,
                        briefjets[b_slot].jets_index,
                        dij_min,
                    );

                    let a_tile = briefjets[a_slot].tile_index;
                    tiling.remove(&mut briefjets, a_slot);
                    let old_b_tile = briefjets[b_slot].tile_index;
                    tiling.remove(&mut briefjets, b_slot);
                    self.tj_set_jetinfo(&mut tiling, &mut briefjets, b_slot, newjet_k);

                    tiling.add_untagged_neighbours(a_tile, &mut tile_union, &mut n_union);
                    let b_tile = briefjets[b_slot].tile_index;
                    if b_tile != a_tile {
                        tiling.add_untagged_neighbours(b_tile, &mut tile_union, &mut n_union);
                    }
                    if old_b_tile != a_tile && old_b_tile != b_tile {
                        tiling.add_untagged_neighbours(old_b_tile, &mut tile_union, &mut n_union);
                    }
                    Some(b_slot)
                }
                None => {
                    // nothing within R: recombine with the beam
                    self.do_beam_recombination(briefjets[a_slot].jets_index, dij_min);
                    let a_tile = briefjets[a_slot].tile_index;
                    tiling.remove(&mut briefjets, a_slot);
                    tiling.add_untagged_neighbours(a_tile, &mut tile_union, &mut n_union);
                    None
                }
            };

            // retire A's compact slot by swapping in the last live entry
            n_live -= 1;
            let apos = briefjets[a_slot].dij_posn;
            di_j[apos] = di_j[n_live];
            nns[apos] = nns[n_live];
            briefjets[nns[apos]].dij_posn = apos;

            // repair NN relations over the affected tiles
            for k in 0..n_union {
                let t = tile_union[k];
                tiling.untag(t);
                let mut walk = tiling.tiles[t].head;
                while let Some(i_slot) = walk {
                    walk = briefjets[i_slot].next;

                    let lost_nn = briefjets[i_slot].nn == Some(a_slot)
                        || (jet_b.is_some() && briefjets[i_slot].nn == jet_b);
                    if lost_nn {
                        tj_recompute_nn(&tiling, &mut briefjets, i_slot, self.r2);
                        di_j[briefjets[i_slot].dij_posn] = tj_dij(&briefjets, i_slot);
                    }

                    if let Some(b_slot) = jet_b {
                        if i_slot != b_slot {
                            let d = tj_dist(&briefjets[i_slot], &briefjets[b_slot]);
                            if d < briefjets[i_slot].nn_dist {
                                briefjets[i_slot].nn_dist = d;
                                briefjets[i_slot].nn = Some(b_slot);
                                di_j[briefjets[i_slot].dij_posn] = tj_dij(&briefjets, i_slot);
                            }
                            if d < briefjets[b_slot].nn_dist {
                                briefjets[b_slot].nn_dist = d;
                                briefjets[b_slot].nn = Some(i_slot);
                            }
                        }
                    }
                }
            }

            if let Some(b_slot) = jet_b {
                di_j[briefjets[b_slot].dij_posn] = tj_dij(&briefjets, b_slot);
            }
        }
    }

    // One-shot initial NN pass. Within each tile every unordered pair is
    // visited once via the list order; across tiles only the right half of
    // the neighbourhood is scanned, so no pair is seen twice.
    fn tiled_init_nn(&self, tiling: &Tiling, briefjets: &mut [TiledJet]) {
        for t in 0..tiling.tiles.len() {
            let mut a = tiling.tiles[t].head;
            while let Some(ja) = a {
                let mut b = tiling.tiles[t].head;
                while b != a {
                    let jb = b.expect("tile list contains ja");
                    let d = tj_dist(&briefjets[ja], &briefjets[jb]);
                    if d < briefjets[ja].nn_dist {
                        briefjets[ja].nn_dist = d;
                        briefjets[ja].nn = Some(jb);
                    }
                    if d < briefjets[jb].nn_dist {
                        briefjets[jb].nn_dist = d;
                        briefjets[jb].nn = Some(ja);
                    }
                    b = briefjets[jb].next;
                }
                a = briefjets[ja].next;
            }

            for &rt in tiling.right_neighbours(t) {
                let mut a = tiling.tiles[t].head;
                while let Some(ja) = a {
                    let mut b = tiling.tiles[rt].head;
                    while let Some(jb) = b {
                        let d = tj_dist(&briefjets[ja], &briefjets[jb]);
                        if d < briefjets[ja].nn_dist {
                            briefjets[ja].nn_dist = d;
                            briefjets[ja].nn = Some(jb);
                        }
                        if d < briefjets[jb].nn_dist {
                            briefjets[jb].nn_dist = d;
                            briefjets[jb].nn = Some(ja);
                        }
                        b = briefjets[jb].next;
                    }
                    a = briefjets[ja].next;
                }
            }
        }
    }

    // Writes the merged jet's identity over a reused slot and files it in
    // its new tile.
    fn tj_set_jetinfo(
        &self,
        tiling: &mut Tiling,
        briefjets: &mut [TiledJet],
        slot: usize,
        jets_index: usize,
    ) {
        let jet = &self.jets[jets_index];
        briefjets[slot].eta = jet.rap();
        briefjets[slot].phi = jet.phi();
        briefjets[slot].kt2 = self.jet_scale(jet);
        briefjets[slot].jets_index = jets_index;
        briefjets[slot].nn = None;
        briefjets[slot].nn_dist = self.r2;
        let tile = tiling.tile_of(jet.rap(), jet.phi());
        tiling.insert_at_head(briefjets, slot, tile);
    }
}

use log::debug;

use crate::constants::TWO_PI;
use crate::pseudo_jet::PseudoJet;
use crate::tiled::TiledJet;

pub(crate) const N_TILE_NEIGHBOURS: usize = 9;
/// One iteration touches at most three 3x3 neighbourhoods.
pub(crate) const TILE_UNION_CAPACITY: usize = 3 * N_TILE_NEIGHBOURS;

/// One cell of the (rapidity, phi) grid.
///
/// `begin_tiles` lists the cell itself first, then the left half of its 3x3
/// neighbourhood, then the right half, so that
///
/// ```text
///           LRR
///           LXR
///           LLR
/// ```
///
/// the slice starting at `rh_begin` is exactly the set scanned by the
/// initial nearest-neighbour pass.
#[derive(Clone)]
pub(crate) struct Tile {
    pub head: Option<usize>,
    begin_tiles: [usize; N_TILE_NEIGHBOURS],
    n_tiles: usize,
    rh_begin: usize,
    tagged: bool,
}

impl Default for Tile {
    fn default() -> Self {
        Tile {
            head: None,
            begin_tiles: [0; N_TILE_NEIGHBOURS],
            n_tiles: 0,
            rh_begin: 0,
            tagged: false,
        }
    }
}

/// Fixed grid over (rapidity, phi) with intra-tile doubly-linked lists held
/// in an external arena of [`TiledJet`] records.
///
/// Tile edges are at least R long (phi wraps periodically, rapidity has
/// open-ended edge rows), so any pair closer than R lives inside one 3x3
/// neighbourhood.
pub(crate) struct Tiling {
    pub tiles: Vec<Tile>,
    tile_size_eta: f64,
    tile_size_phi: f64,
    n_tiles_phi: isize,
    ieta_min: isize,
    ieta_max: isize,
}

impl Tiling {
    pub fn new(r: f64, particles: &[PseudoJet]) -> Self {
        // bounded below so very small R cannot blow up the tile count
        let tile_size_eta = r.max(0.1);
        let n_tiles_phi = ((TWO_PI / tile_size_eta).floor() as isize).max(3);
        let tile_size_phi = TWO_PI / n_tiles_phi as f64;

        let (min_rap, max_rap) = rapidity_extent(particles);
        let ieta_min = (min_rap / tile_size_eta).floor() as isize;
        let ieta_max = (max_rap / tile_size_eta).floor() as isize;
        let n_rows = (ieta_max - ieta_min + 1) as usize;

        let mut tiling = Tiling {
            tiles: vec![Tile::default(); n_rows * n_tiles_phi as usize],
            tile_size_eta,
            tile_size_phi,
            n_tiles_phi,
            ieta_min,
            ieta_max,
        };

        for ieta in ieta_min..=ieta_max {
            for iphi in 0..n_tiles_phi {
                let mut begin_tiles = [0; N_TILE_NEIGHBOURS];
                let mut n = 0;
                begin_tiles[n] = tiling.tile_index(ieta, iphi);
                n += 1;
                if ieta > ieta_min {
                    for idphi in [-1, 0, 1] {
                        begin_tiles[n] = tiling.tile_index(ieta - 1, iphi + idphi);
                        n += 1;
                    }
                }
                begin_tiles[n] = tiling.tile_index(ieta, iphi - 1);
                n += 1;
                let rh_begin = n;
                begin_tiles[n] = tiling.tile_index(ieta, iphi + 1);
                n += 1;
                if ieta < ieta_max {
                    for idphi in [-1, 0, 1] {
                        begin_tiles[n] = tiling.tile_index(ieta + 1, iphi + idphi);
                        n += 1;
                    }
                }

                let tile = &mut tiling.tiles[begin_tiles[0]];
                tile.begin_tiles = begin_tiles;
                tile.n_tiles = n;
                tile.rh_begin = rh_begin;
            }
        }

        debug!(
            "tiling set up: {} x {} tiles of {:.3} x {:.3}, rapidity rows [{}, {}]",
            n_rows, n_tiles_phi, tile_size_eta, tile_size_phi, ieta_min, ieta_max
        );

        tiling
    }

    // phi wraps; eta rows are absolute and offset by ieta_min
    fn tile_index(&self, ieta: isize, iphi: isize) -> usize {
        ((ieta - self.ieta_min) * self.n_tiles_phi
            + ((iphi + self.n_tiles_phi) % self.n_tiles_phi)) as usize
    }

    /// Tile holding the point (eta, phi). Out-of-range rapidities land in
    /// the open-ended edge rows.
    pub fn tile_of(&self, eta: f64, phi: f64) -> usize {
        let ieta = ((eta / self.tile_size_eta).floor() as isize).clamp(self.ieta_min, self.ieta_max);
        let iphi = ((phi / self.tile_size_phi).floor() as isize).clamp(0, self.n_tiles_phi - 1);
        self.tile_index(ieta, iphi)
    }

    /// The tile itself plus its up-to-8 distinct neighbours.
    pub fn neighbourhood(&self, tile: usize) -> &[usize] {
        &self.tiles[tile].begin_tiles[..self.tiles[tile].n_tiles]
    }

    /// The right half of the neighbourhood, used by the initial NN pass so
    /// every unordered tile pair is visited exactly once.
    pub fn right_neighbours(&self, tile: usize) -> &[usize] {
        &self.tiles[tile].begin_tiles[self.tiles[tile].rh_begin..self.tiles[tile].n_tiles]
    }

    pub fn untag(&mut self, tile: usize) {
        self.tiles[tile].tagged = false;
    }

    /// Appends every untagged tile of `tile`'s neighbourhood to `union`,
    /// tagging as it goes. The caller must untag each stored tile before
    /// the iteration ends.
    pub fn add_untagged_neighbours(
        &mut self,
        tile: usize,
        union: &mut [usize; TILE_UNION_CAPACITY],
        n_union: &mut usize,
    ) {
        for k in 0..self.tiles[tile].n_tiles {
            let t = self.tiles[tile].begin_tiles[k];
            if !self.tiles[t].tagged {
                self.tiles[t].tagged = true;
                union[*n_union] = t;
                *n_union += 1;
            }
        }
    }

    /// Prepends jet `j` to `tile`'s list and records the tile on the jet.
    pub fn insert_at_head(&mut self, jets: &mut [TiledJet], j: usize, tile: usize) {
        let head = self.tiles[tile].head;
        jets[j].prev = None;
        jets[j].next = head;
        if let Some(h) = head {
            jets[h].prev = Some(j);
        }
        self.tiles[tile].head = Some(j);
        jets[j].tile_index = tile;
    }

    /// Unlinks jet `j` from its tile's list. The jet keeps its `tile_index`
    /// so the caller can still locate the neighbourhood it left.
    pub fn remove(&mut self, jets: &mut [TiledJet], j: usize) {
        let prev = jets[j].prev;
        let next = jets[j].next;
        match prev {
            None => self.tiles[jets[j].tile_index].head = next,
            Some(p) => jets[p].next = next,
        }
        if let Some(nx) = next {
            jets[nx].prev = prev;
        }
    }
}

// Rapidity range worth tiling, from a histogram of the input rapidities.
// Unit-width bins over [-20, 20) with overflow at the edges; the extremes
// are then pulled in so that no edge tile collects more than a fixed
// fraction of the busiest bin's population.
fn rapidity_extent(particles: &[PseudoJet]) -> (f64, f64) {
    const NRAP: isize = 20;
    const NBINS: usize = 40;
    const ALLOWED_MAX_FRACTION: f64 = 0.25;
    const MIN_MULTIPLICITY: f64 = 4.0;

    let mut min_rap = f64::MAX;
    let mut max_rap = -f64::MAX;
    let mut counts = [0usize; NBINS];

    for particle in particles {
        // particles along the beam have no useful rapidity
        if particle.e() == particle.pz().abs() {
            continue;
        }
        let rap = particle.rap();
        min_rap = min_rap.min(rap);
        max_rap = max_rap.max(rap);
        let ibin = (rap.floor() as isize + NRAP).clamp(0, NBINS as isize - 1) as usize;
        counts[ibin] += 1;
    }

    if min_rap > max_rap {
        // nothing contributed; any small range will do
        return (-1.0, 1.0);
    }

    let busiest = *counts.iter().max().unwrap() as f64;
    let allowed_max_cumul = MIN_MULTIPLICITY.max(busiest * ALLOWED_MAX_FRACTION).floor().min(busiest);

    let mut cumul = 0.0;
    for (i, &c) in counts.iter().enumerate() {
        cumul += c as f64;
        if cumul >= allowed_max_cumul {
            let y = (i as isize - NRAP) as f64;
            if y > min_rap {
                min_rap = y;
            }
            break;
        }
    }

    cumul = 0.0;
    for (i, &c) in counts.iter().enumerate().rev() {
        cumul += c as f64;
        if cumul >= allowed_max_cumul {
            let y = (i as isize - NRAP + 1) as f64;
            if y < max_rap {
                max_rap = y;
            }
            break;
        }
    }

    (min_rap, max_rap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread_event() -> Vec<PseudoJet> {
        let mut out = Vec::new();
        for i in 0..24 {
            let phi = 0.25 * i as f64;
            let eta = -2.0 + (i as f64) / 6.0;
            let px = phi.cos();
            let py = phi.sin();
            let pz = eta.sinh();
            let e = (1.0 + pz * pz).sqrt() + 0.1;
            out.push(PseudoJet::new(px, py, pz, e));
        }
        out
    }

    #[test]
    fn phi_always_has_at_least_three_tiles() {
        let particles = spread_event();
        let tiling = Tiling::new(3.0, &particles);
        // R = 3 would only fit two tiles around the circle; the floor is 3
        assert_eq!(tiling.n_tiles_phi, 3);
    }

    #[test]
    fn neighbourhood_of_an_interior_tile_has_nine_tiles() {
        let particles = spread_event();
        let tiling = Tiling::new(0.4, &particles);
        // pick a tile in a middle rapidity row
        let mid = tiling.tile_of(0.0, 3.0);
        assert_eq!(tiling.neighbourhood(mid).len(), 9);
        assert_eq!(tiling.right_neighbours(mid).len(), 4);
        assert_eq!(tiling.neighbourhood(mid)[0], mid);
    }

    #[test]
    fn neighbourhoods_wrap_in_phi() {
        let particles = spread_event();
        let tiling = Tiling::new(0.4, &particles);
        let near_seam = tiling.tile_of(0.0, 0.01);
        let other_side = tiling.tile_of(0.0, TWO_PI - 0.01);
        assert!(tiling.neighbourhood(near_seam).contains(&other_side));
    }

    #[test]
    fn right_neighbours_partition_unordered_tile_pairs() {
        let particles = spread_event();
        let tiling = Tiling::new(0.5, &particles);
        // for every tile pair (s, t) adjacent to each other, exactly one of
        // the two sees the other in its right half
        for s in 0..tiling.tiles.len() {
            for &t in tiling.neighbourhood(s) {
                if s == t {
                    continue;
                }
                let s_sees_t = tiling.right_neighbours(s).contains(&t);
                let t_sees_s = tiling.right_neighbours(t).contains(&s);
                assert!(
                    s_sees_t != t_sees_s,
                    "tiles {s} and {t} must appear in exactly one right half"
                );
            }
        }
    }

    #[test]
    fn extreme_rapidities_land_in_edge_rows() {
        let particles = spread_event();
        let tiling = Tiling::new(0.4, &particles);
        let lo = tiling.tile_of(-50.0, 1.0);
        let hi = tiling.tile_of(50.0, 1.0);
        assert!(lo < tiling.tiles.len());
        assert!(hi < tiling.tiles.len());
        assert_ne!(lo, hi);
    }

    #[test]
    fn list_insert_and_remove_maintain_links() {
        let particles = spread_event();
        let mut tiling = Tiling::new(0.4, &particles);
        let mut jets: Vec<TiledJet> = (0..3).map(|i| TiledJet::placeholder(i)).collect();
        let tile = tiling.tile_of(0.0, 1.0);

        for j in 0..3 {
            tiling.insert_at_head(&mut jets, j, tile);
        }
        // head is the last inserted
        assert_eq!(tiling.tiles[tile].head, Some(2));
        assert_eq!(jets[2].next, Some(1));
        assert_eq!(jets[1].prev, Some(2));

        tiling.remove(&mut jets, 1);
        assert_eq!(jets[2].next, Some(0));
        assert_eq!(jets[0].prev, Some(2));

        tiling.remove(&mut jets, 2);
        assert_eq!(tiling.tiles[tile].head, Some(0));
        assert_eq!(jets[0].prev, None);
    }
}

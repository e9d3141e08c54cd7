//! Greedy graph coloring into parallel phase sets.
//!
//! A phase is a set of mutually non-adjacent vertices; a downstream smoother
//! can process one phase with unguarded parallel writes. Two variants are
//! provided: a sequential one whose output is a pure function of the input
//! graph, and a speculative data-parallel one that produces a valid but
//! non-canonical partition.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use strata_core::{AdjacencyStore, ProgressCallback, Result, StrataError};

/// Byte value reserved for "not yet colored".
const INVALID_COLOR: u8 = 0xFF;

/// Hard ceiling on distinct colors. The color id is byte-encoded with `0xFF`
/// reserved, and id 254 is never allocated so the ceiling doubles as the
/// corrupt-input tripwire.
pub const MAX_COLORS: usize = 254;

/// Fixed seed for the vertex-order shuffles: the default stream state of the
/// PCG32 generator family.
const SHUFFLE_SEED: u64 = 0x853c_49e6_748f_ea9b;

/// Colors a graph sequentially after a seeded shuffle.
///
/// The result depends only on the input graph; thread count and scheduling
/// cannot perturb it, which makes this the variant of choice for
/// reproducible builds.
///
/// # Errors
/// [`StrataError::ColoringExhausted`] when more than [`MAX_COLORS`] colors
/// would be required.
pub fn generate_graph_coloring_deterministic(
    adj: &AdjacencyStore,
    progress: Option<ProgressCallback>,
) -> Result<Vec<Vec<u32>>> {
    let size = adj.vertex_count();
    if let Some(p) = progress {
        p("Graph coloring", 0.0);
    }

    let mut perm: Vec<u32> = (0..size as u32).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(SHUFFLE_SEED);
    perm.shuffle(&mut rng);

    let mut color = vec![INVALID_COLOR; size];
    let mut possible: Vec<bool> = Vec::new();
    let mut size_per_color: Vec<u32> = Vec::new();

    for (done, &ip) in perm.iter().enumerate() {
        if done % 8192 == 0 {
            if let Some(p) = progress {
                p("Graph coloring", done as f32 / size as f32);
            }
        }

        possible.iter_mut().for_each(|ok| *ok = true);
        for link in adj.neighbors(ip) {
            let c = color[link.id as usize];
            if c != INVALID_COLOR {
                possible[c as usize] = false;
            }
        }

        let chosen = match possible.iter().position(|&ok| ok) {
            Some(c) => c,
            None => {
                if possible.len() == MAX_COLORS {
                    return Err(StrataError::ColoringExhausted);
                }
                possible.push(false);
                size_per_color.push(0);
                possible.len() - 1
            }
        };
        color[ip as usize] = chosen as u8;
        size_per_color[chosen] += 1;
    }

    let phases = partition_by_color(&color, &size_per_color);
    log::info!("colored {} vertices into {} phases", size, phases.len());
    Ok(phases)
}

/// Per-worker color bookkeeping for the parallel variant: the number of
/// colors this worker has observed and the node tally per color.
struct ColorData {
    n_colors: usize,
    n_nodes: [u32; 256],
}

impl ColorData {
    fn new() -> Self {
        ColorData { n_colors: 0, n_nodes: [0; 256] }
    }

    fn merge(mut self, other: &ColorData) -> Self {
        self.n_colors = self.n_colors.max(other.n_colors);
        for c in 0..other.n_colors {
            self.n_nodes[c] += other.n_nodes[c];
        }
        self
    }
}

/// Colors a graph with speculative data parallelism.
///
/// Workers color disjoint shards of a shuffled vertex permutation while
/// holding per-vertex locks over the closed neighborhood of the vertex being
/// colored; locks are always acquired in ascending vertex-id order, so no
/// acquisition cycle can form. The resulting partition into phases is valid
/// but its color ids are not canonical.
///
/// # Errors
/// [`StrataError::ColoringExhausted`] when more than [`MAX_COLORS`] colors
/// would be required.
pub fn generate_graph_coloring(
    adj: &AdjacencyStore,
    grain_size: usize,
    progress: Option<ProgressCallback>,
) -> Result<Vec<Vec<u32>>> {
    let size = adj.vertex_count();
    let grain = grain_size.max(1);
    if let Some(p) = progress {
        p("Graph coloring", 0.0);
    }

    let locks: Vec<Mutex<()>> = (0..size).map(|_| Mutex::new(())).collect();
    let n_chunks = size.div_ceil(grain);

    // Shuffle the permutation in parallel. Each worker owns a contiguous
    // index range and draws swap partners from a stream advanced to the
    // range start; the pairwise swap takes both position locks in ascending
    // order.
    let perm: Vec<AtomicU32> = (0..size as u32).map(AtomicU32::new).collect();
    (0..n_chunks).into_par_iter().for_each(|chunk| {
        let begin = chunk * grain;
        let end = (begin + grain).min(size);
        let mut rng = ChaCha8Rng::seed_from_u64(SHUFFLE_SEED);
        rng.set_word_pos(begin as u128);
        for i in begin..end {
            let partner = rng.gen_range(i..size);
            if partner == i {
                continue;
            }
            let (j, k) = (i.min(partner), i.max(partner));
            let _lo = locks[j].lock();
            let _hi = locks[k].lock();
            let pj = perm[j].load(Ordering::Relaxed);
            perm[j].store(perm[k].load(Ordering::Relaxed), Ordering::Relaxed);
            perm[k].store(pj, Ordering::Relaxed);
        }
    });
    let perm: Vec<u32> = perm.into_iter().map(AtomicU32::into_inner).collect();

    let color: Vec<AtomicU8> = (0..size).map(|_| AtomicU8::new(INVALID_COLOR)).collect();

    let tallies: Vec<ColorData> = (0..n_chunks)
        .into_par_iter()
        .map(|chunk| -> Result<ColorData> {
            let mut data = ColorData::new();
            let mut neighborhood: Vec<u32> = Vec::new();
            let mut possible = [false; 256];
            let begin = chunk * grain;
            let end = (begin + grain).min(size);

            for &i in &perm[begin..end] {
                // Lock the closed neighborhood in ascending id order.
                neighborhood.clear();
                neighborhood.push(i);
                neighborhood.extend(adj.neighbors(i).iter().map(|l| l.id));
                neighborhood.sort_unstable();
                let _guards: Vec<_> = neighborhood
                    .iter()
                    .map(|&j| locks[j as usize].lock())
                    .collect();

                possible[..data.n_colors].fill(true);

                for link in adj.neighbors(i) {
                    let c = color[link.id as usize].load(Ordering::Relaxed);
                    if c != INVALID_COLOR {
                        // Another worker may have allocated colors this one
                        // has not seen yet; extend the local table lazily.
                        while c as usize >= data.n_colors {
                            possible[data.n_colors] = true;
                            data.n_nodes[data.n_colors] = 0;
                            data.n_colors += 1;
                        }
                        possible[c as usize] = false;
                    }
                }

                match possible[..data.n_colors].iter().position(|&ok| ok) {
                    Some(c) => {
                        data.n_nodes[c] += 1;
                        color[i as usize].store(c as u8, Ordering::Relaxed);
                    }
                    None => {
                        if data.n_colors == MAX_COLORS {
                            return Err(StrataError::ColoringExhausted);
                        }
                        data.n_nodes[data.n_colors] = 1;
                        color[i as usize].store(data.n_colors as u8, Ordering::Relaxed);
                        data.n_colors += 1;
                    }
                }
            }
            if let Some(p) = progress {
                p("Graph coloring", end as f32 / size as f32);
            }
            Ok(data)
        })
        .collect::<Result<Vec<_>>>()?;

    let tally = tallies
        .iter()
        .fold(ColorData::new(), |acc, data| acc.merge(data));

    let color: Vec<u8> = color.into_iter().map(AtomicU8::into_inner).collect();
    let phases = partition_by_color(&color, &tally.n_nodes[..tally.n_colors]);
    log::info!("colored {} vertices into {} phases", size, phases.len());
    Ok(phases)
}

/// Buckets vertex ids by their assigned color.
fn partition_by_color(color: &[u8], size_per_color: &[u32]) -> Vec<Vec<u32>> {
    let mut phases: Vec<Vec<u32>> = size_per_color
        .iter()
        .map(|&count| Vec::with_capacity(count as usize))
        .collect();
    for (i, &c) in color.iter().enumerate() {
        phases[c as usize].push(i as u32);
    }
    phases
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every edge must join two differently-colored vertices, and the phases
    /// must partition the vertex set.
    fn assert_valid_phases(adj: &AdjacencyStore, phases: &[Vec<u32>]) {
        let size = adj.vertex_count();
        let mut color = vec![usize::MAX; size];
        let mut seen = 0usize;
        for (c, phase) in phases.iter().enumerate() {
            for &i in phase {
                assert_eq!(color[i as usize], usize::MAX, "vertex {i} in two phases");
                color[i as usize] = c;
                seen += 1;
            }
        }
        assert_eq!(seen, size, "phases do not cover all vertices");
        for i in 0..size as u32 {
            for link in adj.neighbors(i) {
                assert_ne!(
                    color[i as usize], color[link.id as usize],
                    "edge ({i}, {}) is monochromatic",
                    link.id
                );
            }
        }
    }

    fn clique(n: u32) -> AdjacencyStore {
        let mut edges = Vec::new();
        for u in 0..n {
            for v in (u + 1)..n {
                edges.push((u, v, 1.0));
            }
        }
        AdjacencyStore::from_edges(n as usize, &edges).unwrap()
    }

    #[test]
    fn test_triangle_needs_three_colors() {
        let adj = clique(3);
        let phases = generate_graph_coloring_deterministic(&adj, None).unwrap();
        assert_eq!(phases.len(), 3);
        assert_valid_phases(&adj, &phases);

        let phases = generate_graph_coloring(&adj, 1, None).unwrap();
        assert_eq!(phases.len(), 3);
        assert_valid_phases(&adj, &phases);
    }

    #[test]
    fn test_chain_uses_two_colors() {
        let adj =
            AdjacencyStore::from_edges(4, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]).unwrap();
        let phases = generate_graph_coloring_deterministic(&adj, None).unwrap();
        assert_eq!(phases.len(), 2);
        assert_valid_phases(&adj, &phases);
    }

    #[test]
    fn test_isolated_vertices_share_one_color() {
        let adj = AdjacencyStore::from_edges(2, &[]).unwrap();
        let phases = generate_graph_coloring_deterministic(&adj, None).unwrap();
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].len(), 2);

        let phases = generate_graph_coloring(&adj, 1, None).unwrap();
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].len(), 2);
    }

    #[test]
    fn test_empty_graph() {
        let adj = AdjacencyStore::new();
        assert!(generate_graph_coloring_deterministic(&adj, None)
            .unwrap()
            .is_empty());
        assert!(generate_graph_coloring(&adj, 64, None).unwrap().is_empty());
    }

    #[test]
    fn test_deterministic_coloring_is_reproducible() {
        let adj = clique(40);
        let first = generate_graph_coloring_deterministic(&adj, None).unwrap();
        let second = generate_graph_coloring_deterministic(&adj, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parallel_coloring_valid_on_larger_graph() {
        // A 2D grid: 4-colorable greedily, plenty of lock contention with a
        // small grain.
        let side = 32u32;
        let mut edges = Vec::new();
        for y in 0..side {
            for x in 0..side {
                let i = y * side + x;
                if x + 1 < side {
                    edges.push((i, i + 1, 1.0));
                }
                if y + 1 < side {
                    edges.push((i, i + side, 1.0));
                }
            }
        }
        let adj = AdjacencyStore::from_edges((side * side) as usize, &edges).unwrap();
        let phases = generate_graph_coloring(&adj, 7, None).unwrap();
        assert_valid_phases(&adj, &phases);
        assert!(phases.len() <= 5);
    }

    #[test]
    fn test_coloring_exhausted_on_huge_clique() {
        let adj = clique(255);
        assert!(matches!(
            generate_graph_coloring_deterministic(&adj, None),
            Err(StrataError::ColoringExhausted)
        ));
        assert!(matches!(
            generate_graph_coloring(&adj, 64, None),
            Err(StrataError::ColoringExhausted)
        ));
    }

    #[test]
    fn test_clique_at_the_ceiling_still_colors() {
        let adj = clique(254);
        let phases = generate_graph_coloring_deterministic(&adj, None).unwrap();
        assert_eq!(phases.len(), 254);
        assert_valid_phases(&adj, &phases);
    }
}

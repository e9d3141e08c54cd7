//! One-level graph coarsening by greedy weighted matching.
//!
//! A coarsening step pairs up neighboring vertices with well-aligned normals
//! and comparable surface areas, merges each pair into a single coarse
//! vertex, and rebuilds the adjacency structure at the coarse level. Vertices
//! left without a partner are promoted unchanged.

use nalgebra::Vector3;
use rayon::prelude::*;
use strata_core::{AdjacencyStore, Link, ProgressCallback, INVALID, RCPOVERFLOW};

/// Output of a single coarsening step.
pub struct DownsampledLevel {
    /// Coarse vertex positions.
    pub positions: Vec<Vector3<f32>>,
    /// Coarse unit normals.
    pub normals: Vec<Vector3<f32>>,
    /// Coarse per-vertex surface areas.
    pub areas: Vec<f32>,
    /// Coarse weighted adjacency.
    pub adjacency: AdjacencyStore,
    /// For each coarse vertex, its one or two fine parents. The second slot
    /// is [`INVALID`] when the vertex was promoted unmatched.
    pub to_upper: Vec<[u32; 2]>,
    /// For each fine vertex, the coarse vertex that absorbed it.
    pub to_lower: Vec<u32>,
}

/// One scored candidate collapse, emitted per directed adjacency entry.
#[derive(Debug, Clone, Copy)]
struct Entry {
    i: u32,
    j: u32,
    score: f32,
}

/// Coarsens one hierarchy level.
///
/// The number of coarse vertices is `n - nCollapsed` where `nCollapsed` is
/// the size of the greedy matching; matched pairs occupy coarse indices
/// `[0, nCollapsed)` in match order and unmatched vertices follow in
/// ascending fine-index order.
///
/// `deterministic` selects a stable sort for the candidate ranking, making
/// the output a pure function of the input regardless of thread count. The
/// fast path uses an unstable sort and only guarantees a valid (not
/// canonical) coarsening.
pub fn downsample_graph(
    adj: &AdjacencyStore,
    positions: &[Vector3<f32>],
    normals: &[Vector3<f32>],
    areas: &[f32],
    deterministic: bool,
    grain_size: usize,
    progress: Option<ProgressCallback>,
) -> DownsampledLevel {
    let nv = positions.len();
    let grain = grain_size.max(1);
    debug_assert_eq!(adj.vertex_count(), nv);
    debug_assert_eq!(normals.len(), nv);
    debug_assert_eq!(areas.len(), nv);

    if let Some(p) = progress {
        p("Downsampling graph (1/6)", 0.0);
    }

    // Score every directed link: strong normal alignment scaled by the area
    // ratio of the endpoints. One entry per link, in link order.
    let mut entries: Vec<Entry> = (0..nv as u32)
        .into_par_iter()
        .with_min_len(grain)
        .flat_map_iter(|i| {
            adj.neighbors(i).iter().map(move |link| {
                let k = link.id as usize;
                let dp = normals[i as usize].dot(&normals[k]);
                let (ai, ak) = (areas[i as usize], areas[k]);
                let ratio = if ai > ak { ai / ak } else { ak / ai };
                Entry { i, j: link.id, score: dp * ratio }
            })
        })
        .collect();

    if let Some(p) = progress {
        p("Downsampling graph (2/6)", 0.0);
    }

    // Descending score. The stable sort is the reproducibility anchor of the
    // deterministic path; ties then resolve by link order.
    if deterministic {
        entries.par_sort_by(|a, b| b.score.total_cmp(&a.score));
    } else {
        entries.par_sort_unstable_by(|a, b| b.score.total_cmp(&a.score));
    }

    if let Some(p) = progress {
        p("Downsampling graph (3/6)", 0.0);
    }

    // Greedy matching over the ranked candidates. Intentionally serial:
    // determinism is then trivial, and the scan is cheap next to the sort.
    let mut matched = vec![false; nv];
    let mut to_upper: Vec<[u32; 2]> = Vec::new();
    for e in &entries {
        if matched[e.i as usize] || matched[e.j as usize] {
            continue;
        }
        matched[e.i as usize] = true;
        matched[e.j as usize] = true;
        to_upper.push([e.i, e.j]);
    }
    let n_collapsed = to_upper.len();
    drop(entries);

    // Unmatched fine vertices are promoted unchanged after the collapsed
    // block. The parallel filter preserves index order, so their coarse
    // indices ascend with the fine index on both paths.
    let unmatched: Vec<u32> = (0..nv as u32)
        .into_par_iter()
        .with_min_len(grain)
        .filter(|&i| !matched[i as usize])
        .collect();
    to_upper.extend(unmatched.iter().map(|&i| [i, INVALID]));

    let nv_p = to_upper.len();
    debug_assert_eq!(nv_p, nv - n_collapsed);

    if let Some(p) = progress {
        p("Downsampling graph (4/6)", 0.0);
    }

    let positions_p: Vec<Vector3<f32>> = to_upper
        .par_iter()
        .with_min_len(grain)
        .map(|&pair| merge_position(positions, areas, pair))
        .collect();
    let normals_p: Vec<Vector3<f32>> = to_upper
        .par_iter()
        .with_min_len(grain)
        .map(|&pair| merge_normal(normals, areas, pair))
        .collect();
    let areas_p: Vec<f32> = to_upper
        .par_iter()
        .with_min_len(grain)
        .map(|&[p, q]| {
            if q == INVALID {
                areas[p as usize]
            } else {
                areas[p as usize] + areas[q as usize]
            }
        })
        .collect();

    // Restriction map: the inverse of to_upper.
    let mut to_lower = vec![INVALID; nv];
    for (c, pair) in to_upper.iter().enumerate() {
        to_lower[pair[0] as usize] = c as u32;
        if pair[1] != INVALID {
            to_lower[pair[1] as usize] = c as u32;
        }
    }

    if let Some(p) = progress {
        p("Downsampling graph (5/6)", 0.0);
    }

    // Coarse adjacency, pass 1: per-vertex neighbor counts after projection
    // through to_lower, self-references and duplicates removed.
    let counts: Vec<u32> = (0..nv_p)
        .into_par_iter()
        .with_min_len(grain)
        .map_with(Vec::new(), |scratch: &mut Vec<Link>, c| {
            gather_coarse_links(adj, to_upper[c], &to_lower, scratch);
            let mut id = INVALID;
            let mut count = 0u32;
            for link in scratch.iter() {
                if link.id != id && link.id != c as u32 {
                    id = link.id;
                    count += 1;
                }
            }
            count
        })
        .collect();

    let mut offsets = vec![0u32; nv_p + 1];
    for (i, &count) in counts.iter().enumerate() {
        offsets[i + 1] = offsets[i] + count;
    }
    let n_links_p = offsets[nv_p] as usize;

    if let Some(p) = progress {
        p("Downsampling graph (6/6)", 0.0);
    }

    // Pass 2: fill. The link array is pre-partitioned into per-vertex
    // windows so each coarse vertex writes only its own slice.
    let mut links = vec![Link::new(INVALID, 0.0); n_links_p];
    let mut slices: Vec<&mut [Link]> = Vec::with_capacity(nv_p);
    let mut rest: &mut [Link] = &mut links;
    for c in 0..nv_p {
        let len = (offsets[c + 1] - offsets[c]) as usize;
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
        slices.push(head);
        rest = tail;
    }

    slices
        .into_par_iter()
        .enumerate()
        .with_min_len(grain)
        .for_each_with(Vec::new(), |scratch: &mut Vec<Link>, (c, dest)| {
            gather_coarse_links(adj, to_upper[c], &to_lower, scratch);
            let mut id = INVALID;
            let mut out = 0usize;
            for link in scratch.iter() {
                if link.id == c as u32 {
                    continue;
                }
                if link.id != id {
                    dest[out] = *link;
                    id = link.id;
                    out += 1;
                } else {
                    // Parallel edges fold into one coarse link.
                    dest[out - 1].weight += link.weight;
                }
            }
            debug_assert_eq!(out, dest.len());
        });

    log::info!("downsampled {} -> {} vertices ({} collapsed)", nv, nv_p, n_collapsed);

    DownsampledLevel {
        positions: positions_p,
        normals: normals_p,
        areas: areas_p,
        adjacency: AdjacencyStore::from_parts(offsets, links),
        to_upper,
        to_lower,
    }
}

/// Area-weighted position merge, falling back to the unweighted midpoint
/// when the combined area underflows.
fn merge_position(positions: &[Vector3<f32>], areas: &[f32], pair: [u32; 2]) -> Vector3<f32> {
    let p = pair[0] as usize;
    if pair[1] == INVALID {
        return positions[p];
    }
    let q = pair[1] as usize;
    let (a0, a1) = (areas[p], areas[q]);
    let area = a0 + a1;
    if area > RCPOVERFLOW {
        (positions[p] * a0 + positions[q] * a1) / area
    } else {
        (positions[p] + positions[q]) * 0.5
    }
}

/// Area-weighted normal merge, falling back to the first coordinate axis
/// when the weighted sum is degenerate.
fn merge_normal(normals: &[Vector3<f32>], areas: &[f32], pair: [u32; 2]) -> Vector3<f32> {
    let p = pair[0] as usize;
    if pair[1] == INVALID {
        return normals[p];
    }
    let q = pair[1] as usize;
    let combined = normals[p] * areas[p] + normals[q] * areas[q];
    let norm = combined.norm();
    if norm > RCPOVERFLOW {
        combined / norm
    } else {
        Vector3::x()
    }
}

/// Collects both parents' neighborhoods projected through `to_lower`,
/// sorted by coarse neighbor id.
fn gather_coarse_links(
    adj: &AdjacencyStore,
    pair: [u32; 2],
    to_lower: &[u32],
    scratch: &mut Vec<Link>,
) {
    scratch.clear();
    for &parent in &pair {
        if parent == INVALID {
            continue;
        }
        for link in adj.neighbors(parent) {
            scratch.push(Link::new(to_lower[link.id as usize], link.weight));
        }
    }
    scratch.sort_unstable_by_key(|l| l.id);
}

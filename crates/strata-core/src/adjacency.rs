//! Packed CSR-style weighted adjacency storage.
//!
//! One [`AdjacencyStore`] holds the weighted neighborhood structure of a
//! single hierarchy level as two flat arrays: a `links` array with one
//! [`Link`] record per directed adjacency entry, and an `offsets` table such
//! that vertex `i`'s links occupy `links[offsets[i]..offsets[i + 1]]`.

use crate::errors::{Result, StrataError};

/// Size in bytes every [`Link`] record must occupy.
///
/// Hierarchy construction verifies this packing at startup; a mismatch means
/// the adjacency arrays cannot be shared with collaborators that rely on the
/// 12-byte stride.
pub const LINK_RECORD_SIZE: usize = 12;

/// A single weighted adjacency entry.
///
/// The record is packed to exactly [`LINK_RECORD_SIZE`] bytes: a 32-bit
/// neighbor id followed by an 8-byte payload holding the scalar weight and an
/// ancillary connectivity word.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    /// Neighbor vertex id.
    pub id: u32,
    /// Scalar edge weight.
    pub weight: f32,
    /// Ancillary per-edge connectivity payload. Opaque to the hierarchy
    /// itself; zero for links synthesized during coarsening. Level-0
    /// producers may populate it for downstream consumers.
    pub ivar: u32,
}

impl Link {
    /// Creates a link with a zeroed ancillary payload.
    pub fn new(id: u32, weight: f32) -> Self {
        Link { id, weight, ivar: 0 }
    }
}

/// Packed weighted adjacency for one hierarchy level.
///
/// Invariants maintained by every constructor:
/// - `offsets.len() == vertex_count() + 1`, `offsets[0] == 0`, offsets are
///   non-decreasing, and `offsets[vertex_count()] == links.len()`
/// - no link points at its own vertex
/// - within one vertex's slice, every neighbor id appears at most once
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyStore {
    offsets: Vec<u32>,
    links: Vec<Link>,
}

impl AdjacencyStore {
    /// Creates an empty store with zero vertices.
    pub fn new() -> Self {
        AdjacencyStore { offsets: vec![0], links: Vec::new() }
    }

    /// Assembles a store from a pre-built offset table and link array.
    ///
    /// The caller must supply a well-formed CSR layout (see the type-level
    /// invariants); this is checked in debug builds only. Producers that
    /// cannot guarantee well-formedness should go through [`from_edges`]
    /// instead.
    ///
    /// [`from_edges`]: AdjacencyStore::from_edges
    pub fn from_parts(offsets: Vec<u32>, links: Vec<Link>) -> Self {
        debug_assert!(!offsets.is_empty());
        debug_assert_eq!(offsets[0], 0);
        debug_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        debug_assert_eq!(*offsets.last().unwrap() as usize, links.len());
        AdjacencyStore { offsets, links }
    }

    /// Builds a symmetric store from an undirected edge list.
    ///
    /// Every edge `(u, v, w)` produces both directed links. Duplicate edges
    /// are merged by weight summation. Self-loops and out-of-range endpoints
    /// are rejected.
    pub fn from_edges(vertex_count: usize, edges: &[(u32, u32, f32)]) -> Result<Self> {
        let mut rows: Vec<Vec<Link>> = vec![Vec::new(); vertex_count];
        for &(u, v, w) in edges {
            if u as usize >= vertex_count || v as usize >= vertex_count {
                return Err(StrataError::invalid_input(format!(
                    "edge ({u}, {v}) references a vertex outside 0..{vertex_count}"
                )));
            }
            if u == v {
                return Err(StrataError::invalid_input(format!(
                    "self-loop on vertex {u} is not a valid adjacency entry"
                )));
            }
            rows[u as usize].push(Link::new(v, w));
            rows[v as usize].push(Link::new(u, w));
        }

        let mut offsets = Vec::with_capacity(vertex_count + 1);
        let mut links: Vec<Link> = Vec::new();
        offsets.push(0u32);
        for row in &mut rows {
            row.sort_unstable_by_key(|l| l.id);
            let mut last = None;
            for link in row.iter() {
                if last == Some(link.id) {
                    if let Some(merged) = links.last_mut() {
                        merged.weight += link.weight;
                    }
                } else {
                    links.push(*link);
                    last = Some(link.id);
                }
            }
            offsets.push(links.len() as u32);
        }
        Ok(AdjacencyStore { offsets, links })
    }

    /// Number of vertices in this level.
    pub fn vertex_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of directed links (twice the undirected edge count).
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// The weighted neighborhood of vertex `i`.
    pub fn neighbors(&self, i: u32) -> &[Link] {
        let lo = self.offsets[i as usize] as usize;
        let hi = self.offsets[i as usize + 1] as usize;
        &self.links[lo..hi]
    }

    /// Degree of vertex `i`.
    pub fn degree(&self, i: u32) -> usize {
        (self.offsets[i as usize + 1] - self.offsets[i as usize]) as usize
    }

    /// The raw offset table (`vertex_count() + 1` entries).
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// The raw link array.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Bytes held by the backing arrays, for memory statistics.
    pub fn memory_bytes(&self) -> usize {
        self.links.len() * std::mem::size_of::<Link>()
            + self.offsets.len() * std::mem::size_of::<u32>()
    }
}

impl Default for AdjacencyStore {
    fn default() -> Self {
        Self::new()
    }
}

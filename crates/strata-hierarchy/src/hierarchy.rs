//! The multi-resolution level stack: construction, ownership, accessors.

use nalgebra::Vector3;
use serde::Serialize;
use std::fmt;
use strata_core::{
    AdjacencyStore, Link, ProgressCallback, Result, StrataError, LINK_RECORD_SIZE,
};

use crate::coloring;
use crate::config::HierarchyConfig;
use crate::downsample::downsample_graph;
use crate::field;

/// A stack of successively coarser weighted graphs derived from a triangle
/// mesh or oriented point cloud, with per-level parallel phase sets and
/// inter-level prolongation/restriction maps.
///
/// The hierarchy exclusively owns every per-level array. Lifecycle:
/// constructed empty, populated by [`set_input`] and [`build`], reusable
/// after [`free`].
///
/// [`set_input`]: MultiResolutionHierarchy::set_input
/// [`build`]: MultiResolutionHierarchy::build
/// [`free`]: MultiResolutionHierarchy::free
pub struct MultiResolutionHierarchy {
    pub(crate) config: HierarchyConfig,

    pub(crate) v: Vec<Vec<Vector3<f32>>>,
    pub(crate) n: Vec<Vec<Vector3<f32>>>,
    pub(crate) a: Vec<Vec<f32>>,
    pub(crate) adj: Vec<AdjacencyStore>,

    pub(crate) q: Vec<Vec<Vector3<f32>>>,
    pub(crate) o: Vec<Vec<Vector3<f32>>>,

    pub(crate) cq: Vec<Vec<Vector3<f32>>>,
    pub(crate) cqw: Vec<Vec<f32>>,
    pub(crate) co: Vec<Vec<Vector3<f32>>>,
    pub(crate) cow: Vec<Vec<f32>>,

    pub(crate) to_upper: Vec<Vec<[u32; 2]>>,
    pub(crate) to_lower: Vec<Vec<u32>>,
    pub(crate) phases: Vec<Vec<Vec<u32>>>,

    pub(crate) scale: f32,
    pub(crate) total_size: usize,
    pub(crate) frozen_q: bool,
    pub(crate) frozen_o: bool,
}

impl MultiResolutionHierarchy {
    /// Creates an empty hierarchy.
    ///
    /// # Errors
    /// [`StrataError::InvariantViolation`] when [`Link`] records are not
    /// packed to [`LINK_RECORD_SIZE`] bytes, [`StrataError::InvalidInput`]
    /// when the configuration is out of range.
    pub fn new(config: HierarchyConfig) -> Result<Self> {
        if std::mem::size_of::<Link>() != LINK_RECORD_SIZE {
            return Err(StrataError::invariant(
                "adjacency link records are not packed to 12 bytes; investigate compiler settings",
            ));
        }
        config.validate()?;
        let depth = config.max_depth;
        Ok(MultiResolutionHierarchy {
            config,
            v: Vec::with_capacity(depth + 1),
            n: Vec::with_capacity(depth + 1),
            a: Vec::with_capacity(depth + 1),
            adj: Vec::with_capacity(depth + 1),
            q: Vec::new(),
            o: Vec::new(),
            cq: Vec::with_capacity(depth + 1),
            cqw: Vec::with_capacity(depth + 1),
            co: Vec::with_capacity(depth + 1),
            cow: Vec::with_capacity(depth + 1),
            to_upper: Vec::with_capacity(depth),
            to_lower: Vec::with_capacity(depth),
            phases: Vec::with_capacity(depth + 1),
            scale: 0.0,
            total_size: 0,
            frozen_q: false,
            frozen_o: false,
        })
    }

    /// Installs the finest-level data. Any previously built levels are
    /// released.
    ///
    /// # Errors
    /// [`StrataError::InvalidInput`] when the input is empty, the array
    /// lengths disagree, or a normal is not unit length.
    pub fn set_input(
        &mut self,
        positions: Vec<Vector3<f32>>,
        normals: Vec<Vector3<f32>>,
        areas: Vec<f32>,
        adjacency: AdjacencyStore,
    ) -> Result<()> {
        let count = positions.len();
        if count == 0 {
            return Err(StrataError::invalid_input("level-0 input is empty"));
        }
        if normals.len() != count || areas.len() != count || adjacency.vertex_count() != count {
            return Err(StrataError::invalid_input(format!(
                "level-0 array lengths disagree: {} positions, {} normals, {} areas, {} adjacency rows",
                count,
                normals.len(),
                areas.len(),
                adjacency.vertex_count()
            )));
        }
        if let Some(bad) = normals.iter().position(|n| (n.norm() - 1.0).abs() > 1e-3) {
            return Err(StrataError::invalid_input(format!(
                "normal {bad} is not unit length"
            )));
        }

        self.free();
        self.v.push(positions);
        self.n.push(normals);
        self.a.push(areas);
        self.adj.push(adjacency);
        Ok(())
    }

    /// Builds the full level stack: colors level 0, then repeatedly
    /// downsamples and colors until a single-vertex level appears or
    /// `max_depth` coarsening steps have run.
    ///
    /// With `deterministic` set, the entire construction is a pure function
    /// of the level-0 input; otherwise phase partitions and coarse-index
    /// assignment may vary between runs.
    pub fn build(
        &mut self,
        deterministic: bool,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        if self.adj.is_empty() {
            return Err(StrataError::invalid_input(
                "no level-0 input; call set_input first",
            ));
        }

        // Rebuild support: drop everything derived from level 0.
        self.v.truncate(1);
        self.n.truncate(1);
        self.a.truncate(1);
        self.adj.truncate(1);
        self.q.clear();
        self.o.clear();
        self.cq.clear();
        self.cqw.clear();
        self.co.clear();
        self.cow.clear();
        self.to_upper.clear();
        self.to_lower.clear();
        self.phases.clear();

        log::info!("processing level 0 ({} vertices)", self.size(0));
        let phases = self.color_level(0, deterministic, progress)?;
        self.phases.push(phases);
        self.total_size = self.size(0);
        self.push_empty_constraint_level();

        log::info!("building multiresolution hierarchy");
        for _ in 0..self.config.max_depth {
            let l = self.levels() - 1;
            let next = downsample_graph(
                &self.adj[l],
                &self.v[l],
                &self.n[l],
                &self.a[l],
                deterministic,
                self.config.grain_size,
                progress,
            );

            self.v.push(next.positions);
            self.n.push(next.normals);
            self.a.push(next.areas);
            self.adj.push(next.adjacency);
            self.to_upper.push(next.to_upper);
            self.to_lower.push(next.to_lower);

            let coarse = self.levels() - 1;
            let phases = self.color_level(coarse, deterministic, progress)?;
            self.phases.push(phases);
            self.total_size += self.size(coarse);
            self.push_empty_constraint_level();

            if self.size(coarse) == 1 {
                break;
            }
        }

        self.frozen_q = false;
        self.frozen_o = false;
        log::info!(
            "hierarchy complete: {} levels, {} total vertices",
            self.levels(),
            self.total_size
        );
        Ok(())
    }

    fn color_level(
        &self,
        level: usize,
        deterministic: bool,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<Vec<u32>>> {
        if deterministic {
            coloring::generate_graph_coloring_deterministic(&self.adj[level], progress)
        } else {
            coloring::generate_graph_coloring(&self.adj[level], self.config.grain_size, progress)
        }
    }

    fn push_empty_constraint_level(&mut self) {
        self.cq.push(Vec::new());
        self.cqw.push(Vec::new());
        self.co.push(Vec::new());
        self.cow.push(Vec::new());
    }

    /// Overwrites the orientation and position fields at every level with
    /// random samples in the respective tangent planes.
    pub fn reset_solution(&mut self) {
        log::info!("setting hierarchy to a random solution");
        self.q.clear();
        self.o.clear();
        for l in 0..self.levels() {
            self.q
                .push(field::init_random_tangent(&self.n[l], self.config.grain_size));
            self.o.push(field::init_random_position(
                &self.v[l],
                &self.n[l],
                self.scale,
                self.config.grain_size,
            ));
        }
        self.frozen_q = false;
        self.frozen_o = false;
    }

    /// Allocates (on first use) and zeroes the constraint arrays at every
    /// level.
    pub fn clear_constraints(&mut self) {
        if self.levels() == 0 {
            return;
        }
        if self.cq[0].is_empty() {
            log::debug!("allocating constraint storage");
        }
        for l in 0..self.levels() {
            let size = self.size(l);
            self.cq[l] = vec![Vector3::zeros(); size];
            self.co[l] = vec![Vector3::zeros(); size];
            self.cqw[l] = vec![0.0; size];
            self.cow[l] = vec![0.0; size];
        }
    }

    /// Releases every owned per-level allocation. The hierarchy returns to
    /// its freshly-constructed state and can accept new input.
    pub fn free(&mut self) {
        self.v.clear();
        self.n.clear();
        self.a.clear();
        self.adj.clear();
        self.q.clear();
        self.o.clear();
        self.cq.clear();
        self.cqw.clear();
        self.co.clear();
        self.cow.clear();
        self.to_upper.clear();
        self.to_lower.clear();
        self.phases.clear();
        self.total_size = 0;
    }

    /// Number of levels (0 before [`set_input`]).
    ///
    /// [`set_input`]: MultiResolutionHierarchy::set_input
    pub fn levels(&self) -> usize {
        self.v.len()
    }

    /// Vertex count of one level.
    pub fn size(&self, level: usize) -> usize {
        self.v[level].len()
    }

    /// Sum of the vertex counts of all levels.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// The configuration this hierarchy was created with.
    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Vertex positions of one level.
    pub fn positions(&self, level: usize) -> &[Vector3<f32>] {
        &self.v[level]
    }

    /// Unit normals of one level.
    pub fn normals(&self, level: usize) -> &[Vector3<f32>] {
        &self.n[level]
    }

    /// Per-vertex surface areas of one level.
    pub fn areas(&self, level: usize) -> &[f32] {
        &self.a[level]
    }

    /// Weighted adjacency of one level.
    pub fn adjacency(&self, level: usize) -> &AdjacencyStore {
        &self.adj[level]
    }

    /// Orientation field of one level (empty until [`reset_solution`]).
    ///
    /// [`reset_solution`]: MultiResolutionHierarchy::reset_solution
    pub fn orientation_field(&self, level: usize) -> &[Vector3<f32>] {
        &self.q[level]
    }

    /// Mutable orientation field, for the smoother.
    pub fn orientation_field_mut(&mut self, level: usize) -> &mut [Vector3<f32>] {
        &mut self.q[level]
    }

    /// Position field of one level (empty until [`reset_solution`]).
    ///
    /// [`reset_solution`]: MultiResolutionHierarchy::reset_solution
    pub fn position_field(&self, level: usize) -> &[Vector3<f32>] {
        &self.o[level]
    }

    /// Mutable position field, for the smoother.
    pub fn position_field_mut(&mut self, level: usize) -> &mut [Vector3<f32>] {
        &mut self.o[level]
    }

    /// Orientation-constraint directions of one level.
    pub fn orientation_constraints(&self, level: usize) -> &[Vector3<f32>] {
        &self.cq[level]
    }

    /// Mutable orientation-constraint directions (callers edit level 0 and
    /// then run [`propagate_constraints`]).
    ///
    /// [`propagate_constraints`]: MultiResolutionHierarchy::propagate_constraints
    pub fn orientation_constraints_mut(&mut self, level: usize) -> &mut [Vector3<f32>] {
        &mut self.cq[level]
    }

    /// Orientation-constraint weights of one level; 0 means unconstrained.
    pub fn orientation_constraint_weights(&self, level: usize) -> &[f32] {
        &self.cqw[level]
    }

    /// Mutable orientation-constraint weights.
    pub fn orientation_constraint_weights_mut(&mut self, level: usize) -> &mut [f32] {
        &mut self.cqw[level]
    }

    /// Position-constraint targets of one level.
    pub fn position_constraints(&self, level: usize) -> &[Vector3<f32>] {
        &self.co[level]
    }

    /// Mutable position-constraint targets.
    pub fn position_constraints_mut(&mut self, level: usize) -> &mut [Vector3<f32>] {
        &mut self.co[level]
    }

    /// Position-constraint weights of one level; 0 means unconstrained.
    pub fn position_constraint_weights(&self, level: usize) -> &[f32] {
        &self.cow[level]
    }

    /// Mutable position-constraint weights.
    pub fn position_constraint_weights_mut(&mut self, level: usize) -> &mut [f32] {
        &mut self.cow[level]
    }

    /// Prolongation pairs: for each vertex of level `level + 1`, its one or
    /// two parents at `level`.
    pub fn to_upper(&self, level: usize) -> &[[u32; 2]] {
        &self.to_upper[level]
    }

    /// Restriction map: for each vertex of `level`, its coarse vertex at
    /// `level + 1`.
    pub fn to_lower(&self, level: usize) -> &[u32] {
        &self.to_lower[level]
    }

    /// Parallel phase sets of one level.
    pub fn phases(&self, level: usize) -> &[Vec<u32>] {
        &self.phases[level]
    }

    /// Target edge scale of the output field.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Sets the target edge scale.
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    /// Whether the orientation field is frozen (skipped by the smoother).
    pub fn frozen_q(&self) -> bool {
        self.frozen_q
    }

    /// Freezes or thaws the orientation field.
    pub fn set_frozen_q(&mut self, frozen: bool) {
        self.frozen_q = frozen;
    }

    /// Whether the position field is frozen.
    pub fn frozen_o(&self) -> bool {
        self.frozen_o
    }

    /// Freezes or thaws the position field.
    pub fn set_frozen_o(&mut self, frozen: bool) {
        self.frozen_o = frozen;
    }

    /// Per-category memory footprint of the owned storage.
    pub fn statistics(&self) -> HierarchyStatistics {
        let vec3 = std::mem::size_of::<Vector3<f32>>();
        let field_bytes = self
            .q
            .iter()
            .chain(self.o.iter())
            .map(|level| level.len() * vec3)
            .sum();
        let vertex_bytes = (0..self.levels())
            .map(|l| self.v[l].len() * vec3 + self.n[l].len() * vec3 + self.a[l].len() * 4)
            .sum();
        let adjacency_bytes = self.adj.iter().map(AdjacencyStore::memory_bytes).sum();
        let tree_bytes = self
            .to_upper
            .iter()
            .map(|level| level.len() * 8)
            .sum::<usize>()
            + self.to_lower.iter().map(|level| level.len() * 4).sum::<usize>();
        let phase_bytes = self
            .phases
            .iter()
            .map(|level| {
                level.len() * std::mem::size_of::<Vec<u32>>()
                    + level.iter().map(|phase| phase.len() * 4).sum::<usize>()
            })
            .sum();

        HierarchyStatistics {
            levels: self.levels(),
            total_vertices: self.total_size,
            field_bytes,
            vertex_bytes,
            adjacency_bytes,
            tree_bytes,
            phase_bytes,
        }
    }
}

/// Memory footprint of a hierarchy, by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HierarchyStatistics {
    /// Number of levels.
    pub levels: usize,
    /// Sum of per-level vertex counts.
    pub total_vertices: usize,
    /// Orientation and position field storage.
    pub field_bytes: usize,
    /// Positions, normals, and areas.
    pub vertex_bytes: usize,
    /// Packed adjacency storage.
    pub adjacency_bytes: usize,
    /// Prolongation/restriction maps.
    pub tree_bytes: usize,
    /// Parallel phase sets.
    pub phase_bytes: usize,
}

impl HierarchyStatistics {
    /// Total bytes across all categories.
    pub fn total_bytes(&self) -> usize {
        self.field_bytes
            + self.vertex_bytes
            + self.adjacency_bytes
            + self.tree_bytes
            + self.phase_bytes
    }
}

fn mem_string(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

impl fmt::Display for HierarchyStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Multiresolution hierarchy statistics:")?;
        writeln!(f, "    Levels              : {}", self.levels)?;
        writeln!(f, "    Total vertices      : {}", self.total_vertices)?;
        writeln!(f, "    Field data          : {}", mem_string(self.field_bytes))?;
        writeln!(f, "    Vertex data         : {}", mem_string(self.vertex_bytes))?;
        writeln!(f, "    Adjacency matrices  : {}", mem_string(self.adjacency_bytes))?;
        writeln!(f, "    Tree connectivity   : {}", mem_string(self.tree_bytes))?;
        writeln!(f, "    Parallel phases     : {}", mem_string(self.phase_bytes))?;
        write!(f, "    Total               : {}", mem_string(self.total_bytes()))
    }
}

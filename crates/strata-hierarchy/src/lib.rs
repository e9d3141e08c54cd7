//! # strata-hierarchy
//!
//! Multi-resolution graph hierarchies for field-aligned surface solvers.
//!
//! Given a finest-level graph — vertex positions, unit normals, per-vertex
//! surface areas, and a weighted adjacency — this crate builds a stack of
//! successively coarser graphs by greedy weighted pair matching, computes a
//! valid greedy coloring of every level so a smoother can process same-color
//! vertices in parallel, and transports tangent fields and sparse user
//! constraints between consecutive levels.
//!
//! ## Usage
//!
//! ```no_run
//! use nalgebra::Vector3;
//! use strata_core::AdjacencyStore;
//! use strata_hierarchy::{HierarchyConfig, MultiResolutionHierarchy};
//!
//! # fn main() -> strata_core::Result<()> {
//! let positions = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)];
//! let normals = vec![Vector3::new(0.0, 0.0, 1.0); 2];
//! let areas = vec![1.0; 2];
//! let adjacency = AdjacencyStore::from_edges(2, &[(0, 1, 1.0)])?;
//!
//! let mut hierarchy = MultiResolutionHierarchy::new(HierarchyConfig::default())?;
//! hierarchy.set_input(positions, normals, areas, adjacency)?;
//! hierarchy.set_scale(0.1);
//! hierarchy.build(true, None)?;
//! hierarchy.reset_solution();
//! hierarchy.propagate_solution(4)?;
//! # Ok(())
//! # }
//! ```

pub mod coloring;
pub mod config;
pub mod downsample;
pub mod field;
pub mod hierarchy;
mod propagate;

pub use coloring::{
    generate_graph_coloring, generate_graph_coloring_deterministic, MAX_COLORS,
};
pub use config::{HierarchyConfig, WeightPolicy};
pub use downsample::{downsample_graph, DownsampledLevel};
pub use field::{
    compat_orientation_extrinsic_2, compat_orientation_extrinsic_4,
    compat_orientation_extrinsic_6, compat_position_extrinsic_3, compat_position_extrinsic_4,
    coordinate_system, init_random_position, init_random_tangent, CompatOrientation,
    CompatPosition,
};
pub use hierarchy::{HierarchyStatistics, MultiResolutionHierarchy};

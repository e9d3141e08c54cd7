//! Inter-level transport of solution fields and user constraints.

use nalgebra::Vector3;
use rayon::prelude::*;
use strata_core::{Result, StrataError, INVALID, RCPOVERFLOW};

use crate::config::WeightPolicy;
use crate::field::{
    compat_orientation_extrinsic_2, compat_orientation_extrinsic_4,
    compat_orientation_extrinsic_6, compat_position_extrinsic_3, compat_position_extrinsic_4,
    CompatOrientation, CompatPosition,
};
use crate::hierarchy::MultiResolutionHierarchy;

fn orientation_operator(rosy: u32) -> Result<CompatOrientation> {
    match rosy {
        2 => Ok(compat_orientation_extrinsic_2 as CompatOrientation),
        4 => Ok(compat_orientation_extrinsic_4 as CompatOrientation),
        6 => Ok(compat_orientation_extrinsic_6 as CompatOrientation),
        _ => Err(StrataError::unsupported_rosy(rosy)),
    }
}

fn position_operator(posy: u32) -> Result<CompatPosition> {
    match posy {
        3 => Ok(compat_position_extrinsic_3 as CompatPosition),
        4 => Ok(compat_position_extrinsic_4 as CompatPosition),
        _ => Err(StrataError::unsupported_posy(posy)),
    }
}

impl MultiResolutionHierarchy {
    /// Transports the orientation field across every level boundary: each
    /// coarse value is the symmetry-compatible combination of its fine
    /// parents, projected into the coarse tangent plane.
    ///
    /// `rosy` selects the rotational symmetry (2, 4, or 6). The operator is
    /// resolved once, outside the parallel loops.
    ///
    /// # Errors
    /// [`StrataError::UnsupportedSymmetry`] for other `rosy` values,
    /// [`StrataError::InvalidInput`] when the solution fields have not been
    /// initialized via [`reset_solution`].
    ///
    /// [`reset_solution`]: MultiResolutionHierarchy::reset_solution
    pub fn propagate_solution(&mut self, rosy: u32) -> Result<()> {
        let compat_orient = orientation_operator(rosy)?;
        if self.levels() == 0 {
            return Ok(());
        }
        if self.q.len() != self.levels() {
            return Err(StrataError::invalid_input(
                "solution fields are not initialized; call reset_solution first",
            ));
        }
        log::debug!("propagating solution across {} levels", self.levels());

        let grain = self.config.grain_size.max(1);
        for l in 0..self.levels() - 1 {
            let (fine_q, coarse_q) = self.q.split_at_mut(l + 1);
            let q_cur = &fine_q[l];
            let q_next = &mut coarse_q[0];
            let n_cur = &self.n[l];
            let n_next = &self.n[l + 1];
            let to_upper = &self.to_upper[l];

            q_next
                .par_iter_mut()
                .with_min_len(grain)
                .enumerate()
                .for_each(|(i, out)| {
                    let pair = to_upper[i];
                    let q0 = q_cur[pair[0] as usize];
                    let n0 = n_cur[pair[0] as usize];

                    let mut q = if pair[1] != INVALID {
                        let q1 = q_cur[pair[1] as usize];
                        let n1 = n_cur[pair[1] as usize];
                        let (a, b) = compat_orient(&q0, &n0, &q1, &n1);
                        a + b
                    } else {
                        q0
                    };

                    let n = n_next[i];
                    q -= n * n.dot(&q);
                    if q.norm_squared() > RCPOVERFLOW {
                        q.normalize_mut();
                    }
                    *out = q;
                });
        }
        Ok(())
    }

    /// Transports the user constraints across every level boundary.
    ///
    /// For each constraint kind a coarse vertex copies the single
    /// constrained parent, or combines two constrained parents through the
    /// symmetry-compatibility operator, weighted by the parent weights.
    /// Combined weights are then folded by the configured
    /// [`WeightPolicy`].
    ///
    /// # Errors
    /// [`StrataError::UnsupportedSymmetry`] for `rosy` outside {2, 4, 6} or
    /// `posy` outside {3, 4}, [`StrataError::InvalidInput`] when constraint
    /// storage has not been allocated via [`clear_constraints`].
    ///
    /// [`clear_constraints`]: MultiResolutionHierarchy::clear_constraints
    pub fn propagate_constraints(&mut self, rosy: u32, posy: u32) -> Result<()> {
        let compat_orient = orientation_operator(rosy)?;
        let compat_pos = position_operator(posy)?;
        if self.levels() == 0 {
            return Ok(());
        }
        if self.cq.len() != self.levels() || self.cq[0].len() != self.size(0) {
            return Err(StrataError::invalid_input(
                "constraint storage is not allocated; call clear_constraints first",
            ));
        }
        log::debug!("propagating constraints across {} levels", self.levels());

        let scale = self.scale;
        let inv_scale = 1.0 / self.scale;
        let policy = self.config.weight_policy;
        let grain = self.config.grain_size.max(1);

        for l in 0..self.levels() - 1 {
            let (fine_cq, coarse_cq) = self.cq.split_at_mut(l + 1);
            let (fine_cqw, coarse_cqw) = self.cqw.split_at_mut(l + 1);
            let (fine_co, coarse_co) = self.co.split_at_mut(l + 1);
            let (fine_cow, coarse_cow) = self.cow.split_at_mut(l + 1);
            let cq_cur = &fine_cq[l];
            let cqw_cur = &fine_cqw[l];
            let co_cur = &fine_co[l];
            let cow_cur = &fine_cow[l];
            let v_cur = &self.v[l];
            let v_next = &self.v[l + 1];
            let n_cur = &self.n[l];
            let n_next = &self.n[l + 1];
            let to_upper = &self.to_upper[l];

            coarse_cq[0]
                .par_iter_mut()
                .zip(coarse_cqw[0].par_iter_mut())
                .zip(coarse_co[0].par_iter_mut())
                .zip(coarse_cow[0].par_iter_mut())
                .with_min_len(grain)
                .enumerate()
                .for_each(|(i, (((cq_out, cqw_out), co_out), cow_out))| {
                    let pair = to_upper[i];
                    let p0 = pair[0] as usize;
                    let mut cq = Vector3::zeros();
                    let mut co = Vector3::zeros();
                    let mut cqw = 0.0f32;
                    let mut cow = 0.0f32;

                    let has_cq0 = cqw_cur[p0] != 0.0;
                    let has_cq1 = pair[1] != INVALID && cqw_cur[pair[1] as usize] != 0.0;
                    let has_co0 = cow_cur[p0] != 0.0;
                    let has_co1 = pair[1] != INVALID && cow_cur[pair[1] as usize] != 0.0;

                    if has_cq0 && !has_cq1 {
                        cq = cq_cur[p0];
                        cqw = cqw_cur[p0];
                    } else if has_cq1 && !has_cq0 {
                        let p1 = pair[1] as usize;
                        cq = cq_cur[p1];
                        cqw = cqw_cur[p1];
                    } else if has_cq0 && has_cq1 {
                        let p1 = pair[1] as usize;
                        let (a, b) = compat_orient(
                            &cq_cur[p0], &n_cur[p0], &cq_cur[p1], &n_cur[p1],
                        );
                        cq = a * cqw_cur[p0] + b * cqw_cur[p1];
                        cqw = cqw_cur[p0] + cqw_cur[p1];
                    }
                    if cq != Vector3::zeros() {
                        let n = n_next[i];
                        cq -= n * n.dot(&cq);
                        if cq.norm_squared() > RCPOVERFLOW {
                            cq.normalize_mut();
                        }
                    }

                    if has_co0 && !has_co1 {
                        co = co_cur[p0];
                        cow = cow_cur[p0];
                    } else if has_co1 && !has_co0 {
                        let p1 = pair[1] as usize;
                        co = co_cur[p1];
                        cow = cow_cur[p1];
                    } else if has_co0 && has_co1 {
                        let p1 = pair[1] as usize;
                        let (a, b) = compat_pos(
                            &v_cur[p0], &n_cur[p0], &cq_cur[p0], &co_cur[p0],
                            &v_cur[p1], &n_cur[p1], &cq_cur[p1], &co_cur[p1],
                            scale, inv_scale,
                        );
                        cow = cow_cur[p0] + cow_cur[p1];
                        co = (a * cow_cur[p0] + b * cow_cur[p1]) / cow;
                    }
                    if co != Vector3::zeros() {
                        let n = n_next[i];
                        let v = v_next[i];
                        co -= n * n.dot(&(cq - v));
                    }

                    match policy {
                        WeightPolicy::ClampToOne => {
                            if cqw > 0.0 {
                                cqw = 1.0;
                            }
                            if cow > 0.0 {
                                cow = 1.0;
                            }
                        }
                        WeightPolicy::Halve => {
                            cqw *= 0.5;
                            cow *= 0.5;
                        }
                    }

                    *cq_out = cq;
                    *cqw_out = cqw;
                    *co_out = co;
                    *cow_out = cow;
                });
        }
        Ok(())
    }
}

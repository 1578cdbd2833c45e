// crates/mh_diagb/src/diffusion.rs

//! 扩散滤波
//!
//! 估计场可选地再经过一次扩散平滑。扩散算子通过 [`DiffusionOperator`]
//! 接入：先用 `set_parameters` 设置逐节点的水平/垂向长度尺度，
//! 再用 `multiply` 原地平滑场集合。
//!
//! [`GraphDiffusion`] 是基于邻居表的实现：
//!
//! ```text
//! dφ_i/dt = (1/|N(i)|) Σ_j ν_ij (φ_j - φ_i) / d_ij²,   ν = L²
//! ```
//!
//! 积分到 t = 1/2（连续情形下对应尺度 L 的高斯核），显式子步满足
//! `dt · Σ_j a_ij ≤ cfl_safety`，因此常数场不变且结果非负。
//! 只有两端都是湿点的连接参与交换。

use mh_config::DiffusionMode;
use mh_geo::LonLat;
use mh_mesh::{HaloExchange, NeighborTable};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{DiagbError, DiagbResult};
use crate::field::{Field, FieldSet};
use crate::vertical::is_wet;

/// 积分时间
const DIFFUSION_TIME: f64 = 0.5;

/// 忽略的最小节点间距 [m]
const MIN_DISTANCE: f64 = 1e-6;

/// 逐节点长度尺度
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleFields {
    /// 水平长度尺度 [m]，单层场
    pub horizontal: Field,
    /// 垂向长度尺度 [m]，单层场
    pub vertical: Field,
}

impl ScaleFields {
    /// 由两个常数广播到每个节点
    pub fn constant(n_nodes: usize, horizontal: f64, vertical: f64) -> Self {
        Self {
            horizontal: Field::filled("horizontal_scale", n_nodes, 1, horizontal),
            vertical: Field::filled("vertical_scale", n_nodes, 1, vertical),
        }
    }

    fn validate(&self, n_nodes: usize) -> DiagbResult<()> {
        for f in [&self.horizontal, &self.vertical] {
            if f.n_nodes() != n_nodes {
                return Err(DiagbError::shape(f.name(), n_nodes, f.n_nodes()));
            }
            if let Some(&bad) = f.values().iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(DiagbError::InvalidParameter {
                    name: "length scale",
                    value: bad,
                    reason: "长度尺度必须为非负有限值".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// 扩散算子接口
pub trait DiffusionOperator {
    /// 设置长度尺度
    fn set_parameters(&mut self, scales: &ScaleFields) -> DiagbResult<()>;

    /// 原地平滑场集合中的每个场
    fn multiply(&self, fields: &mut FieldSet, mode: DiffusionMode) -> DiagbResult<()>;
}

/// 基于邻居表的显式扩散
pub struct GraphDiffusion<'a> {
    neighbors: &'a NeighborTable,
    ghost: &'a [bool],
    halo: &'a dyn HaloExchange,
    thickness: Option<&'a Field>,
    /// 与邻居表逐项对应的大圆距离
    distances: Vec<Vec<f64>>,
    scales: Option<ScaleFields>,
    cfl_safety: f64,
    max_substeps: usize,
}

impl<'a> GraphDiffusion<'a> {
    /// 从网格数据构建
    pub fn new(
        neighbors: &'a NeighborTable,
        positions: &[LonLat],
        ghost: &'a [bool],
        halo: &'a dyn HaloExchange,
    ) -> DiagbResult<Self> {
        if positions.len() != neighbors.n_nodes() || ghost.len() != neighbors.n_nodes() {
            return Err(DiagbError::shape(
                "positions",
                neighbors.n_nodes(),
                positions.len(),
            ));
        }
        let distances: Vec<Vec<f64>> = (0..neighbors.n_nodes())
            .into_par_iter()
            .map(|i| {
                neighbors
                    .neighbors(i)
                    .iter()
                    .map(|&j| positions[i].geodesic_distance_to(&positions[j]))
                    .collect::<Vec<f64>>()
            })
            .collect();

        Ok(Self {
            neighbors,
            ghost,
            halo,
            thickness: None,
            distances,
            scales: None,
            cfl_safety: 0.5,
            max_substeps: 10_000,
        })
    }

    /// 用层厚场限制交换只在湿点之间进行，并决定垂向间距
    pub fn with_thickness(mut self, thickness: &'a Field) -> Self {
        self.thickness = Some(thickness);
        self
    }

    /// 设置子步上限
    pub fn with_max_substeps(mut self, max_substeps: usize) -> Self {
        self.max_substeps = max_substeps.max(1);
        self
    }

    fn scales(&self) -> DiagbResult<&ScaleFields> {
        self.scales
            .as_ref()
            .ok_or(DiagbError::NotConfigured("diffusion scales"))
    }

    #[inline]
    fn wet(&self, node: usize, level: usize) -> bool {
        self.thickness.map_or(true, |h| is_wet(h.get(node, level)))
    }

    /// 邻居 j 对节点 i 的交换系数
    #[inline]
    fn coefficient(&self, nu: &Field, i: usize, k: usize, j: usize) -> f64 {
        let d = self.distances[i][k];
        if d < MIN_DISTANCE {
            return 0.0;
        }
        let (nu_i, nu_j) = (nu.get(i, 0), nu.get(j, 0));
        // 调和平均保证正定
        let nu_ij = if nu_i + nu_j > 0.0 {
            2.0 * nu_i * nu_j / (nu_i + nu_j)
        } else {
            0.0
        };
        nu_ij / (d * d) / self.neighbors.degree(i) as f64
    }

    fn horizontal(&self, field: &mut Field, nu: &Field) -> DiagbResult<()> {
        let n_levels = field.n_levels();

        let max_rate = (0..field.n_nodes())
            .filter(|&i| !self.ghost[i])
            .map(|i| {
                self.neighbors
                    .neighbors(i)
                    .iter()
                    .enumerate()
                    .map(|(k, &j)| self.coefficient(nu, i, k, j))
                    .sum::<f64>()
            })
            .fold(0.0_f64, f64::max);
        if max_rate <= 0.0 {
            return Ok(());
        }

        let (n_sub, dt) = self.substeps(max_rate);
        debug!("{}: 水平扩散 {} 子步, dt={:.3e}", field.name(), n_sub, dt);

        let mut next = field.clone();
        for _ in 0..n_sub {
            self.halo.sync(field.values_mut(), n_levels)?;
            let current = &*field;

            next.values_mut()
                .par_chunks_mut(n_levels)
                .enumerate()
                .for_each(|(i, column)| {
                    column.copy_from_slice(current.column(i));
                    if self.ghost[i] {
                        return;
                    }
                    for (level, value) in column.iter_mut().enumerate() {
                        if !self.wet(i, level) {
                            continue;
                        }
                        let phi_i = current.get(i, level);
                        let flux: f64 = self
                            .neighbors
                            .neighbors(i)
                            .iter()
                            .enumerate()
                            .filter(|&(_, &j)| self.wet(j, level))
                            .map(|(k, &j)| self.coefficient(nu, i, k, j) * (current.get(j, level) - phi_i))
                            .sum();
                        *value = phi_i + dt * flux;
                    }
                });

            std::mem::swap(field, &mut next);
        }
        Ok(())
    }

    fn vertical(&self, field: &mut Field, nu: &Field) {
        let n_levels = field.n_levels();
        if n_levels <= 1 {
            return;
        }

        field
            .values_mut()
            .par_chunks_mut(n_levels)
            .enumerate()
            .filter(|(i, _)| !self.ghost[*i])
            .for_each(|(i, column)| {
                // b[l] 为 l 与 l+1 之间的交换系数
                let b: Vec<f64> = (0..n_levels - 1)
                    .map(|l| {
                        if !self.wet(i, l) || !self.wet(i, l + 1) {
                            return 0.0;
                        }
                        let dz = self.thickness.map_or(1.0, |h| {
                            0.5 * (h.get(i, l).abs() + h.get(i, l + 1).abs())
                        });
                        nu.get(i, 0) / (dz * dz)
                    })
                    .collect();

                let max_rate = (0..n_levels)
                    .map(|l| {
                        let up = if l > 0 { b[l - 1] } else { 0.0 };
                        let down = if l + 1 < n_levels { b[l] } else { 0.0 };
                        up + down
                    })
                    .fold(0.0_f64, f64::max);
                if max_rate <= 0.0 {
                    return;
                }

                let (n_sub, dt) = self.substeps(max_rate);
                let mut prev = column.to_vec();
                for _ in 0..n_sub {
                    for l in 0..n_levels {
                        let mut flux = 0.0;
                        if l > 0 {
                            flux += b[l - 1] * (prev[l - 1] - prev[l]);
                        }
                        if l + 1 < n_levels {
                            flux += b[l] * (prev[l + 1] - prev[l]);
                        }
                        column[l] = prev[l] + dt * flux;
                    }
                    prev.copy_from_slice(column);
                }
            });
    }

    /// 子步数与步长
    fn substeps(&self, max_rate: f64) -> (usize, f64) {
        let dt_stable = self.cfl_safety / max_rate;
        let wanted = (DIFFUSION_TIME / dt_stable).ceil().max(1.0) as usize;
        if wanted > self.max_substeps {
            warn!(
                "扩散需要 {} 子步, 超过上限 {}, 平滑尺度将被缩短",
                wanted, self.max_substeps
            );
            return (self.max_substeps, dt_stable);
        }
        (wanted, DIFFUSION_TIME / wanted as f64)
    }
}

impl DiffusionOperator for GraphDiffusion<'_> {
    fn set_parameters(&mut self, scales: &ScaleFields) -> DiagbResult<()> {
        scales.validate(self.neighbors.n_nodes())?;
        self.scales = Some(scales.clone());
        Ok(())
    }

    fn multiply(&self, fields: &mut FieldSet, mode: DiffusionMode) -> DiagbResult<()> {
        let scales = self.scales()?;
        let nu_h = squared(&scales.horizontal);
        let nu_v = squared(&scales.vertical);

        for field in fields.iter_mut() {
            if field.n_nodes() != self.neighbors.n_nodes() {
                return Err(DiagbError::shape(
                    field.name(),
                    self.neighbors.n_nodes(),
                    field.n_nodes(),
                ));
            }
            if let Some(h) = self.thickness {
                if h.n_levels() < field.n_levels() {
                    return Err(DiagbError::shape(h.name(), field.n_levels(), h.n_levels()));
                }
            }
            match mode {
                DiffusionMode::Horizontal => self.horizontal(field, &nu_h)?,
                DiffusionMode::Vertical => self.vertical(field, &nu_v),
                DiffusionMode::Both => {
                    self.horizontal(field, &nu_h)?;
                    self.vertical(field, &nu_v);
                }
            }
        }
        Ok(())
    }
}

/// 扩散系数 ν = L²
fn squared(scale: &Field) -> Field {
    let mut nu = scale.clone();
    for v in nu.values_mut() {
        *v *= *v;
    }
    nu
}

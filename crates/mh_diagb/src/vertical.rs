// crates/mh_diagb/src/vertical.rs

//! 垂向结构分析
//!
//! 从层厚场推导：
//! - 层中心累积深度 `depth[n,0] = h[n,0]/2`，
//!   `depth[n,l] = depth[n,l-1] + (h[n,l-1] + h[n,l])/2`
//! - 水深代理 `bathymetry[n] = Σ_l h[n,l]`
//! - 混合层层号：与混合层深度最接近的层

use crate::error::{DiagbError, DiagbResult};
use crate::field::Field;

/// 干点阈值：层厚绝对值不超过该值视为陆地/干点
pub const DRY_THICKNESS: f64 = 0.1;

/// 层厚是否为湿点
#[inline]
pub fn is_wet(thickness: f64) -> bool {
    thickness.abs() > DRY_THICKNESS
}

/// 每个节点的垂向结构
#[derive(Debug, Clone)]
pub struct VerticalStructure {
    depth: Field,
    bathymetry: Vec<f64>,
    mld_index: Option<Vec<usize>>,
}

impl VerticalStructure {
    /// 从层厚场构建
    pub fn from_thickness(thickness: &Field) -> Self {
        Self {
            depth: layer_depth(thickness),
            bathymetry: bathymetry(thickness),
            mld_index: None,
        }
    }

    /// 附加混合层层号
    ///
    /// `mld` 为单层场，值为混合层深度。
    pub fn with_mixed_layer(mut self, mld: &Field) -> DiagbResult<Self> {
        if mld.n_nodes() != self.depth.n_nodes() {
            return Err(DiagbError::shape(
                mld.name(),
                format!("{} 节点", self.depth.n_nodes()),
                format!("{} 节点", mld.n_nodes()),
            ));
        }
        self.mld_index = Some(mixed_layer_index(&self.depth, mld));
        Ok(self)
    }

    /// 层中心深度
    pub fn depth(&self) -> &Field {
        &self.depth
    }

    /// 节点水深代理
    #[inline]
    pub fn bathymetry(&self, node: usize) -> f64 {
        self.bathymetry[node]
    }

    /// 全部水深代理
    pub fn bathymetry_values(&self) -> &[f64] {
        &self.bathymetry
    }

    /// 最接近混合层深度的层号（未附加混合层时为 None）
    #[inline]
    pub fn mld_index(&self, node: usize) -> Option<usize> {
        self.mld_index.as_ref().map(|idx| idx[node])
    }

    /// 是否附加了混合层
    pub fn has_mixed_layer(&self) -> bool {
        self.mld_index.is_some()
    }
}

/// 层中心累积深度
pub fn layer_depth(thickness: &Field) -> Field {
    let n_levels = thickness.n_levels();
    let mut depth = Field::zeros("layer_depth", thickness.n_nodes(), n_levels);

    for node in 0..thickness.n_nodes() {
        let h = thickness.column(node);
        let d = depth.column_mut(node);
        d[0] = 0.5 * h[0];
        for l in 1..n_levels {
            d[l] = d[l - 1] + 0.5 * (h[l - 1] + h[l]);
        }
    }
    depth
}

/// 水深代理：层厚之和
pub fn bathymetry(thickness: &Field) -> Vec<f64> {
    (0..thickness.n_nodes())
        .map(|node| thickness.column(node).iter().sum())
        .collect()
}

/// 每个节点与混合层深度最接近的层号；相等时取较浅层
pub fn mixed_layer_index(depth: &Field, mld: &Field) -> Vec<usize> {
    (0..depth.n_nodes())
        .map(|node| {
            let target = mld.get(node, 0);
            depth
                .column(node)
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |(best, best_d), (l, &z)| {
                    let d = (z - target).abs();
                    if d < best_d {
                        (l, d)
                    } else {
                        (best, best_d)
                    }
                })
                .0
        })
        .collect()
}

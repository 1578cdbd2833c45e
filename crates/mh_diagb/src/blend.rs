// crates/mh_diagb/src/blend.rs

//! 混合背景误差
//!
//! 把估计的标准差与气候态标准差加权组合：
//!
//! ```text
//! result = w · σ_diagb + (1 - w) · r · max(σ_clim, 0)
//! ```
//!
//! 这是简单加权和，不是方差意义上的加权均方根。
//! 气候态场可以定义在另一套网格上，先经 [`Regridder`] 映射到工作网格。

use mh_geo::{LonLat, SphericalIndex};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{DiagbError, DiagbResult};
use crate::field::{Field, FieldSet};

/// 网格间插值接口
pub trait Regridder: Send + Sync {
    /// 把源网格上的场集合映射到目标网格
    fn regrid(&self, source: &FieldSet) -> DiagbResult<FieldSet>;
}

/// 最近点插值
///
/// 每个目标节点取大圆距离最近的源节点的整列值。
#[derive(Debug, Clone)]
pub struct NearestNeighborRegridder {
    n_source: usize,
    /// 目标节点 → 源节点
    mapping: Vec<usize>,
}

impl NearestNeighborRegridder {
    /// 预先计算目标节点到源节点的映射
    pub fn new(source: &[LonLat], target: &[LonLat]) -> DiagbResult<Self> {
        if source.is_empty() {
            return Err(DiagbError::shape("source geometry", "至少 1 个节点", 0));
        }
        let index = SphericalIndex::bulk_load(
            source.iter().copied().enumerate().map(|(i, p)| (p, i)).collect(),
        );

        let mapping = target
            .par_iter()
            .map(|p| {
                index
                    .query_nearest(p, 1)
                    .first()
                    .map(|&(_, &i)| i)
                    .ok_or_else(|| DiagbError::Format(format!("找不到 ({}, {}) 的最近点", p.lon, p.lat)))
            })
            .collect::<DiagbResult<Vec<_>>>()?;

        debug!("最近点插值: {} → {} 节点", source.len(), target.len());
        Ok(Self {
            n_source: source.len(),
            mapping,
        })
    }

    /// 目标节点对应的源节点
    pub fn source_of(&self, target: usize) -> Option<usize> {
        self.mapping.get(target).copied()
    }
}

impl Regridder for NearestNeighborRegridder {
    fn regrid(&self, source: &FieldSet) -> DiagbResult<FieldSet> {
        let mut out = FieldSet::new();
        for field in source.iter() {
            if field.n_nodes() != self.n_source {
                return Err(DiagbError::shape(field.name(), self.n_source, field.n_nodes()));
            }
            let n_levels = field.n_levels();
            let mut target = Field::zeros(field.name(), self.mapping.len(), n_levels);
            target
                .values_mut()
                .par_chunks_mut(n_levels)
                .zip(self.mapping.par_iter())
                .for_each(|(column, &src)| column.copy_from_slice(field.column(src)));
            out.insert(target)?;
        }
        Ok(out)
    }
}

/// 混合权重参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    /// 估计场权重 w ∈ [0, 1]
    pub diagb_weight: f64,
    /// 气候态缩放因子 r
    pub climate_rescale: f64,
}

impl BlendWeights {
    fn validate(&self) -> DiagbResult<()> {
        if !(0.0..=1.0).contains(&self.diagb_weight) {
            return Err(DiagbError::InvalidParameter {
                name: "diagb weight",
                value: self.diagb_weight,
                reason: "权重必须位于 [0, 1]".to_string(),
            });
        }
        if !self.climate_rescale.is_finite() || self.climate_rescale < 0.0 {
            return Err(DiagbError::InvalidParameter {
                name: "staticb rescaling factor",
                value: self.climate_rescale,
                reason: "缩放因子必须为非负有限值".to_string(),
            });
        }
        Ok(())
    }
}

/// 就地混合估计场与气候态场
///
/// `climate` 必须已经在工作网格上，且包含 `diagb` 的每个变量。
pub fn hybrid_blend(
    diagb: &mut FieldSet,
    climate: &FieldSet,
    weights: BlendWeights,
) -> DiagbResult<()> {
    weights.validate()?;
    let BlendWeights {
        diagb_weight: w,
        climate_rescale: r,
    } = weights;

    for field in diagb.iter_mut() {
        let clim = climate.get(field.name())?;
        field.check_same_shape(clim)?;
        field
            .values_mut()
            .par_iter_mut()
            .zip(clim.values().par_iter())
            .for_each(|(v, &c)| *v = w * *v + (1.0 - w) * r * c.max(0.0));
    }

    info!("混合气候态误差: w={}, r={}", w, r);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_regrid() {
        let source = vec![LonLat::new(0.0, 0.0), LonLat::new(10.0, 0.0)];
        let target = vec![
            LonLat::new(1.0, 0.0),
            LonLat::new(9.0, 1.0),
            LonLat::new(4.0, 0.0),
        ];
        let regridder = NearestNeighborRegridder::new(&source, &target).unwrap();
        assert_eq!(regridder.source_of(0), Some(0));
        assert_eq!(regridder.source_of(1), Some(1));
        assert_eq!(regridder.source_of(2), Some(0));

        let mut set = FieldSet::new();
        set.insert(Field::from_columns("t", &[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap())
            .unwrap();
        let out = regridder.regrid(&set).unwrap();
        let t = out.get("t").unwrap();
        assert_eq!(t.n_nodes(), 3);
        assert_eq!(t.column(1), &[3.0, 4.0]);
        assert_eq!(t.column(2), &[1.0, 2.0]);
    }

    #[test]
    fn test_regrid_rejects_wrong_source_size() {
        let source = vec![LonLat::new(0.0, 0.0)];
        let regridder = NearestNeighborRegridder::new(&source, &source).unwrap();
        let mut set = FieldSet::new();
        set.insert(Field::zeros("t", 2, 1)).unwrap();
        assert!(regridder.regrid(&set).is_err());
        assert!(NearestNeighborRegridder::new(&[], &source).is_err());
    }

    #[test]
    fn test_blend_weighted_sum() {
        let mut diagb = FieldSet::new();
        diagb.insert(Field::from_values("t", 1, vec![2.0, 4.0]).unwrap()).unwrap();
        let mut clim = FieldSet::new();
        clim.insert(Field::from_values("t", 1, vec![1.0, -3.0]).unwrap()).unwrap();

        let weights = BlendWeights {
            diagb_weight: 0.25,
            climate_rescale: 2.0,
        };
        hybrid_blend(&mut diagb, &clim, weights).unwrap();

        let t = diagb.get("t").unwrap();
        // 0.25*2 + 0.75*2*1
        assert!((t.get(0, 0) - 2.0).abs() < 1e-12);
        // 负的气候态值截断为 0
        assert!((t.get(1, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_blend_validation() {
        let mut diagb = FieldSet::new();
        diagb.insert(Field::zeros("t", 2, 1)).unwrap();
        let clim = FieldSet::new();

        let bad = BlendWeights {
            diagb_weight: 1.5,
            climate_rescale: 1.0,
        };
        assert!(matches!(
            hybrid_blend(&mut diagb, &clim, bad),
            Err(DiagbError::InvalidParameter { .. })
        ));

        let ok = BlendWeights {
            diagb_weight: 0.5,
            climate_rescale: 1.0,
        };
        assert!(matches!(
            hybrid_blend(&mut diagb, &clim, ok),
            Err(DiagbError::MissingField(_))
        ));
    }
}

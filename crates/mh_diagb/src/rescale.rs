// crates/mh_diagb/src/rescale.rs

//! 缩放与掩码
//!
//! 估计链的最后一步，依次执行：
//! 1. 逐点乘以全局缩放系数场（单层系数场广播到所有层）
//! 2. 整体乘以标量缩放因子
//! 3. 再次执行水深门限和指定变量截断

use rayon::prelude::*;
use tracing::debug;

use crate::error::{DiagbError, DiagbResult};
use crate::field::FieldSet;
use crate::strategy::EstimatorStrategy;
use crate::vertical::VerticalStructure;

/// 掩码统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaskStats {
    /// 被门限置零的节点列数
    pub gated_columns: usize,
    /// 被截断的点数
    pub clamped: usize,
}

/// 逐点乘以全局缩放系数
///
/// `coefficients` 须包含每个变量；系数场层数为 1 时广播到全部层，
/// 否则层数必须一致。
pub fn apply_global_rescale(fields: &mut FieldSet, coefficients: &FieldSet) -> DiagbResult<()> {
    for field in fields.iter_mut() {
        let coef = coefficients.get(field.name())?;
        if coef.n_nodes() != field.n_nodes()
            || (coef.n_levels() != 1 && coef.n_levels() != field.n_levels())
        {
            return Err(DiagbError::shape(
                coef.name(),
                format!("{} 节点, 1 或 {} 层", field.n_nodes(), field.n_levels()),
                format!("{}x{}", coef.n_nodes(), coef.n_levels()),
            ));
        }
        if let Some(&bad) = coef.values().iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(DiagbError::InvalidParameter {
                name: "global rescale",
                value: bad,
                reason: format!("{} 的缩放系数必须为非负有限值", coef.name()),
            });
        }

        let n_levels = field.n_levels();
        field
            .values_mut()
            .par_chunks_mut(n_levels)
            .enumerate()
            .for_each(|(node, column)| {
                let coef_column = coef.column(node);
                for (level, v) in column.iter_mut().enumerate() {
                    *v *= coef_column[level.min(coef_column.len() - 1)];
                }
            });
    }
    debug!("全局缩放: {} 个变量", fields.len());
    Ok(())
}

/// 整体乘以标量
pub fn apply_scalar_rescale(fields: &mut FieldSet, factor: f64) -> DiagbResult<()> {
    if !factor.is_finite() || factor < 0.0 {
        return Err(DiagbError::InvalidParameter {
            name: "rescale",
            value: factor,
            reason: "缩放因子必须为非负有限值".to_string(),
        });
    }
    if factor != 1.0 {
        fields.scale(factor);
    }
    Ok(())
}

/// 水深门限与截断
///
/// `vertical` 缺省时跳过水深门限。
pub fn apply_mask(
    fields: &mut FieldSet,
    strategy: &EstimatorStrategy,
    vertical: Option<&VerticalStructure>,
) -> MaskStats {
    let mut stats = MaskStats::default();

    for field in fields.iter_mut() {
        let n_levels = field.n_levels();
        let limit = strategy.clamp.limit_for(field.name());

        let (gated, clamped) = field
            .values_mut()
            .par_chunks_mut(n_levels)
            .enumerate()
            .map(|(node, column)| {
                if strategy.mask.gated(vertical.map(|v| v.bathymetry(node))) {
                    column.fill(0.0);
                    return (1, 0);
                }
                let mut clamped = 0;
                if let Some(max) = limit {
                    for v in column.iter_mut().filter(|v| **v > max) {
                        *v = max;
                        clamped += 1;
                    }
                }
                (0, clamped)
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

        stats.gated_columns += gated;
        stats.clamped += clamped;
    }

    debug!(
        "掩码: 门限 {} 列, 截断 {} 点",
        stats.gated_columns, stats.clamped
    );
    stats
}

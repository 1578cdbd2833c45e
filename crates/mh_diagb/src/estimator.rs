// crates/mh_diagb/src/estimator.rs

//! 局部方差估计器
//!
//! 对每个 (节点 n, 层 l)：
//!
//! 1. 水深门限：`bathymetry[n] < min_depth` 时输出置 0
//! 2. 垂向窗口：单层场取 {0}；混合层以上取近表层窗口；否则 `[l-nbz, l+nbz]`
//! 3. 收集样本：遍历邻居 m 与窗口内各层 ll，跳过干点，取 `background[m, ll]`
//! 4. 样本数小于 `min_count` 时保持原值
//! 5. 样本均值
//! 6. 离差平方和（默认只累加前 |N(n)| 个样本）
//! 7. 离差和为正或样本数大于 2 时写入 `sqrt(disp / (count - 1))`
//! 8. 指定变量截断到上限
//!
//! 每个节点只写自己的列，读取的输入在估计期间只读，因此按节点并行。
//! ghost 节点不是计算目标。

use mh_config::DispersionSpan;
use mh_mesh::NeighborTable;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{DiagbError, DiagbResult};
use crate::field::Field;
use crate::strategy::EstimatorStrategy;
use crate::vertical::{is_wet, VerticalStructure};

/// 估计输入（已完成 halo 同步）
#[derive(Debug, Clone, Copy)]
pub struct EstimatorInputs<'a> {
    /// 背景场
    pub background: &'a Field,
    /// 层厚场；缺省时所有样本视为湿点
    pub thickness: Option<&'a Field>,
    /// 垂向结构；缺省时不做水深门限和混合层窗口
    pub vertical: Option<&'a VerticalStructure>,
}

/// 单点估计结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointOutcome {
    /// 写入标准差
    Written(f64),
    /// 被水深门限置零
    Gated,
    /// 样本不足，保持原值
    Insufficient,
    /// 离差为零且样本少，保持原值
    Degenerate,
}

/// 单个变量的估计统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EstimateStats {
    /// 写入的点数
    pub written: usize,
    /// 被截断的点数
    pub clamped: usize,
    /// 被水深门限置零的点数
    pub gated: usize,
    /// 样本不足的点数
    pub insufficient: usize,
    /// 零离差未写入的点数
    pub degenerate: usize,
}

impl EstimateStats {
    fn merge(self, other: Self) -> Self {
        Self {
            written: self.written + other.written,
            clamped: self.clamped + other.clamped,
            gated: self.gated + other.gated,
            insufficient: self.insufficient + other.insufficient,
            degenerate: self.degenerate + other.degenerate,
        }
    }
}

/// 局部方差估计器
pub struct LocalVarianceEstimator<'a> {
    neighbors: &'a NeighborTable,
    ghost: &'a [bool],
    strategy: &'a EstimatorStrategy,
}

impl<'a> LocalVarianceEstimator<'a> {
    /// 创建估计器
    pub fn new(neighbors: &'a NeighborTable, ghost: &'a [bool], strategy: &'a EstimatorStrategy) -> Self {
        Self {
            neighbors,
            ghost,
            strategy,
        }
    }

    /// 校验输入形状
    fn check_inputs(&self, inputs: &EstimatorInputs<'_>, out: &Field) -> DiagbResult<()> {
        let bkg = inputs.background;
        bkg.check_same_shape(out)?;

        if self.neighbors.n_nodes() != bkg.n_nodes() || self.ghost.len() != bkg.n_nodes() {
            return Err(DiagbError::shape(
                bkg.name(),
                format!("{} 节点（邻居表）", self.neighbors.n_nodes()),
                format!("{} 节点", bkg.n_nodes()),
            ));
        }

        if let Some(h) = inputs.thickness {
            if h.n_nodes() != bkg.n_nodes() || h.n_levels() < bkg.n_levels() {
                return Err(DiagbError::shape(
                    h.name(),
                    format!("{} 节点, 至少 {} 层", bkg.n_nodes(), bkg.n_levels()),
                    format!("{}x{}", h.n_nodes(), h.n_levels()),
                ));
            }
        }

        if let Some(v) = inputs.vertical {
            if v.bathymetry_values().len() != bkg.n_nodes() {
                return Err(DiagbError::shape(
                    "bathymetry",
                    bkg.n_nodes(),
                    v.bathymetry_values().len(),
                ));
            }
        }
        Ok(())
    }

    /// 估计单个 (节点, 层)
    ///
    /// `samples` 为复用的样本缓冲区。
    pub fn estimate_point(
        &self,
        inputs: &EstimatorInputs<'_>,
        node: usize,
        level: usize,
        samples: &mut Vec<f64>,
    ) -> PointOutcome {
        let strategy = self.strategy;

        // 1. 水深门限
        let bathymetry = inputs.vertical.map(|v| v.bathymetry(node));
        if strategy.mask.gated(bathymetry) {
            return PointOutcome::Gated;
        }

        // 2. 垂向窗口
        let n_levels = inputs.background.n_levels();
        let mld_index = inputs.vertical.and_then(|v| v.mld_index(node));
        let (lo, hi) = strategy.vertical_window.window(level, n_levels, mld_index);

        // 3. 收集样本
        let neighbors = self.neighbors.neighbors(node);
        samples.clear();
        for &m in neighbors {
            for ll in lo..=hi {
                if inputs.thickness.is_some_and(|h| !is_wet(h.get(m, ll))) {
                    continue;
                }
                samples.push(inputs.background.get(m, ll));
            }
        }

        // 4. 样本数检查
        let count = samples.len();
        if count < strategy.min_count || count == 0 {
            return PointOutcome::Insufficient;
        }

        // 5-6. 均值与离差
        let span = match strategy.dispersion_span {
            DispersionSpan::NeighborCount => neighbors.len().min(count),
            DispersionSpan::AllSamples => count,
        };
        let dispersion = dispersion(samples, span);

        // 7. 写回
        if dispersion > 0.0 || count > 2 {
            PointOutcome::Written((dispersion / (count - 1) as f64).sqrt())
        } else {
            PointOutcome::Degenerate
        }
    }

    /// 估计一个变量的标准差，写入 `out`
    ///
    /// `out` 通常为零初始化；未写入的点保持原值。
    pub fn estimate(
        &self,
        inputs: &EstimatorInputs<'_>,
        out: &mut Field,
    ) -> DiagbResult<EstimateStats> {
        self.check_inputs(inputs, out)?;

        let n_levels = out.n_levels();
        let limit = self.strategy.clamp.limit_for(inputs.background.name());

        let stats = out
            .values_mut()
            .par_chunks_mut(n_levels)
            .enumerate()
            .map_init(Vec::new, |samples, (node, column)| {
                let mut stats = EstimateStats::default();
                if self.ghost[node] {
                    return stats;
                }
                for (level, value) in column.iter_mut().enumerate() {
                    match self.estimate_point(inputs, node, level, samples) {
                        PointOutcome::Written(std) => {
                            stats.written += 1;
                            *value = match limit {
                                Some(max) if std > max => {
                                    stats.clamped += 1;
                                    max
                                }
                                _ => std,
                            };
                        }
                        PointOutcome::Gated => {
                            stats.gated += 1;
                            *value = 0.0;
                        }
                        PointOutcome::Insufficient => stats.insufficient += 1,
                        PointOutcome::Degenerate => stats.degenerate += 1,
                    }
                }
                stats
            })
            .reduce(EstimateStats::default, EstimateStats::merge);

        debug!(
            "{}: 写入 {}, 截断 {}, 门限 {}, 样本不足 {}, 零离差 {}",
            inputs.background.name(),
            stats.written,
            stats.clamped,
            stats.gated,
            stats.insufficient,
            stats.degenerate
        );
        Ok(stats)
    }
}

/// 以全部样本的均值为中心，累加前 `span` 个样本的离差平方
pub fn dispersion(samples: &[f64], span: usize) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples[..span.min(samples.len())]
        .iter()
        .map(|x| (x - mean) * (x - mean))
        .sum()
}

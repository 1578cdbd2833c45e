// crates/mh_diagb/src/strategy.rs

//! 估计器策略
//!
//! 三类应用（大气/化学、简化海洋、完整海洋）共用一个估计器，
//! 差异由策略对象 `{垂向窗口, 掩码, 截断}` 表达。

use mh_config::{DiagbConfig, DispersionSpan, StrategyPreset};

/// 垂向窗口策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalWindowPolicy {
    /// `[max(0, l - nbz), l + nbz]`
    Symmetric {
        /// 半窗口 nbz
        half_window: usize,
    },
    /// 混合层以上使用固定近表层窗口，以下同 `Symmetric`
    MixedLayer {
        /// 半窗口 nbz
        half_window: usize,
        /// 近表层窗口 [起始层, 结束层]
        surface: [usize; 2],
        /// 混合层层号下限
        floor: usize,
    },
}

impl VerticalWindowPolicy {
    /// 计算 (节点, 层) 的垂向窗口，闭区间且截断到有效层范围
    ///
    /// `mld_index` 为未加下限的混合层层号；缺省时退化为对称窗口。
    pub fn window(&self, level: usize, n_levels: usize, mld_index: Option<usize>) -> (usize, usize) {
        let top = n_levels.saturating_sub(1);
        if n_levels <= 1 {
            return (0, 0);
        }
        match *self {
            Self::MixedLayer { surface, floor, .. }
                if mld_index.is_some_and(|idx| level < idx.max(floor)) =>
            {
                (surface[0].min(top), surface[1].min(top))
            }
            Self::Symmetric { half_window } | Self::MixedLayer { half_window, .. } => (
                level.saturating_sub(half_window),
                (level + half_window).min(top),
            ),
        }
    }

    /// 是否需要混合层层号
    pub fn needs_mixed_layer(&self) -> bool {
        matches!(self, Self::MixedLayer { .. })
    }
}

/// 掩码策略
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaskPolicy {
    /// 必须提供层厚场
    ///
    /// 有层厚场时层厚 ≤ 0.1 的样本总被剔除，与该开关无关。
    pub require_thickness: bool,
    /// 水深代理小于该值的节点输出置零
    pub min_depth: Option<f64>,
}

impl MaskPolicy {
    /// 节点是否被水深门限屏蔽
    #[inline]
    pub fn gated(&self, bathymetry: Option<f64>) -> bool {
        match (self.min_depth, bathymetry) {
            (Some(min), Some(b)) => b < min,
            _ => false,
        }
    }
}

/// 截断策略
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ClampPolicy {
    /// 不截断
    #[default]
    None,
    /// 指定变量的标准差不超过上限
    Max {
        /// 变量名
        variable: String,
        /// 上限
        max: f64,
    },
}

impl ClampPolicy {
    /// 变量的截断上限
    pub fn limit_for(&self, variable: &str) -> Option<f64> {
        match self {
            Self::Max { variable: v, max } if v == variable => Some(*max),
            _ => None,
        }
    }
}

/// 估计器策略
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorStrategy {
    /// 垂向窗口
    pub vertical_window: VerticalWindowPolicy,
    /// 掩码
    pub mask: MaskPolicy,
    /// 截断
    pub clamp: ClampPolicy,
    /// 离差平方和累加范围
    pub dispersion_span: DispersionSpan,
    /// 最小样本数
    pub min_count: usize,
}

impl EstimatorStrategy {
    /// 大气/化学：层厚场可缺省，无门限、无截断
    pub fn atmosphere(half_window: usize, min_count: usize) -> Self {
        Self {
            vertical_window: VerticalWindowPolicy::Symmetric { half_window },
            mask: MaskPolicy::default(),
            clamp: ClampPolicy::None,
            dispersion_span: DispersionSpan::NeighborCount,
            min_count,
        }
    }

    /// 简化海洋：干点剔除与截断，无混合层窗口
    pub fn simple_ocean(half_window: usize, min_count: usize, clamp: ClampPolicy) -> Self {
        Self {
            vertical_window: VerticalWindowPolicy::Symmetric { half_window },
            mask: MaskPolicy {
                require_thickness: true,
                min_depth: None,
            },
            clamp,
            dispersion_span: DispersionSpan::NeighborCount,
            min_count,
        }
    }

    /// 完整海洋：混合层窗口、干点剔除、水深门限、截断
    pub fn full_ocean(
        half_window: usize,
        min_count: usize,
        min_depth: Option<f64>,
        clamp: ClampPolicy,
    ) -> Self {
        Self {
            vertical_window: VerticalWindowPolicy::MixedLayer {
                half_window,
                surface: [0, 1],
                floor: 10,
            },
            mask: MaskPolicy {
                require_thickness: true,
                min_depth,
            },
            clamp,
            dispersion_span: DispersionSpan::NeighborCount,
            min_count,
        }
    }

    /// 指定离差累加范围
    pub fn with_dispersion_span(mut self, span: DispersionSpan) -> Self {
        self.dispersion_span = span;
        self
    }

    /// 从运行配置构建
    pub fn from_config(config: &DiagbConfig) -> Self {
        let nbz = config.vertical_half_window;
        let min_count = config.min_sample_count;
        let clamp = config.max_ssh.map_or(ClampPolicy::None, |max| ClampPolicy::Max {
            variable: config.ssh_variable.clone(),
            max,
        });

        let mut strategy = match config.strategy {
            StrategyPreset::Atmosphere => Self::atmosphere(nbz, min_count),
            StrategyPreset::SimpleOcean => {
                let mut s = Self::simple_ocean(nbz, min_count, clamp);
                s.mask.min_depth = config.min_depth;
                s
            }
            StrategyPreset::FullOcean => {
                let mut s = Self::full_ocean(nbz, min_count, config.min_depth, clamp);
                let ml = &config.mixed_layer;
                s.vertical_window = if ml.enabled {
                    VerticalWindowPolicy::MixedLayer {
                        half_window: nbz,
                        surface: ml.window,
                        floor: ml.floor_level,
                    }
                } else {
                    VerticalWindowPolicy::Symmetric { half_window: nbz }
                };
                s
            }
        };
        strategy.dispersion_span = config.dispersion_span;
        strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_level_window() {
        let p = VerticalWindowPolicy::Symmetric { half_window: 3 };
        assert_eq!(p.window(0, 1, None), (0, 0));
    }

    #[test]
    fn test_symmetric_window_clipped() {
        let p = VerticalWindowPolicy::Symmetric { half_window: 2 };
        assert_eq!(p.window(0, 10, None), (0, 2));
        assert_eq!(p.window(5, 10, None), (3, 7));
        assert_eq!(p.window(9, 10, None), (7, 9));
    }

    #[test]
    fn test_mixed_layer_window() {
        let p = VerticalWindowPolicy::MixedLayer {
            half_window: 1,
            surface: [0, 1],
            floor: 10,
        };
        // mld 层号 3 被抬到下限 10
        assert_eq!(p.window(7, 20, Some(3)), (0, 1));
        assert_eq!(p.window(10, 20, Some(3)), (9, 11));
        // mld 层号 15 高于下限
        assert_eq!(p.window(12, 20, Some(15)), (0, 1));
        assert_eq!(p.window(15, 20, Some(15)), (14, 16));
        // 无混合层信息时退化为对称窗口
        assert_eq!(p.window(2, 20, None), (1, 3));
    }

    #[test]
    fn test_mask_gate() {
        let m = MaskPolicy {
            require_thickness: true,
            min_depth: Some(100.0),
        };
        assert!(m.gated(Some(50.0)));
        assert!(!m.gated(Some(100.0)));
        assert!(!m.gated(None));
        assert!(!MaskPolicy::default().gated(Some(0.0)));
    }

    #[test]
    fn test_clamp_limit() {
        let c = ClampPolicy::Max {
            variable: "ssh".into(),
            max: 0.2,
        };
        assert_eq!(c.limit_for("ssh"), Some(0.2));
        assert_eq!(c.limit_for("tocn"), None);
        assert_eq!(ClampPolicy::None.limit_for("ssh"), None);
    }

    #[test]
    fn test_from_config_presets() {
        let yaml = "geometry: g\nbackground: b\nvariables: [ssh]\nbackground error: o\nmax ssh: 0.3\nmin depth: 200\n";
        let mut config = DiagbConfig::from_yaml_str(yaml).unwrap();

        let s = EstimatorStrategy::from_config(&config);
        assert!(s.vertical_window.needs_mixed_layer());
        assert_eq!(s.mask.min_depth, Some(200.0));
        assert_eq!(s.clamp.limit_for("ssh"), Some(0.3));

        config.strategy = StrategyPreset::Atmosphere;
        let s = EstimatorStrategy::from_config(&config);
        assert!(!s.mask.require_thickness);
        assert_eq!(s.clamp, ClampPolicy::None);

        config.strategy = StrategyPreset::FullOcean;
        config.mixed_layer.enabled = false;
        config.dispersion_span = DispersionSpan::AllSamples;
        let s = EstimatorStrategy::from_config(&config);
        assert!(!s.vertical_window.needs_mixed_layer());
        assert_eq!(s.dispersion_span, DispersionSpan::AllSamples);
    }
}

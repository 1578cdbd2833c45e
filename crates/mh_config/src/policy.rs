// crates/mh_config/src/policy.rs

//! 策略预设与可选行为
//!
//! 同一个估计器服务三类应用（大气/化学、简化海洋、完整海洋），
//! 差异只体现在这里的枚举上。

use serde::{Deserialize, Serialize};

/// 估计器策略预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrategyPreset {
    /// 大气/化学：无水深门限、无混合层窗口、无截断
    #[serde(rename = "atmosphere")]
    Atmosphere,
    /// 简化海洋：干点剔除 + 截断，无混合层窗口
    #[serde(rename = "simple ocean")]
    SimpleOcean,
    /// 完整海洋：全部策略
    #[default]
    #[serde(rename = "full ocean")]
    FullOcean,
}

/// 离差平方和的累加范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DispersionSpan {
    /// 只累加样本列表的前 |N(n)| 项（邻居数）
    #[default]
    #[serde(rename = "neighbor count")]
    NeighborCount,
    /// 累加全部样本
    #[serde(rename = "all samples")]
    AllSamples,
}

/// 垂向平滑迭代方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalSmoothingMode {
    /// 每次迭代都读取循环开始前的快照
    #[default]
    Frozen,
    /// 每次迭代读取上一次迭代的结果
    Progressive,
}

/// 扩散方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffusionMode {
    /// 仅水平
    #[default]
    Horizontal,
    /// 仅垂向
    Vertical,
    /// 水平 + 垂向
    Both,
}

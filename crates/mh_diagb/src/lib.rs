// crates/mh_diagb/src/lib.rs

//! MariHydro DiagB 背景误差方差估计
//!
//! 只有一个确定性背景场、没有集合成员时，用局部邻域内的样本标准差
//! 近似背景误差协方差矩阵的对角线。
//!
//! # 模块概览
//!
//! - [`field`]: 节点 × 层场与场集合
//! - [`vertical`]: 层中心深度、水深代理、混合层层号
//! - [`strategy`]: 垂向窗口、掩码、截断策略与三类预设
//! - [`estimator`]: 局部方差估计器
//! - [`smoothing`]: 水平邻居平均与垂向三点平均
//! - [`diffusion`]: 扩散算子接口与图扩散实现
//! - [`blend`]: 气候态误差插值与混合
//! - [`rescale`]: 全局缩放、标量缩放、水深门限与截断
//! - [`io`]: 场集合读写
//! - [`pipeline`]: 估计链与按配置执行的流水线
//!
//! # 示例
//!
//! ```
//! use mh_diagb::prelude::*;
//! use mh_mesh::{MeshGeometry, MeshNode, StencilSource};
//!
//! let nodes = (0..5).map(|i| MeshNode::owned(i as f64 * 0.1, 0.0)).collect();
//! let edges = (1..5).map(|i| vec![i - 1, i]).collect();
//! let geometry = MeshGeometry::new(nodes, edges);
//!
//! let options = EngineOptions::new(EstimatorStrategy::atmosphere(0, 2));
//! let engine = DiagbEngine::new(geometry, StencilSource::Edges, options).unwrap();
//!
//! let mut background = FieldSet::new();
//! background
//!     .insert(Field::from_values("t", 1, vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap())
//!     .unwrap();
//!
//! let out = engine
//!     .run(&mut background, &["t".to_string()], &PostProcessing::default())
//!     .unwrap();
//! let std = out.stddev.get("t").unwrap().get(2, 0);
//! assert!((std - 2.0_f64.sqrt()).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blend;
pub mod diffusion;
pub mod error;
pub mod estimator;
pub mod field;
pub mod io;
pub mod pipeline;
pub mod rescale;
pub mod smoothing;
pub mod strategy;
pub mod vertical;

pub use error::{DiagbError, DiagbResult};
pub use field::{Field, FieldSet};
pub use pipeline::{DiagbEngine, DiagbPipeline, RunReport, VariableReport};

/// 预导入模块
pub mod prelude {
    pub use crate::blend::{hybrid_blend, BlendWeights, NearestNeighborRegridder, Regridder};
    pub use crate::diffusion::{DiffusionOperator, GraphDiffusion, ScaleFields};
    pub use crate::error::{DiagbError, DiagbResult};
    pub use crate::estimator::{EstimatorInputs, LocalVarianceEstimator, PointOutcome};
    pub use crate::field::{Field, FieldSet};
    pub use crate::io::{FieldStore, JsonFieldStore};
    pub use crate::pipeline::{
        DiagbEngine, DiagbPipeline, EngineOptions, EngineOutput, PostProcessing, RunReport,
        VariableReport,
    };
    pub use crate::strategy::{ClampPolicy, EstimatorStrategy, MaskPolicy, VerticalWindowPolicy};
    pub use crate::vertical::VerticalStructure;
}

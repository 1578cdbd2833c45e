// crates/mh_mesh/src/lib.rs

//! MariHydro 网格模块
//!
//! 为背景误差方差估计提供分区网格的只读视图。
//!
//! # 核心类型
//!
//! - [`MeshGeometry`]: 节点数组（位置、ghost 标记、归属节点）与边连接
//! - [`NeighborTable`]: CSR 格式的节点邻居表，一次构建、全程只读
//! - [`StencilSource`]: 邻居模板来源（边连接或球面 k 近邻）
//! - [`HaloExchange`]: halo 同步接口
//!
//! # 示例
//!
//! ```rust
//! use mh_mesh::{MeshGeometry, MeshNode, StencilSource};
//!
//! let nodes = (0..3).map(|i| MeshNode::owned(i as f64, 0.0)).collect();
//! let geometry = MeshGeometry::new(nodes, vec![vec![0, 1], vec![1, 2]]);
//! let table = StencilSource::Edges.build(&geometry).unwrap();
//!
//! assert_eq!(table.neighbors(1), &[0, 2]);
//! assert!(table.neighbors(99).is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod geometry;
pub mod halo;
pub mod io;
pub mod stencil;
pub mod topology;

pub use error::{MeshError, MeshResult};
pub use geometry::{MeshGeometry, MeshNode};
pub use halo::{GhostCopyHalo, HaloExchange, NoHalo};
pub use stencil::StencilSource;
pub use topology::{DegreeStats, NeighborTable};

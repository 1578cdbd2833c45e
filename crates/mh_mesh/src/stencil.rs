// crates/mh_mesh/src/stencil.rs
//! 邻居模板构建
//!
//! 每个网格只构建一次：
//! - `Edges`: 由边连接推导，每条边为两个端点互相添加邻居
//! - `Nearest`: 对每个节点做球面 k 近邻查询，结果不要求对称

use mh_geo::SphericalIndex;
use rayon::prelude::*;
use tracing::debug;

use crate::error::MeshResult;
use crate::geometry::MeshGeometry;
use crate::topology::NeighborTable;

/// 邻居模板来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilSource {
    /// 边连接
    #[default]
    Edges,
    /// 大圆距离最近的 `nbh` 个节点（不含自身）
    Nearest {
        /// 邻居数
        nbh: usize,
    },
}

impl StencilSource {
    /// 构建邻居表
    pub fn build(self, geometry: &MeshGeometry) -> MeshResult<NeighborTable> {
        let table = match self {
            Self::Edges => build_from_edges(geometry)?,
            Self::Nearest { nbh } => build_from_nearest(geometry, nbh),
        };
        let stats = table.degree_stats();
        debug!(
            "邻居表: {:?}, {} 节点, 度 min={} max={} mean={:.2}",
            self,
            table.n_nodes(),
            stats.min,
            stats.max,
            stats.mean
        );
        Ok(table)
    }
}

/// 从边连接构建邻居表
///
/// 端点数不为 2 或端点越界的边是致命的网格错误。
pub fn build_from_edges(geometry: &MeshGeometry) -> MeshResult<NeighborTable> {
    geometry.validate_edges()?;

    let mut rows = vec![Vec::new(); geometry.n_nodes()];
    for edge in &geometry.edges {
        let (a, b) = (edge[0], edge[1]);
        rows[a].push(b);
        rows[b].push(a);
    }
    Ok(NeighborTable::from_rows(rows))
}

/// 基于球面 k 近邻构建邻居表
pub fn build_from_nearest(geometry: &MeshGeometry, nbh: usize) -> NeighborTable {
    let index = SphericalIndex::bulk_load(
        geometry
            .positions()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (p, i))
            .collect(),
    );

    let rows: Vec<Vec<usize>> = (0..geometry.n_nodes())
        .into_par_iter()
        .map(|node| {
            // 多取一个以便剔除自身
            index
                .query_nearest(&geometry.position(node), nbh + 1)
                .into_iter()
                .map(|(_, &j)| j)
                .filter(|&j| j != node)
                .take(nbh)
                .collect()
        })
        .collect();

    NeighborTable::from_rows(rows)
}

// crates/mh_mesh/src/geometry.rs
//! 分区网格几何
//!
//! 本进程持有的节点 = 自有节点 + ghost 节点。ghost 节点从相邻分区复制，
//! 只作为模板的取值来源，从不作为计算目标。

use mh_geo::LonLat;
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// 网格节点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshNode {
    /// 水平位置（经纬度，度）
    pub position: LonLat,
    /// 是否为 ghost 节点
    #[serde(default)]
    pub ghost: bool,
    /// ghost 节点在本进程内的归属节点（用于进程内 halo 复制）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<usize>,
}

impl MeshNode {
    /// 自有节点
    pub fn owned(lon: f64, lat: f64) -> Self {
        Self {
            position: LonLat::new(lon, lat),
            ghost: false,
            owner: None,
        }
    }

    /// ghost 节点，值从 `owner` 复制
    pub fn ghost(lon: f64, lat: f64, owner: usize) -> Self {
        Self {
            position: LonLat::new(lon, lat),
            ghost: true,
            owner: Some(owner),
        }
    }
}

/// 分区网格几何
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshGeometry {
    /// 节点数组（自有 + ghost）
    pub nodes: Vec<MeshNode>,
    /// 边连接，每条边应引用恰好两个节点
    #[serde(default)]
    pub edges: Vec<Vec<usize>>,
}

impl MeshGeometry {
    /// 创建几何
    pub fn new(nodes: Vec<MeshNode>, edges: Vec<Vec<usize>>) -> Self {
        Self { nodes, edges }
    }

    /// 节点总数（含 ghost）
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// 自有节点数
    pub fn n_owned(&self) -> usize {
        self.nodes.iter().filter(|n| !n.ghost).count()
    }

    /// ghost 节点数
    pub fn n_ghosts(&self) -> usize {
        self.n_nodes() - self.n_owned()
    }

    /// 边数
    #[inline]
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// 节点位置
    #[inline]
    pub fn position(&self, node: usize) -> LonLat {
        self.nodes[node].position
    }

    /// 是否为 ghost 节点，越界索引视为 ghost（不可作为计算目标）
    #[inline]
    pub fn is_ghost(&self, node: usize) -> bool {
        self.nodes.get(node).map_or(true, |n| n.ghost)
    }

    /// ghost 标记数组
    pub fn ghost_mask(&self) -> Vec<bool> {
        self.nodes.iter().map(|n| n.ghost).collect()
    }

    /// 所有节点位置
    pub fn positions(&self) -> Vec<LonLat> {
        self.nodes.iter().map(|n| n.position).collect()
    }

    /// 校验节点坐标
    pub fn validate_positions(&self) -> MeshResult<()> {
        for node in &self.nodes {
            LonLat::checked(node.position.lon, node.position.lat)?;
        }
        Ok(())
    }

    /// 校验边连接：每条边两个端点且端点在范围内
    pub fn validate_edges(&self) -> MeshResult<()> {
        let n = self.n_nodes();
        for (e, edge) in self.edges.iter().enumerate() {
            if edge.len() != 2 {
                return Err(MeshError::InvalidEdge { edge: e, count: edge.len() });
            }
            for &node in edge {
                if node >= n {
                    return Err(MeshError::node_out_of_range("edge", node, n));
                }
            }
        }
        Ok(())
    }
}

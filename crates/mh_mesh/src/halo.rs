// crates/mh_mesh/src/halo.rs
//! halo 同步
//!
//! 任何读取邻居值的阶段之前都必须同步 ghost 节点：
//! 每个变量的方差估计前一次，每次水平平滑迭代前一次。
//! 跨进程通信不在本模块范围内，这里只定义接口和进程内实现。

use crate::error::{MeshError, MeshResult};
use crate::geometry::MeshGeometry;

/// halo 同步接口
///
/// `values` 为节点优先布局 `values[node * n_levels + level]`。
pub trait HaloExchange: Send + Sync {
    /// 刷新 ghost 节点的值
    fn sync(&self, values: &mut [f64], n_levels: usize) -> MeshResult<()>;

    /// 名称
    fn name(&self) -> &'static str;
}

/// 单分区运行：无 ghost 需要刷新
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHalo;

impl HaloExchange for NoHalo {
    fn sync(&self, _values: &mut [f64], _n_levels: usize) -> MeshResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// 进程内 ghost 复制
///
/// 每个 ghost 节点整列复制其归属节点的值。没有归属节点的 ghost 保持原值。
#[derive(Debug, Clone, Default)]
pub struct GhostCopyHalo {
    n_nodes: usize,
    /// (ghost, owner) 对
    links: Vec<(usize, usize)>,
}

impl GhostCopyHalo {
    /// 从几何中的 ghost → owner 映射构建
    pub fn from_geometry(geometry: &MeshGeometry) -> MeshResult<Self> {
        let n = geometry.n_nodes();
        let mut links = Vec::new();

        for (ghost, node) in geometry.nodes.iter().enumerate() {
            let Some(owner) = node.owner else { continue };
            if !node.ghost {
                return Err(MeshError::HaloMismatch {
                    ghost,
                    reason: "非 ghost 节点不能有归属节点".to_string(),
                });
            }
            if owner >= n {
                return Err(MeshError::HaloMismatch {
                    ghost,
                    reason: format!("归属节点 {owner} 越界 (节点数 {n})"),
                });
            }
            if geometry.nodes[owner].ghost {
                return Err(MeshError::HaloMismatch {
                    ghost,
                    reason: format!("归属节点 {owner} 本身是 ghost"),
                });
            }
            links.push((ghost, owner));
        }

        Ok(Self { n_nodes: n, links })
    }

    /// 映射数
    pub fn n_links(&self) -> usize {
        self.links.len()
    }
}

impl HaloExchange for GhostCopyHalo {
    fn sync(&self, values: &mut [f64], n_levels: usize) -> MeshResult<()> {
        let expected = self.n_nodes * n_levels;
        if values.len() != expected {
            return Err(MeshError::SizeMismatch {
                name: "halo field",
                expected,
                actual: values.len(),
            });
        }
        for &(ghost, owner) in &self.links {
            let src = owner * n_levels;
            values.copy_within(src..src + n_levels, ghost * n_levels);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ghost-copy"
    }
}

// crates/mh_mesh/src/error.rs
//! 网格一致性错误类型
//!
//! 任何网格错误对一次运行都是致命的，向上传播后由调用方终止。

use mh_geo::GeoError;
use thiserror::Error;

/// 网格模块结果类型
pub type MeshResult<T> = Result<T, MeshError>;

/// 网格错误枚举
#[derive(Error, Debug)]
pub enum MeshError {
    /// 边的端点数不是 2
    #[error("无效边: 边 {edge} 引用了 {count} 个节点, 期望 2")]
    InvalidEdge {
        /// 边索引
        edge: usize,
        /// 实际端点数
        count: usize,
    },

    /// 节点索引越界
    #[error("节点索引越界: {context} 引用节点 {node}, 节点数 {n_nodes}")]
    NodeOutOfRange {
        /// 出错位置
        context: &'static str,
        /// 节点索引
        node: usize,
        /// 节点总数
        n_nodes: usize,
    },

    /// ghost 节点的归属映射无效
    #[error("halo 映射无效: ghost 节点 {ghost}, {reason}")]
    HaloMismatch {
        /// ghost 节点
        ghost: usize,
        /// 原因
        reason: String,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望 {expected}, 实际 {actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 坐标错误
    #[error("坐标错误: {0}")]
    Geo(#[from] GeoError),

    /// 几何文件 IO 错误
    #[error("几何文件 IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 几何文件格式错误
    #[error("几何文件格式错误: {0}")]
    Format(String),
}

impl MeshError {
    /// 节点越界便捷构造
    pub fn node_out_of_range(context: &'static str, node: usize, n_nodes: usize) -> Self {
        Self::NodeOutOfRange { context, node, n_nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_edge_display() {
        let err = MeshError::InvalidEdge { edge: 7, count: 3 };
        let msg = err.to_string();
        assert!(msg.contains("边 7"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_geo_error_conversion() {
        let err: MeshError = GeoError::LatitudeOutOfRange { lat: 100.0 }.into();
        assert!(matches!(err, MeshError::Geo(_)));
    }
}

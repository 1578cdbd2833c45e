// crates/mh_diagb/src/error.rs

//! 方差估计错误类型
//!
//! 错误分类：
//! - 配置错误（缺键、非法值）：致命
//! - 网格一致性错误：致命
//! - 场形状不匹配、缺少变量：致命
//!
//! 样本不足和零离差不是错误，由估计器按规则静默处理。

use mh_config::ConfigError;
use mh_mesh::MeshError;
use thiserror::Error;

/// 结果类型
pub type DiagbResult<T> = Result<T, DiagbError>;

/// 方差估计错误
#[derive(Error, Debug)]
pub enum DiagbError {
    /// 场集合中缺少变量
    #[error("缺少场变量: {0}")]
    MissingField(String),

    /// 场形状不匹配
    #[error("场形状不匹配: {name} 期望 {expected}, 实际 {actual}")]
    ShapeMismatch {
        /// 场名称
        name: String,
        /// 期望描述
        expected: String,
        /// 实际描述
        actual: String,
    },

    /// 无效参数
    #[error("无效参数 {name}: {value} ({reason})")]
    InvalidParameter {
        /// 参数名
        name: &'static str,
        /// 参数值
        value: f64,
        /// 原因
        reason: String,
    },

    /// 算子尚未设置参数
    #[error("算子未配置: {0}")]
    NotConfigured(&'static str),

    /// 场文件格式错误
    #[error("场文件格式错误: {0}")]
    Format(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 网格错误
    #[error("网格错误: {0}")]
    Mesh(#[from] MeshError),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

impl DiagbError {
    /// 形状不匹配便捷构造
    pub fn shape(name: &str, expected: impl ToString, actual: impl ToString) -> Self {
        Self::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

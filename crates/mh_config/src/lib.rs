// crates/mh_config/src/lib.rs

//! MariHydro DiagB 配置层
//!
//! 解析背景误差方差估计的运行配置。配置键使用可读的空格拼写
//! （`min depth`、`simple smoothing` 等），与 YAML 文件保持一致。
//!
//! # 模块概览
//!
//! - [`diagb_config`]: 运行配置 [`DiagbConfig`] 与各子配置
//! - [`policy`]: 策略预设与可选行为枚举
//! - [`error`]: 配置错误类型
//!
//! # 示例
//!
//! ```
//! use mh_config::DiagbConfig;
//!
//! let yaml = r#"
//! geometry: geom.json
//! background: bkg.json
//! variables: [tocn, ssh]
//! background error: diagb.json
//! min depth: 500
//! "#;
//! let config = DiagbConfig::from_yaml_str(yaml).unwrap();
//! assert_eq!(config.variables, vec!["tocn", "ssh"]);
//! assert_eq!(config.min_depth, Some(500.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diagb_config;
pub mod error;
pub mod policy;

pub use diagb_config::{
    ClimateConfig, DiagbConfig, DiffusionConfig, MixedLayerConfig, SmoothingConfig,
};
pub use error::ConfigError;
pub use policy::{DiffusionMode, DispersionSpan, StrategyPreset, VerticalSmoothingMode};

// crates/mh_config/src/diagb_config.rs

//! DiagbConfig - 背景误差方差估计运行配置
//!
//! 文件先解析为全部可选的原始结构，再检查必需键并填充默认值。
//! 必需键：`geometry`、`background`、`variables`、`background error`。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::policy::{DiffusionMode, DispersionSpan, StrategyPreset, VerticalSmoothingMode};

fn default_min_sample_count() -> usize { 3 }
fn default_vertical_half_window() -> usize { 1 }
fn default_thickness_variable() -> String { "hocn".to_string() }
fn default_ssh_variable() -> String { "ssh".to_string() }
fn default_rescale() -> f64 { 1.0 }
fn default_halo_points() -> usize { 1 }
fn default_mld_variable() -> String { "mld".to_string() }
fn default_mld_floor() -> usize { 10 }
fn default_mld_window() -> [usize; 2] { [0, 1] }
fn default_true() -> bool { true }

/// 混合层窗口配置
///
/// 目标层位于混合层以上时，使用固定的近表层窗口代替该层自身的垂向邻域。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixedLayerConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 混合层深度诊断变量名
    #[serde(default = "default_mld_variable")]
    pub variable: String,
    /// 混合层层号下限
    #[serde(rename = "floor level", default = "default_mld_floor")]
    pub floor_level: usize,
    /// 近表层窗口 [起始层, 结束层]
    #[serde(default = "default_mld_window")]
    pub window: [usize; 2],
}

impl Default for MixedLayerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            variable: default_mld_variable(),
            floor_level: default_mld_floor(),
            window: default_mld_window(),
        }
    }
}

/// 简单平滑配置
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmoothingConfig {
    /// 水平平滑迭代次数
    #[serde(rename = "horizontal iterations", default)]
    pub horizontal_iterations: usize,
    /// 垂向平滑迭代次数
    #[serde(rename = "vertical iterations", default)]
    pub vertical_iterations: usize,
    /// 垂向平滑迭代方式
    #[serde(rename = "vertical mode", default)]
    pub vertical_mode: VerticalSmoothingMode,
}

/// 扩散滤波配置
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffusionConfig {
    /// 水平长度尺度 [m]
    #[serde(default)]
    pub horizontal: f64,
    /// 垂向长度尺度 [m]
    #[serde(default)]
    pub vertical: f64,
    /// 扩散方向
    #[serde(default)]
    pub mode: DiffusionMode,
}

/// 气候态背景误差混合配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateConfig {
    /// 气候态场所在网格
    pub geometry: PathBuf,
    /// 气候态标准差文件
    #[serde(rename = "stddev path")]
    pub stddev_path: PathBuf,
    /// 估计场权重 w ∈ [0, 1]
    #[serde(rename = "diagb weight")]
    pub diagb_weight: f64,
    /// 气候态场缩放系数 r
    #[serde(rename = "staticb rescaling factor")]
    pub staticb_rescaling_factor: f64,
}

/// 运行配置
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagbConfig {
    /// 几何文件
    pub geometry: PathBuf,
    /// 背景场文件
    pub background: PathBuf,
    /// 需要估计的变量
    pub variables: Vec<String>,
    /// 输出标准差文件
    #[serde(rename = "background error")]
    pub output: PathBuf,
    /// 估计器策略预设
    pub strategy: StrategyPreset,
    /// 最小样本数
    #[serde(rename = "min sample count")]
    pub min_sample_count: usize,
    /// 垂向半窗口 nbz
    #[serde(rename = "vertical half window")]
    pub vertical_half_window: usize,
    /// 离差平方和累加范围
    #[serde(rename = "dispersion span")]
    pub dispersion_span: DispersionSpan,
    /// 层厚变量名
    #[serde(rename = "thickness variable")]
    pub thickness_variable: String,
    /// 最小水深门限 [m]
    #[serde(rename = "min depth", skip_serializing_if = "Option::is_none")]
    pub min_depth: Option<f64>,
    /// 海面高度标准差上限
    #[serde(rename = "max ssh", skip_serializing_if = "Option::is_none")]
    pub max_ssh: Option<f64>,
    /// 需要截断的变量名
    #[serde(rename = "ssh variable")]
    pub ssh_variable: String,
    /// 混合层窗口
    #[serde(rename = "mixed layer")]
    pub mixed_layer: MixedLayerConfig,
    /// 简单平滑
    #[serde(rename = "simple smoothing")]
    pub smoothing: SmoothingConfig,
    /// 扩散滤波
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffusion: Option<DiffusionConfig>,
    /// 整体缩放系数
    pub rescale: f64,
    /// 逐点缩放系数文件
    #[serde(rename = "global rescale", skip_serializing_if = "Option::is_none")]
    pub global_rescale: Option<PathBuf>,
    /// 气候态混合
    #[serde(rename = "climate background error", skip_serializing_if = "Option::is_none")]
    pub climate: Option<ClimateConfig>,
    /// halo 层数（由几何提供方使用）
    #[serde(rename = "number of halo points")]
    pub halo_points: usize,
    /// k 近邻模板的邻居数；缺省时使用边连接
    #[serde(rename = "number of neighbors", skip_serializing_if = "Option::is_none")]
    pub number_of_neighbors: Option<usize>,
}

/// 原始气候态配置（全部可选，用于报告缺失键）
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClimate {
    geometry: Option<PathBuf>,
    #[serde(rename = "stddev path")]
    stddev_path: Option<PathBuf>,
    #[serde(rename = "diagb weight")]
    diagb_weight: Option<f64>,
    #[serde(rename = "staticb rescaling factor")]
    staticb_rescaling_factor: Option<f64>,
}

/// 原始配置
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    geometry: Option<PathBuf>,
    background: Option<PathBuf>,
    variables: Option<Vec<String>>,
    #[serde(rename = "background error")]
    output: Option<PathBuf>,
    #[serde(default)]
    strategy: StrategyPreset,
    #[serde(rename = "min sample count", default = "default_min_sample_count")]
    min_sample_count: usize,
    #[serde(rename = "vertical half window", default = "default_vertical_half_window")]
    vertical_half_window: usize,
    #[serde(rename = "dispersion span", default)]
    dispersion_span: DispersionSpan,
    #[serde(rename = "thickness variable", default = "default_thickness_variable")]
    thickness_variable: String,
    #[serde(rename = "min depth")]
    min_depth: Option<f64>,
    #[serde(rename = "max ssh")]
    max_ssh: Option<f64>,
    #[serde(rename = "ssh variable", default = "default_ssh_variable")]
    ssh_variable: String,
    #[serde(rename = "mixed layer", default)]
    mixed_layer: MixedLayerConfig,
    #[serde(rename = "simple smoothing", default)]
    smoothing: SmoothingConfig,
    diffusion: Option<DiffusionConfig>,
    #[serde(default = "default_rescale")]
    rescale: f64,
    #[serde(rename = "global rescale")]
    global_rescale: Option<PathBuf>,
    #[serde(rename = "climate background error")]
    climate: Option<RawClimate>,
    #[serde(rename = "number of halo points", default = "default_halo_points")]
    halo_points: usize,
    #[serde(rename = "number of neighbors")]
    number_of_neighbors: Option<usize>,
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::Missing(key.to_string()))
}

impl RawClimate {
    fn resolve(self) -> Result<ClimateConfig, ConfigError> {
        Ok(ClimateConfig {
            geometry: required(self.geometry, "climate background error.geometry")?,
            stddev_path: required(self.stddev_path, "climate background error.stddev path")?,
            diagb_weight: required(self.diagb_weight, "climate background error.diagb weight")?,
            staticb_rescaling_factor: required(
                self.staticb_rescaling_factor,
                "climate background error.staticb rescaling factor",
            )?,
        })
    }
}

impl RawConfig {
    fn resolve(self) -> Result<DiagbConfig, ConfigError> {
        Ok(DiagbConfig {
            geometry: required(self.geometry, "geometry")?,
            background: required(self.background, "background")?,
            variables: required(self.variables, "variables")?,
            output: required(self.output, "background error")?,
            strategy: self.strategy,
            min_sample_count: self.min_sample_count,
            vertical_half_window: self.vertical_half_window,
            dispersion_span: self.dispersion_span,
            thickness_variable: self.thickness_variable,
            min_depth: self.min_depth,
            max_ssh: self.max_ssh,
            ssh_variable: self.ssh_variable,
            mixed_layer: self.mixed_layer,
            smoothing: self.smoothing,
            diffusion: self.diffusion,
            rescale: self.rescale,
            global_rescale: self.global_rescale,
            climate: self.climate.map(RawClimate::resolve).transpose()?,
            halo_points: self.halo_points,
            number_of_neighbors: self.number_of_neighbors,
        })
    }
}

impl DiagbConfig {
    /// 从 YAML 字符串解析并校验
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = raw.resolve()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 字符串解析并校验
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = raw.resolve()?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    ///
    /// `.json` 扩展名按 JSON 解析，其余按 YAML。相对路径以配置文件所在目录为基准。
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let mut config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// 把相对路径改写为以 `base` 为基准
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        fix(&mut self.geometry);
        fix(&mut self.background);
        fix(&mut self.output);
        if let Some(p) = self.global_rescale.as_mut() {
            fix(p);
        }
        if let Some(c) = self.climate.as_mut() {
            fix(&mut c.geometry);
            fix(&mut c.stddev_path);
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variables.is_empty() {
            return Err(ConfigError::invalid("variables", "[]", "至少需要一个变量"));
        }

        if self.min_sample_count == 0 {
            return Err(ConfigError::invalid("min sample count", 0, "必须至少为 1"));
        }

        let [lo, hi] = self.mixed_layer.window;
        if lo > hi {
            return Err(ConfigError::invalid(
                "mixed layer.window",
                format!("[{lo}, {hi}]"),
                "起始层不能大于结束层",
            ));
        }

        if let Some(d) = self.min_depth {
            if !d.is_finite() {
                return Err(ConfigError::invalid("min depth", d, "必须为有限值"));
            }
        }

        if let Some(m) = self.max_ssh {
            if !m.is_finite() || m < 0.0 {
                return Err(ConfigError::invalid("max ssh", m, "必须为非负有限值"));
            }
        }

        if let Some(diff) = &self.diffusion {
            for (key, value) in [
                ("diffusion.horizontal", diff.horizontal),
                ("diffusion.vertical", diff.vertical),
            ] {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::invalid(key, value, "长度尺度必须为非负有限值"));
                }
            }
        }

        if !self.rescale.is_finite() || self.rescale < 0.0 {
            return Err(ConfigError::invalid("rescale", self.rescale, "必须为非负有限值"));
        }

        if let Some(c) = &self.climate {
            if !(0.0..=1.0).contains(&c.diagb_weight) {
                return Err(ConfigError::invalid(
                    "climate background error.diagb weight",
                    c.diagb_weight,
                    "必须在 [0, 1] 范围内",
                ));
            }
            if !c.staticb_rescaling_factor.is_finite() || c.staticb_rescaling_factor < 0.0 {
                return Err(ConfigError::invalid(
                    "climate background error.staticb rescaling factor",
                    c.staticb_rescaling_factor,
                    "必须为非负有限值",
                ));
            }
        }

        if self.number_of_neighbors == Some(0) {
            return Err(ConfigError::invalid("number of neighbors", 0, "必须至少为 1"));
        }

        Ok(())
    }

    /// 转换为 YAML 字符串
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

// apps/mh_cli/src/commands/run.rs

//! 运行估计命令
//!
//! 读取配置，执行完整的估计流水线并写出标准差场。

use anyhow::{Context, Result};
use clap::Args;
use mh_diagb::DiagbPipeline;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// 运行参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 运行报告输出路径（JSON）
    #[arg(short, long)]
    pub report: Option<PathBuf>,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== MariHydro DiagB 启动 ===");

    let pipeline = DiagbPipeline::from_file(&args.config)
        .with_context(|| format!("加载配置失败: {}", args.config.display()))?;
    let config = pipeline.config();
    info!(
        "策略: {:?}, 变量: {:?}, 最小样本数: {}, 半窗口: {}",
        config.strategy, config.variables, config.min_sample_count, config.vertical_half_window
    );

    let start = Instant::now();
    let report = pipeline.run().context("估计失败")?;
    let elapsed = start.elapsed();

    info!("=== 估计完成 ===");
    info!("节点: {} ({} ghost)", report.n_nodes, report.n_ghosts);
    for var in &report.variables {
        info!(
            "{}: 写入 {}, 跳过 {}, 门限 {}, 截断 {}, min={:.4e} max={:.4e} mean={:.4e}",
            var.name, var.written, var.skipped, var.gated, var.clamped, var.min, var.max, var.mean
        );
    }
    info!("输出: {}", report.output.display());
    info!("计算时间: {:.2} s", elapsed.as_secs_f64());

    if let Some(path) = &args.report {
        let content = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, content)
            .with_context(|| format!("无法写出运行报告: {}", path.display()))?;
        info!("运行报告: {}", path.display());
    }

    Ok(())
}

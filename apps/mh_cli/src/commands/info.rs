// apps/mh_cli/src/commands/info.rs

//! 网格信息命令

use anyhow::{Context, Result};
use clap::Args;
use mh_mesh::io::load_geometry;
use mh_mesh::StencilSource;
use std::path::PathBuf;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 几何文件路径
    #[arg(short, long)]
    pub geometry: PathBuf,

    /// 使用 k 近邻模板（邻居数）代替边连接
    #[arg(short = 'k', long)]
    pub neighbors: Option<usize>,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== MariHydro DiagB 网格信息 ===");

    let geometry = load_geometry(&args.geometry)
        .with_context(|| format!("无法读取几何: {}", args.geometry.display()))?;
    let stencil = match args.neighbors {
        Some(nbh) => StencilSource::Nearest { nbh },
        None => StencilSource::Edges,
    };
    let table = stencil.build(&geometry).context("构建邻居表失败")?;
    let stats = table.degree_stats();

    println!("几何文件: {}", args.geometry.display());
    println!("  节点数:   {}", geometry.n_nodes());
    println!("  自有节点: {}", geometry.n_owned());
    println!("  ghost:    {}", geometry.n_ghosts());
    println!("  边数:     {}", geometry.n_edges());
    println!();
    println!("邻居模板: {:?}", stencil);
    println!("  邻居项:   {}", table.nnz());
    println!("  度:       min={} max={} mean={:.2}", stats.min, stats.max, stats.mean);

    let isolated = table.iter().filter(|row| row.is_empty()).count();
    if isolated > 0 {
        println!("  孤立节点: {}", isolated);
    }

    Ok(())
}

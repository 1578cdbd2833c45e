// apps/mh_cli/src/main.rs

//! MariHydro DiagB 命令行界面
//!
//! 由单一背景场估计背景误差标准差：
//!
//! - `run`: 按配置执行估计链并写出标准差场
//! - `validate`: 只解析并校验配置
//! - `info`: 检查几何与邻居表

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

#[derive(Parser)]
#[command(name = "mh_cli", version, about = "DiagB background error standard deviation from a single background")]
struct Cli {
    /// 日志级别
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 估计、后处理并写出标准差场
    Run(commands::run::RunArgs),
    /// 几何与邻居表统计
    Info(commands::info::InfoArgs),
    /// 校验运行配置
    Validate(commands::validate::ValidateArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("日志初始化失败: {e}"))?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsed() {
        let cli = Cli::try_parse_from(["mh_cli", "--log-level", "debug", "info", "--geometry", "g.json"]).unwrap();
        assert_eq!(Level::from(cli.log_level), Level::DEBUG);

        let cli = Cli::try_parse_from(["mh_cli", "info", "--geometry", "g.json"]).unwrap();
        assert_eq!(Level::from(cli.log_level), Level::INFO);

        assert!(Cli::try_parse_from(["mh_cli", "-l", "loud", "info", "--geometry", "g.json"]).is_err());
    }
}

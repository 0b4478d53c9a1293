use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// scopecache - 按作用域缓存依赖注入容器
#[derive(Parser, Debug)]
#[command(name = "scopecache")]
#[command(about = "Scoped dependency-injection container cache: inspect module documents, show settings, run the demo")]
pub struct Args {
    /// 子命令
    #[command(subcommand)]
    pub command: Command,

    /// 配置文件路径（默认读取当前目录下的 scopecache.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 解析模块配置文档并列出其中的模块
    Inspect {
        /// 模块配置文档（JSON）
        file: PathBuf,
        /// 输出规范化后的文档而不是模块列表
        #[arg(long)]
        normalize: bool,
    },
    /// 显示生效的配置
    Settings,
    /// 在内存作用域树上演示注册、缓存、移除与重建
    Demo,
}

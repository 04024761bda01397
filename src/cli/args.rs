use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "http-relay")]
#[command(author, version, about = "Keep-alive aware HTTP/1.x forwarding proxy", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 日志级别 (trace, debug, info, warn, error)，RUST_LOG 优先
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 运行转发服务
    Run {
        /// 配置文件路径（缺省时使用内置默认值）
        #[arg(short, long)]
        config: Option<String>,

        /// 覆盖监听地址
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,

        /// 覆盖上游地址
        #[arg(long, value_name = "ADDR")]
        upstream: Option<String>,
    },
    /// 检查配置文件格式是否正确
    Check {
        /// 配置文件路径
        #[arg(short, long)]
        config: String,

        /// 输出格式
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// 生成示例配置
    Template {
        /// 输出文件路径
        #[arg(short, long)]
        output: Option<String>,
    },
}

use std::convert::Infallible;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;
use crate::fetcher::DEFAULT_USER_AGENT;
use crate::matcher::MatchPolicy;

static CONF_DIR: LazyLock<String> = LazyLock::new(|| {
    ProjectDirs::from("", "", "prodsearch")
        .map(|dirs| dirs.config_dir().to_string_lossy().to_string())
        .unwrap_or_else(|| ".prodsearch".to_string())
});

fn default_config_dir() -> &'static str {
    CONF_DIR.as_str()
}

/// 特征向量维度至少为 1
pub(crate) fn dim_parser() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::<usize>::new().range(1..)
}

#[derive(Parser, Debug, Clone)]
pub struct ModelOptions {
    /// ONNX 模型路径，默认为配置目录下的 model.onnx
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,
    /// 特征向量维度，必须与模型输出一致
    #[arg(long, value_name = "D", default_value_t = 1000, value_parser = dim_parser())]
    pub dim: usize,
    /// 模型输入尺寸
    #[arg(long, value_name = "SIZE", default_value_t = 224, value_parser = clap::value_parser!(u32).range(1..))]
    pub input_size: u32,
    /// 裁剪前短边缩放到的尺寸
    #[arg(long, value_name = "SIZE", default_value_t = 232, value_parser = clap::value_parser!(u32).range(1..))]
    pub resize: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct FetchOptions {
    /// 单张图片的下载超时，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub fetch_timeout: u64,
    /// 同步缓存时并发处理的图片数量
    #[arg(long, value_name = "N", default_value_t = num_cpus::get())]
    pub workers: usize,
    /// 下载图片时使用的 User-Agent
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl FetchOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct MatchOptions {
    /// 匹配策略
    #[arg(long, value_enum, default_value_t = PolicyType::ExactDedup)]
    pub policy: PolicyType,
    /// 最低相似度（不含），exact-dedup 默认 0.8，top-k 默认 0.1
    #[arg(long, value_name = "SCORE")]
    pub min_score: Option<f32>,
    /// top-k 策略返回的最大结果数量
    #[arg(short, value_name = "K", default_value_t = 6)]
    pub k: usize,
}

impl MatchOptions {
    pub fn policy(&self) -> MatchPolicy {
        match self.policy {
            PolicyType::ExactDedup => {
                MatchPolicy::ExactDedup { min_score: self.min_score.unwrap_or(0.8) }
            }
            PolicyType::TopK => {
                MatchPolicy::TopK { k: self.k, min_score: self.min_score.unwrap_or(0.1) }
            }
        }
    }
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { policy: PolicyType::ExactDedup, min_score: None, k: 6 }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    /// 每个商品只保留最相似的一张图片
    ExactDedup,
    /// 按相似度返回前 k 张图片
    TopK,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "prodsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// prodsearch 配置目录，保存特征缓存与模型
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 同步商品目录并补全特征缓存
    Reload(ReloadCommand),
    /// 搜索与图片相似的商品
    Search(SearchCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
    /// 删除已不在目录中的图片的特征
    Clean(CleanCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    /// 返回特征缓存目录
    pub fn features(&self) -> PathBuf {
        self.path.join("features")
    }

    /// 返回默认模型路径
    pub fn model(&self) -> PathBuf {
        self.path.join("model.onnx")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

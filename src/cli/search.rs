use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::debug;

use crate::SearchResponse;
use crate::cli::{SubCommandExtend, load_catalog, open_service};
use crate::config::{FetchOptions, MatchOptions, ModelOptions, Opts};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 商品目录数据库（SQLite）
    #[arg(long, value_name = "PATH")]
    pub catalog: PathBuf,
    /// 被搜索的图片路径
    pub image: PathBuf,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let service =
            open_service(&opts.conf_dir, &self.model, &self.fetch, &self.matching, true)?;

        let catalog = load_catalog(&self.catalog).await?;
        let report = service.reload(&catalog).await?;
        debug!("索引已加载: {:?}", report);

        let file_name = self.image.to_string_lossy().to_string();
        let bytes = tokio::fs::read(&self.image).await?;
        let response = service.search(&file_name, bytes).await?;

        print_result(&response, self.output_format)
    }
}

fn print_result(response: &SearchResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?)
        }
        OutputFormat::Table => {
            for r in &response.results {
                println!("{:.3}\t{}\t{}\t{}", r.score, r.product_id, r.product.name, r.image_url);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

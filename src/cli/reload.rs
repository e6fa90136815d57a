use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use indicatif::ProgressBar;
use log::info;

use crate::cli::{SubCommandExtend, load_catalog, open_service};
use crate::config::{FetchOptions, MatchOptions, ModelOptions, Opts};
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct ReloadCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    /// 商品目录数据库（SQLite）
    #[arg(long, value_name = "PATH")]
    pub catalog: PathBuf,
}

impl SubCommandExtend for ReloadCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let matching = MatchOptions::default();
        let service = open_service(&opts.conf_dir, &self.model, &self.fetch, &matching, true)?;
        let catalog = load_catalog(&self.catalog).await?;

        let pb = ProgressBar::new_spinner().with_style(pb_style());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("正在同步 {} 张图片的特征", catalog.len()));

        let report = service.reload(&catalog).await?;

        pb.finish_with_message("同步完成");
        info!("索引状态: {:?}", service.state());
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

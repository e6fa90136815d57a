use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cache::FeatureCache;
use crate::cli::{SubCommandExtend, load_catalog};
use crate::config::{Opts, dim_parser};

#[derive(Parser, Debug, Clone)]
pub struct CleanCommand {
    /// 商品目录数据库（SQLite）
    #[arg(long, value_name = "PATH")]
    pub catalog: PathBuf,
    /// 特征向量维度
    #[arg(long, value_name = "D", default_value_t = 1000, value_parser = dim_parser())]
    pub dim: usize,
    /// 只统计，不删除
    #[arg(long)]
    pub dry_run: bool,
}

impl SubCommandExtend for CleanCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let cache = FeatureCache::open(opts.conf_dir.features(), self.dim)?;
        let catalog = load_catalog(&self.catalog).await?;
        let keep = catalog.iter().map(|r| r.image_id).collect::<HashSet<_>>();

        if self.dry_run {
            let stale = cache.ids()?.difference(&keep).count();
            println!("{} 条特征可以删除", stale);
            return Ok(());
        }

        let removed = cache.retain(&keep)?;
        info!("已删除 {} 条特征，剩余 {} 条", removed, cache.len()?);
        println!("{}", removed);
        Ok(())
    }
}

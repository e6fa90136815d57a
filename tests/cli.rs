mod common;

use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use prodsearch::cache::FeatureCache;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

#[test]
fn help_lists_subcommands() -> Result<()> {
    cargo_run!("prodsearch", "--help")
        .success()
        .stdout(predicate::str::contains("reload"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("server"))
        .stdout(predicate::str::contains("clean"));
    Ok(())
}

#[tokio::test]
async fn search_without_model() -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    let catalog = conf_dir.path().join("shop.db");
    common::create_catalog(&catalog).await?;

    cargo_run!(
        "prodsearch",
        "-c",
        conf_dir.path(),
        "search",
        "--catalog",
        &catalog,
        "--model",
        conf_dir.path().join("missing.onnx"),
        "query.jpg"
    )
    .failure()
    .stderr(predicate::str::contains("模型加载失败"));
    Ok(())
}

#[tokio::test]
async fn clean_stale_features() -> Result<()> {
    let conf_dir = assert_fs::TempDir::new()?;
    let catalog = conf_dir.path().join("shop.db");
    common::create_catalog(&catalog).await?;

    {
        let cache = FeatureCache::open(conf_dir.path().join("features"), 4)?;
        cache.upsert(1, &[1., 0., 0., 0.])?;
        cache.upsert(2, &[0., 1., 0., 0.])?;
        // 6 号图片属于已下架的商品
        cache.upsert(6, &[0., 0., 1., 0.])?;
        cache.upsert(99, &[0., 0., 0., 1.])?;
    }

    cargo_run!("prodsearch", "-c", conf_dir.path(), "clean", "--catalog", &catalog, "--dim", "4", "--dry-run")
        .success()
        .stdout(predicate::str::contains("2 条特征可以删除"));

    cargo_run!("prodsearch", "-c", conf_dir.path(), "clean", "--catalog", &catalog, "--dim", "4")
        .success()
        .stdout(predicate::str::diff("2\n"));

    cargo_run!("prodsearch", "-c", conf_dir.path(), "clean", "--catalog", &catalog, "--dim", "4", "--dry-run")
        .success()
        .stdout(predicate::str::contains("0 条特征可以删除"));
    Ok(())
}

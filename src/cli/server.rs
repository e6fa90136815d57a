use std::path::PathBuf;

use clap::Parser;
use log::{error, info, warn};
use prometheus::{BasicAuthentication, labels};
use rand::distr::{Alphanumeric, SampleString};
use tokio::net::TcpListener;
use tokio::task::spawn_blocking;
use tokio::time::{Duration, sleep};

use crate::cli::{SubCommandExtend, load_catalog, open_service};
use crate::config::{FetchOptions, MatchOptions, ModelOptions};
use crate::{Opts, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub model: ModelOptions,
    #[command(flatten)]
    pub fetch: FetchOptions,
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 商品目录数据库（SQLite）
    #[arg(long, value_name = "PATH")]
    pub catalog: PathBuf,
    /// 监听地址
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// 重载接口的验证 token，不填则随机生成
    #[arg(long, default_value_t = String::new())]
    pub token: String,
    /// 定时重载索引的间隔，单位为秒，0 表示只在启动时加载
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    pub reload_interval: u64,
    /// prometheus 主动推送地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH")]
    pub prometheus_auth: Option<String>,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        // 模型加载失败时服务仍然启动，但所有查询返回索引不可用
        let service = open_service(&opts.conf_dir, &self.model, &self.fetch, &self.matching, false)?;

        let mut token = self.token.clone();
        if token.is_empty() {
            token = Alphanumeric.sample_string(&mut rand::rng(), 32);
            info!("鉴权 token: {}", token);
        }

        let state = server::AppState::new(service, self.catalog.clone(), token);

        if state.service.is_available() {
            let state = state.clone();
            let interval = self.reload_interval;
            tokio::spawn(async move {
                loop {
                    match load_catalog(&state.catalog).await {
                        Ok(catalog) => {
                            if let Err(e) = state.service.reload(&catalog).await {
                                error!("重载索引失败: {e}");
                            }
                        }
                        Err(e) => error!("读取商品目录失败: {e}"),
                    }
                    if interval == 0 {
                        break;
                    }
                    sleep(Duration::from_secs(interval)).await;
                }
            });
        } else {
            warn!("模型不可用，跳过索引加载");
        }

        if let Some(url) = self.prometheus_push.clone() {
            let instance = self.prometheus_instance.clone().unwrap_or_else(|| self.addr.clone());
            let auth = match &self.prometheus_auth {
                Some(s) => match s.split_once(':') {
                    Some((username, password)) => Some((username.to_string(), password.to_string())),
                    None => anyhow::bail!("prometheus 认证信息格式错误，应为 username:password"),
                },
                None => None,
            };
            tokio::spawn(async move {
                loop {
                    let metric_families = prometheus::gather();
                    let url = url.clone();
                    let instance = instance.clone();
                    let auth = auth.clone();
                    let r = spawn_blocking(move || {
                        prometheus::push_metrics(
                            "prodsearch",
                            labels! {
                                "instance".to_string() => instance.clone(),
                            },
                            &url,
                            metric_families,
                            auth.map(|(username, password)| BasicAuthentication {
                                username,
                                password,
                            }),
                        )
                    })
                    .await;
                    match r {
                        Ok(Err(e)) => error!("推送指标失败: {e}"),
                        Err(e) => error!("推送指标失败: {e}"),
                        Ok(Ok(())) => {}
                    }
                    sleep(Duration::from_secs(30)).await;
                }
            });
        }

        let app = server::create_app(state);

        info!("服务器启动：http://{}", &self.addr);
        let listener = TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

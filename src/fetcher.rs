use std::future::Future;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use tokio::task::spawn_blocking;

use crate::error::FetchError;
use crate::utils;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// 根据 URL 获取图片数据
pub trait ImageFetcher: Send + Sync {
    /// 下载图片并校验其能被正确解码
    fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// 基于 reqwest 的 HTTP 图片下载器
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> reqwest::Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let http_error = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http { url: url.to_string(), reason: e.to_string() }
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?;
        let data = response.bytes().await.map_err(http_error)?.to_vec();
        debug!("下载完成 {}: {} 字节", url, data.len());

        // 解码校验属于 CPU 密集操作
        let (data, valid) = spawn_blocking(move || {
            let valid = utils::is_valid_image(&data);
            (data, valid)
        })
        .await
        .map_err(|e| FetchError::Http { url: url.to_string(), reason: e.to_string() })?;

        if !valid {
            return Err(FetchError::InvalidImage(url.to_string()));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use opencv::core::{CV_8UC3, Mat, Scalar, Vector};
    use opencv::imgcodecs;

    use super::*;

    fn png_bytes() -> Vec<u8> {
        let mat = Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::all(10.)).unwrap();
        let mut buf = Vector::<u8>::new();
        imgcodecs::imencode(".png", &mat, &mut buf, &Vector::new()).unwrap();
        buf.to_vec()
    }

    #[tokio::test]
    async fn test_fetch_valid_image() {
        let server = MockServer::start();
        let body = png_bytes();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/a.png");
            then.status(200).body(&body);
        });

        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT).unwrap();
        let data = fetcher.fetch(&server.url("/a.png"), Duration::from_secs(5)).await.unwrap();
        assert_eq!(data, body);
        mock.assert();
    }

    #[tokio::test]
    async fn test_fetch_sends_user_agent() {
        let server = MockServer::start();
        let body = png_bytes();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET).header("user-agent", "prodsearch-test");
            then.status(200).body(&body);
        });

        let fetcher = HttpFetcher::new("prodsearch-test").unwrap();
        fetcher.fetch(&server.url("/b.png"), Duration::from_secs(5)).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_fetch_corrupt_payload() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET);
            then.status(200).body("<html>not found</html>");
        });

        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT).unwrap();
        let err = fetcher.fetch(&server.url("/c.png"), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET);
            then.status(404);
        });

        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT).unwrap();
        let err = fetcher.fetch(&server.url("/d.png"), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, FetchError::Http { .. }));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET);
            then.status(200).delay(Duration::from_millis(500)).body(png_bytes());
        });

        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT).unwrap();
        let err =
            fetcher.fetch(&server.url("/e.png"), Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }
}

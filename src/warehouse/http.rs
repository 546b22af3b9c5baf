//! 通过 HTTP 网关访问数据仓库

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::WarehouseConfig;
use crate::error::WorkflowError;
use crate::warehouse::DatasetProvider;
use crate::warehouse::catalog::DatasetCall;

/// 仓库网关客户端，调用 `POST {base_url}/datasets/{key}`，请求体为参数对象
#[derive(Debug, Clone)]
pub struct HttpWarehouse {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWarehouse {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(anyhow!("warehouse.base_url is required for the http warehouse"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build warehouse HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, call: &DatasetCall) -> String {
        format!("{}/datasets/{}", self.base_url, call.key())
    }
}

#[async_trait]
impl DatasetProvider for HttpWarehouse {
    async fn call(&self, call: &DatasetCall) -> Result<Value, WorkflowError> {
        let key = call.key();
        let response = self
            .client
            .post(self.endpoint(call))
            .json(&call.params_json())
            .send()
            .await
            .map_err(|e| WorkflowError::data_unavailable(key, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkflowError::data_unavailable(
                key,
                format!("warehouse responded with {}", status),
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| WorkflowError::data_unavailable(key, format!("invalid JSON body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WarehouseKind;
    use crate::warehouse::catalog::DatasetFunction;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 启动只响应一次请求的网关，返回地址与收到的请求文本
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if received.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn config(base_url: String) -> WarehouseConfig {
        WarehouseConfig {
            kind: WarehouseKind::Http,
            base_url,
            timeout_seconds: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_posts_params_to_dataset_endpoint() {
        let (base_url, server) =
            serve_once("HTTP/1.1 200 OK", r#"{"sales_trend":[{"date":"2025-01-01","revenue":10.5,"orders":2}]}"#).await;
        let warehouse = HttpWarehouse::new(&config(base_url)).unwrap();

        let call = DatasetCall::new(DatasetFunction::SalesTrend).with_argument(7);
        let value = warehouse.call(&call).await.unwrap();
        assert_eq!(value["sales_trend"][0]["orders"], 2);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /datasets/sales_trend "));
        assert!(request.contains(r#"{"days":7}"#));
    }

    #[tokio::test]
    async fn test_error_status_is_data_unavailable() {
        let (base_url, _server) = serve_once("HTTP/1.1 503 Service Unavailable", "{}").await;
        let warehouse = HttpWarehouse::new(&config(base_url)).unwrap();

        let err = warehouse
            .call(&DatasetCall::new(DatasetFunction::TopProducts))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DataUnavailable { ref key, .. } if key == "top_products"));
    }

    #[test]
    fn test_base_url_is_required() {
        assert!(HttpWarehouse::new(&config(String::new())).is_err());
    }
}

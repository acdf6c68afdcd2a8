// src/bidding/client.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::timeout;

use crate::errors::RtbError;

/// 出向 HTTP 请求
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: &str, url: &str, body: Vec<u8>) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            headers: Vec::new(),
            body,
        }
    }

    /// 设置请求头；同名头覆盖
    pub fn set_header(&mut self, key: &str, value: &str) {
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            entry.1 = value.to_string();
        } else {
            self.headers.push((key.to_string(), value.to_string()));
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// 入向 HTTP 响应
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// HTTP 传输抽象
///
/// 驱动只依赖这一层；生产环境使用 reqwest 实现，
/// 测试中可注入脚本化的假 DSP。
#[async_trait]
pub trait HttpDriver: Send + Sync {
    async fn do_request(&self, request: &HttpRequest) -> Result<HttpResponse, RtbError>;
}

/// HTTP 客户端工厂：按来源超时构建传输实例
pub type ClientFactory =
    Box<dyn Fn(Duration) -> Result<Arc<dyn HttpDriver>, RtbError> + Send + Sync>;

/// reqwest 实现，整个请求受 deadline 约束
pub struct ReqwestDriver {
    client: Client,
    timeout: Duration,
}

impl ReqwestDriver {
    pub fn new(request_timeout: Duration) -> Result<Self, RtbError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RtbError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            timeout: request_timeout,
        })
    }
}

#[async_trait]
impl HttpDriver for ReqwestDriver {
    async fn do_request(&self, request: &HttpRequest) -> Result<HttpResponse, RtbError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| RtbError::Transport(e.to_string()))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .body(request.body.clone());
        for (key, value) in request.headers() {
            builder = builder.header(key, value);
        }

        let response = match timeout(self.timeout, builder.send()).await {
            Err(_) => return Err(RtbError::Timeout),
            Ok(Err(e)) if e.is_timeout() => return Err(RtbError::Timeout),
            Ok(Err(e)) => return Err(RtbError::Transport(e.to_string())),
            Ok(Ok(resp)) => resp,
        };

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RtbError::Timeout
                } else {
                    RtbError::Transport(e.to_string())
                }
            })?
            .to_vec();

        Ok(HttpResponse::new(status, body))
    }
}

/// 默认工厂：按超时构建 reqwest 传输
pub fn reqwest_client_factory() -> ClientFactory {
    Box::new(|request_timeout| Ok(Arc::new(ReqwestDriver::new(request_timeout)?)))
}

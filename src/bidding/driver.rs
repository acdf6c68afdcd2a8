// src/bidding/driver.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::bidding::client::{HttpDriver, HttpRequest, HttpResponse};
use crate::bidding::counters::{Counter, ErrorCounter};
use crate::bidding::metrics::{LatencyMetrics, MetricsInfo};
use crate::bidding::options::BidRequestRtbOptions;
use crate::bidding::request_v2::request_to_rtb_v2;
use crate::bidding::request_v3::request_to_rtb_v3;
use crate::bidding::response::BidResponse;
use crate::bidding::response_item::ResponseBidItem;
use crate::errors::RtbError;
use crate::model::context::{EventKind, EventStatus};
use crate::model::request::BidRequest;
use crate::model::source::{RequestType, RtbSource};
use crate::openrtb::response as wire;

pub const HEADER_REQUEST_OPENRTB_VERSION: &str = "X-Openrtb-Version";
pub const HEADER_REQUEST_OPENRTB_VERSION2: &str = "2.5";
pub const HEADER_REQUEST_OPENRTB_VERSION3: &str = "3.0";
/// 延迟追踪头：请求在内部系统内的起始时间戳（Unix 毫秒）
pub const HEADER_REQUEST_TIMEMARK: &str = "X-Rtb-Request-Timemark";

pub const DEFAULT_MIN_WEIGHT: f64 = 0.001;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// 请求调度策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStrategy {
    Synchronous,
    Asynchronous,
}

/// OpenRTB 竞价来源驱动
///
/// 被任意数量的并发调用方共享：准入判定与计数全部走原子量，
/// 秒窗口边界的竞态是允许的（窗口为近似值）。
pub struct Driver {
    /// 最近一次窗口重置时间（Unix 纳秒）
    last_request_time: AtomicU64,

    /// 当前秒内的请求计数
    rps_current: Counter,
    error_counter: ErrorCounter,
    latency_metrics: LatencyMetrics,

    /// 来源配置，构造后只读
    source: Arc<RtbSource>,

    /// 静态请求头
    headers: HashMap<String, String>,

    /// HTTP 传输
    net_client: Arc<dyn HttpDriver>,
}

impl Driver {
    pub(crate) fn new(source: Arc<RtbSource>, net_client: Arc<dyn HttpDriver>) -> Self {
        let headers = source.headers.clone();
        Self {
            last_request_time: AtomicU64::new(0),
            rps_current: Counter::default(),
            error_counter: ErrorCounter::default(),
            latency_metrics: LatencyMetrics::default(),
            source,
            headers,
            net_client,
        }
    }

    pub fn id(&self) -> u64 {
        self.source.id
    }

    pub fn object_key(&self) -> u64 {
        self.source.id
    }

    pub fn protocol(&self) -> &str {
        &self.source.protocol
    }

    /// 请求准入判定。
    ///
    /// 拒绝条件：错误水位越限（未开启错误忽略时）、当前秒请求数
    /// 达到 RPS 上限、来源自身过滤不通过。窗口过期时先重置计数。
    pub fn test(&self, request: &BidRequest) -> bool {
        if self.source.rps > 0 {
            if !self.source.errors_ignore && !self.error_counter.next() {
                self.latency_metrics.inc_skip();
                return false;
            }

            let now = unix_timestamp_nanos();
            if now.saturating_sub(self.last_request_time.load(Ordering::Relaxed))
                >= NANOS_PER_SEC
            {
                self.last_request_time.store(now, Ordering::Relaxed);
                self.rps_current.set(0);
            } else if self.rps_current.get() >= i64::from(self.source.rps) {
                self.latency_metrics.inc_skip();
                return false;
            }
        }

        if !self.source.test(request) {
            self.latency_metrics.inc_skip();
            return false;
        }

        true
    }

    /// 价格修正扣减因子，0..1。
    /// 10% 的修正意味着最终价格的 10% 不参与结算。
    pub fn price_correction_reduce_factor(&self) -> f64 {
        self.source.price_correction_reduce_factor()
    }

    pub fn revenue_share_reduce_factor(&self) -> f64 {
        self.source.revenue_share_reduce_factor()
    }

    pub fn request_strategy(&self) -> RequestStrategy {
        RequestStrategy::Asynchronous
    }

    /// 来源在轮转中的权重
    pub fn weight(&self) -> f64 {
        self.source.minimal_weight.max(DEFAULT_MIN_WEIGHT)
    }

    /// 发起一次竞价请求。
    ///
    /// 构建 wire 请求 → 结构校验 → 编码 → 设置请求头 → 下发，
    /// 按响应状态分类结果并更新指标；200 应答交给归一化层。
    pub async fn bid(&self, request: &Arc<BidRequest>) -> Result<BidResponse, RtbError> {
        let begin = Instant::now();
        self.rps_current.inc(1);
        self.latency_metrics.begin_query();

        let http_request = match self.build_http_request(request) {
            Ok(req) => req,
            Err(err) => return Err(err),
        };

        let result = self.net_client.do_request(&http_request).await;
        self.latency_metrics.update_query_latency(begin.elapsed());

        let http_response = match result {
            Ok(resp) => resp,
            Err(err) => {
                self.process_http_outcome(None, Some(&err));
                debug!(source_url = %self.source.url, error = %err, "bid");
                return Err(err);
            }
        };

        debug!(
            source_url = %self.source.url,
            http_response_status = http_response.status_code(),
            http_response_status_txt = http_status_text(http_response.status_code()),
            "bid"
        );

        if http_response.status_code() == 204 {
            self.latency_metrics.inc_nobid();
            return Err(RtbError::NoCampaigns);
        }

        if http_response.status_code() != 200 {
            self.process_http_outcome(Some(&http_response), None);
            return Err(RtbError::InvalidResponseStatus);
        }

        // 200 一律压低错误水位；解析失败单独返回，不影响熔断判定
        self.process_http_outcome(Some(&http_response), None);

        match self.unmarshal(request, http_response.body()) {
            Ok(Some(response)) => {
                if response.ads().is_empty() {
                    self.latency_metrics.inc_nobid();
                } else {
                    self.latency_metrics.inc_success();
                }
                Ok(response)
            }
            Ok(None) => {
                self.latency_metrics.inc_nobid();
                Ok(BidResponse::empty(self.source.clone(), request.clone()))
            }
            Err(err) => {
                if self.source.trace {
                    error!(source_url = %self.source.url, error = %err, "bid response");
                }
                Err(err)
            }
        }
    }

    /// 处理本驱动赢得的广告条目：回发 NURL win ping，
    /// 并向主事件流投递 SourceWin 事件。来源不匹配的条目跳过。
    pub async fn process_response_item(&self, response: &BidResponse, _item: &ResponseBidItem) {
        if response.validate().is_err() {
            return;
        }
        for bid_item in response.ads() {
            if bid_item.source_id() != self.id() {
                debug!(
                    source_id = bid_item.source_id(),
                    driver_id = self.id(),
                    "bid source mismatch"
                );
                continue;
            }
            if !bid_item.bid.nurl.is_empty() {
                info!(url = %bid_item.bid.nurl, "ping");
                if let Err(err) = response.context().wins_stream().send(&bid_item.bid.nurl).await
                {
                    error!(error = %err, "ping error");
                }
            }
            if let Err(err) = response
                .context()
                .event_stream()
                .send(EventKind::SourceWin, EventStatus::Undefined, bid_item)
                .await
            {
                error!(error = %err, "send win event");
            }
        }
    }

    /// 指标快照，叠加来源标识
    pub fn metrics(&self) -> MetricsInfo {
        let mut info = MetricsInfo::default();
        self.latency_metrics.fill_metrics(&mut info);
        info.id = self.id();
        info.protocol = self.source.protocol.clone();
        info.qps_limit = self.source.rps;
        info
    }

    fn is_openrtb_v3(&self) -> bool {
        self.source.protocol == "openrtb3"
    }

    fn request_options(&self) -> BidRequestRtbOptions {
        let source = self.source.clone();
        BidRequestRtbOptions::new()
            .with_open_native_version(&self.source.open_native_ver)
            .with_format_filter(Arc::new(move |format| source.test_format(format)))
            .with_currency(self.source.currency.clone())
            .with_max_time_duration(Duration::from_millis(self.source.timeout))
            .with_auction_type(self.source.auction_type)
            .with_bid_floor(self.source.min_bid)
    }

    /// 构建出向 HTTP 请求：wire 对象 → 校验 → JSON 编码 → 请求头
    fn build_http_request(&self, request: &BidRequest) -> Result<HttpRequest, RtbError> {
        let opts = self.request_options();

        let body = if self.is_openrtb_v3() {
            let rtb_request = request_to_rtb_v3(request, &opts)?;
            if self.source.trace {
                self.trace_request(&rtb_request);
            }
            rtb_request.validate().map_err(|e| self.wrap_source_err(e))?;
            serde_json::to_vec(&rtb_request).map_err(|e| self.wrap_source_err(e.into()))?
        } else {
            let rtb_request = request_to_rtb_v2(request, &opts)?;
            if self.source.trace {
                self.trace_request(&rtb_request);
            }
            rtb_request.validate().map_err(|e| self.wrap_source_err(e))?;
            serde_json::to_vec(&rtb_request).map_err(|e| self.wrap_source_err(e.into()))?
        };

        let mut http_request = HttpRequest::new(&self.source.method, &self.source.url, body);
        self.fill_request(request, &mut http_request);
        Ok(http_request)
    }

    fn trace_request<T: serde::Serialize>(&self, rtb_request: &T) {
        error!(src_url = %self.source.url, "trace marshal");
        if let Ok(pretty) = serde_json::to_string_pretty(rtb_request) {
            println!("{}", pretty);
        }
    }

    fn wrap_source_err(&self, err: RtbError) -> RtbError {
        RtbError::InvalidRequest {
            protocol: self.source.protocol.clone(),
            source_id: self.source.id,
            message: err.to_string(),
        }
    }

    /// 设置出向请求头：内容类型、协议版本（未静态配置时）、
    /// 延迟追踪时间戳，最后覆盖静态头。
    fn fill_request(&self, request: &BidRequest, http_request: &mut HttpRequest) {
        http_request.set_header("Content-Type", "application/json");

        if !self.headers.contains_key(HEADER_REQUEST_OPENRTB_VERSION) {
            if self.is_openrtb_v3() {
                http_request
                    .set_header(HEADER_REQUEST_OPENRTB_VERSION, HEADER_REQUEST_OPENRTB_VERSION3);
            } else {
                http_request
                    .set_header(HEADER_REQUEST_OPENRTB_VERSION, HEADER_REQUEST_OPENRTB_VERSION2);
            }
        }

        http_request.set_header(
            HEADER_REQUEST_TIMEMARK,
            &request_init_time(request.time()).to_string(),
        );

        for (key, value) in &self.headers {
            http_request.set_header(key, value);
        }
    }

    /// 解析应答体并交给归一化层
    fn unmarshal(
        &self,
        request: &Arc<BidRequest>,
        body: &[u8],
    ) -> Result<Option<BidResponse>, RtbError> {
        let bid_response: wire::BidResponse = match self.source.request_type {
            RequestType::Json => {
                if self.source.trace {
                    error!(src_url = %self.source.url, "trace unmarshal");
                    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
                        if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                            println!("UNMARSHAL: {}", pretty);
                        }
                    }
                }
                serde_json::from_slice(body)?
            }
            RequestType::Xml
            | RequestType::ProtoBuff
            | RequestType::PostFormEncoded
            | RequestType::PlainText => {
                return Err(RtbError::RequestTypeNotSupported(
                    self.source.request_type.name(),
                ));
            }
            RequestType::Undefined => {
                return Err(RtbError::RequestTypeUndefined(
                    self.source.request_type.name(),
                ));
            }
        };

        BidResponse::build(self.source.clone(), request.clone(), bid_response)
    }

    /// 结果分类：错误 / 无响应 / 非 200/204 状态抬升错误水位，
    /// 200 压低水位；超时单独计数。
    fn process_http_outcome(&self, response: Option<&HttpResponse>, err: Option<&RtbError>) {
        let status = response.map(HttpResponse::status_code);
        let failed = err.is_some()
            || response.is_none()
            || !matches!(status, Some(200) | Some(204));

        if failed {
            if let Some(e) = err {
                if e.is_timeout() {
                    self.latency_metrics.inc_timeout();
                }
            }
            self.error_counter.inc();
            self.latency_metrics
                .inc_error(status.map(http_status_text).unwrap_or(""));
        } else {
            self.error_counter.dec();
        }
    }
}

fn unix_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// 请求起始时间戳（Unix 毫秒），用于延迟追踪头
fn request_init_time(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// 常见 HTTP 状态码的标准文本
fn http_status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

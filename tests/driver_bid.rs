// tests/driver_bid.rs
//
// 驱动端到端测试：用脚本化的假 DSP 顶替 HTTP 传输，
// 覆盖出价、准入、安全校验与回调路径。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use adsource_rs::errors::RtbError;
use adsource_rs::model::context::{
    EventKind, EventStatus, EventStream, RequestContext, WinsEventStream,
};
use adsource_rs::model::format::{Format, FormatConfig, FormatKind};
use adsource_rs::model::request::{BidRequest, Impression, Target};
use adsource_rs::model::source::{RequestType, RtbSource};
use adsource_rs::{Driver, Factory, HttpDriver, HttpRequest, HttpResponse, ResponseBidItem};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// 脚本化应答
enum ScriptedReply {
    Reply(u16, String),
    Timeout,
    Transport,
}

/// 假 DSP：按脚本顺序应答，并记录收到的请求
struct MockDsp {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockDsp {
    fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn push_reply(&self, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Reply(status, body.to_string()));
    }

    fn push_timeout(&self) {
        self.replies.lock().unwrap().push_back(ScriptedReply::Timeout);
    }

    fn push_transport_error(&self) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Transport);
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpDriver for MockDsp {
    async fn do_request(&self, request: &HttpRequest) -> Result<HttpResponse, RtbError> {
        self.requests.lock().unwrap().push(request.clone());
        // 脚本耗尽时按无填充处理
        match self.replies.lock().unwrap().pop_front() {
            Some(ScriptedReply::Reply(status, body)) => {
                Ok(HttpResponse::new(status, body.into_bytes()))
            }
            Some(ScriptedReply::Timeout) => Err(RtbError::Timeout),
            Some(ScriptedReply::Transport) => {
                Err(RtbError::Transport("connection refused".to_string()))
            }
            None => Ok(HttpResponse::new(204, Vec::new())),
        }
    }
}

fn driver_with(mock: Arc<MockDsp>, source: RtbSource) -> Driver {
    let factory = Factory::new(Box::new(move |_timeout| {
        Ok(mock.clone() as Arc<dyn HttpDriver>)
    }));
    factory.create(source).unwrap()
}

fn source(id: u64, protocol: &str) -> RtbSource {
    RtbSource {
        id,
        protocol: protocol.to_string(),
        url: "http://dsp.local/bid".to_string(),
        request_type: RequestType::Json,
        ..Default::default()
    }
}

fn banner_format() -> Arc<Format> {
    Arc::new(Format {
        codename: "b".to_string(),
        kind: FormatKind::Banner,
        width: 300,
        height: 250,
        config: FormatConfig::default(),
    })
}

fn banner_request(secure: bool) -> Arc<BidRequest> {
    Arc::new(BidRequest {
        id: "r1".to_string(),
        secure,
        imps: vec![Impression {
            id: "i1".to_string(),
            width: 300,
            height: 250,
            target: Target {
                codename: "t".to_string(),
                ..Default::default()
            },
            formats: vec![banner_format()],
            ..Default::default()
        }],
        ..Default::default()
    })
}

fn direct_request() -> Arc<BidRequest> {
    Arc::new(BidRequest {
        id: "r1".to_string(),
        imps: vec![Impression {
            id: "i1".to_string(),
            direct: true,
            target: Target {
                codename: "t".to_string(),
                ..Default::default()
            },
            formats: vec![Arc::new(Format::new("pop", FormatKind::Direct))],
            ..Default::default()
        }],
        ..Default::default()
    })
}

fn bid_response_json(impid: &str, prices: &[f64]) -> String {
    let bids: Vec<_> = prices
        .iter()
        .enumerate()
        .map(|(i, price)| {
            json!({
                "id": format!("bid-{}", i),
                "impid": impid,
                "price": price,
                "adm": "<div>creative</div>",
            })
        })
        .collect();
    json!({
        "id": "r1",
        "seatbid": [{"bid": bids, "seat": "s1"}],
    })
    .to_string()
}

#[tokio::test]
async fn banner_request_with_one_winning_bid() {
    init_tracing();
    let mock = Arc::new(MockDsp::new());
    mock.push_reply(200, &bid_response_json("i1_b", &[1200.0]));
    let driver = driver_with(mock.clone(), source(1, "openrtb"));
    let request = banner_request(false);

    assert!(driver.test(&request));
    let response = driver.bid(&request).await.unwrap();

    assert_eq!(response.ads().len(), 1);
    let item = &response.ads()[0];
    assert_eq!(item.id(), "i1");
    assert_eq!(item.format_type, FormatKind::Banner);
    assert!((item.price_scope.view_price - 1.2).abs() < 1e-9);
    assert_eq!(item.price_scope.ecpm, 1200.0);

    // 出向请求本身
    let sent = &mock.requests()[0];
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.header("Content-Type"), Some("application/json"));
    assert_eq!(sent.header("X-Openrtb-Version"), Some("2.5"));
    assert!(sent.header("X-Rtb-Request-Timemark").is_some());

    let body: serde_json::Value = serde_json::from_slice(&sent.body).unwrap();
    assert_eq!(body["id"], "r1");
    assert_eq!(body["cur"], json!(["USD"]));
    assert_eq!(body["imp"][0]["id"], "i1_b");
    assert_eq!(body["imp"][0]["tagid"], "t_b");
    assert_eq!(body["imp"][0]["banner"]["w"], 300);
    assert_eq!(body["imp"][0]["banner"]["h"], 250);
}

#[tokio::test]
async fn secure_request_rejects_insecure_markup() {
    let mock = Arc::new(MockDsp::new());
    let body = json!({
        "id": "r1",
        "seatbid": [{"bid": [{
            "id": "1", "impid": "i1_b", "price": 100.0,
            "adm": "<a href=\"http://x\">go</a>",
        }]}],
    })
    .to_string();
    mock.push_reply(200, &body);
    let driver = driver_with(mock, source(1, "openrtb"));

    let err = driver.bid(&banner_request(true)).await.unwrap_err();
    assert!(matches!(err, RtbError::ResponseNotSecure));
}

#[tokio::test]
async fn optimal_bid_selection_takes_the_highest_price() {
    let mock = Arc::new(MockDsp::new());
    mock.push_reply(200, &bid_response_json("i1_b", &[100.0, 500.0, 300.0]));
    let driver = driver_with(mock, source(1, "openrtb"));

    let response = driver.bid(&banner_request(false)).await.unwrap();
    assert_eq!(response.ads().len(), 1);
    assert_eq!(response.ads()[0].bid.price, 500.0);
}

#[tokio::test]
async fn rps_limit_admits_at_most_rps_requests_per_second() {
    let mock = Arc::new(MockDsp::new());
    let mut src = source(1, "openrtb");
    src.rps = 2;
    let driver = driver_with(mock, src);
    let request = banner_request(false);

    let mut admitted = 0;
    for _ in 0..5 {
        if driver.test(&request) {
            admitted += 1;
            // 204 无填充也算一次真实请求
            let _ = driver.bid(&request).await;
        }
    }
    assert_eq!(admitted, 2);
    assert_eq!(driver.metrics().skips, 3);
}

#[tokio::test]
async fn direct_pop_bid_resolves_action_link_from_extension() {
    let mock = Arc::new(MockDsp::new());
    let body = json!({
        "id": "r1",
        "seatbid": [{"bid": [{
            "id": "1", "impid": "i1_pop", "price": 90.0,
            "adm": "", "ext": {"url": "https://x"},
        }]}],
    })
    .to_string();
    mock.push_reply(200, &body);
    let driver = driver_with(mock.clone(), source(1, "openrtb"));

    let response = driver.bid(&direct_request()).await.unwrap();
    let item = &response.ads()[0];
    assert_eq!(item.action_url(), "https://x");
    assert_eq!(item.format_type, FormatKind::Direct);

    let sent: serde_json::Value = serde_json::from_slice(&mock.requests()[0].body).unwrap();
    assert_eq!(sent["imp"][0]["ext"], json!({"type": "pop"}));
    assert_eq!(sent["imp"][0]["instl"], 1);
}

#[tokio::test]
async fn no_content_counts_as_nobid() {
    let mock = Arc::new(MockDsp::new());
    mock.push_reply(204, "");
    let driver = driver_with(mock, source(1, "openrtb"));

    let err = driver.bid(&banner_request(false)).await.unwrap_err();
    assert!(matches!(err, RtbError::NoCampaigns));
    assert_eq!(driver.metrics().nobids, 1);
    assert_eq!(driver.metrics().errors, 0);
}

#[tokio::test]
async fn unexpected_status_counts_as_error() {
    let mock = Arc::new(MockDsp::new());
    mock.push_reply(500, "oops");
    let driver = driver_with(mock, source(1, "openrtb"));

    let err = driver.bid(&banner_request(false)).await.unwrap_err();
    assert!(matches!(err, RtbError::InvalidResponseStatus));
    let metrics = driver.metrics();
    assert_eq!(metrics.errors, 1);
    assert_eq!(
        metrics.error_statuses.get("Internal Server Error"),
        Some(&1)
    );
}

#[tokio::test]
async fn timeout_is_counted_separately() {
    let mock = Arc::new(MockDsp::new());
    mock.push_timeout();
    let driver = driver_with(mock, source(1, "openrtb"));

    let err = driver.bid(&banner_request(false)).await.unwrap_err();
    assert!(err.is_timeout());
    let metrics = driver.metrics();
    assert_eq!(metrics.timeouts, 1);
    assert_eq!(metrics.errors, 1);
}

#[tokio::test]
async fn transport_error_trips_the_error_counter() {
    let mock = Arc::new(MockDsp::new());
    mock.push_transport_error();
    let driver = driver_with(mock, source(1, "openrtb"));

    let err = driver.bid(&banner_request(false)).await.unwrap_err();
    assert!(matches!(err, RtbError::Transport(_)));
    assert_eq!(driver.metrics().errors, 1);
}

#[tokio::test]
async fn malformed_body_is_a_codec_error() {
    let mock = Arc::new(MockDsp::new());
    mock.push_reply(200, "<html>not json</html>");
    let driver = driver_with(mock, source(1, "openrtb"));

    let err = driver.bid(&banner_request(false)).await.unwrap_err();
    assert!(matches!(err, RtbError::Codec(_)));
    // 200 应答即使解析失败也不抬升错误水位
    assert_eq!(driver.metrics().errors, 0);
}

#[tokio::test]
async fn unsupported_request_type_is_rejected_at_parse_time() {
    let mock = Arc::new(MockDsp::new());
    mock.push_reply(200, &bid_response_json("i1_b", &[100.0]));
    let mut src = source(1, "openrtb");
    src.request_type = RequestType::Xml;
    let driver = driver_with(mock, src);

    let err = driver.bid(&banner_request(false)).await.unwrap_err();
    assert!(matches!(err, RtbError::RequestTypeNotSupported("xml")));
}

#[tokio::test]
async fn openrtb3_sets_version_header_and_static_headers_win() {
    let mock = Arc::new(MockDsp::new());
    mock.push_reply(204, "");
    let driver = driver_with(mock.clone(), source(3, "openrtb3"));
    let _ = driver.bid(&banner_request(false)).await;
    assert_eq!(
        mock.requests()[0].header("X-Openrtb-Version"),
        Some("3.0")
    );

    let mock = Arc::new(MockDsp::new());
    mock.push_reply(204, "");
    let mut src = source(4, "openrtb3");
    src.headers
        .insert("X-Openrtb-Version".to_string(), "2.6".to_string());
    let driver = driver_with(mock.clone(), src);
    let _ = driver.bid(&banner_request(false)).await;
    assert_eq!(
        mock.requests()[0].header("X-Openrtb-Version"),
        Some("2.6")
    );
}

/// 记录 win ping 的事件流
#[derive(Default)]
struct RecordingStreams {
    wins: Mutex<Vec<String>>,
    events: Mutex<Vec<(EventKind, EventStatus)>>,
}

#[async_trait]
impl WinsEventStream for RecordingStreams {
    async fn send(&self, url: &str) -> Result<(), RtbError> {
        self.wins.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

#[async_trait]
impl EventStream for RecordingStreams {
    async fn send(
        &self,
        kind: EventKind,
        status: EventStatus,
        _item: &ResponseBidItem,
    ) -> Result<(), RtbError> {
        self.events.lock().unwrap().push((kind, status));
        Ok(())
    }
}

#[tokio::test]
async fn winning_items_fire_nurl_ping_and_source_win_event() {
    let streams = Arc::new(RecordingStreams::default());
    let ctx = RequestContext::new(streams.clone(), streams.clone());

    let mock = Arc::new(MockDsp::new());
    let body = json!({
        "id": "r1",
        "seatbid": [{"bid": [{
            "id": "1", "impid": "i1_b", "price": 500.0,
            "adm": "<div>x</div>",
            "nurl": "https://dsp.local/win?price=${AUCTION_PRICE}",
        }]}],
    })
    .to_string();
    mock.push_reply(200, &body);

    let driver = driver_with(mock, source(1, "openrtb"));
    let mut request = (*banner_request(false)).clone();
    request.ctx = ctx;
    let request = Arc::new(request);

    let response = driver.bid(&request).await.unwrap();
    let item = response.ads()[0].clone();
    driver.process_response_item(&response, &item).await;

    let wins = streams.wins.lock().unwrap().clone();
    assert_eq!(wins, vec!["https://dsp.local/win?price=500.000000"]);
    let events = streams.events.lock().unwrap().clone();
    assert_eq!(events, vec![(EventKind::SourceWin, EventStatus::Undefined)]);

    // 来源不匹配的驱动不应发送任何事件
    let other = driver_with(Arc::new(MockDsp::new()), source(99, "openrtb"));
    other.process_response_item(&response, &item).await;
    assert_eq!(streams.wins.lock().unwrap().len(), 1);
    assert_eq!(streams.events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_bids_share_one_driver() {
    let mock = Arc::new(MockDsp::new());
    let mut pushed: Vec<f64> = Vec::new();
    for _ in 0..10 {
        let price = 100.0 + f64::from(rand::random::<u8>());
        pushed.push(price);
        mock.push_reply(200, &bid_response_json("i1_b", &[price]));
    }

    let driver = Arc::new(driver_with(mock, source(1, "openrtb")));
    let request = banner_request(false);

    let futures: Vec<_> = (0..10)
        .map(|_| {
            let driver = driver.clone();
            let request = request.clone();
            async move { driver.bid(&request).await }
        })
        .collect();

    let mut received: Vec<f64> = futures::future::join_all(futures)
        .await
        .into_iter()
        .map(|res| res.unwrap().ads()[0].bid.price)
        .collect();

    received.sort_by(|a, b| a.partial_cmp(b).unwrap());
    pushed.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(received, pushed);
    assert_eq!(driver.metrics().queries, 10);
}

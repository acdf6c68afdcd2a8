// src/model/source.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::format::Format;
use crate::model::request::{AuctionType, BidRequest};

/// DSP 响应体类型
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    #[default]
    Undefined,
    Json,
    Xml,
    ProtoBuff,
    PostFormEncoded,
    PlainText,
}

impl RequestType {
    pub fn name(self) -> &'static str {
        match self {
            RequestType::Undefined => "undefined",
            RequestType::Json => "json",
            RequestType::Xml => "xml",
            RequestType::ProtoBuff => "protobuff",
            RequestType::PostFormEncoded => "postformencoded",
            RequestType::PlainText => "plaintext",
        }
    }
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_open_native_ver() -> String {
    "1.1".to_string()
}

/// RTB 竞价来源配置
///
/// 描述一个外部 DSP 端点：协议版本、限速、超时、价格边界与
/// 允许的格式集合。驱动在自身生命周期内持有一份只读配置。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RtbSource {
    pub id: u64,
    /// "openrtb" | "openrtb2" | "openrtb3"
    pub protocol: String,
    /// DSP 竞价 API 地址
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub request_type: RequestType,
    /// 静态请求头，逐请求覆盖到出向 HTTP 请求上
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// 每秒请求上限；0 = 不限速
    #[serde(default)]
    pub rps: i32,
    /// 请求超时（毫秒）；0 = 使用默认值
    #[serde(default)]
    pub timeout: u64,

    #[serde(default)]
    pub auction_type: AuctionType,
    /// 底价（CPM）
    #[serde(default)]
    pub min_bid: f64,
    /// 出价上限（CPM）；0 = 不限
    #[serde(default)]
    pub max_bid: f64,

    /// 为 true 时熔断判定被旁路（仅保留限速）
    #[serde(default)]
    pub errors_ignore: bool,
    /// 诊断模式：出向请求与应答体打印到标准输出
    #[serde(default)]
    pub trace: bool,

    /// 参与来源轮转的最小权重
    #[serde(default)]
    pub minimal_weight: f64,
    /// 价格修正扣减因子，0..1
    #[serde(default)]
    pub price_correction_reduce: f64,
    /// 收益分成扣减因子，0..1
    #[serde(default)]
    pub revenue_share_reduce: f64,

    /// 原生请求的 OpenNative 版本号
    #[serde(default = "default_open_native_ver")]
    pub open_native_ver: String,
    /// 允许的货币；为空时默认 ["USD"]
    #[serde(default)]
    pub currency: Vec<String>,
    /// 允许的格式 codename 集合；为空表示全部允许
    #[serde(default)]
    pub formats: Vec<String>,
}

impl RtbSource {
    /// 来源自身的请求过滤：至少有一个广告位携带本来源允许的格式
    pub fn test(&self, request: &BidRequest) -> bool {
        request
            .imps
            .iter()
            .any(|imp| imp.formats().iter().any(|f| self.test_format(f)))
    }

    /// 格式过滤谓词
    pub fn test_format(&self, format: &Format) -> bool {
        self.formats.is_empty() || self.formats.iter().any(|c| c == &format.codename)
    }

    pub fn price_correction_reduce_factor(&self) -> f64 {
        self.price_correction_reduce
    }

    pub fn revenue_share_reduce_factor(&self) -> f64 {
        self.revenue_share_reduce
    }
}

impl Default for RtbSource {
    fn default() -> Self {
        Self {
            id: 0,
            protocol: "openrtb".to_string(),
            url: String::new(),
            method: default_method(),
            request_type: RequestType::Json,
            headers: HashMap::new(),
            rps: 0,
            timeout: 0,
            auction_type: AuctionType::default(),
            min_bid: 0.0,
            max_bid: 0.0,
            errors_ignore: false,
            trace: false,
            minimal_weight: 0.0,
            price_correction_reduce: 0.0,
            revenue_share_reduce: 0.0,
            open_native_ver: default_open_native_ver(),
            currency: Vec::new(),
            formats: Vec::new(),
        }
    }
}

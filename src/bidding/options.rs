// src/bidding/options.rs

use std::sync::Arc;
use std::time::Duration;

use crate::model::format::Format;
use crate::model::request::AuctionType;

/// 格式过滤谓词
pub type FormatFilter = Arc<dyn Fn(&Format) -> bool + Send + Sync>;

/// 出向请求构建参数
///
/// 由驱动按来源配置逐请求生成；构建器据此填充 wire 请求中
/// 与来源相关的字段（竞价模式、超时、货币、底价等）。
#[derive(Clone, Default)]
pub struct BidRequestRtbOptions {
    /// 原生请求的 OpenNative 版本
    pub open_native_ver: String,
    /// 限定参与出价的格式；None 表示全部
    pub format_filter: Option<FormatFilter>,
    pub currency: Vec<String>,
    pub time_max: Duration,
    pub auction_type: AuctionType,
    /// 底价（CPM），向下限定为 0
    pub bid_floor: f64,
}

impl BidRequestRtbOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_native_version(mut self, ver: &str) -> Self {
        self.open_native_ver = ver.to_string();
        self
    }

    pub fn with_format_filter(mut self, filter: FormatFilter) -> Self {
        self.format_filter = Some(filter);
        self
    }

    pub fn with_currency(mut self, currency: Vec<String>) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_max_time_duration(mut self, duration: Duration) -> Self {
        self.time_max = duration;
        self
    }

    pub fn with_auction_type(mut self, auction_type: AuctionType) -> Self {
        self.auction_type = auction_type;
        self
    }

    pub fn with_bid_floor(mut self, bid_floor: f64) -> Self {
        self.bid_floor = bid_floor.max(0.0);
        self
    }

    pub fn open_native_ver(&self) -> &str {
        if self.open_native_ver.is_empty() {
            "1.1"
        } else {
            &self.open_native_ver
        }
    }

    /// 允许的货币；未配置时默认 USD
    pub fn currencies(&self) -> Vec<String> {
        if self.currency.is_empty() {
            vec!["USD".to_string()]
        } else {
            self.currency.clone()
        }
    }

    pub fn test_format(&self, format: &Format) -> bool {
        match &self.format_filter {
            Some(filter) => filter(format),
            None => true,
        }
    }
}

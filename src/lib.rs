//! OpenRTB 竞价来源驱动
//!
//! 将内部竞价请求转换为 OpenRTB 2.x / 3.0 wire 请求，在限速与
//! 错误熔断约束下发往外部 DSP，并把应答归一化为内部广告条目。
//! 支持版本：2.3 / 2.4 / 2.5 / 2.6 / 3.0。

use std::sync::Arc;
use std::time::Duration;

pub mod bidding;
pub mod errors;
pub mod model;
pub mod openrtb;

pub use bidding::client::{
    reqwest_client_factory, ClientFactory, HttpDriver, HttpRequest, HttpResponse,
};
pub use bidding::driver::{Driver, RequestStrategy};
pub use bidding::metrics::MetricsInfo;
pub use bidding::response::BidResponse;
pub use bidding::response_item::ResponseBidItem;
pub use errors::RtbError;
pub use model::source::RtbSource;

pub const PROTOCOL: &str = "openrtb";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(150);

/// 驱动工厂
///
/// 持有 HTTP 客户端工厂；按来源配置生成驱动实例，
/// 客户端超时取来源配置，缺省 150ms。
pub struct Factory {
    new_client: ClientFactory,
}

impl Factory {
    pub fn new(new_client: ClientFactory) -> Self {
        Self { new_client }
    }

    /// 由来源配置构建驱动
    pub fn create(&self, mut source: RtbSource) -> Result<Driver, RtbError> {
        source.minimal_weight = source
            .minimal_weight
            .max(bidding::driver::DEFAULT_MIN_WEIGHT);
        let request_timeout = if source.timeout > 0 {
            Duration::from_millis(source.timeout)
        } else {
            DEFAULT_TIMEOUT
        };
        let net_client = (self.new_client)(request_timeout)?;
        Ok(Driver::new(Arc::new(source), net_client))
    }

    /// 平台信息
    pub fn info(&self) -> PlatformInfo {
        PlatformInfo {
            name: "OpenRTB",
            protocol: PROTOCOL,
            versions: vec!["2.3", "2.4", "2.5", "2.6", "3.0"],
            description: "",
            docs: vec![Documentation {
                title: "OpenRTB (Real-Time Bidding)",
                link: "https://www.iab.com/guidelines/real-time-bidding-rtb-project/",
            }],
            subprotocols: vec![
                Subprotocol {
                    name: "VAST",
                    protocol: "vast",
                    versions: vec![],
                    docs: vec![Documentation {
                        title: "Digital Video Ad Serving Template (VAST)",
                        link: "https://www.iab.com/guidelines/vast/",
                    }],
                },
                Subprotocol {
                    name: "OpenNative",
                    protocol: "opennative",
                    versions: vec!["1.1", "1.2"],
                    docs: vec![
                        Documentation {
                            title: "OpenRTB Native Ads Specification 1.1",
                            link: "https://www.iab.com/wp-content/uploads/2016/03/OpenRTB-Native-Ads-Specification-1-1_2016.pdf",
                        },
                        Documentation {
                            title: "OpenRTB Native Ads Specification 1.2",
                            link: "https://www.iab.com/wp-content/uploads/2018/03/OpenRTB-Native-Ads-Specification-Final-1.2.pdf",
                        },
                    ],
                },
            ],
        }
    }

    /// 本驱动接受的协议别名
    pub fn protocols(&self) -> &'static [&'static str] {
        &["openrtb", "openrtb2", "openrtb3"]
    }
}

/// 文档链接
#[derive(Debug, Clone)]
pub struct Documentation {
    pub title: &'static str,
    pub link: &'static str,
}

/// 子协议描述
#[derive(Debug, Clone)]
pub struct Subprotocol {
    pub name: &'static str,
    pub protocol: &'static str,
    pub versions: Vec<&'static str>,
    pub docs: Vec<Documentation>,
}

/// 平台描述信息
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub name: &'static str,
    pub protocol: &'static str,
    pub versions: Vec<&'static str>,
    pub description: &'static str,
    pub docs: Vec<Documentation>,
    pub subprotocols: Vec<Subprotocol>,
}

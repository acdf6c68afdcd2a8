// src/model/request.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::context::RequestContext;
use crate::model::format::{Format, FormatKind};
use crate::openrtb::native;

/// 竞价模式（1 = 一价拍卖, 2 = 二价+拍卖）
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum AuctionType {
    FirstPrice = 1,
    SecondPrice = 2,
}

impl TryFrom<u8> for AuctionType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AuctionType::FirstPrice),
            2 => Ok(AuctionType::SecondPrice),
            _ => Err(format!("Invalid value for AuctionType: {}", value)),
        }
    }
}

impl From<AuctionType> for u8 {
    fn from(at: AuctionType) -> Self {
        at as u8
    }
}

impl Default for AuctionType {
    fn default() -> Self {
        AuctionType::SecondPrice
    }
}

/// 计价模型（RTB 渠道实际只会产生 CPM）
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PricingModel {
    #[default]
    Undefined,
    CPM,
    CPC,
    CPA,
}

/// 广告位在内部系统中绑定的投放目标
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Target {
    pub codename: String,
    #[serde(default)]
    pub pricing_model: PricingModel,
    /// 目标侧收益分成扣减因子，0..1
    #[serde(default)]
    pub revenue_share_reduce: f64,
}

impl Target {
    pub fn codename(&self) -> &str {
        &self.codename
    }

    pub fn revenue_share_reduce_factor(&self) -> f64 {
        self.revenue_share_reduce
    }
}

/// 用户数据分段
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UserDataSegment {
    pub name: String,
    pub value: String,
}

/// 任意来源的用户数据（DMP 等）
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UserDataItem {
    pub name: String,
    #[serde(default)]
    pub segments: Vec<UserDataSegment>,
}

/// 运营商信息
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Carrier {
    pub name: String,
}

/// 地理位置与网络归属信息
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Geo {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub country: String, // ISO 3166-1 Alpha 3
    #[serde(default)]
    pub region: String, // ISO 3166-2
    #[serde(default)]
    pub region_fips104: String,
    #[serde(default)]
    pub metro: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zip: String,
    /// 本地时间与 UTC 的分钟偏移
    #[serde(default)]
    pub utc_offset: i32,
    #[serde(default)]
    pub ipv4: String,
    #[serde(default)]
    pub ipv6: String,
    #[serde(default)]
    pub carrier: Option<Carrier>,
}

impl Geo {
    pub fn ipv4_string(&self) -> &str {
        &self.ipv4
    }

    pub fn ipv6_string(&self) -> &str {
        &self.ipv6
    }
}

/// 用户信息
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct User {
    #[serde(default)]
    pub id: String,
    /// "M" / "F" / "O"
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub geo: Geo,
    #[serde(default)]
    pub data: Vec<UserDataItem>,
}

/// 浏览器侧信息；请求未携带时使用默认表
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Browser {
    #[serde(default)]
    pub ua: String,
    #[serde(default)]
    pub dnt: i32,
    #[serde(default)]
    pub lmt: i32,
    #[serde(default)]
    pub js: i32,
    #[serde(default)]
    pub flash_ver: String,
    #[serde(default)]
    pub primary_language: String,
}

/// 操作系统信息
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Os {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// 设备大类
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Unknown,
    Mobile,
    PC,
    TV,
    Phone,
    Tablet,
    Connected,
    SetTopBox,
    Watch,
    Glasses,
}

/// 设备信息
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Device {
    #[serde(default)]
    pub browser: Option<Browser>,
    #[serde(default)]
    pub os: Option<Os>,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub hw_ver: String,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub ppi: i32,
    #[serde(default)]
    pub px_ratio: f64,
    #[serde(default)]
    pub conn_type: i32,
    /// 广告标识符（IDFA / GAID）
    #[serde(default)]
    pub ifa: String,
}

/// 站点库存信息（与 App 互斥）
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Site {
    #[serde(default)]
    pub ext_id: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub cat: Vec<String>, // IAB 内容分类
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub privacy_policy: i32,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub mobile: i32,
}

/// 应用库存信息（与 Site 互斥）
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct App {
    #[serde(default)]
    pub ext_id: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub cat: Vec<String>,
    #[serde(default)]
    pub privacy_policy: i32,
    #[serde(default)]
    pub bundle: String,
    #[serde(default)]
    pub store_url: String,
    #[serde(default)]
    pub ver: String,
    /// "1": 付费, "2": 免费
    #[serde(default)]
    pub paid: i32,
}

/// 单个广告位请求
///
/// 一个广告位可声明多个候选格式；出向请求会为每个 (广告位, 格式)
/// 组合生成一条 wire impression，并以 `id_by_format` 产生的稳定 ID
/// 与应答中的 bid 关联。
#[derive(Debug, Clone, Default)]
pub struct Impression {
    pub id: String,
    pub external_id: String,
    pub external_target_id: String,

    /// 当前宽高；拉伸格式另携带最大宽高
    pub width: i32,
    pub height: i32,
    pub width_max: i32,
    pub height_max: i32,

    /// OpenRTB 广告位位置编码
    pub pos: i32,
    /// 直跳（弹窗）模式
    pub direct: bool,
    /// 底价（CPM）
    pub bid_floor: f64,
    /// 相同布局下的重复广告位数量（原生多位）
    pub count: i32,

    pub target: Target,
    pub formats: Vec<Arc<Format>>,

    /// 原生广告上下文编码（OpenNative context / placement ids）
    pub context_type: u32,
    pub context_sub_type: u32,
    pub placement_type: u32,

    /// 上游预构建的原生请求（存在时直接透传，不再由格式模板合成）
    pub native_request: Option<native::Request>,
    pub native_request_v3: Option<native::Request>,

    /// 媒体侧佣金分成因子，0..1
    pub commission_share: f64,
    /// 固定采买展示价（无固定价时为 0）
    pub purchase_view_price: f64,
}

impl Impression {
    /// 该广告位在指定格式下的 wire impression ID
    pub fn id_by_format(&self, format: &Format) -> String {
        format!("{}_{}", self.id, format.codename)
    }

    pub fn is_direct(&self) -> bool {
        self.direct
    }

    pub fn formats(&self) -> &[Arc<Format>] {
        &self.formats
    }

    /// 按格式类型取第一个匹配的格式
    pub fn format_by_type(&self, kind: FormatKind) -> Option<&Arc<Format>> {
        self.formats.iter().find(|f| f.kind == kind)
    }

    pub fn context_type(&self) -> u32 {
        self.context_type
    }

    pub fn context_sub_type(&self) -> u32 {
        self.context_sub_type
    }

    pub fn placement_type(&self) -> u32 {
        self.placement_type
    }

    pub fn rtb_native_request(&self) -> Option<&native::Request> {
        self.native_request.as_ref()
    }

    pub fn rtb_native_request_v3(&self) -> Option<&native::Request> {
        self.native_request_v3.as_ref()
    }

    pub fn commission_share_factor(&self) -> f64 {
        self.commission_share
    }

    /// 展示动作的固定采买价；其余动作无固定价
    pub fn purchase_price_view(&self) -> f64 {
        self.purchase_view_price
    }
}

/// 内部竞价请求
///
/// 由竞价引擎构造并在各驱动间复用；Site 与 App 在合法请求中互斥，
/// 此处透传输入携带的一侧。
#[derive(Debug, Clone)]
pub struct BidRequest {
    pub id: String,
    pub secure: bool,
    pub time: DateTime<Utc>,
    pub auction_type: AuctionType,
    pub user: User,
    pub site: Option<Site>,
    pub app: Option<App>,
    pub device: Option<Device>,
    pub imps: Vec<Impression>,
    pub ctx: RequestContext,
}

impl Default for BidRequest {
    fn default() -> Self {
        Self {
            id: String::new(),
            secure: false,
            time: Utc::now(),
            auction_type: AuctionType::default(),
            user: User::default(),
            site: None,
            app: None,
            device: None,
            imps: Vec::new(),
            ctx: RequestContext::default(),
        }
    }
}

impl BidRequest {
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn site_info(&self) -> Option<&Site> {
        self.site.as_ref()
    }

    pub fn app_info(&self) -> Option<&App> {
        self.app.as_ref()
    }

    pub fn device_info(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn user_info(&self) -> &User {
        &self.user
    }

    /// 按 bid 回传的 impression ID 定位广告位。
    /// 回传 ID 可能是广告位原始 ID，也可能是 `id_by_format` 生成的
    /// `<id>_<codename>` 变体，两者都要能命中。
    pub fn impression_by_id_variation(&self, imp_id: &str) -> Option<&Impression> {
        self.imps.iter().find(|imp| {
            imp.id == imp_id
                || (imp_id.len() > imp.id.len()
                    && imp_id.starts_with(imp.id.as_str())
                    && imp_id.as_bytes()[imp.id.len()] == b'_')
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::format::FormatKind;

    fn request_with_imp_ids(ids: &[&str]) -> BidRequest {
        BidRequest {
            imps: ids
                .iter()
                .map(|id| Impression {
                    id: id.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn impression_lookup_accepts_format_suffixed_ids() {
        let req = request_with_imp_ids(&["i1", "i10"]);
        assert_eq!(req.impression_by_id_variation("i1").unwrap().id, "i1");
        assert_eq!(req.impression_by_id_variation("i1_b").unwrap().id, "i1");
        // 前缀相同但无下划线分隔的 ID 不会误命中
        assert_eq!(req.impression_by_id_variation("i10").unwrap().id, "i10");
        assert!(req.impression_by_id_variation("i2").is_none());
    }

    #[test]
    fn id_by_format_round_trips_through_lookup() {
        let format = Format::new("richbanner", FormatKind::Banner);
        let req = request_with_imp_ids(&["slot-1"]);
        let wire_id = req.imps[0].id_by_format(&format);
        assert_eq!(wire_id, "slot-1_richbanner");
        assert_eq!(
            req.impression_by_id_variation(&wire_id).unwrap().id,
            "slot-1"
        );
    }

    #[test]
    fn format_by_type_finds_first_match() {
        let mut imp = Impression::default();
        imp.formats = vec![
            Arc::new(Format::new("b", FormatKind::Banner)),
            Arc::new(Format::new("pop", FormatKind::Direct)),
        ];
        assert_eq!(
            imp.format_by_type(FormatKind::Direct).unwrap().codename,
            "pop"
        );
        assert!(imp.format_by_type(FormatKind::Native).is_none());
    }
}

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::errors::RtbError;

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// **Top-level OpenRTB 2.x Bid Request**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BidRequest {
    pub id: String,                 // 请求 ID，每个竞价请求唯一
    pub imp: Vec<Imp>,              // 广告展示请求（Impression）列表
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,         // 网站信息（如果请求来源是 Web）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,           // 应用信息（如果请求来源是 App）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,     // 设备信息（用户的浏览器、IP、设备 ID）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,         // 用户信息
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub at: i32,                    // 竞价模式（1 = 第一价格拍卖, 2 = 第二价格拍卖）
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub tmax: i32,                  // 竞价超时时间（毫秒）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wseat: Vec<String>,         // 允许出价的买方席位
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub allimps: i32,               // 是否对所有广告位都需要出价
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cur: Vec<String>,           // 允许的货币（如 USD）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcat: Vec<String>,          // 屏蔽的广告类别（IAB 分类）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badv: Vec<String>,          // 屏蔽的广告主域名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regs: Option<Box<RawValue>>, // 隐私法规信息（GDPR、CCPA 等）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Box<RawValue>>,
}

impl BidRequest {
    /// 出向前的结构校验
    pub fn validate(&self) -> Result<(), RtbError> {
        if self.id.is_empty() {
            return Err(RtbError::InvalidBidRequest("request id is required".into()));
        }
        if self.imp.is_empty() {
            return Err(RtbError::InvalidBidRequest("no impressions".into()));
        }
        if self.site.is_some() && self.app.is_some() {
            return Err(RtbError::InvalidBidRequest(
                "site and app are mutually exclusive".into(),
            ));
        }
        for imp in &self.imp {
            imp.validate()?;
        }
        Ok(())
    }
}

/// **Impression（广告展示请求）**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Imp {
    pub id: String,                  // 展示请求 ID（广告位 ID + 格式后缀）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,      // Banner 广告信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,        // 视频广告信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,      // 原生广告信息
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub instl: i32,                  // 插屏标记（"1": 插屏 / 弹窗）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tagid: String,               // 该 Impression 在内部系统中的标识符
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub bidfloor: f64,               // 最低竞价（CPM）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bidfloorcur: String,         // 最低竞价的货币类型
    #[serde(default)]
    pub secure: i32,                 // 是否要求 HTTPS 创意
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Box<RawValue>>,  // 扩展（直跳格式时为 {"type":"pop"}）
}

impl Imp {
    fn validate(&self) -> Result<(), RtbError> {
        if self.id.is_empty() {
            return Err(RtbError::InvalidBidRequest("impression id is required".into()));
        }
        // 每个 impression 必须且只能携带一种变体
        let variants = [
            self.banner.is_some(),
            self.video.is_some(),
            self.native.is_some(),
            self.ext.is_some(),
        ];
        if variants.iter().filter(|v| **v).count() != 1 {
            return Err(RtbError::InvalidBidRequest(format!(
                "impression {} must carry exactly one of banner/video/native/ext",
                self.id
            )));
        }
        Ok(())
    }
}

/// **Banner（横幅广告）**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Banner {
    pub w: i32,                      // Banner 宽度（像素）
    pub h: i32,                      // Banner 高度（像素）
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub wmax: i32,                   // 拉伸格式的最大宽度
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub hmax: i32,                   // 拉伸格式的最大高度
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub wmin: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub hmin: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub pos: i32,                    // 广告位位置编码
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub topframe: i32,
}

/// **Video（视频广告）**
/// 当前请求构建侧不产生视频 impression，结构保留用于解析
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Video {
    #[serde(default)]
    pub mimes: Vec<String>,          // 支持的视频格式（如 video/mp4）
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub minduration: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub maxduration: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub w: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub h: i32,
}

/// **Native（原生广告）**
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Native {
    pub request: Box<RawValue>,      // 原生广告请求载荷（双重 JSON 编码的字符串值）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ver: String,                 // OpenNative 版本
}

/// **网站信息**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Site {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,                  // 外部系统中的站点 ID
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,            // IAB 内容分类
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,              // 网站域名
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keywords: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacypolicy: Option<i32>,  // "1": 有隐私政策
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub page: String,                // 当前页面 URL
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub referrer: String,            // 来源 URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search: String,              // 引导到达的搜索词
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub mobile: i32,                 // "1": 移动端优化站点
}

/// **App 信息**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct App {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,                  // 外部系统中的应用 ID
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keywords: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacypolicy: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bundle: String,              // 应用包名
    #[serde(rename = "storeurl", default, skip_serializing_if = "String::is_empty")]
    pub store_url: String,           // 应用商店 URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ver: String,                 // 应用版本
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub paid: i32,                   // "1": 付费, "2": 免费
}

/// **设备信息**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Device {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ua: String,                  // 用户代理（User-Agent）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,            // 设备当前位置
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub dnt: i32,                    // "1": 不跟踪
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub lmt: i32,                    // "1": 限制广告跟踪
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip: String,                  // IPv4 地址
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ipv6: String,                // IPv6 地址
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub devicetype: i32,             // 设备大类
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub make: String,                // 设备厂商
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,               // 设备型号
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,                  // 操作系统
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub osv: String,                 // 操作系统版本
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hwv: String,                 // 硬件版本
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub h: i32,                      // 屏幕物理高度（像素）
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub w: i32,                      // 屏幕物理宽度（像素）
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub ppi: i32,                    // 每英寸像素
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub pxratio: f64,                // 物理像素与逻辑像素比
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub js: i32,                     // JavaScript 可用状态
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flashver: String,            // Flash 版本
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,            // 浏览器语言
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub carrier: String,             // 运营商
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub connectiontype: i32,         // 网络连接类型
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ifa: String,                 // 广告标识符
}

/// **地理位置信息**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Geo {
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub lat: f64,                    // 纬度 -90 ~ 90
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub lon: f64,                    // 经度 -180 ~ 180
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,             // ISO 3166-1 Alpha 3
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,              // ISO 3166-2
    #[serde(rename = "regionfips104", default, skip_serializing_if = "String::is_empty")]
    pub region_fips104: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metro: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub city: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zip: String,
    #[serde(rename = "utcoffset", default, skip_serializing_if = "is_zero_i32")]
    pub utc_offset: i32,             // 本地时间与 UTC 的分钟偏移
}

/// **用户信息**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,                  // 交换侧用户唯一 ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gender: String,              // "M" / "F" / "O"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keywords: String,            // 逗号分隔的兴趣关键词
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Data>,             // 附加用户数据（DMP 分段等）
}

/// **用户数据块**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Data {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segment: Vec<Segment>,
}

/// **用户数据分段**
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

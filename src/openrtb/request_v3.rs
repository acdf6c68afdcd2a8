// src/openrtb/request_v3.rs

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::errors::RtbError;

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// OpenRTB 3.0 竞价请求
///
/// 字段全集与 2.x 版本对应，wire 侧标签保持兼容；
/// 结构层命名跟随 3.0 规范的展开写法。
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BidRequest {
    pub id: String,
    #[serde(rename = "imp")]
    pub impressions: Vec<Impression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(rename = "at", default, skip_serializing_if = "is_zero_i32")]
    pub auction_type: i32,
    #[serde(rename = "tmax", default, skip_serializing_if = "is_zero_i32")]
    pub time_max: i32,
    #[serde(rename = "wseat", default, skip_serializing_if = "Vec::is_empty")]
    pub seats: Vec<String>,
    #[serde(rename = "allimps", default, skip_serializing_if = "is_zero_i32")]
    pub all_impressions: i32,
    #[serde(rename = "cur", default, skip_serializing_if = "Vec::is_empty")]
    pub currencies: Vec<String>,
    #[serde(rename = "bcat", default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_categories: Vec<String>,
    #[serde(rename = "badv", default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_adv_domains: Vec<String>,
    #[serde(rename = "regs", default, skip_serializing_if = "Option::is_none")]
    pub regulations: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Box<RawValue>>,
}

impl BidRequest {
    pub fn validate(&self) -> Result<(), RtbError> {
        if self.id.is_empty() {
            return Err(RtbError::InvalidBidRequest("request id is required".into()));
        }
        if self.impressions.is_empty() {
            return Err(RtbError::InvalidBidRequest("no impressions".into()));
        }
        if self.site.is_some() && self.app.is_some() {
            return Err(RtbError::InvalidBidRequest(
                "site and app are mutually exclusive".into(),
            ));
        }
        for imp in &self.impressions {
            imp.validate()?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Impression {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
    #[serde(rename = "instl", default, skip_serializing_if = "is_zero_i32")]
    pub interstitial: i32,
    #[serde(rename = "tagid", default, skip_serializing_if = "String::is_empty")]
    pub tag_id: String,
    #[serde(rename = "bidfloor", default, skip_serializing_if = "is_zero_f64")]
    pub bid_floor: f64,
    #[serde(rename = "bidfloorcur", default, skip_serializing_if = "String::is_empty")]
    pub bid_floor_currency: String,
    #[serde(default)]
    pub secure: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Box<RawValue>>,
}

impl Impression {
    fn validate(&self) -> Result<(), RtbError> {
        if self.id.is_empty() {
            return Err(RtbError::InvalidBidRequest("impression id is required".into()));
        }
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

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Banner {
    #[serde(rename = "w")]
    pub width: i32,
    #[serde(rename = "h")]
    pub height: i32,
    #[serde(rename = "wmax", default, skip_serializing_if = "is_zero_i32")]
    pub width_max: i32,
    #[serde(rename = "hmax", default, skip_serializing_if = "is_zero_i32")]
    pub height_max: i32,
    #[serde(rename = "wmin", default, skip_serializing_if = "is_zero_i32")]
    pub width_min: i32,
    #[serde(rename = "hmin", default, skip_serializing_if = "is_zero_i32")]
    pub height_min: i32,
    #[serde(rename = "pos", default, skip_serializing_if = "is_zero_i32")]
    pub position: i32,
    #[serde(rename = "topframe", default, skip_serializing_if = "is_zero_i32")]
    pub top_frame: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Video {
    #[serde(default)]
    pub mimes: Vec<String>,
    #[serde(rename = "minduration", default, skip_serializing_if = "is_zero_i32")]
    pub min_duration: i32,
    #[serde(rename = "maxduration", default, skip_serializing_if = "is_zero_i32")]
    pub max_duration: i32,
    #[serde(rename = "w", default, skip_serializing_if = "is_zero_i32")]
    pub width: i32,
    #[serde(rename = "h", default, skip_serializing_if = "is_zero_i32")]
    pub height: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Native {
    /// 双重 JSON 编码的原生请求载荷
    pub request: Box<RawValue>,
    #[serde(rename = "ver", default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Site {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "cat", default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keywords: String,
    #[serde(rename = "privacypolicy", default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub page: String,
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub referrer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub search: String,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub mobile: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct App {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "cat", default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keywords: String,
    #[serde(rename = "privacypolicy", default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bundle: String,
    #[serde(rename = "storeurl", default, skip_serializing_if = "String::is_empty")]
    pub store_url: String,
    #[serde(rename = "ver", default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub paid: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Device {
    #[serde(rename = "ua", default, skip_serializing_if = "String::is_empty")]
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub dnt: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub lmt: i32,
    #[serde(rename = "ip", default, skip_serializing_if = "String::is_empty")]
    pub ip_v4: String,
    #[serde(rename = "ipv6", default, skip_serializing_if = "String::is_empty")]
    pub ip_v6: String,
    #[serde(rename = "devicetype", default, skip_serializing_if = "is_zero_i32")]
    pub device_type: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub make: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(rename = "os", default, skip_serializing_if = "String::is_empty")]
    pub os_name: String,
    #[serde(rename = "osv", default, skip_serializing_if = "String::is_empty")]
    pub os_version: String,
    #[serde(rename = "hwv", default, skip_serializing_if = "String::is_empty")]
    pub hw_version: String,
    #[serde(rename = "h", default, skip_serializing_if = "is_zero_i32")]
    pub height: i32,
    #[serde(rename = "w", default, skip_serializing_if = "is_zero_i32")]
    pub width: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub ppi: i32,
    #[serde(rename = "pxratio", default, skip_serializing_if = "is_zero_f64")]
    pub pixel_ratio: f64,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub js: i32,
    #[serde(rename = "flashver", default, skip_serializing_if = "String::is_empty")]
    pub flash_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub carrier: String,
    #[serde(rename = "connectiontype", default, skip_serializing_if = "is_zero_i32")]
    pub connection_type: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ifa: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Geo {
    #[serde(rename = "lat", default, skip_serializing_if = "is_zero_f64")]
    pub latitude: f64,
    #[serde(rename = "lon", default, skip_serializing_if = "is_zero_f64")]
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(rename = "regionfips104", default, skip_serializing_if = "String::is_empty")]
    pub region_fips104: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metro: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub city: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub zip: String,
    #[serde(rename = "utcoffset", default, skip_serializing_if = "is_zero_i32")]
    pub utc_offset: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub gender: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keywords: String,
    #[serde(rename = "customdata", default, skip_serializing_if = "String::is_empty")]
    pub custom_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Data>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Data {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segment: Vec<Segment>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
}

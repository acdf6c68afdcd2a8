use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::errors::RtbError;

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

/// OpenRTB Bid Response
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BidResponse {
    pub id: String,
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bidid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customdata: Option<String>,
    /// 不出价原因编码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbr: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Box<RawValue>>,
}

impl BidResponse {
    /// 应答结构校验
    pub fn validate(&self) -> Result<(), RtbError> {
        if self.id.is_empty() {
            return Err(RtbError::InvalidResponse("response id is required".into()));
        }
        for seat in &self.seatbid {
            if seat.bid.is_empty() {
                return Err(RtbError::InvalidResponse("seatbid without bids".into()));
            }
            for bid in &seat.bid {
                bid.validate()?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SeatBid {
    pub bid: Vec<Bid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
    /// "1" 表示整组出价必须整体成交；系统不支持
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub group: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Bid {
    pub id: String,
    pub impid: String,               // 对应的展示请求 ID
    pub price: f64,                  // 出价（eCPM）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub adid: String,                // 广告 ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nurl: String,                // Win 通知 URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub burl: String,                // 计费 URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub adm: String,                 // 广告创意（HTML / URL / 原生 JSON）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adomain: Vec<String>,        // 广告主域名
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,            // IAB 内容分类
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attr: Vec<i32>,              // 创意属性
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dealid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cid: String,                 // 活动 ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub crid: String,                // 创意 ID
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub w: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub h: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Box<RawValue>>,
}

impl Bid {
    pub fn validate(&self) -> Result<(), RtbError> {
        if self.id.is_empty() {
            return Err(RtbError::InvalidResponse("bid id is required".into()));
        }
        if self.impid.is_empty() {
            return Err(RtbError::InvalidResponse("bid impid is required".into()));
        }
        Ok(())
    }
}

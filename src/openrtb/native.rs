// src/openrtb/native.rs

use serde::{Deserialize, Serialize};

/// 图片素材类型（OpenNative image asset type ids）
/// 取值固定为 OpenNative 1.1/1.2 规范常量：icon=1, logo=2, main=3
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "i32", into = "i32")]
pub enum ImageTypeId {
    #[default]
    Undefined = 0,
    Icon = 1,
    Logo = 2,
    Main = 3,
}

impl TryFrom<i32> for ImageTypeId {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ImageTypeId::Undefined),
            1 => Ok(ImageTypeId::Icon),
            2 => Ok(ImageTypeId::Logo),
            3 => Ok(ImageTypeId::Main),
            // 500+ 为交换侧自定义区间，折叠到 Undefined
            _ => Ok(ImageTypeId::Undefined),
        }
    }
}

impl From<ImageTypeId> for i32 {
    fn from(t: ImageTypeId) -> Self {
        t as i32
    }
}

/// 数据字段类型（OpenNative data asset type ids）
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "i32", into = "i32")]
pub enum DataTypeId {
    #[default]
    Undefined = 0,
    Sponsored = 1,
    Desc = 2,
    Rating = 3,
    Likes = 4,
    Downloads = 5,
    Price = 6,
    SalePrice = 7,
    Phone = 8,
    Address = 9,
    DescAdditional = 10,
    DisplayURL = 11,
    CTAText = 12,
}

impl TryFrom<i32> for DataTypeId {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => DataTypeId::Sponsored,
            2 => DataTypeId::Desc,
            3 => DataTypeId::Rating,
            4 => DataTypeId::Likes,
            5 => DataTypeId::Downloads,
            6 => DataTypeId::Price,
            7 => DataTypeId::SalePrice,
            8 => DataTypeId::Phone,
            9 => DataTypeId::Address,
            10 => DataTypeId::DescAdditional,
            11 => DataTypeId::DisplayURL,
            12 => DataTypeId::CTAText,
            _ => DataTypeId::Undefined,
        })
    }
}

impl From<DataTypeId> for i32 {
    fn from(t: DataTypeId) -> Self {
        t as i32
    }
}

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

/// 标题素材请求
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Title {
    /// 标题最大长度
    pub len: i32,
}

/// 图片素材请求
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Image {
    #[serde(rename = "type", default, skip_serializing_if = "ImageTypeId::is_undefined")]
    pub type_id: ImageTypeId,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub wmin: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub hmin: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
}

impl ImageTypeId {
    fn is_undefined(&self) -> bool {
        *self == ImageTypeId::Undefined
    }
}

/// 数据素材请求
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Data {
    #[serde(rename = "type")]
    pub type_id: DataTypeId,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub len: i32,
}

/// 原生请求中的单个素材声明
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Asset {
    pub id: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub required: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<Image>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
}

/// OpenNative 请求对象
///
/// 序列化后还要整体包一层 `{"native":...}` 并再编码为 JSON 字符串，
/// 见请求构建侧。
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Request {
    pub ver: String,
    /// 广告出现的上下文大类
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub context: u32,
    #[serde(rename = "contextsubtype", default, skip_serializing_if = "is_zero_u32")]
    pub context_sub_type: u32,
    #[serde(rename = "plcmttype", default, skip_serializing_if = "is_zero_u32")]
    pub placement_type: u32,
    #[serde(rename = "plcmtcnt", default)]
    pub placement_count: i32,
    #[serde(rename = "seq", default)]
    pub sequence: i32,
    pub assets: Vec<Asset>,
}

/// 应答侧链接对象
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ResponseLink {
    #[serde(default)]
    pub url: String,
    #[serde(rename = "clicktrackers", default, skip_serializing_if = "Vec::is_empty")]
    pub click_trackers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

/// 应答侧标题素材
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ResponseTitle {
    #[serde(default)]
    pub text: String,
}

/// 应答侧图片素材
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ResponseImage {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub w: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub h: i32,
}

/// 应答侧数据素材
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ResponseData {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
}

/// 应答侧单个素材
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ResponseAsset {
    #[serde(default)]
    pub id: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub required: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<ResponseTitle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<ResponseImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<ResponseLink>,
}

/// OpenNative 应答对象（bid.adm 解出的创意结构）
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
    #[serde(default)]
    pub assets: Vec<ResponseAsset>,
    #[serde(default)]
    pub link: ResponseLink,
    #[serde(rename = "imptrackers", default, skip_serializing_if = "Vec::is_empty")]
    pub imp_trackers: Vec<String>,
    #[serde(rename = "jstracker", default, skip_serializing_if = "Option::is_none")]
    pub js_tracker: Option<String>,
}

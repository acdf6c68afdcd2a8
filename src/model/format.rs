// src/model/format.rs

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// 广告格式类型（带判别标签，映射器据此做穷举分支）
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum FormatKind {
    /// 固定尺寸横幅
    Banner = 1,
    /// 可拉伸横幅（携带最大宽高）
    Stretch = 2,
    /// 以 iframe / URL 形式代理渲染的横幅
    Proxy = 3,
    /// 原生广告（结构化素材）
    Native = 4,
    /// 直跳 / 弹窗，创意即落地 URL
    Direct = 5,
    /// 视频（VAST），当前请求侧不出价
    Video = 6,
}

impl TryFrom<u8> for FormatKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FormatKind::Banner),
            2 => Ok(FormatKind::Stretch),
            3 => Ok(FormatKind::Proxy),
            4 => Ok(FormatKind::Native),
            5 => Ok(FormatKind::Direct),
            6 => Ok(FormatKind::Video),
            _ => Err(format!("Invalid value for FormatKind: {}", value)),
        }
    }
}

impl From<FormatKind> for u8 {
    fn from(kind: FormatKind) -> Self {
        kind as u8
    }
}

impl FormatKind {
    pub fn is_banner(self) -> bool {
        matches!(self, FormatKind::Banner | FormatKind::Stretch)
    }

    pub fn is_stretch(self) -> bool {
        self == FormatKind::Stretch
    }

    pub fn is_proxy(self) -> bool {
        self == FormatKind::Proxy
    }

    pub fn is_native(self) -> bool {
        self == FormatKind::Native
    }

    pub fn is_direct(self) -> bool {
        self == FormatKind::Direct
    }
}

/// 图片素材在格式模板中的角色
pub const FORMAT_ASSET_MAIN: &str = "main";
pub const FORMAT_ASSET_ICON: &str = "icon";
pub const FORMAT_ASSET_LOGO: &str = "logo";

/// 文本字段名（封闭集合）
pub const FORMAT_FIELD_TITLE: &str = "title";
pub const FORMAT_FIELD_DESCRIPTION: &str = "description";
pub const FORMAT_FIELD_BRANDNAME: &str = "brandname";
pub const FORMAT_FIELD_PHONE: &str = "phone";
pub const FORMAT_FIELD_URL: &str = "url";
pub const FORMAT_FIELD_RATING: &str = "rating";
pub const FORMAT_FIELD_LIKES: &str = "likes";
pub const FORMAT_FIELD_ADDRESS: &str = "address";
pub const FORMAT_FIELD_SPONSORED: &str = "sponsored";

/// 原生广告的图片类素材声明（main / icon / logo）
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FormatAsset {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min_width: i32,
    #[serde(default)]
    pub min_height: i32,
    /// 允许的 MIME 类型列表
    #[serde(default)]
    pub allowed_types: Vec<String>,
    #[serde(default)]
    pub image_support: bool,
    #[serde(default)]
    pub video_support: bool,
}

impl FormatAsset {
    pub fn is_image_support(&self) -> bool {
        self.image_support
    }

    pub fn is_video_support(&self) -> bool {
        self.video_support
    }
}

/// 原生广告的文本类字段声明（title / description / ...）
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FormatField {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub max_length: i32,
}

impl FormatField {
    pub fn max_length(&self) -> i32 {
        self.max_length
    }
}

/// 格式模板的素材配置
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct FormatConfig {
    #[serde(default)]
    pub assets: Vec<FormatAsset>,
    #[serde(default)]
    pub fields: Vec<FormatField>,
}

impl FormatConfig {
    /// 主图素材声明（若配置中存在）
    pub fn main_asset(&self) -> Option<&FormatAsset> {
        self.assets.iter().find(|a| a.name == FORMAT_ASSET_MAIN)
    }
}

/// 声明式广告格式模板
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Format {
    pub codename: String,
    pub kind: FormatKind,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub config: FormatConfig,
}

impl Format {
    pub fn new(codename: &str, kind: FormatKind) -> Self {
        Self {
            codename: codename.to_string(),
            kind,
            width: 0,
            height: 0,
            config: FormatConfig::default(),
        }
    }

    pub fn is_banner(&self) -> bool {
        self.kind.is_banner()
    }

    pub fn is_stretch(&self) -> bool {
        self.kind.is_stretch()
    }

    pub fn is_proxy(&self) -> bool {
        self.kind.is_proxy()
    }

    pub fn is_native(&self) -> bool {
        self.kind.is_native()
    }

    pub fn is_direct(&self) -> bool {
        self.kind.is_direct()
    }
}

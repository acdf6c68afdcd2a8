// src/bidding/response_item.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::RtbError;
use crate::model::format::{Format, FormatKind};
use crate::model::request::{BidRequest, Impression, PricingModel};
use crate::model::source::RtbSource;
use crate::openrtb::native;
use crate::openrtb::response::Bid;

/// 通用内容项键名
pub const CONTENT_ITEM_CONTENT: &str = "content";
pub const CONTENT_ITEM_IFRAME_URL: &str = "iframe_url";
pub const CONTENT_ITEM_LINK: &str = "link";
pub const CONTENT_ITEM_NOTIFY_WIN_URL: &str = "notify_win_url";
pub const CONTENT_ITEM_NOTIFY_DISPLAY_URL: &str = "notify_display_url";

/// 计费动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Click,
    Lead,
}

/// 单次展示的价格视图
///
/// 所有价格以货币单位计；eCPM 保持 wire 侧的千次口径。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceScope {
    pub max_bid_price: f64,
    pub bid_price: f64,
    pub view_price: f64,
    pub ecpm: f64,
}

impl PriceScope {
    /// 调整出价；超过上限时拒绝
    pub fn set_bid_price(&mut self, price: f64) -> bool {
        if price > self.max_bid_price {
            return false;
        }
        self.bid_price = price;
        true
    }

    pub fn price_per_action(&self, action: Action) -> f64 {
        match action {
            Action::View => self.view_price,
            // RTB 渠道只有 CPM 计价
            Action::Click | Action::Lead => 0.0,
        }
    }
}

/// 按系统定价规则修正外部出价
///
/// 依次应用来源价格修正因子与目标收益分成因子；
/// 上层引擎可以替换为自己的定价策略。
pub fn calculate_new_bid_price(view_price: f64, source_reduce: f64, target_reduce: f64) -> f64 {
    let mut price = view_price;
    if source_reduce > 0.0 {
        price *= 1.0 - source_reduce.min(1.0);
    }
    if target_reduce > 0.0 {
        price *= 1.0 - target_reduce.min(1.0);
    }
    price
}

/// 广告素材类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdAssetType {
    Image,
}

/// 从原生应答中还原出的广告素材
#[derive(Debug, Clone)]
pub struct AdAsset {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub kind: AdAssetType,
    pub width: i32,
    pub height: i32,
}

/// 竞价应答中单个获胜 bid 物化出的广告条目
///
/// 引擎据此读取创意内容、落地链接、素材与价格信息。
#[derive(Debug, Clone)]
pub struct ResponseBidItem {
    pub item_id: String,

    pub src: Arc<RtbSource>,
    pub req: Arc<BidRequest>,
    pub imp: Impression,

    /// 物化时判定出的条目形态
    pub format_type: FormatKind,
    pub resp_format: Arc<Format>,

    /// RTB 来源返回的原始 bid
    pub bid: Bid,
    pub native: Option<native::Response>,
    pub action_link: String,

    pub price_scope: PriceScope,

    /// 原生字段名 → 取值（按请求声明恢复）
    pub data: Option<HashMap<String, String>>,
}

impl ResponseBidItem {
    /// 条目 ID（等于广告位 ID）
    pub fn id(&self) -> &str {
        &self.item_id
    }

    pub fn source_id(&self) -> u64 {
        self.src.id
    }

    /// 按键名读取创意内容
    pub fn content_item(&self, name: &str) -> Option<String> {
        if let Some(data) = &self.data {
            return data.get(name).cloned();
        }

        match name {
            CONTENT_ITEM_CONTENT if self.format_type.is_banner() => {
                Some(self.bid.adm.clone())
            }
            CONTENT_ITEM_IFRAME_URL if self.format_type.is_banner() => {
                let markup = &self.bid.adm;
                if markup.starts_with("http://")
                    || markup.starts_with("https://")
                    || (markup.starts_with("//") && !markup.contains(['\n', '\t']))
                {
                    Some(markup.clone())
                } else {
                    None
                }
            }
            CONTENT_ITEM_LINK => match (&self.native, self.format_type) {
                (Some(native), _) => Some(native.link.url.clone()),
                (None, FormatKind::Direct) => Some(self.bid.adm.clone()),
                _ => None,
            },
            CONTENT_ITEM_NOTIFY_WIN_URL => Some(self.bid.nurl.clone()),
            CONTENT_ITEM_NOTIFY_DISPLAY_URL => Some(self.bid.burl.clone()),
            _ => {
                let native = self.native.as_ref()?;
                if name == crate::model::format::FORMAT_FIELD_TITLE {
                    return native
                        .assets
                        .iter()
                        .find_map(|a| a.title.as_ref().map(|t| t.text.clone()));
                }
                native.assets.iter().find_map(|a| {
                    a.data
                        .as_ref()
                        .filter(|d| d.label == name)
                        .map(|d| d.value.clone())
                })
            }
        }
    }

    /// 按格式配置还原全部文本字段
    pub fn content_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        let native = match &self.native {
            Some(native) => native,
            None => return fields,
        };
        for field in &self.resp_format.config.fields {
            for asset in &native.assets {
                if field.id != asset.id {
                    continue;
                }
                if let Some(title) = &asset.title {
                    fields.insert(field.name.clone(), title.text.clone());
                } else if let Some(link) = &asset.link {
                    fields.insert(field.name.clone(), link.url.clone());
                } else if let Some(data) = &asset.data {
                    fields.insert(field.name.clone(), data.value.clone());
                }
                break;
            }
        }
        fields
    }

    /// 展示跟踪链接（仅原生创意携带）
    pub fn impression_tracker_links(&self) -> &[String] {
        match &self.native {
            Some(native) => &native.imp_trackers,
            None => &[],
        }
    }

    /// 点击跟踪链接
    pub fn click_tracker_links(&self) -> &[String] {
        match &self.native {
            Some(native) => &native.link.click_trackers,
            None => &[],
        }
    }

    /// 原生应答素材与格式配置按 ID 关联，还原素材列表
    pub fn assets(&self) -> Vec<AdAsset> {
        let mut result = Vec::new();
        let native = match &self.native {
            Some(native) => native,
            None => return result,
        };
        for config_asset in &self.resp_format.config.assets {
            for asset in &native.assets {
                if asset.id != config_asset.id {
                    continue;
                }
                if let Some(img) = &asset.img {
                    result.push(AdAsset {
                        id: asset.id as u64,
                        name: config_asset.name.clone(),
                        path: img.url.clone(),
                        kind: AdAssetType::Image,
                        width: img.w,
                        height: img.h,
                    });
                }
                break;
            }
        }
        result
    }

    /// 主图素材
    pub fn main_asset(&self) -> Option<AdAsset> {
        let main = self.resp_format.config.main_asset()?;
        self.assets().into_iter().find(|a| a.id == main.id as u64)
    }

    pub fn format(&self) -> &Format {
        &self.resp_format
    }

    pub fn impression(&self) -> &Impression {
        &self.imp
    }

    pub fn impression_id(&self) -> &str {
        &self.imp.id
    }

    pub fn ext_impression_id(&self) -> &str {
        &self.imp.external_id
    }

    pub fn ext_target_id(&self) -> &str {
        &self.imp.external_target_id
    }

    /// 外部创意 ID
    pub fn ad_creative_id(&self) -> &str {
        &self.bid.crid
    }

    /// RTB 渠道只有 CPM 计价
    pub fn pricing_model(&self) -> PricingModel {
        PricingModel::CPM
    }

    pub fn ecpm(&self) -> f64 {
        self.price_scope.ecpm
    }

    /// 指定动作的价格
    pub fn price(&self, action: Action) -> f64 {
        self.price_scope.price_per_action(action)
    }

    /// 对外竞价出价（已按来源修正与分成扣减）
    pub fn bid_price(&self) -> f64 {
        self.price_scope.bid_price
    }

    pub fn set_bid_price(&mut self, price: f64) -> Result<(), RtbError> {
        if !self.price_scope.set_bid_price(price) {
            return Err(RtbError::InvalidResponse(
                "new auction bid is higher than max bid".into(),
            ));
        }
        Ok(())
    }

    /// 采买价：从外部来源买入一次动作的成本
    pub fn purchase_price(&self, action: Action) -> f64 {
        match action {
            Action::View => self.imp.purchase_price_view(),
            Action::Click | Action::Lead => 0.0,
        }
    }

    pub fn commission_share_factor(&self) -> f64 {
        self.imp.commission_share_factor()
    }

    pub fn source_correction_factor(&self) -> f64 {
        self.src.price_correction_reduce_factor()
    }

    pub fn target_correction_factor(&self) -> f64 {
        self.imp.target.revenue_share_reduce_factor()
    }

    /// 创意的 RTB 内容分类
    pub fn rtb_categories(&self) -> &[String] {
        &self.bid.cat
    }

    pub fn is_direct(&self) -> bool {
        self.imp.is_direct()
    }

    /// 直跳 / 原生创意的落地 URL
    pub fn action_url(&self) -> &str {
        &self.action_link
    }

    pub fn width(&self) -> i32 {
        self.bid.w
    }

    pub fn height(&self) -> i32 {
        self.bid.h
    }

    pub fn validate(&self) -> Result<(), RtbError> {
        if self.item_id.is_empty() {
            return Err(RtbError::InvalidResponse("item is not initialized".into()));
        }
        self.bid.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_scope_rejects_bid_above_max() {
        let mut scope = PriceScope {
            max_bid_price: 1.0,
            bid_price: 0.8,
            view_price: 0.8,
            ecpm: 800.0,
        };
        assert!(!scope.set_bid_price(1.5));
        assert_eq!(scope.bid_price, 0.8);
        assert!(scope.set_bid_price(0.5));
        assert_eq!(scope.bid_price, 0.5);
    }

    #[test]
    fn calculate_new_bid_price_applies_reduce_factors() {
        assert_eq!(calculate_new_bid_price(1.0, 0.0, 0.0), 1.0);
        assert!((calculate_new_bid_price(1.0, 0.1, 0.0) - 0.9).abs() < 1e-9);
        assert!((calculate_new_bid_price(1.0, 0.1, 0.5) - 0.45).abs() < 1e-9);
    }
}

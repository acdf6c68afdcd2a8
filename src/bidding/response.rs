// src/bidding/response.rs

use std::sync::Arc;

use tracing::debug;

use crate::bidding::helpers::{
    banner_format_type, custom_direct_url, decode_pop_markup, prepare_url, MacroReplacer,
};
use crate::bidding::native_helpers::{decode_native_markup, extract_native_data_from_impression};
use crate::bidding::response_item::{calculate_new_bid_price, PriceScope, ResponseBidItem};
use crate::errors::RtbError;
use crate::model::context::RequestContext;
use crate::model::format::FormatKind;
use crate::model::request::{AuctionType, BidRequest, Impression};
use crate::model::source::RtbSource;
use crate::openrtb::response as wire;

/// 归一化后的竞价应答
///
/// 持有来源配置、原始请求与 wire 应答；`prepare` 完成宏替换、
/// 最优 bid 选择与广告条目物化。对象存活到本轮竞价决策结束，
/// `release` 释放内部切片并解除对请求的引用。
#[derive(Debug)]
pub struct BidResponse {
    src: Arc<RtbSource>,
    req: Option<Arc<BidRequest>>,
    ctx: RequestContext,

    bid_response: wire::BidResponse,

    bid_resp_bid_count: usize,
    optimal_bids: Vec<wire::Bid>,
    ads: Vec<ResponseBidItem>,
}

impl BidResponse {
    /// 由 wire 应答构建归一化应答。
    ///
    /// 安全校验与价格上限过滤在物化之前完成；
    /// 过滤后没有剩余席位时返回 `Ok(None)`（按无填充处理）。
    pub fn build(
        src: Arc<RtbSource>,
        req: Arc<BidRequest>,
        mut bid_response: wire::BidResponse,
    ) -> Result<Option<Self>, RtbError> {
        // HTTPS 请求拒绝携带明文链接的整个应答
        if req.is_secure() {
            for seat in &bid_response.seatbid {
                for bid in &seat.bid {
                    if bid.adm.contains("http://") {
                        return Err(RtbError::ResponseNotSecure);
                    }
                }
            }
        }

        // 超出价格上限的 bid 丢弃；清空后的席位一并丢弃
        if src.max_bid > 0.0 {
            let max_bid = src.max_bid;
            for seat in &mut bid_response.seatbid {
                seat.bid.retain(|bid| bid.price <= max_bid);
            }
            bid_response.seatbid.retain(|seat| !seat.bid.is_empty());
        }

        if bid_response.seatbid.is_empty() {
            return Ok(None);
        }

        let ctx = req.ctx.clone();
        let mut response = Self {
            src,
            req: Some(req),
            ctx,
            bid_response,
            bid_resp_bid_count: 0,
            optimal_bids: Vec::new(),
            ads: Vec::new(),
        };
        response.prepare();
        Ok(Some(response))
    }

    /// 空应答（来源没有返回任何可用 bid）
    pub fn empty(src: Arc<RtbSource>, req: Arc<BidRequest>) -> Self {
        let ctx = req.ctx.clone();
        Self {
            src,
            req: Some(req),
            ctx,
            bid_response: wire::BidResponse::default(),
            bid_resp_bid_count: 0,
            optimal_bids: Vec::new(),
            ads: Vec::new(),
        }
    }

    pub fn auction_id(&self) -> &str {
        &self.bid_response.id
    }

    pub fn auction_type(&self) -> Option<AuctionType> {
        self.req.as_ref().map(|r| r.auction_type)
    }

    pub fn source_id(&self) -> u64 {
        self.src.id
    }

    pub fn request(&self) -> Option<&Arc<BidRequest>> {
        self.req.as_ref()
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// 应答准备：
    /// 1. 回填 bid 宽高；直跳位从扩展 / 弹窗 XML 恢复落地 URL；
    /// 2. 对创意与回调 URL 做拍卖宏替换；
    /// 3. 选出每个广告位的最优 bid 并物化为广告条目。
    fn prepare(&mut self) {
        self.bid_resp_bid_count = 0;
        let req = match self.req.clone() {
            Some(req) => req,
            None => return,
        };

        let auction_id = self.bid_response.id.clone();
        let auction_bid_id = self.bid_response.bidid.clone();

        for seat in &mut self.bid_response.seatbid {
            for bid in &mut seat.bid {
                if let Some(imp) = req.impression_by_id_variation(&bid.impid) {
                    if bid.w == 0 && bid.h == 0 {
                        bid.w = imp.width;
                        bid.h = imp.height;
                    }

                    if imp.is_direct() {
                        // 直跳创意的落地 URL 可能藏在扩展 JSON 或弹窗 XML 里
                        if bid.adm.is_empty() {
                            if let Some(ext) = &bid.ext {
                                bid.adm =
                                    custom_direct_url(ext.get().as_bytes()).unwrap_or_default();
                            }
                        }
                        if bid.adm.starts_with("<?xml") {
                            bid.adm =
                                decode_pop_markup(bid.adm.as_bytes()).unwrap_or_default();
                        }
                    }
                }

                let replacer = new_bid_replacer(bid, &auction_id, &auction_bid_id);
                bid.adm = replacer.replace(&bid.adm);
                bid.nurl = prepare_url(&bid.nurl, &replacer);
                bid.burl = prepare_url(&bid.burl, &replacer);
            }
            self.bid_resp_bid_count += seat.bid.len();
        }

        self.optimal_bids = optimal_bids(&self.bid_response);
        for bid in self.optimal_bids.clone() {
            if let Some(imp) = req.impression_by_id_variation(&bid.impid) {
                if let Some(item) = self.prepare_bid_item(&bid, imp, &req) {
                    self.ads.push(item);
                }
            }
        }
    }

    fn prepare_bid_item(
        &self,
        bid: &wire::Bid,
        imp: &Impression,
        req: &Arc<BidRequest>,
    ) -> Option<ResponseBidItem> {
        // 先按广告位解析出应答格式
        let format = if imp.is_direct() {
            imp.format_by_type(FormatKind::Direct)
        } else {
            imp.formats()
                .iter()
                .find(|f| imp.id_by_format(f) == bid.impid)
        }?;

        let mut item = match format.kind {
            FormatKind::Direct => ResponseBidItem {
                item_id: imp.id.clone(),
                src: self.src.clone(),
                req: req.clone(),
                imp: imp.clone(),
                format_type: FormatKind::Direct,
                resp_format: format.clone(),
                bid: bid.clone(),
                native: None,
                action_link: bid.adm.clone(),
                price_scope: PriceScope::default(),
                data: None,
            },
            FormatKind::Native => match decode_native_markup(bid.adm.as_bytes()) {
                Ok(native) => ResponseBidItem {
                    item_id: imp.id.clone(),
                    src: self.src.clone(),
                    req: req.clone(),
                    imp: imp.clone(),
                    format_type: FormatKind::Native,
                    resp_format: format.clone(),
                    action_link: native.link.url.clone(),
                    data: extract_native_data_from_impression(imp, &native),
                    native: Some(native),
                    bid: bid.clone(),
                    price_scope: PriceScope::default(),
                },
                Err(err) => {
                    debug!(markup = %bid.adm, error = %err, "Failed to decode native markup");
                    return None;
                }
            },
            FormatKind::Banner | FormatKind::Stretch | FormatKind::Proxy => ResponseBidItem {
                item_id: imp.id.clone(),
                src: self.src.clone(),
                req: req.clone(),
                imp: imp.clone(),
                format_type: banner_format_type(&bid.adm),
                resp_format: format.clone(),
                bid: bid.clone(),
                native: None,
                action_link: String::new(),
                price_scope: PriceScope::default(),
                data: None,
            },
            FormatKind::Video => return None,
        };

        // 按系统定价规则调整该条目的出价
        let view_price = bid.price / 1000.0;
        let bid_price = calculate_new_bid_price(
            view_price,
            item.source_correction_factor(),
            item.target_correction_factor(),
        );
        item.price_scope = PriceScope {
            max_bid_price: bid_price,
            bid_price,
            view_price,
            ecpm: bid.price,
        };

        Some(item)
    }

    pub fn ads(&self) -> &[ResponseBidItem] {
        &self.ads
    }

    /// 按广告位 ID 查找条目
    pub fn item(&self, imp_id: &str) -> Option<&ResponseBidItem> {
        self.ads.iter().find(|it| it.impression_id() == imp_id)
    }

    /// 应答中的 bid 总数（过滤后）
    pub fn count(&self) -> usize {
        self.bid_resp_bid_count
    }

    /// 每个广告位价格最高的 bid
    pub fn optimal_bids(&self) -> &[wire::Bid] {
        &self.optimal_bids
    }

    pub fn validate(&self) -> Result<(), RtbError> {
        self.bid_response.validate()?;
        for seat in &self.bid_response.seatbid {
            if seat.group == 1 {
                return Err(RtbError::ResponseInvalidGroup);
            }
        }
        Ok(())
    }

    /// 释放内部切片并解除对请求的引用，便于上层对象池复用
    pub fn release(&mut self) {
        self.req = None;
        self.ads.clear();
        self.optimal_bids.clear();
        self.bid_response.seatbid.clear();
        self.bid_response.ext = None;
    }
}

/// 每个广告位选价格最高的 bid；同价保留先出现的
fn optimal_bids(response: &wire::BidResponse) -> Vec<wire::Bid> {
    let mut best: Vec<wire::Bid> = Vec::new();
    for seat in &response.seatbid {
        for bid in &seat.bid {
            match best.iter_mut().find(|b| b.impid == bid.impid) {
                Some(existing) => {
                    if bid.price > existing.price {
                        *existing = bid.clone();
                    }
                }
                None => best.push(bid.clone()),
            }
        }
    }
    best
}

fn new_bid_replacer(bid: &wire::Bid, auction_id: &str, auction_bid_id: &str) -> MacroReplacer {
    MacroReplacer::new(vec![
        ("${AUCTION_AD_ID}", bid.adid.clone()),
        ("${AUCTION_ID}", auction_id.to_string()),
        ("${AUCTION_BID_ID}", auction_bid_id.to_string()),
        ("${AUCTION_IMP_ID}", bid.impid.clone()),
        ("${AUCTION_PRICE}", format!("{:.6}", bid.price)),
        ("${AUCTION_CURRENCY}", "USD".to_string()),
    ])
}

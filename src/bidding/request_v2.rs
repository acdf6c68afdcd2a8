// src/bidding/request_v2.rs

use serde_json::value::RawValue;

use crate::bidding::options::BidRequestRtbOptions;
use crate::errors::RtbError;
use crate::model::format::{
    Format, FormatKind, FORMAT_ASSET_ICON, FORMAT_ASSET_LOGO, FORMAT_ASSET_MAIN,
    FORMAT_FIELD_ADDRESS, FORMAT_FIELD_BRANDNAME, FORMAT_FIELD_DESCRIPTION, FORMAT_FIELD_LIKES,
    FORMAT_FIELD_PHONE, FORMAT_FIELD_RATING, FORMAT_FIELD_SPONSORED, FORMAT_FIELD_TITLE,
    FORMAT_FIELD_URL,
};
use crate::model::request::{
    App, BidRequest, Device, DeviceType, Geo, Impression, Site, User,
};
use crate::openrtb::native;
use crate::openrtb::request as rtb;

/// 直跳 impression 的扩展载荷，逐字节固定
pub(crate) const POP_EXTENSION: &str = r#"{"type":"pop"}"#;

pub(crate) fn b2i(value: bool) -> i32 {
    i32::from(value)
}

/// 内部请求 → OpenRTB 2.x wire 请求
pub fn request_to_rtb_v2(
    req: &BidRequest,
    opts: &BidRequestRtbOptions,
) -> Result<rtb::BidRequest, RtbError> {
    Ok(rtb::BidRequest {
        id: req.id.clone(),
        imp: impressions(req, opts)?,
        site: req.site_info().map(site_from),
        app: req.app_info().map(app_from),
        device: device_from(req.device_info(), &req.user_info().geo),
        user: Some(user_from(req.user_info())),
        at: u8::from(opts.auction_type) as i32, // 1 = 一价, 2 = 二价+
        tmax: opts.time_max.as_millis() as i32, // 提交出价的最长等待（毫秒）
        wseat: Vec::new(),                      // 买方席位不限
        allimps: 0,
        cur: opts.currencies(),
        bcat: Vec::new(),                       // 屏蔽类别由上游处理
        badv: Vec::new(),
        regs: None,
        ext: None,
    })
}

fn impressions(
    req: &BidRequest,
    opts: &BidRequestRtbOptions,
) -> Result<Vec<rtb::Imp>, RtbError> {
    let mut list = Vec::new();
    for imp in &req.imps {
        for format in imp.formats() {
            if !opts.test_format(format) {
                continue;
            }
            if let Some(wire_imp) = impression_by_format(req, imp, format, opts)? {
                list.push(wire_imp);
            }
        }
    }
    Ok(list)
}

fn impression_by_format(
    req: &BidRequest,
    imp: &Impression,
    format: &Format,
    opts: &BidRequestRtbOptions,
) -> Result<Option<rtb::Imp>, RtbError> {
    let mut banner = None;
    let mut native = None;
    let mut ext = None;

    match format.kind {
        FormatKind::Banner | FormatKind::Stretch | FormatKind::Proxy => {
            let (w, h, wmax, hmax) = banner_metrics(imp, format);
            banner = Some(rtb::Banner {
                w,
                h,
                wmax,
                hmax,
                wmin: 0,
                hmin: 0,
                pos: imp.pos,
                topframe: 0,
            });
        }
        FormatKind::Native => {
            native = Some(rtb::Native {
                request: native_request_payload(imp, format, opts)?,
                ver: opts.open_native_ver().to_string(),
            });
        }
        FormatKind::Direct => {
            ext = Some(RawValue::from_string(POP_EXTENSION.to_string())?);
        }
        // 视频格式当前不出价
        FormatKind::Video => return Ok(None),
    }

    let tagid = format!("{}_{}", imp.target.codename(), format.codename);
    Ok(Some(rtb::Imp {
        id: imp.id_by_format(format),
        banner,
        video: None,
        native,
        instl: b2i(imp.is_direct()),
        tagid,
        bidfloor: imp.bid_floor.max(opts.bid_floor),
        bidfloorcur: String::new(),
        secure: b2i(req.is_secure()),
        ext,
    }))
}

/// 横幅尺寸推导：
/// 未携带实际宽高时退回格式模板；最终宽高钳制到下限 5；
/// 仅拉伸格式携带最大宽高。
pub(crate) fn banner_metrics(imp: &Impression, format: &Format) -> (i32, i32, i32, i32) {
    let (mut w, mut h) = (imp.width, imp.height);
    let (mut wmax, mut hmax) = (imp.width_max, imp.height_max);
    if w < 1 && h < 1 {
        w = format.width;
        h = format.height;
    }
    if !format.is_stretch() {
        wmax = 0;
        hmax = 0;
    }
    (w.max(5), h.max(5), wmax, hmax)
}

/// 原生请求载荷（双重 JSON 编码）
///
/// 序列化原生请求，套上 `{"native":...}` 外层，再把整串编码为
/// JSON 字符串值。部分交易所按这一历史惯例解析，编码方式不可更换。
pub(crate) fn native_request_payload(
    imp: &Impression,
    format: &Format,
    opts: &BidRequestRtbOptions,
) -> Result<Box<RawValue>, RtbError> {
    let request = match imp.rtb_native_request() {
        Some(prepared) => prepared.clone(),
        None => native::Request {
            ver: opts.open_native_ver().to_string(),
            context: imp.context_type(),
            context_sub_type: imp.context_sub_type(),
            placement_type: imp.placement_type(),
            placement_count: imp.count,
            sequence: 0,
            assets: native_assets(format),
        },
    };

    let serialized = serde_json::to_string(&request)?;
    let wrapped = format!(r#"{{"native":{}}}"#, serialized);
    let encoded = serde_json::to_string(&wrapped)?;
    Ok(RawValue::from_string(encoded)?)
}

/// 由格式模板合成原生素材声明列表
pub(crate) fn native_assets(format: &Format) -> Vec<native::Asset> {
    let config = &format.config;
    let mut assets = Vec::with_capacity(config.assets.len() + config.fields.len());

    for asset in &config.assets {
        // 默认按图片素材处理；纯视频素材不参与出价
        if !asset.is_video_support() || asset.is_image_support() {
            let type_id = match asset.name.as_str() {
                FORMAT_ASSET_MAIN => native::ImageTypeId::Main,
                FORMAT_ASSET_ICON => native::ImageTypeId::Icon,
                FORMAT_ASSET_LOGO => native::ImageTypeId::Logo,
                _ => native::ImageTypeId::Undefined,
            };
            assets.push(native::Asset {
                id: asset.id,
                required: b2i(asset.required),
                img: Some(native::Image {
                    type_id,
                    wmin: asset.min_width,
                    hmin: asset.min_height,
                    mimes: asset.allowed_types.clone(),
                }),
                ..Default::default()
            });
        }
    }

    for field in &config.fields {
        if let Some(asset) = native_field_asset(field) {
            assets.push(asset);
        }
    }

    assets
}

fn native_field_asset(field: &crate::model::format::FormatField) -> Option<native::Asset> {
    let data_type = match field.name.as_str() {
        FORMAT_FIELD_TITLE => {
            return Some(native::Asset {
                id: field.id,
                required: b2i(field.required),
                title: Some(native::Title {
                    len: field.max_length(),
                }),
                ..Default::default()
            });
        }
        FORMAT_FIELD_DESCRIPTION => native::DataTypeId::Desc,
        FORMAT_FIELD_BRANDNAME | FORMAT_FIELD_SPONSORED => native::DataTypeId::Sponsored,
        FORMAT_FIELD_PHONE => native::DataTypeId::Phone,
        FORMAT_FIELD_URL => native::DataTypeId::DisplayURL,
        FORMAT_FIELD_RATING => native::DataTypeId::Rating,
        FORMAT_FIELD_LIKES => native::DataTypeId::Likes,
        FORMAT_FIELD_ADDRESS => native::DataTypeId::Address,
        _ => return None,
    };
    Some(native::Asset {
        id: field.id,
        required: b2i(field.required),
        data: Some(native::Data {
            type_id: data_type,
            len: field.max_length(),
        }),
        ..Default::default()
    })
}

/// 设备大类映射；穿戴类设备折叠为 unknown
pub(crate) fn device_type_code(device_type: DeviceType) -> i32 {
    match device_type {
        DeviceType::Mobile => 1,
        DeviceType::PC => 2,
        DeviceType::TV => 3,
        DeviceType::Phone => 4,
        DeviceType::Tablet => 5,
        DeviceType::Connected => 6,
        DeviceType::SetTopBox => 7,
        DeviceType::Unknown | DeviceType::Watch | DeviceType::Glasses => 0,
    }
}

/// 设备缺省兜底后的各字段；IPv4 仅在两族地址都为空时回退 0.0.0.0
pub(crate) struct DeviceDefaults {
    pub ua: String,
    pub dnt: i32,
    pub lmt: i32,
    pub js: i32,
    pub flash_ver: String,
    pub language: String,
    pub os_name: String,
    pub os_version: String,
    pub carrier: String,
    pub ipv4: String,
    pub ipv6: String,
}

pub(crate) fn device_defaults(device: &Device, geo: &Geo) -> DeviceDefaults {
    let browser = device.browser.clone().unwrap_or_default();
    let os = device.os.clone().unwrap_or_default();
    let carrier = geo
        .carrier
        .clone()
        .map(|c| c.name)
        .unwrap_or_default();

    let mut ipv4 = geo.ipv4_string().to_string();
    if ipv4.is_empty() && geo.ipv6_string().is_empty() {
        ipv4 = "0.0.0.0".to_string();
    }

    DeviceDefaults {
        ua: browser.ua,
        dnt: browser.dnt,
        lmt: browser.lmt,
        js: browser.js,
        flash_ver: browser.flash_ver,
        language: browser.primary_language,
        os_name: os.name,
        os_version: os.version,
        carrier,
        ipv4,
        ipv6: geo.ipv6_string().to_string(),
    }
}

fn geo_from(geo: &Geo) -> rtb::Geo {
    rtb::Geo {
        lat: geo.lat,
        lon: geo.lon,
        country: geo.country.clone(),
        region: geo.region.clone(),
        region_fips104: geo.region_fips104.clone(),
        metro: geo.metro.clone(),
        city: geo.city.clone(),
        zip: geo.zip.clone(),
        utc_offset: geo.utc_offset,
    }
}

fn site_from(site: &Site) -> rtb::Site {
    rtb::Site {
        id: site.ext_id.clone(),
        cat: site.cat.clone(),
        domain: site.domain.clone(),
        keywords: site.keywords.clone(),
        privacypolicy: Some(site.privacy_policy),
        page: site.page.clone(),
        referrer: site.referrer.clone(),
        search: site.search.clone(),
        mobile: site.mobile,
    }
}

fn app_from(app: &App) -> rtb::App {
    rtb::App {
        id: app.ext_id.clone(),
        cat: app.cat.clone(),
        keywords: app.keywords.clone(),
        privacypolicy: Some(app.privacy_policy),
        bundle: app.bundle.clone(),
        store_url: app.store_url.clone(),
        ver: app.ver.clone(),
        paid: app.paid,
    }
}

fn device_from(device: Option<&Device>, geo: &Geo) -> Option<rtb::Device> {
    let device = device?;
    let defaults = device_defaults(device, geo);
    Some(rtb::Device {
        ua: defaults.ua,
        geo: Some(geo_from(geo)),
        dnt: defaults.dnt,
        lmt: defaults.lmt,
        ip: defaults.ipv4,
        ipv6: defaults.ipv6,
        devicetype: device_type_code(device.device_type),
        make: device.make.clone(),
        model: device.model.clone(),
        os: defaults.os_name,
        osv: defaults.os_version,
        hwv: device.hw_ver.clone(),
        h: device.height,
        w: device.width,
        ppi: device.ppi,
        pxratio: device.px_ratio,
        js: defaults.js,
        flashver: defaults.flash_ver,
        language: defaults.language,
        carrier: defaults.carrier,
        connectiontype: device.conn_type,
        ifa: device.ifa.clone(),
    })
}

fn user_from(user: &User) -> rtb::User {
    let data = user
        .data
        .iter()
        .map(|item| rtb::Data {
            name: item.name.clone(),
            segment: item
                .segments
                .iter()
                .map(|seg| rtb::Segment {
                    name: seg.name.clone(),
                    value: seg.value.clone(),
                })
                .collect(),
        })
        .collect();

    rtb::User {
        id: user.id.clone(),
        gender: user.gender.clone(),
        keywords: user.keywords.clone(),
        geo: Some(geo_from(&user.geo)),
        data,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::model::format::{FormatAsset, FormatConfig, FormatField};
    use crate::model::request::Target;

    fn banner_format(codename: &str, width: i32, height: i32, kind: FormatKind) -> Arc<Format> {
        Arc::new(Format {
            codename: codename.to_string(),
            kind,
            width,
            height,
            config: FormatConfig::default(),
        })
    }

    fn native_format() -> Arc<Format> {
        Arc::new(Format {
            codename: "nat".to_string(),
            kind: FormatKind::Native,
            width: 0,
            height: 0,
            config: FormatConfig {
                assets: vec![FormatAsset {
                    id: 1,
                    name: "main".to_string(),
                    required: true,
                    min_width: 100,
                    min_height: 100,
                    allowed_types: vec!["image/png".to_string()],
                    image_support: true,
                    video_support: false,
                }],
                fields: vec![FormatField {
                    id: 2,
                    name: "title".to_string(),
                    required: true,
                    max_length: 80,
                }],
            },
        })
    }

    fn impression(formats: Vec<Arc<Format>>) -> Impression {
        Impression {
            id: "i1".to_string(),
            target: Target {
                codename: "t".to_string(),
                ..Default::default()
            },
            count: 1,
            formats,
            ..Default::default()
        }
    }

    fn request(imps: Vec<Impression>) -> BidRequest {
        BidRequest {
            id: "r1".to_string(),
            imps,
            ..Default::default()
        }
    }

    #[test]
    fn native_payload_is_double_encoded() {
        let format = native_format();
        let imp = impression(vec![format.clone()]);
        let opts = BidRequestRtbOptions::new();

        let payload = native_request_payload(&imp, &format, &opts).unwrap();
        // 外层必须是 JSON 字符串值
        let inner: String = serde_json::from_str(payload.get()).unwrap();
        assert!(inner.starts_with(r#"{"native":"#));

        let parsed: serde_json::Value = serde_json::from_str(&inner).unwrap();
        let native = &parsed["native"];
        assert_eq!(native["ver"], "1.1");
        assert_eq!(native["plcmtcnt"], 1);
        assert_eq!(native["seq"], 0);

        let assets = native["assets"].as_array().unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0]["id"], 1);
        assert_eq!(assets[0]["required"], 1);
        assert_eq!(assets[0]["img"]["type"], 3);
        assert_eq!(assets[0]["img"]["wmin"], 100);
        assert_eq!(assets[1]["id"], 2);
        assert_eq!(assets[1]["title"]["len"], 80);
    }

    #[test]
    fn video_only_assets_are_dropped() {
        let mut format = (*native_format()).clone();
        format.config.assets.push(FormatAsset {
            id: 9,
            name: "main".to_string(),
            video_support: true,
            image_support: false,
            ..Default::default()
        });
        let assets = native_assets(&format);
        assert_eq!(assets.len(), 2);
        assert!(assets.iter().all(|a| a.id != 9));
    }

    #[test]
    fn unknown_field_names_yield_no_asset() {
        let mut format = (*native_format()).clone();
        format.config.fields.push(FormatField {
            id: 11,
            name: "cta_text".to_string(),
            required: false,
            max_length: 20,
        });
        assert_eq!(native_assets(&format).len(), 2);
    }

    #[test]
    fn banner_dimensions_fall_back_to_format() {
        let format = banner_format("b", 300, 250, FormatKind::Banner);
        let imp = impression(vec![format.clone()]);
        let (w, h, wmax, hmax) = banner_metrics(&imp, &format);
        assert_eq!((w, h, wmax, hmax), (300, 250, 0, 0));
    }

    #[test]
    fn stretch_format_keeps_max_dimensions() {
        let format = banner_format("s", 300, 250, FormatKind::Stretch);
        let mut imp = impression(vec![format.clone()]);
        imp.width = 320;
        imp.height = 50;
        imp.width_max = 640;
        imp.height_max = 100;
        assert_eq!(banner_metrics(&imp, &format), (320, 50, 640, 100));

        let fixed = banner_format("b", 300, 250, FormatKind::Banner);
        assert_eq!(banner_metrics(&imp, &fixed), (320, 50, 0, 0));
    }

    #[test]
    fn direct_format_emits_pop_extension() {
        let format = banner_format("pop", 0, 0, FormatKind::Direct);
        let mut imp = impression(vec![format]);
        imp.direct = true;
        let req = request(vec![imp]);

        let rtb_request = request_to_rtb_v2(&req, &BidRequestRtbOptions::new()).unwrap();
        assert_eq!(rtb_request.imp.len(), 1);
        let wire_imp = &rtb_request.imp[0];
        assert_eq!(wire_imp.ext.as_ref().unwrap().get(), r#"{"type":"pop"}"#);
        assert_eq!(wire_imp.instl, 1);
        assert!(wire_imp.banner.is_none());
        assert!(wire_imp.native.is_none());
    }

    #[test]
    fn tag_and_impression_ids_are_derived() {
        let format = banner_format("b", 300, 250, FormatKind::Banner);
        let imp = impression(vec![format.clone()]);
        let req = request(vec![imp.clone()]);

        let rtb_request = request_to_rtb_v2(&req, &BidRequestRtbOptions::new()).unwrap();
        let wire_imp = &rtb_request.imp[0];
        assert_eq!(wire_imp.id, "i1_b");
        assert_eq!(wire_imp.id, imp.id_by_format(&format));
        assert_eq!(wire_imp.tagid, "t_b");
    }

    #[test]
    fn video_formats_are_skipped() {
        let format = banner_format("v", 640, 360, FormatKind::Video);
        let req = request(vec![impression(vec![format])]);
        let rtb_request = request_to_rtb_v2(&req, &BidRequestRtbOptions::new()).unwrap();
        assert!(rtb_request.imp.is_empty());
    }

    #[test]
    fn bid_floor_takes_the_larger_value() {
        let format = banner_format("b", 300, 250, FormatKind::Banner);
        let mut imp = impression(vec![format]);
        imp.bid_floor = 2.0;
        let req = request(vec![imp]);

        let opts = BidRequestRtbOptions::new().with_bid_floor(1.0);
        let rtb_request = request_to_rtb_v2(&req, &opts).unwrap();
        assert_eq!(rtb_request.imp[0].bidfloor, 2.0);

        let opts = BidRequestRtbOptions::new().with_bid_floor(3.0);
        let rtb_request = request_to_rtb_v2(&req, &opts).unwrap();
        assert_eq!(rtb_request.imp[0].bidfloor, 3.0);
    }

    #[test]
    fn currencies_default_to_usd() {
        let format = banner_format("b", 300, 250, FormatKind::Banner);
        let req = request(vec![impression(vec![format])]);
        let rtb_request = request_to_rtb_v2(&req, &BidRequestRtbOptions::new()).unwrap();
        assert_eq!(rtb_request.cur, vec!["USD".to_string()]);
    }

    #[test]
    fn device_ipv4_falls_back_only_when_both_missing() {
        let device = Device::default();
        let geo = Geo::default();
        assert_eq!(device_defaults(&device, &geo).ipv4, "0.0.0.0");

        let geo = Geo {
            ipv6: "::1".to_string(),
            ..Default::default()
        };
        assert_eq!(device_defaults(&device, &geo).ipv4, "");
    }

    #[test]
    fn wearable_devices_collapse_to_unknown() {
        assert_eq!(device_type_code(DeviceType::Watch), 0);
        assert_eq!(device_type_code(DeviceType::Glasses), 0);
        assert_eq!(device_type_code(DeviceType::Tablet), 5);
    }

    proptest! {
        // 横幅最小尺寸下限
        #[test]
        fn banner_floor_holds(w in -50i32..2000, h in -50i32..2000, fw in -50i32..2000, fh in -50i32..2000) {
            let format = banner_format("b", fw, fh, FormatKind::Banner);
            let mut imp = impression(vec![format.clone()]);
            imp.width = w;
            imp.height = h;
            let (bw, bh, _, _) = banner_metrics(&imp, &format);
            prop_assert!(bw >= 5);
            prop_assert!(bh >= 5);
        }
    }
}

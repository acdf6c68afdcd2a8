// src/bidding/request_v3.rs

use serde_json::value::RawValue;

use crate::bidding::options::BidRequestRtbOptions;
use crate::bidding::request_v2::{
    b2i, banner_metrics, device_defaults, device_type_code, native_request_payload, POP_EXTENSION,
};
use crate::errors::RtbError;
use crate::model::format::{Format, FormatKind};
use crate::model::request::{App, BidRequest, Device, Geo, Impression, Site, User};
use crate::openrtb::request_v3 as rtb;

/// 内部请求 → OpenRTB 3.0 wire 请求
///
/// 与 2.x 构建器共享全部映射逻辑，仅序列化结构不同。
pub fn request_to_rtb_v3(
    req: &BidRequest,
    opts: &BidRequestRtbOptions,
) -> Result<rtb::BidRequest, RtbError> {
    Ok(rtb::BidRequest {
        id: req.id.clone(),
        impressions: impressions(req, opts)?,
        site: req.site_info().map(site_from),
        app: req.app_info().map(app_from),
        device: device_from(req.device_info(), &req.user_info().geo),
        user: Some(user_from(req.user_info())),
        auction_type: u8::from(opts.auction_type) as i32,
        time_max: opts.time_max.as_millis() as i32,
        seats: Vec::new(),
        all_impressions: 0,
        currencies: opts.currencies(),
        blocked_categories: Vec::new(),
        blocked_adv_domains: Vec::new(),
        regulations: None,
        ext: None,
    })
}

fn impressions(
    req: &BidRequest,
    opts: &BidRequestRtbOptions,
) -> Result<Vec<rtb::Impression>, RtbError> {
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
) -> Result<Option<rtb::Impression>, RtbError> {
    let mut banner = None;
    let mut native = None;
    let mut ext = None;

    match format.kind {
        FormatKind::Banner | FormatKind::Stretch | FormatKind::Proxy => {
            let (width, height, width_max, height_max) = banner_metrics(imp, format);
            banner = Some(rtb::Banner {
                width,
                height,
                width_max,
                height_max,
                width_min: 0,
                height_min: 0,
                position: imp.pos,
                top_frame: 0,
            });
        }
        FormatKind::Native => {
            native = Some(rtb::Native {
                request: native_request_payload(imp, format, opts)?,
                version: opts.open_native_ver().to_string(),
            });
        }
        FormatKind::Direct => {
            ext = Some(RawValue::from_string(POP_EXTENSION.to_string())?);
        }
        FormatKind::Video => return Ok(None),
    }

    let tag_id = format!("{}_{}", imp.target.codename(), format.codename);
    Ok(Some(rtb::Impression {
        id: imp.id_by_format(format),
        banner,
        video: None,
        native,
        interstitial: b2i(imp.is_direct()),
        tag_id,
        bid_floor: imp.bid_floor.max(opts.bid_floor),
        bid_floor_currency: String::new(),
        secure: b2i(req.is_secure()),
        ext,
    }))
}

fn geo_from(geo: &Geo) -> rtb::Geo {
    rtb::Geo {
        latitude: geo.lat,
        longitude: geo.lon,
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
        categories: site.cat.clone(),
        domain: site.domain.clone(),
        keywords: site.keywords.clone(),
        privacy_policy: Some(site.privacy_policy),
        page: site.page.clone(),
        referrer: site.referrer.clone(),
        search: site.search.clone(),
        mobile: site.mobile,
    }
}

fn app_from(app: &App) -> rtb::App {
    rtb::App {
        id: app.ext_id.clone(),
        categories: app.cat.clone(),
        keywords: app.keywords.clone(),
        privacy_policy: Some(app.privacy_policy),
        bundle: app.bundle.clone(),
        store_url: app.store_url.clone(),
        version: app.ver.clone(),
        paid: app.paid,
    }
}

fn device_from(device: Option<&Device>, geo: &Geo) -> Option<rtb::Device> {
    let device = device?;
    let defaults = device_defaults(device, geo);
    Some(rtb::Device {
        user_agent: defaults.ua,
        geo: Some(geo_from(geo)),
        dnt: defaults.dnt,
        lmt: defaults.lmt,
        ip_v4: defaults.ipv4,
        ip_v6: defaults.ipv6,
        device_type: device_type_code(device.device_type),
        make: device.make.clone(),
        model: device.model.clone(),
        os_name: defaults.os_name,
        os_version: defaults.os_version,
        hw_version: device.hw_ver.clone(),
        height: device.height,
        width: device.width,
        ppi: device.ppi,
        pixel_ratio: device.px_ratio,
        js: defaults.js,
        flash_version: defaults.flash_ver,
        language: defaults.language,
        carrier: defaults.carrier,
        connection_type: device.conn_type,
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
        custom_data: String::new(),
        geo: Some(geo_from(&user.geo)),
        data,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::bidding::request_v2::request_to_rtb_v2;
    use crate::model::format::FormatConfig;
    use crate::model::request::{Browser, Os, Target};

    fn sample_request() -> BidRequest {
        let banner = Arc::new(Format {
            codename: "b".to_string(),
            kind: FormatKind::Banner,
            width: 300,
            height: 250,
            config: FormatConfig::default(),
        });
        let pop = Arc::new(Format {
            codename: "pop".to_string(),
            kind: FormatKind::Direct,
            width: 0,
            height: 0,
            config: FormatConfig::default(),
        });
        BidRequest {
            id: "r9".to_string(),
            secure: true,
            site: Some(Site {
                ext_id: "site-1".to_string(),
                domain: "news.example.com".to_string(),
                page: "https://news.example.com/article".to_string(),
                ..Default::default()
            }),
            device: Some(Device {
                browser: Some(Browser {
                    ua: "Mozilla/5.0".to_string(),
                    js: 1,
                    ..Default::default()
                }),
                os: Some(Os {
                    name: "Android".to_string(),
                    version: "14".to_string(),
                }),
                device_type: crate::model::request::DeviceType::Phone,
                ..Default::default()
            }),
            imps: vec![
                Impression {
                    id: "i1".to_string(),
                    width: 300,
                    height: 250,
                    target: Target {
                        codename: "t".to_string(),
                        ..Default::default()
                    },
                    formats: vec![banner],
                    ..Default::default()
                },
                Impression {
                    id: "i2".to_string(),
                    direct: true,
                    target: Target {
                        codename: "t".to_string(),
                        ..Default::default()
                    },
                    formats: vec![pop],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    /// 两个版本的构建器共享同一套映射逻辑，
    /// 对相同输入必须产出等价的 wire JSON。
    #[test]
    fn v3_wire_json_matches_v2() {
        let req = sample_request();
        let opts = BidRequestRtbOptions::new()
            .with_auction_type(crate::model::request::AuctionType::SecondPrice)
            .with_max_time_duration(std::time::Duration::from_millis(120));

        let v2 = request_to_rtb_v2(&req, &opts).unwrap();
        let v3 = request_to_rtb_v3(&req, &opts).unwrap();

        let v2_json = serde_json::to_value(&v2).unwrap();
        let v3_json = serde_json::to_value(&v3).unwrap();
        assert_eq!(v2_json, v3_json);
    }

    #[test]
    fn v3_direct_impression_carries_pop_extension() {
        let req = sample_request();
        let v3 = request_to_rtb_v3(&req, &BidRequestRtbOptions::new()).unwrap();
        let direct = v3
            .impressions
            .iter()
            .find(|imp| imp.id == "i2_pop")
            .unwrap();
        assert_eq!(direct.ext.as_ref().unwrap().get(), r#"{"type":"pop"}"#);
        assert_eq!(direct.interstitial, 1);
        assert_eq!(direct.secure, 1);
    }
}

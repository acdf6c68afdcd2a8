// src/bidding/native_helpers.rs

use std::collections::HashMap;

use serde::Deserialize;

use crate::bidding::response_item::CONTENT_ITEM_LINK;
use crate::errors::RtbError;
use crate::model::format::{
    FORMAT_FIELD_ADDRESS, FORMAT_FIELD_BRANDNAME, FORMAT_FIELD_DESCRIPTION, FORMAT_FIELD_LIKES,
    FORMAT_FIELD_PHONE, FORMAT_FIELD_RATING, FORMAT_FIELD_TITLE, FORMAT_FIELD_URL,
};
use crate::model::request::Impression;
use crate::openrtb::native;

#[derive(Deserialize)]
struct NativeWrapper {
    native: native::Response,
}

/// 解析 bid.adm 中的原生创意。
/// 兼容 `{"native": {...}}` 外包与裸对象两种形态，互为回退。
pub fn decode_native_markup(data: &[u8]) -> Result<native::Response, RtbError> {
    if data.windows(8).any(|w| w == &b"\"native\""[..]) {
        if let Ok(wrapper) = serde_json::from_slice::<NativeWrapper>(data) {
            return Ok(wrapper.native);
        }
    }
    Ok(serde_json::from_slice::<native::Response>(data)?)
}

/// 数据素材类型到内部字段名的映射
pub fn label_name_by_type(type_id: native::DataTypeId) -> Option<&'static str> {
    match type_id {
        native::DataTypeId::Sponsored => Some(FORMAT_FIELD_BRANDNAME),
        native::DataTypeId::Desc => Some(FORMAT_FIELD_DESCRIPTION),
        native::DataTypeId::Rating => Some(FORMAT_FIELD_RATING),
        native::DataTypeId::Likes => Some(FORMAT_FIELD_LIKES),
        native::DataTypeId::Phone => Some(FORMAT_FIELD_PHONE),
        native::DataTypeId::Address => Some(FORMAT_FIELD_ADDRESS),
        native::DataTypeId::DisplayURL => Some(FORMAT_FIELD_URL),
        _ => None,
    }
}

/// 将原生应答素材按 ID 关联回请求声明，还原各字段名与取值
///
/// 应答侧的 data 素材只携带 ID，字段含义要从请求声明的类型编码恢复；
/// 请求未声明类型时退回应答自带的 label。
pub fn extract_native_data(
    request: &native::Request,
    response: &native::Response,
) -> HashMap<String, String> {
    let mut data = HashMap::new();
    data.insert(CONTENT_ITEM_LINK.to_string(), response.link.url.clone());

    for asset in &response.assets {
        if let Some(title) = &asset.title {
            data.insert(FORMAT_FIELD_TITLE.to_string(), title.text.clone());
        } else if let Some(resp_data) = &asset.data {
            for declared in &request.assets {
                if declared.id != asset.id {
                    continue;
                }
                if let Some(declared_data) = &declared.data {
                    let name = label_name_by_type(declared_data.type_id)
                        .map(str::to_string)
                        .or_else(|| {
                            if resp_data.label.is_empty() {
                                None
                            } else {
                                Some(resp_data.label.clone())
                            }
                        });
                    if let Some(name) = name {
                        data.insert(name, resp_data.value.clone());
                    }
                }
                break;
            }
        }
    }
    data
}

/// 以广告位上存储的原生请求（V2 优先，其次 V3）恢复应答字段名
pub fn extract_native_data_from_impression(
    imp: &Impression,
    response: &native::Response,
) -> Option<HashMap<String, String>> {
    if let Some(request) = imp.rtb_native_request() {
        return Some(extract_native_data(request, response));
    }
    if let Some(request) = imp.rtb_native_request_v3() {
        return Some(extract_native_data(request, response));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response_json() -> &'static str {
        r#"{"ver":"1.1","link":{"url":"https://go.example.com"},"assets":[
            {"id":1,"title":{"text":"Fresh Deal"}},
            {"id":2,"data":{"value":"Acme"}},
            {"id":3,"img":{"url":"https://img.example.com/a.png","w":300,"h":250}}
        ]}"#
    }

    #[test]
    fn decode_accepts_wrapped_markup() {
        let wrapped = format!(r#"{{"native":{}}}"#, sample_response_json());
        let decoded = decode_native_markup(wrapped.as_bytes()).unwrap();
        assert_eq!(decoded.link.url, "https://go.example.com");
        assert_eq!(decoded.assets.len(), 3);
    }

    #[test]
    fn decode_accepts_bare_markup() {
        let decoded = decode_native_markup(sample_response_json().as_bytes()).unwrap();
        assert_eq!(decoded.link.url, "https://go.example.com");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_native_markup(b"<html>not json</html>").is_err());
    }

    #[test]
    fn extract_recovers_field_names_from_request() {
        let request = native::Request {
            ver: "1.1".to_string(),
            assets: vec![
                native::Asset {
                    id: 1,
                    required: 1,
                    title: Some(native::Title { len: 80 }),
                    ..Default::default()
                },
                native::Asset {
                    id: 2,
                    required: 0,
                    data: Some(native::Data {
                        type_id: native::DataTypeId::Sponsored,
                        len: 30,
                    }),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let response: native::Response =
            serde_json::from_str(sample_response_json()).unwrap();

        let data = extract_native_data(&request, &response);
        assert_eq!(data.get(CONTENT_ITEM_LINK).unwrap(), "https://go.example.com");
        assert_eq!(data.get("title").unwrap(), "Fresh Deal");
        assert_eq!(data.get("brandname").unwrap(), "Acme");
    }
}

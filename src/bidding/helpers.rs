// src/bidding/helpers.rs

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::errors::RtbError;
use crate::model::format::FormatKind;

/// 拍卖宏替换器
///
/// 对创意与回调 URL 做 `${AUCTION_*}` 占位符替换；
/// 替换表按 bid 构建，见响应准备阶段。
pub struct MacroReplacer {
    pairs: Vec<(&'static str, String)>,
}

impl MacroReplacer {
    pub fn new(pairs: Vec<(&'static str, String)>) -> Self {
        Self { pairs }
    }

    pub fn replace(&self, input: &str) -> String {
        if !input.contains("${") {
            return input.to_string();
        }
        let mut out = input.to_string();
        for (macro_name, value) in &self.pairs {
            out = out.replace(macro_name, value);
        }
        out
    }
}

/// 解析弹窗创意 XML（popunderAd/url），取出落地 URL
pub fn decode_pop_markup(data: &[u8]) -> Result<String, RtbError> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    let mut in_pop = false;
    let mut in_url = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"popunderAd" => in_pop = true,
                b"url" if in_pop => in_url = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"popunderAd" => in_pop = false,
                b"url" => in_url = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_url => {
                let text = t
                    .unescape()
                    .map_err(|e| RtbError::InvalidResponse(format!("pop markup: {}", e)))?;
                return Ok(text.trim().to_string());
            }
            Ok(Event::CData(t)) if in_url => {
                return Ok(String::from_utf8_lossy(&t.into_inner()).trim().to_string());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(RtbError::InvalidResponse(format!("pop markup: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(String::new())
}

/// 直跳 bid 的扩展字段中可能携带落地 URL 的几个键
#[derive(Deserialize, Default)]
struct DirectUrlExt {
    #[serde(default)]
    url: String,
    #[serde(default)]
    landingpage: String,
    #[serde(default)]
    link: String,
}

/// 从 bid 扩展 JSON 提取直跳 URL：取 url / landingpage / link 中第一个非空值
pub fn custom_direct_url(data: &[u8]) -> Result<String, RtbError> {
    let ext: DirectUrlExt = serde_json::from_slice(data)?;
    for candidate in [ext.url, ext.landingpage, ext.link] {
        if !candidate.is_empty() {
            return Ok(candidate);
        }
    }
    Ok(String::new())
}

/// 按创意形态区分 banner 与 proxy：
/// 裸 URL（http/https/协议相对且不含空白）或含 iframe 的创意走 proxy 渲染
pub fn banner_format_type(markup: &str) -> FormatKind {
    if markup.starts_with("http://")
        || markup.starts_with("https://")
        || (markup.starts_with("//") && !markup.contains(['\n', '\t']))
        || markup.contains("<iframe")
    {
        FormatKind::Proxy
    } else {
        FormatKind::Banner
    }
}

/// 回调 URL 的预处理：先做一次 query 反转义，再替换拍卖宏
pub fn prepare_url(surl: &str, replacer: &MacroReplacer) -> String {
    if surl.is_empty() {
        return surl.to_string();
    }
    let decoded = match urlencoding::decode(surl) {
        Ok(u) => u.into_owned(),
        Err(_) => surl.to_string(),
    };
    replacer.replace(&decoded)
}

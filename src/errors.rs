// src/errors.rs

use thiserror::Error;

/// RTB 驱动边界错误集合
/// 传输层与解析层错误会附带上游来源信息返回给调用方（竞价引擎）。
#[derive(Debug, Error)]
pub enum RtbError {
    /// 请求要求 HTTPS，但响应创意中包含明文 `http://` 链接
    #[error("response are not secure")]
    ResponseNotSecure,

    /// 非 200/204 的响应状态码
    #[error("invalid response status")]
    InvalidResponseStatus,

    /// HTTP 204：DSP 无可投广告（正常的无填充，不算失败）
    #[error("no campaigns response")]
    NoCampaigns,

    /// 响应体类型不支持（XML / Protobuf / 表单 / 纯文本）
    #[error("request body type not supported: {0}")]
    RequestTypeNotSupported(&'static str),

    /// 未定义的响应体类型
    #[error("undefined request type: {0}")]
    RequestTypeUndefined(&'static str),

    /// 竞价响应包含 group 竞价（系统不支持整组出价）
    #[error("response contains group bids which are not supported")]
    ResponseInvalidGroup,

    /// 出向请求结构校验失败
    #[error("invalid bid request: {0}")]
    InvalidBidRequest(String),

    /// 出向请求未通过结构校验，附带来源协议与 ID
    #[error("source[{protocol}]: {source_id}: {message}")]
    InvalidRequest {
        protocol: String,
        source_id: u64,
        message: String,
    },

    /// 响应结构校验失败
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// 请求超出截止时间
    #[error("request timeout")]
    Timeout,

    /// HTTP 传输错误（连接、协议等）
    #[error("http transport: {0}")]
    Transport(String),

    /// JSON 编解码错误
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),
}

impl RtbError {
    /// 是否为超时哨兵错误
    pub fn is_timeout(&self) -> bool {
        matches!(self, RtbError::Timeout)
    }
}

// src/model/context.rs

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bidding::response_item::ResponseBidItem;
use crate::errors::RtbError;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// 外部竞价来源赢得本地竞价
    SourceWin,
    /// 展示
    Impression,
    /// 点击
    Click,
}

/// 事件状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventStatus {
    #[default]
    Undefined,
    Success,
    Failed,
}

/// Win 通知流：向 DSP 回发 NURL ping
#[async_trait]
pub trait WinsEventStream: Send + Sync {
    async fn send(&self, url: &str) -> Result<(), RtbError>;
}

/// 主事件流：向内部事件管道投递竞价生命周期事件
#[async_trait]
pub trait EventStream: Send + Sync {
    async fn send(
        &self,
        kind: EventKind,
        status: EventStatus,
        item: &ResponseBidItem,
    ) -> Result<(), RtbError>;
}

/// 默认空实现，未接入事件管道时使用
struct NoopStream;

#[async_trait]
impl WinsEventStream for NoopStream {
    async fn send(&self, _url: &str) -> Result<(), RtbError> {
        Ok(())
    }
}

#[async_trait]
impl EventStream for NoopStream {
    async fn send(
        &self,
        _kind: EventKind,
        _status: EventStatus,
        _item: &ResponseBidItem,
    ) -> Result<(), RtbError> {
        Ok(())
    }
}

/// 请求上下文：携带本次请求可用的事件流
///
/// 竞价引擎在构造请求时注入；驱动在处理获胜 item 时从响应上下文
/// 取回这两个流做 win ping 与事件上报。
#[derive(Clone)]
pub struct RequestContext {
    pub wins_stream: Arc<dyn WinsEventStream>,
    pub event_stream: Arc<dyn EventStream>,
}

impl RequestContext {
    pub fn new(
        wins_stream: Arc<dyn WinsEventStream>,
        event_stream: Arc<dyn EventStream>,
    ) -> Self {
        Self {
            wins_stream,
            event_stream,
        }
    }

    pub fn wins_stream(&self) -> &dyn WinsEventStream {
        self.wins_stream.as_ref()
    }

    pub fn event_stream(&self) -> &dyn EventStream {
        self.event_stream.as_ref()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            wins_stream: Arc::new(NoopStream),
            event_stream: Arc::new(NoopStream),
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext").finish_non_exhaustive()
    }
}

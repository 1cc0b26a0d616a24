//! RemoteLink port - リモートプロセスとの接続
//!
//! driver はこの trait だけに依存します。本番は `transport::SocketBridge`、
//! テストでは応答をスクリプトした fake を差し込みます。

use async_trait::async_trait;

use crate::domain::message::{Message, Outbound};
use crate::error::TransportError;

#[async_trait]
pub trait RemoteLink: Send + Sync {
    /// Live-peer state. Queries while disconnected fail fast.
    fn is_connected(&self) -> bool;

    /// Send one record and wait for the response matched to it.
    ///
    /// Only one query is ever in flight; concurrent callers queue up.
    async fn send_query(&self, query: Outbound) -> Result<Message, TransportError>;

    /// Drain every buffered event, oldest first. Never blocks.
    fn poll_events(&self) -> Vec<Message>;
}

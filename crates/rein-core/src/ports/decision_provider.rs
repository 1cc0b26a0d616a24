//! DecisionProvider port - state summary から intent を生成
//!
//! 生成系（HTTP 越しのモデル）がこの trait を実装します。ルール表は world state を直接読むので trait の外です。
//! 失敗時のフォールバックは driver 側の責務です。

use async_trait::async_trait;

use crate::domain::decision::{Decision, DecisionInput};
use crate::error::ProviderError;

#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn decide(&self, input: &DecisionInput) -> Result<Decision, ProviderError>;
}

//! App - アプリケーション層
//!
//! ports を組み合わせて decision loop を実装します。
//!
//! # 主要コンポーネント
//! - **DecisionDriver / DriverBuilder**: 周期 tick（query → 推論 → decide → execute）
//! - **RemoteQueries**: query battery の型付きファサード
//! - **IntentExecutor**: ledger 登録と送信、persistent 設定の差分送信

pub mod driver;
pub mod executor;
pub mod remote;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型を再エクスポート
pub use self::driver::{DecisionDriver, DirectiveHandle, DriverBuilder, DriverHandle, TickOutcome};
pub use self::executor::{ExecutionReport, IntentExecutor, SettingOutcome};
pub use self::remote::{RemoteQueries, Snapshot};

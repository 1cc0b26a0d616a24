//! Port implementations.
//!
//! - `ChatProvider`: 生成系の DecisionProvider（OpenAI 互換 HTTP）
//! - `RuleTable`: 決定的なフォールバック

pub mod chat_provider;
pub mod rule_table;

pub use self::chat_provider::ChatProvider;
pub use self::rule_table::RuleTable;

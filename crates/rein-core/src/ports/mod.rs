//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。driver は具体的な socket や
//! HTTP client ではなく、ここで定義する trait にだけ依存します。
//!
//! - `RemoteLink`: リモートプロセスとの duplex 接続（本番: `SocketBridge`）
//! - `DecisionProvider`: intent の生成（本番: `ChatProvider`。失敗時は driver が `RuleTable` に落とす）
//! - `Clock`: directive TTL 判定用の時刻
//! - `IdGenerator`: peer ごとの ULID

pub mod clock;
pub mod decision_provider;
pub mod id_generator;
pub mod remote_link;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::decision_provider::DecisionProvider;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::remote_link::RemoteLink;

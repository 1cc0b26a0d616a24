//! rein-core
//!
//! Core building blocks for the rein decision loop: a single-peer socket
//! bridge to the game-side mod, and a driver that turns remote state into
//! high-level intents.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（message, event, intent, ledger, directive, world, decision）
//! - **ports**: 抽象化レイヤー（RemoteLink, DecisionProvider, Clock, IdGenerator）
//! - **transport**: line-delimited JSON の codec、bounded queue、`SocketBridge`
//! - **impls**: 実装（ChatProvider, RuleTable）
//! - **app**: decision loop（driver, executor, remote queries）
//! - **config** / **error**: 設定とエラー分類

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod transport;

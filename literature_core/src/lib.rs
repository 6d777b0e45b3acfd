//! # Literature 核心规则库
//!
//! 这个 `core` crate 包含了六人两队 "Literature" 纸牌游戏的全部规则：
//! 牌组与半套划分、房间状态 (聚合根)、入座/开局、要牌、宣告，
//! 以及客户端-服务器通信消息和错误类型的定义。
//! 它不做任何 I/O，房间级的互斥与持久化由上层服务负责。

mod card;
mod error;
mod logic;
mod message;
mod state;

pub use card::*;

pub use error::*;

pub use message::*;

pub use state::*;

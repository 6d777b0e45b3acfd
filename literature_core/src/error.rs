use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 请求级错误。
/// 只会回报给发起请求的客户端，并且保证没有改动任何状态。
/// 注意：宣告 (declare) 判定为无效不属于错误，它是一种正常的游戏结果。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("房间不存在")]
    RoomNotFound,
    #[error("玩家不存在")]
    PlayerNotFound,
    #[error("房间已满")]
    RoomFull,
    #[error("还没轮到你")]
    NotYourTurn,
    #[error("你不能要自己已经有的牌")]
    AlreadyHeld,
    #[error("你手里必须有同一个半套的牌才能要这张牌")]
    NoStakeInSet,
    #[error("只能向对方队伍的玩家要牌")]
    NotAnOpponent,
    #[error("宣告不合法: {0}")]
    InvalidDeclaration(String),
    #[error("这个半套已经被宣告过了")]
    SetAlreadyDeclared,
    #[error("游戏已经结束")]
    GameEnded,
    #[error("存储不可用: {0}")]
    StoreUnavailable(String),
}

/// 发送给客户端的错误类别，与 `GameError` 一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    RoomNotFound,
    PlayerNotFound,
    RoomFull,
    NotYourTurn,
    AlreadyHeld,
    NoStakeInSet,
    NotAnOpponent,
    InvalidDeclaration,
    SetAlreadyDeclared,
    GameEnded,
    StoreUnavailable,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::RoomNotFound => ErrorKind::RoomNotFound,
            GameError::PlayerNotFound => ErrorKind::PlayerNotFound,
            GameError::RoomFull => ErrorKind::RoomFull,
            GameError::NotYourTurn => ErrorKind::NotYourTurn,
            GameError::AlreadyHeld => ErrorKind::AlreadyHeld,
            GameError::NoStakeInSet => ErrorKind::NoStakeInSet,
            GameError::NotAnOpponent => ErrorKind::NotAnOpponent,
            GameError::InvalidDeclaration(_) => ErrorKind::InvalidDeclaration,
            GameError::SetAlreadyDeclared => ErrorKind::SetAlreadyDeclared,
            GameError::GameEnded => ErrorKind::GameEnded,
            GameError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// 返回给客户端的文字说明。存储层的细节不外泄。
    pub fn client_message(&self) -> String {
        match self {
            GameError::StoreUnavailable(_) => "服务暂时不可用，请稍后再试".to_string(),
            _ => self.to_string(),
        }
    }
}

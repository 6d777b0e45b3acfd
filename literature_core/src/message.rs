use crate::card::{Card, HalfSuit};
use crate::error::{ErrorKind, GameError};
use crate::state::{Declaration, GameSnapshot, PlayerId, PlayerSummary, RoomId, Scores, Team};
use serde::{Deserialize, Serialize};

// --- 客户端 -> 服务器 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ClientMessage {
    // --- 房间管理消息 ---
    /// 客户端请求创建一个新房间
    CreateRoom { name: String },
    /// 客户端请求加入一个已存在的房间
    JoinRoom { room_id: RoomId, name: String },

    // --- 游戏内消息 ---
    /// 向对方队伍的某位玩家要一张牌
    AskCard { asked_player: PlayerId, card: Card },
    /// 宣告本队拥有某个半套
    DeclareSet { declaration: Declaration },
    /// 获取自己的手牌
    GetMyHand,
    /// 获取房间内的玩家列表
    GetPlayers,
}

// --- 服务器 -> 客户端 的消息 ---
// 每条消息都是刚提交的房间状态的投影，每个修改操作只产生一次。

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// 成功加入或创建房间后，私密地发给该玩家
    RoomJoined {
        your_id: PlayerId,
        room_id: RoomId,
        team: Team,
    },

    /// 房间状态快照，私密地发给尚未开局时加入的玩家
    GameStateSnapshot(GameSnapshot),

    /// 房间的玩家列表发生了变化
    PlayersUpdated { players: Vec<PlayerSummary> },

    /// 私密下发的完整手牌
    HandDelivered { hand: Vec<Card> },

    /// 第六位玩家入座，游戏开始
    GameStarted { current_turn: PlayerId },

    /// 要牌成功，一张牌从 from_player 转移到 to_player
    CardTransferred {
        from_player: PlayerId,
        to_player: PlayerId,
        card: Card,
    },

    /// 某位玩家的手牌变化后的完整内容
    HandUpdated { player_id: PlayerId, hand: Vec<Card> },

    /// 行动权转移
    TurnChanged { current_turn: PlayerId },

    /// 宣告结算结果
    SetDeclared(DeclarationOutcome),

    /// 服务器向特定客户端发送提示或错误信息
    Info { message: String },
    Error { kind: ErrorKind, message: String },
}

/// 宣告中某张牌的真实持有者
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CardOwner {
    pub card: Card,
    pub owner: PlayerId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeclarationOutcome {
    pub declaring_player: PlayerId,
    pub declaring_team: Team,
    pub half_suit: HalfSuit,
    pub declaration: Declaration,
    pub actual_owners: Vec<CardOwner>,
    pub is_valid: bool,
    pub scores: Scores,
    pub winning_team: Option<Team>,
}

/// 消息的接收范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// 房间内所有玩家
    Room,
    /// 单个玩家
    Player(PlayerId),
}

/// 引擎产生的一条待投递消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Envelope {
    pub fn room(message: ServerMessage) -> Self {
        Envelope { audience: Audience::Room, message }
    }

    pub fn to(player_id: PlayerId, message: ServerMessage) -> Self {
        Envelope { audience: Audience::Player(player_id), message }
    }
}

impl From<GameError> for ServerMessage {
    fn from(err: GameError) -> Self {
        ServerMessage::Error { kind: err.kind(), message: err.client_message() }
    }
}

impl From<Declaration> for ClientMessage {
    fn from(declaration: Declaration) -> Self {
        ClientMessage::DeclareSet { declaration }
    }
}

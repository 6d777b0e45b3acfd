use crate::card::{Card, HalfSuit, HALF_SUIT_SIZE};
use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

pub type RoomId = Uuid;
pub type PlayerId = Uuid;

/// 每个房间固定 6 个座位，两队各 3 人
pub const SEATS: usize = 6;
/// 先拿到 5 分的队伍获胜
pub const WINNING_SCORE: u32 = 5;

/// 队伍。第 k 个入座的玩家 (从 0 开始) 属于 `k mod 2` 队。
/// 序列化为 0 / 1。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Team {
    Zero,
    One,
}

impl Team {
    pub fn for_seat(seat: usize) -> Team {
        if seat % 2 == 0 { Team::Zero } else { Team::One }
    }

    pub fn opponent(self) -> Team {
        match self {
            Team::Zero => Team::One,
            Team::One => Team::Zero,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Team::Zero => 0,
            Team::One => 1,
        }
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> u8 {
        team.index() as u8
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Team::Zero),
            1 => Ok(Team::One),
            other => Err(format!("无效的队伍编号: {}", other)),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// 两队的得分，下标即队伍编号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores([u32; 2]);

impl Scores {
    pub fn new(zero: u32, one: u32) -> Self {
        Scores([zero, one])
    }

    pub fn get(&self, team: Team) -> u32 {
        self.0[team.index()]
    }

    /// 给某队加 1 分，返回新分数
    pub fn award(&mut self, team: Team) -> u32 {
        self.0[team.index()] += 1;
        self.0[team.index()]
    }

    /// 已经达到获胜分数的队伍 (如果有)
    pub fn winner(&self) -> Option<Team> {
        [Team::Zero, Team::One].into_iter().find(|t| self.get(*t) >= WINNING_SCORE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    /// 等待玩家坐满
    Setup,
    /// 已发牌，正在游戏
    Active,
    /// 有队伍拿到 5 分，终态
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team: Team,
    pub seat: usize, // 入座顺序
    pub hand: Vec<Card>,
}

impl Player {
    pub fn new(name: impl Into<String>, seat: usize) -> Self {
        Player {
            id: Uuid::new_v4(),
            name: name.into(),
            team: Team::for_seat(seat),
            seat,
            hand: Vec::new(),
        }
    }

    pub fn holds(&self, card: &Card) -> bool {
        self.hand.contains(card)
    }

    pub fn holds_any_of(&self, half_suit: HalfSuit) -> bool {
        self.hand.iter().any(|c| c.half_suit() == half_suit)
    }

    /// 从手牌中移除一张牌，返回是否真的移除了
    pub fn take(&mut self, card: &Card) -> bool {
        match self.hand.iter().position(|c| c == card) {
            Some(idx) => {
                self.hand.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary { id: self.id, name: self.name.clone(), team: self.team }
    }
}

/// 对外公开的玩家信息，不含手牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub team: Team,
}

/// 一个房间的完整权威状态 (聚合根)。
/// 所有修改都经过 `logic` 中的方法，调用方负责在房间级别的临界区内执行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub status: RoomStatus,
    pub players: Vec<Player>, // 按入座顺序
    pub current_turn: Option<PlayerId>,
    pub round: u32,
    pub scores: Scores,
    pub winning_team: Option<Team>,
    // 已被宣告、退出游戏的半套
    pub declared: Vec<HalfSuit>,
}

/// 房间状态快照，发给刚加入的玩家，也用于查询接口
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub room_id: RoomId,
    pub started: bool,
    pub status: RoomStatus,
    pub current_turn: Option<PlayerId>,
    pub round: u32,
    pub scores: Scores,
    pub winning_team: Option<Team>,
    pub declared: Vec<HalfSuit>,
}

impl Room {
    /// 创建处于 Setup 阶段的房间，创建者作为 0 号座位 (0 队)
    pub fn new(creator_name: impl Into<String>) -> Self {
        Room {
            id: Uuid::new_v4(),
            status: RoomStatus::Setup,
            players: vec![Player::new(creator_name, 0)],
            current_turn: None,
            round: 0,
            scores: Scores::default(),
            winning_team: None,
            declared: Vec::new(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= SEATS
    }

    pub fn started(&self) -> bool {
        self.status != RoomStatus::Setup
    }

    /// 当前持有这张牌的玩家
    pub fn holder_of(&self, card: &Card) -> Option<PlayerId> {
        self.players.iter().find(|p| p.holds(card)).map(|p| p.id)
    }

    /// 所有玩家手牌的总数
    pub fn cards_in_play(&self) -> usize {
        self.players.iter().map(|p| p.hand.len()).sum()
    }

    pub fn summaries(&self) -> Vec<PlayerSummary> {
        self.players.iter().map(Player::summary).collect()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            room_id: self.id,
            started: self.started(),
            status: self.status,
            current_turn: self.current_turn,
            round: self.round,
            scores: self.scores,
            winning_team: self.winning_team,
            declared: self.declared.clone(),
        }
    }
}

/// 宣告中的一项：某个队友手里有哪些牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub player_id: PlayerId,
    pub cards: Vec<Card>,
}

/// 宣告：声明本队拥有某个半套的全部 6 张牌，以及每张牌在谁手里
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub claims: Vec<Claim>,
}

impl Declaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(mut self, player_id: PlayerId, cards: impl IntoIterator<Item = Card>) -> Self {
        self.claims.push(Claim { player_id, cards: cards.into_iter().collect() });
        self
    }

    pub fn pairs(&self) -> impl Iterator<Item = (PlayerId, Card)> + '_ {
        self.claims.iter().flat_map(|claim| claim.cards.iter().map(move |c| (claim.player_id, *c)))
    }

    /// 检查宣告恰好覆盖一个半套的 6 张不同的牌，返回这个半套
    pub fn half_suit(&self) -> Result<HalfSuit, GameError> {
        let cards: Vec<Card> = self.pairs().map(|(_, c)| c).collect();
        if cards.len() != HALF_SUIT_SIZE {
            return Err(GameError::InvalidDeclaration(format!(
                "需要恰好 {} 张牌，实际 {} 张",
                HALF_SUIT_SIZE,
                cards.len()
            )));
        }

        let distinct: HashSet<&Card> = cards.iter().collect();
        if distinct.len() != cards.len() {
            return Err(GameError::InvalidDeclaration("有重复的牌".to_string()));
        }

        let half_suit = cards[0].half_suit();
        if cards.iter().any(|c| c.half_suit() != half_suit) {
            return Err(GameError::InvalidDeclaration("牌必须属于同一个半套".to_string()));
        }
        Ok(half_suit)
    }
}

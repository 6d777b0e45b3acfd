//! 持久化网关。
//!
//! 房间和玩家分两张"表"保存，`commit` 一次性写入房间记录及其全部玩家记录。

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use literature_core::{
    Card, GameError, HalfSuit, Player, PlayerId, Room, RoomId, RoomStatus, Scores, Team,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("存储后端不可用: {0}")]
    Unavailable(String),
    #[error("数据损坏: {0}")]
    Corrupted(String),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        GameError::StoreUnavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub id: RoomId,
    pub status: RoomStatus,
    pub current_turn: Option<PlayerId>,
    pub round: u32,
    pub scores: Scores,
    pub winning_team: Option<Team>,
    pub declared: Vec<HalfSuit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub room_id: RoomId,
    pub name: String,
    pub team: Team,
    pub seat: usize,
    pub hand: Vec<Card>,
}

/// 把聚合拆成记录
pub fn to_records(room: &Room) -> (RoomRecord, Vec<PlayerRecord>) {
    let record = RoomRecord {
        id: room.id,
        status: room.status,
        current_turn: room.current_turn,
        round: room.round,
        scores: room.scores,
        winning_team: room.winning_team,
        declared: room.declared.clone(),
    };
    let players = room
        .players
        .iter()
        .map(|p| PlayerRecord {
            id: p.id,
            room_id: room.id,
            name: p.name.clone(),
            team: p.team,
            seat: p.seat,
            hand: p.hand.clone(),
        })
        .collect();
    (record, players)
}

/// 由记录组装聚合，玩家按座位排序
pub fn from_records(record: RoomRecord, mut players: Vec<PlayerRecord>) -> StoreResult<Room> {
    players.sort_by_key(|p| p.seat);
    if players.iter().enumerate().any(|(i, p)| p.seat != i || p.room_id != record.id) {
        return Err(StoreError::Corrupted(format!("房间 {} 的座位记录不连续", record.id)));
    }
    Ok(Room {
        id: record.id,
        status: record.status,
        players: players
            .into_iter()
            .map(|p| Player { id: p.id, name: p.name, team: p.team, seat: p.seat, hand: p.hand })
            .collect(),
        current_turn: record.current_turn,
        round: record.round,
        scores: record.scores,
        winning_team: record.winning_team,
        declared: record.declared,
    })
}

/// 房间存储。实现方必须保证 `commit` 的原子性：要么全部记录都写入，要么都不写入。
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// 读取房间聚合
    async fn load_room(&self, room_id: RoomId) -> StoreResult<Option<Room>>;

    /// 原子地写入房间记录和它的全部玩家记录
    async fn commit(&self, room: &Room) -> StoreResult<()>;

    /// 按玩家 ID 查找玩家记录
    async fn find_player(&self, player_id: PlayerId) -> StoreResult<Option<PlayerRecord>>;
}

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, RoomRecord>,
    players: HashMap<PlayerId, PlayerRecord>,
    // room_id -> 该房间的玩家 ID，按入座顺序
    seating: HashMap<RoomId, Vec<PlayerId>>,
}

/// 进程内存储。两张表在同一把写锁下更新，因此 `commit` 是原子的。
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn load_room(&self, room_id: RoomId) -> StoreResult<Option<Room>> {
        let tables = self.tables.read();
        let Some(record) = tables.rooms.get(&room_id).cloned() else {
            return Ok(None);
        };
        let players = tables
            .seating
            .get(&room_id)
            .into_iter()
            .flatten()
            .map(|id| {
                tables
                    .players
                    .get(id)
                    .cloned()
                    .ok_or_else(|| StoreError::Corrupted(format!("缺少玩家记录 {}", id)))
            })
            .collect::<StoreResult<Vec<_>>>()?;
        from_records(record, players).map(Some)
    }

    async fn commit(&self, room: &Room) -> StoreResult<()> {
        let (record, players) = to_records(room);
        let seating = players.iter().map(|p| p.id).collect();

        let mut tables = self.tables.write();
        for player in players {
            tables.players.insert(player.id, player);
        }
        tables.seating.insert(record.id, seating);
        tables.rooms.insert(record.id, record);
        Ok(())
    }

    async fn find_player(&self, player_id: PlayerId) -> StoreResult<Option<PlayerRecord>> {
        Ok(self.tables.read().players.get(&player_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_then_load_returns_same_aggregate() {
        let store = MemoryStore::new();
        let mut room = Room::new("p0");
        for i in 1..6 {
            room.join(format!("p{}", i)).unwrap();
        }
        store.commit(&room).await.unwrap();

        let loaded = store.load_room(room.id).await.unwrap().unwrap();
        assert_eq!(loaded, room);
    }

    #[tokio::test]
    async fn test_unknown_room_and_player() {
        let store = MemoryStore::new();
        assert!(store.load_room(RoomId::new_v4()).await.unwrap().is_none());
        assert!(store.find_player(PlayerId::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_player_sees_committed_hand() {
        let store = MemoryStore::new();
        let mut room = Room::new("p0");
        let (p1, _) = room.join("p1").unwrap();
        store.commit(&room).await.unwrap();

        room.players[1].hand.push(Card::new(literature_core::Rank::Ace, literature_core::Suit::Club));
        store.commit(&room).await.unwrap();

        let record = store.find_player(p1).await.unwrap().unwrap();
        assert_eq!(record.room_id, room.id);
        assert_eq!(record.team, Team::One);
        assert_eq!(record.hand.len(), 1);
    }

    #[test]
    fn test_from_records_rejects_gaps_in_seating() {
        let room = Room::new("p0");
        let (record, mut players) = to_records(&room);
        players[0].seat = 3;
        assert!(matches!(from_records(record, players), Err(StoreError::Corrupted(_))));
    }
}

//! 游戏服务：把核心规则、存储和广播串起来。
//!
//! 每个房间一把异步互斥锁。任何操作都在这把锁内完成
//! "读取 -> 校验 -> 修改 -> 提交 -> 投递" 的全过程，不同房间之间完全并行。

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use literature_core::{
    Card, Declaration, Envelope, GameError, GameSnapshot, PlayerId, PlayerSummary, Room, RoomId,
    RoomStatus, ServerMessage, Team,
};

use crate::gateway::Broadcaster;
use crate::store::RoomStore;

pub struct GameService {
    store: Arc<dyn RoomStore>,
    gateway: Broadcaster,
    sections: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl GameService {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store, gateway: Broadcaster::new(), sections: DashMap::new() }
    }

    /// 进入已有房间的临界区。只为存储中确实存在的房间建立锁，
    /// 查询不存在的房间直接返回 RoomNotFound，不会留下任何条目。
    async fn section(&self, room_id: RoomId) -> Result<OwnedMutexGuard<()>, GameError> {
        let existing = self.sections.get(&room_id).map(|lock| Arc::clone(lock.value()));
        let lock = match existing {
            Some(lock) => lock,
            None => {
                self.load(room_id).await?;
                Arc::clone(self.sections.entry(room_id).or_default().value())
            }
        };
        Ok(lock.lock_owned().await)
    }

    /// 已结束且没有任何连接的房间不再需要临界区
    fn evict_if_finished(&self, room_id: RoomId, status: RoomStatus) {
        if status == RoomStatus::Ended && self.gateway.connected(room_id) == 0 {
            self.sections.remove(&room_id);
            debug!("房间 {} 已结束且无连接，释放临界区", room_id);
        }
    }

    #[cfg(test)]
    fn section_count(&self) -> usize {
        self.sections.len()
    }

    async fn load(&self, room_id: RoomId) -> Result<Room, GameError> {
        self.store
            .load_room(room_id)
            .await
            .inspect_err(|e| error!("读取房间 {} 失败: {}", room_id, e))?
            .ok_or(GameError::RoomNotFound)
    }

    async fn commit(&self, room: &Room) -> Result<(), GameError> {
        self.store
            .commit(room)
            .await
            .inspect_err(|e| error!("提交房间 {} 失败: {}", room.id, e))?;
        Ok(())
    }

    /// 通用的修改流程。`apply` 返回 Err 时不会提交，也不会投递任何消息。
    async fn mutate<T>(
        &self,
        room_id: RoomId,
        apply: impl FnOnce(&mut Room) -> Result<(T, Vec<Envelope>), GameError>,
    ) -> Result<T, GameError> {
        let _guard = self.section(room_id).await?;
        let mut room = self.load(room_id).await?;
        let (value, envelopes) = apply(&mut room)?;
        self.commit(&room).await?;
        self.gateway.dispatch(room_id, envelopes);
        Ok(value)
    }

    /// 创建房间，创建者作为第一位玩家。`conn` 为该玩家的推送通道 (如果有)。
    pub async fn create_room(
        &self,
        name: String,
        conn: Option<mpsc::Sender<ServerMessage>>,
    ) -> Result<(RoomId, PlayerId), GameError> {
        let room = Room::new(name);
        let room_id = room.id;
        let creator = &room.players[0];
        let player_id = creator.id;

        // 新房间：先建立临界区再提交
        let lock = Arc::clone(self.sections.entry(room_id).or_default().value());
        let _guard = lock.lock_owned().await;
        if let Err(err) = self.commit(&room).await {
            self.sections.remove(&room_id);
            return Err(err);
        }
        if let Some(tx) = conn {
            self.gateway.register(room_id, player_id, tx);
        }
        self.gateway
            .dispatch(room_id, vec![
                Envelope::to(player_id, ServerMessage::RoomJoined { your_id: player_id, room_id, team: creator.team }),
                Envelope::room(ServerMessage::PlayersUpdated { players: room.summaries() }),
            ]);

        info!("玩家 {} 创建了新房间 {}", player_id, room_id);
        Ok((room_id, player_id))
    }

    /// 加入房间。第六位玩家加入时在同一个临界区内完成开局。
    pub async fn join_room(
        &self,
        room_id: RoomId,
        name: String,
        conn: Option<mpsc::Sender<ServerMessage>>,
    ) -> Result<PlayerId, GameError> {
        let _guard = self.section(room_id).await?;
        let mut room = self.load(room_id).await?;
        let (player_id, envelopes) = room.join(name)?;
        self.commit(&room).await?;

        // 先登记连接，新玩家才能收到自己的私密消息
        if let Some(tx) = conn {
            self.gateway.register(room_id, player_id, tx);
        }
        self.gateway.dispatch(room_id, envelopes);

        info!("玩家 {} 加入了房间 {}", player_id, room_id);
        if room.status == RoomStatus::Active {
            info!("房间 {} 开局，先手玩家 {:?}", room_id, room.current_turn);
        }
        Ok(player_id)
    }

    pub async fn ask(&self, room_id: RoomId, asking: PlayerId, asked: PlayerId, card: Card) -> Result<(), GameError> {
        self.mutate(room_id, |room| room.ask(asking, asked, card).map(|envelopes| ((), envelopes)))
            .await
            .inspect_err(|e| debug!("房间 {} 玩家 {} 要牌 {} 被拒绝: {}", room_id, asking, card.code(), e))
    }

    pub async fn declare(&self, room_id: RoomId, declaring: PlayerId, declaration: Declaration) -> Result<(), GameError> {
        let snapshot = self
            .mutate(room_id, |room| {
                let envelopes = room.declare(declaring, &declaration)?;
                Ok((room.snapshot(), envelopes))
            })
            .await
            .inspect_err(|e| debug!("房间 {} 玩家 {} 的宣告被拒绝: {}", room_id, declaring, e))?;

        info!("房间 {} 玩家 {} 宣告了一个半套，比分 {:?}", room_id, declaring, snapshot.scores);
        if let Some(team) = snapshot.winning_team {
            info!("房间 {} 游戏结束，{} 队获胜", room_id, team);
        }
        self.evict_if_finished(room_id, snapshot.status);
        Ok(())
    }

    // --- 只读查询，同样在临界区内读取，不会看到提交到一半的状态 ---

    pub async fn players(&self, room_id: RoomId) -> Result<Vec<PlayerSummary>, GameError> {
        let _guard = self.section(room_id).await?;
        Ok(self.load(room_id).await?.summaries())
    }

    pub async fn snapshot(&self, room_id: RoomId) -> Result<GameSnapshot, GameError> {
        let _guard = self.section(room_id).await?;
        Ok(self.load(room_id).await?.snapshot())
    }

    pub async fn hand(&self, player_id: PlayerId) -> Result<Vec<Card>, GameError> {
        let room_id = self.room_of(player_id).await?;
        let _guard = self.section(room_id).await?;
        let room = self.load(room_id).await?;
        room.player(player_id).map(|p| p.hand.clone()).ok_or(GameError::PlayerNotFound)
    }

    pub async fn team(&self, player_id: PlayerId) -> Result<Team, GameError> {
        let record = self.store.find_player(player_id).await?;
        record.map(|p| p.team).ok_or(GameError::PlayerNotFound)
    }

    async fn room_of(&self, player_id: PlayerId) -> Result<RoomId, GameError> {
        let record = self.store.find_player(player_id).await?;
        record.map(|p| p.room_id).ok_or(GameError::PlayerNotFound)
    }

    /// 连接断开：只移除推送通道，玩家仍保留在房间里
    pub async fn disconnect(&self, room_id: RoomId, player_id: PlayerId) {
        self.gateway.unregister(room_id, player_id);
        let remaining = self.gateway.connected(room_id);
        info!("玩家 {} 从房间 {} 断开连接，剩余连接 {}", player_id, room_id, remaining);
        if remaining == 0 {
            if let Ok(room) = self.load(room_id).await {
                self.evict_if_finished(room_id, room.status);
            }
        }
    }
}

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use literature_core::{Audience, Envelope, PlayerId, RoomId, ServerMessage};

/// 广播网关：房间 -> (玩家 -> 该玩家 WebSocket 任务的发送通道)
#[derive(Default)]
pub struct Broadcaster {
    rooms: DashMap<RoomId, HashMap<PlayerId, mpsc::Sender<ServerMessage>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, room_id: RoomId, player_id: PlayerId, sender: mpsc::Sender<ServerMessage>) {
        self.rooms.entry(room_id).or_default().insert(player_id, sender);
    }

    pub fn unregister(&self, room_id: RoomId, player_id: PlayerId) {
        if let Some(mut conns) = self.rooms.get_mut(&room_id) {
            conns.remove(&player_id);
        }
        self.rooms.remove_if(&room_id, |_, conns| conns.is_empty());
    }

    /// 按顺序投递一组消息。
    /// 调用方持有房间的临界区，因此同一房间的消息顺序与提交顺序一致。
    /// 投递不会等待：某个玩家的通道已满或已关闭时丢弃该条并记录，其他玩家照常收到。
    pub fn dispatch(&self, room_id: RoomId, envelopes: Vec<Envelope>) {
        let Some(conns) = self.rooms.get(&room_id) else {
            return;
        };
        for envelope in envelopes {
            let targets: Vec<(&PlayerId, &mpsc::Sender<ServerMessage>)> = match envelope.audience {
                Audience::Room => conns.iter().collect(),
                Audience::Player(id) => conns.get_key_value(&id).into_iter().collect(),
            };
            for (player_id, tx) in targets {
                match tx.try_send(envelope.message.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("玩家 {} 的消息队列已满，丢弃一条消息", player_id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        // 发送失败，说明该玩家已断开，后续由其自己的连接任务清理
                        warn!("向玩家 {} 发送消息失败（可能已断开）", player_id);
                    }
                }
            }
        }
    }

    pub fn connected(&self, room_id: RoomId) -> usize {
        self.rooms.get(&room_id).map_or(0, |conns| conns.len())
    }
}

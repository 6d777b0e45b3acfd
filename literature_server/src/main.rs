mod config;
mod gateway;
mod http;
mod service;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{stream::StreamExt, SinkExt};
use pico_args::Arguments;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use literature_core::{ClientMessage, GameError, PlayerId, RoomId, ServerMessage};

use crate::config::ServerConfig;
use crate::service::GameService;
use crate::store::MemoryStore;

// 服务器全局状态
pub struct AppState {
    service: GameService,
    config: ServerConfig,
}

pub type SharedState = Arc<AppState>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut pargs = Arguments::from_env();
    let bind_override: Option<SocketAddr> = pargs.opt_value_from_str("--bind").context("--bind 参数无效")?;
    let config = ServerConfig::from_env(bind_override)?;

    let state = SharedState::new(AppState {
        service: GameService::new(Arc::new(MemoryStore::new())),
        config,
    });

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .merge(http::routes())
        .with_state(state.clone());

    let addr = state.config.bind;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("无法监听 {}", addr))?;
    info!("服务器正在监听 {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 创建一个 MPSC 通道，房间广播和私密消息都经由它发出
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config.channel_capacity);

    // 启动一个新任务，专门负责将 MPSC 通道中的消息发送到 WebSocket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(p) => p,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    // 当前连接绑定的 (房间, 玩家)，在创建或加入房间成功后填充
    let mut player_context: Option<(RoomId, PlayerId)> = None;

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    if let Err(err) = handle_client_message(client_msg, &state, &tx, &mut player_context).await {
                        // 错误只发给当前玩家
                        debug!("请求被拒绝: {}", err);
                        let _ = tx.send(err.into()).await;
                    }
                }
                Err(e) => {
                    warn!("解析消息失败: {}", e);
                }
            }
        }
    }

    // 客户端断开连接，执行清理工作
    if let Some((room_id, player_id)) = player_context {
        state.service.disconnect(room_id, player_id).await;
    }
    info!("客户端连接关闭");
}

/// 核心消息处理逻辑
async fn handle_client_message(
    msg: ClientMessage,
    state: &SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut Option<(RoomId, PlayerId)>,
) -> Result<(), GameError> {
    let service = &state.service;
    match msg {
        ClientMessage::CreateRoom { name } => {
            if context.is_some() {
                let _ = tx.send(ServerMessage::Info { message: "你已经在一个房间里了".to_string() }).await;
                return Ok(());
            }
            let ids = service.create_room(name, Some(tx.clone())).await?;
            *context = Some(ids);
        }
        ClientMessage::JoinRoom { room_id, name } => {
            if context.is_some() {
                let _ = tx.send(ServerMessage::Info { message: "你已经在一个房间里了".to_string() }).await;
                return Ok(());
            }
            let player_id = service.join_room(room_id, name, Some(tx.clone())).await?;
            *context = Some((room_id, player_id));
        }
        // 以下消息需要先创建或加入房间
        ClientMessage::AskCard { asked_player, card } => {
            let (room_id, player_id) = bound(context)?;
            service.ask(room_id, player_id, asked_player, card).await?;
        }
        ClientMessage::DeclareSet { declaration } => {
            let (room_id, player_id) = bound(context)?;
            service.declare(room_id, player_id, declaration).await?;
        }
        ClientMessage::GetMyHand => {
            let (_, player_id) = bound(context)?;
            let hand = service.hand(player_id).await?;
            let _ = tx.send(ServerMessage::HandDelivered { hand }).await;
        }
        ClientMessage::GetPlayers => {
            let (room_id, _) = bound(context)?;
            let players = service.players(room_id).await?;
            let _ = tx.send(ServerMessage::PlayersUpdated { players }).await;
        }
    }
    Ok(())
}

fn bound(context: &Option<(RoomId, PlayerId)>) -> Result<(RoomId, PlayerId), GameError> {
    context.ok_or(GameError::PlayerNotFound)
}

use futures_util::{SinkExt, StreamExt};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use literature_core::{Card, ClientMessage, Declaration, PlayerId, RoomId, ServerMessage};

const DEFAULT_URL: &str = "ws://127.0.0.1:25917/ws";

const HELP: &str = "\
可用命令:
  create <昵称>                          - 创建一个新房间
  join <房间ID> <昵称>                   - 加入一个房间
  ask <玩家ID> <牌>                      - 向对方玩家要一张牌，例如 ask <ID> 10H
  declare <玩家ID>:<牌>,<牌> ...         - 宣告一个半套，例如 declare <ID>:8S,8H <ID>:8C,8D,JK1,JK2
  hand                                   - 查看自己的手牌
  players                                - 查看房间内的玩家
  exit                                   - 退出";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse(&std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string()))?;

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();

    // 启动一个任务来处理从服务器接收的消息
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(server_msg) => {
                        println!("\n<-- {}\n", render(&server_msg));
                        print!("> "); // 重新显示输入提示符
                        let _ = std::io::stdout().flush();
                    }
                    Err(e) => eprintln!("解析服务器消息失败: {}", e),
                },
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- Literature 客户端 ---");
    println!("{}", HELP);

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        let parts: Vec<&str> = line.split_whitespace().collect();

        let client_msg = match parse_command(&parts) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                println!("正在断开连接...");
                break;
            }
            Err(usage) => {
                println!("{}", usage);
                continue;
            }
        };

        let payload = serde_json::to_string(&client_msg)?;
        write.send(Message::Text(payload.into())).await?;
    }

    Ok(())
}

/// 解析一行输入。`Ok(None)` 表示退出。
fn parse_command(parts: &[&str]) -> Result<Option<ClientMessage>, String> {
    let msg = match parts {
        ["create", name] => ClientMessage::CreateRoom { name: name.to_string() },
        ["create"] => ClientMessage::CreateRoom { name: "新玩家".to_string() },
        ["join", room_id, name] => {
            let room_id: RoomId = room_id.parse().map_err(|_| "无效的房间ID格式".to_string())?;
            ClientMessage::JoinRoom { room_id, name: name.to_string() }
        }
        ["ask", player, card] => ClientMessage::AskCard {
            asked_player: parse_player(player)?,
            card: card.parse().map_err(|e: literature_core::ParseCardError| e.to_string())?,
        },
        ["declare", claims @ ..] if !claims.is_empty() => parse_declaration(claims)?.into(),
        ["hand"] => ClientMessage::GetMyHand,
        ["players"] => ClientMessage::GetPlayers,
        ["exit"] => return Ok(None),
        _ => return Err(HELP.to_string()),
    };
    Ok(Some(msg))
}

fn parse_player(s: &str) -> Result<PlayerId, String> {
    s.parse().map_err(|_| format!("无效的玩家ID: {}", s))
}

fn parse_declaration(claims: &[&str]) -> Result<Declaration, String> {
    let mut declaration = Declaration::new();
    for claim in claims {
        let (player, cards) = claim.split_once(':').ok_or_else(|| format!("格式应为 <玩家ID>:<牌>,<牌>: {}", claim))?;
        let cards = cards
            .split(',')
            .filter(|c| !c.is_empty())
            .map(|c| c.parse::<Card>().map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        declaration = declaration.claim(parse_player(player)?, cards);
    }
    Ok(declaration)
}

fn render_cards(cards: &[Card]) -> String {
    cards.iter().map(|c| format!("{}({})", c, c.code())).collect::<Vec<_>>().join(" ")
}

fn render(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::HandDelivered { hand } => format!("你的手牌: {}", render_cards(hand)),
        ServerMessage::HandUpdated { player_id, hand } => {
            format!("玩家 {} 的手牌: {}", player_id, render_cards(hand))
        }
        ServerMessage::CardTransferred { from_player, to_player, card } => {
            format!("{} 从 {} 手里拿到了 {}", to_player, from_player, card)
        }
        ServerMessage::TurnChanged { current_turn } => format!("轮到 {} 行动", current_turn),
        ServerMessage::GameStarted { current_turn } => format!("游戏开始! 先手: {}", current_turn),
        ServerMessage::Info { message } => format!("[提示] {}", message),
        ServerMessage::Error { kind, message } => format!("[错误 {:?}] {}", kind, message),
        other => format!("{:#?}", other),
    }
}

use rand::Rng;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// --- 核心数据结构定义 ---

/// 一副牌的总张数：52 张标准牌 + 2 张王
pub const DECK_SIZE: usize = 54;
/// 每名玩家开局的手牌数
pub const HAND_SIZE: usize = 9;
/// 每个半套 (HalfSuit) 包含的牌数
pub const HALF_SUIT_SIZE: usize = 6;

/// 花色 (Suit)
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Spade,   // 黑桃 ♠️
    Heart,   // 红心 ♥️
    Club,    // 梅花 ♣️
    Diamond, // 方块 ♦️
}

/// 点数 (Rank)
/// 8 是低半套与高半套的分界，单独和王组成第九个半套
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

/// 两张王在记账上需要区分
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum JokerCopy {
    First,
    Second,
}

/// 单张牌 (Card)
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Card {
    Standard { rank: Rank, suit: Suit },
    Joker(JokerCopy),
}

/// 半套 (HalfSuit)
/// 54 张牌被划分为 9 组，每组 6 张：
/// - `Low(suit)`: 同花色的 2~7
/// - `High(suit)`: 同花色的 9~A
/// - `Eights`: 四张 8 加两张王
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum HalfSuit {
    Low(Suit),
    High(Suit),
    Eights,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spade, Suit::Heart, Suit::Club, Suit::Diamond];

    /// 单字母代码，用于文本输入
    pub fn code(self) -> char {
        match self {
            Suit::Spade => 'S',
            Suit::Heart => 'H',
            Suit::Club => 'C',
            Suit::Diamond => 'D',
        }
    }
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
    ];
    const LOW: [Rank; 6] = [Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven];
    const HIGH: [Rank; 6] = [Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace];

    fn code(self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        }
    }
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card::Standard { rank, suit }
    }

    pub fn half_suit(&self) -> HalfSuit {
        half_suit_of(*self)
    }

    /// 文本代码，例如 `3S`、`10H`、`JK1`，可以被 `FromStr` 解析回来
    pub fn code(&self) -> String {
        match self {
            Card::Standard { rank, suit } => format!("{}{}", rank.code(), suit.code()),
            Card::Joker(JokerCopy::First) => "JK1".to_string(),
            Card::Joker(JokerCopy::Second) => "JK2".to_string(),
        }
    }
}

impl HalfSuit {
    pub const ALL: [HalfSuit; 9] = [
        HalfSuit::Low(Suit::Spade),
        HalfSuit::Low(Suit::Heart),
        HalfSuit::Low(Suit::Club),
        HalfSuit::Low(Suit::Diamond),
        HalfSuit::High(Suit::Spade),
        HalfSuit::High(Suit::Heart),
        HalfSuit::High(Suit::Club),
        HalfSuit::High(Suit::Diamond),
        HalfSuit::Eights,
    ];

    /// 该半套的全部 6 张牌
    pub fn cards(self) -> [Card; HALF_SUIT_SIZE] {
        match self {
            HalfSuit::Low(suit) => Rank::LOW.map(|rank| Card::new(rank, suit)),
            HalfSuit::High(suit) => Rank::HIGH.map(|rank| Card::new(rank, suit)),
            HalfSuit::Eights => [
                Card::new(Rank::Eight, Suit::Spade),
                Card::new(Rank::Eight, Suit::Heart),
                Card::new(Rank::Eight, Suit::Club),
                Card::new(Rank::Eight, Suit::Diamond),
                Card::Joker(JokerCopy::First),
                Card::Joker(JokerCopy::Second),
            ],
        }
    }
}

/// 判断一张牌属于哪个半套。纯函数，对全部 54 张牌都有定义。
pub fn half_suit_of(card: Card) -> HalfSuit {
    match card {
        Card::Joker(_) => HalfSuit::Eights,
        Card::Standard { rank: Rank::Eight, .. } => HalfSuit::Eights,
        Card::Standard { rank, suit } if rank < Rank::Eight => HalfSuit::Low(suit),
        Card::Standard { suit, .. } => HalfSuit::High(suit),
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Spade => "♠️",
            Suit::Heart => "♥️",
            Suit::Club => "♣️",
            Suit::Diamond => "♦️",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Card::Standard { rank, suit } => write!(f, "{}{}", suit, rank),
            Card::Joker(JokerCopy::First) => write!(f, "🃏1"),
            Card::Joker(JokerCopy::Second) => write!(f, "🃏2"),
        }
    }
}

impl fmt::Display for HalfSuit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HalfSuit::Low(suit) => write!(f, "{}2-7", suit),
            HalfSuit::High(suit) => write!(f, "{}9-A", suit),
            HalfSuit::Eights => write!(f, "8+🃏"),
        }
    }
}

/// 牌代码解析失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("无法识别的牌: {0:?}")]
pub struct ParseCardError(pub String);

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        let err = || ParseCardError(s.to_string());

        match code.as_str() {
            "JK1" | "JOKER1" => return Ok(Card::Joker(JokerCopy::First)),
            "JK2" | "JOKER2" => return Ok(Card::Joker(JokerCopy::Second)),
            _ => {}
        }

        // 最后一个字符是花色，其余是点数
        let suit_char = code.chars().last().ok_or_else(err)?;
        let suit = Suit::ALL.into_iter().find(|s| s.code() == suit_char).ok_or_else(err)?;
        let rank_code = &code[..code.len() - suit_char.len_utf8()];
        let rank = match rank_code {
            "T" => Rank::Ten,
            _ => Rank::ALL.into_iter().find(|r| r.code() == rank_code).ok_or_else(err)?,
        };
        Ok(Card::new(rank, suit))
    }
}

// --- 发牌 ---

/// 按固定顺序生成完整的 54 张牌
pub fn full_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for &suit in &Suit::ALL {
        for &rank in &Rank::ALL {
            deck.push(Card::new(rank, suit));
        }
    }
    deck.push(Card::Joker(JokerCopy::First));
    deck.push(Card::Joker(JokerCopy::Second));
    deck
}

/// 洗牌并分成 6 手，每手 9 张，按入座顺序依次分配
pub fn deal() -> Vec<Vec<Card>> {
    deal_with(&mut rand::rng())
}

/// 使用给定的随机源发牌，便于测试时固定种子
pub fn deal_with<R: Rng + ?Sized>(rng: &mut R) -> Vec<Vec<Card>> {
    let mut deck = full_deck();
    // Fisher-Yates，每种排列等概率
    deck.shuffle(rng);
    deck.chunks(HAND_SIZE).map(|hand| hand.to_vec()).collect()
}

// --- 单元测试 ---

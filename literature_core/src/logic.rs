use crate::card::*;
use crate::error::GameError;
use crate::message::*;
use crate::state::*;
use rand::Rng;
use rand::prelude::IndexedRandom;

// --- 核心游戏流程函数 ---
//
// 所有方法都先完成全部校验，再修改状态。
// 返回 Err 时房间保持原样；返回 Ok 时附带需要投递的消息，调用方应在持久化成功后再投递。

impl Room {
    /// 新玩家入座
    ///
    /// - 房间已满时返回 `RoomFull`。
    /// - 队伍按入座顺序交替分配。
    /// - 第六位玩家入座时在同一步内完成开局：发牌、随机选出先手、状态变为 Active。
    pub fn join(&mut self, name: impl Into<String>) -> Result<(PlayerId, Vec<Envelope>), GameError> {
        self.join_with(name, &mut rand::rng())
    }

    pub fn join_with<R: Rng + ?Sized>(
        &mut self,
        name: impl Into<String>,
        rng: &mut R,
    ) -> Result<(PlayerId, Vec<Envelope>), GameError> {
        if self.is_full() {
            return Err(GameError::RoomFull);
        }

        let player = Player::new(name, self.players.len());
        let player_id = player.id;
        let team = player.team;
        self.players.push(player);

        let mut envelopes = vec![
            Envelope::to(player_id, ServerMessage::RoomJoined { your_id: player_id, room_id: self.id, team }),
            Envelope::room(ServerMessage::PlayersUpdated { players: self.summaries() }),
        ];

        if self.is_full() {
            envelopes.extend(self.activate(rng));
        } else {
            envelopes.push(Envelope::to(player_id, ServerMessage::GameStateSnapshot(self.snapshot())));
        }
        Ok((player_id, envelopes))
    }

    /// 开局：发牌、随机先手、进入 Active。只会在第六位玩家入座时调用一次。
    fn activate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Envelope> {
        let hands = deal_with(rng);
        for (player, hand) in self.players.iter_mut().zip(hands) {
            player.hand = hand;
        }

        let first = self.players.choose(rng).map(|p| p.id);
        self.current_turn = first;
        self.status = RoomStatus::Active;
        self.round = 1;

        let mut envelopes: Vec<Envelope> = self
            .players
            .iter()
            .map(|p| Envelope::to(p.id, ServerMessage::HandDelivered { hand: p.hand.clone() }))
            .collect();
        if let Some(current_turn) = first {
            envelopes.push(Envelope::room(ServerMessage::GameStarted { current_turn }));
        }
        envelopes
    }

    /// 要牌
    ///
    /// 校验顺序：
    /// 1. 游戏未结束
    /// 2. 轮到要牌的玩家
    /// 3. 要的牌不在自己手里
    /// 4. 自己手里有同一半套的牌
    /// 5. 被要牌的玩家在房间里，且属于对方队伍
    ///
    /// 对方有这张牌则转移，行动权不变；否则行动权交给被要牌的玩家。
    pub fn ask(&mut self, asking: PlayerId, asked: PlayerId, card: Card) -> Result<Vec<Envelope>, GameError> {
        if self.status == RoomStatus::Ended {
            return Err(GameError::GameEnded);
        }
        if self.current_turn != Some(asking) {
            return Err(GameError::NotYourTurn);
        }

        let asker = self.player(asking).ok_or(GameError::PlayerNotFound)?;
        if asker.holds(&card) {
            return Err(GameError::AlreadyHeld);
        }
        if !asker.holds_any_of(card.half_suit()) {
            return Err(GameError::NoStakeInSet);
        }
        let asker_team = asker.team;

        let target = self.player(asked).ok_or(GameError::PlayerNotFound)?;
        if target.team == asker_team {
            return Err(GameError::NotAnOpponent);
        }

        // 校验全部通过，下面开始修改状态
        if !target.holds(&card) {
            self.current_turn = Some(asked);
            return Ok(vec![Envelope::room(ServerMessage::TurnChanged { current_turn: asked })]);
        }

        let mut envelopes = vec![Envelope::room(ServerMessage::CardTransferred {
            from_player: asked,
            to_player: asking,
            card,
        })];
        if let Some(p) = self.player_mut(asked) {
            p.take(&card);
        }
        if let Some(p) = self.player_mut(asking) {
            p.hand.push(card);
        }
        for id in [asking, asked] {
            if let Some(p) = self.player(id) {
                envelopes.push(Envelope::room(ServerMessage::HandUpdated { player_id: id, hand: p.hand.clone() }));
            }
        }
        Ok(envelopes)
    }

    /// 宣告一个半套
    ///
    /// 请求级校验 (失败时不修改任何状态)：游戏未结束、轮到宣告者、
    /// 被点名的玩家都在房间里、恰好覆盖一个半套、该半套尚未被宣告。
    ///
    /// 之后无论宣告是否正确都会结算：
    /// - 所有被点名的牌从其真实持有者手中移除；
    /// - 正确则本队 +1，否则对方 +1；
    /// - 有队伍达到 5 分则游戏结束；
    /// - 行动权不变。
    pub fn declare(&mut self, declaring: PlayerId, declaration: &Declaration) -> Result<Vec<Envelope>, GameError> {
        if self.status == RoomStatus::Ended {
            return Err(GameError::GameEnded);
        }
        if self.current_turn != Some(declaring) {
            return Err(GameError::NotYourTurn);
        }
        let declaring_team = self.player(declaring).ok_or(GameError::PlayerNotFound)?.team;

        if declaration.claims.iter().any(|claim| self.player(claim.player_id).is_none()) {
            return Err(GameError::PlayerNotFound);
        }
        let half_suit = declaration.half_suit()?;
        if self.declared.contains(&half_suit) {
            return Err(GameError::SetAlreadyDeclared);
        }

        // 逐项核对，并找出每张牌的真实持有者
        // 点名了对方玩家 (哪怕没有分配任何牌) 即整体无效
        let mut is_valid = declaration
            .claims
            .iter()
            .all(|claim| self.player(claim.player_id).is_some_and(|p| p.team == declaring_team));
        let mut actual_owners = Vec::with_capacity(HALF_SUIT_SIZE);
        for (named, card) in declaration.pairs() {
            let named_player = self.player(named).ok_or(GameError::PlayerNotFound)?;
            if !named_player.holds(&card) {
                is_valid = false;
            }
            // 未被宣告的半套，每张牌一定在某人手里
            let owner = self.holder_of(&card).ok_or_else(|| {
                GameError::InvalidDeclaration(format!("{} 不在任何人手里", card.code()))
            })?;
            actual_owners.push(CardOwner { card, owner });
        }

        // 结算
        for CardOwner { card, owner } in &actual_owners {
            if let Some(p) = self.player_mut(*owner) {
                p.take(card);
            }
        }
        let scoring_team = if is_valid { declaring_team } else { declaring_team.opponent() };
        self.scores.award(scoring_team);
        self.declared.push(half_suit);
        if let Some(winner) = self.scores.winner() {
            self.status = RoomStatus::Ended;
            self.winning_team = Some(winner);
        }

        let mut envelopes = vec![Envelope::room(ServerMessage::SetDeclared(DeclarationOutcome {
            declaring_player: declaring,
            declaring_team,
            half_suit,
            declaration: declaration.clone(),
            actual_owners: actual_owners.clone(),
            is_valid,
            scores: self.scores,
            winning_team: self.winning_team,
        }))];
        // 手牌有变化的玩家，按入座顺序各发一条
        for p in &self.players {
            if actual_owners.iter().any(|o| o.owner == p.id) {
                envelopes.push(Envelope::room(ServerMessage::HandUpdated { player_id: p.id, hand: p.hand.clone() }));
            }
        }
        Ok(envelopes)
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use Rank::*;
    use Suit::*;

    fn card(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    // 辅助函数：创建一个已坐满、正在游戏的房间
    fn setup_active_room(seed: u64) -> Room {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut room = Room::new("p0");
        for i in 1..SEATS {
            room.join_with(format!("p{}", i), &mut rng).unwrap();
        }
        room
    }

    // 辅助函数：按座位号手动设置手牌 (没给出的座位为空手)，先手为 0 号座位
    fn setup_room_with_hands(hands: Vec<Vec<Card>>) -> (Room, Vec<PlayerId>) {
        let mut room = setup_active_room(0);
        for (seat, player) in room.players.iter_mut().enumerate() {
            player.hand = hands.get(seat).cloned().unwrap_or_default();
        }
        let ids: Vec<PlayerId> = room.players.iter().map(|p| p.id).collect();
        room.current_turn = Some(ids[0]);
        (room, ids)
    }

    // 把除了某个半套之外的牌平均分给六个人，该半套按给定方式分配
    fn hands_with(half_suit_owner: [usize; 6], half_suit: HalfSuit) -> Vec<Vec<Card>> {
        let mut hands = vec![Vec::new(); SEATS];
        let cards = half_suit.cards();
        for (i, c) in cards.iter().enumerate() {
            hands[half_suit_owner[i]].push(*c);
        }
        let rest: Vec<Card> = full_deck().into_iter().filter(|c| c.half_suit() != half_suit).collect();
        for (i, c) in rest.into_iter().enumerate() {
            hands[i % SEATS].push(c);
        }
        hands
    }

    #[test]
    fn test_join_assigns_alternating_teams_before_activation() {
        let mut room = Room::new("p0");
        let (id1, envelopes) = room.join("p1").unwrap();
        assert_eq!(room.status, RoomStatus::Setup);
        assert_eq!(room.player(id1).unwrap().team, Team::One);
        assert!(envelopes.iter().any(|e| e.audience == Audience::Player(id1)
            && matches!(e.message, ServerMessage::GameStateSnapshot(ref s) if !s.started)));
        assert!(envelopes.iter().any(|e| e.audience == Audience::Room
            && matches!(e.message, ServerMessage::PlayersUpdated { ref players } if players.len() == 2)));

        let (id2, _) = room.join("p2").unwrap();
        assert_eq!(room.player(id2).unwrap().team, Team::Zero);
        assert_eq!(room.cards_in_play(), 0);
    }

    #[test]
    fn test_scenario_a_sixth_join_activates() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut room = Room::new("p0");
        for i in 1..5 {
            room.join_with(format!("p{}", i), &mut rng).unwrap();
        }
        assert_eq!(room.status, RoomStatus::Setup);

        let (_, envelopes) = room.join_with("p5", &mut rng).unwrap();
        assert_eq!(room.status, RoomStatus::Active);
        assert_eq!(room.round, 1);
        assert!(room.players.iter().all(|p| p.hand.len() == HAND_SIZE));

        let turn = room.current_turn.unwrap();
        assert!(room.player(turn).is_some());

        let deliveries: HashSet<PlayerId> = envelopes
            .iter()
            .filter_map(|e| match (e.audience, &e.message) {
                (Audience::Player(id), ServerMessage::HandDelivered { hand }) => {
                    assert_eq!(hand, &room.player(id).unwrap().hand);
                    Some(id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(deliveries.len(), SEATS);

        let started: Vec<_> = envelopes
            .iter()
            .filter(|e| matches!(e.message, ServerMessage::GameStarted { .. }))
            .collect();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0], &Envelope::room(ServerMessage::GameStarted { current_turn: turn }));
    }

    #[test]
    fn test_seventh_join_is_rejected() {
        let mut room = setup_active_room(1);
        let before = room.clone();
        assert_eq!(room.join("late").unwrap_err(), GameError::RoomFull);
        assert_eq!(room, before);
    }

    #[test]
    fn test_scenario_b_miss_passes_turn() {
        let (mut room, ids) = setup_room_with_hands(vec![
            vec![card(Three, Spade)],
            vec![card(Two, Heart)],
        ]);
        let before = room.clone();

        let envelopes = room.ask(ids[0], ids[1], card(Four, Spade)).unwrap();
        assert_eq!(room.current_turn, Some(ids[1]));
        assert_eq!(envelopes, vec![Envelope::room(ServerMessage::TurnChanged { current_turn: ids[1] })]);

        assert_eq!(room.players, before.players);
        assert_eq!(room.scores, before.scores);
    }

    #[test]
    fn test_ask_hit_transfers_and_keeps_turn() {
        let (mut room, ids) = setup_room_with_hands(vec![
            vec![card(Three, Spade)],
            vec![card(Two, Heart), card(Four, Spade)],
        ]);

        let envelopes = room.ask(ids[0], ids[1], card(Four, Spade)).unwrap();
        assert_eq!(room.current_turn, Some(ids[0]));
        assert_eq!(room.players[0].hand, vec![card(Three, Spade), card(Four, Spade)]);
        assert_eq!(room.players[1].hand, vec![card(Two, Heart)]);

        assert_eq!(envelopes.len(), 3);
        assert_eq!(envelopes[0], Envelope::room(ServerMessage::CardTransferred {
            from_player: ids[1],
            to_player: ids[0],
            card: card(Four, Spade),
        }));
        assert!(matches!(envelopes[1].message, ServerMessage::HandUpdated { player_id, .. } if player_id == ids[0]));
        assert!(matches!(envelopes[2].message, ServerMessage::HandUpdated { player_id, .. } if player_id == ids[1]));
    }

    #[test]
    fn test_scenario_c_already_held() {
        let (mut room, ids) = setup_room_with_hands(vec![
            vec![card(Three, Spade)],
            vec![card(Two, Heart)],
        ]);
        let before = room.clone();
        assert_eq!(room.ask(ids[0], ids[1], card(Three, Spade)), Err(GameError::AlreadyHeld));
        assert_eq!(room, before);
    }

    #[test]
    fn test_ask_rejections_leave_room_untouched() {
        let (mut room, ids) = setup_room_with_hands(vec![
            vec![card(Three, Spade)],
            vec![card(Two, Heart)],
            vec![card(Ace, Club)],
        ]);
        let before = room.clone();

        assert_eq!(room.ask(ids[1], ids[0], card(Three, Spade)), Err(GameError::NotYourTurn));
        assert_eq!(room.ask(ids[0], ids[1], card(Two, Heart)), Err(GameError::NoStakeInSet));
        assert_eq!(room.ask(ids[0], ids[2], card(Four, Spade)), Err(GameError::NotAnOpponent));
        assert_eq!(room.ask(ids[0], ids[0], card(Four, Spade)), Err(GameError::NotAnOpponent));
        assert_eq!(room.ask(ids[0], PlayerId::new_v4(), card(Four, Spade)), Err(GameError::PlayerNotFound));
        assert_eq!(room, before);
    }

    #[test]
    fn test_ask_in_setup_room_is_not_your_turn() {
        let mut room = Room::new("p0");
        let (p1, _) = room.join("p1").unwrap();
        let p0 = room.players[0].id;
        assert_eq!(room.ask(p0, p1, card(Two, Spade)), Err(GameError::NotYourTurn));
    }

    #[test]
    fn test_scenario_d_valid_declaration() {
        let hs = HalfSuit::Low(Spade);
        // 0 号座位和 2 号、4 号座位是队友
        let (mut room, ids) = setup_room_with_hands(hands_with([0, 0, 2, 2, 4, 4], hs));
        let cards = hs.cards();
        let declaration = Declaration::new()
            .claim(ids[0], cards[0..2].to_vec())
            .claim(ids[2], cards[2..4].to_vec())
            .claim(ids[4], cards[4..6].to_vec());
        let before_in_play = room.cards_in_play();

        let envelopes = room.declare(ids[0], &declaration).unwrap();
        assert_eq!(room.scores, Scores::new(1, 0));
        assert_eq!(room.cards_in_play(), before_in_play - HALF_SUIT_SIZE);
        assert!(cards.iter().all(|c| room.holder_of(c).is_none()));
        assert_eq!(room.current_turn, Some(ids[0]));
        assert_eq!(room.status, RoomStatus::Active);
        assert_eq!(room.winning_team, None);
        assert_eq!(room.declared, vec![hs]);

        match &envelopes[0].message {
            ServerMessage::SetDeclared(outcome) => {
                assert!(outcome.is_valid);
                assert_eq!(outcome.half_suit, hs);
                assert_eq!(outcome.actual_owners.len(), HALF_SUIT_SIZE);
                assert_eq!(outcome.winning_team, None);
            }
            other => panic!("第一条消息应该是 SetDeclared: {:?}", other),
        }
        let updated: Vec<PlayerId> = envelopes[1..]
            .iter()
            .map(|e| match e.message {
                ServerMessage::HandUpdated { player_id, .. } => player_id,
                _ => panic!("应该是 HandUpdated"),
            })
            .collect();
        assert_eq!(updated, vec![ids[0], ids[2], ids[4]]);
    }

    #[test]
    fn test_scenario_e_card_held_by_opponent() {
        let hs = HalfSuit::High(Heart);
        // 最后一张牌实际在 1 号座位 (对方) 手里
        let (mut room, ids) = setup_room_with_hands(hands_with([0, 0, 2, 2, 4, 1], hs));
        let cards = hs.cards();
        let declaration = Declaration::new()
            .claim(ids[0], cards[0..2].to_vec())
            .claim(ids[2], cards[2..4].to_vec())
            .claim(ids[4], cards[4..6].to_vec());

        let envelopes = room.declare(ids[0], &declaration).unwrap();
        assert_eq!(room.scores, Scores::new(0, 1));
        assert!(cards.iter().all(|c| room.holder_of(c).is_none()));
        assert_eq!(room.current_turn, Some(ids[0]));

        match &envelopes[0].message {
            ServerMessage::SetDeclared(outcome) => {
                assert!(!outcome.is_valid);
                assert!(outcome.actual_owners.contains(&CardOwner { card: cards[5], owner: ids[1] }));
            }
            other => panic!("第一条消息应该是 SetDeclared: {:?}", other),
        }
        assert_eq!(envelopes.len(), 1 + 4);
    }

    #[test]
    fn test_naming_an_opponent_makes_declaration_invalid() {
        let hs = HalfSuit::Eights;
        let (mut room, ids) = setup_room_with_hands(hands_with([0, 0, 1, 1, 1, 1], hs));
        let cards = hs.cards();
        // 点名的持有者都对，但 1 号座位是对手
        let declaration = Declaration::new()
            .claim(ids[0], cards[0..2].to_vec())
            .claim(ids[1], cards[2..6].to_vec());

        let envelopes = room.declare(ids[0], &declaration).unwrap();
        assert_eq!(room.scores, Scores::new(0, 1));
        assert!(matches!(&envelopes[0].message, ServerMessage::SetDeclared(o) if !o.is_valid));
        assert!(cards.iter().all(|c| room.holder_of(c).is_none()));
    }

    #[test]
    fn test_naming_an_opponent_without_cards_still_invalidates() {
        let hs = HalfSuit::Low(Spade);
        let (mut room, ids) = setup_room_with_hands(hands_with([0, 0, 0, 0, 0, 0], hs));
        // 0 号座位确实持有全部 6 张，但额外点名了对手 (没分配牌)
        let declaration = Declaration::new()
            .claim(ids[0], hs.cards())
            .claim(ids[1], Vec::new());

        let envelopes = room.declare(ids[0], &declaration).unwrap();
        assert_eq!(room.scores, Scores::new(0, 1));
        assert!(matches!(&envelopes[0].message, ServerMessage::SetDeclared(o) if !o.is_valid));
        assert!(hs.cards().iter().all(|c| room.holder_of(c).is_none()));
        assert_eq!(room.current_turn, Some(ids[0]));
    }

    #[test]
    fn test_declaration_request_errors_are_pure() {
        let hs = HalfSuit::Low(Club);
        let (mut room, ids) = setup_room_with_hands(hands_with([0, 0, 2, 2, 4, 4], hs));
        let cards = hs.cards();
        let before = room.clone();

        let good = Declaration::new().claim(ids[0], cards.to_vec());
        assert_eq!(room.declare(ids[1], &good), Err(GameError::NotYourTurn));

        let stranger = Declaration::new().claim(PlayerId::new_v4(), cards.to_vec());
        assert_eq!(room.declare(ids[0], &stranger), Err(GameError::PlayerNotFound));

        let short = Declaration::new().claim(ids[0], cards[..5].to_vec());
        assert!(matches!(room.declare(ids[0], &short), Err(GameError::InvalidDeclaration(_))));

        assert_eq!(room, before);
    }

    #[test]
    fn test_redeclaring_a_retired_half_suit() {
        let hs = HalfSuit::Low(Club);
        let (mut room, ids) = setup_room_with_hands(hands_with([0, 0, 2, 2, 4, 4], hs));
        let declaration = Declaration::new().claim(ids[0], hs.cards().to_vec());
        room.declare(ids[0], &declaration).unwrap();

        let before = room.clone();
        assert_eq!(room.declare(ids[0], &declaration), Err(GameError::SetAlreadyDeclared));
        assert_eq!(room, before);
    }

    #[test]
    fn test_scenario_f_fifth_point_ends_game() {
        let hs = HalfSuit::High(Spade);
        let (mut room, ids) = setup_room_with_hands(hands_with([0, 2, 4, 0, 2, 4], hs));
        room.scores = Scores::new(4, 2);
        let cards = hs.cards();
        let declaration = Declaration::new()
            .claim(ids[0], [cards[0], cards[3]])
            .claim(ids[2], [cards[1], cards[4]])
            .claim(ids[4], [cards[2], cards[5]]);

        let envelopes = room.declare(ids[0], &declaration).unwrap();
        assert_eq!(room.status, RoomStatus::Ended);
        assert_eq!(room.winning_team, Some(Team::Zero));
        assert!(matches!(&envelopes[0].message,
            ServerMessage::SetDeclared(o) if o.winning_team == Some(Team::Zero) && o.scores == Scores::new(5, 2)));

        let before = room.clone();
        let other_card = room.players[0].hand[0];
        assert_eq!(room.ask(ids[0], ids[1], other_card), Err(GameError::GameEnded));
        assert_eq!(room.declare(ids[0], &declaration), Err(GameError::GameEnded));
        assert_eq!(room, before);
    }

    #[test]
    fn test_misdeclaration_can_hand_opponents_the_win() {
        let hs = HalfSuit::Low(Diamond);
        let (mut room, ids) = setup_room_with_hands(hands_with([0, 0, 0, 1, 0, 0], hs));
        room.scores = Scores::new(0, 4);
        let declaration = Declaration::new().claim(ids[0], hs.cards().to_vec());

        room.declare(ids[0], &declaration).unwrap();
        assert_eq!(room.status, RoomStatus::Ended);
        assert_eq!(room.winning_team, Some(Team::One));
    }

    // 随机执行一串要牌，检查行动权与牌数守恒
    proptest! {
        #[test]
        fn prop_asks_conserve_cards_and_contain_turn(
            seed in any::<u64>(),
            moves in proptest::collection::vec((0usize..SEATS, 0usize..DECK_SIZE), 1..60),
        ) {
            let mut room = setup_active_room(seed);
            let deck = full_deck();
            let total = room.cards_in_play();
            prop_assert_eq!(total, DECK_SIZE);

            for (target_seat, card_idx) in moves {
                let asking = room.current_turn.unwrap();
                let asked = room.players[target_seat].id;
                let card = deck[card_idx];
                let before = room.clone();

                match room.ask(asking, asked, card) {
                    Ok(_) => {
                        let turn = room.current_turn.unwrap();
                        prop_assert!(turn == asking || turn == asked);
                        prop_assert_eq!(room.scores, before.scores);
                    }
                    Err(_) => prop_assert_eq!(&room, &before),
                }
                prop_assert_eq!(room.cards_in_play(), total);

                let distinct: HashSet<Card> = room.players.iter().flat_map(|p| p.hand.iter().copied()).collect();
                prop_assert_eq!(distinct.len(), total);
            }
        }
    }
}

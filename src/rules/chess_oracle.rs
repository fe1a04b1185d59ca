use chess::{Board, BoardStatus, ChessMove, MoveGen, Piece};
use std::str::FromStr;

use super::{AppliedMove, Color, Outcome, Position, RulesError, RulesOracle};

/// Halfmove clock value at which the 75-move rule ends the game
const SEVENTY_FIVE_MOVE_LIMIT: u32 = 150;

/// Rules oracle backed by the `chess` crate, using FEN positions and
/// coordinate-notation move tokens (`e2e4`, `e7e8q`).
///
/// `Board` does not track the move counters, so the oracle carries the
/// halfmove clock and fullmove number of the FEN itself.
#[derive(Debug, Clone, Default)]
pub struct ChessOracle;

impl ChessOracle {
    pub fn new() -> Self {
        ChessOracle
    }

    fn board(notation: &str) -> Result<Board, RulesError> {
        Board::from_str(notation).map_err(|e| RulesError::Parse(format!("Invalid FEN: {}", e)))
    }

    fn color(color: chess::Color) -> Color {
        match color {
            chess::Color::White => Color::White,
            chess::Color::Black => Color::Black,
        }
    }

    fn legal_moves(board: &Board) -> Vec<ChessMove> {
        MoveGen::new_legal(board).collect()
    }

    /// Halfmove clock and fullmove number; FENs without them start at `0 1`
    fn counters(notation: &str) -> Result<(u32, u32), RulesError> {
        let mut fields = notation.split_whitespace().skip(4);
        let halfmove = match fields.next() {
            Some(field) => field
                .parse()
                .map_err(|_| RulesError::Parse(format!("Invalid halfmove clock: {}", field)))?,
            None => 0,
        };
        let fullmove = match fields.next() {
            Some(field) => field
                .parse()
                .map_err(|_| RulesError::Parse(format!("Invalid fullmove number: {}", field)))?,
            None => 1,
        };
        Ok((halfmove, fullmove))
    }

    /// FEN of `board` with the given counters in place of the crate's `0 1`
    fn notation(board: &Board, halfmove: u32, fullmove: u32) -> String {
        let fen = board.to_string();
        let placement: Vec<&str> = fen.split_whitespace().take(4).collect();
        format!("{} {} {}", placement.join(" "), halfmove, fullmove)
    }

    /// Bare kings, or a lone knight or bishop against a bare king
    fn insufficient_material(board: &Board) -> bool {
        let others = *board.combined() & !*board.pieces(Piece::King);
        match others.popcnt() {
            0 => true,
            1 => (*board.pieces(Piece::Knight) | *board.pieces(Piece::Bishop)).popcnt() == 1,
            _ => false,
        }
    }
}

impl RulesOracle for ChessOracle {
    fn starting_position(&self) -> String {
        format!("{}", Board::default())
    }

    fn parse(&self, notation: &str) -> Result<Position, RulesError> {
        let board = Self::board(notation)?;
        Self::counters(notation)?;
        Ok(Position {
            notation: notation.to_string(),
            turn: Self::color(board.side_to_move()),
            legal_moves: Self::legal_moves(&board)
                .into_iter()
                .map(|m| m.to_string())
                .collect(),
        })
    }

    fn apply(&self, position: &Position, token: &str) -> Result<AppliedMove, RulesError> {
        let board = Self::board(&position.notation)?;
        let chess_move = Self::legal_moves(&board)
            .into_iter()
            .find(|m| m.to_string() == token)
            .ok_or_else(|| RulesError::IllegalMove(token.to_string()))?;

        let (halfmove, fullmove) = Self::counters(&position.notation)?;
        let resets_clock = board.piece_on(chess_move.get_source()) == Some(Piece::Pawn)
            || board.piece_on(chess_move.get_dest()).is_some();
        let halfmove = if resets_clock { 0 } else { halfmove.saturating_add(1) };
        let fullmove = match board.side_to_move() {
            chess::Color::Black => fullmove.saturating_add(1),
            chess::Color::White => fullmove,
        };

        let next = board.make_move_new(chess_move);
        let mover = Self::color(board.side_to_move());
        let outcome = match next.status() {
            // The side that just moved delivered mate
            BoardStatus::Checkmate => Some(Outcome::win_for(mover)),
            BoardStatus::Stalemate => Some(Outcome::Draw),
            BoardStatus::Ongoing
                if Self::insufficient_material(&next) || halfmove >= SEVENTY_FIVE_MOVE_LIMIT =>
            {
                Some(Outcome::Draw)
            }
            BoardStatus::Ongoing => None,
        };

        Ok(AppliedMove {
            notation: Self::notation(&next, halfmove, fullmove),
            turn: Self::color(next.side_to_move()),
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOLS_MATE_SETUP: &str =
        "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2";

    #[test]
    fn test_starting_position_has_twenty_moves() {
        let oracle = ChessOracle::new();
        let position = oracle.parse(&oracle.starting_position()).unwrap();

        assert_eq!(position.turn, Color::White);
        assert_eq!(position.legal_moves.len(), 20);
        assert!(position.is_legal("e2e4"));
        assert!(position.is_legal("g1f3"));
        assert!(!position.is_legal("e2e5"));
    }

    #[test]
    fn test_apply_flips_turn_and_changes_notation() {
        let oracle = ChessOracle::new();
        let position = oracle.parse(&oracle.starting_position()).unwrap();
        let applied = oracle.apply(&position, "e2e4").unwrap();

        assert_eq!(applied.turn, Color::Black);
        assert_eq!(applied.outcome, None);
        assert_ne!(applied.notation, position.notation);
        assert!(oracle.parse(&applied.notation).is_ok());
    }

    #[test]
    fn test_every_legal_move_yields_a_distinct_position() {
        let oracle = ChessOracle::new();
        let position = oracle.parse(&oracle.starting_position()).unwrap();

        for token in &position.legal_moves {
            let applied = oracle.apply(&position, token).unwrap();
            let reparsed = oracle.parse(&applied.notation).unwrap();
            assert_ne!(reparsed.notation, position.notation, "move {}", token);
        }
    }

    #[test]
    fn test_checkmate_is_a_win_for_the_mover() {
        let oracle = ChessOracle::new();
        let position = oracle.parse(FOOLS_MATE_SETUP).unwrap();
        let applied = oracle.apply(&position, "d8h4").unwrap();

        assert_eq!(applied.outcome, Some(Outcome::BlackWin));
    }

    #[test]
    fn test_stalemate_is_a_draw() {
        let oracle = ChessOracle::new();
        // White queen to g6 leaves the black king on h8 with no moves
        let position = oracle.parse("7k/8/5K2/8/8/8/8/6Q1 w - - 0 1").unwrap();
        let applied = oracle.apply(&position, "g1g6").unwrap();

        assert_eq!(applied.outcome, Some(Outcome::Draw));
    }

    #[test]
    fn test_promotion_token_includes_piece() {
        let oracle = ChessOracle::new();
        let position = oracle.parse("8/P7/8/8/8/8/8/K6k w - - 0 1").unwrap();

        assert!(position.is_legal("a7a8q"));
        assert!(!position.is_legal("a7a8"));
        let applied = oracle.apply(&position, "a7a8q").unwrap();
        assert!(applied.notation.contains('Q'));
    }

    #[test]
    fn test_corrupt_notation_is_a_parse_error() {
        let oracle = ChessOracle::new();
        assert!(matches!(oracle.parse("not a position"), Err(RulesError::Parse(_))));
        assert!(matches!(
            oracle.parse("7k/8/8/8/8/8/8/K7 w - - x 1"),
            Err(RulesError::Parse(_))
        ));
    }

    #[test]
    fn test_move_counters_are_carried_forward() {
        let oracle = ChessOracle::new();
        let position = oracle
            .parse("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 7 30")
            .unwrap();

        // Knight move by black: clock ticks, fullmove advances
        let applied = oracle.apply(&position, "g8f6").unwrap();
        assert!(applied.notation.ends_with(" 8 31"), "{}", applied.notation);

        // White knight move: clock ticks, fullmove stays
        let after = oracle.apply(&oracle.parse(&applied.notation).unwrap(), "g1f3").unwrap();
        assert!(after.notation.ends_with(" 9 31"), "{}", after.notation);

        // Pawn move resets the clock
        let pawn = oracle.apply(&position, "e7e5").unwrap();
        assert!(pawn.notation.ends_with(" 0 31"), "{}", pawn.notation);
    }

    #[test]
    fn test_capture_resets_halfmove_clock() {
        let oracle = ChessOracle::new();
        let position = oracle.parse("4k3/8/8/8/8/8/1r6/KR6 w - - 40 60").unwrap();
        let applied = oracle.apply(&position, "b1b2").unwrap();
        assert!(applied.notation.ends_with(" 0 60"), "{}", applied.notation);
        assert_eq!(applied.outcome, None);
    }

    #[test]
    fn test_bare_kings_is_a_draw() {
        let oracle = ChessOracle::new();
        let position = oracle.parse("8/8/8/8/8/8/1r6/K6k w - - 0 1").unwrap();
        let applied = oracle.apply(&position, "a1b2").unwrap();

        assert_eq!(applied.outcome, Some(Outcome::Draw));
    }

    #[test]
    fn test_lone_minor_piece_is_a_draw() {
        let oracle = ChessOracle::new();
        let position = oracle.parse("8/8/8/8/8/8/1r6/KN5k w - - 0 1").unwrap();
        let applied = oracle.apply(&position, "a1b2").unwrap();

        assert_eq!(applied.outcome, Some(Outcome::Draw));
    }

    #[test]
    fn test_seventy_five_move_rule_is_a_draw() {
        let oracle = ChessOracle::new();
        let position = oracle.parse("7k/8/8/8/8/8/8/KR6 w - - 149 120").unwrap();
        let applied = oracle.apply(&position, "b1b2").unwrap();
        assert_eq!(applied.outcome, Some(Outcome::Draw));

        let position = oracle.parse("7k/8/8/8/8/8/8/KR6 w - - 148 120").unwrap();
        assert_eq!(oracle.apply(&position, "b1b2").unwrap().outcome, None);
    }

    #[test]
    fn test_illegal_token_rejected() {
        let oracle = ChessOracle::new();
        let position = oracle.parse(&oracle.starting_position()).unwrap();
        assert_eq!(
            oracle.apply(&position, "E2E4"),
            Err(RulesError::IllegalMove("E2E4".to_string()))
        );
    }
}

//! Elo rating calculation for a single rating pool

use crate::constants::K_FACTOR;
use crate::rules::Outcome;

/// Expected score of a player rated `rating` against `opponent_rating`
pub fn expected_score(rating: i32, opponent_rating: i32) -> f64 {
    1.0 / (1.0 + 10_f64.powf((opponent_rating - rating) as f64 / 400.0))
}

/// Actual scores (white, black) for a finished game
pub fn actual_scores(outcome: Outcome) -> (f64, f64) {
    match outcome {
        Outcome::WhiteWin => (1.0, 0.0),
        Outcome::BlackWin => (0.0, 1.0),
        Outcome::Draw => (0.5, 0.5),
    }
}

/// Updated rating after scoring `actual` against an opponent
pub fn updated_rating(rating: i32, opponent_rating: i32, actual: f64) -> i32 {
    let expected = expected_score(rating, opponent_rating);
    (rating as f64 + K_FACTOR * (actual - expected)).round() as i32
}

/// Compute both players' new ratings from their current ones and the outcome.
///
/// Returns `(white, black)`. Both values are derived from the same pair of
/// inputs, so callers must read and write the two ratings together.
pub fn calculate_new_ratings(white: i32, black: i32, outcome: Outcome) -> (i32, i32) {
    let (white_score, black_score) = actual_scores(outcome);
    (
        updated_rating(white, black, white_score),
        updated_rating(black, white, black_score),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_ratings_draw_is_unchanged() {
        assert_eq!(calculate_new_ratings(1000, 1000, Outcome::Draw), (1000, 1000));
    }

    #[test]
    fn test_equal_ratings_white_win() {
        assert_eq!(calculate_new_ratings(1000, 1000, Outcome::WhiteWin), (1016, 984));
        assert_eq!(calculate_new_ratings(1000, 1000, Outcome::BlackWin), (984, 1016));
    }

    #[test]
    fn test_expected_score_symmetry() {
        let higher = expected_score(1400, 1200);
        let lower = expected_score(1200, 1400);
        assert!(higher > 0.5);
        assert!(lower < 0.5);
        assert!((higher + lower - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_upset_moves_more_points() {
        let (underdog, favourite) = calculate_new_ratings(1200, 1600, Outcome::WhiteWin);
        assert_eq!(underdog, 1229);
        assert_eq!(favourite, 1571);

        let (favourite, underdog) = calculate_new_ratings(1600, 1200, Outcome::WhiteWin);
        assert_eq!(favourite, 1603);
        assert_eq!(underdog, 1197);
    }

    #[test]
    fn test_draw_pulls_ratings_together() {
        let (low, high) = calculate_new_ratings(1200, 1600, Outcome::Draw);
        assert!(low > 1200);
        assert!(high < 1600);
    }
}

//! 文字列の類似度スコア
//!
//! Character-walk scoring: every character of the candidate is searched in the
//! reference (case-insensitive, left to right). Consecutive hits, word starts and
//! matching case earn a bonus; misses cost a penalty scaled by `fuzziness`.

/// Score for a hit directly after the previous one (or at the very start).
const CONSECUTIVE_BONUS: f64 = 0.7;
/// Score for a hit that skipped characters.
const SKIPPED_SCORE: f64 = 0.1;
/// Extra score when the hit starts a new word.
const WORD_START_BONUS: f64 = 0.8;
/// Extra score when the hit has the same case.
const SAME_CASE_BONUS: f64 = 0.1;
/// Added when the first characters agree and the score is still below the ceiling.
const FIRST_CHAR_BONUS: f64 = 0.15;
const FIRST_CHAR_CEILING: f64 = 0.85;

/// Scores how well `candidate` matches `reference`.
///
/// Returns a value in `[0, 1]`. Identical strings score exactly `1`; an empty
/// string against a non-empty one scores `0`.
///
/// `fuzziness` is clamped to `[0, 1]`. With `0` any candidate character missing
/// from the reference makes the score `0`; with larger values a miss only
/// divides the final score by an accumulated `1 - fuzziness` penalty.
#[must_use]
pub fn score(reference: &str, candidate: &str, fuzziness: f64) -> f64 {
    if reference == candidate {
        return 1.0;
    }
    if reference.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let fuzziness = if fuzziness.is_nan() { 0.0 } else { fuzziness.clamp(0.0, 1.0) };
    let fuzzy_factor = 1.0 - fuzziness;

    let reference: Vec<char> = reference.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    let lower_reference: Vec<char> = reference.iter().map(|&c| fold_case(c)).collect();

    let mut running_score = 0.0;
    let mut penalty = 1.0;
    let mut start_at = 0;

    for &ch in &candidate {
        let lower = fold_case(ch);
        let found = lower_reference
            .get(start_at..)
            .and_then(|rest| rest.iter().position(|&c| c == lower))
            .map(|offset| start_at + offset);

        let Some(index) = found else {
            if fuzziness > 0.0 {
                penalty += fuzzy_factor;
                continue;
            }
            return 0.0;
        };

        let mut char_score = if index == start_at {
            CONSECUTIVE_BONUS
        } else {
            let after_space = index.checked_sub(1).and_then(|i| reference.get(i)) == Some(&' ');
            if after_space { SKIPPED_SCORE + WORD_START_BONUS } else { SKIPPED_SCORE }
        };

        if reference.get(index) == Some(&ch) {
            char_score += SAME_CASE_BONUS;
        }

        running_score += char_score;
        start_at = index + 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let (reference_len, candidate_len) = (reference.len() as f64, candidate.len() as f64);
    let mut final_score =
        0.5 * (running_score / reference_len + running_score / candidate_len) / penalty;

    let first_chars_agree = lower_reference.first() == candidate.first().map(|&c| fold_case(c)).as_ref();
    if first_chars_agree && final_score < FIRST_CHAR_CEILING {
        final_score += FIRST_CHAR_BONUS;
    }

    final_score.clamp(0.0, 1.0)
}

/// Lowercases a single character, keeping one character per input character.
fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain("Belgium", 0.5)]
    #[case::spaces("United Kingdom", 0.9)]
    #[case::no_fuzziness("Peru", 0.0)]
    #[case::over_one("Chad", 3.0)]
    #[case::empty("", 0.5)]
    #[case::unicode("Côte d'Ivoire", 0.5)]
    fn identical_strings_score_one(#[case] text: &str, #[case] fuzziness: f64) {
        assert_that!(score(text, text, fuzziness), eq(1.0));
    }

    #[rstest]
    #[case::empty_candidate("Belgium", "")]
    #[case::empty_reference("", "Belgium")]
    fn empty_against_non_empty_scores_zero(#[case] reference: &str, #[case] candidate: &str) {
        assert_that!(score(reference, candidate, 0.5), eq(0.0));
    }

    #[rstest]
    #[case("Great Britain", "great britain")]
    #[case("Great Britain", "Great Britian")]
    #[case("Great Britain", "The Bahamas")]
    #[case("Netherlands", "Holland")]
    #[case("a", "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzz")]
    #[case("United States", "US")]
    #[case("Ireland", "Iceland")]
    fn score_is_always_in_unit_range(#[case] reference: &str, #[case] candidate: &str) {
        for fuzziness in [0.0, 0.1, 0.5, 0.9, 1.0] {
            let value = score(reference, candidate, fuzziness);
            assert_that!(value, ge(0.0));
            assert_that!(value, le(1.0));
        }
    }

    #[rstest]
    fn typo_scores_above_great_britain_threshold() {
        assert_that!(score("Great Britain", "Great Britian", 0.9), gt(0.7));
    }

    #[rstest]
    fn unrelated_name_scores_low() {
        assert_that!(score("Great Britain", "The Bahamas", 0.9), lt(0.2));
    }

    #[rstest]
    fn case_difference_scores_below_one() {
        let value = score("Great Britain", "great britain", 0.5);

        assert_that!(value, lt(1.0));
        assert_that!(value, gt(0.7));
    }

    #[rstest]
    fn closer_candidate_ranks_higher() {
        let close = score("Germany", "Germny", 0.5);
        let far = score("Germany", "Gambia", 0.5);

        assert_that!(close, gt(far));
    }

    #[rstest]
    fn missing_character_without_fuzziness_scores_zero() {
        assert_that!(score("Peru", "Perx", 0.0), eq(0.0));
    }

    #[rstest]
    fn higher_fuzziness_softens_misses() {
        let strict = score("Germany", "Germxny", 0.1);
        let lenient = score("Germany", "Germxny", 0.9);

        assert_that!(lenient, gt(strict));
    }

    #[rstest]
    fn nan_fuzziness_behaves_like_zero() {
        assert_that!(score("Peru", "Perx", f64::NAN), eq(0.0));
        assert_that!(score("Peru", "Per", f64::NAN), gt(0.0));
    }
}

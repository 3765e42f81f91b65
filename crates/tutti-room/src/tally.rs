//! Vote tally: turns one target's answers and their peers' ballots into a
//! verdict per category and a score.
//!
//! Pure and deterministic: the same inputs always give the same output,
//! whatever order the ballots arrived in.

use std::collections::BTreeMap;

use tutti_protocol::{AnswerSheet, Ballot, CategoryVerdict, PlayerId};

/// Points awarded for each category judged valid.
pub const POINTS_PER_VALID_CATEGORY: u32 = 10;

/// The outcome of one ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// One entry per category, in category order.
    pub verdicts: Vec<CategoryVerdict>,
    /// Points the target earns this round.
    pub score: u32,
}

impl Tally {
    /// Category → valid, the shape kept on the player and in history.
    pub fn validations(&self) -> BTreeMap<String, bool> {
        self.verdicts
            .iter()
            .map(|v| (v.category.clone(), v.valid))
            .collect()
    }
}

/// Judges `target`'s answers against the ballots in `votes`.
///
/// Per category:
/// - a blank or missing word is invalid, whatever the votes say;
/// - the target's own ballot is ignored;
/// - with nobody else voting the word is valid;
/// - otherwise it needs a strict majority of the counted voters.
///
/// A voter who left a category out of their ballot counts as voting
/// against it.
pub fn tally(
    categories: &[String],
    answers: Option<&AnswerSheet>,
    votes: &BTreeMap<PlayerId, Ballot>,
    target: &PlayerId,
) -> Tally {
    let mut verdicts = Vec::with_capacity(categories.len());
    let mut score = 0;

    for category in categories {
        let word = answers
            .and_then(|sheet| sheet.get(category))
            .map(|w| w.trim())
            .filter(|w| !w.is_empty());

        let mut votes_for = 0u32;
        let mut total = 0u32;
        for (voter, ballot) in votes {
            if voter == target {
                continue;
            }
            total += 1;
            if ballot.get(category).copied().unwrap_or(false) {
                votes_for += 1;
            }
        }

        let valid = match word {
            None => false,
            Some(_) if total == 0 => true,
            Some(_) => votes_for * 2 > total,
        };
        if valid {
            score += POINTS_PER_VALID_CATEGORY;
        }

        verdicts.push(CategoryVerdict {
            category: category.clone(),
            word: word.map(str::to_owned),
            valid,
            votes_for,
            votes_against: total - votes_for,
        });
    }

    Tally { verdicts, score }
}

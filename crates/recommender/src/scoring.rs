//! Scoring strategies over a catalog view
//!
//! Every strategy returns a new ranked list and leaves its inputs untouched.
//! Ranking is a stable descending sort, so ties keep the view's order.

use crate::catalog::CatalogView;
use crate::error::{RecommendError, Result};
use crate::similarity::SimilarityMatrix;
use crate::types::{Game, Recommendation, RecommendationType};
use std::collections::HashSet;
use tracing::debug;

/// Top-N games by `rating * ln(1 + ratings_count)`
pub fn top_quality(view: &CatalogView<'_>, n: usize) -> Vec<Recommendation> {
    let scored = view.iter().map(|game| (game, game.quality_score())).collect();
    rank(scored, n, RecommendationType::TopQuality)
}

/// Top-N games by the share of `tags` they carry; non-matching games are
/// dropped entirely.
///
/// Fails with `InvalidArgument` when `tags` is empty.
pub fn by_tags<S: AsRef<str>>(
    view: &CatalogView<'_>,
    tags: &[S],
    n: usize,
) -> Result<Vec<Recommendation>> {
    let requested: HashSet<&str> = tags.iter().map(|tag| tag.as_ref()).collect();
    if requested.is_empty() {
        return Err(RecommendError::InvalidArgument(
            "at least one tag must be requested".to_string(),
        ));
    }

    let denominator = requested.len() as f32;
    let scored = view
        .iter()
        .filter_map(|game| {
            let matched = game
                .tags
                .iter()
                .filter(|tag| requested.contains(tag.as_str()))
                .count();
            (matched > 0).then(|| (game, matched as f32 / denominator))
        })
        .collect();
    Ok(rank(scored, n, RecommendationType::TagMatch))
}

/// Blend of content similarity to `reference` and view-normalized quality:
/// `alpha * sim + (1 - alpha) * quality`.
///
/// The reference game never appears in the result.
pub fn hybrid(
    view: &CatalogView<'_>,
    similarity: &SimilarityMatrix,
    reference: &str,
    n: usize,
    alpha: f32,
) -> Result<Vec<Recommendation>> {
    if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
        return Err(RecommendError::InvalidArgument(format!(
            "alpha must be within [0, 1], got {alpha}"
        )));
    }

    let mut matches = view.iter().filter(|game| game.name == reference);
    let reference_game = matches
        .next()
        .ok_or_else(|| RecommendError::not_found(reference))?;
    let duplicates = matches.count();
    if duplicates > 0 {
        return Err(RecommendError::InvalidArgument(format!(
            "reference name '{reference}' matches {} games",
            duplicates + 1
        )));
    }

    let (min, max) = view
        .iter()
        .map(Game::quality_score)
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), q| {
            (lo.min(q), hi.max(q))
        });
    let range = max - min;

    let mut scored = Vec::with_capacity(view.len());
    for game in view.iter() {
        if game.id == reference_game.id {
            continue;
        }
        let sim = similarity
            .get(reference_game.id, game.id)
            .ok_or_else(|| RecommendError::not_found(format!("game id {}", game.id)))?;
        let quality = if range > 0.0 {
            (game.quality_score() - min) / range
        } else {
            0.0
        };
        scored.push((game, alpha * sim + (1.0 - alpha) * quality));
    }

    debug!(
        reference,
        alpha,
        candidates = scored.len(),
        "Hybrid candidates scored"
    );
    Ok(rank(scored, n, RecommendationType::Hybrid))
}

fn rank(
    mut scored: Vec<(&Game, f32)>,
    n: usize,
    strategy: RecommendationType,
) -> Vec<Recommendation> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(n)
        .map(|(game, score)| Recommendation::new(game, score, strategy))
        .collect()
}

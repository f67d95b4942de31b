//! Recommendation merge: mandatory photos plus AI picks under a fixed cap.
//!
//! The scorer call itself happens outside this module: [`plan_recommendation`]
//! builds the descriptors from the store, the caller runs the scorer with a
//! timeout, and [`merge_recommendation`] folds whatever came back (or nothing)
//! into the final id list.

use std::collections::HashSet;

use rusqlite::Connection;

use super::photos::get_photo;
use crate::error::DiaryResult;
use crate::ports::ScoringDescriptor;

/// Everything the scorer needs, plus the fallback answer.
#[derive(Debug, Default)]
pub struct RecommendationPlan {
    pub descriptors: Vec<ScoringDescriptor>,
    /// Mandatory ids that survived the ownership filter, in caller order.
    pub mandatory: Vec<i64>,
}

impl RecommendationPlan {
    /// Nothing uploaded by the caller matched.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.mandatory.is_empty()
    }

    /// `false` when there is nothing for the scorer to look at; the mandatory
    /// set is then the whole answer.
    pub fn needs_scorer(&self) -> bool {
        !self.descriptors.is_empty()
    }
}

/// Load the caller's photos among `uploaded_ids` and describe them for the scorer.
///
/// Mandatory ids that are not among the loaded photos are dropped.
pub fn plan_recommendation(
    conn: &Connection,
    owner_id: i64,
    uploaded_ids: &[i64],
    mandatory_ids: &[i64],
) -> DiaryResult<RecommendationPlan> {
    let mut seen = HashSet::new();
    let mut photos = Vec::new();
    for &id in uploaded_ids {
        if !seen.insert(id) {
            continue;
        }
        if let Some(photo) = get_photo(conn, id)? {
            if photo.owner_id == owner_id {
                photos.push(photo);
            }
        }
    }

    if photos.is_empty() {
        return Ok(RecommendationPlan::default());
    }

    let loaded: HashSet<i64> = photos.iter().map(|p| p.id).collect();
    let mut mandatory = Vec::new();
    for &id in mandatory_ids {
        if loaded.contains(&id) && !mandatory.contains(&id) {
            mandatory.push(id);
        }
    }

    let descriptors = photos
        .into_iter()
        .map(|photo| ScoringDescriptor {
            is_mandatory: mandatory.contains(&photo.id),
            id: photo.id,
            url: photo.url,
            captured_at: photo.captured_at,
            resolved_location: photo.location,
        })
        .collect();

    Ok(RecommendationPlan {
        descriptors,
        mandatory,
    })
}

/// Union mandatory ids with the scorer's picks and cap the result.
///
/// `scored` is `None` when the scorer failed or timed out; the answer is then
/// the mandatory set alone. Scorer ids outside the plan are ignored. Mandatory
/// ids come first, then scorer ids in the order returned, so truncation always
/// keeps the caller's picks.
pub fn merge_recommendation(plan: &RecommendationPlan, scored: Option<Vec<i64>>, cap: usize) -> Vec<i64> {
    let known: HashSet<i64> = plan.descriptors.iter().map(|d| d.id).collect();
    let mut result: Vec<i64> = Vec::with_capacity(cap);

    let candidates = plan
        .mandatory
        .iter()
        .copied()
        .chain(scored.unwrap_or_default().into_iter().filter(|id| known.contains(id)));

    for id in candidates {
        if result.len() == cap {
            break;
        }
        if !result.contains(&id) {
            result.push(id);
        }
    }

    result
}

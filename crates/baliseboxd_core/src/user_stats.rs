//! crates/baliseboxd_core/src/user_stats.rs
//!
//! Pure aggregation of the statistics block a profile page shows for one
//! user: how many parties they were part of, how many comments they
//! wrote, the average rating they gave and its distribution, plus the
//! top-rated and recently-attended party lists.
//!
//! Every function takes the subject `user_id` explicitly; there is no
//! ambient "current user". All functions are idempotent over their
//! inputs, so they can be re-run on every snapshot without memoization.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::{Comment, Party};
use crate::ratings::{self, RatingBucket, RatingScale};

//=========================================================================================
// Relevance Selection
//=========================================================================================

/// The parties a user has touched in any role: created, participated in,
/// or rated. The union is deduplicated by id, preserving the first
/// occurrence's position in the fetch order.
pub fn relevant_parties(all_parties: &[Party], user_id: Uuid) -> Vec<&Party> {
    let mut seen = HashSet::new();
    all_parties
        .iter()
        .filter(|party| {
            party.created_by == user_id
                || party.participants.contains(&user_id)
                || party.ratings.contains_key(&user_id)
        })
        .filter(|party| seen.insert(party.id))
        .collect()
}

/// Parties the user created or attended. Rating-only relevance is
/// deliberately excluded from this count, unlike the rating statistics
/// below which cover every rated party.
pub fn party_count(relevant: &[&Party], user_id: Uuid) -> usize {
    relevant
        .iter()
        .filter(|party| party.created_by == user_id || party.participants.contains(&user_id))
        .count()
}

/// Comments authored by the user.
pub fn comment_count(comments: &[Comment], user_id: Uuid) -> usize {
    comments
        .iter()
        .filter(|comment| comment.user_id == user_id)
        .count()
}

//=========================================================================================
// Ratings Given
//=========================================================================================

fn ratings_given<'a>(relevant: &'a [&'a Party], user_id: Uuid) -> impl Iterator<Item = f64> + 'a {
    relevant
        .iter()
        .filter_map(move |party| party.ratings.get(&user_id).copied())
        .filter(|value| value.is_finite())
}

/// Mean of the ratings this user gave across the relevant parties.
/// Parties the user did not rate are excluded from the divisor; a user
/// who rated nothing gets `0.0`.
pub fn average_rating_given(relevant: &[&Party], user_id: Uuid) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u32;
    for value in ratings_given(relevant, user_id) {
        sum += value;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

/// Histogram of the ratings this user gave (not the ratings their
/// parties received), bucketed exactly like the per-party distribution.
pub fn rating_given_distribution(
    relevant: &[&Party],
    user_id: Uuid,
    scale: &RatingScale,
) -> Vec<RatingBucket> {
    ratings::distribution_of(ratings_given(relevant, user_id), scale)
}

//=========================================================================================
// Ranked Party Lists
//=========================================================================================

/// The parties this user rated highest, descending by the user's own
/// rating, truncated to `limit`. The sort is stable, so equal ratings
/// keep the fetch order (descending creation time) as the tie-break.
pub fn top_rated_by_user<'a>(
    relevant: &[&'a Party],
    user_id: Uuid,
    limit: usize,
) -> Vec<&'a Party> {
    let mut rated: Vec<(&Party, f64)> = relevant
        .iter()
        .filter_map(|party| {
            party
                .ratings
                .get(&user_id)
                .copied()
                .filter(|value| value.is_finite())
                .map(|value| (*party, value))
        })
        .collect();
    rated.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    rated.into_iter().take(limit).map(|(party, _)| party).collect()
}

/// The parties this user attended, most recent event date first,
/// truncated to `limit`. A party with no date sorts as the minimum
/// instant, i.e. to the end, rather than being an error.
pub fn recent_participated<'a>(
    relevant: &[&'a Party],
    user_id: Uuid,
    limit: usize,
) -> Vec<&'a Party> {
    let mut attended: Vec<&Party> = relevant
        .iter()
        .copied()
        .filter(|party| party.participants.contains(&user_id))
        .collect();
    attended.sort_by_key(|party| Reverse(party.date.unwrap_or(DateTime::<Utc>::MIN_UTC)));
    attended.into_iter().take(limit).collect()
}

//=========================================================================================
// Profile Statistics Block
//=========================================================================================

/// The derived figures a profile view renders. Never persisted; always
/// recomputed from the raw records at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileStats {
    pub party_count: usize,
    pub comment_count: usize,
    pub average_rating_given: f64,
    pub rating_given_distribution: Vec<RatingBucket>,
}

/// Computes the whole statistics block in one pass over the collections.
pub fn profile_stats(
    all_parties: &[Party],
    comments: &[Comment],
    user_id: Uuid,
    scale: &RatingScale,
) -> ProfileStats {
    let relevant = relevant_parties(all_parties, user_id);
    ProfileStats {
        party_count: party_count(&relevant, user_id),
        comment_count: comment_count(comments, user_id),
        average_rating_given: average_rating_given(&relevant, user_id),
        rating_given_distribution: rating_given_distribution(&relevant, user_id, scale),
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn party(created_by: Uuid) -> Party {
        Party {
            id: Uuid::new_v4(),
            name: "soiree".to_string(),
            description: String::new(),
            location: String::new(),
            date: None,
            created_at: Utc::now(),
            created_by,
            creator_email: String::new(),
            participants: Vec::new(),
            ratings: HashMap::new(),
            cover_photo_url: None,
            media_urls: Vec::new(),
        }
    }

    fn comment(user_id: Uuid) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            party_id: Uuid::new_v4(),
            user_id,
            text: "super".to_string(),
            posted_at: Utc::now(),
            email: None,
            avatar_url: None,
        }
    }

    #[test]
    fn relevance_is_the_union_of_all_three_roles() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        let created = party(user);
        let mut attended = party(other);
        attended.participants.push(user);
        let mut rated = party(other);
        rated.ratings.insert(user, 3.5);
        let unrelated = party(other);

        let all = vec![created, attended, rated, unrelated];
        let relevant = relevant_parties(&all, user);
        assert_eq!(relevant.len(), 3);
    }

    #[test]
    fn a_party_touched_in_several_roles_is_counted_once() {
        let user = Uuid::new_v4();
        let mut p = party(user);
        p.participants.push(user);
        p.ratings.insert(user, 4.0);

        let all = vec![p];
        assert_eq!(relevant_parties(&all, user).len(), 1);
    }

    #[test]
    fn party_count_excludes_rating_only_relevance() {
        // The user created and attends E1 but only rated E2: the party
        // count covers E1 alone, while the rating statistics cover both.
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut e1 = party(user);
        e1.participants.push(user);
        e1.ratings.insert(user, 4.0);
        let mut e2 = party(other);
        e2.ratings.insert(user, 2.0);

        let all = vec![e1, e2];
        let relevant = relevant_parties(&all, user);

        assert_eq!(party_count(&relevant, user), 1);
        assert_eq!(average_rating_given(&relevant, user), 3.0);
    }

    #[test]
    fn average_given_is_zero_when_the_user_rated_nothing() {
        let user = Uuid::new_v4();
        let all = vec![party(user)];
        let relevant = relevant_parties(&all, user);
        assert_eq!(average_rating_given(&relevant, user), 0.0);
    }

    #[test]
    fn given_distribution_buckets_the_users_own_ratings() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut p = party(other);
        p.ratings.insert(user, 2.5);
        // Another rater's score must not leak into the user's histogram.
        p.ratings.insert(other, 5.0);

        let all = vec![p];
        let relevant = relevant_parties(&all, user);
        let dist = rating_given_distribution(&relevant, user, &RatingScale::HALF_STARS);

        let total: u32 = dist.iter().map(|bucket| bucket.votes).sum();
        assert_eq!(total, 1);
        let hit = dist.iter().find(|bucket| bucket.value == 2.5).unwrap();
        assert_eq!(hit.votes, 1);
    }

    #[test]
    fn stats_are_idempotent_over_the_same_input() {
        let user = Uuid::new_v4();
        let mut p = party(user);
        p.participants.push(user);
        p.ratings.insert(user, 3.5);
        let all = vec![p];
        let comments = vec![comment(user), comment(Uuid::new_v4())];

        let first = profile_stats(&all, &comments, user, &RatingScale::HALF_STARS);
        let second = profile_stats(&all, &comments, user, &RatingScale::HALF_STARS);
        assert_eq!(first, second);
    }

    #[test]
    fn comment_count_filters_by_author() {
        let user = Uuid::new_v4();
        let comments = vec![comment(user), comment(user), comment(Uuid::new_v4())];
        assert_eq!(comment_count(&comments, user), 2);
    }

    #[test]
    fn top_rated_truncates_and_sorts_descending() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut all = Vec::new();
        for i in 0..6 {
            let mut p = party(other);
            p.ratings.insert(user, 0.5 + i as f64 * 0.5);
            all.push(p);
        }
        // A party the user never rated must not appear at all.
        all.push(party(other));

        let relevant = relevant_parties(&all, user);
        let top = top_rated_by_user(&relevant, user, 4);

        assert_eq!(top.len(), 4);
        let scores: Vec<f64> = top.iter().map(|p| p.ratings[&user]).collect();
        assert_eq!(scores, vec![3.0, 2.5, 2.0, 1.5]);
    }

    #[test]
    fn recent_participated_sorts_undated_parties_last() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut oldest = party(other);
        oldest.participants.push(user);
        oldest.date = Some(Utc.with_ymd_and_hms(2023, 1, 1, 20, 0, 0).unwrap());

        let mut newest = party(other);
        newest.participants.push(user);
        newest.date = Some(Utc.with_ymd_and_hms(2025, 6, 15, 21, 30, 0).unwrap());

        let mut undated = party(other);
        undated.participants.push(user);

        let mut not_attending = party(other);
        not_attending.ratings.insert(user, 5.0);
        not_attending.date = Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());

        let all = vec![oldest.clone(), newest.clone(), undated.clone(), not_attending];
        let relevant = relevant_parties(&all, user);
        let recent = recent_participated(&relevant, user, 10);

        let ids: Vec<Uuid> = recent.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newest.id, oldest.id, undated.id]);
    }

    #[test]
    fn recent_participated_respects_the_limit() {
        let user = Uuid::new_v4();
        let mut all = Vec::new();
        for day in 1..=5 {
            let mut p = party(user);
            p.participants.push(user);
            p.date = Some(Utc.with_ymd_and_hms(2025, 3, day, 19, 0, 0).unwrap());
            all.push(p);
        }
        let relevant = relevant_parties(&all, user);
        assert_eq!(recent_participated(&relevant, user, 2).len(), 2);
    }
}

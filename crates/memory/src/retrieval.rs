//! Hybrid lexical/semantic-lite/reliability ranking over the store.

use std::collections::HashSet;

use serde::Serialize;

use amw_trajectory::{domain_from_site_or_url, normalize_text, tokenize, Trajectory};

use crate::errors::StoreError;
use crate::store::{ListFilter, MemoryStore};

const WEIGHT_SITE: f64 = 0.20;
const WEIGHT_TASK: f64 = 0.15;
const WEIGHT_LEXICAL: f64 = 0.30;
const WEIGHT_SEMANTIC: f64 = 0.25;
const WEIGHT_RELIABILITY: f64 = 0.10;

/// Candidate cap when both site and task filter the tier.
const NARROW_TIER_LIMIT: u32 = 100;
/// Candidate cap for the single-filter fallback tiers.
const WIDE_TIER_LIMIT: u32 = 200;

/// What a caller wants trajectories for.
#[derive(Clone, Debug)]
pub struct RetrievalQuery {
    pub site: String,
    pub task_type: String,
    pub intent: String,
    pub top_k: usize,
}

impl RetrievalQuery {
    pub fn new(site: &str, task_type: &str, intent: &str) -> Self {
        RetrievalQuery {
            site: site.to_string(),
            task_type: task_type.to_string(),
            intent: intent.to_string(),
            top_k: 3,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Per-component score breakdown, logged with every retrieval.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ScoreDetail {
    pub site_match: f64,
    pub task_match: f64,
    pub lexical: f64,
    pub semantic_lite: f64,
    pub reliability: f64,
}

/// One ranked candidate.
#[derive(Clone, Debug)]
pub struct RetrievalHit {
    pub trajectory: Trajectory,
    pub score: f64,
    pub detail: ScoreDetail,
}

fn lexical_overlap(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f64 {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return 0.0;
    }
    let overlap = query_tokens.iter().filter(|t| doc_tokens.contains(*t)).count();
    overlap as f64 / query_tokens.len() as f64
}

fn trigrams(text: &str) -> HashSet<String> {
    let padded: Vec<char> = format!(" {} ", normalize_text(text)).chars().collect();
    padded.windows(3).map(|w| w.iter().collect()).collect()
}

/// Character-trigram Dice coefficient. Cheap stand-in for an embedding
/// distance that still rewards shared word stems.
fn semantic_lite(a: &str, b: &str) -> f64 {
    let a = trigrams(a);
    let b = trigrams(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let overlap = a.intersection(&b).count();
    2.0 * overlap as f64 / (a.len() + b.len()) as f64
}

/// Ranks stored trajectories for a request. Candidate selection is tiered:
/// site and task together, then site only, then task only; the first
/// non-empty tier wins.
pub struct HybridRetriever<'a> {
    store: &'a MemoryStore,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(store: &'a MemoryStore) -> Self {
        HybridRetriever { store }
    }

    pub fn search(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalHit>, StoreError> {
        let site = domain_from_site_or_url(&query.site);
        let intent = normalize_text(&query.intent);
        let query_tokens: HashSet<String> =
            tokenize(&format!("{site} {} {intent}", query.task_type))
                .into_iter()
                .collect();

        let mut candidates = self.store.list(
            &ListFilter::new()
                .site(&site)
                .task_type(&query.task_type)
                .limit(NARROW_TIER_LIMIT),
        )?;
        if candidates.is_empty() {
            candidates = self
                .store
                .list(&ListFilter::new().site(&site).limit(WIDE_TIER_LIMIT))?;
        }
        if candidates.is_empty() {
            candidates = self.store.list(
                &ListFilter::new()
                    .task_type(&query.task_type)
                    .limit(WIDE_TIER_LIMIT),
            )?;
        }

        let mut hits = Vec::with_capacity(candidates.len());
        for trajectory in candidates {
            let (score, detail) =
                self.score_one(&trajectory, &site, &query.task_type, &intent, &query_tokens)?;
            if score <= 0.0 {
                continue;
            }
            hits.push(RetrievalHit {
                trajectory,
                score,
                detail,
            });
        }
        // stable sort: equal scores keep the store's recency order
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(query.top_k);
        Ok(hits)
    }

    fn score_one(
        &self,
        trajectory: &Trajectory,
        site: &str,
        task_type: &str,
        intent: &str,
        query_tokens: &HashSet<String>,
    ) -> Result<(f64, ScoreDetail), StoreError> {
        let doc_text = format!(
            "{} {} {} {}",
            trajectory.intent,
            trajectory.task_type,
            trajectory.site,
            trajectory.keywords.join(" ")
        );
        let doc_tokens: HashSet<String> = tokenize(&doc_text).into_iter().collect();
        let lexical = lexical_overlap(query_tokens, &doc_tokens);
        let semantic = semantic_lite(intent, &normalize_text(&trajectory.intent));
        let stats = self.store.get_stats(&trajectory.trajectory_id)?;
        let reliability = 0.7 * stats.success_rate + 0.3 * (stats.usage_count as f64 / 20.0).min(1.0);
        let site_match = if trajectory.site == site { 1.0 } else { 0.0 };
        let task_match = if trajectory.task_type == task_type { 1.0 } else { 0.0 };

        let score = WEIGHT_SITE * site_match
            + WEIGHT_TASK * task_match
            + WEIGHT_LEXICAL * lexical
            + WEIGHT_SEMANTIC * semantic
            + WEIGHT_RELIABILITY * reliability;
        Ok((
            score,
            ScoreDetail {
                site_match,
                task_match,
                lexical,
                semantic_lite: semantic,
                reliability,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use amw_trajectory::TrajectoryDraft;

    use super::*;

    fn store_with(trajectories: &[Trajectory]) -> (tempfile::TempDir, MemoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(&dir.path().join("memory.db")).unwrap();
        for traj in trajectories {
            store.save(traj).unwrap();
        }
        (dir, store)
    }

    fn traj(id: &str, site: &str, task_type: &str, intent: &str) -> Trajectory {
        TrajectoryDraft::new(id, site, task_type, intent).build()
    }

    #[test]
    fn exact_site_and_task_outranks_strangers() {
        let (_dir, store) = store_with(&[
            traj("a", "x.io", "search", "find cheap widgets"),
            traj("b", "y.io", "checkout", "buy running shoes"),
        ]);
        let hits = HybridRetriever::new(&store)
            .search(&RetrievalQuery::new("https://x.io", "search", "find widgets"))
            .unwrap();
        assert_eq!(hits[0].trajectory.trajectory_id, "a");
        assert_eq!(hits[0].detail.site_match, 1.0);
        assert_eq!(hits[0].detail.task_match, 1.0);
        assert!(hits[0].detail.lexical > 0.0);
        assert!(hits[0].detail.semantic_lite > 0.0);
    }

    #[test]
    fn falls_back_to_site_tier_when_task_misses() {
        let (_dir, store) = store_with(&[traj("a", "x.io", "checkout", "buy widgets")]);
        let hits = HybridRetriever::new(&store)
            .search(&RetrievalQuery::new("x.io", "search", "buy widgets"))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].detail.site_match, 1.0);
        assert_eq!(hits[0].detail.task_match, 0.0);
    }

    #[test]
    fn falls_back_to_task_tier_for_unknown_sites() {
        let (_dir, store) = store_with(&[traj("a", "y.io", "search", "find shoes")]);
        let hits = HybridRetriever::new(&store)
            .search(&RetrievalQuery::new("x.io", "search", "find shoes"))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].detail.site_match, 0.0);
        assert_eq!(hits[0].detail.task_match, 1.0);
    }

    #[test]
    fn reliability_lifts_the_proven_trajectory() {
        let (_dir, store) = store_with(&[
            traj("proven", "x.io", "search", "find widgets"),
            traj("fresh", "x.io", "search", "find widgets"),
        ]);
        for _ in 0..10 {
            store.record_result("proven", true, 500).unwrap();
        }
        let hits = HybridRetriever::new(&store)
            .search(&RetrievalQuery::new("x.io", "search", "find widgets"))
            .unwrap();
        assert_eq!(hits[0].trajectory.trajectory_id, "proven");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn intent_and_reliability_rank_the_matching_trajectory_first() {
        let (_dir, store) = store_with(&[
            traj("a", "x.io", "search", "find widget"),
            traj("b", "x.io", "search", "buy widget"),
        ]);
        store.record_result("a", true, 500).unwrap();
        store.record_result("b", false, 500).unwrap();

        let hits = HybridRetriever::new(&store)
            .search(&RetrievalQuery::new("x.io", "search", "find a widget now"))
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].trajectory.trajectory_id, "a");
        assert!(hits[0].score > hits[1].score);
        assert!(hits[0].detail.reliability > hits[1].detail.reliability);
        assert!(hits[0].detail.semantic_lite > hits[1].detail.semantic_lite);
    }

    #[test]
    fn zero_signal_candidates_score_nothing_and_are_excluded() {
        let (_dir, store) = store_with(&[traj("far", "alpha.dev", "checkout", "buy shoes")]);
        let retriever = HybridRetriever::new(&store);

        // no tier admits it, so it never reaches the ranking
        let hits = retriever
            .search(&RetrievalQuery::new("beta.net", "search", "find widget"))
            .unwrap();
        assert!(hits.is_empty());

        // and even scored directly, every signal is zero
        let stored = store.get("far").unwrap().unwrap();
        let query_tokens: HashSet<String> =
            tokenize("beta.net search find widget").into_iter().collect();
        let (score, detail) = retriever
            .score_one(&stored, "beta.net", "search", "find widget", &query_tokens)
            .unwrap();
        assert_eq!(score, 0.0);
        assert_eq!(detail.site_match, 0.0);
        assert_eq!(detail.task_match, 0.0);
        assert_eq!(detail.lexical, 0.0);
        assert_eq!(detail.semantic_lite, 0.0);
        assert_eq!(detail.reliability, 0.0);
    }

    #[test]
    fn top_k_truncates() {
        let trajectories: Vec<Trajectory> = (0..5)
            .map(|i| traj(&format!("t{i}"), "x.io", "search", "find widgets"))
            .collect();
        let (_dir, store) = store_with(&trajectories);
        let hits = HybridRetriever::new(&store)
            .search(&RetrievalQuery::new("x.io", "search", "find widgets").top_k(2))
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn empty_store_returns_no_hits() {
        let (_dir, store) = store_with(&[]);
        let hits = HybridRetriever::new(&store)
            .search(&RetrievalQuery::new("x.io", "search", "anything"))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn trigram_dice_rewards_shared_stems() {
        let close = semantic_lite("find cheap widgets", "find widgets");
        let far = semantic_lite("find cheap widgets", "buy running shoes");
        assert!(close > far);
        assert_eq!(semantic_lite("", "anything"), 0.0);
    }
}

use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    cache::{CacheKey, CacheStore},
    models::{AnimeRecord, CacheEntry, Filter},
    services::{providers::AnimeSource, query},
};

/// Tunable parameters for the assembly pipeline
#[derive(Debug, Clone)]
pub struct RecommenderOptions {
    /// Primary result count below which the fallback source is consulted
    pub sparsity_threshold: usize,
    /// Maximum records returned (and cached) per query
    pub top_n: usize,
    /// Freshness window for cached snapshots
    pub cache_ttl_secs: u64,
    /// Records at or above this score are excluded from hidden-gem requests
    pub hidden_gem_max_score: f32,
}

impl Default for RecommenderOptions {
    fn default() -> Self {
        Self {
            sparsity_threshold: 5,
            top_n: 10,
            cache_ttl_secs: 86400,
            hidden_gem_max_score: 7.0,
        }
    }
}

/// Orchestrates the query-resolution pipeline: cache lookup, text parsing,
/// multi-source fetch, merge/dedupe/filter/rank, write-through.
///
/// `recommend` never fails; every error mode degrades to fewer records, a
/// stale snapshot, or an empty list.
pub struct Recommender {
    primary: Arc<dyn AnimeSource>,
    fallback: Arc<dyn AnimeSource>,
    cache: Arc<dyn CacheStore>,
    options: RecommenderOptions,
}

impl Recommender {
    pub fn new(
        primary: Arc<dyn AnimeSource>,
        fallback: Arc<dyn AnimeSource>,
        cache: Arc<dyn CacheStore>,
        options: RecommenderOptions,
    ) -> Self {
        Self {
            primary,
            fallback,
            cache,
            options,
        }
    }

    pub async fn recommend(&self, text: &str) -> Vec<AnimeRecord> {
        let key = CacheKey::from_text(text);

        let cached = self.cache.get(&key).await;
        if let Some(entry) = &cached {
            if entry.is_fresh(self.options.cache_ttl_secs) {
                // Cached payload is trusted verbatim; it is not re-filtered
                // against a freshly parsed filter.
                tracing::info!(key = %key, records = entry.records.len(), "Cache hit");
                return entry.records.clone();
            }
            tracing::debug!(key = %key, "Cache entry stale; refreshing");
        }

        let filter = query::parse(text);
        tracing::debug!(?filter, "Parsed query filter");

        let mut source_errors = 0usize;
        let mut candidates = match self.primary.fetch_by_filter(&filter).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Primary source unavailable");
                source_errors += 1;
                Vec::new()
            }
        };

        let sparse = candidates.len() < self.options.sparsity_threshold;
        if sparse {
            tracing::debug!(
                primary_count = candidates.len(),
                threshold = self.options.sparsity_threshold,
                "Primary result sparse; querying fallback"
            );
            match self.fallback.fetch_by_filter(&filter).await {
                Ok(records) => candidates.extend(records),
                Err(e) => {
                    tracing::warn!(error = %e, "Fallback source unavailable");
                    source_errors += 1;
                }
            }
        }

        let attempted_sources = if sparse { 2 } else { 1 };
        if candidates.is_empty() && source_errors == attempted_sources {
            // A run where every attempted source failed must not clobber a
            // usable snapshot; serve stale if we have one.
            if let Some(entry) = cached {
                tracing::warn!(key = %key, "All sources failed; serving stale cache entry");
                return entry.records;
            }
            tracing::warn!(key = %key, "All sources failed and no cached entry");
            return Vec::new();
        }

        let ranked = self.assemble(candidates, &filter);

        let entry = CacheEntry::new(filter, ranked.clone());
        self.cache.put(&key, &entry).await;

        ranked
    }

    /// Dedupe, constraint-filter, rank, and truncate the merged candidates
    fn assemble(&self, candidates: Vec<AnimeRecord>, filter: &Filter) -> Vec<AnimeRecord> {
        let deduped = dedupe_by_title(candidates);
        let filtered = self.apply_constraints(deduped, filter);
        let mut ranked = rank(filtered, filter);
        ranked.truncate(self.options.top_n);
        ranked
    }

    fn apply_constraints(&self, records: Vec<AnimeRecord>, filter: &Filter) -> Vec<AnimeRecord> {
        records
            .into_iter()
            .filter(|record| match (filter.episode_bound, record.episodes) {
                (Some(bound), Some(episodes)) => episodes <= bound,
                // An unknown episode count cannot satisfy a bound
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|record| {
                !filter.hidden_gem
                    || matches!(record.score, Some(s) if s < self.options.hidden_gem_max_score)
            })
            .collect()
    }
}

/// First occurrence wins. Candidates arrive primary-first, so a title present
/// in both sources keeps the primary copy's fields.
fn dedupe_by_title(records: Vec<AnimeRecord>) -> Vec<AnimeRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        if seen.insert(record.normalized_title()) {
            unique.push(record);
        }
    }
    unique
}

/// Descending descriptor-match count over the genre list, tie-break by
/// descending score. The sort is stable, so full ties keep first-seen order.
fn rank(mut records: Vec<AnimeRecord>, filter: &Filter) -> Vec<AnimeRecord> {
    records.sort_by(|a, b| {
        let matches_a = match_count(a, &filter.descriptors);
        let matches_b = match_count(b, &filter.descriptors);
        matches_b.cmp(&matches_a).then_with(|| {
            let score_a = a.score.unwrap_or(0.0);
            let score_b = b.score.unwrap_or(0.0);
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    records
}

fn match_count(record: &AnimeRecord, descriptors: &[String]) -> usize {
    record
        .genres
        .iter()
        .filter(|genre| descriptors.iter().any(|d| genre.eq_ignore_ascii_case(d)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::error::AppError;
    use crate::models::{RecordId, Source};
    use crate::services::providers::MockAnimeSource;

    fn record(id: u64, title: &str, genres: &[&str], episodes: u32, score: f32) -> AnimeRecord {
        AnimeRecord {
            id: RecordId::Mal(id),
            title: title.to_string(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            episodes: Some(episodes),
            score: Some(score),
            url: None,
            source: Source::Primary,
        }
    }

    fn fallback_record(
        id: u64,
        title: &str,
        genres: &[&str],
        episodes: u32,
        score: f32,
    ) -> AnimeRecord {
        AnimeRecord {
            id: RecordId::Anilist(id),
            title: title.to_string(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            episodes: Some(episodes),
            score: Some(score),
            url: None,
            source: Source::Fallback,
        }
    }

    fn recommender(
        primary: MockAnimeSource,
        fallback: MockAnimeSource,
        cache: Arc<dyn CacheStore>,
        options: RecommenderOptions,
    ) -> Recommender {
        Recommender::new(Arc::new(primary), Arc::new(fallback), cache, options)
    }

    fn dense_primary_results() -> Vec<AnimeRecord> {
        (1..=6)
            .map(|i| record(i, &format!("Primary Title {}", i), &["Action"], 24, 7.0 + i as f32 * 0.1))
            .collect()
    }

    #[tokio::test]
    async fn test_fallback_invoked_when_primary_sparse() {
        let mut primary = MockAnimeSource::new();
        primary.expect_fetch_by_filter().times(1).returning(|_| {
            Ok(vec![
                record(1, "Primary One", &["Adventure"], 12, 8.0),
                record(2, "Primary Two", &["Adventure"], 12, 7.5),
            ])
        });

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(1).returning(|_| {
            Ok((1..=8)
                .map(|i| fallback_record(i, &format!("Fallback Title {}", i), &["Comedy"], 12, 6.0))
                .collect())
        });

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );
        let results = rec.recommend("adventure").await;

        assert_eq!(results.len(), 10);
        // Primary records match the "adventure" descriptor and rank first
        assert_eq!(results[0].title, "Primary One");
        assert_eq!(results[1].title, "Primary Two");
    }

    #[tokio::test]
    async fn test_fallback_not_invoked_when_primary_dense() {
        let mut primary = MockAnimeSource::new();
        primary
            .expect_fetch_by_filter()
            .times(1)
            .returning(|_| Ok(dense_primary_results()));

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(0);

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );
        let results = rec.recommend("action").await;

        assert_eq!(results.len(), 6);
    }

    #[tokio::test]
    async fn test_dedupe_prefers_primary_copy() {
        let mut primary = MockAnimeSource::new();
        primary.expect_fetch_by_filter().times(1).returning(|_| {
            Ok(vec![record(1, "Steins;Gate", &["Thriller"], 24, 9.0)])
        });

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(1).returning(|_| {
            Ok(vec![fallback_record(
                1,
                "  steins;gate ",
                &["Thriller"],
                24,
                8.5,
            )])
        });

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );
        let results = rec.recommend("thriller").await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, Source::Primary);
        assert_eq!(results[0].score, Some(9.0));
    }

    #[tokio::test]
    async fn test_episode_bound_filters_records() {
        let mut primary = MockAnimeSource::new();
        primary.expect_fetch_by_filter().times(1).returning(|_| {
            Ok(vec![
                record(1, "Short One", &["Comedy"], 12, 7.0),
                record(2, "Long One", &["Comedy"], 64, 9.0),
                record(3, "Short Two", &["Comedy"], 11, 6.5),
                record(4, "Edge Case", &["Comedy"], 13, 8.0),
                AnimeRecord {
                    episodes: None,
                    ..record(5, "Unknown Length", &["Comedy"], 0, 8.0)
                },
            ])
        });

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(0);

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );
        let results = rec.recommend("comedy under 12 episodes").await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.episodes.unwrap() <= 12));
    }

    #[tokio::test]
    async fn test_hidden_gem_drops_high_scores() {
        let mut primary = MockAnimeSource::new();
        primary.expect_fetch_by_filter().times(1).returning(|_| {
            Ok(vec![
                record(1, "Blockbuster", &["Action"], 24, 9.2),
                record(2, "Sleeper Hit", &["Action"], 24, 6.4),
                record(3, "Cult Classic", &["Action"], 24, 6.9),
                record(4, "Mainstream", &["Action"], 24, 7.0),
                record(5, "Deep Cut", &["Action"], 24, 5.5),
            ])
        });

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(0);

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );
        let results = rec.recommend("hidden gem action").await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.score.unwrap() < 7.0));
    }

    #[tokio::test]
    async fn test_rank_by_match_count_then_score() {
        let mut primary = MockAnimeSource::new();
        primary.expect_fetch_by_filter().times(1).returning(|_| {
            Ok(vec![
                record(1, "One Match Low", &["Comedy"], 12, 6.0),
                record(2, "No Match High", &["Horror"], 12, 9.5),
                record(3, "Two Matches", &["Comedy", "Adventure"], 12, 7.0),
                record(4, "One Match High", &["Adventure"], 12, 8.0),
                record(5, "Filler", &["Drama"], 12, 5.0),
            ])
        });

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(0);

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );
        let results = rec.recommend("comedy adventure").await;

        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Two Matches",
                "One Match High",
                "One Match Low",
                "No Match High",
                "Filler"
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_can_outrank_primary_on_match_count() {
        let mut primary = MockAnimeSource::new();
        primary.expect_fetch_by_filter().times(1).returning(|_| {
            Ok(vec![
                record(1, "Primary Drama", &["Drama"], 12, 9.0),
                record(2, "Primary Other", &["Horror"], 12, 8.5),
            ])
        });

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(1).returning(|_| {
            Ok(vec![fallback_record(
                3,
                "Fallback Match",
                &["Comedy", "Adventure"],
                12,
                6.0,
            )])
        });

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );
        let results = rec.recommend("comedy adventure").await;

        // Primary origin does not pin records to the top; match count decides
        assert_eq!(results[0].title, "Fallback Match");
        assert_eq!(results[0].source, Source::Fallback);
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let mut primary = MockAnimeSource::new();
        primary
            .expect_fetch_by_filter()
            .times(1)
            .returning(|_| Ok(dense_primary_results()));

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(0);

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );

        let first = rec.recommend("action").await;
        let second = rec.recommend("action").await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cache_key_ignores_case_and_whitespace() {
        let mut primary = MockAnimeSource::new();
        primary
            .expect_fetch_by_filter()
            .times(1)
            .returning(|_| Ok(dense_primary_results()));

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(0);

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );

        let first = rec.recommend("action").await;
        let second = rec.recommend("  ACTION ").await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stale_entry_served_when_refresh_fails() {
        let stale_records = vec![record(1, "Old Favorite", &["Action"], 24, 8.0)];
        let cache = Arc::new(MemoryStore::new());
        let entry = CacheEntry {
            cached_at: chrono::Utc::now() - chrono::Duration::seconds(7200),
            filter: Filter::default(),
            records: stale_records.clone(),
        };
        cache.put(&CacheKey::from_text("action"), &entry).await;

        let mut primary = MockAnimeSource::new();
        primary
            .expect_fetch_by_filter()
            .times(1)
            .returning(|_| Err(AppError::ExternalApi("primary down".to_string())));

        let mut fallback = MockAnimeSource::new();
        fallback
            .expect_fetch_by_filter()
            .times(1)
            .returning(|_| Err(AppError::ExternalApi("fallback down".to_string())));

        let options = RecommenderOptions {
            cache_ttl_secs: 3600,
            ..RecommenderOptions::default()
        };
        let rec = recommender(primary, fallback, cache.clone(), options);

        let results = rec.recommend("action").await;
        assert_eq!(results, stale_records);

        // The failed run must not have overwritten the snapshot
        let kept = cache.get(&CacheKey::from_text("action")).await.unwrap();
        assert_eq!(kept.records, stale_records);
    }

    #[tokio::test]
    async fn test_both_sources_fail_without_cache_yields_empty() {
        let mut primary = MockAnimeSource::new();
        primary
            .expect_fetch_by_filter()
            .times(1)
            .returning(|_| Err(AppError::ExternalApi("primary down".to_string())));

        let mut fallback = MockAnimeSource::new();
        fallback
            .expect_fetch_by_filter()
            .times(1)
            .returning(|_| Err(AppError::ExternalApi("fallback down".to_string())));

        let rec = recommender(
            primary,
            fallback,
            Arc::new(MemoryStore::new()),
            RecommenderOptions::default(),
        );

        let results = rec.recommend("anything at all").await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_results_truncated_to_top_n() {
        let mut primary = MockAnimeSource::new();
        primary.expect_fetch_by_filter().times(1).returning(|_| {
            Ok((1..=25)
                .map(|i| record(i, &format!("Title {}", i), &["Action"], 24, 5.0))
                .collect())
        });

        let mut fallback = MockAnimeSource::new();
        fallback.expect_fetch_by_filter().times(0);

        let options = RecommenderOptions {
            top_n: 3,
            ..RecommenderOptions::default()
        };
        let rec = recommender(primary, fallback, Arc::new(MemoryStore::new()), options);

        let results = rec.recommend("action").await;
        assert_eq!(results.len(), 3);
    }
}

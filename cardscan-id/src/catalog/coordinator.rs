// Candidate Search Coordinator
//
// Fallback ladder, stopping at the first level that returns candidates:
//   Primary    - name + set + number
//   ShinyVault - Hidden Fates only: number retried with its `SV` prefix
//   CrossSet   - name + number (set dropped)
//   SetFamily  - name + number against each sibling of the set, concurrently
//   SetName    - name + set (number dropped)
//   NameHp     - name + HP across all sets
//   NameOnly   - name alone, when no usable number was read
//   Wildcard   - name prefix, when enabled
//
// A failed query is recorded and the ladder continues. Only when every level
// came back empty and at least one query failed is the failure surfaced.

use super::set_families;
use super::{CardQuery, CardSearchClient};
use crate::config::SearchConfig;
use crate::error::{Result, ScanError, SearchError};
use crate::parser::normalize::is_vague;
use crate::types::{CandidateCard, IdentificationRecord};
use futures::stream::{FuturesOrdered, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest set name accepted as a query term
const MAX_SET_NAME_LEN: usize = 50;

/// Set whose subset numbers carry an `SV` prefix the model often drops
const SHINY_VAULT_SET: &str = "Hidden Fates";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchLevel {
    Primary,
    ShinyVault,
    CrossSet,
    SetFamily,
    SetName,
    NameHp,
    NameOnly,
    Wildcard,
}

impl SearchLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchLevel::Primary => "primary",
            SearchLevel::ShinyVault => "shiny_vault",
            SearchLevel::CrossSet => "cross_set",
            SearchLevel::SetFamily => "set_family",
            SearchLevel::SetName => "set_name",
            SearchLevel::NameHp => "name_hp",
            SearchLevel::NameOnly => "name_only",
            SearchLevel::Wildcard => "wildcard",
        }
    }
}

/// One query sent to the card database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAttempt {
    pub level: SearchLevel,
    pub query: String,
    pub results: usize,
    pub error: Option<String>,
}

/// Everything the coordinator gathered, unranked
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    pub candidates: Vec<CandidateCard>,
    pub attempts: Vec<SearchAttempt>,
    pub diagnostics: Vec<String>,
}

impl SearchOutcome {
    fn record(&mut self, level: SearchLevel, query: &CardQuery, result: &std::result::Result<Vec<CandidateCard>, SearchError>) {
        let (results, error) = match result {
            Ok(cards) => (cards.len(), None),
            Err(e) => (0, Some(e.to_string())),
        };
        if let Some(e) = &error {
            self.diagnostics
                .push(format!("{} search failed ({}): {}", level.as_str(), query, e));
        }
        self.attempts.push(SearchAttempt {
            level,
            query: query.to_string(),
            results,
            error,
        });
    }

    fn accept(&mut self, cards: Vec<CandidateCard>) {
        let mut seen: HashSet<String> = self.candidates.iter().map(|c| c.id.clone()).collect();
        for card in cards {
            if seen.insert(card.id.clone()) {
                self.candidates.push(card);
            }
        }
    }
}

/// Set names that look like descriptions rather than set titles are not
/// sent to the database
fn usable_set(set_name: &str) -> bool {
    let trimmed = set_name.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() <= MAX_SET_NAME_LEN
        && !trimmed.contains(',')
        && !is_vague(trimmed)
}

fn usable_number(number: &str) -> bool {
    !number.is_empty()
        && number.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && number.chars().any(|c| c.is_ascii_digit())
}

/// `SV`-prefixed number for a bare Hidden Fates number (`"49"` -> `"SV49"`)
fn shiny_vault_number(set_name: &str, number: &str) -> Option<String> {
    let applies = set_families::set_key(set_name) == set_families::set_key(SHINY_VAULT_SET)
        && number.chars().all(|c| c.is_ascii_digit());
    applies.then(|| format!("SV{}", number))
}

/// State of one walk down the ladder
#[derive(Default)]
struct LadderRun {
    outcome: SearchOutcome,
    tried: Vec<CardQuery>,
    last_error: Option<SearchError>,
}

/// Runs the fallback ladder against a card database
pub struct SearchCoordinator {
    client: Arc<dyn CardSearchClient>,
    config: SearchConfig,
}

impl SearchCoordinator {
    pub fn new(client: Arc<dyn CardSearchClient>, config: SearchConfig) -> Self {
        Self { client, config }
    }

    /// One query under timeout and cancellation
    ///
    /// The outer error is cancellation only; database failures come back in
    /// the inner result so the ladder can continue.
    async fn run_query(
        &self,
        query: &CardQuery,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<Vec<CandidateCard>, SearchError>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            result = tokio::time::timeout(timeout, self.client.search(query)) => {
                Ok(result.unwrap_or(Err(SearchError::Timeout)))
            }
        }
    }

    /// Gather candidates for an identification record
    ///
    /// # Arguments
    /// * `query_timeout` - per-query limit
    /// * `skip_family` - skip the set-family fan-out (time budget spent)
    pub async fn search(
        &self,
        record: &IdentificationRecord,
        query_timeout: Duration,
        skip_family: bool,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome> {
        let mut run = LadderRun::default();

        let Some(name) = record.search_name() else {
            run.outcome
                .diagnostics
                .push("no card name identified; search skipped".to_string());
            return Ok(run.outcome);
        };

        let set_name = record.set_name.as_deref().filter(|s| {
            let ok = usable_set(s);
            if !ok {
                run.outcome
                    .diagnostics
                    .push(format!("set name '{}' not usable as a query term", s));
            }
            ok
        });
        let number = record.number.as_deref().filter(|n| {
            let ok = usable_number(n);
            if !ok {
                run.outcome
                    .diagnostics
                    .push(format!("card number '{}' not usable as a query term", n));
            }
            ok
        });

        let mut head = vec![(
            SearchLevel::Primary,
            CardQuery::by_name(name).with_set(set_name).with_number(number),
        )];
        let shiny_vault = set_name
            .zip(number)
            .and_then(|(set, n)| shiny_vault_number(set, n).map(|sv| (set, sv)));
        if let Some((set, sv)) = shiny_vault {
            head.push((
                SearchLevel::ShinyVault,
                CardQuery::by_name(name).with_set(Some(set)).with_number(Some(sv.as_str())),
            ));
        }
        if set_name.is_some() {
            head.push((
                SearchLevel::CrossSet,
                CardQuery::by_name(name).with_number(number),
            ));
        }
        if let Some(cards) = self.walk(&mut run, head, query_timeout, cancel).await? {
            run.outcome.accept(cards);
            return Ok(run.outcome);
        }

        if let Some(set) = set_name {
            if skip_family {
                run.outcome
                    .diagnostics
                    .push("set_family search skipped: time budget exceeded".to_string());
            } else if let Some(cards) = self
                .search_family(&mut run, name, set, number, query_timeout, cancel)
                .await?
            {
                run.outcome.accept(cards);
                return Ok(run.outcome);
            }
        }

        let mut tail: Vec<(SearchLevel, CardQuery)> = Vec::new();
        if set_name.is_some() {
            tail.push((SearchLevel::SetName, CardQuery::by_name(name).with_set(set_name)));
        }
        if let Some(hp) = record.hp.as_deref() {
            tail.push((SearchLevel::NameHp, CardQuery::by_name(name).with_hp(Some(hp))));
        }
        if number.is_none() {
            tail.push((SearchLevel::NameOnly, CardQuery::by_name(name)));
        }
        if self.config.enable_wildcard {
            tail.push((
                SearchLevel::Wildcard,
                CardQuery {
                    name: name.to_string(),
                    wildcard: true,
                    ..Default::default()
                },
            ));
        }
        if let Some(cards) = self.walk(&mut run, tail, query_timeout, cancel).await? {
            run.outcome.accept(cards);
            return Ok(run.outcome);
        }

        if let Some(err) = run.last_error {
            tracing::warn!(error = %err, attempts = run.outcome.attempts.len(), "Card search failed at every level");
            return Err(ScanError::SearchUnavailable(err));
        }

        tracing::debug!(name, attempts = run.outcome.attempts.len(), "No candidates at any search level");
        Ok(run.outcome)
    }

    /// Run levels in order until one returns candidates
    ///
    /// A query identical to one already sent is skipped.
    async fn walk(
        &self,
        run: &mut LadderRun,
        levels: Vec<(SearchLevel, CardQuery)>,
        query_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<CandidateCard>>> {
        for (level, query) in levels {
            if run.tried.contains(&query) {
                continue;
            }
            if level != SearchLevel::Primary {
                run.outcome
                    .diagnostics
                    .push(format!("falling back to {} search ({})", level.as_str(), query));
            }
            let result = self.run_query(&query, query_timeout, cancel).await?;
            run.outcome.record(level, &query, &result);
            run.tried.push(query);
            match result {
                Ok(cards) if !cards.is_empty() => return Ok(Some(cards)),
                Ok(_) => {}
                Err(e) => run.last_error = Some(e),
            }
        }
        Ok(None)
    }

    /// Concurrent queries against the set's siblings; first non-empty result
    /// in family order wins and the rest are dropped
    async fn search_family(
        &self,
        run: &mut LadderRun,
        name: &str,
        set_name: &str,
        number: Option<&str>,
        query_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<CandidateCard>>> {
        let siblings: Vec<&str> = set_families::siblings(set_name)
            .into_iter()
            .take(self.config.max_family_queries)
            .collect();
        if siblings.is_empty() {
            return Ok(None);
        }

        run.outcome.diagnostics.push(format!(
            "falling back to set_family search across {} sibling sets of '{}'",
            siblings.len(),
            set_name
        ));

        let queries: Vec<CardQuery> = siblings
            .iter()
            .map(|sibling| CardQuery::by_name(name).with_set(Some(sibling)).with_number(number))
            .collect();

        let mut pending: FuturesOrdered<_> = queries
            .iter()
            .map(|query| async move { (query, self.run_query(query, query_timeout, cancel).await) })
            .collect();

        while let Some((query, result)) = pending.next().await {
            let result = result?;
            run.outcome.record(SearchLevel::SetFamily, query, &result);
            run.tried.push(query.clone());
            match result {
                Ok(cards) if !cards.is_empty() => return Ok(Some(cards)),
                Ok(_) => {}
                Err(e) => run.last_error = Some(e),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned responses keyed by the query's display form
    #[derive(Default)]
    struct ScriptedSearch {
        responses: HashMap<String, std::result::Result<Vec<CandidateCard>, SearchError>>,
        calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedSearch {
        fn respond(mut self, query: &str, result: std::result::Result<Vec<CandidateCard>, SearchError>) -> Self {
            self.responses.insert(query.to_string(), result);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CardSearchClient for ScriptedSearch {
        async fn search(&self, query: &CardQuery) -> std::result::Result<Vec<CandidateCard>, SearchError> {
            self.calls.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses.get(&query.to_string()).cloned().unwrap_or(Ok(vec![]))
        }
    }

    fn card(id: &str, name: &str, set: &str, number: &str) -> CandidateCard {
        CandidateCard {
            id: id.into(),
            name: name.into(),
            set_name: Some(set.into()),
            number: Some(number.into()),
            ..Default::default()
        }
    }

    fn record(name: Option<&str>, set: Option<&str>, number: Option<&str>) -> IdentificationRecord {
        IdentificationRecord {
            name: name.map(str::to_string),
            set_name: set.map(str::to_string),
            number: number.map(str::to_string),
            confidence: 0.9,
            detected_language: "en".into(),
            ..Default::default()
        }
    }

    fn coordinator(client: Arc<ScriptedSearch>) -> SearchCoordinator {
        SearchCoordinator::new(client, SearchConfig::default())
    }

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_primary_hit_stops_ladder() {
        let client = Arc::new(ScriptedSearch::default().respond(
            "name=Charizard set=Base number=4",
            Ok(vec![card("base1-4", "Charizard", "Base", "4")]),
        ));
        let outcome = coordinator(client.clone())
            .search(&record(Some("Charizard"), Some("Base"), Some("4")), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].level, SearchLevel::Primary);
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cross_set_fallback() {
        let client = Arc::new(ScriptedSearch::default().respond(
            "name=Charizard number=4",
            Ok(vec![card("base1-4", "Charizard", "Base", "4")]),
        ));
        let outcome = coordinator(client)
            .search(&record(Some("Charizard"), Some("Jungle"), Some("4")), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.candidates[0].id, "base1-4");
        let levels: Vec<SearchLevel> = outcome.attempts.iter().map(|a| a.level).collect();
        assert_eq!(levels, vec![SearchLevel::Primary, SearchLevel::CrossSet]);
        assert!(outcome.diagnostics.iter().any(|d| d.contains("cross_set")));
    }

    #[tokio::test]
    async fn test_family_fan_out_takes_first_in_family_order() {
        let client = Arc::new(
            ScriptedSearch::default()
                .respond("name=Eevee set=Fossil number=51", Ok(vec![card("fo-51", "Eevee", "Fossil", "51")]))
                .respond("name=Eevee set=Team Rocket number=51", Ok(vec![card("tr-51", "Eevee", "Team Rocket", "51")])),
        );
        let outcome = coordinator(client)
            .search(&record(Some("Eevee"), Some("Jungle"), Some("51")), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].id, "fo-51");
        assert!(outcome.attempts.iter().any(|a| a.level == SearchLevel::SetFamily));
    }

    #[tokio::test]
    async fn test_family_skipped_when_over_budget() {
        let client = Arc::new(ScriptedSearch::default());
        let outcome = coordinator(client.clone())
            .search(&record(Some("Eevee"), Some("Jungle"), Some("51")), TIMEOUT, true, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.candidates.is_empty());
        assert!(!client.calls().iter().any(|q| q.contains("set=Fossil")));
        assert!(outcome.diagnostics.iter().any(|d| d.contains("set_family search skipped")));
    }

    #[tokio::test]
    async fn test_shiny_vault_prefix_retry() {
        let client = Arc::new(ScriptedSearch::default().respond(
            "name=Charizard-GX set=Hidden Fates number=SV49",
            Ok(vec![card("sma-SV49", "Charizard-GX", "Hidden Fates", "SV49")]),
        ));
        let outcome = coordinator(client.clone())
            .search(
                &record(Some("Charizard-GX"), Some("Hidden Fates"), Some("49")),
                TIMEOUT,
                false,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.candidates[0].id, "sma-SV49");
        let levels: Vec<SearchLevel> = outcome.attempts.iter().map(|a| a.level).collect();
        assert_eq!(levels, vec![SearchLevel::Primary, SearchLevel::ShinyVault]);
    }

    #[tokio::test]
    async fn test_shiny_vault_only_for_hidden_fates() {
        let client = Arc::new(ScriptedSearch::default());
        coordinator(client.clone())
            .search(&record(Some("Mew"), Some("Jungle"), Some("49")), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!client.calls().iter().any(|q| q.contains("SV49")));
    }

    #[tokio::test]
    async fn test_set_name_without_number() {
        let client = Arc::new(ScriptedSearch::default().respond(
            "name=Eevee set=Jungle",
            Ok(vec![card("ju-51", "Eevee", "Jungle", "51")]),
        ));
        let outcome = coordinator(client.clone())
            .search(&record(Some("Eevee"), Some("Jungle"), Some("15")), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.candidates[0].id, "ju-51");
        assert_eq!(outcome.attempts.last().unwrap().level, SearchLevel::SetName);
        assert!(outcome.attempts.iter().any(|a| a.level == SearchLevel::SetFamily));
        assert!(!client.calls().iter().any(|q| q.contains('*')));
    }

    #[tokio::test]
    async fn test_name_and_hp_across_sets() {
        let client = Arc::new(ScriptedSearch::default().respond(
            "name=Snorlax hp=90",
            Ok(vec![card("ju-11", "Snorlax", "Jungle", "11")]),
        ));
        let snorlax = IdentificationRecord {
            hp: Some("90".into()),
            ..record(Some("Snorlax"), None, Some("99"))
        };
        let outcome = coordinator(client.clone())
            .search(&snorlax, TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.candidates[0].id, "ju-11");
        let levels: Vec<SearchLevel> = outcome.attempts.iter().map(|a| a.level).collect();
        assert_eq!(levels, vec![SearchLevel::Primary, SearchLevel::NameHp]);
        assert!(outcome.diagnostics.iter().any(|d| d.contains("name_hp")));
    }

    #[tokio::test]
    async fn test_name_only_when_number_missing() {
        let client = Arc::new(
            ScriptedSearch::default().respond("name=Mew", Ok(vec![card("p-8", "Mew", "Promo", "8")])),
        );
        let outcome = coordinator(client)
            .search(&record(Some("Mew"), None, None), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        // Primary is already a name-only query, so the NameOnly level is not repeated
        assert_eq!(outcome.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_wildcard_last_resort() {
        let client = Arc::new(
            ScriptedSearch::default().respond("name=Pikachu*", Ok(vec![card("x-1", "Pikachu V", "Vivid Voltage", "43")])),
        );
        let outcome = coordinator(client)
            .search(&record(Some("Pikachu"), None, Some("43")), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.attempts.last().unwrap().level, SearchLevel::Wildcard);
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_descriptive_set_is_not_queried() {
        let client = Arc::new(ScriptedSearch::default());
        let outcome = coordinator(client.clone())
            .search(
                &record(Some("Pikachu"), Some("a yellow border set, probably early"), Some("58")),
                TIMEOUT,
                false,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(client.calls().iter().all(|q| !q.contains("set=")));
        assert!(outcome.diagnostics.iter().any(|d| d.contains("not usable")));
    }

    #[tokio::test]
    async fn test_no_name_means_no_query() {
        let client = Arc::new(ScriptedSearch::default());
        let outcome = coordinator(client.clone())
            .search(&record(None, Some("Base"), Some("4")), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert!(client.calls().is_empty());
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_with_no_candidates_is_surfaced() {
        let client = Arc::new(ScriptedSearch::default().respond(
            "name=Mew",
            Err(SearchError::Unavailable("HTTP 503".into())),
        ));
        let mut config = SearchConfig::default();
        config.enable_wildcard = false;
        let result = SearchCoordinator::new(client, config)
            .search(&record(Some("Mew"), None, None), TIMEOUT, false, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ScanError::SearchUnavailable(SearchError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn test_failure_masked_by_later_success() {
        let client = Arc::new(
            ScriptedSearch::default()
                .respond("name=Mew number=8", Err(SearchError::Timeout))
                .respond("name=Mew*", Ok(vec![card("p-8", "Mew", "Promo", "8")])),
        );
        let outcome = coordinator(client)
            .search(&record(Some("Mew"), None, Some("8")), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.attempts[0].error.as_deref(), Some("card search timed out"));
    }

    #[tokio::test]
    async fn test_slow_query_times_out() {
        let client = Arc::new(ScriptedSearch {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let mut config = SearchConfig::default();
        config.enable_wildcard = false;
        let result = SearchCoordinator::new(client, config)
            .search(&record(Some("Mew"), None, None), Duration::from_millis(20), false, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ScanError::SearchUnavailable(SearchError::Timeout))));
    }

    #[tokio::test]
    async fn test_cancellation_stops_search() {
        let client = Arc::new(ScriptedSearch {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = coordinator(client)
            .search(&record(Some("Mew"), None, None), TIMEOUT, false, &cancel)
            .await;
        assert!(matches!(result, Err(ScanError::Cancelled)));
    }

    #[tokio::test]
    async fn test_duplicate_ids_collapsed() {
        let client = Arc::new(ScriptedSearch::default().respond(
            "name=Mew",
            Ok(vec![card("p-8", "Mew", "Promo", "8"), card("p-8", "Mew", "Promo", "8")]),
        ));
        let outcome = coordinator(client)
            .search(&record(Some("Mew"), None, None), TIMEOUT, false, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.candidates.len(), 1);
    }
}

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tomato_bot::config::SourceSettings;
use tomato_bot::sources::cma::{self, CmaProvider, SEARCH_URL};
use tomato_bot::sources::fetch::FixtureFetcher;
use tomato_bot::sources::relevance::RelevanceRule;
use tomato_bot::sources::{find_candidate, Resolved, SearchHit, Skip, SourceProvider};
use tomato_bot::SeenLedger;

const SEARCH_TOMATO: &str = include_str!("fixtures/cma_search_tomato.json");
const SEARCH_TOMATOES: &str = include_str!("fixtures/cma_search_tomatoes.json");

fn json(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).expect("fixture json")
}

fn fixtures() -> FixtureFetcher {
    FixtureFetcher::new()
        .with_search(SEARCH_URL, "tomato", json(SEARCH_TOMATO))
        .with_search(SEARCH_URL, "tomatoes", json(SEARCH_TOMATOES))
}

#[tokio::test]
async fn cma_candidate_has_full_caption() {
    let provider = CmaProvider::new(Arc::new(fixtures()), cma::default_settings());
    let ledger = SeenLedger::with_keys("unused.json", Vec::<String>::new());
    let mut rng = StdRng::seed_from_u64(11);

    let c = find_candidate(&provider, &ledger, &mut rng).await.unwrap();
    assert_eq!(c.source_key, "cma:55");
    assert_eq!(
        c.caption,
        vec![
            "Still Life with Tomato",
            "J. Doe (American, 1880–1950)",
            "1920",
            "Gift of the Tomato Society",
            "Source: The Cleveland Museum of Art (CC0)",
        ]
    );
    assert_eq!(
        c.image_url,
        "https://openaccess-cdn.clevelandart.org/1920.55/1920.55_web.jpg"
    );
}

#[tokio::test]
async fn search_merges_terms_and_dedups_ids() {
    let provider = CmaProvider::new(Arc::new(fixtures()), cma::default_settings());
    let mut hits = provider.search("tomato").await.unwrap();
    hits.extend(provider.search("tomatoes").await.unwrap());
    let ids: Vec<_> = tomato_bot::sources::dedup_hits(hits)
        .into_iter()
        .map(|h| h.local_id)
        .collect();
    assert_eq!(ids, vec!["55", "56", "57"]);
}

#[tokio::test]
async fn rights_and_relevance_are_enforced() {
    let provider = CmaProvider::new(Arc::new(fixtures()), cma::default_settings());
    let hits = provider.search("tomato").await.unwrap();
    let by_id = |id: &str| -> SearchHit {
        hits.iter().find(|h| h.local_id == id).cloned().unwrap()
    };

    assert_eq!(
        provider.resolve(by_id("56")).await.unwrap(),
        Resolved::Skipped(Skip::NotRelevant)
    );
    assert_eq!(
        provider.resolve(by_id("57")).await.unwrap(),
        Resolved::Skipped(Skip::NotPublicDomain)
    );
    assert!(provider.resolve(SearchHit::id_only("99")).await.is_err());
}

#[tokio::test]
async fn seen_candidate_falls_through_to_next_eligible() {
    let settings = SourceSettings::new(["tomato", "tomatoes"], RelevanceRule::TrustSearch);
    let provider = CmaProvider::new(Arc::new(fixtures()), settings);
    let ledger = SeenLedger::with_keys("unused.json", ["cma:55"]);
    let mut rng = StdRng::seed_from_u64(2);

    let c = find_candidate(&provider, &ledger, &mut rng).await.unwrap();
    assert_eq!(c.source_key, "cma:56");
    assert_eq!(
        c.caption,
        vec![
            "Harbor at Dusk",
            "1899",
            "Bequest of Someone",
            "Source: The Cleveland Museum of Art (CC0)",
        ]
    );
}

#[tokio::test]
async fn everything_seen_means_absent() {
    let provider = CmaProvider::new(Arc::new(fixtures()), cma::default_settings());
    let ledger = SeenLedger::with_keys("unused.json", ["cma:55"]);
    let mut rng = StdRng::seed_from_u64(2);
    assert!(find_candidate(&provider, &ledger, &mut rng).await.is_none());
}

//! A listing walked over a mock portal and merged into an on-disk corpus.

use lexharvest_config::{Category, HarvestConfig, Language, TransportSettings};
use lexharvest_http::HttpClient;
use lexharvest_store::{CorpusKey, CorpusStore, merge};
use lexharvest_web::feed::category_listing_url;
use lexharvest_web::{PaginationOptions, Paginator, RecordExtractor, StopReason};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIRST: &str = r#"<form>
<input type="hidden" name="__VIEWSTATE" value="VS1" />
<input type="hidden" name="__VIEWSTATEGENERATOR" value="GEN" />
<input type="hidden" name="__EVENTVALIDATION" value="EV1" />
<a href="/docs/10">Law 10</a>
<a href="/docs/11">Fee of $100</a>
<a id="ctl00_cphMain_ucPager_lbNext">Next</a>
</form>"#;

const SECOND: &str = r#"<form>
<a href="/docs/11">Fee of $100</a>
<a href="/docs/12">Law 12</a>
</form>"#;

async fn portal() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/all"))
        .and(query_param("act_type", "22"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIRST))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search/all"))
        .and(body_string_contains("__VIEWSTATE=VS1"))
        .and(body_string_contains("__EVENTVALIDATION=EV1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SECOND))
        .mount(&server)
        .await;
    server
}

async fn harvest_once(server: &MockServer, store: &CorpusStore) -> (usize, StopReason) {
    let client = HttpClient::new(&TransportSettings::default())
        .unwrap()
        .with_attempts(1)
        .with_retry_delay(Duration::ZERO);

    let mut options = PaginationOptions::from_config(&HarvestConfig::default());
    options.inter_page_delay = Duration::ZERO;
    // Links resolve against the public origin even though pages come from the mock.
    let paginator = Paginator::new(RecordExtractor::listing("https://lex.uz"), options);

    let url = category_listing_url(
        &server.uri(),
        &Language::new("uz-Cyrl", 3, ""),
        &Category::new("laws", 22),
    )
    .unwrap();
    let batch = paginator.run(&client, &url).await;

    let key = CorpusKey::new("laws", "uz-Cyrl");
    let outcome = merge(store.load(&key), batch.records);
    if outcome.added > 0 {
        store.save(&key, &outcome.corpus).unwrap();
    }
    (outcome.added, batch.stop_reason)
}

#[tokio::test]
async fn two_page_listing_lands_in_corpus_once() {
    let server = portal().await;
    let dir = tempfile::tempdir().unwrap();
    let store = CorpusStore::new(dir.path());

    let (added, stop) = harvest_once(&server, &store).await;
    assert_eq!(added, 3);
    assert_eq!(stop, StopReason::NoNextPage);

    let corpus = store.load(&CorpusKey::new("laws", "uz-Cyrl"));
    let ids: Vec<&str> = corpus.records().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["10", "11", "12"]);
    assert_eq!(corpus.records()[1].title, "Fee of USD 100");
    assert_eq!(corpus.records()[2].url, "https://lex.uz/docs/12");

    let (added_again, _) = harvest_once(&server, &store).await;
    assert_eq!(added_again, 0);
    assert_eq!(store.load(&CorpusKey::new("laws", "uz-Cyrl")), corpus);
}

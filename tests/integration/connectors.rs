//! Connector tests against mocked translation endpoints

use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dict_builder::connector::{
    ExtractPolicy, GlosbeConnector, GlosbePageConnector, GoogleTranslateConnector, LanguagePair,
    SourceConnector,
};
use dict_builder::orchestrator::{FailureReason, Outcome, Payload, RateLimiter, SentencePair};
use dict_builder::word::WorkItem;

const TIMEOUT: Duration = Duration::from_secs(5);

fn limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(Duration::ZERO))
}

fn es_ko() -> LanguagePair {
    LanguagePair::new("es", "ko").unwrap()
}

fn google(server: &MockServer) -> GoogleTranslateConnector {
    GoogleTranslateConnector::new(Arc::new(Client::new()), limiter(), es_ko())
        .with_base_url(server.uri())
        .with_max_retries(1)
}

fn glosbe(server: &MockServer) -> GlosbeConnector {
    GlosbeConnector::new(Arc::new(Client::new()), limiter(), es_ko())
        .with_mymemory_base_url(server.uri())
        .with_glosbe_base_url(server.uri())
        .with_google_base_url(server.uri())
        .with_max_retries(1)
}

fn glosbe_page(server: &MockServer) -> GlosbePageConnector {
    GlosbePageConnector::new(Arc::new(Client::new()), limiter(), es_ko())
        .with_base_url(server.uri())
        .with_max_retries(1)
}

fn strict() -> ExtractPolicy {
    ExtractPolicy {
        require_all_fields: true,
        ..ExtractPolicy::default()
    }
}

const CASA_PAGE: &str = r#"<html><body>
  <span class="text-xxs text-gray-500 inline-block">
    <span class="inline-block dir-aware-pr-1">noun</span>
    <span class="inline-block dir-aware-pr-1">feminine</span>
  </span>
  <button class="glosbe-audio" data-lang="es" data-file="es-casa.mp3"></button>
  <ul>
    <li data-element="translation">
      <h3 class="translation__item__pharse">집</h3>
      <div class="translation__example"><p>Mi casa es azul.</p><p>우리 집은 파랗다.</p></div>
    </li>
    <li data-element="translation"><h3 class="translation__item__pharse">가정</h3></li>
  </ul>
</body></html>"#;

async fn mount_mymemory(server: &MockServer, word: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("q", word))
        .and(query_param("langpair", "es|ko"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_google_translation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/translate_a/single"))
        .and(query_param("client", "gtx"))
        .and(query_param("sl", "es"))
        .and(query_param("tl", "ko"))
        .and(query_param("q", "casa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [["집", "casa", null, null, 10]],
            null,
            "es"
        ])))
        .mount(&server)
        .await;

    let outcome = google(&server).fetch(&WorkItem::new("casa"), TIMEOUT).await;
    assert_eq!(outcome, Outcome::Success(Payload::text("집")));
}

#[tokio::test]
async fn test_google_classifies_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("q", "limit"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("q", "empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([null, null, "es"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("q", "gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let connector = google(&server);
    assert_eq!(
        connector.fetch(&WorkItem::new("limit"), TIMEOUT).await,
        Outcome::Failure(FailureReason::Throttled)
    );
    assert_eq!(
        connector.fetch(&WorkItem::new("empty"), TIMEOUT).await,
        Outcome::Failure(FailureReason::NoData)
    );
    assert_eq!(
        connector.fetch(&WorkItem::new("gone"), TIMEOUT).await,
        Outcome::Failure(FailureReason::Invalid)
    );
}

#[tokio::test]
async fn test_google_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[["물", "agua"]]])))
        .mount(&server)
        .await;

    let outcome = google(&server).fetch(&WorkItem::new("agua"), TIMEOUT).await;
    assert_eq!(outcome, Outcome::Success(Payload::text("물")));
}

#[tokio::test]
async fn test_glosbe_prefers_target_script_and_collects_examples() {
    let server = MockServer::start().await;
    mount_mymemory(
        &server,
        "hablar",
        json!({"matches": [
            {"translation": "to speak", "match": 1.0, "quality": "80"},
            {"translation": "말하다", "match": 0.9, "quality": "70"},
        ]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/iapi3/similar/similarPhrasesMany"))
        .and(query_param("p", "hablar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"phrases": [
            {"phrase": "hablar claro", "reverse": false},
            {"phrase": "speak up", "reverse": true},
            {"phrase": "hablar", "reverse": false},
            {"phrase": "hablar bien", "reverse": false},
        ]})))
        .mount(&server)
        .await;

    let outcome = glosbe(&server).fetch(&WorkItem::new("hablar"), TIMEOUT).await;
    let expected = Payload::text("말하다")
        .with_examples(vec!["hablar claro".to_string(), "hablar bien".to_string()]);
    assert_eq!(outcome, Outcome::Success(expected));
}

#[tokio::test]
async fn test_glosbe_examples_are_optional_unless_required() {
    let server = MockServer::start().await;
    mount_mymemory(
        &server,
        "casa",
        json!({"matches": [{"translation": "집", "match": 1, "quality": 90}]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/iapi3/similar/similarPhrasesMany"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let lenient = glosbe(&server).fetch(&WorkItem::new("casa"), TIMEOUT).await;
    assert_eq!(lenient, Outcome::Success(Payload::text("집")));

    let strict = glosbe(&server)
        .with_policy(strict())
        .fetch(&WorkItem::new("casa"), TIMEOUT)
        .await;
    assert_eq!(strict, Outcome::Failure(FailureReason::NoData));
}

#[tokio::test]
async fn test_glosbe_example_throttle_is_reported() {
    let server = MockServer::start().await;
    mount_mymemory(
        &server,
        "casa",
        json!({"matches": [{"translation": "집", "match": 1, "quality": 90}]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/iapi3/similar/similarPhrasesMany"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let lenient = glosbe(&server).fetch(&WorkItem::new("casa"), TIMEOUT).await;
    assert_eq!(lenient, Outcome::Failure(FailureReason::Throttled));

    let strict = glosbe(&server)
        .with_policy(strict())
        .fetch(&WorkItem::new("casa"), TIMEOUT)
        .await;
    assert_eq!(strict, Outcome::Failure(FailureReason::Throttled));
}

#[tokio::test]
async fn test_glosbe_page_fills_every_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/es/ko/casa"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CASA_PAGE))
        .mount(&server)
        .await;

    let outcome = glosbe_page(&server)
        .with_policy(strict())
        .fetch(&WorkItem::new("casa"), TIMEOUT)
        .await;

    let Outcome::Success(payload) = outcome else {
        panic!("expected a payload, got {outcome:?}");
    };
    assert_eq!(payload.translation, "집, 가정");
    assert_eq!(payload.attributes, vec!["noun", "feminine"]);
    assert_eq!(payload.audio, Some(format!("{}/fb_aud/es-casa.mp3", server.uri())));
    assert_eq!(
        payload.sentence,
        Some(SentencePair {
            source: "Mi casa es azul.".to_string(),
            native: "우리 집은 파랗다.".to_string(),
        })
    );
}

#[tokio::test]
async fn test_glosbe_page_missing_audio_and_unknown_words() {
    let server = MockServer::start().await;
    let without_audio = CASA_PAGE.replace("glosbe-audio", "other-button");
    Mock::given(method("GET"))
        .and(path("/es/ko/casa"))
        .respond_with(ResponseTemplate::new(200).set_body_string(without_audio))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/es/ko/xyz123"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let lenient = glosbe_page(&server).fetch(&WorkItem::new("casa"), TIMEOUT).await;
    match lenient {
        Outcome::Success(payload) => {
            assert_eq!(payload.audio, None);
            assert!(payload.sentence.is_some());
        }
        other => panic!("expected a payload, got {other:?}"),
    }

    let strict = glosbe_page(&server)
        .with_policy(strict())
        .fetch(&WorkItem::new("casa"), TIMEOUT)
        .await;
    assert_eq!(strict, Outcome::Failure(FailureReason::NoData));

    let unknown = glosbe_page(&server).fetch(&WorkItem::new("xyz123"), TIMEOUT).await;
    assert_eq!(unknown, Outcome::Failure(FailureReason::NoData));
}

#[tokio::test]
async fn test_glosbe_falls_back_to_google() {
    let server = MockServer::start().await;
    mount_mymemory(&server, "perro", json!({"matches": []})).await;
    Mock::given(method("GET"))
        .and(path("/translate_a/single"))
        .and(query_param("q", "perro"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[["개", "perro"]]])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/iapi3/similar/similarPhrasesMany"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"phrases": []})))
        .mount(&server)
        .await;

    let outcome = glosbe(&server).fetch(&WorkItem::new("perro"), TIMEOUT).await;
    assert_eq!(outcome, Outcome::Success(Payload::text("개")));

    let without = glosbe(&server)
        .without_fallback()
        .fetch(&WorkItem::new("perro"), TIMEOUT)
        .await;
    assert_eq!(without, Outcome::Failure(FailureReason::NoData));
}

#[tokio::test]
async fn test_probe_reports_throttle_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[["안녕", "hola"]]])))
        .mount(&server)
        .await;

    let connector = google(&server);
    assert!(!connector.probe().await);
    assert!(connector.probe().await);
}

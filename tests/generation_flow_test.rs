//! 言語モデル・翻訳サービスをモックした状態での生成フロー全体のテスト。
use std::sync::Arc;
use std::time::Duration;

use poll_guide_worker::clients::{
    AiAdapter, MyMemoryClient, OllamaClient, Translator, TranslatorConfig,
};
use poll_guide_worker::observability::metrics::Metrics;
use poll_guide_worker::pipeline::{GuideGenerator, LongTextTranslator, OptionGenerator};
use poll_guide_worker::store::{
    GuideStore, GuideType, MemoryGuideStore, OptionTally, TailFollowUp, VoteAggregate,
};
use prometheus::Registry;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new(Arc::new(Registry::new())).expect("metrics register"))
}

fn translation(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "responseData": {"translatedText": text},
        "responseStatus": 200
    }))
}

async fn mount_translation(server: &MockServer, langpair: &str, q: &str, translated: &str) {
    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("langpair", langpair))
        .and(query_param("q", q))
        .respond_with(translation(translated))
        .mount(server)
        .await;
}

fn translator(server: &MockServer) -> LongTextTranslator {
    let client = MyMemoryClient::new(TranslatorConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(2),
    })
    .expect("translator client builds");
    LongTextTranslator::new(Translator::new(Arc::new(client)), "ko", "en", 450, 2)
}

fn adapter(server: &MockServer) -> AiAdapter {
    let client = OllamaClient::new(server.uri(), "qwen3:8b", Duration::from_secs(5))
        .expect("model client builds");
    AiAdapter::new(Arc::new(client))
}

#[tokio::test]
async fn options_are_generated_and_localized() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "<think>\nThe user wants places.\n</think>\n1. Paris\n2. Tokyo\n3. Rome",
            "done": true
        })))
        .expect(1)
        .mount(&llm)
        .await;

    let translate = MockServer::start().await;
    mount_translation(&translate, "en|ko", "Paris", "파리").await;
    mount_translation(&translate, "en|ko", "Tokyo", "도쿄").await;
    mount_translation(&translate, "en|ko", "Rome", "로마").await;

    let generator = OptionGenerator::new(
        translator(&translate),
        adapter(&llm),
        2,
        Duration::from_secs(10),
        10,
        metrics(),
    );

    let result = generator
        .generate_options("Favorite Travel Destination", 3)
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.payload, vec!["파리", "도쿄", "로마"]);
}

#[tokio::test]
async fn translation_outage_does_not_abort_option_generation() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "1. Paris\n2. Tokyo",
            "done": true
        })))
        .mount(&llm)
        .await;

    let translate = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&translate)
        .await;

    let generator = OptionGenerator::new(
        translator(&translate),
        adapter(&llm),
        1,
        Duration::from_secs(10),
        10,
        metrics(),
    );

    let result = generator.generate_options("여행지", 2).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.payload, vec!["Paris", "Tokyo"]);
}

#[tokio::test]
async fn guide_is_generated_translated_and_persisted() {
    let llm = MockServer::start().await;
    let stream_body = concat!(
        "{\"response\":\"<think>outline\",\"done\":false}\n",
        "{\"response\":\"</think>Guide Title:\\n\",\"done\":false}\n",
        "{\"response\":\"Paris Trip\\n\\n\",\"done\":false}\n",
        "{\"response\":\"Guide Content:\\nVisit the tower.\",\"done\":false}\n",
        "{\"response\":\"\",\"done\":true}\n"
    );
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_string(stream_body))
        .expect(1)
        .mount(&llm)
        .await;

    let translate = MockServer::start().await;
    mount_translation(&translate, "en|ko", "Paris Trip", "파리 여행").await;
    mount_translation(&translate, "en|ko", "Visit the tower.", "탑을 방문하세요.").await;
    Mock::given(method("GET"))
        .and(path("/get"))
        .and(query_param("langpair", "ko|en"))
        .respond_with(translation("translated"))
        .mount(&translate)
        .await;

    let vote = VoteAggregate {
        vote_id: 21,
        title: "여행지 투표".into(),
        category: "travel".into(),
        options: vec![
            OptionTally {
                content: "파리".into(),
                count: 3,
            },
            OptionTally {
                content: "로마".into(),
                count: 1,
            },
        ],
        tail: Some(TailFollowUp {
            question: "이유는?".into(),
            answers: vec!["음식".into()],
        }),
    };
    let store = Arc::new(MemoryGuideStore::new(vec![vote.clone()]));
    let generator = GuideGenerator::new(
        translator(&translate),
        adapter(&llm),
        store.clone(),
        metrics(),
    );

    let record = generator.generate_guide(&vote).await.expect("guide generated");

    assert_eq!(record.title, "파리 여행");
    assert_eq!(record.content, "탑을 방문하세요.");
    assert_eq!(record.guide_type, GuideType::Ai);
    assert_eq!(store.guides().len(), 1);
    assert!(store.pending_votes().await.expect("pending").is_empty());
}

//! End-to-end reply scenarios against recorded model fixtures.
//!
//! Each test builds a real SQLite-backed knowledge base in a temp dir and
//! swaps only the model collaborators for scripted ones.

use std::sync::Arc;

use tempfile::TempDir;

use replymate_core::{DataPaths, PipelineSettings, Sentiment, Tone};
use replymate_data::{DataStore, MenuItem, Template};
use replymate_pipeline::testing::{FixedClassifier, ScriptedModel, VocabEmbedder};
use replymate_pipeline::{
    KnowledgeBase, PipelineStage, PromptSet, ReplyRequest, Services, DEFAULT_REWRITE_FEEDBACK,
};
use replymate_store::SqliteStore;

const DIM: usize = 64;

struct Harness {
    _dir: TempDir,
    services: Services,
    llm: Arc<ScriptedModel>,
}

fn seed(data: &DataStore) {
    data.save_templates(&[
        Template::new("맛있게 드셔주셔서 감사합니다. 또 찾아주십시오.", Sentiment::Positive, "taste_good", Tone::Polite),
        Template::new("맛있게 드셨다니 저희도 기뻐요~ 또 봬요^^", Sentiment::Positive, "taste_good", Tone::Friendly),
        Template::new("배달이 늦어 불편을 드려 죄송합니다.", Sentiment::Negative, "delivery_delay", Tone::Polite),
    ])
    .unwrap();
    data.save_menu(&[
        MenuItem {
            menu_name: "돈까스".into(),
            description: "소스는 따로 드려요. 에어프라이어 180도 3분이면 바삭해요".into(),
            category: "메인".into(),
        },
        MenuItem {
            menu_name: "냉모밀".into(),
            description: "면은 찬물에 한번 헹궈 드세요".into(),
            category: "면".into(),
        },
    ])
    .unwrap();
}

async fn harness(classifier: FixedClassifier, llm: ScriptedModel) -> Harness {
    let dir = TempDir::new().unwrap();
    let paths = DataPaths::new(dir.path()).unwrap();
    let data = Arc::new(DataStore::new(&paths, "길동 분식"));
    seed(&data);

    let store = SqliteStore::open(&paths.vectordb, DIM).unwrap();
    let knowledge = Arc::new(KnowledgeBase::new(
        Arc::new(store),
        Arc::new(VocabEmbedder::new(DIM)),
    ));
    assert!(knowledge.ensure_ready(&data).await.unwrap());

    let llm = Arc::new(llm);
    let services = Services::new(
        Arc::new(classifier),
        llm.clone(),
        knowledge,
        data,
        Arc::new(PromptSet::default()),
        PipelineSettings::default(),
    );
    Harness {
        _dir: dir,
        services,
        llm,
    }
}

#[tokio::test]
async fn formal_reply_addresses_customer_without_emoji() {
    let h = harness(
        FixedClassifier::new(Sentiment::Positive),
        ScriptedModel::pipeline(
            r#"{"category": "taste_good", "menu": null, "final_sentiment": "positive"}"#,
            "홍길동님, 맛있게 드셔주셔서 감사합니다~ 😊 다음에도 찾아주십시오^^",
        ),
    )
    .await;

    let state = h
        .services
        .pipeline()
        .run(ReplyRequest::new("정말 맛있었어요!", "홍길동", Tone::Polite))
        .await
        .unwrap();

    assert_eq!(state.stage, PipelineStage::Generated);
    let reply = state.final_reply.unwrap();
    assert!(reply.contains("홍길동님"));
    assert!(!reply.contains('~'));
    assert!(!reply.contains("😊"));
    assert!(!reply.contains("^^"));

    assert_eq!(state.store_name, "길동 분식");
    assert_eq!(
        state.retrieved_templates,
        vec!["맛있게 드셔주셔서 감사합니다. 또 찾아주십시오.".to_string()]
    );
    let system = &h.llm.system_prompts()[0];
    assert!(system.contains("FORMAL MODE"));
    assert!(system.contains("Customer Name: 홍길동"));
}

#[tokio::test]
async fn unknown_extracted_menu_yields_no_menu_facts() {
    let h = harness(
        FixedClassifier::new(Sentiment::Negative),
        ScriptedModel::pipeline(
            r#"{"category": "delivery_delay", "menu": "족발", "final_sentiment": "negative"}"#,
            "배달이 늦어 죄송합니다.",
        ),
    )
    .await;

    let state = h
        .services
        .pipeline()
        .run(ReplyRequest::new("배송이 너무 늦었어요", "", Tone::Polite))
        .await
        .unwrap();

    assert_eq!(state.extracted_menu.as_deref(), Some("족발"));
    assert!(state.retrieved_menus.is_empty());
    assert!(h.llm.system_prompts()[0].contains("Matched Menu Info: None"));
}

#[tokio::test]
async fn manual_menu_overrides_extracted_menu() {
    let h = harness(
        FixedClassifier::new(Sentiment::Positive),
        ScriptedModel::pipeline(
            r#"{"category": "taste_good", "menu": "족발", "final_sentiment": "positive"}"#,
            "감사합니다!",
        ),
    )
    .await;

    let state = h
        .services
        .pipeline()
        .run(ReplyRequest::new("바삭하고 맛있어요", "민지", Tone::Friendly).with_manual_menu("돈까스"))
        .await
        .unwrap();

    assert_eq!(state.retrieved_menus.len(), 1);
    assert!(state.retrieved_menus[0].starts_with("메뉴명: 돈까스"));
    assert!(h.llm.system_prompts()[0].contains("에어프라이어 180도 3분"));
}

#[tokio::test]
async fn extractor_failure_falls_back_to_baseline() {
    let h = harness(
        FixedClassifier::new(Sentiment::Negative),
        ScriptedModel::pipeline("죄송해요, 분석할 수 없어요.", "불편을 드려 죄송합니다."),
    )
    .await;

    let state = h
        .services
        .pipeline()
        .run(ReplyRequest::new("별로였어요", "", Tone::Polite))
        .await
        .unwrap();

    assert_eq!(state.sentiment, Some(Sentiment::Negative));
    assert_eq!(state.category.map(|c| c.as_str()), Some("service"));
    assert!(state.extracted_menu.is_none());
    assert!(state.final_reply.is_some());
}

#[tokio::test]
async fn classifier_failure_aborts_the_invocation() {
    let h = harness(
        FixedClassifier::failing(),
        ScriptedModel::pipeline("{}", "unused"),
    )
    .await;

    let result = h
        .services
        .pipeline()
        .run(ReplyRequest::new("맛있어요", "", Tone::Friendly))
        .await;
    assert!(result.is_err());
    assert!(h.llm.calls().is_empty());
}

#[tokio::test]
async fn rewrite_carries_feedback_into_prompt() {
    let h = harness(
        FixedClassifier::new(Sentiment::Positive),
        ScriptedModel::pipeline(
            r#"{"category": "taste_good", "menu": null, "final_sentiment": "positive"}"#,
            "또 와주세요!",
        ),
    )
    .await;
    let pipeline = h.services.pipeline();
    let request = ReplyRequest::new("맛있어요", "민지", Tone::Witty);

    let state = pipeline.rewrite(request.clone(), Some("더 짧게 써줘")).await.unwrap();
    assert_eq!(state.user_feedback.as_deref(), Some("더 짧게 써줘"));
    pipeline.rewrite(request, None).await.unwrap();

    let prompts = h.llm.system_prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("User Feedback"));
    assert!(prompts[0].contains("더 짧게 써줘"));
    assert!(prompts[1].contains(DEFAULT_REWRITE_FEEDBACK));
}

#[tokio::test]
async fn learned_tone_is_retrievable_and_reset_restores_seed() {
    let h = harness(
        FixedClassifier::new(Sentiment::Positive),
        ScriptedModel::new(|system, user| {
            Ok(if user.contains("owner's reply") {
                r#"{"sentiment": "positive", "category": "taste_good"}"#.to_string()
            } else if system.is_empty() {
                r#"{"category": "taste_good", "menu": null, "final_sentiment": "positive"}"#.to_string()
            } else {
                "감사해유~".to_string()
            })
        }),
    )
    .await;

    let trainer = h.services.trainer();
    trainer.learn("맛나게 드셨다니 고마워유~ 또 와유!").await.unwrap();

    let state = h
        .services
        .pipeline()
        .run(ReplyRequest::new("맛있어요", "", Tone::OwnerCustom))
        .await
        .unwrap();
    assert_eq!(
        state.retrieved_templates,
        vec!["맛나게 드셨다니 고마워유~ 또 와유!".to_string()]
    );

    assert_eq!(trainer.reset().await.unwrap(), 1);
    let templates = h.services.data.load_templates();
    assert_eq!(templates.len(), 3);
    assert!(templates.iter().all(|t| !t.is_owner_custom()));
    assert_eq!(h.services.knowledge.document_count().unwrap(), 5);
}

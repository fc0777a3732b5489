//! Search engine behaviour against a scripted inference client.
//!
//! No network, no pdfium: pages are synthetic images and every answer is
//! scripted per call, so these run everywhere.

use async_trait::async_trait;
use edgequake_docqa::{
    AnswerSearchEngine, DocQaError, DocumentLoader, DocumentSession, InferenceClient,
    InferenceError, InferenceParams, PageImage, RawAnswer, SearchConfig, SearchMode,
    SearchProgressCallback,
};
use image::{DynamicImage, GenericImageView, RgbaImage};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Test helpers ─────────────────────────────────────────────────────────────

type Scripted = Result<Vec<RawAnswer>, InferenceError>;

/// Replies to call `i` with `script[i]`; records what it was given.
struct ScriptedClient {
    script: Mutex<Vec<Scripted>>,
    seen: Mutex<Vec<Seen>>,
}

#[derive(Debug, Clone)]
struct Seen {
    question: String,
    size: (u32, u32),
    is_rgb8: bool,
    params: InferenceParams,
}

impl ScriptedClient {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        let mut script = script;
        script.reverse();
        Arc::new(Self {
            script: Mutex::new(script),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// One reply per page, each a single answer with this score.
    fn scores(scores: &[f64]) -> Arc<Self> {
        Self::new(
            scores
                .iter()
                .enumerate()
                .map(|(i, s)| Ok(vec![RawAnswer::new(format!("answer {}", i + 1), *s)]))
                .collect(),
        )
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn answer(
        &self,
        question: &str,
        image: &DynamicImage,
        params: &InferenceParams,
    ) -> Result<Vec<RawAnswer>, InferenceError> {
        self.seen.lock().unwrap().push(Seen {
            question: question.to_string(),
            size: image.dimensions(),
            is_rgb8: matches!(image, DynamicImage::ImageRgb8(_)),
            params: *params,
        });
        self.script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start(usize),
    PageStart(usize),
    PageDone(usize, usize),
    PageError(usize),
    Complete(usize, usize, usize),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl SearchProgressCallback for Recorder {
    fn on_search_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(Event::Start(total_pages));
    }
    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.events.lock().unwrap().push(Event::PageStart(page_num));
    }
    fn on_page_done(&self, done: usize, total: usize) {
        self.events.lock().unwrap().push(Event::PageDone(done, total));
    }
    fn on_page_error(&self, page_num: usize, _error: &str) {
        self.events.lock().unwrap().push(Event::PageError(page_num));
    }
    fn on_search_complete(&self, scanned: usize, total: usize, answers: usize) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Complete(scanned, total, answers));
    }
}

/// Route engine logs to the test harness; `RUST_LOG` overrides the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn pages(n: usize) -> Vec<PageImage> {
    (1..=n)
        .map(|i| PageImage::new(i, DynamicImage::ImageRgba8(RgbaImage::new(850, 1100))))
        .collect()
}

fn engine(client: Arc<ScriptedClient>) -> AnswerSearchEngine {
    init_tracing();
    AnswerSearchEngine::new(client, &SearchConfig::default())
}

fn http_err() -> Scripted {
    Err(InferenceError::Http("connection reset".into()))
}

// ── Scan policy ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn thorough_visits_every_page_regardless_of_scores() {
    let client = ScriptedClient::scores(&[0.9, 0.99, 0.95, 0.8]);
    let result = engine(client.clone())
        .search(&pages(4), "What is the total?", SearchMode::Thorough)
        .await
        .unwrap();

    assert_eq!(client.calls(), 4);
    assert_eq!(result.stats.pages_scanned, 4);
    assert!(!result.stats.stopped_early);
    assert_eq!(result.answers.len(), 4);
}

#[tokio::test]
async fn thorough_ranks_and_filters() {
    let client = ScriptedClient::scores(&[0.02, 0.0, 0.8]);
    let result = engine(client.clone())
        .search(&pages(3), "Who signed?", SearchMode::Thorough)
        .await
        .unwrap();

    assert_eq!(client.calls(), 3);
    let got: Vec<(usize, f64)> = result.answers.iter().map(|a| (a.page, a.score)).collect();
    assert_eq!(got, vec![(3, 0.8), (1, 0.02)]);
}

#[tokio::test]
async fn quick_stops_on_first_confident_page() {
    let client = ScriptedClient::scores(&[0.03, 0.06, 0.9, 0.9, 0.9]);
    let result = engine(client.clone())
        .search(&pages(5), "When is it due?", SearchMode::Quick)
        .await
        .unwrap();

    assert_eq!(client.calls(), 2);
    assert!(result.stats.stopped_early);
    assert_eq!(result.stats.pages_scanned, 2);
    assert!(result.answers.iter().any(|a| a.page == 2 && a.score == 0.06));
    assert_eq!(result.best().unwrap().page, 2);
}

#[tokio::test]
async fn quick_without_confident_answer_scans_everything() {
    let client = ScriptedClient::scores(&[0.02, 0.05, 0.04]);
    let result = engine(client.clone())
        .search(&pages(3), "q", SearchMode::Quick)
        .await
        .unwrap();

    assert_eq!(client.calls(), 3);
    assert!(!result.stats.stopped_early);
    assert_eq!(result.answers.len(), 3);
}

#[tokio::test]
async fn quick_stop_on_last_page_is_not_early() {
    let client = ScriptedClient::scores(&[0.0, 0.7]);
    let result = engine(client.clone())
        .search(&pages(2), "q", SearchMode::Quick)
        .await
        .unwrap();

    assert_eq!(client.calls(), 2);
    assert!(!result.stats.stopped_early);
}

#[tokio::test]
async fn quick_with_single_page() {
    let client = ScriptedClient::scores(&[0.5]);
    let result = engine(client.clone())
        .search(&pages(1), "q", SearchMode::Quick)
        .await
        .unwrap();
    assert_eq!(client.calls(), 1);
    assert_eq!(result.answers.len(), 1);
}

// ── Filtering and ranking ────────────────────────────────────────────────────

#[tokio::test]
async fn blank_and_low_candidates_never_appear() {
    let client = ScriptedClient::new(vec![Ok(vec![
        RawAnswer::new("  ", 0.9),
        RawAnswer::new("", 0.8),
        RawAnswer::new("low", 0.01),
        RawAnswer::new("  ACME Corp  ", 0.04),
    ])]);
    let result = engine(client)
        .search(&pages(1), "Who is the sender?", SearchMode::Thorough)
        .await
        .unwrap();

    assert_eq!(result.answers.len(), 1);
    assert_eq!(result.answers[0].text, "ACME Corp");
    assert_eq!(result.stats.raw_candidates, 4);
}

#[tokio::test]
async fn equal_scores_keep_discovery_order() {
    let client = ScriptedClient::new(vec![
        Ok(vec![RawAnswer::new("first", 0.03), RawAnswer::new("second", 0.03)]),
        Ok(vec![RawAnswer::new("third", 0.03)]),
    ]);
    let result = engine(client)
        .search(&pages(2), "q", SearchMode::Thorough)
        .await
        .unwrap();

    let texts: Vec<&str> = result.answers.iter().map(|a| a.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn no_answers_is_not_an_error() {
    let client = ScriptedClient::new(vec![Ok(vec![]), Ok(vec![])]);
    let result = engine(client)
        .search(&pages(2), "q", SearchMode::Quick)
        .await
        .unwrap();
    assert!(result.is_empty());
    assert!(result.failures.is_empty());
}

#[tokio::test]
async fn custom_thresholds_are_honoured() {
    let client = ScriptedClient::scores(&[0.2, 0.45, 0.6]);
    let config = SearchConfig::builder()
        .inclusion_threshold(0.3)
        .stop_threshold(0.5)
        .build()
        .unwrap();
    let result = AnswerSearchEngine::new(client.clone(), &config)
        .search(&pages(3), "q", SearchMode::Quick)
        .await
        .unwrap();

    assert_eq!(client.calls(), 3);
    let scores: Vec<f64> = result.answers.iter().map(|a| a.score).collect();
    assert_eq!(scores, vec![0.6, 0.45]);
}

// ── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_page_does_not_abort_thorough_scan() {
    let client = ScriptedClient::new(vec![
        Ok(vec![RawAnswer::new("one", 0.3)]),
        http_err(),
        Ok(vec![RawAnswer::new("three", 0.4)]),
    ]);
    let recorder = Arc::new(Recorder::default());
    let config = SearchConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    init_tracing();
    let result = AnswerSearchEngine::new(client.clone(), &config)
        .search(&pages(3), "q", SearchMode::Thorough)
        .await
        .unwrap();

    assert_eq!(client.calls(), 3);
    let pages_found: Vec<usize> = result.answers.iter().map(|a| a.page).collect();
    assert_eq!(pages_found, vec![3, 1]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].page(), 2);
    assert_eq!(result.stats.failed_pages, 1);
    assert_eq!(result.stats.pages_scanned, 3);
    assert!(recorder.events().contains(&Event::PageError(2)));
}

#[tokio::test]
async fn failing_page_does_not_trigger_quick_stop() {
    let client = ScriptedClient::new(vec![http_err(), http_err(), Ok(vec![])]);
    let result = engine(client.clone())
        .search(&pages(3), "q", SearchMode::Quick)
        .await
        .unwrap();

    assert_eq!(client.calls(), 3);
    assert_eq!(result.failures.len(), 2);
    assert!(result.is_empty());
}

#[tokio::test]
async fn failed_page_does_not_block_later_quick_stop() {
    let client = ScriptedClient::new(vec![
        http_err(),
        Ok(vec![RawAnswer::new("hit", 0.9)]),
        Ok(vec![RawAnswer::new("never asked", 0.9)]),
    ]);
    let result = engine(client.clone())
        .search(&pages(3), "q", SearchMode::Quick)
        .await
        .unwrap();

    assert_eq!(client.calls(), 2);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].page(), 1);
    assert_eq!(result.answers.len(), 1);
    assert_eq!(result.answers[0].page, 2);
    assert_eq!(result.answers[0].text, "hit");
    assert!(result.stats.stopped_early);
    assert_eq!(result.stats.pages_scanned, 2);
}

#[tokio::test]
async fn every_page_failing_still_returns() {
    let client = ScriptedClient::new(vec![http_err(), http_err()]);
    let result = engine(client)
        .search(&pages(2), "q", SearchMode::Thorough)
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.stats.failed_pages, 2);
}

// ── Question validation ──────────────────────────────────────────────────────

#[tokio::test]
async fn blank_question_makes_no_calls() {
    let client = ScriptedClient::scores(&[0.9]);
    let recorder = Arc::new(Recorder::default());
    let config = SearchConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let engine = AnswerSearchEngine::new(client.clone(), &config);

    for q in ["", "   ", "\n\t"] {
        let err = engine.search(&pages(3), q, SearchMode::Quick).await.unwrap_err();
        assert!(matches!(err, DocQaError::EmptyQuestion));
    }
    assert_eq!(client.calls(), 0);
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn question_is_trimmed_before_sending() {
    let client = ScriptedClient::scores(&[0.0]);
    let result = engine(client.clone())
        .search(&pages(1), "  What is the date?  ", SearchMode::Quick)
        .await
        .unwrap();
    assert_eq!(client.seen()[0].question, "What is the date?");
    assert_eq!(result.question, "What is the date?");
}

// ── What the client receives ─────────────────────────────────────────────────

#[tokio::test]
async fn client_gets_rgb_capped_image_and_params() {
    let client = ScriptedClient::scores(&[0.0]);
    let big = vec![PageImage::new(
        1,
        DynamicImage::ImageRgba8(RgbaImage::new(2000, 1000)),
    )];
    engine(client.clone())
        .search(&big, "q", SearchMode::Thorough)
        .await
        .unwrap();

    let seen = &client.seen()[0];
    assert_eq!(seen.size, (1000, 500));
    assert!(seen.is_rgb8);
    assert_eq!(seen.params.top_k, 3);
    assert_eq!(seen.params.max_length, 512);
    assert_eq!(seen.params.max_answer_length, 200);
}

#[tokio::test]
async fn stored_page_is_not_modified() {
    let client = ScriptedClient::scores(&[0.0]);
    let doc = pages(1);
    engine(client)
        .search(&doc, "q", SearchMode::Thorough)
        .await
        .unwrap();
    assert_eq!((doc[0].width(), doc[0].height()), (850, 1100));
    assert!(matches!(doc[0].image(), DynamicImage::ImageRgba8(_)));
}

#[tokio::test]
async fn probe_skips_resize_and_filtering() {
    let client = ScriptedClient::new(vec![Ok(vec![RawAnswer::new("tiny", 0.001)])]);
    let big = vec![PageImage::new(
        1,
        DynamicImage::ImageRgba8(RgbaImage::new(2000, 1000)),
    )];
    let raw = engine(client.clone()).probe(&big, "q").await.unwrap();

    assert_eq!(raw, vec![RawAnswer::new("tiny", 0.001)]);
    let seen = &client.seen()[0];
    assert_eq!(seen.size, (2000, 1000));
    assert!(seen.is_rgb8);
}

/// Answers nothing after a fixed delay.
struct SlowClient(Duration);

#[async_trait]
impl InferenceClient for SlowClient {
    fn name(&self) -> &str {
        "slow"
    }

    async fn answer(
        &self,
        _question: &str,
        _image: &DynamicImage,
        _params: &InferenceParams,
    ) -> Result<Vec<RawAnswer>, InferenceError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn inference_time_sums_page_calls() {
    init_tracing();
    let engine = AnswerSearchEngine::new(
        Arc::new(SlowClient(Duration::from_millis(30))),
        &SearchConfig::default(),
    );
    let result = engine
        .search(&pages(2), "q", SearchMode::Thorough)
        .await
        .unwrap();

    assert!(result.stats.inference_duration_ms >= 60);
    assert!(result.stats.inference_duration_ms <= result.stats.total_duration_ms);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_events_follow_the_scan() {
    let client = ScriptedClient::scores(&[0.0, 0.9, 0.9]);
    let recorder = Arc::new(Recorder::default());
    let config = SearchConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    AnswerSearchEngine::new(client, &config)
        .search(&pages(3), "q", SearchMode::Quick)
        .await
        .unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            Event::Start(3),
            Event::PageStart(1),
            Event::PageDone(1, 3),
            Event::PageStart(2),
            Event::PageDone(2, 3),
            Event::Complete(2, 3, 1),
        ]
    );
}

// ── Session ──────────────────────────────────────────────────────────────────

struct FixedLoader(usize);

#[async_trait]
impl DocumentLoader for FixedLoader {
    async fn load(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageImage>, DocQaError> {
        Ok(pages(self.0))
    }
}

struct BrokenLoader;

#[async_trait]
impl DocumentLoader for BrokenLoader {
    async fn load(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageImage>, DocQaError> {
        Err(DocQaError::PasswordRequired)
    }
}

#[tokio::test]
async fn session_refuses_search_without_document() {
    let client = ScriptedClient::scores(&[0.9]);
    let session = DocumentSession::new();
    let err = session
        .search("q", SearchMode::Quick, &engine(client.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, DocQaError::NoDocumentLoaded));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn session_searches_loaded_document() {
    let client = ScriptedClient::scores(&[0.0, 0.3]);
    let mut session = DocumentSession::new();
    session.load("doc.pdf", b"%PDF", &FixedLoader(2)).await.unwrap();

    let result = session
        .search("q", SearchMode::Thorough, &engine(client))
        .await
        .unwrap();
    assert_eq!(result.answers[0].page, 2);
}

#[tokio::test]
async fn session_failed_load_disables_search() {
    let client = ScriptedClient::scores(&[0.9]);
    let mut session = DocumentSession::new();
    session.load("a.pdf", b"%PDF", &FixedLoader(1)).await.unwrap();

    let err = session.load("b.pdf", b"%PDF", &BrokenLoader).await.unwrap_err();
    assert!(matches!(err, DocQaError::PasswordRequired));

    let err = session
        .search("q", SearchMode::Quick, &engine(client))
        .await
        .unwrap_err();
    assert!(matches!(err, DocQaError::NoDocumentLoaded));
}

#[tokio::test]
async fn session_blank_question_checked_before_document() {
    let client = ScriptedClient::scores(&[0.9]);
    let session = DocumentSession::new();
    let err = session
        .search("  ", SearchMode::Quick, &engine(client))
        .await
        .unwrap_err();
    assert!(matches!(err, DocQaError::EmptyQuestion));
}

// ── Serialisation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn result_is_json_serialisable() {
    let client = ScriptedClient::new(vec![
        Ok(vec![RawAnswer::new("INV-0042", 0.87)]),
        http_err(),
    ]);
    let result = engine(client)
        .search(&pages(2), "What is the invoice number?", SearchMode::Thorough)
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["answers"][0]["text"], "INV-0042");
    assert_eq!(json["answers"][0]["page"], 1);
    assert_eq!(json["stats"]["mode"], "thorough");
    assert_eq!(json["failures"].as_array().unwrap().len(), 1);
    assert_eq!(result.answers[0].confidence_percent(), "87.00%");
}

#[test]
fn callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Recorder>();
    assert_send_sync::<edgequake_docqa::NoopProgressCallback>();
    assert_send_sync::<AnswerSearchEngine>();
}

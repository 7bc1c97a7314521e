//! End-to-end budgeting scenarios through the public API.

use promptgate_config::{BudgetConfig, DocsOrdering};
use promptgate_core::{
    ChatTurn, GenerationRequest, HeuristicTokenizer, PromptError, PromptPayload, SectionName,
    TokenizerAdapter,
};
use promptgate_prompt::{PromptAssembler, PromptFormat};

/// 500 turns of about ten tokens each once rendered.
fn long_history() -> Vec<ChatTurn> {
    (0..500)
        .map(|i| ChatTurn::new(format!("question {i:03}"), format!("answer {i:03}")))
        .collect()
}

fn who_are_you(model_max_length: usize) -> GenerationRequest {
    GenerationRequest::builder("Who are you?", model_max_length)
        .min_reserved_new_tokens(512)
        .max_new_tokens(1024)
        .chat_history(long_history())
        .build()
        .unwrap()
}

#[test]
fn long_history_is_trimmed_to_leave_generation_room() {
    let tok = HeuristicTokenizer::new(4096);
    let config = BudgetConfig::default();
    let prompt = PromptAssembler::new(&tok, &config)
        .assemble(&who_are_you(4096))
        .unwrap();

    assert!(prompt.realized_token_count <= 3584);
    assert!(prompt.effective_max_new_tokens >= 512);
    assert!(prompt.metadata.history_dropped > 0);
    assert_eq!(
        prompt.metadata.history_kept + prompt.metadata.history_dropped,
        500
    );
    // The newest turn always survives, right before the question.
    assert!(prompt.text().unwrap().ends_with("<bot>: answer 499\n\nWho are you?"));
}

#[test]
fn long_history_in_chat_template_mode() {
    let tok = HeuristicTokenizer::new(4096);
    let config = BudgetConfig::default();
    let prompt = PromptAssembler::new(&tok, &config)
        .with_format(PromptFormat::ChatTemplate)
        .assemble(&who_are_you(4096))
        .unwrap();

    assert!(prompt.realized_token_count <= 3584);
    assert!(prompt.effective_max_new_tokens >= 512);
    let PromptPayload::Messages(messages) = &prompt.payload else {
        panic!("expected messages");
    };
    assert_eq!(messages.last().unwrap().content, "Who are you?");
    assert_eq!(messages.len(), prompt.metadata.history_kept * 2 + 1);
}

#[test]
fn dangling_turns_never_reach_the_prompt() {
    let tok = HeuristicTokenizer::new(4096);
    let config = BudgetConfig::default();
    let req = GenerationRequest::builder("And then?", 4096)
        .chat_history(vec![
            ChatTurn::new("first", "one"),
            ChatTurn::dangling("this request failed"),
            ChatTurn::new("second", "two"),
        ])
        .build()
        .unwrap();
    let prompt = PromptAssembler::new(&tok, &config).assemble(&req).unwrap();
    let text = prompt.text().unwrap();
    assert!(!text.contains("this request failed"));
    assert_eq!(prompt.metadata.history_kept, 2);
}

#[test]
fn pure_empty_request_is_rejected() {
    let tok = HeuristicTokenizer::new(2048);
    let config = BudgetConfig::default();
    let req = GenerationRequest::builder("", 2048).build().unwrap();
    let err = PromptAssembler::new(&tok, &config).assemble(&req).unwrap_err();
    assert!(matches!(err, PromptError::PromptTooLarge { .. }));
}

#[test]
fn language_hints_alone_do_not_make_a_request() {
    let tok = HeuristicTokenizer::new(2048);
    let config = BudgetConfig::default();
    let req = GenerationRequest::builder("", 2048)
        .language_hints("Answer in French.", "Remember: French only.")
        .build()
        .unwrap();
    let err = PromptAssembler::new(&tok, &config).assemble(&req).unwrap_err();
    assert!(matches!(err, PromptError::PromptTooLarge { .. }));
}

#[test]
fn documents_alone_make_a_request() {
    let tok = HeuristicTokenizer::new(2048);
    let config = BudgetConfig::default();
    let req = GenerationRequest::builder("", 2048)
        .documents(vec!["The launch is on Tuesday.".into()])
        .build()
        .unwrap();
    let prompt = PromptAssembler::new(&tok, &config).assemble(&req).unwrap();
    assert_eq!(prompt.text(), Some("The launch is on Tuesday."));
}

#[test]
fn reverse_ucurve_places_best_document_last() {
    let tok = HeuristicTokenizer::new(4096);
    let config = BudgetConfig {
        docs_ordering: DocsOrdering::ReverseUcurve,
        ..BudgetConfig::default()
    };
    let docs = ["D1", "D2", "D3", "D4"].map(String::from).to_vec();
    let req = GenerationRequest::builder("Which document matters?", 4096)
        .documents(docs)
        .build()
        .unwrap();
    let prompt = PromptAssembler::new(&tok, &config).assemble(&req).unwrap();
    let documents = prompt
        .sections
        .iter()
        .find(|s| s.name == SectionName::Documents)
        .unwrap();
    assert_eq!(documents.text, "D2\n\nD4\n\nD3\n\nD1");
}

#[test]
fn oversized_document_is_truncated_and_reported() {
    let tok = HeuristicTokenizer::new(1024);
    let config = BudgetConfig::default();
    let req = GenerationRequest::builder("Summarize.", 1024)
        .min_reserved_new_tokens(256)
        .documents(vec!["w".repeat(20_000), "short".into()])
        .build()
        .unwrap();
    let prompt = PromptAssembler::new(&tok, &config).assemble(&req).unwrap();
    let selection = &prompt.metadata.documents;
    assert_eq!(selection.selected_count, 1);
    assert_eq!(selection.available_count, 2);
    let kept = selection.single_document_truncation_length.unwrap();
    assert!(kept > 0 && kept < 20_000);
    assert!(prompt.realized_token_count <= 768);
}

#[test]
fn input_caps_shrink_the_budget() {
    let tok = HeuristicTokenizer::new(4096);
    let config = BudgetConfig::default();
    let req = GenerationRequest::builder("Who are you?", 4096)
        .min_reserved_new_tokens(512)
        .max_total_input_tokens(Some(1536))
        .chat_history(long_history())
        .build()
        .unwrap();
    let prompt = PromptAssembler::new(&tok, &config).assemble(&req).unwrap();
    assert_eq!(prompt.metadata.initial_budget, 1024);
    assert!(prompt.realized_token_count <= 1024);
}

#[test]
fn metadata_serializes_for_reporting() {
    let tok = HeuristicTokenizer::new(4096);
    let config = BudgetConfig::default();
    let prompt = PromptAssembler::new(&tok, &config)
        .assemble(&who_are_you(4096))
        .unwrap();
    let json = serde_json::to_value(&prompt.metadata).unwrap();
    assert_eq!(json["format"], "plain");
    assert_eq!(json["initial_budget"], 3584);
    assert_eq!(json["sections"].as_array().unwrap().len(), 8);
    assert!(json.get("warnings").is_none());
    assert_eq!(
        json["realized_token_count"],
        tok.count_tokens(prompt.text().unwrap())
    );
}

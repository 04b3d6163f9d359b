//! Tests for synchronous conversation turns.

mod common;

use serde_json::json;

use common::{DecodeRecord, FakeEngine, REPLY_TAG};
use gg_converse::conversation::{
    Conversation, ConversationConfig, ConversationError, ConversationState,
    DataProcessorArguments, Message, Preface, Tool,
};
use gg_converse::engine::{EngineError, InputData, Modality, SessionConfig};

fn conversation(engine: &FakeEngine) -> Conversation {
    let config = ConversationConfig::create_default(engine, Preface::default(), None, None).unwrap();
    Conversation::create(engine, config).unwrap()
}

fn weather_preface() -> Preface {
    Preface {
        instructions: Some("Answer with tools when useful.".into()),
        tools: vec![Tool {
            name: "get_weather".into(),
            description: "Current weather for a city".into(),
            parameters: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        }],
        ..Default::default()
    }
}

// =============================================================================
// History
// =============================================================================

#[test]
fn test_three_turns_yield_six_history_entries() {
    let engine = FakeEngine::new(&["Hello", " there", "!"]);
    let conv = conversation(&engine);

    for prompt in ["one", "two", "three"] {
        conv.send_message(Message::from(prompt), None).unwrap();
    }

    let history = conv.get_history();
    assert_eq!(history.len(), 6);
    assert_eq!(history[0], Message::from("one"));
    assert_eq!(history[2], Message::from("two"));
    assert_eq!(history[4], Message::from("three"));
    for reply in [&history[1], &history[3], &history[5]] {
        assert_eq!(reply.role(), Some("assistant"));
        assert_eq!(reply.text_content(), "Hello there!");
    }
}

#[test]
fn test_reply_uses_assistant_chunk_shape() {
    let engine = FakeEngine::new(&["Hi", "."]);
    let conv = conversation(&engine);
    let reply = conv.send_message(Message::from("hello"), None).unwrap();
    assert_eq!(
        reply,
        Message::Json(json!({
            "role": "assistant",
            "content": [{"type": "text", "text": "Hi."}],
        }))
    );
}

#[test]
fn test_access_history_sees_completed_turns() {
    let engine = FakeEngine::new(&["ok"]);
    let conv = conversation(&engine);
    conv.send_message(Message::from("a"), None).unwrap();
    conv.send_message(Message::from("b"), None).unwrap();
    let (len, last_role) = conv.access_history(|history| {
        (history.len(), history.last().and_then(|m| m.role()).map(str::to_string))
    });
    assert_eq!(len, 4);
    assert_eq!(last_role.as_deref(), Some("assistant"));
}

#[test]
fn test_sequence_message_appends_each_element() {
    let engine = FakeEngine::new(&["done"]);
    let conv = conversation(&engine);
    let message = Message::from_json(json!([
        {"role": "user", "content": "first"},
        {"role": "user", "content": "second"},
    ]))
    .unwrap();
    conv.send_message(message, None).unwrap();

    let history = conv.get_history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].text_content(), "first");
    assert_eq!(history[1].text_content(), "second");
}

// =============================================================================
// Prompt rendering and prefill
// =============================================================================

#[test]
fn test_prefill_inputs_follow_template() {
    let engine = FakeEngine::new(&["ok"]);
    let conv = conversation(&engine);
    conv.send_message(Message::from("Hi"), None).unwrap();

    let journal = engine.journal.lock();
    assert_eq!(journal.prefills.len(), 2);
    assert_eq!(journal.prefills[0], vec![InputData::Text("<bos>".into())]);
    assert_eq!(
        journal.prefills[1],
        vec![InputData::Text(
            "<start_of_turn>user\nHi<end_of_turn>\n<start_of_turn>model\n".into()
        )]
    );
}

#[test]
fn test_only_final_turn_gets_generation_prompt() {
    let engine = FakeEngine::new(&["ok"]);
    let conv = conversation(&engine);
    let message = Message::from_json(json!([
        {"role": "system", "content": "Be terse."},
        {"role": "user", "content": "Hi"},
    ]))
    .unwrap();
    conv.send_message(message, None).unwrap();

    let journal = engine.journal.lock();
    // bos, then one prefill per element.
    assert_eq!(journal.prefills.len(), 3);
    assert_eq!(
        journal.prefills[1],
        vec![InputData::Text("<start_of_turn>user\nBe terse.<end_of_turn>\n".into())]
    );
    let InputData::Text(last) = &journal.prefills[2][0] else {
        panic!("expected text input");
    };
    assert!(last.ends_with("<start_of_turn>model\n"));
}

#[test]
fn test_preface_is_prefilled_once() {
    let engine = FakeEngine::new(&["ok"]);
    let config = ConversationConfig::create_default(&engine, weather_preface(), None, None).unwrap();
    let conv = Conversation::create(&engine, config).unwrap();
    conv.send_message(Message::from("a"), None).unwrap();
    conv.send_message(Message::from("b"), None).unwrap();

    let journal = engine.journal.lock();
    let preface_prefills = journal
        .prefills
        .iter()
        .filter(|inputs| matches!(&inputs[0], InputData::Text(t) if t.contains("get_weather")))
        .count();
    assert_eq!(preface_prefills, 1);
    assert_eq!(journal.prefills.len(), 3);
}

#[test]
fn test_image_part_becomes_media_input() {
    let engine = FakeEngine::new(&["a cat"]);
    let session = SessionConfig {
        modalities: vec![Modality::Text, Modality::Image],
        ..SessionConfig::default()
    };
    let config =
        ConversationConfig::from_session_config(&engine, session, Preface::default(), None).unwrap();
    let conv = Conversation::create(&engine, config).unwrap();
    let message = Message::from_json(json!({
        "role": "user",
        "content": [{"type": "text", "text": "What is this?"}, {"type": "image", "blob": "img-1"}],
    }))
    .unwrap();
    conv.send_message(message, None).unwrap();

    let journal = engine.journal.lock();
    assert!(journal.prefills[1].contains(&InputData::Image("img-1".into())));
}

#[test]
fn test_unrecognized_parts_never_reach_history() {
    let engine = FakeEngine::new(&["seen"]);
    let conv = conversation(&engine);
    let raw = json!({
        "role": "user",
        "content": [
            {"type": "video", "blob": "v"},
            {"type": "text", "text": "hi"},
        ],
    });
    conv.send_message(Message::Json(raw), None).unwrap();

    let history = conv.get_history();
    let Message::Json(stored) = &history[0] else {
        panic!("expected structured user message");
    };
    assert_eq!(stored["content"].as_array().unwrap().len(), 1);
    assert_eq!(stored["content"][0], json!({"type": "text", "text": "hi"}));
    assert!(!stored.to_string().contains("video"));
}

#[test]
fn test_sequence_elements_are_normalized_before_history() {
    let engine = FakeEngine::new(&["ok"]);
    let conv = conversation(&engine);
    let raw = json!([
        {"role": "user", "content": [{"type": "sticker", "id": 4}, {"type": "text", "text": "a"}]},
        {"role": "assistant", "content": "b"},
        {"role": "user", "content": [{"type": "text", "text": "c"}, {"kind": "mystery"}]},
    ]);
    conv.send_message(Message::Json(raw), None).unwrap();

    let history = conv.get_history();
    assert_eq!(history.len(), 4);
    let user_text = |text: &str| {
        Message::Json(json!({"role": "user", "content": [{"type": "text", "text": text}]}))
    };
    assert_eq!(history[0], user_text("a"));
    assert_eq!(history[2], user_text("c"));
}

// =============================================================================
// Engine-supplied data processor
// =============================================================================

#[test]
fn test_engine_supplied_processor_builds_replies() {
    let engine = FakeEngine::new(&["Hi", " there"]).with_tagged_replies();
    let conv = conversation(&engine);

    let reply = conv.send_message(Message::from("hello"), None).unwrap();
    let expected = Message::assistant_text(&format!("{REPLY_TAG}Hi there"));
    assert_eq!(reply, expected);
    assert_eq!(conv.get_history()[1], expected);
}

#[test]
fn test_default_processor_leaves_replies_untagged() {
    let engine = FakeEngine::new(&["Hi"]);
    let conv = conversation(&engine);
    let reply = conv.send_message(Message::from("hello"), None).unwrap();
    assert_eq!(reply, Message::assistant_text("Hi"));
}

// =============================================================================
// Validation before side effects
// =============================================================================

#[test]
fn test_malformed_message_is_rejected_without_prefill() {
    let engine = FakeEngine::new(&["ok"]);
    let conv = conversation(&engine);
    let err = conv
        .send_message(Message::Json(json!({"role": "user", "content": 5})), None)
        .unwrap_err();
    assert!(matches!(err, ConversationError::InvalidMessage(_)));
    assert!(engine.journal.lock().prefills.is_empty());
    assert!(conv.get_history().is_empty());
}

#[test]
fn test_image_rejected_when_modality_not_enabled() {
    let engine = FakeEngine::new(&["ok"]);
    let conv = conversation(&engine);
    let message = Message::from_json(json!({
        "role": "user",
        "content": [{"type": "image", "blob": "img"}],
    }))
    .unwrap();
    let err = conv.send_message(message, None).unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(engine.journal.lock().prefills.is_empty());
}

#[test]
fn test_missing_template_fails_configuration() {
    let engine = FakeEngine::new(&["ok"]).without_template();
    let err = ConversationConfig::create_default(&engine, Preface::default(), None, None).unwrap_err();
    assert!(matches!(err, ConversationError::InvalidConfig(_)));
}

#[test]
fn test_invalid_sampler_fails_configuration() {
    let engine = FakeEngine::new(&["ok"]);
    let mut session = SessionConfig::default();
    session.sampler.top_p = 1.5;
    let err = ConversationConfig::from_session_config(&engine, session, Preface::default(), None)
        .unwrap_err();
    assert!(err.to_string().contains("p must be in [0, 1]"));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_decode_failure_appends_nothing() {
    let engine = FakeEngine::new(&["a", "b", "c"]).failing_decode_after(1);
    let conv = conversation(&engine);
    let err = conv.send_message(Message::from("hi"), None).unwrap_err();
    match err {
        ConversationError::Generation(inner) => assert!(inner.is_resource_exhausted()),
        other => panic!("unexpected error: {other}"),
    }
    assert!(conv.get_history().is_empty());
    assert_eq!(conv.state(), ConversationState::Idle);
}

#[test]
fn test_prefill_failure_surfaces_engine_error() {
    let engine = FakeEngine::new(&["a"]).failing_prefill();
    let conv = conversation(&engine);
    let err = conv.send_message(Message::from("hi"), None).unwrap_err();
    assert!(matches!(err, ConversationError::Generation(EngineError::ModelError(_))));
    assert!(conv.get_history().is_empty());
}

#[test]
fn test_zero_tokens_is_failure_not_empty_success() {
    let engine = FakeEngine::new(&[]);
    let conv = conversation(&engine);
    let err = conv.send_message(Message::from("hi"), None).unwrap_err();
    assert!(matches!(err, ConversationError::EmptyOutput));
    assert!(conv.get_history().is_empty());
}

// =============================================================================
// Decode configuration
// =============================================================================

#[test]
fn test_per_call_token_limit_caps_decode() {
    let engine = FakeEngine::new(&["a", "b", "c", "d"]);
    let conv = conversation(&engine);
    let args = DataProcessorArguments { max_output_tokens: Some(2), ..Default::default() };
    let reply = conv.send_message(Message::from("hi"), Some(args)).unwrap();
    assert_eq!(reply.text_content(), "ab");
    assert_eq!(
        engine.journal.lock().decodes[0],
        DecodeRecord { max_output_tokens: Some(2), constrained: false }
    );
}

#[test]
fn test_session_limit_applies_without_arguments() {
    let engine = FakeEngine::new(&["a"]);
    let conv = conversation(&engine);
    conv.send_message(Message::from("hi"), None).unwrap();
    let expected = conv.config().session_config().max_output_tokens;
    assert_eq!(engine.journal.lock().decodes[0].max_output_tokens, Some(expected));
}

// =============================================================================
// Tool calls
// =============================================================================

#[test]
fn test_tool_block_becomes_tool_calls() {
    let engine = FakeEngine::new(&[
        "```tool_code\n",
        "[get_weather(city='Paris')]",
        "\n```",
        " and more",
    ])
    .constraining_tools();
    let config = ConversationConfig::create_default(&engine, weather_preface(), None, None).unwrap();
    let conv = Conversation::create(&engine, config).unwrap();

    let reply = conv.send_message(Message::from("Weather in Paris?"), None).unwrap();
    let Message::Json(value) = reply else {
        panic!("expected structured reply");
    };
    assert_eq!(value["tool_calls"][0]["function"]["name"], "get_weather");
    assert_eq!(value["tool_calls"][0]["function"]["arguments"]["city"], "Paris");
    // The constraint stopped decoding right after the block closed.
    assert!(engine.journal.lock().decodes[0].constrained);
    assert!(!value.to_string().contains(" and more"));
    assert!(!conv.get_history()[1].text_content().contains(" and more"));
}

#[test]
fn test_malformed_tool_block_stays_plain_text() {
    let engine = FakeEngine::new(&["```tool_code\n", "[get_weather(city=)]", "\n```"]);
    let config = ConversationConfig::create_default(&engine, weather_preface(), None, None).unwrap();
    let conv = Conversation::create(&engine, config).unwrap();

    let reply = conv.send_message(Message::from("Weather?"), None).unwrap();
    let Message::Json(value) = reply else {
        panic!("expected structured reply");
    };
    assert!(value.get("tool_calls").is_none());
    assert_eq!(value["content"][0]["text"], "```tool_code\n[get_weather(city=)]\n```");
}

#[test]
fn test_disabled_tool_calls_skip_constraint() {
    let engine = FakeEngine::new(&["plain"]).constraining_tools();
    let config = ConversationConfig::create_default(&engine, weather_preface(), None, None).unwrap();
    let conv = Conversation::create(&engine, config).unwrap();
    let args = DataProcessorArguments { disable_tool_calls: true, ..Default::default() };
    conv.send_message(Message::from("hi"), Some(args)).unwrap();
    assert!(!engine.journal.lock().decodes[0].constrained);
}

// =============================================================================
// Benchmark info
// =============================================================================

#[test]
fn test_benchmark_info_counts_turns() {
    let engine = FakeEngine::new(&["a", "b"]);
    let conv = conversation(&engine);
    conv.send_message(Message::from("one"), None).unwrap();
    conv.send_message(Message::from("two"), None).unwrap();

    let info = conv.get_benchmark_info().unwrap();
    // bos prefill plus one per turn.
    assert_eq!(info.num_prefill_turns(), 3);
    assert_eq!(info.num_decode_turns(), 2);
    let rate = info.decode_tokens_per_sec(0).unwrap();
    assert!((rate - 100.0).abs() < 1e-9);
    assert!(info.time_to_first_token.is_some());
}

use crosstalk_test_adapter::{PresetReply, ScriptedAdapter};
use tokio_util::sync::CancellationToken;

use super::normalize_reply;
use crate::{
    ConversationBroker, EngineConfig, ModelTag, Speaker, StopCondition,
    SystemPrompts, TranscriptEvent,
};

fn broker_with(
    a_replies: &[PresetReply],
    b_replies: &[PresetReply],
    config: EngineConfig,
) -> ConversationBroker {
    let model_a = ScriptedAdapter::new("alpha");
    for reply in a_replies {
        model_a.add_reply(reply.clone());
    }
    let model_b = ScriptedAdapter::new("beta");
    for reply in b_replies {
        model_b.add_reply(reply.clone());
    }
    ConversationBroker::new(
        model_a,
        model_b,
        config,
        SystemPrompts::shared("Keep it short."),
    )
}

fn drain_statuses(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<TranscriptEvent>,
) -> Vec<String> {
    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let TranscriptEvent::Status { text } = event {
            statuses.push(text);
        }
    }
    statuses
}

#[test]
fn test_normalize_reply() {
    assert_eq!(normalize_reply("A: Hello"), "Hello");
    assert_eq!(normalize_reply("  b : Hello"), "Hello");
    assert_eq!(normalize_reply("Hello"), "Hello");
    assert_eq!(normalize_reply("  Hello  \n"), "Hello");
    // Only the first label comes off.
    assert_eq!(normalize_reply("A: B: nested"), "B: nested");
    // A label not at the start stays.
    assert_eq!(
        normalize_reply("I think A: means model A"),
        "I think A: means model A"
    );
    assert_eq!(normalize_reply(""), "");
    assert_eq!(normalize_reply("A:"), "");
}

#[tokio::test]
async fn test_two_turn_conversation() {
    let mut broker = broker_with(
        &[PresetReply::with_fragments(["A: Hello ", "there."])],
        &[PresetReply::with_fragments(["B: Hi!"])],
        EngineConfig {
            max_turns: 2,
            stop_condition: StopCondition::MaxTurns,
        },
    );
    let mut rx = broker.transcript().subscribe();

    broker
        .start("Introduce yourselves.", &CancellationToken::new())
        .await
        .unwrap();

    let entries = broker.transcript().entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].speaker, Speaker::User);
    assert_eq!(entries[1].speaker, Speaker::Model(ModelTag::A));
    assert_eq!(entries[1].content, "Hello there.");
    assert_eq!(entries[2].speaker, Speaker::Model(ModelTag::B));
    assert_eq!(entries[2].content, "Hi!");
    assert_eq!(broker.turn_count(), 2);

    assert_eq!(
        drain_statuses(&mut rx),
        [
            "Turn 1: A (alpha)",
            "Turn 2: B (beta)",
            "Conversation finished.",
        ]
    );
}

#[tokio::test]
async fn test_strict_alternation() {
    let mut broker = broker_with(
        &[
            PresetReply::with_fragments(["first"]),
            PresetReply::with_fragments(["third"]),
        ],
        &[
            PresetReply::with_fragments(["second"]),
            PresetReply::with_fragments(["fourth"]),
        ],
        EngineConfig {
            max_turns: 4,
            stop_condition: StopCondition::MaxTurns,
        },
    );
    broker.run(&CancellationToken::new()).await.unwrap();

    let speakers: Vec<_> = broker
        .transcript()
        .entries()
        .iter()
        .map(|entry| entry.speaker)
        .collect();
    assert_eq!(
        speakers,
        [
            Speaker::Model(ModelTag::A),
            Speaker::Model(ModelTag::B),
            Speaker::Model(ModelTag::A),
            Speaker::Model(ModelTag::B),
        ]
    );
}

#[tokio::test]
async fn test_checklist_empty_stop() {
    let mut broker = broker_with(
        &[PresetReply::with_fragments(["Plan:\n- [ ] write the intro"])],
        &[PresetReply::with_fragments(["All boxes ticked."])],
        EngineConfig {
            max_turns: 8,
            stop_condition: StopCondition::ChecklistEmpty,
        },
    );
    broker.run(&CancellationToken::new()).await.unwrap();

    // A's reply still had an open item; B's reply cleared it.
    assert_eq!(broker.turn_count(), 2);
}

#[tokio::test]
async fn test_mid_stream_cancellation_commits_nothing() {
    let mut broker = broker_with(
        &[PresetReply::with_fragments(["one", "two", "three"])],
        &[],
        EngineConfig {
            max_turns: 4,
            stop_condition: StopCondition::MaxTurns,
        },
    );
    broker.add_user_message("Go.");
    let mut rx = broker.transcript().subscribe();

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        let mut rx = broker.transcript().subscribe();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if matches!(event, TranscriptEvent::Chunk { .. }) {
                    cancel.cancel();
                    break;
                }
            }
        })
    };

    broker.run(&cancel).await.unwrap();
    watcher.await.unwrap();

    // Only the user message survived; the aborted turn left no trace.
    let entries = broker.transcript().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].speaker, Speaker::User);
    assert_eq!(broker.turn_count(), 0);
    assert_eq!(
        drain_statuses(&mut rx).last().map(String::as_str),
        Some("Conversation stopped.")
    );
}

#[tokio::test]
async fn test_spent_token_needs_replacement() {
    let mut broker = broker_with(
        &[PresetReply::with_fragments(["Hello"])],
        &[],
        EngineConfig {
            max_turns: 1,
            stop_condition: StopCondition::MaxTurns,
        },
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    broker.run(&cancel).await.unwrap();
    assert_eq!(broker.turn_count(), 0);

    // A fired token is inert; a fresh one lets the run proceed.
    broker.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(broker.turn_count(), 1);
}

#[tokio::test]
async fn test_out_of_band_turn() {
    let mut broker = broker_with(
        &[PresetReply::with_fragments(["opening"])],
        &[PresetReply::with_fragments(["forced"])],
        EngineConfig {
            max_turns: 1,
            stop_condition: StopCondition::MaxTurns,
        },
    );
    broker.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(broker.turn_count(), 1);

    broker
        .run_model_turn(ModelTag::B, &CancellationToken::new())
        .await
        .unwrap();

    let entries = broker.transcript().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].speaker, Speaker::Model(ModelTag::B));
    assert_eq!(entries[1].content, "forced");
    assert_eq!(broker.turn_count(), 2);
}

#[tokio::test]
async fn test_start_always_opens_with_a() {
    // B would be next after A's out-of-band turn, but a fresh start
    // hands the opening turn back to A. B has no script, so any turn
    // routed to it would fail.
    let mut broker = broker_with(
        &[
            PresetReply::with_fragments(["first"]),
            PresetReply::with_fragments(["second"]),
        ],
        &[],
        EngineConfig {
            max_turns: 2,
            stop_condition: StopCondition::MaxTurns,
        },
    );
    broker
        .run_model_turn(ModelTag::A, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(broker.turn_count(), 1);

    broker
        .start("Begin again.", &CancellationToken::new())
        .await
        .unwrap();

    let speakers: Vec<_> = broker
        .transcript()
        .entries()
        .iter()
        .map(|entry| entry.speaker)
        .collect();
    assert_eq!(
        speakers,
        [
            Speaker::Model(ModelTag::A),
            Speaker::User,
            Speaker::Model(ModelTag::A),
        ]
    );
}

#[tokio::test]
async fn test_adapter_error_is_attributed() {
    let mut broker = broker_with(
        &[PresetReply::failing("backend exploded")],
        &[],
        EngineConfig {
            max_turns: 2,
            stop_condition: StopCondition::MaxTurns,
        },
    );
    let err = broker.run(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.adapter(), "alpha");
    assert!(err.to_string().contains("alpha"));

    // The failed turn committed nothing.
    assert!(broker.transcript().is_empty());
    assert_eq!(broker.turn_count(), 0);
}

#[tokio::test]
async fn test_reset() {
    let mut broker = broker_with(
        &[
            PresetReply::with_fragments(["first run"]),
            PresetReply::with_fragments(["second run"]),
        ],
        &[],
        EngineConfig {
            max_turns: 1,
            stop_condition: StopCondition::MaxTurns,
        },
    );
    broker.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(broker.turn_count(), 1);

    broker.reset();
    assert!(broker.transcript().is_empty());
    assert_eq!(broker.turn_count(), 0);

    // A opens again after a reset.
    broker.run(&CancellationToken::new()).await.unwrap();
    let entries = broker.transcript().entries();
    assert_eq!(entries[0].speaker, Speaker::Model(ModelTag::A));
    assert_eq!(entries[0].content, "second run");
}

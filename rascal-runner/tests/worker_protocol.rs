use std::io::Cursor;
use std::time::{Duration, Instant};

use rascal_core::{ChannelItem, FrameWriter, Procedure, RunInputs, ScriptedEngine};
use rascal_runner::worker;
use rascal_runner::Channel;
use serde_json::json;

/// Runs the worker entry point in-process and reads its output back
/// through a channel.
fn round_trip(procedure: Procedure, display: bool, script: serde_json::Value) -> Vec<ChannelItem> {
    let mut writer = FrameWriter::new(Vec::new());
    let inputs = RunInputs::new(json!({ "script": script }));
    worker::run(&mut writer, &inputs, procedure, display, &ScriptedEngine).unwrap();

    let mut channel = Channel::open(Cursor::new(writer.into_inner()));
    let mut items = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !channel.is_closed() {
        assert!(Instant::now() < deadline, "channel never closed");
        items.extend(channel.drain(Duration::from_millis(200)));
    }
    channel.close();
    items
}

fn terminal_count(items: &[ChannelItem]) -> usize {
    items.iter().filter(|item| item.is_terminal()).count()
}

#[test]
fn test_exactly_one_terminal_item_last() {
    let scripts = [
        json!({"steps": []}),
        json!({"steps": [{"message": "a"}, {"progress": {"fraction": 0.1}}]}),
        json!({"steps": [{"message": "a"}, {"fail": {"kind": "numerical", "message": "diverged"}}]}),
        json!({"steps": [{"panic": "boom"}, {"message": "never"}]}),
    ];
    for procedure in Procedure::ALL {
        for display in [true, false] {
            for script in &scripts {
                let items = round_trip(procedure, display, script.clone());
                assert_eq!(terminal_count(&items), 1, "{procedure} {display} {script}");
                assert!(items.last().is_some_and(ChannelItem::is_terminal));
            }
        }
    }
}

#[test]
fn test_display_off_has_no_events() {
    let items = round_trip(
        Procedure::Dream,
        false,
        json!({"steps": [{"message": "chain 1"}, {"progress": {"fraction": 0.5}}]}),
    );
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], ChannelItem::Result(_)));
}

#[test]
fn test_event_order_preserved() {
    let steps: Vec<_> = (0..200)
        .map(|i| json!({"message": format!("line {i}")}))
        .collect();
    let items = round_trip(Procedure::Simplex, true, json!({ "steps": steps }));
    let messages: Vec<&str> = items
        .iter()
        .filter_map(|item| match item {
            ChannelItem::Message(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(messages.len(), 202);
    assert_eq!(messages[0], "Starting simplex");
    for (i, text) in messages[1..201].iter().enumerate() {
        assert_eq!(*text, format!("line {i}"));
    }
    assert_eq!(messages[201], "Finished simplex");
}

use serde_json::{Value, json};

use super::super::playback::PlayerEvent;

pub(super) const TIME_POS_OBSERVER_ID: u64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PlayerSignal {
    Event(PlayerEvent),
    /// The viewer closed the player window or the IPC connection dropped.
    Closed,
}

/// Maps one line of mpv's JSON IPC stream to a playback signal.
///
/// Command replies and events that carry no playback meaning (including the
/// `end-file` mpv emits for a file replaced by `loadfile`) yield `None`.
pub(crate) fn parse_ipc_line(line: &str) -> Option<PlayerSignal> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    let event = value.get("event")?.as_str()?;
    match event {
        "file-loaded" => Some(PlayerSignal::Event(PlayerEvent::Ready)),
        "end-file" => match value.get("reason").and_then(Value::as_str) {
            Some("eof") => Some(PlayerSignal::Event(PlayerEvent::Ended)),
            Some("error") => Some(PlayerSignal::Event(PlayerEvent::Error)),
            Some("quit") => Some(PlayerSignal::Closed),
            _ => None,
        },
        "property-change" => {
            if value.get("name").and_then(Value::as_str) != Some("time-pos") {
                return None;
            }
            let position = value.get("data")?.as_f64()?;
            Some(PlayerSignal::Event(PlayerEvent::TimeUpdate(position)))
        }
        "shutdown" => Some(PlayerSignal::Closed),
        _ => None,
    }
}

pub(super) fn command_line(args: Value) -> String {
    let mut line = json!({ "command": args }).to_string();
    line.push('\n');
    line
}

pub(super) fn observe_time_pos() -> String {
    command_line(json!(["observe_property", TIME_POS_OBSERVER_ID, "time-pos"]))
}

pub(super) fn set_property(name: &str, value: Value) -> String {
    command_line(json!(["set_property", name, value]))
}

pub(super) fn loadfile(url: &str) -> String {
    command_line(json!(["loadfile", url, "replace"]))
}

pub(super) fn quit() -> String {
    command_line(json!(["quit"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_loaded_is_ready() {
        assert_eq!(
            parse_ipc_line(r#"{"event":"file-loaded"}"#),
            Some(PlayerSignal::Event(PlayerEvent::Ready))
        );
    }

    #[test]
    fn end_file_reasons_map_to_events() {
        assert_eq!(
            parse_ipc_line(r#"{"event":"end-file","reason":"eof","playlist_entry_id":1}"#),
            Some(PlayerSignal::Event(PlayerEvent::Ended))
        );
        assert_eq!(
            parse_ipc_line(r#"{"event":"end-file","reason":"error","file_error":"loading failed"}"#),
            Some(PlayerSignal::Event(PlayerEvent::Error))
        );
        assert_eq!(
            parse_ipc_line(r#"{"event":"end-file","reason":"quit"}"#),
            Some(PlayerSignal::Closed)
        );
        assert_eq!(parse_ipc_line(r#"{"event":"end-file","reason":"stop"}"#), None);
    }

    #[test]
    fn time_pos_changes_become_time_updates() {
        assert_eq!(
            parse_ipc_line(r#"{"event":"property-change","id":1,"name":"time-pos","data":93.25}"#),
            Some(PlayerSignal::Event(PlayerEvent::TimeUpdate(93.25)))
        );
        assert_eq!(
            parse_ipc_line(r#"{"event":"property-change","id":1,"name":"time-pos","data":null}"#),
            None
        );
        assert_eq!(
            parse_ipc_line(r#"{"event":"property-change","id":2,"name":"pause","data":true}"#),
            None
        );
    }

    #[test]
    fn replies_and_garbage_are_ignored() {
        assert_eq!(parse_ipc_line(r#"{"request_id":0,"error":"success"}"#), None);
        assert_eq!(parse_ipc_line("not json"), None);
        assert_eq!(parse_ipc_line(""), None);
    }

    #[test]
    fn commands_are_newline_terminated_json() {
        assert_eq!(
            loadfile("https://host/a"),
            "{\"command\":[\"loadfile\",\"https://host/a\",\"replace\"]}\n"
        );
        assert_eq!(
            set_property("time-pos", json!(92.0)),
            "{\"command\":[\"set_property\",\"time-pos\",92.0]}\n"
        );
        assert_eq!(
            observe_time_pos(),
            "{\"command\":[\"observe_property\",1,\"time-pos\"]}\n"
        );
    }
}

use serde_json::Value;

use crate::types::{ActorId, Direction};

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Input { actor: ActorId, dir: Direction },
    Start,
    Restart,
    Autopilot { actor: ActorId, enabled: bool },
    Ping { t: f64 },
}

/// Decodes one text frame from the presentation client. Anything malformed,
/// including unknown directions or actors, yields `None`.
pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "input" => {
            let actor = parse_actor(object.get("actor"))?;
            let dir = Direction::parse_move(object.get("dir")?.as_str()?)?;
            Some(ParsedClientMessage::Input { actor, dir })
        }
        "start" => Some(ParsedClientMessage::Start),
        "restart" => Some(ParsedClientMessage::Restart),
        "autopilot" => {
            let actor = parse_actor(object.get("actor"))?;
            let enabled = match object.get("enabled") {
                None => true,
                Some(value) => value.as_bool()?,
            };
            Some(ParsedClientMessage::Autopilot { actor, enabled })
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_actor(value: Option<&Value>) -> Option<ActorId> {
    ActorId::parse(value?.as_str()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_input_message() {
        let parsed = parse_client_message(r#"{"type":"input","actor":"b","dir":"left"}"#)
            .expect("input message should parse");
        assert_eq!(
            parsed,
            ParsedClientMessage::Input {
                actor: ActorId::B,
                dir: Direction::Left,
            }
        );
    }

    #[test]
    fn parse_input_accepts_none_direction() {
        let parsed = parse_client_message(r#"{"type":"input","actor":"A","dir":"none"}"#);
        assert!(matches!(
            parsed,
            Some(ParsedClientMessage::Input {
                actor: ActorId::A,
                dir: Direction::None,
            })
        ));
    }

    #[test]
    fn parse_input_rejects_invalid_direction_or_actor() {
        assert!(parse_client_message(r#"{"type":"input","actor":"a","dir":"invalid"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"input","actor":"c","dir":"up"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"input","dir":"up"}"#).is_none());
    }

    #[test]
    fn parse_lifecycle_commands() {
        assert_eq!(
            parse_client_message(r#"{"type":"start"}"#),
            Some(ParsedClientMessage::Start)
        );
        assert_eq!(
            parse_client_message(r#"{"type":"restart"}"#),
            Some(ParsedClientMessage::Restart)
        );
    }

    #[test]
    fn parse_autopilot_defaults_to_enabled() {
        assert_eq!(
            parse_client_message(r#"{"type":"autopilot","actor":"a"}"#),
            Some(ParsedClientMessage::Autopilot {
                actor: ActorId::A,
                enabled: true,
            })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"autopilot","actor":"b","enabled":false}"#),
            Some(ParsedClientMessage::Autopilot {
                actor: ActorId::B,
                enabled: false,
            })
        );
        assert!(parse_client_message(r#"{"type":"autopilot","actor":"b","enabled":1}"#).is_none());
    }

    #[test]
    fn parse_ping_requires_number() {
        let parsed = parse_client_message(r#"{"type":"ping","t":12.5}"#);
        assert_eq!(parsed, Some(ParsedClientMessage::Ping { t: 12.5 }));
        assert!(parse_client_message(r#"{"type":"ping","t":"soon"}"#).is_none());
    }

    #[test]
    fn unknown_or_malformed_frames_are_ignored() {
        assert!(parse_client_message("not json").is_none());
        assert!(parse_client_message(r#"["input"]"#).is_none());
        assert!(parse_client_message(r#"{"type":"lobby_start"}"#).is_none());
    }
}

//! Parser events delivered to the conductor
//!
//! The terminal emulator's DCS parser is the upstream producer of these
//! events. The types here double as the CLI transcript format, so they all
//! carry serde derives.

use serde::{Deserialize, Serialize};

/// Which family of command a `command-end` boundary closes.
///
/// A non-framing conductor can live inside a framing parent; the boundary
/// kind is what lets an event find the right conductor in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// Framer command boundary (`"f"`)
    #[serde(rename = "f")]
    Framer,
    /// Regular command boundary (`"r"`)
    #[serde(rename = "r")]
    Regular,
}

impl BoundaryKind {
    /// Parse the one-character wire token
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "f" => Some(Self::Framer),
            "r" => Some(Self::Regular),
            _ => None,
        }
    }

    /// One-character wire token
    pub fn token(&self) -> &'static str {
        match self {
            Self::Framer => "f",
            Self::Regular => "r",
        }
    }
}

/// One event out of the DCS parser, as recorded in a replay transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ParserEvent {
    /// A full line of command output
    Line { text: String, depth: u32 },
    /// The remote began executing the in-flight command
    CommandBegin { id: String, depth: u32 },
    /// The remote finished the in-flight command
    CommandEnd {
        id: String,
        kind: BoundaryKind,
        status: i32,
        depth: u32,
    },
    /// Output from a specific remote process on a numbered channel
    SideChannelOutput {
        text: String,
        pid: i32,
        channel: u8,
        depth: u32,
    },
    /// A framed process exited
    Terminate { pid: i32, code: i32, depth: u32 },
    /// The remote framer was disabled; raw passthrough from here on
    Unhook { depth: u32 },
    /// A `:recovery:` banner line
    RecoveryLine { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_tokens() {
        assert_eq!(BoundaryKind::from_token("f"), Some(BoundaryKind::Framer));
        assert_eq!(BoundaryKind::from_token("r"), Some(BoundaryKind::Regular));
        assert_eq!(BoundaryKind::from_token("x"), None);
        assert_eq!(BoundaryKind::Framer.token(), "f");
    }

    #[test]
    fn test_transcript_roundtrip() {
        let events = vec![
            ParserEvent::Line {
                text: "/bin/bash".to_string(),
                depth: 0,
            },
            ParserEvent::CommandEnd {
                id: "1".to_string(),
                kind: BoundaryKind::Regular,
                status: 0,
                depth: 0,
            },
            ParserEvent::Terminate {
                pid: 5678,
                code: 0,
                depth: 0,
            },
        ];

        let json = serde_json::to_string(&events).unwrap();
        let parsed: Vec<ParserEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(json.contains("\"kind\":\"r\""));
    }
}

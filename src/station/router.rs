//! Inbound text classification.
//!
//! Every inbound message is classified exactly once into a closed set of
//! actions instead of string-matching its way through the handling code.
//! Control keywords are honored only from trusted peers (members of the
//! scheduler's target set); from anyone else the same text is plain free
//! text, which keeps strangers from steering the station.

use crate::station::{MAX_INTERVAL_SECONDS, MIN_INTERVAL_SECONDS};

/// A recognized control keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Pause the auto-send scheduler.
    Stop,
    /// Resume the auto-send scheduler.
    Start,
    /// Change the auto-send interval to this many seconds.
    Freq(u32),
    /// FREQ with an unparseable or out-of-range argument; carries the raw
    /// argument text for the rejection reply. State is never mutated.
    FreqInvalid(String),
    /// Report current signal quality and channel load.
    RadioCheck,
    /// Report current environment sensor readings.
    WeatherCheck,
    /// List the accepted keywords.
    Keywords,
    /// Enable the conversational responder (may trigger a model load).
    ResponderOn,
    /// Disable the conversational responder.
    ResponderOff,
}

/// What to do with one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterAction {
    /// Trusted peer issued a control keyword.
    Command(Command),
    /// Route to the conversational responder (rate limit applies).
    FreeText,
    /// Ordinary traffic; record in the ledger only.
    Log,
}

/// Parse `text` as a control keyword. Matching is case-insensitive and
/// ignores surrounding whitespace. Returns None for anything that is not
/// keyword-shaped at all.
pub fn parse_keyword(text: &str) -> Option<Command> {
    let normalized = text.trim().to_uppercase();
    match normalized.as_str() {
        "STOP" => Some(Command::Stop),
        "START" => Some(Command::Start),
        "RADIOCHECK" => Some(Command::RadioCheck),
        "WEATHERCHECK" => Some(Command::WeatherCheck),
        "KEYWORDS" => Some(Command::Keywords),
        "RESPONDERON" => Some(Command::ResponderOn),
        "RESPONDEROFF" => Some(Command::ResponderOff),
        _ => {
            let arg = normalized.strip_prefix("FREQ")?.trim();
            if arg.is_empty() {
                return Some(Command::FreqInvalid(String::new()));
            }
            match arg.parse::<u32>() {
                Ok(n) if (MIN_INTERVAL_SECONDS..=MAX_INTERVAL_SECONDS).contains(&n) => {
                    Some(Command::Freq(n))
                }
                _ => Some(Command::FreqInvalid(arg.to_string())),
            }
        }
    }
}

/// Classify one inbound message.
///
/// `trusted` is whether the peer is in the scheduler's target set;
/// `responder_active` is whether the free-text path currently accepts input.
pub fn route(text: &str, trusted: bool, responder_active: bool) -> RouterAction {
    if trusted {
        if let Some(cmd) = parse_keyword(text) {
            return RouterAction::Command(cmd);
        }
    }
    if responder_active && !text.trim().is_empty() {
        RouterAction::FreeText
    } else {
        RouterAction::Log
    }
}

/// Reply body for the KEYWORDS query.
pub fn keywords_reply() -> String {
    format!(
        "STOP START FREQ<{MIN_INTERVAL_SECONDS}-{MAX_INTERVAL_SECONDS}> \
         RADIOCHECK WEATHERCHECK KEYWORDS RESPONDERON RESPONDEROFF"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_parse_case_insensitively() {
        assert_eq!(parse_keyword("stop"), Some(Command::Stop));
        assert_eq!(parse_keyword("  Start "), Some(Command::Start));
        assert_eq!(parse_keyword("RadioCheck"), Some(Command::RadioCheck));
        assert_eq!(parse_keyword("WEATHERCHECK"), Some(Command::WeatherCheck));
        assert_eq!(parse_keyword("keywords"), Some(Command::Keywords));
        assert_eq!(parse_keyword("responderon"), Some(Command::ResponderOn));
        assert_eq!(parse_keyword("RESPONDEROFF"), Some(Command::ResponderOff));
    }

    #[test]
    fn freq_parses_in_range_values_only() {
        assert_eq!(parse_keyword("FREQ120"), Some(Command::Freq(120)));
        assert_eq!(parse_keyword("freq 3600"), Some(Command::Freq(3600)));
        assert_eq!(
            parse_keyword("FREQ15"),
            Some(Command::FreqInvalid("15".to_string()))
        );
        assert_eq!(
            parse_keyword("FREQ9999"),
            Some(Command::FreqInvalid("9999".to_string()))
        );
        assert_eq!(
            parse_keyword("FREQfast"),
            Some(Command::FreqInvalid("FAST".to_string()))
        );
        assert_eq!(
            parse_keyword("FREQ"),
            Some(Command::FreqInvalid(String::new()))
        );
    }

    #[test]
    fn ordinary_text_is_not_a_keyword() {
        assert_eq!(parse_keyword("hello there"), None);
        assert_eq!(parse_keyword("stop it please"), None);
        assert_eq!(parse_keyword(""), None);
    }

    #[test]
    fn trusted_keyword_becomes_a_command() {
        assert_eq!(
            route("STOP", true, false),
            RouterAction::Command(Command::Stop)
        );
    }

    #[test]
    fn untrusted_keyword_is_plain_text() {
        assert_eq!(route("STOP", false, true), RouterAction::FreeText);
        assert_eq!(route("STOP", false, false), RouterAction::Log);
    }

    #[test]
    fn free_text_goes_to_the_responder_only_when_active() {
        assert_eq!(route("how are you", true, true), RouterAction::FreeText);
        assert_eq!(route("how are you", true, false), RouterAction::Log);
        assert_eq!(route("   ", true, true), RouterAction::Log);
    }
}

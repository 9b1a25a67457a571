// Outbound parameter synthesis
//
// Builders for the parameter sets a telephony network would send to the
// application: the per-call base set plus the advance-specific extras.

use std::cell::RefCell;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::options::{AdvanceOptions, CallIdentity};
use crate::http::Params;

thread_local! {
    static FAST_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_entropy());
}

pub const CALL_SID: &str = "CallSid";
pub const FROM: &str = "From";
pub const TO: &str = "To";
pub const ANSWERED_BY: &str = "AnsweredBy";
pub const CALL_STATUS: &str = "CallStatus";
pub const DIRECTION: &str = "Direction";
pub const CALLED: &str = "Called";
pub const DIGITS: &str = "Digits";
pub const SPEECH_RESULT: &str = "SpeechResult";
pub const STABLE_SPEECH_RESULT: &str = "StableSpeechResult";
pub const UNSTABLE_SPEECH_RESULT: &str = "UnstableSpeechResult";

pub const DEFAULT_CALL_STATUS: &str = "in-progress";
pub const DEFAULT_FINISH_ON_KEY: &str = "#";

/// Caller input collected inside a gather
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatherInput {
    /// DTMF digits, finish key already stripped
    Digits(String),
    /// Final speech recognition result
    Speech(String),
}

impl GatherInput {
    pub(crate) fn to_params(&self) -> Params {
        let mut params = Params::new();
        match self {
            GatherInput::Digits(digits) => params.set(DIGITS, digits.as_str()),
            GatherInput::Speech(text) => params.set(SPEECH_RESULT, text.as_str()),
        }
        params
    }
}

/// Generate a call identifier: "CA" followed by 32 hex digits
pub fn generate_call_sid() -> String {
    FAST_RNG.with(|rng| {
        let val: u128 = rng.borrow_mut().gen();
        format!("CA{:032x}", val)
    })
}

/// The canonical parameter set carried by every request of a call.
/// `call_status` falls back to "in-progress".
pub(crate) fn build_base_params(identity: &CallIdentity, call_status: Option<&str>) -> Params {
    let mut params = Params::new();
    params.set(CALL_SID, identity.sid.as_str());
    params.set(FROM, identity.from.as_str());
    params.set(TO, identity.to.as_str());
    params.set(
        ANSWERED_BY,
        if identity.is_machine { "machine" } else { "human" },
    );
    params.set(CALL_STATUS, call_status.unwrap_or(DEFAULT_CALL_STATUS));
    params.set(DIRECTION, identity.direction.as_str());
    if let Some(called) = &identity.called {
        params.set(CALLED, called.as_str());
    }
    params
}

/// Layer the request parameters: base set < advance extras < caller overrides
pub(crate) fn build_request_params(
    identity: &CallIdentity,
    extra: &Params,
    options: &AdvanceOptions,
) -> Params {
    let mut params = build_base_params(identity, options.call_status.as_deref());
    params.merge(extra);
    params.merge(&options.params);
    params
}

/// Strip exactly one trailing finish key. An empty key disables stripping,
/// and digits without the key are sent unchanged (timeout submission).
pub fn strip_finish_key<'a>(digits: &'a str, finish_key: &str) -> &'a str {
    if finish_key.is_empty() {
        return digits;
    }
    digits.strip_suffix(finish_key).unwrap_or(digits)
}

/// Partial speech callback parameters
pub(crate) fn build_partial_params(stable: &str, unstable: &str) -> Params {
    let mut params = Params::new();
    params.set(STABLE_SPEECH_RESULT, stable);
    params.set(UNSTABLE_SPEECH_RESULT, unstable);
    params
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Digits followed by the finish key are sent without it.
        #[test]
        fn prop_finish_key_stripped(
            digits in "[0-9]{0,12}",
            key in prop_oneof!["#", "\\*"]
        ) {
            let pressed = format!("{}{}", digits, key);
            prop_assert_eq!(strip_finish_key(&pressed, &key), digits.as_str());
        }

        /// Digits without a finish key are sent unchanged.
        #[test]
        fn prop_digits_without_key_unchanged(
            digits in "[0-9]{0,12}",
            key in prop_oneof!["#", "\\*"]
        ) {
            prop_assert_eq!(strip_finish_key(&digits, &key), digits.as_str());
        }
    }
}

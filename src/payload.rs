//! SMS-MO payload synthesis.
//!
//! One call to [`incoming_mo`] produces one complete `SMS_MO` document for a
//! destination: a random subscriber number, one shortcode and one message
//! text drawn uniformly from the destination's pools, a fresh correlation id
//! and the current received time. The remaining fields are gateway
//! boilerplate and stay fixed. Random choices come from a caller-supplied
//! [`Rng`] so tests can seed them.

use chrono::Utc;
use rand::{Rng, seq::SliceRandom};

use crate::config::Destination;

/// Operator id stamped into every message (AT&T).
const OPERATOR_ID: &str = "383";

/// Builds one `SMS_MO` document for `dest`.
pub fn incoming_mo(dest: &Destination, rng: &mut impl Rng) -> String {
    // SAFETY: config validation rejects empty shortcode/message pools
    let shortcode = *dest.shortcodes.choose(rng).unwrap();
    let text = dest.messages.choose(rng).unwrap();
    let now = Utc::now();

    format!(
        r#"<?xml version="1.0" ?>
<SMS_MO>
<MSISDN>{msisdn}</MSISDN>
<ORIGINATING_ADDRESS>{shortcode}</ORIGINATING_ADDRESS>
<MESSAGE>{text}</MESSAGE>
<PARAMETERS>
  <OPERATORID>{operator_id}</OPERATORID>
  <ACCOUNTID>19823</ACCOUNTID>
  <MESSAGEID>{message_id}</MESSAGEID>
  <OPERATOR_INFORMATION>
    <OPERATOR_STANDARD>GSM</OPERATOR_STANDARD>
    <OPERATOR_CODE>
      <MCC>310</MCC>
      <MNC>20</MNC>
    </OPERATOR_CODE>
  </OPERATOR_INFORMATION>
  <DCS>7b</DCS>
  <CLASS>2</CLASS>
  <RECEIVED_SERVICENUMBER>83118</RECEIVED_SERVICENUMBER>
  <KEYWORD>VELTI</KEYWORD>
  <RECEIVEDTIME>
    <DATE>{date}</DATE>
    <TIME>{time}</TIME>
  </RECEIVEDTIME>
</PARAMETERS>
</SMS_MO>
"#,
        msisdn = subscriber_number(rng),
        shortcode = shortcode,
        text = text,
        operator_id = OPERATOR_ID,
        message_id = correlation_id(rng),
        date = now.format("%a, %d %b %Y"),
        time = now.format("%H:%M:%S"),
    )
}

/// Synthetic subscriber number: the `693` mobile prefix plus seven random
/// digits.
pub fn subscriber_number(rng: &mut impl Rng) -> String {
    format!("693{:07}", rng.gen_range(1..=1_000_000))
}

/// Correlation id unique enough to trace one message through the gateway.
pub fn correlation_id(rng: &mut impl Rng) -> String {
    format!("moblast{}{}", Utc::now().timestamp_millis(), rng.gen_range(1..=1_000_000))
}

//! Continuation tokens carried in button custom ids.
//!
//! A token replays the submission context when a button is pressed, so no
//! pending-review state is kept anywhere else. Wire format:
//!
//! ```text
//! <origin_message_id>|<origin_channel_id>:<attachment_index>*<display_name>
//! ```
//!
//! The numeric fields are plain decimal digits; `display_name` is free text and
//! therefore comes last and takes the rest of the string.
use thiserror::Error;

/// Discord rejects component custom ids longer than this (in characters).
pub const MAX_CONTROL_ID_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing '{0}' delimiter")]
    MissingDelimiter(char),
    #[error("{field} is not a decimal integer: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("{0} must be a non-zero snowflake")]
    ZeroId(&'static str),
    #[error("unknown control id: {0:?}")]
    UnknownAction(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub origin_message_id: u64,
    pub origin_channel_id: u64,
    pub attachment_index: usize,
    pub display_name: String,
}

impl Token {
    pub fn new(
        origin_message_id: u64,
        origin_channel_id: u64,
        attachment_index: usize,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            origin_message_id,
            origin_channel_id,
            attachment_index,
            display_name: display_name.into(),
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}|{}:{}*{}",
            self.origin_message_id, self.origin_channel_id, self.attachment_index, self.display_name
        )
    }

    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let (message_id, rest) = raw
            .split_once('|')
            .ok_or(DecodeError::MissingDelimiter('|'))?;
        let (channel_id, rest) = rest
            .split_once(':')
            .ok_or(DecodeError::MissingDelimiter(':'))?;
        let (index, display_name) = rest
            .split_once('*')
            .ok_or(DecodeError::MissingDelimiter('*'))?;

        Ok(Self {
            origin_message_id: parse_snowflake("origin_message_id", message_id)?,
            origin_channel_id: parse_snowflake("origin_channel_id", channel_id)?,
            attachment_index: parse_decimal("attachment_index", index)?,
            display_name: display_name.to_string(),
        })
    }
}

/// Which button was pressed. Selected by the control id prefix, never by the
/// token content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Approve,
    Reject,
}

impl Action {
    pub fn prefix(&self) -> &'static str {
        match self {
            Action::Approve => "/approve/",
            Action::Reject => "/reject/",
        }
    }

    pub fn control_id(&self, token: &Token) -> String {
        format!("{}{}", self.prefix(), token.encode())
    }
}

/// Split a custom id into its action and decoded token.
pub fn parse_control_id(custom_id: &str) -> Result<(Action, Token), DecodeError> {
    for action in [Action::Approve, Action::Reject] {
        if let Some(raw) = custom_id.strip_prefix(action.prefix()) {
            return Ok((action, Token::decode(raw)?));
        }
    }
    Err(DecodeError::UnknownAction(custom_id.to_string()))
}

fn parse_decimal<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, DecodeError> {
    let invalid = || DecodeError::InvalidNumber {
        field,
        value: value.to_string(),
    };
    // `FromStr` accepts a leading '+', which would break the round trip.
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

fn parse_snowflake(field: &'static str, value: &str) -> Result<u64, DecodeError> {
    match parse_decimal::<u64>(field, value)? {
        0 => Err(DecodeError::ZeroId(field)),
        id => Ok(id),
    }
}

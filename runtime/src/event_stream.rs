//! Event-stream message model.
//!
//! Frames are assumed to be decoded already: a [`Message`] is a list of typed
//! headers plus a payload. Generated unmarshallers turn messages into modeled
//! events or errors; generated marshallers do the reverse.

use crate::date_time::DateTime;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

pub const MESSAGE_TYPE: &str = ":message-type";
pub const EVENT_TYPE: &str = ":event-type";
pub const EXCEPTION_TYPE: &str = ":exception-type";
pub const ERROR_CODE: &str = ":error-code";
pub const CONTENT_TYPE: &str = ":content-type";

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    ByteArray(Vec<u8>),
    String(String),
    Timestamp(DateTime),
}

impl HeaderValue {
    pub fn as_bool(&self) -> Result<bool, &HeaderValue> {
        match self {
            HeaderValue::Bool(value) => Ok(*value),
            _ => Err(self),
        }
    }

    pub fn as_byte(&self) -> Result<i8, &HeaderValue> {
        match self {
            HeaderValue::Byte(value) => Ok(*value),
            _ => Err(self),
        }
    }

    pub fn as_int16(&self) -> Result<i16, &HeaderValue> {
        match self {
            HeaderValue::Int16(value) => Ok(*value),
            _ => Err(self),
        }
    }

    pub fn as_int32(&self) -> Result<i32, &HeaderValue> {
        match self {
            HeaderValue::Int32(value) => Ok(*value),
            _ => Err(self),
        }
    }

    pub fn as_int64(&self) -> Result<i64, &HeaderValue> {
        match self {
            HeaderValue::Int64(value) => Ok(*value),
            _ => Err(self),
        }
    }

    pub fn as_byte_array(&self) -> Result<&[u8], &HeaderValue> {
        match self {
            HeaderValue::ByteArray(value) => Ok(value),
            _ => Err(self),
        }
    }

    pub fn as_string(&self) -> Result<&str, &HeaderValue> {
        match self {
            HeaderValue::String(value) => Ok(value),
            _ => Err(self),
        }
    }

    pub fn as_timestamp(&self) -> Result<DateTime, &HeaderValue> {
        match self {
            HeaderValue::Timestamp(value) => Ok(*value),
            _ => Err(self),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    name: String,
    value: HeaderValue,
}

impl Header {
    pub fn new(name: impl Into<String>, value: HeaderValue) -> Self {
        Header { name: name.into(), value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &HeaderValue {
        &self.value
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    headers: Vec<Header>,
    payload: Vec<u8>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Message {
            headers: Vec::new(),
            payload: payload.into(),
        }
    }

    pub fn add_header(mut self, header: Header) -> Self {
        self.headers.push(header);
        self
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|header| header.name == name)
            .map(Header::value)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[derive(Debug, Error)]
pub enum EventStreamError {
    #[error("failed to unmarshall message: {0}")]
    Unmarshalling(String),
    #[error("failed to marshall message: {0}")]
    Marshalling(String),
    #[error("message is missing required header `{0}`")]
    MissingHeader(&'static str),
    #[error("header `{name}` has the wrong type: {found:?}")]
    InvalidHeaderType { name: String, found: HeaderValue },
}

impl EventStreamError {
    pub fn unmarshalling(message: impl Into<String>) -> Self {
        EventStreamError::Unmarshalling(message.into())
    }

    pub fn marshalling(message: impl Into<String>) -> Self {
        EventStreamError::Marshalling(message.into())
    }

    pub fn invalid_header_type(name: &str, found: &HeaderValue) -> Self {
        EventStreamError::InvalidHeaderType {
            name: name.to_string(),
            found: found.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnmarshalledMessage<T, E> {
    Event(T),
    Error(E),
}

pub trait UnmarshallMessage: fmt::Debug {
    type Output;
    type Error;

    fn unmarshall(&self, message: &Message) -> Result<UnmarshalledMessage<Self::Output, Self::Error>, EventStreamError>;
}

pub trait MarshallMessage: fmt::Debug {
    type Input;

    fn marshall(&self, input: Self::Input) -> Result<Message, EventStreamError>;
}

/// The protocol headers every event-stream message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeaders<'a> {
    pub content_type: Option<&'a str>,
    pub message_type: &'a str,
    /// `:event-type` for events, `:exception-type` for modeled errors and
    /// `:error-code` for anything else.
    pub smithy_type: &'a str,
}

fn string_header<'a>(message: &'a Message, name: &'static str) -> Result<Option<&'a str>, EventStreamError> {
    match message.header(name) {
        None => Ok(None),
        Some(value) => value
            .as_string()
            .map(Some)
            .map_err(|found| EventStreamError::invalid_header_type(name, found)),
    }
}

pub fn parse_response_headers(message: &Message) -> Result<ResponseHeaders<'_>, EventStreamError> {
    let message_type = string_header(message, MESSAGE_TYPE)?.ok_or(EventStreamError::MissingHeader(MESSAGE_TYPE))?;
    let type_header = match message_type {
        "event" => EVENT_TYPE,
        "exception" => EXCEPTION_TYPE,
        _ => ERROR_CODE,
    };
    let smithy_type = string_header(message, type_header)?.ok_or(EventStreamError::MissingHeader(type_header))?;
    Ok(ResponseHeaders {
        content_type: string_header(message, CONTENT_TYPE)?,
        message_type,
        smithy_type,
    })
}

#[derive(Debug, Error)]
pub enum ReceiverError<E> {
    #[error("modeled error received on event stream")]
    Modeled(E),
    #[error(transparent)]
    Stream(#[from] EventStreamError),
}

/// The receiving half of an event stream.
///
/// Messages are pushed in as the transport decodes them and pulled out as
/// modeled events. A terminal error ends the stream.
pub struct Receiver<T, E> {
    unmarshaller: Box<dyn UnmarshallMessage<Output = T, Error = E> + Send + Sync>,
    buffered: VecDeque<Message>,
    terminated: bool,
}

impl<T, E> Receiver<T, E> {
    pub fn new(unmarshaller: impl UnmarshallMessage<Output = T, Error = E> + Send + Sync + 'static) -> Self {
        Receiver {
            unmarshaller: Box::new(unmarshaller),
            buffered: VecDeque::new(),
            terminated: false,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.buffered.push_back(message);
    }

    /// Next event, or `Ok(None)` once the buffered messages run out or the
    /// stream has terminated.
    pub fn recv(&mut self) -> Result<Option<T>, ReceiverError<E>> {
        if self.terminated {
            return Ok(None);
        }
        let Some(message) = self.buffered.pop_front() else {
            return Ok(None);
        };
        tracing::trace!(headers = message.headers().len(), payload = message.payload().len(), "unmarshalling event");
        match self.unmarshaller.unmarshall(&message) {
            Ok(UnmarshalledMessage::Event(event)) => Ok(Some(event)),
            Ok(UnmarshalledMessage::Error(error)) => {
                self.terminated = true;
                Err(ReceiverError::Modeled(error))
            }
            Err(error) => {
                self.terminated = true;
                Err(ReceiverError::Stream(error))
            }
        }
    }
}

impl<T, E> fmt::Debug for Receiver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("unmarshaller", &self.unmarshaller)
            .field("buffered", &self.buffered.len())
            .field("terminated", &self.terminated)
            .finish()
    }
}

/// The sending half of an event stream: events queued by the application,
/// marshalled when the transport drains them.
pub struct Sender<T> {
    pending: VecDeque<T>,
}

impl<T> Sender<T> {
    pub fn new() -> Self {
        Sender { pending: VecDeque::new() }
    }

    pub fn send(&mut self, event: T) {
        self.pending.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn into_messages<M>(self, marshaller: &M) -> Result<Vec<Message>, EventStreamError>
    where
        M: MarshallMessage<Input = T>,
    {
        self.pending.into_iter().map(|event| marshaller.marshall(event)).collect()
    }
}

impl<T> Default for Sender<T> {
    fn default() -> Self {
        Sender::new()
    }
}

impl<T> From<Vec<T>> for Sender<T> {
    fn from(events: Vec<T>) -> Self {
        Sender { pending: events.into() }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender").field("pending", &self.pending.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Echo;

    impl UnmarshallMessage for Echo {
        type Output = String;
        type Error = String;

        fn unmarshall(&self, message: &Message) -> Result<UnmarshalledMessage<String, String>, EventStreamError> {
            let headers = parse_response_headers(message)?;
            match headers.message_type {
                "event" => Ok(UnmarshalledMessage::Event(headers.smithy_type.to_string())),
                "exception" => Ok(UnmarshalledMessage::Error(headers.smithy_type.to_string())),
                other => Err(EventStreamError::unmarshalling(format!("unrecognized message type `{other}`"))),
            }
        }
    }

    fn message(message_type: &str, type_header: &str, value: &str) -> Message {
        Message::new(Vec::new())
            .add_header(Header::new(MESSAGE_TYPE, HeaderValue::String(message_type.into())))
            .add_header(Header::new(type_header, HeaderValue::String(value.into())))
    }

    #[test]
    fn parses_protocol_headers() {
        let event = message("event", EVENT_TYPE, "Greeting");
        let headers = parse_response_headers(&event).unwrap();
        assert_eq!(headers.message_type, "event");
        assert_eq!(headers.smithy_type, "Greeting");
        assert_eq!(headers.content_type, None);

        let missing = Message::new(Vec::new());
        assert!(matches!(
            parse_response_headers(&missing),
            Err(EventStreamError::MissingHeader(MESSAGE_TYPE))
        ));

        let wrong_type = Message::new(Vec::new()).add_header(Header::new(MESSAGE_TYPE, HeaderValue::Bool(true)));
        assert!(matches!(
            parse_response_headers(&wrong_type),
            Err(EventStreamError::InvalidHeaderType { .. })
        ));
    }

    #[test]
    fn receiver_stops_after_modeled_error() {
        let mut receiver = Receiver::new(Echo);
        receiver.push(message("event", EVENT_TYPE, "First"));
        receiver.push(message("exception", EXCEPTION_TYPE, "Boom"));
        receiver.push(message("event", EVENT_TYPE, "Never"));
        assert_eq!(receiver.recv().unwrap(), Some("First".to_string()));
        assert!(matches!(receiver.recv(), Err(ReceiverError::Modeled(code)) if code == "Boom"));
        assert_eq!(receiver.recv().unwrap(), None);
    }

    #[test]
    fn typed_header_accessors() {
        assert_eq!(HeaderValue::Int32(7).as_int32(), Ok(7));
        assert!(HeaderValue::Int32(7).as_int64().is_err());
        assert_eq!(HeaderValue::ByteArray(vec![1, 2]).as_byte_array(), Ok(&[1u8, 2][..]));
    }
}

use dev_test_runner::{client, server};
use shapegen_runtime::Blob;
use shapegen_runtime::event_stream::{
    CONTENT_TYPE, EVENT_TYPE, EXCEPTION_TYPE, EventStreamError, Header, HeaderValue, MESSAGE_TYPE, MarshallMessage,
    Message, Receiver, ReceiverError, Sender, UnmarshallMessage, UnmarshalledMessage,
};

fn string_header<'a>(message: &'a Message, name: &str) -> Option<&'a str> {
    message.header(name).and_then(|value| value.as_string().ok())
}

fn created(id: &str, title: &str) -> client::model::RecordEvents {
    client::model::RecordEvents::Created(
        client::model::RecordCreated::builder()
            .id(id.to_string())
            .title(title.to_string())
            .build(),
    )
}

#[test]
fn client_events_are_read_by_the_server() {
    let message = client::event_stream_serde::RecordEventsMarshaller::new()
        .marshall(created("abc", "hello"))
        .unwrap();
    assert_eq!(string_header(&message, MESSAGE_TYPE), Some("event"));
    assert_eq!(string_header(&message, EVENT_TYPE), Some("created"));
    assert_eq!(string_header(&message, CONTENT_TYPE), Some("application/json"));
    assert_eq!(string_header(&message, "id"), Some("abc"));
    assert_eq!(message.payload(), br#"{"title":"hello"}"#);

    let unmarshalled = server::event_stream_serde::RecordEventsUnmarshaller::new()
        .unmarshall(&message)
        .unwrap();
    let event = match unmarshalled {
        UnmarshalledMessage::Event(server::model::RecordEvents::Created(event)) => event,
        other => panic!("expected a created event, got {other:?}"),
    };
    assert_eq!(event.id.as_deref(), Some("abc"));
    assert_eq!(event.title.as_deref(), Some("hello"));
}

#[test]
fn blob_payloads_travel_as_raw_bytes() {
    let event = server::model::RecordEvents::Archived(
        server::model::RecordArchived::builder()
            .id("abc".to_string())
            .reason(Blob::new(b"\x00\xffno longer needed".to_vec()))
            .build(),
    );
    let message = server::event_stream_serde::RecordEventsMarshaller::new()
        .marshall(event)
        .unwrap();
    assert_eq!(string_header(&message, CONTENT_TYPE), Some("application/octet-stream"));
    assert_eq!(message.payload(), b"\x00\xffno longer needed");

    let unmarshalled = client::event_stream_serde::RecordEventsUnmarshaller::new()
        .unmarshall(&message)
        .unwrap();
    let event = match unmarshalled {
        UnmarshalledMessage::Event(client::model::RecordEvents::Archived(event)) => event,
        other => panic!("expected an archived event, got {other:?}"),
    };
    assert_eq!(event.id.as_deref(), Some("abc"));
    assert_eq!(event.reason, Some(Blob::new(b"\x00\xffno longer needed".to_vec())));
}

#[test]
fn modeled_exceptions_reach_the_client() {
    let error = server::error::RecordEventsError::Throttled(server::model::Throttled {
        message: Some("slow down".to_string()),
    });
    let message = server::event_stream_serde::RecordEventsErrorMarshaller::new()
        .marshall(error)
        .unwrap();
    assert_eq!(string_header(&message, MESSAGE_TYPE), Some("exception"));
    assert_eq!(string_header(&message, EXCEPTION_TYPE), Some("throttled"));

    let unmarshalled = client::event_stream_serde::RecordEventsUnmarshaller::new()
        .unmarshall(&message)
        .unwrap();
    match unmarshalled {
        UnmarshalledMessage::Error(client::error::RecordEventsError::Throttled(throttled)) => {
            assert_eq!(throttled.message.as_deref(), Some("slow down"));
        }
        other => panic!("expected a throttled exception, got {other:?}"),
    }
}

#[test]
fn unmodeled_exceptions_are_unhandled() {
    let message = Message::new(br#"{"message":"upstream failed"}"#.to_vec())
        .add_header(Header::new(MESSAGE_TYPE, HeaderValue::String("exception".into())))
        .add_header(Header::new(EXCEPTION_TYPE, HeaderValue::String("internalFailure".into())));
    let unmarshalled = client::event_stream_serde::RecordEventsUnmarshaller::new()
        .unmarshall(&message)
        .unwrap();
    let error = match unmarshalled {
        UnmarshalledMessage::Error(error) => error,
        other => panic!("expected an error, got {other:?}"),
    };
    assert!(matches!(error, client::error::RecordEventsError::Unhandled(_)), "{error:?}");
    assert_eq!(error.code(), Some("internalFailure"));
}

#[test]
fn unknown_event_types_depend_on_the_side() {
    let message = Message::new(b"{}".to_vec())
        .add_header(Header::new(MESSAGE_TYPE, HeaderValue::String("event".into())))
        .add_header(Header::new(EVENT_TYPE, HeaderValue::String("renamed".into())));

    let unmarshalled = client::event_stream_serde::RecordEventsUnmarshaller::new()
        .unmarshall(&message)
        .unwrap();
    assert!(
        matches!(unmarshalled, UnmarshalledMessage::Event(client::model::RecordEvents::Unknown)),
        "{unmarshalled:?}"
    );

    let error = server::event_stream_serde::RecordEventsUnmarshaller::new()
        .unmarshall(&message)
        .unwrap_err();
    assert!(matches!(error, EventStreamError::Unmarshalling(_)), "{error}");
}

#[test]
fn wrongly_typed_headers_are_rejected() {
    let message = Message::new(b"{}".to_vec())
        .add_header(Header::new(MESSAGE_TYPE, HeaderValue::String("event".into())))
        .add_header(Header::new(EVENT_TYPE, HeaderValue::String("created".into())))
        .add_header(Header::new("id", HeaderValue::Int32(7)));
    let error = client::event_stream_serde::RecordEventsUnmarshaller::new()
        .unmarshall(&message)
        .unwrap_err();
    assert!(
        matches!(error, EventStreamError::InvalidHeaderType { ref name, found: HeaderValue::Int32(7) } if name == "id"),
        "{error}"
    );
}

#[test]
fn unknown_events_cannot_be_sent() {
    let error = client::event_stream_serde::RecordEventsMarshaller::new()
        .marshall(client::model::RecordEvents::Unknown)
        .unwrap_err();
    assert!(matches!(error, EventStreamError::Marshalling(_)), "{error}");
}

#[test]
fn receivers_stop_after_a_modeled_error() {
    let marshaller = client::event_stream_serde::RecordEventsMarshaller::new();
    let sender = Sender::from(vec![created("a", "one"), created("b", "two")]);
    let mut messages = sender.into_messages(&marshaller).unwrap();
    let exception = server::event_stream_serde::RecordEventsErrorMarshaller::new()
        .marshall(server::error::RecordEventsError::Throttled(server::model::Throttled { message: None }))
        .unwrap();
    messages.insert(1, exception);

    let mut receiver = Receiver::new(server::event_stream_serde::RecordEventsUnmarshaller::new());
    for message in messages {
        receiver.push(message);
    }
    let first = receiver.recv().unwrap().unwrap();
    assert!(matches!(first, server::model::RecordEvents::Created(ref event) if event.id.as_deref() == Some("a")));
    assert!(matches!(
        receiver.recv(),
        Err(ReceiverError::Modeled(server::error::RecordEventsError::Throttled(_)))
    ));
    assert!(receiver.recv().unwrap().is_none());
}

#[test]
fn server_output_streams_reach_the_client_over_http() {
    let events = vec![
        server::model::RecordEvents::Created(
            server::model::RecordCreated::builder()
                .id("abc".to_string())
                .title("hello".to_string())
                .build(),
        ),
        server::model::RecordEvents::Archived(
            server::model::RecordArchived::builder()
                .id("abc".to_string())
                .reason(Blob::new(b"done".to_vec()))
                .build(),
        ),
    ];
    let output = server::model::SubscribeOutput::builder()
        .events(Sender::from(events))
        .build()
        .unwrap();
    let response = server::http_serde::ser_subscribe_http_response(&output).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/vnd.amazon.eventstream");
    assert!(response.body().is_empty());
    let messages = output
        .events
        .into_messages(&server::event_stream_serde::RecordEventsMarshaller::new())
        .unwrap();

    let mut received = client::http_serde::de_subscribe_http_response(&response).unwrap();
    for message in messages {
        received.events.push(message);
    }
    match received.events.recv().unwrap() {
        Some(client::model::RecordEvents::Created(event)) => {
            assert_eq!(event.id.as_deref(), Some("abc"));
            assert_eq!(event.title.as_deref(), Some("hello"));
        }
        other => panic!("expected a created event, got {other:?}"),
    }
    match received.events.recv().unwrap() {
        Some(client::model::RecordEvents::Archived(event)) => {
            assert_eq!(event.reason, Some(Blob::new(b"done".to_vec())));
        }
        other => panic!("expected an archived event, got {other:?}"),
    }
    assert!(received.events.recv().unwrap().is_none());
}

#[test]
fn client_input_streams_reach_the_server_over_http() {
    let input = client::model::PublishInput::builder()
        .id("abc".to_string())
        .events(Sender::from(vec![created("abc", "hi")]))
        .build()
        .unwrap();
    let request = client::http_serde::ser_publish_http_request(&input).unwrap();
    assert_eq!(request.method(), http::Method::POST);
    assert_eq!(request.uri().path(), "/records/abc/events");
    assert_eq!(request.headers()["content-type"], "application/vnd.amazon.eventstream");
    let messages = input
        .events
        .into_messages(&client::event_stream_serde::RecordEventsMarshaller::new())
        .unwrap();

    let mut received = server::http_serde::de_publish_http_request(&request).unwrap();
    assert_eq!(received.id.as_str(), "abc");
    for message in messages {
        received.events.push(message);
    }
    assert!(matches!(
        received.events.recv(),
        Ok(Some(server::model::RecordEvents::Created(ref event))) if event.title.as_deref() == Some("hi")
    ));
    assert!(received.events.recv().unwrap().is_none());
}

#[test]
fn streaming_members_must_be_set() {
    use client::model::{PublishInput, publish_input};

    assert_eq!(
        PublishInput::builder().id("abc".to_string()).build().unwrap_err(),
        publish_input::ConstraintViolation::MissingEvents
    );
    assert!(server::model::SubscribeOutput::builder().build().is_err());
}

//! HTTP binding resolution: which part of a request or response each member
//! of an operation's input, output or error structure travels in.

use crate::context::Direction;
use crate::error::{CodegenError, Result};
use crate::model::{HttpTrait, Member, Model, Shape, ShapeKind, TimestampFormat};

/// Where a member is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Label { greedy: bool },
    Query(String),
    Header(String),
    /// The whole body.
    Payload,
    /// A member of the JSON body object.
    Document,
    ResponseCode,
}

impl Location {
    /// Default timestamp format of the location, before traits.
    fn default_timestamp_format(&self) -> TimestampFormat {
        match self {
            Location::Header(_) => TimestampFormat::HttpDate,
            Location::Label { .. } | Location::Query(_) => TimestampFormat::DateTime,
            Location::Payload | Location::Document | Location::ResponseCode => TimestampFormat::EpochSeconds,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpBinding<'m> {
    pub member: &'m Member,
    pub target: &'m Shape,
    pub location: Location,
}

impl HttpBinding<'_> {
    pub fn is_document(&self) -> bool {
        self.location == Location::Document
    }
}

pub struct HttpBindingIndex<'m> {
    model: &'m Model,
}

impl<'m> HttpBindingIndex<'m> {
    pub fn new(model: &'m Model) -> Self {
        HttpBindingIndex { model }
    }

    /// The operation's `@http` trait, or `POST /<OperationName>` with 200.
    pub fn http_trait(&self, operation: &Shape) -> HttpTrait {
        operation.traits.http.clone().unwrap_or_else(|| HttpTrait {
            method: "POST".to_string(),
            uri: format!("/{}", operation.id.name()),
            code: 200,
        })
    }

    /// The structure carried in `direction` of an operation.
    pub fn structure(&self, operation: &Shape, direction: Direction) -> Result<&'m Shape> {
        let ShapeKind::Operation(op) = &operation.kind else {
            return Err(CodegenError::unsupported(&operation.id, "not an operation"));
        };
        let id = match direction {
            Direction::Request => op.input.as_ref(),
            Direction::Response => op.output.as_ref(),
        }
        .ok_or_else(|| CodegenError::unsupported(&operation.id, "operation has not been normalized"))?;
        self.model.expect_shape(id)
    }

    /// Bindings of every member of the operation's input (`Request`) or
    /// output (`Response`), in member order.
    pub fn bindings(&self, operation: &Shape, direction: Direction) -> Result<Vec<HttpBinding<'m>>> {
        let structure = self.structure(operation, direction)?;
        let mut bindings = self.structure_bindings(structure, direction)?;
        if direction == Direction::Request {
            let http = self.http_trait(operation);
            for binding in &mut bindings {
                if let Location::Label { greedy } = &mut binding.location {
                    *greedy = label_is_greedy(&http.uri, &binding.member.name);
                    let greedy = *greedy;
                    let placeholder = if greedy {
                        format!("{{{}+}}", binding.member.name)
                    } else {
                        format!("{{{}}}", binding.member.name)
                    };
                    if !http.uri.contains(&placeholder) {
                        return Err(CodegenError::invalid_trait(
                            &operation.id,
                            "smithy.api#http",
                            format!("uri `{}` has no `{placeholder}` for label member `{}`", http.uri, binding.member.name),
                        ));
                    }
                }
            }
        }
        Ok(bindings)
    }

    /// Response bindings of an error structure.
    pub fn error_bindings(&self, error: &'m Shape) -> Result<Vec<HttpBinding<'m>>> {
        self.structure_bindings(error, Direction::Response)
    }

    /// Status code of an error response: `@httpError`, else 400 for client
    /// faults and 500 for server faults.
    pub fn error_status(&self, error: &Shape) -> u16 {
        error.traits.http_error.unwrap_or(match error.traits.error {
            Some(crate::model::ErrorFault::Server) => 500,
            _ => 400,
        })
    }

    fn structure_bindings(&self, structure: &'m Shape, direction: Direction) -> Result<Vec<HttpBinding<'m>>> {
        let ShapeKind::Structure { members } = &structure.kind else {
            return Err(CodegenError::unsupported(&structure.id, "HTTP bindings apply to structures only"));
        };
        let mut bindings = Vec::with_capacity(members.len());
        let mut payloads = 0;
        for member in members {
            let target = self.model.target(member)?;
            let location = locate(member, direction);
            check_target(structure, member, target, &location)?;
            if location == Location::Payload {
                payloads += 1;
            }
            bindings.push(HttpBinding { member, target, location });
        }
        if payloads > 1 {
            return Err(CodegenError::unsupported(&structure.id, "more than one `@httpPayload` member"));
        }
        if payloads == 1 && bindings.iter().any(HttpBinding::is_document) {
            return Err(CodegenError::unsupported(
                &structure.id,
                "`@httpPayload` cannot be combined with members bound to the body",
            ));
        }
        Ok(bindings)
    }

    /// Timestamp format of a member in a location: member trait, then target
    /// trait, then the location's default.
    pub fn timestamp_format(&self, member: &Member, location: &Location) -> TimestampFormat {
        member
            .traits
            .timestamp_format
            .or_else(|| self.model.get(&member.target).and_then(|target| target.traits.timestamp_format))
            .unwrap_or_else(|| location.default_timestamp_format())
    }
}

fn locate(member: &Member, direction: Direction) -> Location {
    let traits = &member.traits;
    if let Some(name) = &traits.http_header {
        return Location::Header(name.to_ascii_lowercase());
    }
    if traits.http_payload {
        return Location::Payload;
    }
    match direction {
        Direction::Request if traits.http_label => Location::Label { greedy: false },
        Direction::Request => match &traits.http_query {
            Some(name) => Location::Query(name.clone()),
            None => Location::Document,
        },
        Direction::Response if traits.http_response_code => Location::ResponseCode,
        Direction::Response => Location::Document,
    }
}

fn is_simple(shape: &Shape) -> bool {
    matches!(
        shape.kind,
        ShapeKind::String
            | ShapeKind::Enum { .. }
            | ShapeKind::Number(_)
            | ShapeKind::Boolean
            | ShapeKind::Timestamp
    )
}

fn check_target(structure: &Shape, member: &Member, target: &Shape, location: &Location) -> Result<()> {
    let reject = |reason: &str| {
        Err(CodegenError::unsupported(
            &structure.id,
            format!("member `{}`: {reason}", member.name),
        ))
    };
    match location {
        Location::Label { .. } if !member.traits.required => reject("label members must be required"),
        Location::Label { .. } if !is_simple(target) => reject("labels must target simple shapes"),
        Location::Query(_) | Location::Header(_) => match &target.kind {
            _ if is_simple(target) => Ok(()),
            ShapeKind::List { .. } => Ok(()),
            _ => reject("query and header members must target simple shapes or lists of them"),
        },
        Location::ResponseCode if !matches!(target.kind, ShapeKind::Number(crate::model::NumberKind::Integer)) => {
            reject("`@httpResponseCode` must target an integer")
        }
        Location::Payload
            if !matches!(
                target.kind,
                ShapeKind::Blob | ShapeKind::String | ShapeKind::Structure { .. } | ShapeKind::Union { .. } | ShapeKind::Document
            ) =>
        {
            reject("payloads must target a blob, string, structure, union or document")
        }
        _ => Ok(()),
    }
}

/// Whether a label placeholder is greedy in `uri`.
pub fn label_is_greedy(uri: &str, name: &str) -> bool {
    uri.contains(&format!("{{{name}+}}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ShapeId, load, transform};

    const MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#GetRecord": { "type": "operation",
            "input": { "target": "t#GetRecordInput" }, "output": { "target": "t#GetRecordOutput" },
            "traits": { "smithy.api#http": { "method": "GET", "uri": "/records/{id}", "code": 200 } } },
        "t#GetRecordInput": { "type": "structure", "members": {
            "id": { "target": "smithy.api#String",
                    "traits": { "smithy.api#required": {}, "smithy.api#httpLabel": {} } },
            "since": { "target": "smithy.api#Timestamp", "traits": { "smithy.api#httpQuery": "since" } },
            "trace": { "target": "smithy.api#String", "traits": { "smithy.api#httpHeader": "X-Trace" } },
            "note": { "target": "smithy.api#String" }
        }},
        "t#GetRecordOutput": { "type": "structure", "members": {
            "status": { "target": "smithy.api#Integer", "traits": { "smithy.api#httpResponseCode": {} } },
            "modified": { "target": "smithy.api#Timestamp", "traits": { "smithy.api#httpHeader": "Last-Modified" } },
            "body": { "target": "smithy.api#Blob", "traits": { "smithy.api#httpPayload": {} } }
        }},
        "t#Ping": { "type": "operation" }
    }}"#;

    fn model() -> Model {
        let mut model = load::from_str(MODEL).unwrap();
        transform::run_all(&mut model).unwrap();
        model
    }

    #[test]
    fn request_members_are_located() {
        let model = model();
        let index = HttpBindingIndex::new(&model);
        let operation = model.get(&ShapeId::new("t#GetRecord")).unwrap();
        let bindings = index.bindings(operation, Direction::Request).unwrap();
        let locations: Vec<_> = bindings.iter().map(|b| b.location.clone()).collect();
        assert_eq!(
            locations,
            vec![
                Location::Label { greedy: false },
                Location::Query("since".into()),
                Location::Header("x-trace".into()),
                Location::Document,
            ]
        );
        assert_eq!(index.timestamp_format(bindings[1].member, &bindings[1].location), TimestampFormat::DateTime);
    }

    #[test]
    fn response_members_are_located() {
        let model = model();
        let index = HttpBindingIndex::new(&model);
        let operation = model.get(&ShapeId::new("t#GetRecord")).unwrap();
        let bindings = index.bindings(operation, Direction::Response).unwrap();
        assert_eq!(bindings[0].location, Location::ResponseCode);
        assert_eq!(index.timestamp_format(bindings[1].member, &bindings[1].location), TimestampFormat::HttpDate);
        assert_eq!(bindings[2].location, Location::Payload);
    }

    #[test]
    fn operations_without_http_trait_post_to_their_name() {
        let model = model();
        let index = HttpBindingIndex::new(&model);
        let http = index.http_trait(model.get(&ShapeId::new("t#Ping")).unwrap());
        assert_eq!((http.method.as_str(), http.uri.as_str(), http.code), ("POST", "/Ping", 200));
    }

    #[test]
    fn labels_must_appear_in_the_uri() {
        let mut model = model();
        if let Some(shape) = model.get_mut(&ShapeId::new("t#GetRecord")) {
            shape.traits.http.as_mut().unwrap().uri = "/records".into();
        }
        let index = HttpBindingIndex::new(&model);
        let operation = model.get(&ShapeId::new("t#GetRecord")).unwrap();
        assert!(index.bindings(operation, Direction::Request).is_err());
    }
}

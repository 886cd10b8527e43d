//! State shared by every generator during one run.

use crate::config::CodegenSettings;
use crate::constraint::ConstraintIndex;
use crate::error::{CodegenError, Result};
use crate::model::{Member, Model, Shape, ShapeId, ShapeKind, TimestampFormat};
use crate::symbol::{RustSymbolProvider, SymbolMode, SymbolProvider, module_name, type_name};
use std::collections::HashMap;

/// Which side of an operation a structure sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

pub struct GenContext<'m> {
    pub model: &'m Model,
    pub settings: &'m CodegenSettings,
    constraints: ConstraintIndex,
    directions: HashMap<ShapeId, Direction>,
}

impl<'m> GenContext<'m> {
    pub fn new(model: &'m Model, settings: &'m CodegenSettings) -> Result<Self> {
        if let Some(service) = settings.service_id() {
            model.expect_shape(&service)?;
        }
        let constraints = ConstraintIndex::new(model, settings.target);
        let mut directions = HashMap::new();
        for (_, operation) in model.operations() {
            if let Some(input) = &operation.input {
                directions.insert(input.clone(), Direction::Request);
            }
            if let Some(output) = &operation.output {
                directions.insert(output.clone(), Direction::Response);
            }
        }
        tracing::debug!(
            constrained = constraints.len(),
            operations = directions.len() / 2,
            "generation context ready"
        );
        Ok(GenContext {
            model,
            settings,
            constraints,
            directions,
        })
    }

    pub fn is_server(&self) -> bool {
        self.settings.is_server()
    }

    pub fn rt(&self) -> &str {
        &self.settings.runtime_crate
    }

    pub fn root(&self) -> &str {
        &self.settings.crate_root
    }

    pub fn model_path(&self) -> String {
        format!("{}::model", self.root())
    }

    pub fn module_path(&self, module: &str) -> String {
        format!("{}::{module}", self.root())
    }

    /// `crate::model::record` for `Record`: where its builder and violation
    /// types live.
    pub fn shape_module(&self, id: &ShapeId) -> String {
        format!("{}::{}", self.model_path(), module_name(id))
    }

    pub fn named_type(&self, id: &ShapeId) -> String {
        format!("{}::{}", self.model_path(), type_name(id))
    }

    pub fn symbols(&self, mode: SymbolMode) -> RustSymbolProvider<'_, 'm> {
        RustSymbolProvider::new(self, mode)
    }

    pub fn public_type(&self, shape: &Shape) -> Result<String> {
        Ok(self.symbols(SymbolMode::Public).to_symbol(shape)?.render())
    }

    pub fn constrained_type(&self, shape: &Shape) -> Result<String> {
        Ok(self.symbols(SymbolMode::Constrained).to_symbol(shape)?.render())
    }

    pub fn unconstrained_type(&self, shape: &Shape) -> Result<String> {
        Ok(self.symbols(SymbolMode::Unconstrained).to_symbol(shape)?.render())
    }

    /// Transitively constrained. Always false on the client.
    pub fn is_constrained(&self, id: &ShapeId) -> bool {
        self.constraints.is_constrained(id)
    }

    /// Simple shapes and collections that get a validating newtype.
    pub fn has_newtype(&self, shape: &Shape) -> bool {
        self.is_constrained(&shape.id) && is_wrappable(shape)
    }

    /// Newtypes that appear in struct fields and builder methods.
    pub fn has_public_newtype(&self, shape: &Shape) -> bool {
        self.has_newtype(shape)
            && self.settings.public_constrained_types
            && ConstraintIndex::is_directly_constrained(shape)
    }

    /// Whether the unconstrained value can be stored as-is in a builder slot
    /// because the public type and the unconstrained type coincide.
    pub fn public_is_unconstrained(&self, shape: &Shape) -> Result<bool> {
        Ok(self.public_type(shape)? == self.unconstrained_type(shape)?)
    }

    /// Expression suffix turning a constrained value into its public form.
    pub fn constrained_to_public(&self, shape: &Shape) -> &'static str {
        if self.has_newtype(shape) && !self.has_public_newtype(shape) {
            ".into_inner()"
        } else {
            ""
        }
    }

    /// Operations to generate bindings and error enums for: the configured
    /// service's operations, or every operation in the model.
    pub fn operations(&self) -> Result<Vec<&'m Shape>> {
        let model = self.model;
        match self.settings.service_id() {
            Some(service_id) => match &model.expect_shape(&service_id)?.kind {
                ShapeKind::Service(service) => service.operations.iter().map(|id| model.expect_shape(id)).collect(),
                _ => Err(CodegenError::unsupported(&service_id, "configured service is not a service shape")),
            },
            None => Ok(model.operations().map(|(shape, _)| shape).collect()),
        }
    }

    pub fn direction(&self, structure: &ShapeId) -> Option<Direction> {
        self.directions.get(structure).copied()
    }

    /// Type of a `@streaming` union member inside an operation structure.
    pub fn stream_type(&self, container: &ShapeId, member: &Member) -> Result<String> {
        let direction = self.direction(container).ok_or_else(|| {
            CodegenError::unsupported(container, "event streams are only supported on operation inputs and outputs")
        })?;
        let rt = self.rt();
        let event = self.named_type(&member.target);
        let sending = matches!(
            (self.is_server(), direction),
            (false, Direction::Request) | (true, Direction::Response)
        );
        Ok(if sending {
            format!("{rt}::event_stream::Sender<{event}>")
        } else {
            let error = format!("{}::error::{}Error", self.root(), type_name(&member.target));
            format!("{rt}::event_stream::Receiver<{event}, {error}>")
        })
    }

    pub fn is_streaming_member(&self, member: &Member) -> bool {
        self.model
            .get(&member.target)
            .is_some_and(|target| target.is_event_stream())
    }

    /// Document-body timestamp format: member trait, then target trait, then
    /// epoch seconds.
    pub fn body_timestamp_format(&self, member: Option<&Member>, target: &Shape) -> TimestampFormat {
        member
            .and_then(|member| member.traits.timestamp_format)
            .or(target.traits.timestamp_format)
            .unwrap_or(TimestampFormat::EpochSeconds)
    }

    pub fn format_path(&self, format: TimestampFormat) -> String {
        let variant = match format {
            TimestampFormat::DateTime => "DateTime",
            TimestampFormat::HttpDate => "HttpDate",
            TimestampFormat::EpochSeconds => "EpochSeconds",
        };
        format!("{}::date_time::Format::{variant}", self.rt())
    }
}

pub fn is_wrappable(shape: &Shape) -> bool {
    matches!(
        shape.kind,
        ShapeKind::String
            | ShapeKind::Number(_)
            | ShapeKind::Blob
            | ShapeKind::List { .. }
            | ShapeKind::Map { .. }
    )
}

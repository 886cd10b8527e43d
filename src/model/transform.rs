// src/model/transform.rs
//! Model transforms, run once after loading and before any generation.
//!
//! Shapes are immutable once these passes have run.

use super::shape::*;
use crate::error::{CodegenError, Result};
use std::collections::{HashMap, HashSet};

pub fn run_all(model: &mut Model) -> Result<()> {
    normalize_operations(model)?;
    box_recursive_members(model);
    Ok(())
}

// -------------------- operations --------------------

/// Gives every operation an input and an output structure. Missing ones are
/// synthesized as empty `<Operation>Input` / `<Operation>Output` shapes.
pub fn normalize_operations(model: &mut Model) -> Result<()> {
    let missing: Vec<(ShapeId, bool, bool)> = model
        .operations()
        .filter(|(_, operation)| operation.input.is_none() || operation.output.is_none())
        .map(|(shape, operation)| (shape.id.clone(), operation.input.is_none(), operation.output.is_none()))
        .collect();

    for (operation_id, needs_input, needs_output) in missing {
        let mut synthesize = |suffix: &str| -> Result<ShapeId> {
            let id = ShapeId::from_parts(operation_id.namespace(), &format!("{}{suffix}", operation_id.name()));
            match model.get(&id) {
                Some(existing) if existing.is_structure() => {}
                Some(_) => {
                    return Err(CodegenError::unsupported(
                        &operation_id,
                        format!("cannot synthesize `{id}`: a non-structure shape already uses that id"),
                    ));
                }
                None => {
                    tracing::debug!(operation = %operation_id, shape = %id, "synthesizing empty structure");
                    model.insert(Shape::new(id.clone(), ShapeKind::Structure { members: Vec::new() }));
                }
            }
            Ok(id)
        };
        let input = if needs_input { Some(synthesize("Input")?) } else { None };
        let output = if needs_output { Some(synthesize("Output")?) } else { None };

        if let Some(Shape { kind: ShapeKind::Operation(operation), .. }) = model.get_mut(&operation_id) {
            if input.is_some() {
                operation.input = input;
            }
            if output.is_some() {
                operation.output = output;
            }
        }
    }
    Ok(())
}

// -------------------- recursion --------------------

// Edges a value is stored inline along: structure/union members targeting
// structures or unions. Lists and maps allocate, so they break a cycle.
fn inline_edges(model: &Model) -> HashMap<ShapeId, Vec<ShapeId>> {
    let mut edges: HashMap<ShapeId, Vec<ShapeId>> = HashMap::new();
    for shape in model.shapes() {
        if !(shape.is_structure() || shape.is_union()) {
            continue;
        }
        let targets = shape
            .members()
            .into_iter()
            .filter(|member| {
                model
                    .get(&member.target)
                    .is_some_and(|target| target.is_structure() || target.is_union())
            })
            .map(|member| member.target.clone())
            .collect();
        edges.insert(shape.id.clone(), targets);
    }
    edges
}

fn reaches(edges: &HashMap<ShapeId, Vec<ShapeId>>, from: &ShapeId, to: &ShapeId) -> bool {
    let mut stack = vec![from];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if !seen.insert(current) {
            continue;
        }
        if let Some(next) = edges.get(current) {
            stack.extend(next.iter());
        }
    }
    false
}

/// Marks every structure/union member that closes an inline reference cycle
/// as boxed.
pub fn box_recursive_members(model: &mut Model) {
    let edges = inline_edges(model);
    let mut to_box: Vec<(ShapeId, String)> = Vec::new();
    for (container, targets) in &edges {
        let Some(shape) = model.get(container) else { continue };
        for member in shape.members() {
            if targets.contains(&member.target) && reaches(&edges, &member.target, container) {
                to_box.push((container.clone(), member.name.clone()));
            }
        }
    }

    for (container, member_name) in to_box {
        tracing::debug!(shape = %container, member = %member_name, "boxing recursive member");
        if let Some(shape) = model.get_mut(&container) {
            if let ShapeKind::Structure { members } | ShapeKind::Union { members } = &mut shape.kind {
                if let Some(member) = members.iter_mut().find(|member| member.name == member_name) {
                    member.traits.boxed = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::load;

    fn model(shapes: &str) -> Model {
        let mut model = load::from_str(&format!(r#"{{"smithy": "2.0", "shapes": {shapes}}}"#)).unwrap();
        run_all(&mut model).unwrap();
        model
    }

    fn boxed(model: &Model, shape: &str, member: &str) -> bool {
        model
            .get(&ShapeId::new(shape))
            .and_then(|shape| shape.member(member))
            .map(|member| member.traits.boxed)
            .unwrap()
    }

    #[test]
    fn self_reference_is_boxed() {
        let model = model(
            r#"{
                "t#Linked": { "type": "structure", "members": {
                    "value": { "target": "smithy.api#Integer" },
                    "next": { "target": "t#Linked" }
                }}
            }"#,
        );
        assert!(boxed(&model, "t#Linked", "next"));
        assert!(!boxed(&model, "t#Linked", "value"));
    }

    #[test]
    fn recursion_through_a_list_is_not_boxed() {
        let model = model(
            r#"{
                "t#Node": { "type": "structure", "members": {
                    "children": { "target": "t#NodeList" }
                }},
                "t#NodeList": { "type": "list", "member": { "target": "t#Node" } }
            }"#,
        );
        assert!(!boxed(&model, "t#Node", "children"));
    }

    #[test]
    fn mutual_recursion_boxes_each_edge_in_the_cycle() {
        let model = model(
            r#"{
                "t#A": { "type": "structure", "members": { "b": { "target": "t#B" } } },
                "t#B": { "type": "union", "members": { "a": { "target": "t#A" }, "leaf": { "target": "t#Leaf" } } },
                "t#Leaf": { "type": "structure", "members": {} }
            }"#,
        );
        assert!(boxed(&model, "t#A", "b"));
        assert!(boxed(&model, "t#B", "a"));
        assert!(!boxed(&model, "t#B", "leaf"));
    }

    #[test]
    fn operations_get_input_and_output() {
        let model = model(
            r#"{
                "t#Ping": { "type": "operation" },
                "t#Get": { "type": "operation", "input": { "target": "t#GetRequest" } },
                "t#GetRequest": { "type": "structure", "members": {} }
            }"#,
        );
        let (_, ping) = model.operations().find(|(shape, _)| shape.id.name() == "Ping").unwrap();
        assert_eq!(ping.input, Some(ShapeId::new("t#PingInput")));
        assert_eq!(ping.output, Some(ShapeId::new("t#PingOutput")));
        assert!(model.get(&ShapeId::new("t#PingInput")).unwrap().is_structure());

        let (_, get) = model.operations().find(|(shape, _)| shape.id.name() == "Get").unwrap();
        assert_eq!(get.input, Some(ShapeId::new("t#GetRequest")));
        assert_eq!(get.output, Some(ShapeId::new("t#GetOutput")));
    }
}

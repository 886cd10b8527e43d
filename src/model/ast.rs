// Serde view of a JSON AST model file. No interpretation happens here.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct AstModel {
    pub smithy: String,
    #[serde(default)]
    pub shapes: IndexMap<String, AstShape>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AstTarget {
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AstMember {
    pub target: String,
    #[serde(default)]
    pub traits: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AstShape {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub members: IndexMap<String, AstMember>,
    pub member: Option<AstMember>,
    pub key: Option<AstMember>,
    pub value: Option<AstMember>,
    pub input: Option<AstTarget>,
    pub output: Option<AstTarget>,
    #[serde(default)]
    pub errors: Vec<AstTarget>,
    #[serde(default)]
    pub operations: Vec<AstTarget>,
    pub version: Option<String>,
    #[serde(default)]
    pub traits: IndexMap<String, Value>,
}

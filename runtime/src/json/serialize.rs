//! Streaming JSON writers.
//!
//! Writers append directly to a `String` and cannot fail. Commas are tracked
//! per container, so a `JsonObjectWriter` that never gets a key still renders
//! as `{}`.

use crate::blob::Blob;
use crate::date_time::{DateTime, Format};
use crate::document::Document;
use crate::json::escape::escape_string;
use crate::number::Number;

pub struct JsonValueWriter<'a> {
    output: &'a mut String,
}

impl<'a> JsonValueWriter<'a> {
    pub fn new(output: &'a mut String) -> Self {
        JsonValueWriter { output }
    }

    pub fn null(self) {
        self.output.push_str("null");
    }

    pub fn boolean(self, value: bool) {
        self.output.push_str(if value { "true" } else { "false" });
    }

    pub fn string(self, value: &str) {
        self.output.push('"');
        self.output.push_str(&escape_string(value));
        self.output.push('"');
    }

    /// Non-finite floats are written as the strings `"NaN"`, `"Infinity"` and
    /// `"-Infinity"`.
    pub fn number(self, value: Number) {
        match value {
            Number::PosInt(v) => self.output.push_str(&v.to_string()),
            Number::NegInt(v) => self.output.push_str(&v.to_string()),
            Number::Float(v) if v.is_nan() => self.output.push_str("\"NaN\""),
            Number::Float(v) if v == f64::INFINITY => self.output.push_str("\"Infinity\""),
            Number::Float(v) if v == f64::NEG_INFINITY => self.output.push_str("\"-Infinity\""),
            Number::Float(v) => self.output.push_str(&v.to_string()),
        }
    }

    pub fn blob(self, value: &Blob) {
        self.string(&value.to_base64());
    }

    /// Epoch seconds are written as a bare number, other formats as strings.
    pub fn date_time(self, value: &DateTime, format: Format) {
        let rendered = value.fmt(format);
        match format {
            Format::EpochSeconds => self.output.push_str(&rendered),
            Format::DateTime | Format::HttpDate => self.string(&rendered),
        }
    }

    pub fn document(self, value: &Document) {
        match value {
            Document::Object(entries) => {
                let mut object = self.start_object();
                for (key, entry) in entries {
                    object.key(key).document(entry);
                }
                object.finish();
            }
            Document::Array(items) => {
                let mut array = self.start_array();
                for item in items {
                    array.value().document(item);
                }
                array.finish();
            }
            Document::Number(number) => self.number(*number),
            Document::String(value) => self.string(value),
            Document::Bool(value) => self.boolean(*value),
            Document::Null => self.null(),
        }
    }

    pub fn start_object(self) -> JsonObjectWriter<'a> {
        JsonObjectWriter::new(self.output)
    }

    pub fn start_array(self) -> JsonArrayWriter<'a> {
        JsonArrayWriter::new(self.output)
    }
}

pub struct JsonObjectWriter<'a> {
    output: &'a mut String,
    started: bool,
}

impl<'a> JsonObjectWriter<'a> {
    pub fn new(output: &'a mut String) -> Self {
        output.push('{');
        JsonObjectWriter { output, started: false }
    }

    pub fn key(&mut self, key: &str) -> JsonValueWriter<'_> {
        if self.started {
            self.output.push(',');
        }
        self.started = true;
        self.output.push('"');
        self.output.push_str(&escape_string(key));
        self.output.push_str("\":");
        JsonValueWriter::new(self.output)
    }

    pub fn finish(self) {
        self.output.push('}');
    }
}

pub struct JsonArrayWriter<'a> {
    output: &'a mut String,
    started: bool,
}

impl<'a> JsonArrayWriter<'a> {
    pub fn new(output: &'a mut String) -> Self {
        output.push('[');
        JsonArrayWriter { output, started: false }
    }

    pub fn value(&mut self) -> JsonValueWriter<'_> {
        if self.started {
            self.output.push(',');
        }
        self.started = true;
        JsonValueWriter::new(self.output)
    }

    pub fn finish(self) {
        self.output.push(']');
    }
}

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::app::Vec2;

use super::database::{Prototype, PrototypeDatabase, PrototypeId};

const DEFAULT_HALF_EXTENT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicatePrototype,
}

#[derive(Debug, Clone)]
pub struct ContentError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentError {}

pub fn load_prototypes(file_path: &Path) -> Result<PrototypeDatabase, ContentError> {
    let raw = fs::read_to_string(file_path).map_err(|source| ContentError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read prototype file: {source}"),
        file_path: file_path.to_path_buf(),
        location: None,
    })?;
    parse_prototypes(file_path, &raw)
}

/// Parses a `<Prototypes>` document. Prototype names must be unique within
/// the document; `speed` defaults to 0 and each half extent to 0.5.
pub fn parse_prototypes(file_path: &Path, raw: &str) -> Result<PrototypeDatabase, ContentError> {
    let doc = Document::parse(raw).map_err(|error| ContentError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Prototypes" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Prototypes>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    let mut seen_names = HashSet::<String>::new();
    let mut prototypes = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "Prototype" {
            return Err(error_at_node(
                ContentErrorCode::UnknownElement,
                format!(
                    "unsupported element <{}>; expected <Prototype>",
                    child.tag_name().name()
                ),
                file_path,
                &doc,
                child,
            ));
        }
        let prototype = parse_prototype(file_path, &doc, child)?;
        if !seen_names.insert(prototype.name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicatePrototype,
                format!("duplicate prototype '{}'", prototype.name),
                file_path,
                &doc,
                child,
            ));
        }
        prototypes.push(prototype);
    }

    Ok(PrototypeDatabase::from_prototypes(prototypes))
}

fn parse_prototype(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<Prototype, ContentError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut name: Option<String> = None;
    let mut category: Option<String> = None;
    let mut speed: Option<f32> = None;
    let mut half_width: Option<f32> = None;
    let mut half_height: Option<f32> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{}> in <Prototype>", field_name),
                file_path,
                doc,
                field,
            ));
        }

        match field_name.as_str() {
            "name" => name = Some(required_text(file_path, doc, field, "name")?),
            "category" => category = Some(required_text(file_path, doc, field, "category")?),
            "speed" => {
                speed = Some(parse_number(file_path, doc, field, "speed", |value| {
                    value >= 0.0
                })?)
            }
            "halfWidth" => {
                half_width = Some(parse_number(file_path, doc, field, "halfWidth", |value| {
                    value > 0.0
                })?)
            }
            "halfHeight" => {
                half_height = Some(parse_number(file_path, doc, field, "halfHeight", |value| {
                    value > 0.0
                })?)
            }
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{}> in <Prototype>", field_name),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let Some(name) = name else {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            "missing required field <name> in <Prototype>".to_string(),
            file_path,
            doc,
            node,
        ));
    };
    let Some(category) = category else {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            "missing required field <category> in <Prototype>".to_string(),
            file_path,
            doc,
            node,
        ));
    };

    Ok(Prototype {
        id: PrototypeId(0),
        name,
        category,
        speed: speed.unwrap_or(0.0),
        half_extents: Vec2::new(
            half_width.unwrap_or(DEFAULT_HALF_EXTENT),
            half_height.unwrap_or(DEFAULT_HALF_EXTENT),
        ),
    })
}

fn parse_number(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
    in_range: impl Fn(f32) -> bool,
) -> Result<f32, ContentError> {
    let value = required_text(file_path, doc, node, field_name)?;
    let parsed = value.parse::<f32>().map_err(|_| {
        error_at_node(
            ContentErrorCode::InvalidValue,
            format!("{} '{}' is not a valid number", field_name, value),
            file_path,
            doc,
            node,
        )
    })?;
    if !parsed.is_finite() || !in_range(parsed) {
        return Err(error_at_node(
            ContentErrorCode::InvalidValue,
            format!("{} '{}' is out of range", field_name, value),
            file_path,
            doc,
            node,
        ));
    }
    Ok(parsed)
}

fn required_text(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentError> {
    let value = node.text().map(str::trim).unwrap_or_default().to_string();
    if value.is_empty() {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            format!("field <{}> must not be empty", field_name),
            file_path,
            doc,
            node,
        ));
    }
    Ok(value)
}

fn error_at_node(
    code: ContentErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ContentError {
    let pos = doc.text_pos_at(node.range().start);
    ContentError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

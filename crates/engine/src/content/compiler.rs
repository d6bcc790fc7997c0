use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::behavior::MAX_TRACKS;
use crate::movement::BoundingBox;

use super::database::{DefDatabase, EntityArchetype, EntityDefId};

pub const DEFAULT_HEALTH: i32 = 3;
pub const DEFAULT_MOVE_SPEED: f32 = 1.0;

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
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
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

impl std::error::Error for ContentCompileError {}

/// Reads and compiles one `<Defs>` document.
pub fn compile_def_database(defs_path: &Path) -> Result<DefDatabase, ContentCompileError> {
    let raw = fs::read_to_string(defs_path).map_err(|source| ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        file_path: defs_path.to_path_buf(),
        location: None,
    })?;
    compile_def_source(defs_path, &raw)
}

/// Compiles already loaded XML. `file_path` is only used for error reports.
pub fn compile_def_source(file_path: &Path, raw: &str) -> Result<DefDatabase, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(error_at_node(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    let mut seen = HashSet::<String>::new();
    let mut defs = Vec::<EntityArchetype>::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "EntityDef" {
            return Err(error_at_node(
                ContentErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; only <EntityDef> is supported",
                    child.tag_name().name()
                ),
                file_path,
                &doc,
                child,
            ));
        }
        let def = parse_entity_def(file_path, &doc, child)?;
        if !seen.insert(def.def_name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateDef,
                format!("duplicate EntityDef '{}'", def.def_name),
                file_path,
                &doc,
                child,
            ));
        }
        defs.push(def);
    }

    Ok(DefDatabase::from_entity_defs(defs))
}

fn parse_entity_def(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<EntityArchetype, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut health: Option<i32> = None;
    let mut move_speed: Option<f32> = None;
    let mut bounds: Option<BoundingBox> = None;
    let mut tracks: Option<Vec<String>> = None;

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(error_at_node(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{}> in <EntityDef>", field_name),
                file_path,
                doc,
                field,
            ));
        }

        match field_name.as_str() {
            "defName" => {
                def_name = Some(required_text(file_path, doc, field, "defName")?);
            }
            "label" => {
                label = Some(required_text(file_path, doc, field, "label")?);
            }
            "health" => {
                let value = required_text(file_path, doc, field, "health")?;
                let parsed = value.parse::<i32>().ok().filter(|hp| *hp > 0).ok_or_else(|| {
                    error_at_node(
                        ContentErrorCode::InvalidValue,
                        format!("health '{}' must be a positive integer", value),
                        file_path,
                        doc,
                        field,
                    )
                })?;
                health = Some(parsed);
            }
            "moveSpeed" => {
                let value = required_text(file_path, doc, field, "moveSpeed")?;
                let parsed = value.parse::<f32>().map_err(|_| {
                    error_at_node(
                        ContentErrorCode::InvalidValue,
                        format!("moveSpeed '{}' is not a valid number", value),
                        file_path,
                        doc,
                        field,
                    )
                })?;
                if !parsed.is_finite() || parsed < 0.0 {
                    return Err(error_at_node(
                        ContentErrorCode::InvalidValue,
                        "moveSpeed must be finite and >= 0".to_string(),
                        file_path,
                        doc,
                        field,
                    ));
                }
                move_speed = Some(parsed);
            }
            "boundingBox" => {
                bounds = Some(parse_bounding_box(file_path, doc, field)?);
            }
            "tracks" => {
                tracks = Some(parse_tracks(file_path, doc, field)?);
            }
            _ => {
                return Err(error_at_node(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{}> in <EntityDef>", field_name),
                    file_path,
                    doc,
                    field,
                ))
            }
        }
    }

    let Some(def_name) = def_name else {
        return Err(error_at_node(
            ContentErrorCode::MissingField,
            "missing required field <defName> in <EntityDef>".to_string(),
            file_path,
            doc,
            node,
        ));
    };

    Ok(EntityArchetype {
        id: EntityDefId(0),
        label: label.unwrap_or_else(|| def_name.clone()),
        def_name,
        health: health.unwrap_or(DEFAULT_HEALTH),
        move_speed: move_speed.unwrap_or(DEFAULT_MOVE_SPEED),
        bounds: bounds.unwrap_or_default(),
        tracks: tracks.unwrap_or_default(),
    })
}

fn parse_bounding_box(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<BoundingBox, ContentCompileError> {
    let attr = |name: &str| -> Result<f32, ContentCompileError> {
        let Some(raw) = node.attribute(name) else {
            return Err(error_at_node(
                ContentErrorCode::MissingField,
                format!("<boundingBox> is missing attribute '{}'", name),
                file_path,
                doc,
                node,
            ));
        };
        raw.trim()
            .parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| {
                error_at_node(
                    ContentErrorCode::InvalidValue,
                    format!("<boundingBox> attribute {}='{}' is not a finite number", name, raw),
                    file_path,
                    doc,
                    node,
                )
            })
    };

    let bounds = BoundingBox::new(attr("x")?, attr("y")?, attr("width")?, attr("height")?);
    if bounds.is_degenerate() {
        return Err(error_at_node(
            ContentErrorCode::InvalidValue,
            "<boundingBox> width and height must be > 0".to_string(),
            file_path,
            doc,
            node,
        ));
    }
    Ok(bounds)
}

fn parse_tracks(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<Vec<String>, ContentCompileError> {
    let mut tracks = Vec::new();
    for child in node.children().filter(|child| child.is_element()) {
        if child.tag_name().name() != "track" {
            return Err(error_at_node(
                ContentErrorCode::UnknownField,
                format!("unknown field <{}> in <tracks>", child.tag_name().name()),
                file_path,
                doc,
                child,
            ));
        }
        tracks.push(required_text(file_path, doc, child, "track")?);
    }
    if tracks.len() > MAX_TRACKS {
        return Err(error_at_node(
            ContentErrorCode::InvalidValue,
            format!("at most {} tracks are allowed, found {}", MAX_TRACKS, tracks.len()),
            file_path,
            doc,
            node,
        ));
    }
    Ok(tracks)
}

fn required_text(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    field_name: &str,
) -> Result<String, ContentCompileError> {
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
) -> ContentCompileError {
    let pos = doc.text_pos_at(node.range().start);
    ContentCompileError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}

use crate::common::{get_path, remove_path, set_path, DOC_ID};
use crate::errors::{DocbindError, DocbindResult, ErrorKind};
use crate::mapper::Document;
use serde_json::Value;

/// A compiled projection: either a set of included paths or a set of excluded ones.
#[derive(Debug, Clone)]
pub(crate) enum Projection {
    Include { paths: Vec<String>, include_id: bool },
    Exclude { paths: Vec<String> },
}

impl Projection {
    /// Compiles an optional projection; `None` and `{}` keep whole documents.
    pub(crate) fn compile(projection: Option<&Value>) -> DocbindResult<Option<Projection>> {
        let fields = match projection {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(map)) if map.is_empty() => return Ok(None),
            Some(Value::Object(map)) => map,
            Some(other) => return Err(projection_error(&format!("projection must be an object, got {}", other))),
        };

        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut id_flag = None;
        for (path, flag) in fields {
            let include = match flag {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64() != Some(0.0),
                _ => return Err(projection_error(&format!("value for '{}' must be 0/1 or a boolean", path))),
            };
            if path == DOC_ID {
                id_flag = Some(include);
            } else if include {
                included.push(path.clone());
            } else {
                excluded.push(path.clone());
            }
        }

        if !included.is_empty() && !excluded.is_empty() {
            return Err(projection_error("cannot mix inclusion and exclusion"));
        }
        if !included.is_empty() || (excluded.is_empty() && id_flag == Some(true)) {
            return Ok(Some(Projection::Include {
                paths: included,
                include_id: id_flag.unwrap_or(true),
            }));
        }
        if id_flag == Some(false) {
            excluded.push(DOC_ID.to_string());
        }
        Ok(Some(Projection::Exclude { paths: excluded }))
    }

    pub(crate) fn apply(&self, document: &Document) -> DocbindResult<Document> {
        match self {
            Projection::Include { paths, include_id } => {
                let mut projected = Document::new();
                if *include_id {
                    if let Some(id) = document.get(DOC_ID) {
                        projected.insert(DOC_ID.to_string(), id.clone());
                    }
                }
                for path in paths {
                    if let Some(value) = get_path(document, path) {
                        set_path(&mut projected, path, value.clone())?;
                    }
                }
                Ok(projected)
            }
            Projection::Exclude { paths } => {
                let mut projected = document.clone();
                for path in paths {
                    remove_path(&mut projected, path);
                }
                Ok(projected)
            }
        }
    }
}

fn projection_error(message: &str) -> DocbindError {
    log::error!("Invalid projection: {}", message);
    DocbindError::new(&format!("Invalid projection: {}", message), ErrorKind::InvalidProjection)
}

// ============================================================================
// FORMATS DE COLONNES DES IMPORTS
// ============================================================================
//
// Une ligne de feuille est lue positionnellement: chaque Field dit quelle
// colonne (1 = A) alimente quel champ, et comment la cellule est lue.
// La ligne lue (Record) est ensuite convertie en entité par la cible
// d'import (voir targets.rs).
//
// ============================================================================

use std::collections::HashMap;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parser {
    /// Texte non vide
    Required,
    /// Texte, None si vide
    Optional,
    /// Texte, valeur par défaut si vide
    Default(&'static str),
    /// Entier, valeur par défaut si vide
    Integer { default: Option<i32> },
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub column: usize,
    pub name: &'static str,
    pub parser: Parser,
}

const fn field(column: usize, name: &'static str, parser: Parser) -> Field {
    Field { column, name, parser }
}

#[derive(Debug)]
pub struct Layout {
    pub fields: &'static [Field],
    /// Champs qui identifient la ligne dans les messages d'erreur
    pub key: &'static [&'static str],
}

pub static PROJECT_LAYOUT: Layout = Layout {
    fields: &[
        field(1, "code", Parser::Required),
        field(2, "cmn", Parser::Required),
        field(3, "refTSK", Parser::Required),
        field(4, "qte", Parser::Integer { default: Some(0) }),
        field(5, "pin", Parser::Required),
        field(6, "sap1", Parser::Optional),
        field(7, "sap2", Parser::Optional),
        field(8, "refS", Parser::Required),
    ],
    key: &["code"],
};

pub static EQUIPMENT_LAYOUT: Layout = Layout {
    fields: &[
        field(1, "projectCode", Parser::Optional),
        field(2, "number", Parser::Integer { default: None }),
        field(3, "tableNumber", Parser::Required),
        field(4, "assetNumber", Parser::Required),
        field(5, "module", Parser::Required),
        field(6, "size", Parser::Required),
        field(7, "versionWin", Parser::Required),
        field(8, "versionCswin", Parser::Required),
        field(9, "versionDongle", Parser::Required),
        field(10, "nomPc", Parser::Required),
    ],
    key: &["assetNumber"],
};

// Colonne 5 de la feuille RH: non utilisée
pub static USER_LAYOUT: Layout = Layout {
    fields: &[
        field(1, "code", Parser::Required),
        field(2, "firstName", Parser::Required),
        field(3, "lastName", Parser::Required),
        field(4, "dept", Parser::Default("PPE")),
        field(6, "post_hr", Parser::Default("Sampling")),
        field(7, "post", Parser::Required),
        field(8, "affectation", Parser::Default("Indirect")),
        field(9, "email", Parser::Required),
    ],
    key: &["code"],
};

pub static INTERVENTION_LAYOUT: Layout = Layout {
    fields: &[
        field(1, "userCode", Parser::Required),
        field(2, "projectCode", Parser::Required),
        field(3, "description", Parser::Required),
        field(4, "type", Parser::Default("other")),
        field(5, "status", Parser::Default("pending")),
    ],
    key: &["userCode", "projectCode"],
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i32),
    Missing,
}

/// Ligne lue selon un Layout
#[derive(Debug, Clone, Default)]
pub struct Record {
    values: HashMap<&'static str, Value>,
}

impl Record {
    pub fn text(&self, name: &str) -> Result<String, AppError> {
        match self.values.get(name) {
            Some(Value::Text(text)) => Ok(text.clone()),
            Some(Value::Integer(n)) => Ok(n.to_string()),
            _ => Err(AppError::validation(format!("{} is required", name))),
        }
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(Value::Text(text)) => Some(text.clone()),
            Some(Value::Integer(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Result<i32, AppError> {
        match self.values.get(name) {
            Some(Value::Integer(n)) => Ok(*n),
            _ => Err(AppError::validation(format!("{} is required", name))),
        }
    }
}

fn cell(cells: &[String], column: usize) -> &str {
    column
        .checked_sub(1)
        .and_then(|i| cells.get(i))
        .map(|c| c.trim())
        .unwrap_or("")
}

fn parse_integer(name: &str, raw: &str) -> Result<i32, AppError> {
    // "12" comme "12.0" (cellule numérique formatée)
    raw.parse::<i32>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|f| f.fract() == 0.0 && *f >= i32::MIN as f64 && *f <= i32::MAX as f64)
                .map(|f| f as i32)
        })
        .ok_or_else(|| AppError::validation(format!("{} must be an integer (got {})", name, raw)))
}

impl Layout {
    /// Clé lisible de la ligne, lue directement dans les cellules brutes
    /// (disponible même quand la ligne est invalide)
    pub fn key_of(&self, cells: &[String]) -> String {
        let parts: Vec<&str> = self
            .key
            .iter()
            .filter_map(|name| self.fields.iter().find(|f| f.name == *name))
            .map(|f| cell(cells, f.column))
            .collect();
        parts.join("/")
    }

    pub fn read(&self, cells: &[String]) -> Result<Record, AppError> {
        let mut record = Record::default();

        for field in self.fields {
            let raw = cell(cells, field.column);
            let value = match field.parser {
                Parser::Required if raw.is_empty() => {
                    return Err(AppError::validation(format!("{} is required", field.name)));
                }
                Parser::Required => Value::Text(raw.to_string()),
                Parser::Optional if raw.is_empty() => Value::Missing,
                Parser::Optional => Value::Text(raw.to_string()),
                Parser::Default(default) if raw.is_empty() => Value::Text(default.to_string()),
                Parser::Default(_) => Value::Text(raw.to_string()),
                Parser::Integer { default } if raw.is_empty() => match default {
                    Some(n) => Value::Integer(n),
                    None => {
                        return Err(AppError::validation(format!("{} is required", field.name)));
                    }
                },
                Parser::Integer { .. } => Value::Integer(parse_integer(field.name, raw)?),
            };
            record.values.insert(field.name, value);
        }

        Ok(record)
    }
}

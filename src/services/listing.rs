// ============================================================================
// LISTING / RECHERCHE
// ============================================================================
//
// Description:
//   Briques communes aux endpoints de liste (users, projets, équipements,
//   interventions):
//   - pagination optionnelle (?page=&limit=)
//   - tri sur un champ unique parmi une liste blanche par entité
//   - recherche "contient", insensible à la casse, combinée en OR
//   - enveloppe de réponse {success, data, total, pages?, currentPage?}
//
// Points d'attention:
//   - page ET limit absents => tout est retourné, pages/currentPage omis
//   - le total est compté sur le filtre + jointures, sans offset/limit
//   - les caractères % et _ de la recherche sont matchés littéralement
//
// ============================================================================

use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, EntityTrait, Order, QuerySelect};
use serde::Serialize;

use crate::error::AppError;
use crate::models::dto::ListQuery;

pub const DEFAULT_SORT: &str = "createdAt";

/// Valeur de limit quand seul page est fourni
const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    /// Parse ?page=&limit=
    /// - les deux absents => None (pas de pagination)
    /// - un seul présent => l'autre prend sa valeur par défaut (page 1, limit 10)
    /// - non numérique ou < 1 => ValidationError
    /// - offset ou limit au-delà d'un BIGINT => ValidationError
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Result<Option<Self>, AppError> {
        if page.is_none() && limit.is_none() {
            return Ok(None);
        }

        let page = match page {
            Some(raw) => parse_positive("page", raw)?,
            None => 1,
        };
        let limit = match limit {
            Some(raw) => parse_positive("limit", raw)?,
            None => DEFAULT_LIMIT,
        };

        let max = i64::MAX as u64;
        match (page - 1).checked_mul(limit) {
            Some(offset) if offset <= max && limit <= max => Ok(Some(Self { page, limit })),
            _ => Err(AppError::validation(format!(
                "Invalid pagination: page {} with limit {} is out of range",
                page, limit
            ))),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    pub fn pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }

    /// Applique OFFSET/LIMIT sur n'importe quel select SeaORM
    pub fn apply<S: QuerySelect>(pagination: Option<&Self>, select: S) -> S {
        match pagination {
            Some(p) => select.offset(p.offset()).limit(p.limit),
            None => select,
        }
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u64, AppError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(AppError::validation(format!(
            "Invalid {} value: {} (expected a positive integer)",
            name, raw
        ))),
    }
}

/// Requête de liste validée, prête pour les services
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub pagination: Option<Pagination>,
    pub sort: String,
    pub search: Option<String>,
}

impl ListRequest {
    pub fn from_query(query: &ListQuery) -> Result<Self, AppError> {
        let pagination = Pagination::from_query(query.page.as_deref(), query.limit.as_deref())?;

        let sort = query
            .sort
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SORT)
            .to_string();

        Ok(Self {
            pagination,
            sort,
            search: search_term(query.search.as_deref()),
        })
    }

    /// Résout le champ de tri via la liste blanche de l'entité
    pub fn sort_column<C>(&self, lookup: fn(&str) -> Option<C>) -> Result<C, AppError> {
        lookup(&self.sort)
            .ok_or_else(|| AppError::validation(format!("Invalid sort field: {}", self.sort)))
    }
}

/// Terme de recherche nettoyé; vide ou blanc => None (aucun filtre)
pub fn search_term(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Motif LIKE "%terme%" en minuscules, avec échappement de \ % _
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// lower("table"."colonne") LIKE '%motif%' ESCAPE '\'
/// La colonne est qualifiée par sa table pour rester non ambiguë dans les jointures
pub fn contains<E, C>(entity: E, column: C, pattern: &str) -> SimpleExpr
where
    E: EntityTrait,
    C: ColumnTrait,
{
    Expr::expr(Func::lower(Expr::col((entity, column))))
        .like(LikeExpr::new(pattern).escape('\\'))
}

/// Ordre de tri par défaut d'un endpoint
pub fn order(descending: bool) -> Order {
    if descending { Order::Desc } else { Order::Asc }
}

/// Enveloppe de réponse des listes
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, pagination: Option<&Pagination>) -> Self {
        Self {
            success: true,
            data,
            total,
            pages: pagination.map(|p| p.pages(total)),
            current_page: pagination.map(|p| p.page),
        }
    }
}

//! Pagination and sorting shared by every collection endpoint.
//!
//! Collections are sliced with 1-based inclusive `start`/`end` query
//! parameters and ordered by a fixed per-resource set of sort keys.

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, FieldError};

/// Requested slice of a collection, as sent by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl Window {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    /// Clamps the window to a collection of `total` items and returns
    /// `(offset, len)`.
    pub fn resolve(&self, total: usize) -> (usize, usize) {
        let total = total as i64;
        let start = self.start.unwrap_or(1).max(1);
        let end = self.end.unwrap_or(total).min(total);
        if start > end {
            return ((start - 1).min(total) as usize, 0);
        }
        ((start - 1) as usize, (end - start + 1) as usize)
    }
}

/// A fixed set of orderings a collection can be sorted by.
pub trait SortKey: Sized + Copy + 'static {
    /// Query-string spelling of every key.
    const CHOICES: &'static [(&'static str, Self)];
    /// Ordering used when no key is requested.
    const DEFAULT_ORDER: &'static str;

    /// SQL `ORDER BY` body for this key.
    fn order_by(self) -> &'static str;

    fn parse(raw: &str) -> Option<Self> {
        Self::CHOICES
            .iter()
            .find(|(name, _)| *name == raw)
            .map(|(_, key)| *key)
    }

    fn sql(key: Option<Self>) -> &'static str {
        key.map_or(Self::DEFAULT_ORDER, Self::order_by)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSort {
    Popular,
    AscPrice,
    DescPrice,
    Alphabet,
}

impl SortKey for ProductSort {
    const CHOICES: &'static [(&'static str, Self)] = &[
        ("popular", Self::Popular),
        ("asc_price", Self::AscPrice),
        ("desc_price", Self::DescPrice),
        ("alphabet", Self::Alphabet),
    ];
    const DEFAULT_ORDER: &'static str = "p.id";

    fn order_by(self) -> &'static str {
        match self {
            Self::Popular => "p.sales DESC, p.id",
            Self::AscPrice => "p.price ASC, p.id",
            Self::DescPrice => "p.price DESC, p.id",
            Self::Alphabet => "p.name ASC, p.id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewSort {
    AscRating,
    DescRating,
}

impl SortKey for ReviewSort {
    const CHOICES: &'static [(&'static str, Self)] = &[
        ("asc_rating", Self::AscRating),
        ("desc_rating", Self::DescRating),
    ];
    const DEFAULT_ORDER: &'static str = "r.id";

    fn order_by(self) -> &'static str {
        match self {
            Self::AscRating => "r.rating ASC, r.id",
            Self::DescRating => "r.rating DESC, r.id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSort {
    AscDate,
    DescDate,
}

impl SortKey for OrderSort {
    const CHOICES: &'static [(&'static str, Self)] = &[
        ("asc_date", Self::AscDate),
        ("desc_date", Self::DescDate),
    ];
    const DEFAULT_ORDER: &'static str = "o.id";

    fn order_by(self) -> &'static str {
        match self {
            Self::AscDate => "o.created_at ASC, o.id",
            Self::DescDate => "o.created_at DESC, o.id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSort {
    Email,
    Name,
}

impl SortKey for UserSort {
    const CHOICES: &'static [(&'static str, Self)] =
        &[("email", Self::Email), ("name", Self::Name)];
    const DEFAULT_ORDER: &'static str = "u.id";

    fn order_by(self) -> &'static str {
        match self {
            Self::Email => "u.email ASC, u.id",
            Self::Name => "u.last_name ASC, u.first_name ASC, u.id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFilter {
    IsVerified,
}

/// Sort key plus window, ready for a store query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listing<S> {
    pub sort: Option<S>,
    pub window: Window,
}

impl<S> Default for Listing<S> {
    fn default() -> Self {
        Self {
            sort: None,
            window: Window::default(),
        }
    }
}

/// One slice of a collection together with the collection's full size.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Wire shape of every collection response.
#[derive(Debug, Serialize)]
pub struct Collection<T> {
    pub items: Vec<T>,
    pub items_count: usize,
    pub total: usize,
}

impl<T> From<Page<T>> for Collection<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items_count: page.items.len(),
            total: page.total,
            items: page.items,
        }
    }
}

/// Raw collection query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub sort: Option<String>,
    pub filter: Option<String>,
}

impl ListParams {
    pub fn listing<S: SortKey>(&self) -> Result<Listing<S>, ApiError> {
        let mut errors = Vec::new();
        let start = parse_bound("start", self.start.as_deref(), &mut errors);
        let end = parse_bound("end", self.end.as_deref(), &mut errors);
        let sort = match self.sort.as_deref().filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => {
                let key = S::parse(raw);
                if key.is_none() {
                    errors.push(enum_error::<S>("sort"));
                }
                key
            }
        };
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }
        Ok(Listing {
            sort,
            window: Window::new(start, end),
        })
    }

    pub fn user_filter(&self) -> Result<Option<UserFilter>, ApiError> {
        match self.filter.as_deref().filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some("is_verified") => Ok(Some(UserFilter::IsVerified)),
            Some(_) => Err(ApiError::Validation(vec![FieldError::new(
                "filter",
                "type_error.enum",
                "value is not a valid enumeration member; permitted: 'is_verified'",
            )])),
        }
    }
}

fn parse_bound(name: &str, raw: Option<&str>, errors: &mut Vec<FieldError>) -> Option<i64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse::<i64>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(FieldError::new(
                name,
                "type_error.integer",
                "value is not a valid integer",
            ));
            None
        }
    }
}

fn enum_error<S: SortKey>(source: &str) -> FieldError {
    let permitted = S::CHOICES
        .iter()
        .map(|(name, _)| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ");
    FieldError::new(
        source,
        "type_error.enum",
        format!("value is not a valid enumeration member; permitted: {permitted}"),
    )
}

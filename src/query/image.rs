use super::SqlParam;
use crate::{
    dialect::{CurrentDialect, Dialect},
    model::ImagePrivacy,
};

/// Represents a logical filter over the `images` table.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageQueryExpr {
    /// Public images, or images owned by the given viewer.
    VisibleTo(Option<i64>),

    /// Case-insensitive substring of the tags or the type.
    Text(String),

    /// Images owned by the given user.
    Owner(i64),

    /// Images with exactly this privacy.
    Privacy(ImagePrivacy),

    /// Logical AND of two subexpressions.
    And(Box<ImageQueryExpr>, Box<ImageQueryExpr>),
}

impl ImageQueryExpr {
    pub fn visible_to(viewer: Option<i64>) -> Self {
        ImageQueryExpr::VisibleTo(viewer)
    }

    pub fn text<T: Into<String>>(text: T) -> Self {
        ImageQueryExpr::Text(text.into())
    }

    pub fn owner(user_id: i64) -> Self {
        ImageQueryExpr::Owner(user_id)
    }

    pub fn privacy(privacy: ImagePrivacy) -> Self {
        ImageQueryExpr::Privacy(privacy)
    }

    /// Combines two expressions with a logical AND.
    pub fn and(self, other: ImageQueryExpr) -> Self {
        ImageQueryExpr::And(Box::new(self), Box::new(other))
    }

    /// Converts the query expression into an SQL fragment and its bound parameters.
    pub fn to_sql(&self) -> (String, Vec<SqlParam>) {
        let mut params = Vec::new();
        let sql = self.build_sql(&mut params);
        (sql, params)
    }

    fn build_sql(&self, params: &mut Vec<SqlParam>) -> String {
        match self {
            ImageQueryExpr::VisibleTo(viewer) => {
                params.push(SqlParam::from(*viewer));
                CurrentDialect::visible_to_query(params.len())
            }
            ImageQueryExpr::Text(text) => {
                let pattern = like_pattern(text);
                params.push(SqlParam::Text(pattern.clone()));
                let tags_idx = params.len();
                params.push(SqlParam::Text(pattern));
                CurrentDialect::text_match_query(tags_idx, params.len())
            }
            ImageQueryExpr::Owner(user_id) => {
                params.push(SqlParam::Int(*user_id));
                CurrentDialect::owner_query(params.len())
            }
            ImageQueryExpr::Privacy(privacy) => {
                params.push(SqlParam::Text(privacy.as_str().to_string()));
                CurrentDialect::privacy_query(params.len())
            }
            ImageQueryExpr::And(lhs, rhs) => {
                format!("({} AND {})", lhs.build_sql(params), rhs.build_sql(params))
            }
        }
    }
}

/// Lowercases `text`, escapes `LIKE` wildcards and wraps it in `%...%`.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(Debug, Clone)]
pub enum ImageQueryKind {
    All,
    Where(ImageQueryExpr),
}

impl ImageQueryKind {
    pub fn to_sql(&self) -> (String, Vec<SqlParam>) {
        match self {
            ImageQueryKind::All => ("".to_string(), vec![]),
            ImageQueryKind::Where(query_expr) => {
                let (sql, params) = query_expr.to_sql();

                (format!("WHERE {}", sql), params)
            }
        }
    }
}

/// A full image query: filter, newest-first ordering and pagination.
#[derive(Debug, Clone)]
pub struct ImageQuery {
    /// The logical expression used for filtering.
    pub expr: ImageQueryKind,

    /// The maximum number of results to return.
    pub limit: Option<i64>,

    /// The offset into the result set.
    pub offset: Option<i64>,
}

impl ImageQuery {
    pub fn new(expr: ImageQueryKind) -> Self {
        Self {
            expr,
            limit: None,
            offset: None,
        }
    }

    /// Shorthand for a query whose filter always includes the visibility predicate.
    pub fn visible_to(viewer: Option<i64>, filter: Option<ImageQueryExpr>) -> Self {
        let visible = ImageQueryExpr::visible_to(viewer);
        let expr = match filter {
            Some(filter) => visible.and(filter),
            None => visible,
        };

        Self::new(ImageQueryKind::Where(expr))
    }

    /// Sets the `LIMIT` for this query.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the `OFFSET` for this query.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Converts the filter alone, as used for counting.
    pub fn to_count_sql(&self) -> (String, Vec<SqlParam>) {
        self.expr.to_sql()
    }

    /// Converts the full query into an SQL string and bound parameters.
    ///
    /// The generated SQL orders newest first and includes any LIMIT or OFFSET.
    pub fn to_sql(&self) -> (String, Vec<SqlParam>) {
        let (mut where_sql, mut params) = self.expr.to_sql();

        where_sql.push_str(" ORDER BY images.created_at DESC, images.id DESC");

        if let Some(limit) = self.limit {
            params.push(SqlParam::Int(limit));
            where_sql
                .push_str(format!(" LIMIT {}", CurrentDialect::placeholder(params.len())).as_str());
        }

        if let Some(offset) = self.offset {
            // SQLite only accepts OFFSET after a LIMIT.
            if self.limit.is_none() {
                where_sql.push_str(" LIMIT -1");
            }
            params.push(SqlParam::Int(offset));
            where_sql.push_str(
                format!(" OFFSET {}", CurrentDialect::placeholder(params.len())).as_str(),
            );
        }

        (where_sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::{CurrentDialect, Dialect, ImageQuery, ImageQueryExpr, ImageQueryKind, like_pattern};
    use crate::{model::ImagePrivacy, query::SqlParam};

    #[test]
    fn test_build_query() {
        let query = ImageQuery::new(ImageQueryKind::Where(
            ImageQueryExpr::visible_to(Some(7))
                .and(ImageQueryExpr::text("Cat"))
                .and(ImageQueryExpr::privacy(ImagePrivacy::Shared)),
        ))
        .with_limit(10)
        .with_offset(20);

        let (sql, params) = query.to_sql();

        assert_eq!(
            format!(
                "WHERE (({} AND {}) AND {}) ORDER BY images.created_at DESC, images.id DESC LIMIT {} OFFSET {}",
                CurrentDialect::visible_to_query(1),
                CurrentDialect::text_match_query(2, 3),
                CurrentDialect::privacy_query(4),
                CurrentDialect::placeholder(5),
                CurrentDialect::placeholder(6),
            ),
            sql
        );
        assert_eq!(
            vec![
                SqlParam::Int(7),
                SqlParam::Text("%cat%".to_string()),
                SqlParam::Text("%cat%".to_string()),
                SqlParam::Text("SHARED".to_string()),
                SqlParam::Int(10),
                SqlParam::Int(20),
            ],
            params
        );
    }

    #[test]
    fn test_anonymous_viewer_binds_null() {
        let (sql, params) = ImageQuery::visible_to(None, None).to_count_sql();

        assert_eq!(format!("WHERE {}", CurrentDialect::visible_to_query(1)), sql);
        assert_eq!(vec![SqlParam::Null], params);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!("%100\\%\\_sure%", like_pattern("100%_sure"));
        assert_eq!("%a\\_b%", like_pattern(" A_b "));
    }
}

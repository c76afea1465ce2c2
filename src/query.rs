//! Brief-search query construction and list paging options.

use std::fmt;

/// Largest page size the API accepts. Forced during full-result retrieval to
/// keep the number of follow-up calls down.
pub(crate) const MAX_LIMIT: i64 = 100;

/// Ordered field filters rendered into Alma's brief-search syntax:
/// `field~value AND field2~value2`. Spaces inside values are replaced with
/// underscores, which the API treats as a phrase separator.
#[derive(Clone, Debug, Default)]
pub struct BriefQuery {
    fields: Vec<(String, String)>,
}

impl BriefQuery {
    pub fn new() -> Self {
        BriefQuery::default()
    }

    /// Appends one `field~value` filter. Insertion order is preserved in the
    /// rendered string.
    pub fn with_field(mut self, field: &str, value: &str) -> Self {
        self.fields.push((field.to_string(), value.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for BriefQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{}~{}", field, value.replace(' ', "_"))?;
        }
        Ok(())
    }
}

/// Options for list reads: the paging window, the full-retrieval flag, and
/// extra query parameters passed through verbatim.
#[derive(Clone, Debug)]
pub struct PageOptions {
    pub(crate) limit: i64,
    pub(crate) offset: i64,
    pub(crate) all_records: bool,
    pub(crate) extra: Vec<(String, String)>,
}

impl Default for PageOptions {
    fn default() -> Self {
        PageOptions {
            limit: 10,
            offset: 0,
            all_records: false,
            extra: Vec::new(),
        }
    }
}

impl PageOptions {
    pub fn new() -> Self {
        PageOptions::default()
    }

    /// Records per page. Clamped to 1..=100 when the request is built.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Row to start from, zero-based.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Keep issuing requests until every record matching the query has been
    /// retrieved.
    pub fn all_records(mut self) -> Self {
        self.all_records = true;
        self
    }

    /// Passes an arbitrary query parameter through to the API, for example
    /// `expand` or an explicit `format` override.
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.extra.push((key.to_string(), value.to_string()));
        self
    }

    /// Query pairs for a list request: the extras first, then the clamped
    /// paging window.
    pub(crate) fn to_params(&self) -> Vec<(String, String)> {
        let mut params = self.extra.clone();
        params.push(("limit".to_string(), self.clamped_limit().to_string()));
        params.push(("offset".to_string(), self.offset.to_string()));
        params
    }

    pub(crate) fn clamped_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_joins_filters_in_insertion_order() {
        let q = BriefQuery::new()
            .with_field("first_name", "Sterling")
            .with_field("last_name", "Archer");
        insta::assert_snapshot!(q.to_string(), @"first_name~Sterling AND last_name~Archer");
    }

    #[test]
    fn single_filter_renders_without_a_conjunction() {
        let q = BriefQuery::new().with_field("primary_id", "doe001");
        assert_eq!(q.to_string(), "primary_id~doe001");
    }

    #[test]
    fn spaces_in_values_become_underscores() {
        let q = BriefQuery::new().with_field("last_name", "van der Berg");
        insta::assert_snapshot!(q.to_string(), @"last_name~van_der_Berg");
    }

    #[test]
    fn empty_query_renders_empty() {
        assert!(BriefQuery::new().is_empty());
        assert_eq!(BriefQuery::new().to_string(), "");
    }

    #[test]
    fn limit_is_clamped_into_the_documented_range() {
        let high = PageOptions::new().with_limit(500).to_params();
        assert!(high.contains(&("limit".to_string(), "100".to_string())));

        let low = PageOptions::new().with_limit(0).to_params();
        assert!(low.contains(&("limit".to_string(), "1".to_string())));
    }

    #[test]
    fn extras_precede_the_paging_window() {
        let params = PageOptions::new()
            .with_param("expand", "fees")
            .with_offset(20)
            .to_params();
        assert_eq!(params[0], ("expand".to_string(), "fees".to_string()));
        assert_eq!(params[1], ("limit".to_string(), "10".to_string()));
        assert_eq!(params[2], ("offset".to_string(), "20".to_string()));
    }
}

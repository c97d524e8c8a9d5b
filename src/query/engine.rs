//! Query engine: lazy, most-recent-first filtering of event records

use std::fmt;

use thiserror::Error;
use tracing::debug;

use super::pattern::{CompiledPattern, NonNumericField};
use super::record::EventRecord;

/// Options for a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Stop after this many matches
    pub limit: Option<usize>,
    /// Record an [`InvalidPattern`] for every skipped record
    pub collect_diagnostics: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: None,
            collect_diagnostics: true,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of matches
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Enable or disable diagnostics
    pub fn with_diagnostics(mut self, collect: bool) -> Self {
        self.collect_diagnostics = collect;
        self
    }
}

/// Identifies a record in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordId {
    /// Position in the input slice
    pub index: usize,
    pub timestamp: i64,
    pub source: String,
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record #{} (t={}", self.index, self.timestamp)?;
        if !self.source.is_empty() {
            write!(f, ", source={}", self.source)?;
        }
        write!(f, ")")
    }
}

/// A record skipped because a numeric comparison met a non-number
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{record}: field {field} holds a {found}, expected a number")]
pub struct InvalidPattern {
    pub record: RecordId,
    /// Selector of the offending field, e.g. `$.latency`
    pub field: String,
    pub found: String,
}

impl InvalidPattern {
    fn new(index: usize, record: &EventRecord, err: NonNumericField) -> Self {
        Self {
            record: RecordId {
                index,
                timestamp: record.timestamp(),
                source: record.source().to_string(),
            },
            field: err.selector(),
            found: err.found.to_string(),
        }
    }
}

/// Visiting order over the input
#[derive(Debug)]
enum Order {
    /// Input is ascending: walk from the end
    Backward { next: usize },
    /// Input is strictly descending: walk from the start
    Forward { next: usize, len: usize },
    /// Anything else: indices sorted up front
    Sorted(std::vec::IntoIter<usize>),
}

impl Order {
    fn plan(records: &[EventRecord]) -> Self {
        let ascending = records.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp());
        if ascending {
            return Order::Backward { next: records.len() };
        }

        let descending = records.windows(2).all(|w| w[0].timestamp() > w[1].timestamp());
        if descending {
            return Order::Forward {
                next: 0,
                len: records.len(),
            };
        }

        // Newest first; among equal timestamps the later input first
        let mut indices: Vec<usize> = (0..records.len()).collect();
        indices.sort_by(|&a, &b| {
            records[b]
                .timestamp()
                .cmp(&records[a].timestamp())
                .then(b.cmp(&a))
        });
        Order::Sorted(indices.into_iter())
    }

    fn name(&self) -> &'static str {
        match self {
            Order::Backward { .. } => "backward",
            Order::Forward { .. } => "forward",
            Order::Sorted(_) => "sorted",
        }
    }
}

impl Iterator for Order {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Order::Backward { next } => {
                if *next == 0 {
                    return None;
                }
                *next -= 1;
                Some(*next)
            }
            Order::Forward { next, len } => {
                if *next >= *len {
                    return None;
                }
                *next += 1;
                Some(*next - 1)
            }
            Order::Sorted(indices) => indices.next(),
        }
    }
}

/// Lazy query over a slice of records.
///
/// Yields matching records newest first. Each record is evaluated at most
/// once and only when the iterator is advanced past it.
#[derive(Debug)]
pub struct Query<'a> {
    records: &'a [EventRecord],
    pattern: &'a CompiledPattern,
    order: Order,
    remaining: Option<usize>,
    collect_diagnostics: bool,
    diagnostics: Vec<InvalidPattern>,
    scanned: usize,
    matched: usize,
    finished: bool,
}

impl<'a> Query<'a> {
    fn new(records: &'a [EventRecord], pattern: &'a CompiledPattern, options: QueryOptions) -> Self {
        let order = Order::plan(records);
        debug!(
            records = records.len(),
            order = order.name(),
            pattern = %pattern,
            "starting query"
        );
        Self {
            records,
            pattern,
            order,
            remaining: options.limit,
            collect_diagnostics: options.collect_diagnostics,
            diagnostics: Vec::new(),
            scanned: 0,
            matched: 0,
            finished: false,
        }
    }

    /// Diagnostics for records skipped so far
    pub fn diagnostics(&self) -> &[InvalidPattern] {
        &self.diagnostics
    }

    /// Number of records evaluated so far
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Drain the query into matches plus diagnostics
    pub fn into_results(mut self) -> QueryResults<'a> {
        let records: Vec<&'a EventRecord> = self.by_ref().collect();
        QueryResults {
            records,
            diagnostics: self.diagnostics,
        }
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            debug!(
                scanned = self.scanned,
                matched = self.matched,
                skipped = self.diagnostics.len(),
                "query finished"
            );
        }
    }
}

impl<'a> Iterator for Query<'a> {
    type Item = &'a EventRecord;

    fn next(&mut self) -> Option<&'a EventRecord> {
        if self.remaining == Some(0) {
            self.finish();
            return None;
        }

        while let Some(index) = self.order.next() {
            let record = &self.records[index];
            self.scanned += 1;

            match self.pattern.matches(record) {
                Ok(true) => {
                    self.matched += 1;
                    if let Some(remaining) = self.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    return Some(record);
                }
                Ok(false) => {}
                Err(err) => {
                    if self.collect_diagnostics {
                        self.diagnostics.push(InvalidPattern::new(index, record, err));
                    }
                }
            }
        }

        self.finish();
        None
    }
}

/// Everything a drained query produced
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResults<'a> {
    /// Matches, newest first
    pub records: Vec<&'a EventRecord>,
    pub diagnostics: Vec<InvalidPattern>,
}

/// Query records with a compiled pattern.
///
/// # Example
///
/// ```rust
/// use stackscope::{query, CompiledPattern, EventRecord};
///
/// let records = vec![
///     EventRecord::from_json(r#"{"timestamp": 1, "state": "OK"}"#).unwrap(),
///     EventRecord::from_json(r#"{"timestamp": 2, "state": "FAILED"}"#).unwrap(),
///     EventRecord::from_json(r#"{"timestamp": 3, "state": "FAILED"}"#).unwrap(),
/// ];
/// let pattern = CompiledPattern::parse(r#"{ $.state = "FAILED" }"#).unwrap();
///
/// let times: Vec<i64> = query(&records, &pattern, None).map(|r| r.timestamp()).collect();
/// assert_eq!(times, vec![3, 2]);
/// ```
pub fn query<'a>(records: &'a [EventRecord], pattern: &'a CompiledPattern, limit: Option<usize>) -> Query<'a> {
    let options = QueryOptions {
        limit,
        ..QueryOptions::default()
    };
    Query::new(records, pattern, options)
}

/// Query records with explicit options
pub fn query_with_options<'a>(
    records: &'a [EventRecord],
    pattern: &'a CompiledPattern,
    options: QueryOptions,
) -> Query<'a> {
    Query::new(records, pattern, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Mapping;

    fn rec(timestamp: i64, state: &str) -> EventRecord {
        EventRecord::new(timestamp, "src", Mapping::new()).with_field("state", state)
    }

    fn times(query: Query<'_>) -> Vec<i64> {
        query.map(|r| r.timestamp()).collect()
    }

    #[test]
    fn test_order_plans() {
        assert_eq!(Order::plan(&[rec(1, "a"), rec(2, "a"), rec(2, "a")]).name(), "backward");
        assert_eq!(Order::plan(&[rec(3, "a"), rec(2, "a"), rec(1, "a")]).name(), "forward");
        assert_eq!(Order::plan(&[rec(3, "a"), rec(3, "a"), rec(1, "a")]).name(), "sorted");
        assert_eq!(Order::plan(&[rec(2, "a"), rec(3, "a"), rec(1, "a")]).name(), "sorted");
        assert_eq!(Order::plan(&[]).name(), "backward");
    }

    #[test]
    fn test_descending_for_every_order() {
        let all = CompiledPattern::parse("").unwrap();
        let inputs = [
            vec![rec(1, "a"), rec(2, "a"), rec(3, "a")],
            vec![rec(3, "a"), rec(2, "a"), rec(1, "a")],
            vec![rec(2, "a"), rec(3, "a"), rec(1, "a")],
        ];
        for records in &inputs {
            assert_eq!(times(query(records, &all, None)), vec![3, 2, 1]);
        }
    }

    #[test]
    fn test_ties_later_input_first() {
        let all = CompiledPattern::parse("").unwrap();
        let sources = |records: &[EventRecord]| -> Vec<String> {
            query(records, &all, None)
                .map(|r| r.fields().get("state").and_then(|v| v.as_str()).unwrap_or("").to_string())
                .collect()
        };
        let ascending = vec![rec(1, "first"), rec(1, "second")];
        assert_eq!(sources(&ascending), vec!["second", "first"]);
        let shuffled = vec![rec(1, "first"), rec(2, "x"), rec(1, "second")];
        assert_eq!(sources(&shuffled), vec!["x", "second", "first"]);
    }

    #[test]
    fn test_limit_applies_after_matching() {
        let records = vec![rec(1, "FAILED"), rec(2, "OK"), rec(3, "FAILED"), rec(4, "OK")];
        let failed = CompiledPattern::parse(r#"$.state = "FAILED""#).unwrap();
        assert_eq!(times(query(&records, &failed, Some(1))), vec![3]);
        assert_eq!(times(query(&records, &failed, Some(5))), vec![3, 1]);
        assert!(times(query(&records, &failed, Some(0))).is_empty());
    }

    #[test]
    fn test_lazy_evaluation() {
        let records = vec![rec(1, "a"), rec(2, "a"), rec(3, "a")];
        let all = CompiledPattern::parse("").unwrap();
        let mut q = query(&records, &all, None);
        assert_eq!(q.scanned(), 0);
        assert_eq!(q.next().map(|r| r.timestamp()), Some(3));
        assert_eq!(q.scanned(), 1);
    }

    #[test]
    fn test_diagnostics() {
        let records = vec![
            EventRecord::new(1, "api", Mapping::new()).with_field("latency", 700i64),
            EventRecord::new(2, "api", Mapping::new()).with_field("latency", "slow"),
            EventRecord::new(3, "api", Mapping::new()),
        ];
        let pattern = CompiledPattern::parse("$.latency > 500").unwrap();

        let results = query(&records, &pattern, None).into_results();
        assert_eq!(results.records.len(), 1);
        assert_eq!(results.records[0].timestamp(), 1);
        assert_eq!(
            results.diagnostics,
            vec![InvalidPattern {
                record: RecordId {
                    index: 1,
                    timestamp: 2,
                    source: "api".to_string(),
                },
                field: "$.latency".to_string(),
                found: "string".to_string(),
            }]
        );
        assert_eq!(
            results.diagnostics[0].to_string(),
            "record #1 (t=2, source=api): field $.latency holds a string, expected a number"
        );

        let quiet = query_with_options(&records, &pattern, QueryOptions::new().with_diagnostics(false));
        assert!(quiet.into_results().diagnostics.is_empty());
    }
}

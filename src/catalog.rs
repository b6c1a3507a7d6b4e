//! Chronological revision catalog
//!
//! Collects the raw record lines the backend reports for a range and sorts
//! them ascending by date, oldest first. Records keep their full raw text
//! so the display can show exactly what the backend said.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::p4::{Backend, RangeQuery};

/// Calendar date carried by a revision record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RevDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl RevDate {
    /// Sentinel that sorts before every real date
    pub const FIRST: RevDate = RevDate {
        year: 0,
        month: 0,
        day: 0,
    };

    /// Sentinel that sorts after every real date
    pub const LAST: RevDate = RevDate {
        year: u16::MAX,
        month: u8::MAX,
        day: u8::MAX,
    };

    /// Parse a `YYYY/MM/DD` field as printed by p4 labels and p4 changes
    pub fn parse(field: &str) -> Option<RevDate> {
        let mut parts = field.split('/');
        let year = parts.next()?.parse().ok()?;
        let month = parts.next()?.parse().ok()?;
        let day = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(RevDate { year, month, day })
    }
}

/// Verdict state of a single revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Good,
    Bad,
    Unknown,
}

/// One revision as reported by the backend
#[derive(Debug, Clone)]
pub struct RevisionRecord {
    pub descriptor: String,
    pub date: RevDate,
    pub status: Status,
}

/// What to do with records whose date cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UndatedPolicy {
    /// Drop the record entirely
    Reject,
    /// Keep it, sorting before every dated record
    First,
    /// Keep it, sorting after every dated record
    Last,
}

impl Default for UndatedPolicy {
    fn default() -> Self {
        UndatedPolicy::Last
    }
}

impl UndatedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UndatedPolicy::Reject => "reject",
            UndatedPolicy::First => "first",
            UndatedPolicy::Last => "last",
        }
    }

    pub fn from_str(s: &str) -> Option<UndatedPolicy> {
        match s {
            "reject" => Some(UndatedPolicy::Reject),
            "first" => Some(UndatedPolicy::First),
            "last" => Some(UndatedPolicy::Last),
            _ => None,
        }
    }
}

/// Labels carry the date as the third whitespace field, changelists as the
/// fourth. Try the third and fall back, so both record shapes parse without
/// knowing the query mode.
fn parse_record_date(raw: &str) -> Option<RevDate> {
    let mut fields = raw.split_whitespace();
    let third = fields.nth(2);
    let fourth = fields.next();
    third
        .and_then(RevDate::parse)
        .or_else(|| fourth.and_then(RevDate::parse))
}

/// Accumulates raw record lines ahead of the one-time sort into a Catalog
#[derive(Debug)]
pub struct CatalogBuilder {
    records: Vec<RevisionRecord>,
    policy: UndatedPolicy,
    undated: usize,
}

impl CatalogBuilder {
    pub fn new(policy: UndatedPolicy) -> Self {
        Self {
            records: Vec::new(),
            policy,
            undated: 0,
        }
    }

    /// Ingest one raw record line, extracting its date
    pub fn ingest(&mut self, raw: &str) {
        let date = match parse_record_date(raw) {
            Some(date) => date,
            None => {
                self.undated += 1;
                match self.policy {
                    UndatedPolicy::Reject => return,
                    UndatedPolicy::First => RevDate::FIRST,
                    UndatedPolicy::Last => RevDate::LAST,
                }
            }
        };

        self.records.push(RevisionRecord {
            descriptor: raw.to_string(),
            date,
            status: Status::Unknown,
        });
    }

    /// Sort the collected records and produce the catalog
    pub fn finish(mut self) -> Catalog {
        // Stable sort, so records with equal dates keep their arrival order
        self.records.sort_by_key(|record| record.date);

        Catalog {
            records: self.records,
            undated: self.undated,
        }
    }
}

/// Date-ordered sequence of revisions, oldest first
#[derive(Debug, Clone)]
pub struct Catalog {
    records: Vec<RevisionRecord>,
    undated: usize,
}

impl Catalog {
    /// Query the backend and build the catalog for one range
    pub fn fetch(
        backend: &dyn Backend,
        query: &RangeQuery,
        policy: UndatedPolicy,
    ) -> Result<Catalog> {
        let mut builder = CatalogBuilder::new(policy);
        backend.list_revisions(query, &mut |line| builder.ingest(line))?;
        Ok(builder.finish())
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of ingested records whose date could not be parsed
    pub fn undated_count(&self) -> usize {
        self.undated
    }

    pub fn records(&self) -> &[RevisionRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&RevisionRecord> {
        self.records.get(index)
    }

    pub fn status(&self, index: usize) -> Option<Status> {
        self.records.get(index).map(|record| record.status)
    }

    /// Set the verdict state of one revision. Out-of-range indices are ignored.
    pub fn set_status(&mut self, index: usize, status: Status) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = status;
        }
    }

    /// Display line for one revision: a four-character state prefix followed
    /// by the raw descriptor. `synced` marks the revision currently
    /// materialized in the workspace.
    pub fn formatted_line(&self, index: usize, synced: Option<usize>) -> Option<String> {
        let record = self.records.get(index)?;
        let prefix = match record.status {
            Status::Good => "[g] ",
            Status::Bad => "[b] ",
            Status::Unknown if synced == Some(index) => "[s] ",
            Status::Unknown => "    ",
        };
        Some(format!("{}{}", prefix, record.descriptor))
    }
}

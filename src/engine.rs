//! Bisection state engine
//!
//! Owns the catalog for one session and narrows a good/bad window over it,
//! one verdict at a time, until the first bad revision is isolated.

use thiserror::Error;

use crate::catalog::{Catalog, Status};

/// Human judgment on one revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Good,
    Bad,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Good => "good",
            Verdict::Bad => "bad",
        }
    }
}

/// Rejections the engine reports instead of mutating state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BisectError {
    #[error("no revisions in the requested range")]
    EmptyRange,
    #[error("revision {index} is out of range (catalog holds {count})")]
    OutOfRange { index: usize, count: usize },
    #[error("revision {index} is already decided or outside the search window")]
    NotEligible { index: usize },
}

/// Boundary indices of the active search window
#[derive(Debug, Clone, Copy)]
struct Window {
    last_good: usize,
    first_bad: usize,
}

/// Binary-search state over one revision catalog
#[derive(Debug)]
pub struct BisectEngine {
    catalog: Catalog,
    window: Window,
}

impl BisectEngine {
    /// Take ownership of a freshly built catalog and open the window.
    ///
    /// The oldest revision is forced good and the newest bad; everything
    /// between starts unknown.
    pub fn start(mut catalog: Catalog) -> Result<BisectEngine, BisectError> {
        if catalog.is_empty() {
            return Err(BisectError::EmptyRange);
        }

        let newest = catalog.count() - 1;
        catalog.set_status(0, Status::Good);
        catalog.set_status(newest, Status::Bad);

        Ok(BisectEngine {
            catalog,
            window: Window {
                last_good: 0,
                first_bad: newest,
            },
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn count(&self) -> usize {
        self.catalog.count()
    }

    pub fn last_good(&self) -> usize {
        self.window.last_good
    }

    pub fn first_bad(&self) -> usize {
        self.window.first_bad
    }

    /// Midpoint of the window: the next revision worth testing
    pub fn candidate(&self) -> usize {
        (self.window.last_good + self.window.first_bad) / 2
    }

    /// Whether the window has closed to an adjacent good/bad pair
    pub fn is_isolated(&self) -> bool {
        self.window.first_bad == self.window.last_good + 1
    }

    /// Index of the regression point once the window has closed
    pub fn culprit(&self) -> Option<usize> {
        if self.is_isolated() {
            Some(self.window.first_bad)
        } else {
            None
        }
    }

    /// Record a verdict for one revision inside the open window.
    ///
    /// A good verdict implies every older revision back to the boundary is
    /// also good; a bad verdict implies every newer one up to the boundary
    /// is also bad. The matching boundary then advances to `index`.
    pub fn mark(&mut self, index: usize, verdict: Verdict) -> Result<(), BisectError> {
        let count = self.catalog.count();
        if index >= count {
            return Err(BisectError::OutOfRange { index, count });
        }
        if index <= self.window.last_good || index >= self.window.first_bad {
            // Everything at or outside the boundaries already carries a
            // final verdict, including the boundaries themselves.
            return Err(BisectError::NotEligible { index });
        }
        debug_assert_eq!(self.catalog.status(index), Some(Status::Unknown));

        match verdict {
            Verdict::Good => {
                for i in self.window.last_good + 1..=index {
                    self.catalog.set_status(i, Status::Good);
                }
                self.window.last_good = index;
            }
            Verdict::Bad => {
                for i in index..self.window.first_bad {
                    self.catalog.set_status(i, Status::Bad);
                }
                self.window.first_bad = index;
            }
        }

        Ok(())
    }
}

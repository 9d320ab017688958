//! Continue-on-error collection of independent failures.
//!
//! [`ErrorCatcher`] gathers the failures of several unrelated checks and
//! reports them together as one [`AggregateError`], so validation surfaces
//! every problem at once instead of stopping at the first.

use std::fmt;

use parking_lot::RwLock;

/// Thread-safe collector of error messages.
///
/// All methods take `&self`; share a catcher between tasks with an `Arc`.
/// Errors are kept as their rendered messages in insertion order.
#[derive(Debug, Default)]
pub struct ErrorCatcher {
    errs: RwLock<Vec<String>>,
}

impl ErrorCatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an error.
    pub fn add<E: fmt::Display>(&self, err: E) {
        self.errs.write().push(err.to_string());
    }

    /// Adds the error if there is one.
    pub fn add_opt<E: fmt::Display>(&self, err: Option<E>) {
        if let Some(err) = err {
            self.add(err);
        }
    }

    pub fn add_when<E: fmt::Display>(&self, cond: bool, err: E) {
        if cond {
            self.add(err);
        }
    }

    /// Adds a plain message. Empty messages are ignored.
    pub fn new_error(&self, message: impl Into<String>) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        self.errs.write().push(message);
    }

    pub fn new_when(&self, cond: bool, message: impl Into<String>) {
        if cond {
            self.new_error(message);
        }
    }

    /// Adds a formatted message, usually built with [`format_args!`].
    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.new_error(fmt::format(args));
    }

    pub fn errorf_when(&self, cond: bool, args: fmt::Arguments<'_>) {
        if cond {
            self.errorf(args);
        }
    }

    /// Adds `err` prefixed with `context`.
    pub fn wrap<E: fmt::Display>(&self, err: E, context: &str) {
        self.errs.write().push(format!("{context}: {err}"));
    }

    /// Adds `err` prefixed with a formatted context.
    pub fn wrapf<E: fmt::Display>(&self, err: E, context: fmt::Arguments<'_>) {
        self.errs.write().push(format!("{context}: {err}"));
    }

    /// Adds every error of the sequence, keeping its order.
    pub fn extend<I, E>(&self, errs: I)
    where
        I: IntoIterator<Item = E>,
        E: fmt::Display,
    {
        let rendered: Vec<String> = errs.into_iter().map(|err| err.to_string()).collect();
        if rendered.is_empty() {
            return;
        }
        self.errs.write().extend(rendered);
    }

    /// Adds every present error of the sequence, skipping `None`.
    pub fn extend_opt<I, E>(&self, errs: I)
    where
        I: IntoIterator<Item = Option<E>>,
        E: fmt::Display,
    {
        self.extend(errs.into_iter().flatten());
    }

    pub fn extend_when<I, E>(&self, cond: bool, errs: I)
    where
        I: IntoIterator<Item = E>,
        E: fmt::Display,
    {
        if cond {
            self.extend(errs);
        }
    }

    /// Runs a check and records its failure, if any.
    pub fn check<F, E>(&self, check: F)
    where
        F: FnOnce() -> Result<(), E>,
        E: fmt::Display,
    {
        self.add_opt(check().err());
    }

    pub fn check_when<F, E>(&self, cond: bool, check: F)
    where
        F: FnOnce() -> Result<(), E>,
        E: fmt::Display,
    {
        if cond {
            self.check(check);
        }
    }

    /// Runs every check, none of them short-circuiting the others.
    pub fn check_extend<I, F, E>(&self, checks: I)
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Result<(), E>,
        E: fmt::Display,
    {
        for check in checks {
            self.check(check);
        }
    }

    pub fn len(&self) -> usize {
        self.errs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errs.read().is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.is_empty()
    }

    /// Returns a snapshot of the collected messages.
    pub fn errors(&self) -> Vec<String> {
        self.errs.read().clone()
    }

    /// Returns `Ok(())` when nothing was collected, otherwise one error
    /// holding every message. Does not clear the catcher.
    pub fn resolve(&self) -> Result<(), AggregateError> {
        let errs = self.errs.read();
        if errs.is_empty() {
            return Ok(());
        }
        Err(AggregateError {
            messages: errs.clone(),
        })
    }
}

impl fmt::Display for ErrorCatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.errs.read().join("\n"))
    }
}

/// Combined error produced by [`ErrorCatcher::resolve`].
///
/// Displays as the newline-joined messages in the order they were added.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregateError {
    messages: Vec<String>,
}

impl AggregateError {
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join("\n"))
    }
}

impl std::error::Error for AggregateError {}

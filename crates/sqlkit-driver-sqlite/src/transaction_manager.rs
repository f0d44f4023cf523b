use std::borrow::Cow;

/// SQL generator for SQLite transactions. The outermost transaction uses
/// `BEGIN`; nested ones become savepoints named `sp_{depth}`.
#[derive(Debug, Default)]
pub(crate) struct TransactionManager {
    depth: usize,
}

impl TransactionManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the statement opening the next level and that level's depth.
    pub(crate) fn start(&mut self) -> (Cow<'static, str>, usize) {
        self.depth += 1;
        if self.depth == 1 {
            (Cow::Borrowed("BEGIN"), self.depth)
        } else {
            (Cow::Owned(format!("SAVEPOINT sp_{}", self.depth)), self.depth)
        }
    }

    pub(crate) fn commit(&mut self) -> Cow<'static, str> {
        self.finish(|depth| format!("RELEASE SAVEPOINT sp_{depth}"), "COMMIT")
    }

    pub(crate) fn rollback(&mut self) -> Cow<'static, str> {
        self.finish(
            |depth| format!("ROLLBACK TO SAVEPOINT sp_{depth}; RELEASE SAVEPOINT sp_{depth}"),
            "ROLLBACK",
        )
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    fn finish(&mut self, nested: impl Fn(usize) -> String, outer: &'static str) -> Cow<'static, str> {
        let depth = self.depth;
        self.depth = self.depth.saturating_sub(1);
        if depth > 1 {
            Cow::Owned(nested(depth))
        } else {
            Cow::Borrowed(outer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting() {
        let mut tm = TransactionManager::new();
        assert_eq!(tm.start(), (Cow::Borrowed("BEGIN"), 1));
        assert_eq!(tm.start().0, "SAVEPOINT sp_2");
        assert_eq!(tm.commit(), "RELEASE SAVEPOINT sp_2");
        assert_eq!(tm.rollback(), "ROLLBACK");
        assert_eq!(tm.depth(), 0);
    }
}

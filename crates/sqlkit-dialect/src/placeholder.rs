/// How a dialect spells bind parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The same token for every parameter, e.g. `?`
    Fixed(&'static str),

    /// A prefix followed by the 1-based parameter position, e.g. `$1`, `:1`,
    /// `@p1`
    Numbered(&'static str),
}

impl Placeholder {
    /// Returns a fresh getter starting at the first parameter.
    pub fn getter(self) -> PlaceholderGetter {
        PlaceholderGetter {
            placeholder: self,
            position: 0,
        }
    }

    pub fn is_numbered(self) -> bool {
        matches!(self, Placeholder::Numbered(_))
    }
}

/// Stateful placeholder generator.
///
/// Each call to [`PlaceholderGetter::next_placeholder`] yields the token for
/// the next parameter. Numbered placeholders never repeat.
#[derive(Debug, Clone)]
pub struct PlaceholderGetter {
    placeholder: Placeholder,
    position: usize,
}

impl PlaceholderGetter {
    pub fn next_placeholder(&mut self) -> String {
        self.position += 1;
        match self.placeholder {
            Placeholder::Fixed(token) => token.to_string(),
            Placeholder::Numbered(prefix) => format!("{prefix}{}", self.position),
        }
    }

    /// Number of placeholders handed out so far.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Iterator for PlaceholderGetter {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        Some(self.next_placeholder())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed() {
        let mut getter = Placeholder::Fixed("?").getter();
        assert_eq!(getter.next_placeholder(), "?");
        assert_eq!(getter.next_placeholder(), "?");
        assert_eq!(getter.position(), 2);
    }

    #[test]
    fn numbered_is_monotone() {
        let tokens: Vec<_> = Placeholder::Numbered("$").getter().take(100).collect();
        let unique: std::collections::HashSet<_> = tokens.iter().collect();
        assert_eq!(unique.len(), tokens.len());
        assert_eq!(tokens[0], "$1");
        assert_eq!(tokens[9], "$10");
    }
}

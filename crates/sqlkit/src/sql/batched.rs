use sqlkit_dialect::PlaceholderGetter;

/// A prefix, up to `batch_size` placeholder groups, and a suffix.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Batched {
    /// SQL up to and including the last group of the largest batch
    rendered: String,

    /// End offset of each group in `rendered`
    ends: Vec<usize>,

    suffix: String,
}

impl Batched {
    pub(crate) fn new(
        prefix: &str,
        batch_size: usize,
        separator: &str,
        mut placeholders: PlaceholderGetter,
        mut group: impl FnMut(&mut PlaceholderGetter) -> String,
        suffix: impl Into<String>,
    ) -> Batched {
        let batch_size = batch_size.max(1);
        let mut rendered = String::from(prefix);
        let mut ends = Vec::with_capacity(batch_size);

        for i in 0..batch_size {
            if i > 0 {
                rendered.push_str(separator);
            }
            rendered.push_str(&group(&mut placeholders));
            ends.push(rendered.len());
        }

        Batched {
            rendered,
            ends,
            suffix: suffix.into(),
        }
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.ends.len()
    }

    /// SQL for `size` groups, clamped to `1..=batch_size`.
    pub(crate) fn build(&self, size: usize) -> String {
        let size = size.clamp(1, self.ends.len());
        let end = self.ends[size - 1];

        let mut sql = String::with_capacity(end + self.suffix.len());
        sql.push_str(&self.rendered[..end]);
        sql.push_str(&self.suffix);
        sql
    }
}

/// One placeholder group per row: `(?,?,?)`.
pub(crate) fn values_group(width: usize) -> impl FnMut(&mut PlaceholderGetter) -> String {
    move |placeholders| {
        let mut group = String::from("(");
        for i in 0..width {
            if i > 0 {
                group.push(',');
            }
            group.push_str(&placeholders.next_placeholder());
        }
        group.push(')');
        group
    }
}

use crate::list::ListItem;

/// Indices of `items` whose filter fields contain `query`, ignoring case.
pub fn apply_filter<T: ListItem>(items: &[T], query: &str) -> Vec<usize> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return (0..items.len()).collect();
    }

    items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            item.filter_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .map(|(index, _)| index)
        .collect()
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FilterState {
    active: bool,
    query: String,
    matched: Vec<usize>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommittedFilter {
    pub query: String,
    pub matched: Vec<usize>,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matched(&self) -> &[usize] {
        &self.matched
    }

    /// Enters filter mode over the full, unfiltered item set.
    pub fn open<T: ListItem>(&mut self, items: &[T]) {
        self.active = true;
        self.query.clear();
        self.matched = apply_filter(items, "");
    }

    pub fn push<T: ListItem>(&mut self, c: char, items: &[T]) {
        if !self.active {
            return;
        }
        self.query.push(c);
        self.matched = apply_filter(items, &self.query);
    }

    pub fn pop<T: ListItem>(&mut self, items: &[T]) {
        if !self.active {
            return;
        }
        self.query.pop();
        self.matched = apply_filter(items, &self.query);
    }

    pub fn cancel(&mut self, len: usize) {
        self.reset(len);
    }

    pub fn commit(&mut self, len: usize) -> CommittedFilter {
        let committed = CommittedFilter {
            query: self.query.trim().to_string(),
            matched: std::mem::take(&mut self.matched),
        };
        self.reset(len);
        committed
    }

    pub fn reset(&mut self, len: usize) {
        self.active = false;
        self.query.clear();
        self.matched = (0..len).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterState, apply_filter};
    use crate::model::{ResourceKind, sample_row};

    fn rows() -> Vec<crate::model::ResourceRow> {
        vec![
            sample_row(ResourceKind::Pods, "default", "api-0", "Running"),
            sample_row(ResourceKind::Pods, "default", "worker-0", "Pending"),
            sample_row(ResourceKind::Pods, "payments", "api-1", "Running"),
            sample_row(ResourceKind::Pods, "kube-system", "dns", "CrashLoopBackOff"),
        ]
    }

    #[test]
    fn empty_query_matches_everything_in_order() {
        assert_eq!(apply_filter(&rows(), ""), vec![0, 1, 2, 3]);
        assert_eq!(apply_filter(&rows(), "   "), vec![0, 1, 2, 3]);
    }

    #[test]
    fn matching_is_case_insensitive_across_fields() {
        assert_eq!(apply_filter(&rows(), "API"), vec![0, 2]);
        assert_eq!(apply_filter(&rows(), "payments"), vec![2]);
        assert_eq!(apply_filter(&rows(), "crashloop"), vec![3]);
        assert!(apply_filter(&rows(), "nothing-here").is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let items = rows();
        let first = apply_filter(&items, "run");
        let second = apply_filter(&items, "run");
        assert_eq!(first, second);
    }

    #[test]
    fn keystrokes_recompute_matches() {
        let items = rows();
        let mut filter = FilterState::default();
        filter.open(&items);
        assert!(filter.is_active());
        assert_eq!(filter.matched(), &[0, 1, 2, 3]);

        filter.push('w', &items);
        filter.push('o', &items);
        assert_eq!(filter.query(), "wo");
        assert_eq!(filter.matched(), &[1]);

        filter.pop(&items);
        assert_eq!(filter.matched(), &[1]);
        filter.pop(&items);
        assert_eq!(filter.matched(), &[0, 1, 2, 3]);
    }

    #[test]
    fn cancel_restores_identity() {
        let items = rows();
        let mut filter = FilterState::default();
        filter.open(&items);
        filter.push('d', &items);
        filter.push('n', &items);
        filter.cancel(items.len());

        assert!(!filter.is_active());
        assert_eq!(filter.query(), "");
        assert_eq!(filter.matched(), &[0, 1, 2, 3]);
    }

    #[test]
    fn commit_hands_back_matches_and_resets() {
        let items = rows();
        let mut filter = FilterState::default();
        filter.open(&items);
        for c in "api".chars() {
            filter.push(c, &items);
        }

        let committed = filter.commit(items.len());
        assert_eq!(committed.query, "api");
        assert_eq!(committed.matched, vec![0, 2]);
        assert!(!filter.is_active());
        assert_eq!(filter.matched(), &[0, 1, 2, 3]);
    }

    #[test]
    fn input_is_ignored_when_inactive() {
        let items = rows();
        let mut filter = FilterState::default();
        filter.push('x', &items);
        assert_eq!(filter.query(), "");
    }
}

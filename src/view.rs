use crate::addon::{Addon, HealthStatus};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Enabled,
    Disabled,
    Errors,
}

impl StatusFilter {
    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Enabled => "Enabled",
            StatusFilter::Disabled => "Disabled",
            StatusFilter::Errors => "Errors",
        }
    }

    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Enabled,
            StatusFilter::Enabled => StatusFilter::Disabled,
            StatusFilter::Disabled => StatusFilter::Errors,
            StatusFilter::Errors => StatusFilter::All,
        }
    }

    fn matches(self, addon: &Addon) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Enabled => addon.is_enabled,
            StatusFilter::Disabled => !addon.is_enabled,
            StatusFilter::Errors => addon.status == HealthStatus::Error,
        }
    }
}

/// Indices into the full list that survive the active status filter and
/// the (already debounced) search query. Recomputed on every read; never
/// a second mutable copy of the list.
pub fn visible_indices(addons: &[Addon], filter: StatusFilter, query: &str) -> Vec<usize> {
    let query = query.trim().to_lowercase();
    addons
        .iter()
        .enumerate()
        .filter(|(_, addon)| filter.matches(addon))
        .filter(|(_, addon)| {
            query.is_empty() || addon.manifest.name.to_lowercase().contains(&query)
        })
        .map(|(index, _)| index)
        .collect()
}

/// Moves the entry at visible position `from` to visible position `to`,
/// then maps the reordered visible subset back onto the full list:
/// hidden entries keep their positions, visible slots are refilled in
/// the new visible order. Returns whether the full-list order actually
/// changed; an unchanged result must not dirty anything upstream.
pub fn reorder_visible(
    addons: &mut Vec<Addon>,
    filter: StatusFilter,
    query: &str,
    from: usize,
    to: usize,
) -> bool {
    let visible = visible_indices(addons, filter, query);
    if from >= visible.len() || to >= visible.len() {
        return false;
    }

    let mut order = visible.clone();
    let moved = order.remove(from);
    order.insert(to, moved);

    apply_visible_order(addons, &visible, &order)
}

/// Write-back used by both single moves and move-to-top/bottom: walk the
/// full list, substituting each visible slot with the next source index
/// from the reordered visible sequence.
fn apply_visible_order(addons: &mut Vec<Addon>, visible: &[usize], order: &[usize]) -> bool {
    if visible.len() != order.len() {
        return false;
    }
    let visible_set: HashSet<usize> = visible.iter().copied().collect();

    let mut cursor = 0;
    let mut new_list: Vec<Addon> = Vec::with_capacity(addons.len());
    for (index, addon) in addons.iter().enumerate() {
        if visible_set.contains(&index) {
            new_list.push(addons[order[cursor]].clone());
            cursor += 1;
        } else {
            new_list.push(addon.clone());
        }
    }

    let unchanged = addons
        .iter()
        .zip(new_list.iter())
        .all(|(before, after)| before.transport_url == after.transport_url);
    if unchanged {
        return false;
    }

    *addons = new_list;
    true
}

pub struct ListCounts {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub errors: usize,
    pub selected: usize,
}

pub fn counts(addons: &[Addon]) -> ListCounts {
    ListCounts {
        total: addons.len(),
        enabled: addons.iter().filter(|a| a.is_enabled).count(),
        disabled: addons.iter().filter(|a| !a.is_enabled).count(),
        errors: addons
            .iter()
            .filter(|a| a.status == HealthStatus::Error)
            .count(),
        selected: addons.iter().filter(|a| a.selected).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::Manifest;

    fn addon(name: &str, enabled: bool) -> Addon {
        let mut manifest = Manifest::default();
        manifest.name = name.to_string();
        let mut addon = Addon::new(format!("https://{name}.example/manifest.json"), manifest);
        addon.is_enabled = enabled;
        addon
    }

    fn names(list: &[Addon]) -> Vec<&str> {
        list.iter().map(|a| a.manifest.name.as_str()).collect()
    }

    #[test]
    fn filter_and_search_compose() {
        let list = vec![
            addon("alpha", true),
            addon("beta", false),
            addon("alphabet", true),
        ];
        assert_eq!(
            visible_indices(&list, StatusFilter::Enabled, ""),
            vec![0, 2]
        );
        assert_eq!(
            visible_indices(&list, StatusFilter::Enabled, "ALPHA"),
            vec![0, 2]
        );
        assert_eq!(
            visible_indices(&list, StatusFilter::All, "bet"),
            vec![1, 2]
        );
        assert_eq!(visible_indices(&list, StatusFilter::Errors, ""), Vec::<usize>::new());
    }

    #[test]
    fn reorder_preserves_hidden_positions() {
        // Full list [A(on), B(off), C(on)], enabled filter shows [A, C];
        // dragging to [C, A] must yield [C, B, A].
        let mut list = vec![addon("A", true), addon("B", false), addon("C", true)];
        let changed = reorder_visible(&mut list, StatusFilter::Enabled, "", 0, 1);
        assert!(changed);
        assert_eq!(names(&list), vec!["C", "B", "A"]);
    }

    #[test]
    fn noop_reorder_reports_unchanged() {
        let mut list = vec![addon("A", true), addon("B", false), addon("C", true)];
        let before = names(&list)
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        assert!(!reorder_visible(&mut list, StatusFilter::Enabled, "", 1, 1));
        assert_eq!(names(&list), before);
    }

    #[test]
    fn reorder_out_of_range_is_rejected() {
        let mut list = vec![addon("A", true), addon("B", true)];
        assert!(!reorder_visible(&mut list, StatusFilter::Enabled, "", 0, 5));
        assert_eq!(names(&list), vec!["A", "B"]);
    }

    #[test]
    fn reorder_respects_search_scope() {
        let mut list = vec![
            addon("red-one", true),
            addon("blue", true),
            addon("red-two", true),
        ];
        // Search "red" shows [red-one, red-two]; swapping them leaves
        // blue in the middle.
        assert!(reorder_visible(&mut list, StatusFilter::All, "red", 0, 1));
        assert_eq!(names(&list), vec!["red-two", "blue", "red-one"]);
    }
}

use crate::tree::node::NodeData;

/// Merge a parent's previously-loaded children with a freshly fetched
/// listing, producing the new authoritative children sequence.
///
/// Every fresh slot whose `uri` matches a previous entry keeps the previous
/// entry, so an already-expanded subtree survives the refresh. Previous
/// entries the fresh listing no longer reports are kept only while their
/// backing resource still exists; this self-heals resources deleted while
/// the backing service was unavailable or lagging.
///
/// `fresh` is `None` when the fetch failed; the previous children are then
/// served, pruned by the same existence rule. An empty `fresh` listing is a
/// legitimate empty container and replaces everything not re-matched.
pub fn reconcile_children(
    previous: Option<Vec<NodeData>>,
    fresh: Option<Vec<NodeData>>,
    resource_exists: impl Fn(&str) -> bool,
) -> Option<Vec<NodeData>> {
    let Some(previous) = previous else {
        // first load
        return fresh;
    };
    match fresh {
        Some(fresh_list) => {
            let mut result = fresh_list;
            for prev in previous {
                let matched = prev
                    .uri
                    .as_ref()
                    .and_then(|uri| result.iter().position(|f| f.uri.as_ref() == Some(uri)));
                match matched {
                    Some(slot) => result[slot] = prev,
                    None => {
                        if still_exists(&prev, &resource_exists) {
                            result.push(prev);
                        }
                    }
                }
            }
            Some(result)
        }
        None => Some(
            previous
                .into_iter()
                .filter(|prev| still_exists(prev, &resource_exists))
                .collect(),
        ),
    }
}

fn still_exists(data: &NodeData, resource_exists: &impl Fn(&str) -> bool) -> bool {
    data.uri.as_deref().is_some_and(resource_exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::NodeKind;

    fn entry(name: &str, uri: &str) -> NodeData {
        let mut data = NodeData::new(name, NodeKind::Package);
        data.uri = Some(uri.into());
        data
    }

    fn loaded_entry(name: &str, uri: &str, child: &str) -> NodeData {
        let mut data = entry(name, uri);
        data.children = Some(vec![NodeData::new(child, NodeKind::PrimaryType)]);
        data
    }

    #[test]
    fn first_load_takes_fresh_verbatim() {
        let fresh = vec![entry("a", "u1"), entry("b", "u2")];
        let merged = reconcile_children(None, Some(fresh.clone()), |_| true);
        assert_eq!(merged, Some(fresh));
    }

    #[test]
    fn first_load_failure_stays_unloaded() {
        assert_eq!(reconcile_children(None, None, |_| true), None);
    }

    #[test]
    fn matching_uri_keeps_previous_entry() {
        let previous = vec![loaded_entry("a", "u1", "Inner")];
        let fresh = vec![entry("a", "u1")];
        let merged = reconcile_children(Some(previous), Some(fresh), |_| true).unwrap();
        assert_eq!(merged.len(), 1);
        // the previous entry won the slot, loaded subtree intact
        assert!(merged[0].children.is_some());
        assert_eq!(merged[0].children.as_ref().unwrap()[0].name, "Inner");
    }

    #[test]
    fn newly_discovered_entries_pass_through() {
        let previous = vec![loaded_entry("a", "u1", "Inner")];
        let fresh = vec![entry("a", "u1"), entry("b", "u2")];
        let merged = reconcile_children(Some(previous), Some(fresh), |_| true).unwrap();
        assert_eq!(merged.len(), 2);
        assert!(merged[0].children.is_some());
        assert_eq!(merged[1].name, "b");
        assert!(merged[1].children.is_none());
    }

    #[test]
    fn unreported_entry_kept_while_resource_exists() {
        let previous = vec![entry("a", "u1"), entry("b", "u2")];
        let fresh = vec![entry("a", "u1")];
        let merged = reconcile_children(Some(previous), Some(fresh), |uri| uri == "u2").unwrap();
        let names: Vec<&str> = merged.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn unreported_entry_dropped_when_resource_gone() {
        let previous = vec![entry("a", "u1"), entry("b", "u2")];
        let fresh = vec![entry("a", "u1")];
        let merged = reconcile_children(Some(previous), Some(fresh), |uri| uri != "u2").unwrap();
        let names: Vec<&str> = merged.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn failed_fetch_serves_pruned_previous() {
        let previous = vec![
            loaded_entry("a", "u1", "Inner"),
            entry("b", "u2"),
            entry("c", "u3"),
        ];
        let merged = reconcile_children(Some(previous), None, |uri| uri != "u2").unwrap();
        let names: Vec<&str> = merged.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(merged[0].children.is_some());
    }

    #[test]
    fn entries_without_uri_never_match() {
        let previous = vec![NodeData::new("synthetic", NodeKind::Container)];
        let fresh = vec![NodeData::new("synthetic", NodeKind::Container)];
        let merged = reconcile_children(Some(previous), Some(fresh), |_| true).unwrap();
        // the fresh synthetic entry wins; the uri-less previous one cannot be
        // existence-checked and is dropped rather than duplicated
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn empty_fresh_listing_is_authoritative() {
        let previous = vec![entry("a", "u1")];
        let merged = reconcile_children(Some(previous), Some(Vec::new()), |_| false).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let previous = vec![loaded_entry("a", "u1", "Inner"), entry("b", "u2")];
        let fresh = vec![entry("a", "u1"), entry("b", "u2"), entry("c", "u3")];
        let once = reconcile_children(Some(previous), Some(fresh), |_| true).unwrap();
        let twice =
            reconcile_children(Some(once.clone()), Some(once.clone()), |_| true).unwrap();
        assert_eq!(once, twice);
    }
}

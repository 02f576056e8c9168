mod common;

use std::collections::HashSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use strategic_map::engine::filter::{HISTORY_RELATION, ViewRole, filter_view};
use strategic_map::map::MapError;

use common::{abcd, arb_map, arb_map_with_pair};

fn ids(view: &strategic_map::engine::filter::ViewGraph) -> Vec<&str> {
    view.nodes().iter().map(|node| node.node.id.as_str()).collect()
}

#[test]
fn focus_on_root_shows_direct_neighbours() {
    let view = filter_view(&abcd(), "A", None).expect("A exists");
    assert_eq!(ids(&view), vec!["A", "B", "C"]);
    assert_eq!(view.links().len(), 2);
    assert_eq!(view.history_link(), None);
}

#[test]
fn pivot_keeps_previous_focus_as_inner_neighbour() {
    let view = filter_view(&abcd(), "C", Some("A")).expect("C exists");
    assert_eq!(ids(&view), vec!["A", "C", "D"]);
    assert_eq!(view.role_of("A"), Some(ViewRole::Inner));
    assert_eq!(view.role_of("C"), Some(ViewRole::Center));
    assert!(!view.contains("B"));
    // A and C are linked already, so no breadcrumb link is added.
    assert_eq!(view.history_link(), None);
    assert_eq!(view.links().len(), 2);
}

#[test]
fn unlinked_previous_focus_gets_a_breadcrumb() {
    let view = filter_view(&abcd(), "D", Some("A")).expect("D exists");
    assert_eq!(ids(&view), vec!["A", "C", "D"]);
    assert_eq!(view.role_of("A"), Some(ViewRole::History));

    let breadcrumb = view.history_link().expect("breadcrumb link");
    assert_eq!(
        (breadcrumb.source.as_str(), breadcrumb.target.as_str()),
        ("A", "D")
    );
    assert_eq!(breadcrumb.relation, HISTORY_RELATION);
    assert_eq!(view.links().last(), Some(breadcrumb));
}

#[test]
fn unknown_focus_is_an_error() {
    assert!(matches!(
        filter_view(&abcd(), "Z", None),
        Err(MapError::UnknownFocus { .. })
    ));
}

proptest! {
    #[test]
    fn view_is_exactly_the_radius_one_neighbourhood((graph, focus, previous) in arb_map_with_pair(12)) {
        let view = filter_view(&graph, &focus, Some(&previous)).expect("focus exists");
        let neighbours = graph.neighbors(&focus).into_iter().collect::<HashSet<_>>();

        prop_assert_eq!(view.focus(), focus.as_str());
        prop_assert_eq!(view.role_of(&focus), Some(ViewRole::Center));
        for neighbour in &neighbours {
            prop_assert!(view.contains(neighbour));
        }
        for view_node in view.nodes() {
            let id = view_node.node.id.as_str();
            prop_assert!(
                id == focus || neighbours.contains(id) || id == previous,
                "{} is neither focus, neighbour nor previous focus", id
            );
        }
    }

    #[test]
    fn every_link_between_visible_nodes_is_shown((graph, focus, _) in arb_map_with_pair(12)) {
        let view = filter_view(&graph, &focus, None).expect("focus exists");
        let expected = graph
            .links
            .iter()
            .filter(|link| view.contains(&link.source) && view.contains(&link.target))
            .collect::<Vec<_>>();
        let shown = view.links().iter().collect::<Vec<_>>();
        prop_assert_eq!(shown, expected);
    }

    #[test]
    fn previous_focus_is_always_connected_to_the_focus((graph, focus, previous) in arb_map_with_pair(12)) {
        prop_assume!(focus != previous);
        let view = filter_view(&graph, &focus, Some(&previous)).expect("focus exists");

        prop_assert!(view.contains(&previous));
        let joining = view
            .links()
            .iter()
            .filter(|link| link.connects(&focus, &previous))
            .count();
        prop_assert!(joining >= 1);

        let synthetic = view.links().iter().filter(|link| link.is_history_pointer).count();
        if graph.has_link_between(&focus, &previous) {
            prop_assert_eq!(synthetic, 0);
        } else {
            prop_assert_eq!(synthetic, 1);
            prop_assert_eq!(view.role_of(&previous), Some(ViewRole::History));
        }
    }

    #[test]
    fn filtering_is_deterministic((graph, focus, previous) in arb_map_with_pair(12)) {
        let first = filter_view(&graph, &focus, Some(&previous)).expect("focus exists");
        let second = filter_view(&graph, &focus, Some(&previous)).expect("focus exists");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn filtering_never_changes_the_map(graph in arb_map(10)) {
        let before = graph.clone();
        for node in &graph.nodes {
            let _ = filter_view(&graph, &node.id, graph.nodes.first().map(|node| node.id.as_str()));
        }
        prop_assert_eq!(graph, before);
    }
}

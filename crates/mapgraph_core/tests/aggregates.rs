use mapgraph_core::{
    bounding_extent, collect_points, graph_extent, BoundsMode, DataGraph, GraphError, LatLon,
    Member, Point, PointId, PrimitiveRef, Relation, Segment, SegmentId, Way, WayId,
};
use std::collections::BTreeSet;

fn sample() -> (DataGraph, [PointId; 3], [SegmentId; 2], WayId) {
    let mut graph = DataGraph::new();
    let a = graph.add_point(Point::new(LatLon::new(10.0, 20.0))).unwrap();
    let b = graph.add_point(Point::new(LatLon::new(11.0, 21.0))).unwrap();
    let c = graph.add_point(Point::new(LatLon::new(9.0, 22.0))).unwrap();
    let s1 = graph.add_segment(Segment::new(a, b)).unwrap();
    let s2 = graph.add_segment(Segment::new(b, c)).unwrap();
    let w = graph.add_way(Way::new(vec![s1, s2])).unwrap();
    (graph, [a, b, c], [s1, s2], w)
}

#[test]
fn collect_points_follows_segments_and_ways() {
    let (graph, [a, b, c], [s1, _], w) = sample();

    let from_point = collect_points(&graph, a.into()).unwrap();
    assert_eq!(from_point, BTreeSet::from([a]));

    let from_segment = collect_points(&graph, s1.into()).unwrap();
    assert_eq!(from_segment, BTreeSet::from([a, b]));

    let from_way = collect_points(&graph, w.into()).unwrap();
    assert_eq!(from_way, BTreeSet::from([a, b, c]));
}

#[test]
fn relations_contribute_nothing() {
    let (mut graph, [a, _, _], _, w) = sample();
    let relation = graph
        .add_relation(Relation::new(vec![Member::new(w, ""), Member::new(a, "")]))
        .unwrap();

    assert!(collect_points(&graph, relation.into()).unwrap().is_empty());
    assert_eq!(
        bounding_extent(&graph, &[relation.into()], BoundsMode::Geographic).unwrap(),
        None
    );
}

#[test]
fn geographic_extent_uses_lon_as_x() {
    let (graph, _, _, w) = sample();
    let extent = bounding_extent(&graph, &[w.into()], BoundsMode::Geographic)
        .unwrap()
        .unwrap();
    assert_eq!(extent.min_x, 20.0);
    assert_eq!(extent.max_x, 22.0);
    assert_eq!(extent.min_y, 9.0);
    assert_eq!(extent.max_y, 11.0);
}

#[test]
fn projected_extent_is_mercator() {
    let mut graph = DataGraph::new();
    let origin = graph.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();
    let east = graph.add_point(Point::new(LatLon::new(0.0, 90.0))).unwrap();

    let extent = bounding_extent(
        &graph,
        &[origin.into(), east.into()],
        BoundsMode::Projected,
    )
    .unwrap()
    .unwrap();
    assert!(extent.min_x.abs() < 1e-12);
    assert!((extent.max_x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    assert!(extent.height().abs() < 1e-12);
}

#[test]
fn deleted_points_are_skipped() {
    let (mut graph, [_, _, c], _, w) = sample();
    graph.point_mut(c).unwrap().state.soft_delete();

    let points = collect_points(&graph, w.into()).unwrap();
    assert!(!points.contains(&c));
    let extent = bounding_extent(&graph, &[w.into()], BoundsMode::Geographic)
        .unwrap()
        .unwrap();
    assert_eq!(extent.max_x, 21.0);
}

#[test]
fn deleted_way_yields_no_points() {
    let (mut graph, _, _, w) = sample();
    graph.way_mut(w).unwrap().state.soft_delete();
    assert!(collect_points(&graph, w.into()).unwrap().is_empty());
}

#[test]
fn whole_graph_extent_and_empty_graph() {
    let (mut graph, _, _, _) = sample();
    graph
        .add_point(Point::new(LatLon::new(-5.0, -5.0)))
        .unwrap();

    let extent = graph_extent(&graph, BoundsMode::Geographic).unwrap().unwrap();
    assert_eq!(extent.min_x, -5.0);
    assert_eq!(extent.max_x, 22.0);

    assert_eq!(
        graph_extent(&DataGraph::new(), BoundsMode::Geographic).unwrap(),
        None
    );
}

#[test]
fn unknown_root_is_not_found() {
    let (graph, _, _, _) = sample();
    let (mut other, _, _, _) = sample();
    let extra = other.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();

    let err = collect_points(&graph, extra.into()).unwrap_err();
    assert_eq!(err, GraphError::NotFound(PrimitiveRef::Point(extra)));
}

#[test]
fn multi_root_extent_is_union_of_single_roots() {
    let (mut graph, _, _, w) = sample();
    let p = graph.add_point(Point::new(LatLon::new(-3.0, 30.0))).unwrap();
    let q = graph.add_point(Point::new(LatLon::new(-4.0, 31.0))).unwrap();
    let edge = graph.add_segment(Segment::new(p, q)).unwrap();

    let both = bounding_extent(&graph, &[w.into(), edge.into()], BoundsMode::Geographic)
        .unwrap()
        .unwrap();
    let road = bounding_extent(&graph, &[w.into()], BoundsMode::Geographic)
        .unwrap()
        .unwrap();
    let spur = bounding_extent(&graph, &[edge.into()], BoundsMode::Geographic)
        .unwrap()
        .unwrap();

    assert_eq!(both, road.union(&spur));
    assert_eq!(both.min_y, -4.0);
    assert_eq!(both.max_x, 31.0);
}

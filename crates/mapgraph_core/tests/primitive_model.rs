use mapgraph_core::{
    DataGraph, GraphError, LatLon, Member, Point, Primitive, PrimitiveKind, PrimitiveState,
    PrimitiveValidationError, Relation, Segment, Way,
};
use serde_json::json;

#[test]
fn point_serializes_with_flattened_state() {
    let mut point = Point::with_id(42, LatLon::new(10.5, -3.25));
    point.state.put_tag("name", "Well").unwrap();
    let value = serde_json::to_value(&point).unwrap();

    assert_eq!(value["id"], json!(42));
    assert_eq!(value["tags"]["name"], json!("Well"));
    assert_eq!(value["coor"]["lat"], json!(10.5));
    assert_eq!(value["coor"]["lon"], json!(-3.25));
    assert_eq!(value["deleted"], json!(false));
    assert_eq!(value["incomplete"], json!(false));
}

#[test]
fn primitive_serializes_with_variant_tag() {
    let mut graph = DataGraph::new();
    let a = graph.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();
    let b = graph.add_point(Point::new(LatLon::new(0.0, 1.0))).unwrap();
    let s = graph.add_segment(Segment::new(a, b)).unwrap();

    let value = serde_json::to_value(graph.cloned(s.into()).unwrap()).unwrap();
    assert_eq!(value["type"], json!("segment"));
    assert_eq!(value["from"], json!(0));
    assert_eq!(value["to"], json!(1));

    let member = serde_json::to_value(Member::new(s, "edge")).unwrap();
    assert_eq!(member["target"], json!({"kind": "segment", "index": 0}));
    assert_eq!(member["role"], json!("edge"));
}

#[test]
fn way_round_trips_through_json() {
    let mut graph = DataGraph::new();
    let a = graph.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();
    let b = graph.add_point(Point::new(LatLon::new(0.0, 1.0))).unwrap();
    let s = graph.add_segment(Segment::new(a, b)).unwrap();
    let mut way = Way::new(vec![s]);
    way.state.id = 5;
    way.state.put_tag("highway", "path").unwrap();
    let w = graph.add_way(way).unwrap();

    let original = graph.cloned(w.into()).unwrap();
    let text = serde_json::to_string(&original).unwrap();
    let decoded: Primitive = serde_json::from_str(&text).unwrap();
    assert_eq!(decoded, original);
    assert_eq!(decoded.kind(), PrimitiveKind::Way);
}

#[test]
fn tag_keys_are_validated() {
    let mut state = PrimitiveState::default();
    assert_eq!(
        state.put_tag("", "x").unwrap_err(),
        PrimitiveValidationError::EmptyTagKey
    );
    assert_eq!(
        state.put_tag("bad key", "x").unwrap_err(),
        PrimitiveValidationError::InvalidTagKey("bad key".to_string())
    );
    assert!(state.put_tag("addr:street", "Main").is_ok());
    assert_eq!(state.tag("addr:street"), Some("Main"));
}

#[test]
fn removing_last_tag_clears_the_map() {
    let mut state = PrimitiveState::default();
    state.put_tag("k", "v").unwrap();
    assert_eq!(state.remove_tag("k"), Some("v".to_string()));
    assert_eq!(state.tags, None);
}

#[test]
fn graph_rejects_invalid_primitives() {
    let mut graph = DataGraph::new();
    let err = graph
        .add_point(Point::new(LatLon::new(95.0, 0.0)))
        .unwrap_err();
    assert_eq!(
        err,
        GraphError::Validation(PrimitiveValidationError::InvalidCoordinate {
            lat: 95.0,
            lon: 0.0
        })
    );

    let err = graph.add_point(Point::incomplete(0)).unwrap_err();
    assert_eq!(
        err,
        GraphError::Validation(PrimitiveValidationError::IncompleteWithoutId)
    );
    assert!(graph.is_empty());
}

#[test]
fn incomplete_point_skips_coordinate_check() {
    let mut graph = DataGraph::new();
    let stub = graph.add_point(Point::incomplete(8)).unwrap();
    let state = graph.state(stub.into()).unwrap();
    assert!(state.incomplete);
    assert!(!state.is_usable());
    assert!(state.is_active());
}

#[test]
fn relation_requires_members_in_graph() {
    let mut graph = DataGraph::new();
    let mut other = DataGraph::new();
    other.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();
    let foreign = other.add_point(Point::new(LatLon::new(1.0, 1.0))).unwrap();

    let err = graph
        .add_relation(Relation::new(vec![Member::new(foreign, "")]))
        .unwrap_err();
    assert_eq!(err, GraphError::UnknownReference(foreign.into()));
}

#[test]
fn counts_track_each_variant() {
    let mut graph = DataGraph::new();
    let a = graph.add_point(Point::new(LatLon::new(0.0, 0.0))).unwrap();
    let b = graph.add_point(Point::new(LatLon::new(0.0, 1.0))).unwrap();
    let s = graph.add_segment(Segment::new(a, b)).unwrap();
    graph.add_way(Way::new(vec![s])).unwrap();

    assert_eq!(graph.count(PrimitiveKind::Point), 2);
    assert_eq!(graph.count(PrimitiveKind::Segment), 1);
    assert_eq!(graph.count(PrimitiveKind::Way), 1);
    assert_eq!(graph.count(PrimitiveKind::Relation), 0);
    assert_eq!(graph.len(), 4);
}

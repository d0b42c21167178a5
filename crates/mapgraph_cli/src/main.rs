//! CLI demo entry point.
//!
//! # Responsibility
//! - Verify `mapgraph_core` linkage.
//! - Run one local/incoming merge and print its outcome deterministically.
//!
//! Usage: `mapgraph_cli [absolute-log-dir]`

use log::info;
use mapgraph_core::{
    graph_extent, init_logging, merge_graph, references_of, BoundsMode, DataGraph, GraphResult,
    LatLon, LoggingConfig, MergeOptions, Point, PointId, Segment, Way,
};

fn local_graph() -> GraphResult<(DataGraph, PointId)> {
    let mut graph = DataGraph::new();
    let a = graph.add_point(Point::with_id(1, LatLon::new(10.0, 20.0)))?;
    let b = graph.add_point(Point::with_id(2, LatLon::new(10.0, 20.001)))?;
    let mut segment = Segment::new(a, b);
    segment.state.id = 3;
    let s = graph.add_segment(segment)?;
    let mut way = Way::new(vec![s]);
    way.state.id = 4;
    way.state.put_tag("highway", "residential")?;
    graph.add_way(way)?;
    Ok((graph, a))
}

fn incoming_graph() -> GraphResult<DataGraph> {
    let mut graph = DataGraph::new();
    let a = graph.add_point(Point::with_id(1, LatLon::new(10.0, 20.0)))?;
    let c = graph.add_point(Point::new(LatLon::new(10.001, 20.0)))?;
    let mut segment = Segment::new(a, c);
    segment.state.modified = true;
    let s = graph.add_segment(segment)?;
    let mut way = Way::new(vec![s]);
    way.state.modified = true;
    way.state.put_tag("highway", "service")?;
    graph.add_way(way)?;
    Ok(graph)
}

fn run() -> GraphResult<()> {
    let (mut local, shared) = local_graph()?;
    let incoming = incoming_graph()?;

    let report = merge_graph(&mut local, &incoming, MergeOptions::default())?;
    println!(
        "merge inserted={} merged={} conflicts={}",
        report.inserted,
        report.merged,
        report.conflicts.len()
    );

    let referrers = references_of(&local, shared.into())?;
    let listed = referrers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    println!("backrefs {}=[{}]", shared, listed);

    match graph_extent(&local, BoundsMode::Geographic)? {
        Some(extent) => println!(
            "extent lon=[{:.4},{:.4}] lat=[{:.4},{:.4}]",
            extent.min_x, extent.max_x, extent.min_y, extent.max_y
        ),
        None => println!("extent empty"),
    }
    info!(
        "event=cli_demo module=cli status=ok primitives={}",
        local.len()
    );
    Ok(())
}

fn main() {
    println!("mapgraph_core ping={}", mapgraph_core::ping());
    println!("mapgraph_core version={}", mapgraph_core::core_version());

    if let Some(log_dir) = std::env::args().nth(1) {
        if let Err(err) = init_logging(&LoggingConfig::in_dir(log_dir)) {
            eprintln!("logging disabled: {err}");
        }
    }

    if let Err(err) = run() {
        eprintln!("demo failed: {err}");
        std::process::exit(1);
    }
}

use std::collections::BTreeMap;
use std::env;
use std::fs;

use trip_patterns::feed::Feed;
use trip_patterns::label::BasicLabelCleaner;
use trip_patterns::output::write_classified_trips;
use trip_patterns::pipeline::{classify_feed, summarize_directions};
use trip_patterns::report::RunReport;
use trip_patterns::{
    ClassifiedTrip, DirectionId, PatternConfig, PatternRegistry, Resolution, RouteId, StopId,
    compare_order,
};

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn load() -> (Feed, PatternRegistry) {
    let feed = Feed::load(FIXTURES).expect("Failed to load feed");
    let config =
        PatternConfig::load(format!("{FIXTURES}/patterns.json")).expect("Failed to load patterns");
    let registry =
        PatternRegistry::compile_with_stops(&config, &feed.stops).expect("Patterns should compile");
    (feed, registry)
}

fn by_trip(classified: &[ClassifiedTrip]) -> BTreeMap<&str, &ClassifiedTrip> {
    classified.iter().map(|c| (c.trip_id().as_str(), c)).collect()
}

#[test]
fn test_full_pipeline() {
    let (feed, registry) = load();
    assert_eq!(feed.trips.len(), 14);
    assert_eq!(registry.len(), 5);

    let classified = classify_feed(&registry, &feed.trips, &BasicLabelCleaner).unwrap();
    let trips = by_trip(&classified);

    let expect = [
        ("t101", DirectionId::Outbound, Resolution::Score, "Douglas"),
        ("t102", DirectionId::Inbound, Resolution::Score, "Downtown Transit Center"),
        ("t301", DirectionId::Outbound, Resolution::Score, "Mendenhall Valley"),
        ("t302", DirectionId::Inbound, Resolution::Score, "Downtown Transit Center"),
        ("t303", DirectionId::Inbound, Resolution::SharedStopContext, "Downtown Transit Center"),
        ("t304", DirectionId::Inbound, Resolution::FeedDirection, "Downtown Transit Center"),
        ("t401", DirectionId::Outbound, Resolution::Score, "Mendenhall Valley"),
        ("t402", DirectionId::Inbound, Resolution::Score, "Downtown Transit Center"),
        ("t501", DirectionId::Outbound, Resolution::Score, "University"),
        ("t502", DirectionId::Inbound, Resolution::Score, "Downtown"),
        ("t701", DirectionId::Inbound, Resolution::Score, "Downtown Juneau"),
        ("t702", DirectionId::Outbound, Resolution::Complement, "Fred Meyer"),
        ("t1101", DirectionId::Outbound, Resolution::Unpatterned, "Auke Bay"),
        ("t1102", DirectionId::Inbound, Resolution::Unpatterned, "Fritz Cove"),
    ];
    for (trip, direction, resolution, headsign) in expect {
        let c = trips[trip];
        assert_eq!(c.direction_id, direction, "{trip}");
        assert_eq!(c.resolution, resolution, "{trip}");
        assert_eq!(c.headsign, headsign, "{trip}");
    }

    // Scrambled stop_times rows still give the canonical order a full score.
    // Shared-ambiguous stops 811688 and 811691 never count.
    assert_eq!(trips["t301"].scores.ordered(DirectionId::Outbound), 5);
    assert_eq!(trips["t301"].scores.ordered(DirectionId::Inbound), 1);
    assert_eq!(trips["t302"].scores.ordered(DirectionId::Inbound), 6);
}

#[test]
fn test_shared_stop_context_overrides_feed_direction() {
    let (feed, registry) = load();
    let classified = classify_feed(&registry, &feed.trips, &BasicLabelCleaner).unwrap();
    let t303 = by_trip(&classified)["t303"];

    // 811692 only counts outbound, 839422 only inbound: a tie
    assert_eq!(t303.scores.ordered, [1, 1]);
    // 839422 next to shared 811688 is divergent inbound only, which beats direction_id 0
    assert_eq!(t303.trip.direction_id, Some(DirectionId::Outbound));
    assert_eq!(t303.direction_id, DirectionId::Inbound);
    assert_eq!(t303.resolution, Resolution::SharedStopContext);
}

#[test]
fn test_direction_summaries() {
    let (feed, registry) = load();
    let classified = classify_feed(&registry, &feed.trips, &BasicLabelCleaner).unwrap();
    let summaries = summarize_directions(&registry, &classified).unwrap();

    // 6 routes, both directions each
    assert_eq!(summaries.len(), 12);

    let douglas = summaries
        .iter()
        .find(|s| s.route_id == RouteId::new("1") && s.direction_id == DirectionId::Outbound)
        .unwrap();
    assert_eq!(douglas.headsign, "Douglas");
    let stops: Vec<&str> = douglas.stops.iter().map(|v| v.stop_id.as_str()).collect();
    assert_eq!(
        stops,
        vec!["811771", "811672", "811789", "811790", "811791", "811821"]
    );

    let downtown = summaries
        .iter()
        .find(|s| s.route_id == RouteId::new("3") && s.direction_id == DirectionId::Inbound)
        .unwrap();
    assert_eq!(downtown.headsign, "Downtown Transit Center");
    assert_eq!(downtown.trip_ids.len(), 3);
    // t302's eight stops plus 811692 from t303 and 811701 from t304, each once
    assert_eq!(downtown.stops.len(), 10);
    let seqs: Vec<u32> = downtown.stops.iter().map(|v| v.sequence).collect();
    assert_eq!(seqs, (1..=10).collect::<Vec<u32>>());

    let main_line: Vec<&str> = downtown
        .stops
        .iter()
        .map(|v| v.stop_id.as_str())
        .filter(|s| !["811692", "811701"].contains(s))
        .collect();
    assert_eq!(
        main_line,
        vec!["811717", "811816", "811754", "839422", "811688", "811691", "811755", "811771"]
    );
}

#[test]
fn test_stop_order_against_fixture_pattern() {
    let (_, registry) = load();
    let pattern = registry.get(&RouteId::new("3")).unwrap();
    let (norway_point, nugget_mall, jordan, switzer) = (
        StopId::new("811687"),
        StopId::new("811692"),
        StopId::new("811754"),
        StopId::new("839422"),
    );

    let outbound = |a, b, seq_a, seq_b| {
        compare_order(pattern, DirectionId::Outbound, a, b, seq_a, seq_b)
    };

    assert!(outbound(&norway_point, &nugget_mall, 9, 1).is_lt());
    assert!(compare_order(pattern, DirectionId::Inbound, &switzer, &jordan, 1, 9).is_gt());
    // Vanderbilt Hill is shared-ambiguous, so the feed numbers decide
    let vanderbilt = StopId::new("811688");
    assert!(outbound(&vanderbilt, &norway_point, 1, 9).is_lt());
}

#[test]
fn test_unknown_pattern_stop_is_rejected() {
    let feed = Feed::load(FIXTURES).unwrap();
    let config = PatternConfig::from_json(
        r#"{"routes": [{"route_id": "3", "directions": [
            {"direction_id": 0, "stops": ["811771", "999999"]},
            {"direction_id": 1, "stops": []}
        ]}]}"#,
    )
    .unwrap();
    let err = PatternRegistry::compile_with_stops(&config, &feed.stops).unwrap_err();
    assert!(err.to_string().contains("unknown stop 999999"));
}

#[test]
fn test_report_and_csv_output() {
    let (feed, registry) = load();
    let classified = classify_feed(&registry, &feed.trips, &BasicLabelCleaner).unwrap();

    let report = RunReport::from_classified(&registry, &classified);
    assert_eq!(report.total_trips, 14);
    assert_eq!(report.outbound, 6);
    assert_eq!(report.inbound, 8);
    assert_eq!(report.resolved_by(Resolution::Unpatterned), 2);
    assert_eq!(report.resolved_by(Resolution::SharedStopContext), 1);
    assert_eq!(report.resolved_by(Resolution::FeedDirection), 1);
    assert_eq!(report.resolved_by(Resolution::Complement), 1);
    assert_eq!(report.routes.len(), 6);

    let path = format!(
        "{}/{}",
        env::temp_dir().display(),
        "trip_patterns_integration.csv"
    );
    let _ = fs::remove_file(&path);
    write_classified_trips(&path, &classified).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 15);
    assert!(content.contains(
        "3,t303,weekday,0,1,Downtown Transit Center,shared_stop_context,1,1,4"
    ));

    fs::remove_file(&path).unwrap();
}

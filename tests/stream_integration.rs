//! Integration tests for activity streams
//!
//! Every property runs against both backends: the shipped SQLite backend
//! (on a temporary database file) and the in-memory backend.

use std::sync::Arc;
use std::thread;

use activity_stream::db::PoolSettings;
use activity_stream::{
    Activity, ActivityStream, BaseObject, Direction, MemoryBackend, PageToken, SqliteBackend,
    StreamBackend, StreamError,
};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

const TEST_STREAM_ID: &str = "TEST_STREAM_ID";

/// Base score for test activities (2015-01-19T15:39:44Z)
const T0: i64 = 1_421_679_584_000;

fn sqlite_streams() -> (ActivityStream<SqliteBackend>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let backend = SqliteBackend::open(&temp_dir.path().join("streams.db"), &PoolSettings::default()).unwrap();
    (ActivityStream::new(backend), temp_dir)
}

fn memory_streams() -> ActivityStream<MemoryBackend> {
    ActivityStream::new(MemoryBackend::new())
}

fn test_activity(id: &str, score: i64) -> Activity {
    let mut a = Activity::new(id, "SOME_VERB_LIKE_CREATE");
    a.published = Some(Utc.timestamp_millis_opt(score).unwrap());
    a.actor = BaseObject::new("ACTOR_ID", "SOME_TYPE_LIKE_PERSON");
    a.object = BaseObject::new("COMMUNITY_ID", "SOME_TYPE_LIKE_GROUP");
    a
}

fn ids(activities: &[Activity]) -> Vec<&str> {
    activities.iter().map(|a| a.id.as_str()).collect()
}

/// Run a property against both backends
macro_rules! both_backends {
    ($name:ident, $check:ident) => {
        mod $name {
            use super::*;

            #[test]
            fn sqlite() {
                let (streams, _temp) = sqlite_streams();
                $check(&streams);
            }

            #[test]
            fn memory() {
                $check(&memory_streams());
            }
        }
    };
}

// =============================================================================
// Activity Store
// =============================================================================

fn idempotent_store<B: StreamBackend>(streams: &ActivityStream<B>) {
    let a = test_activity("a1", T0);
    streams.store_activity(a.clone()).unwrap();
    streams.store_activity(a.clone()).unwrap();

    assert_eq!(streams.get("a1").unwrap(), a);
    let bulk = streams.bulk_get(&["a1".to_string()]).unwrap();
    assert_eq!(bulk.activities, vec![a]);
}
both_backends!(store_is_idempotent, idempotent_store);

fn timestamp_defaulting<B: StreamBackend>(streams: &ActivityStream<B>) {
    let mut a = test_activity("a1", T0);
    a.published = None;
    streams.store_activity(a).unwrap();

    let stored = streams.get("a1").unwrap();
    let age = Utc::now().timestamp_millis() - stored.score();
    assert!((0..5000).contains(&age), "published {}ms ago", age);
}
both_backends!(store_defaults_published, timestamp_defaulting);

fn get_errors<B: StreamBackend>(streams: &ActivityStream<B>) {
    assert!(streams.get("SOME_INEXISTENT_KEY").unwrap_err().is_not_found());

    streams.backend().put("SOME_KEY", b"NOT_AN_ACTIVITY").unwrap();
    assert!(matches!(streams.get("SOME_KEY"), Err(StreamError::Malformed(_))));
}
both_backends!(get_reports_missing_and_malformed, get_errors);

fn bulk_get_in_order<B: StreamBackend>(streams: &ActivityStream<B>) {
    let all: Vec<Activity> = (0..5).map(|i| test_activity(&format!("a{}", i), T0 + i)).collect();
    for a in &all {
        streams.store_activity(a.clone()).unwrap();
    }

    let wanted: Vec<String> = all.iter().map(|a| a.id.clone()).collect();
    let bulk = streams.bulk_get(&wanted).unwrap();
    assert!(bulk.is_complete());
    assert_eq!(bulk.activities, all);
}
both_backends!(bulk_get_returns_all, bulk_get_in_order);

// =============================================================================
// Stream Writer
// =============================================================================

fn publish_to_many_streams<B: StreamBackend>(streams: &ActivityStream<B>) {
    let stream_ids = ["ID1", "ID2", "ID3", "ID4", "ID5"];
    let a = test_activity("a1", T0);
    assert!(streams.get("a1").unwrap_err().is_not_found());

    let errors = streams.add_to_streams(a.clone(), &stream_ids);
    assert!(errors.is_empty(), "{:?}", errors);

    for id in stream_ids {
        let page = streams.get_stream(id, 0, 0, Direction::After).unwrap();
        assert_eq!(ids(&page), vec!["a1"]);
    }
    assert_eq!(streams.get("a1").unwrap(), a);
}
both_backends!(publish_stores_and_indexes, publish_to_many_streams);

fn duplicate_publish<B: StreamBackend>(streams: &ActivityStream<B>) {
    assert!(streams.get_stream(TEST_STREAM_ID, 99, 0, Direction::After).unwrap().is_empty());

    let a = test_activity("a1", T0);
    assert!(streams.add_to_streams(a.clone(), &[TEST_STREAM_ID]).is_empty());
    assert!(streams.add_to_streams(a, &[TEST_STREAM_ID]).is_empty());

    let page = streams.get_stream(TEST_STREAM_ID, 99, 0, Direction::After).unwrap();
    assert_eq!(ids(&page), vec!["a1"]);
    assert_eq!(streams.stream_len(TEST_STREAM_ID).unwrap(), 1);
}
both_backends!(duplicate_ids_coalesce, duplicate_publish);

fn duplicate_publish_refreshes_score<B: StreamBackend>(streams: &ActivityStream<B>) {
    streams.publish(test_activity("old", T0), &[TEST_STREAM_ID]).unwrap();
    streams.publish(test_activity("new", T0 + 10), &[TEST_STREAM_ID]).unwrap();

    // Re-adding with a later score moves the entry, it does not append
    streams.publish(test_activity("old", T0 + 20), &[TEST_STREAM_ID]).unwrap();
    assert_eq!(
        streams.query(TEST_STREAM_ID, 0, 0, Direction::After).unwrap(),
        vec!["old", "new"]
    );
}
both_backends!(duplicate_ids_take_latest_score, duplicate_publish_refreshes_score);

fn trim_bound<B: StreamBackend>(streams: &ActivityStream<B>) {
    streams.set_max_stream_size(40);

    let mut published = Vec::new();
    for i in 0..150 {
        let a = test_activity(&format!("a{:03}", i), T0 + i);
        published.push(a.id.clone());
        assert!(streams.add_to_streams(a, &[TEST_STREAM_ID]).is_empty());
    }

    let page = streams.get_stream(TEST_STREAM_ID, 99, 0, Direction::After).unwrap();
    assert_eq!(page.len(), 40);

    let newest: Vec<&str> = published[110..].iter().rev().map(String::as_str).collect();
    assert_eq!(ids(&page), newest);
}
both_backends!(trim_keeps_newest, trim_bound);

fn unbounded_streams<B: StreamBackend>(streams: &ActivityStream<B>) {
    streams.set_max_stream_size(0);
    for i in 0..60 {
        streams.publish(test_activity(&format!("a{}", i), T0 + i), &[TEST_STREAM_ID]).unwrap();
    }
    assert_eq!(streams.stream_len(TEST_STREAM_ID).unwrap(), 60);
}
both_backends!(non_positive_bound_disables_trim, unbounded_streams);

// =============================================================================
// Stream Reads
// =============================================================================

/// A (oldest), B, C (newest) in one stream
fn seed_abc<B: StreamBackend>(streams: &ActivityStream<B>) -> [Activity; 3] {
    let abc = [
        test_activity("A", T0),
        test_activity("B", T0 + 100),
        test_activity("C", T0 + 200),
    ];
    for a in &abc {
        streams.store_activity(a.clone()).unwrap();
        assert!(streams.add_to_streams(a.clone(), &[TEST_STREAM_ID]).is_empty());
    }
    abc
}

fn pagination_round_trip<B: StreamBackend>(streams: &ActivityStream<B>) {
    let [a, b, c] = seed_abc(streams);

    let first = streams.get_stream(TEST_STREAM_ID, 1, 0, Direction::After).unwrap();
    assert_eq!(first, vec![c.clone()]);

    let older = streams.get_stream(TEST_STREAM_ID, 2, c.score(), Direction::After).unwrap();
    assert_eq!(older, vec![b.clone(), a.clone()]);

    let newer = streams.get_stream(TEST_STREAM_ID, 1, a.score(), Direction::Before).unwrap();
    assert_eq!(newer, vec![b]);

    let rest = streams.get_stream(TEST_STREAM_ID, 5, a.score(), Direction::Before).unwrap();
    assert_eq!(ids(&rest), vec!["C", "B"]);
}
both_backends!(pages_round_trip, pagination_round_trip);

fn query_matches_get_stream<B: StreamBackend>(streams: &ActivityStream<B>) {
    let [a, _, c] = seed_abc(streams);
    assert_eq!(streams.query(TEST_STREAM_ID, 0, 0, Direction::Before).unwrap(), vec!["C", "B", "A"]);
    assert_eq!(streams.query(TEST_STREAM_ID, 2, c.score(), Direction::After).unwrap(), vec!["B", "A"]);
    assert_eq!(streams.query(TEST_STREAM_ID, 2, a.score(), Direction::Before).unwrap(), vec!["C", "B"]);
}
both_backends!(query_returns_ids_newest_first, query_matches_get_stream);

fn token_exhaustion<B: StreamBackend>(streams: &ActivityStream<B>) {
    let [a, b, c] = seed_abc(streams);

    let older = streams.get_page(TEST_STREAM_ID, 5, c.score(), Direction::After).unwrap();
    assert_eq!(older.activities.len(), 2);
    assert_eq!(older.tokens.prev, Some(PageToken::before(5, b.score())));
    assert!(older.tokens.next.is_none());

    let newer = streams.get_page(TEST_STREAM_ID, 5, a.score(), Direction::Before).unwrap();
    assert_eq!(newer.activities.len(), 2);
    assert!(newer.tokens.prev.is_none());
    assert_eq!(newer.tokens.next, Some(PageToken::after(5, b.score())));
}
both_backends!(short_pages_drop_a_token, token_exhaustion);

fn follow_string_tokens<B: StreamBackend>(streams: &ActivityStream<B>) {
    seed_abc(streams);

    let first = streams.get_page(TEST_STREAM_ID, 1, 0, Direction::After).unwrap();
    let next: PageToken = first.tokens.next.unwrap().to_string().parse().unwrap();
    let second = streams.follow(TEST_STREAM_ID, &next).unwrap();
    assert_eq!(ids(&second.activities), vec!["B"]);

    let prev: PageToken = second.tokens.prev.unwrap().to_string().parse().unwrap();
    let back = streams.follow(TEST_STREAM_ID, &prev).unwrap();
    assert_eq!(ids(&back.activities), vec!["C"]);
}
both_backends!(tokens_survive_string_round_trip, follow_string_tokens);

fn empty_stream_queries<B: StreamBackend>(streams: &ActivityStream<B>) {
    let lone = test_activity("lone", T0);

    for direction in [Direction::After, Direction::Before] {
        assert!(streams.get_stream(TEST_STREAM_ID, 5, 0, direction).unwrap().is_empty());
        assert!(streams.get_stream(TEST_STREAM_ID, 5, lone.score(), direction).unwrap().is_empty());
        let page = streams.get_page(TEST_STREAM_ID, 5, lone.score(), direction).unwrap();
        assert!(page.tokens.prev.is_none() && page.tokens.next.is_none());
    }

    // With one entry, paging away from it finds nothing
    streams.publish(lone.clone(), &[TEST_STREAM_ID]).unwrap();
    for direction in [Direction::After, Direction::Before] {
        assert!(streams.get_stream(TEST_STREAM_ID, 5, lone.score(), direction).unwrap().is_empty());
    }
}
both_backends!(empty_streams_return_nothing, empty_stream_queries);

fn corrupt_entries_are_skipped<B: StreamBackend>(streams: &ActivityStream<B>) {
    seed_abc(streams);
    streams.backend().put("B", b"{\"verb\":\"no id\"}").unwrap();
    streams.backend().upsert_entry(TEST_STREAM_ID, "ghost", T0 + 300).unwrap();

    let page = streams.get_stream(TEST_STREAM_ID, 10, 0, Direction::After).unwrap();
    assert_eq!(ids(&page), vec!["C", "A"]);

    // The index itself still holds every id
    assert_eq!(streams.stream_len(TEST_STREAM_ID).unwrap(), 4);
}
both_backends!(undecodable_entries_leave_page, corrupt_entries_are_skipped);

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn concurrent_writers_converge_to_bound() {
    let (streams, _temp) = sqlite_streams();
    let streams = Arc::new(streams);
    streams.set_max_stream_size(10);

    let handles: Vec<_> = (0..4)
        .map(|w| {
            let streams = Arc::clone(&streams);
            thread::spawn(move || {
                for i in 0..25 {
                    let a = test_activity(&format!("w{}-{}", w, i), T0 + w * 1000 + i);
                    assert!(streams.add_to_streams(a, &[TEST_STREAM_ID, "shared"]).is_empty());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // One more serialized write brings every stream back to the bound
    streams.publish(test_activity("final", T0 + 10_000), &[TEST_STREAM_ID, "shared"]).unwrap();
    for stream_id in [TEST_STREAM_ID, "shared"] {
        assert_eq!(streams.stream_len(stream_id).unwrap(), 10);
        let page = streams.get_stream(stream_id, 0, 0, Direction::After).unwrap();
        assert_eq!(page[0].id, "final");
        assert_eq!(page.len(), 10);
    }
}

#[test]
fn in_memory_sqlite_backend_behaves_like_file_backend() {
    let streams = ActivityStream::new(SqliteBackend::open_in_memory().unwrap());
    pagination_round_trip(&streams);
}

//! End-to-end tests for the frame-serving pipeline, driven through the
//! public `Player` facade over in-memory media.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rp_common::{RationalTime, Resolution, TimeRange, TransitionKind};
use rp_media::{MemoryIo, MemoryMedia, Options};
use rp_player::Player;
use rp_timeline::{Clip, Composition, Item, MediaReference, Track, TrackKind, Transition};

fn rt(value: i64) -> RationalTime {
    RationalTime::new(value, 24)
}

fn range(start: i64, duration: i64) -> TimeRange {
    TimeRange::new(rt(start), rt(duration))
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    check()
}

fn clip_item(name: &str, url: &str, duration: i64) -> Item {
    Item::Clip(Clip::new(
        name,
        MediaReference::External { url: url.into() },
        range(0, duration),
    ))
}

/// One 48-frame clip at rate 24, timeline start 0.
fn single_clip_setup(latency: Duration) -> (Arc<MemoryIo>, Composition) {
    let io = Arc::new(MemoryIo::new());
    io.insert(
        "/c.mov",
        MemoryMedia::video(range(0, 48), Resolution::new(8, 8)).with_latency(latency),
    );
    let mut track = Track::new(TrackKind::Video, "V1");
    track.push(clip_item("c", "/c.mov", 48));
    let comp = Composition::new(vec![track], rt(0)).unwrap();
    (io, comp)
}

/// Two 48-frame clips joined by a 6/6 dissolve.
fn dissolve_setup() -> (Arc<MemoryIo>, Composition) {
    let io = Arc::new(MemoryIo::new());
    io.insert("/a.mov", MemoryMedia::video(range(0, 48), Resolution::new(8, 8)));
    io.insert("/b.mov", MemoryMedia::video(range(0, 48), Resolution::new(8, 8)));
    let mut track = Track::new(TrackKind::Video, "V1");
    track.push(clip_item("a", "/a.mov", 48));
    track.push(Item::Transition(Transition {
        name: "x".into(),
        kind: TransitionKind::Dissolve,
        in_offset: rt(6),
        out_offset: rt(6),
    }));
    track.push(clip_item("b", "/b.mov", 48));
    let comp = Composition::new(vec![track], rt(0)).unwrap();
    (io, comp)
}

// ── Single clip ──────────────────────────────────────────────────────

#[test]
fn single_clip_frame_resolves_with_one_layer() {
    let (io, comp) = single_clip_setup(Duration::ZERO);
    let player = Player::from_composition(comp, io).unwrap();

    let frame = player.frame(rt(10), 0, None).wait();
    assert_eq!(frame.time, rt(10));
    assert_eq!(frame.layers.len(), 1);
    assert!(frame.layers[0].image.is_some());
    assert!(frame.layers[0].image_b.is_none());
    assert_eq!(frame.layers[0].transition, TransitionKind::None);
}

#[test]
fn every_frame_in_range_resolves_with_its_own_time() {
    let (io, comp) = single_clip_setup(Duration::ZERO);
    let player = Player::from_composition(comp, io).unwrap();
    assert_eq!(player.duration(), rt(48));

    let futures: Vec<_> = (0..48).map(|i| player.frame(rt(i), 0, None)).collect();
    for (i, future) in futures.into_iter().enumerate() {
        let frame = future.wait();
        assert_eq!(frame.time, rt(i as i64));
        assert_eq!(frame.layers.len(), 1);
        assert!(frame.layers[0].image.is_some());
    }
}

#[test]
fn metadata_reflects_the_composition() {
    let (io, comp) = single_clip_setup(Duration::ZERO);
    let player = Player::from_composition(comp, io).unwrap();

    assert_eq!(player.global_start_time(), rt(0));
    assert_eq!(player.duration(), rt(48));
    assert_eq!(player.video_info().len(), 1);
    assert_eq!(player.video_info()[0].size, Resolution::new(8, 8));
    assert_eq!(player.request_count(), 16);
    assert_eq!(player.request_timeout(), Duration::from_millis(1));
}

// ── Transitions ──────────────────────────────────────────────────────

#[test]
fn dissolve_layer_carries_both_images_and_formula_phase() {
    let (io, comp) = dissolve_setup();
    let player = Player::from_composition(comp, io).unwrap();

    // Three frames before clip A's inclusive end (47).
    let frame = player.frame(rt(44), 0, None).wait();
    assert_eq!(frame.layers.len(), 1);
    let layer = &frame.layers[0];
    assert!(layer.image.is_some());
    assert!(layer.image_b.is_some());
    assert_eq!(layer.transition, TransitionKind::Dissolve);
    let a = 47.0 - 6.0;
    let b = 47.0 + 6.0 + 1.0;
    assert_eq!(layer.transition_value, ((44.0 - a) / (b - a)) as f32);
}

#[test]
fn incoming_side_of_dissolve_keeps_outgoing_clip_primary() {
    let (io, comp) = dissolve_setup();
    let player = Player::from_composition(comp, io.clone()).unwrap();

    let frame = player.frame(rt(50), 0, None).wait();
    assert_eq!(frame.layers.len(), 1);
    let layer = &frame.layers[0];
    assert!(layer.image.is_some());
    assert!(layer.image_b.is_some());
    let a = 48.0 - 6.0 - 1.0;
    let b = 48.0 + 6.0;
    assert_eq!(layer.transition_value, ((50.0 - a) / (b - a)) as f32);

    // The secondary clip was opened to serve the blend.
    assert_eq!(io.open_count("/b.mov"), 1);
}

// ── Reader lifetimes ─────────────────────────────────────────────────

#[test]
fn uncovered_readers_are_evicted_within_ticks() {
    let io = Arc::new(MemoryIo::new());
    for name in ["/one.mov", "/two.mov", "/three.mov"] {
        io.insert(name, MemoryMedia::video(range(0, 48), Resolution::new(4, 4)));
    }
    let mut track = Track::new(TrackKind::Video, "V1");
    track.push(clip_item("one", "/one.mov", 48));
    track.push(clip_item("two", "/two.mov", 48));
    track.push(clip_item("three", "/three.mov", 48));
    let comp = Composition::new(vec![track], rt(0)).unwrap();
    let player = Player::from_composition(comp, io).unwrap();

    // Keep everything alive while the three readers warm up.
    player.set_active_ranges(vec![range(0, 144)]);
    for t in [10, 60, 110] {
        player.frame(rt(t), 0, None).wait();
    }
    assert!(wait_until(Duration::from_secs(2), || player.stats().readers == 3));

    // Shrink coverage to the middle clip only.
    player.set_active_ranges(vec![range(48, 48)]);
    assert!(
        wait_until(Duration::from_secs(2), || player.stats().readers == 1),
        "readers for uncovered clips should be evicted"
    );

    // The surviving reader still serves frames.
    let frame = player.frame(rt(60), 0, None).wait();
    assert!(frame.layers[0].image.is_some());
}

#[test]
fn active_range_replacement_is_idempotent() {
    let (io, comp) = single_clip_setup(Duration::ZERO);
    let player = Player::from_composition(comp, io).unwrap();

    let ranges = vec![range(0, 10), range(20, 10)];
    player.set_active_ranges(ranges.clone());
    player.set_active_ranges(ranges.clone());
    assert_eq!(player.active_ranges(), ranges);
}

// ── Bounded concurrency ──────────────────────────────────────────────

#[test]
fn hundred_requests_respect_the_in_flight_budget() {
    let (io, comp) = single_clip_setup(Duration::from_millis(2));
    let player = Player::from_composition(comp, io).unwrap();
    // Hold the reader open for the whole burst.
    player.set_active_ranges(vec![range(0, 48)]);

    let mut futures: Vec<Option<_>> = (0..100)
        .map(|i| Some(player.frame(rt(i % 48), 0, None)))
        .collect();

    let deadline = Instant::now() + Duration::from_secs(30);
    let mut resolved = 0;
    while resolved < 100 {
        assert!(Instant::now() < deadline, "requests did not drain in time");
        let stats = player.stats();
        assert!(
            stats.in_flight <= 16,
            "in-flight {} exceeded the budget",
            stats.in_flight
        );
        for slot in futures.iter_mut() {
            if let Some(future) = slot {
                if let Some(frame) = future.try_frame() {
                    assert!(!frame.layers.is_empty());
                    *slot = None;
                    resolved += 1;
                }
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn same_clip_requests_complete_in_submission_order() {
    let (io, comp) = single_clip_setup(Duration::ZERO);
    let player = Player::from_composition(comp, io.clone()).unwrap();

    let futures: Vec<_> = (0..10).map(|i| player.frame(rt(i), 0, None)).collect();
    for future in futures {
        future.wait();
    }

    let served: Vec<i64> = io
        .served()
        .into_iter()
        .filter(|(path, _)| path == &PathBuf::from("/c.mov"))
        .map(|(_, time)| time.value)
        .collect();
    assert_eq!(served, (0..10).collect::<Vec<_>>());
}

// ── Cancellation and teardown ────────────────────────────────────────

#[test]
fn cancel_resolves_with_matching_time_and_no_images() {
    let (io, comp) = single_clip_setup(Duration::from_millis(20));
    let player = Player::from_composition(comp, io).unwrap();

    let future = player.frame(rt(7), 0, None);
    player.cancel_frames();

    let frame = future.wait();
    assert_eq!(frame.time, rt(7));
    assert!(!frame.has_images(), "cancelled frame must carry no images");
}

#[test]
fn cancel_leaves_later_requests_functional() {
    let (io, comp) = single_clip_setup(Duration::ZERO);
    let player = Player::from_composition(comp, io).unwrap();

    player.frame(rt(1), 0, None);
    player.cancel_frames();

    let frame = player.frame(rt(2), 0, None).wait();
    assert_eq!(frame.time, rt(2));
    assert_eq!(frame.layers.len(), 1);
}

#[test]
fn drop_resolves_every_outstanding_future() {
    let (io, comp) = single_clip_setup(Duration::from_millis(20));
    let player = Player::from_composition(comp, io).unwrap();
    // Five fit the budget, five stay queued.
    player.set_request_count(5);

    let futures: Vec<_> = (0..10).map(|i| player.frame(rt(i), 0, None)).collect();
    drop(player);

    for (i, future) in futures.into_iter().enumerate() {
        let frame = future.wait();
        assert_eq!(frame.time, rt(i as i64), "future {i} resolved with wrong time");
    }
}

#[test]
fn fresh_player_over_the_same_composition_works_after_drop() {
    let (io, comp) = single_clip_setup(Duration::ZERO);
    let player = Player::from_composition(comp, io).unwrap();
    let comp_ref = player.composition().clone();
    drop(player);

    let io = Arc::new(MemoryIo::new());
    io.insert("/c.mov", MemoryMedia::video(range(0, 48), Resolution::new(8, 8)));
    let player = Player::from_composition(comp_ref, io).unwrap();
    let frame = player.frame(rt(3), 0, None).wait();
    assert_eq!(frame.time, rt(3));
    assert_eq!(frame.layers.len(), 1);
}

// ── Error reflection ─────────────────────────────────────────────────

#[test]
fn unopenable_media_yields_imageless_layer() {
    let io = Arc::new(MemoryIo::new());
    // "/gone.mov" is never registered.
    let mut track = Track::new(TrackKind::Video, "V1");
    track.push(clip_item("gone", "/gone.mov", 48));
    let comp = Composition::new(vec![track], rt(0)).unwrap();
    let player = Player::from_composition(comp, io).unwrap();

    let frame = player.frame(rt(10), 0, None).wait();
    assert_eq!(frame.time, rt(10));
    assert_eq!(frame.layers.len(), 1);
    assert!(frame.layers[0].image.is_none());
}

#[test]
fn gap_regions_yield_imageless_layers() {
    let io = Arc::new(MemoryIo::new());
    io.insert("/c.mov", MemoryMedia::video(range(0, 48), Resolution::new(4, 4)));
    let mut track = Track::new(TrackKind::Video, "V1");
    track.push(Item::Gap(rp_timeline::Gap { duration: rt(24) }));
    track.push(clip_item("c", "/c.mov", 48));
    let comp = Composition::new(vec![track], rt(0)).unwrap();
    let player = Player::from_composition(comp, io).unwrap();

    let frame = player.frame(rt(10), 0, None).wait();
    assert_eq!(frame.layers.len(), 1);
    assert!(frame.layers[0].image.is_none());
}

// ── Path-based construction ──────────────────────────────────────────

#[test]
fn open_direct_media_synthesizes_single_clip_timeline() {
    let io = Arc::new(MemoryIo::new());
    io.insert("/shot.mov", MemoryMedia::video(range(0, 48), Resolution::new(8, 8)));

    let player = Player::open("/shot.mov", io).unwrap();
    assert_eq!(player.duration(), rt(48));
    assert_eq!(player.composition().clip_count(), 1);

    let frame = player.frame(rt(5), 0, None).wait();
    assert!(frame.layers[0].image.is_some());
}

#[test]
fn open_document_resolves_relative_media_against_its_directory() {
    let dir = std::env::temp_dir().join(format!("rp-player-doc-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let doc_path = dir.join("cut.otio");
    std::fs::write(
        &doc_path,
        r#"{"OTIO_SCHEMA": "Timeline.1",
            "global_start_time": {"OTIO_SCHEMA": "RationalTime.1", "value": 0.0, "rate": 24.0},
            "tracks": {"OTIO_SCHEMA": "Stack.1", "children": [
                {"OTIO_SCHEMA": "Track.1", "name": "V1", "kind": "Video", "children": [
                    {"OTIO_SCHEMA": "Clip.2", "name": "shot",
                     "media_reference": {"OTIO_SCHEMA": "ExternalReference.1",
                                         "target_url": "media/shot.mov"},
                     "source_range": {"OTIO_SCHEMA": "TimeRange.1",
                         "start_time": {"OTIO_SCHEMA": "RationalTime.1", "value": 0.0, "rate": 24.0},
                         "duration": {"OTIO_SCHEMA": "RationalTime.1", "value": 48.0, "rate": 24.0}}}
                ]}
            ]}}"#,
    )
    .unwrap();

    let io = Arc::new(MemoryIo::new());
    io.insert(
        dir.join("media/shot.mov"),
        MemoryMedia::video(range(0, 48), Resolution::new(8, 8)),
    );

    let player = Player::open(&doc_path, io.clone()).unwrap();
    let frame = player.frame(rt(5), 0, None).wait();
    assert!(frame.layers[0].image.is_some());
    assert!(io.opened().contains(&dir.join("media/shot.mov")));

    drop(player);
    let _ = std::fs::remove_file(&doc_path);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn open_unreadable_non_document_path_fails() {
    let io = Arc::new(MemoryIo::new());
    let err = Player::open("/definitely/not/here.otio", io);
    assert!(err.is_err());
}

// ── Tuning ───────────────────────────────────────────────────────────

#[test]
fn io_options_are_forwarded_on_open() {
    let (io, comp) = single_clip_setup(Duration::ZERO);
    let player = Player::from_composition(comp, io.clone()).unwrap();

    let mut options = Options::new();
    options.insert("FFmpeg/ThreadCount".into(), "4".into());
    player.set_io_options(options);

    player.frame(rt(1), 0, None).wait();
    let seen = io.last_options();
    assert_eq!(seen.get("FFmpeg/ThreadCount").unwrap(), "4");
    assert_eq!(seen.get(rp_media::SEQUENCE_DEFAULT_SPEED).unwrap(), "24");
}

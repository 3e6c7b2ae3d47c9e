//! Integration tests for the deck driver, driven by a CPU backend.

mod common;

use std::sync::{Arc, Mutex};

use common::{config, first_frame_at, go_live, program, Player, TestBackend};
use phobz_synth::audio::AudioData;
use phobz_synth::{deck, guest_deck, CueEvent, CueStatus, SynthError};

/// Blocks per bar with the test config: 2 s bars of 10 ms blocks.
const BLOCKS_PER_BAR: usize = 200;

fn amen() -> AudioData {
    AudioData::mono(vec![0.5; 44100], 44100)
}

#[tokio::test]
async fn test_end_to_end_cue_swaps_on_bar_boundary() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    let mut player = Player::new(&config());

    handle.register_sample("amen", &amen()).unwrap();
    let source = "// level 0.8\nfn main_sound(time: f32) -> vec2<f32> {\n    \
                  return sample_frame(sample_amen, sample_amen_meta, time);\n}\n";
    handle.compile(source).await.unwrap();
    player.play(&mut deck, 1);
    assert_eq!(handle.cue_status(), CueStatus::Ready);

    handle.apply_cue().unwrap();
    player.play(&mut deck, 1);
    assert_eq!(handle.cue_status(), CueStatus::Applying);

    player.play(&mut deck, BLOCKS_PER_BAR + 10);
    assert_eq!(handle.cue_status(), CueStatus::None);
    assert_eq!(deck.live_source(), Some(source));

    // Nothing was live before the first bar ended.
    let first = first_frame_at(&player.left, 0.8).unwrap();
    assert!((1999..=2000).contains(&first), "program started at frame {}", first);
    assert!(player.left[..first].iter().all(|&s| s == 0.0));
    assert!(player.left[first..].iter().all(|&s| s == 0.8));

    let swaps: Vec<_> = player.reports.iter().filter(|r| r.swapped).collect();
    assert_eq!(swaps.len(), 1);
}

#[tokio::test]
async fn test_frames_before_boundary_are_untouched_by_cue() {
    let backend = TestBackend::new();
    let (mut cued_handle, mut cued) = deck(backend.clone(), config()).unwrap();
    let (mut plain_handle, mut plain) = deck(backend, config()).unwrap();
    go_live(&mut cued_handle, &mut cued, &program(0.25)).await;
    go_live(&mut plain_handle, &mut plain, &program(0.25)).await;

    let mut with_cue = Player::new(&config());
    let mut without_cue = Player::new(&config());
    with_cue.play(&mut cued, 50);
    without_cue.play(&mut plain, 50);

    cued_handle.compile(&program(0.75)).await.unwrap();
    cued_handle.apply_cue().unwrap();
    with_cue.play(&mut cued, BLOCKS_PER_BAR);
    without_cue.play(&mut plain, BLOCKS_PER_BAR);

    let swap = with_cue.first_swap().unwrap();
    let report = with_cue.reports[swap];
    let boundary = swap * config().buffer_size + report.frames_before_boundary;
    assert_eq!(report.frames_before_boundary, 9);

    assert_eq!(with_cue.left[..boundary], without_cue.left[..boundary]);
    assert_eq!(with_cue.right[..boundary], without_cue.right[..boundary]);
    assert!(with_cue.left[boundary..].iter().all(|&s| s == 0.75));
    assert!(without_cue.left[boundary..].iter().all(|&s| s == 0.25));
}

#[tokio::test]
async fn test_new_program_renders_from_boundary_time() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    go_live(&mut handle, &mut deck, &program(0.25)).await;
    handle.compile(&program(0.5)).await.unwrap();
    handle.apply_cue().unwrap();

    let mut player = Player::new(&config());
    player.play(&mut deck, BLOCKS_PER_BAR);
    let swap = player.first_swap().unwrap();
    let report = player.reports[swap];
    let boundary = swap * config().buffer_size + report.frames_before_boundary;

    // The right channel carries render time; it stays continuous across the swap.
    let expected = report.time + report.frames_before_boundary as f64 / 1000.0;
    assert!((player.right[boundary] as f64 - expected).abs() < 1e-4);
    assert!((player.right[boundary] - player.right[boundary - 1] - 0.001).abs() < 1e-4);
}

#[tokio::test]
async fn test_bpm_change_restarts_at_chunk_zero() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend.clone(), config()).unwrap();
    go_live(&mut handle, &mut deck, &program(0.5)).await;

    let mut player = Player::new(&config());
    for _ in 0..8 {
        if deck.chunk_head() == 2 {
            break;
        }
        player.play(&mut deck, 1);
    }
    assert_eq!(deck.chunk_head(), 2);
    let renders = deck.renders();

    handle.set_bpm(140.0).unwrap();
    assert_eq!(handle.bpm(), 140.0);
    player.play(&mut deck, 1);

    assert_eq!(deck.renders(), renders + 1);
    assert_eq!(deck.chunk_head(), 1);
    assert_eq!(backend.renders(), deck.renders());
}

#[tokio::test]
async fn test_chunked_rendering_issues_one_pass_per_chunk() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    go_live(&mut handle, &mut deck, &program(0.5)).await;
    let renders = deck.renders();

    let mut player = Player::new(&config());
    player.play(&mut deck, 40);
    // 40 blocks at 4 blocks per pass, plus the pass the pre-roll left open.
    assert!(deck.renders() - renders <= 11);
    assert!(deck.renders() - renders >= 10);
}

#[tokio::test]
async fn test_compile_failure_keeps_live_program() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    go_live(&mut handle, &mut deck, &program(0.5)).await;

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    handle.cue_events().subscribe(move |event| {
        if let CueEvent::CompileError(message) = event {
            sink.lock().unwrap().push(message.clone());
        }
    });

    handle.compile(&program(0.75)).await.unwrap();
    let mut player = Player::new(&config());
    player.play(&mut deck, 1);
    assert_eq!(handle.cue_status(), CueStatus::Ready);

    let broken = "fn main_sound(time: f32) -> vec2<f32> {\n    return vec2<f32>(oops);\n}\n";
    match handle.compile(broken).await {
        Err(SynthError::Compile(err)) => assert_eq!(err.first_line(), Some(2)),
        other => panic!("expected compile error, got {:?}", other),
    }
    assert!(handle.last_error().unwrap().contains("line 2"));

    player.play(&mut deck, 3);
    assert_eq!(handle.cue_status(), CueStatus::None);
    assert_eq!(deck.live_source(), Some(program(0.5).as_str()));
    assert!(player.left.iter().all(|&s| s == 0.5));

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0], None);
    assert!(errors[1].as_deref().unwrap().contains("oops"));

    // A later successful compile clears the error.
    drop(errors);
    handle.compile(&program(0.75)).await.unwrap();
    assert_eq!(handle.last_error(), None);
}

#[tokio::test]
async fn test_apply_without_cue_is_ignored() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    handle.apply_cue().unwrap();

    let mut player = Player::new(&config());
    player.play(&mut deck, 1);
    assert_eq!(handle.cue_status(), CueStatus::None);
    assert!(player.left.iter().all(|&s| s == 0.0));
}

#[tokio::test]
async fn test_recompile_replaces_committed_cue() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    let mut player = Player::new(&config());

    handle.compile(&program(0.25)).await.unwrap();
    handle.apply_cue().unwrap();
    player.play(&mut deck, 1);
    assert_eq!(handle.cue_status(), CueStatus::Applying);

    handle.compile(&program(0.75)).await.unwrap();
    player.play(&mut deck, 1);
    assert_eq!(handle.cue_status(), CueStatus::Ready);
    assert_eq!(handle.collect_retired(), 1);

    handle.apply_cue().unwrap();
    player.play(&mut deck, BLOCKS_PER_BAR);
    assert_eq!(deck.live_source(), Some(program(0.75).as_str()));
    assert!(first_frame_at(&player.left, 0.25).is_none());
}

#[tokio::test]
async fn test_swapped_out_program_is_retired() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    go_live(&mut handle, &mut deck, &program(0.25)).await;
    assert_eq!(handle.collect_retired(), 0);

    handle.compile(&program(0.5)).await.unwrap();
    handle.apply_cue().unwrap();
    let mut player = Player::new(&config());
    player.play(&mut deck, BLOCKS_PER_BAR);
    assert!(player.first_swap().is_some());
    assert_eq!(handle.collect_retired(), 1);
}

#[tokio::test]
async fn test_unregistered_sample_renders_silence() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    handle.register_sample("amen", &amen()).unwrap();

    let source = "// level 0.5\nfn main_sound(time: f32) -> vec2<f32> {\n    \
                  return sample_frame(sample_amen, sample_amen_meta, time);\n}\n";
    go_live(&mut handle, &mut deck, source).await;

    let mut player = Player::new(&config());
    player.play(&mut deck, 1);
    assert_eq!(player.left[0], 0.5);

    assert!(handle.unregister_sample("amen"));
    assert!(!handle.unregister_sample("amen"));
    let chunk = config().chunk_size;
    player.play(&mut deck, chunk + 1);

    let tail = &player.left[player.left.len() - config().buffer_size..];
    assert!(tail.iter().all(|&s| s == 0.0));
    assert!(handle.sample_names().is_empty());
}

#[tokio::test]
async fn test_sample_registered_after_compile_is_not_bound() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();

    // `sample_late` is not a registered sample yet, so it is an ordinary identifier.
    let source = "// level 0.5\nfn main_sound(time: f32) -> vec2<f32> {\n    \
                  return sample_late;\n}\n";
    go_live(&mut handle, &mut deck, source).await;
    handle.register_sample("late", &amen()).unwrap();

    let mut player = Player::new(&config());
    player.play(&mut deck, 5);
    assert!(player.left.iter().all(|&s| s == 0.5));
}

#[tokio::test]
async fn test_parameters_reach_program() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    handle.set_parameter("gain", 0.5).unwrap();
    assert_eq!(handle.parameter("gain"), Some(0.5));

    let source = "// level 0.5\nfn main_sound(time: f32) -> vec2<f32> {\n    \
                  return vec2<f32>(0.5 * param_gain);\n}\n";
    go_live(&mut handle, &mut deck, source).await;
    assert_eq!(deck.parameter("gain"), Some(0.5));

    let mut player = Player::new(&config());
    player.play(&mut deck, 1);
    assert_eq!(player.left[0], 0.25);
}

#[tokio::test]
async fn test_host_clock_snaps_on_drift() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    go_live(&mut handle, &mut deck, &program(0.5)).await;

    let mut left = vec![0.0; 10];
    let mut right = vec![0.0; 10];

    // Small jitter is absorbed by the prediction.
    let report = deck.process_block(0.002, &mut left, &mut right);
    assert!((report.time - 0.0005).abs() < 1e-9);
    assert_eq!(deck.drift_corrections(), 0);

    // A jump past the threshold snaps to the host.
    let report = deck.process_block(0.5, &mut left, &mut right);
    assert_eq!(report.time, 0.5);
    assert_eq!(deck.drift_corrections(), 1);
    assert_eq!(handle.get_time(), 0.5);
}

#[tokio::test]
async fn test_backward_clock_snap_keeps_cue_until_bar_end() {
    let backend = TestBackend::new();
    let (mut cued_handle, mut cued) = deck(backend.clone(), config()).unwrap();
    let (mut plain_handle, mut plain) = deck(backend, config()).unwrap();
    go_live(&mut cued_handle, &mut cued, &program(0.25)).await;
    go_live(&mut plain_handle, &mut plain, &program(0.25)).await;

    let mut with_cue = Player::new(&config());
    let mut without_cue = Player::new(&config());
    with_cue.play(&mut cued, 100);
    without_cue.play(&mut plain, 100);

    cued_handle.compile(&program(0.75)).await.unwrap();
    cued_handle.apply_cue().unwrap();
    with_cue.play(&mut cued, 1);
    without_cue.play(&mut plain, 1);
    assert_eq!(cued_handle.cue_status(), CueStatus::Applying);

    // The host falls back 0.2 s, from bar phase 0.5 to 0.405.
    for player in [&mut with_cue, &mut without_cue] {
        player.next_index -= 20;
        player.offset = 0.0005;
    }
    let snapped = with_cue.reports.len();
    with_cue.play(&mut cued, 130);
    without_cue.play(&mut plain, 130);

    assert_eq!(cued.drift_corrections(), 1);
    let report = with_cue.reports[snapped];
    assert!((report.time - 0.8105).abs() < 1e-9);
    assert!(!report.bar_wrapped);
    assert!(!report.swapped);

    // The swap waits for the end of the bar at t = 2.0.
    let swap = with_cue.first_swap().unwrap();
    assert_eq!(swap, snapped + 118);
    let report = with_cue.reports[swap];
    assert!((report.time - 1.9905).abs() < 1e-9);
    assert_eq!(report.frames_before_boundary, 9);

    let boundary = swap * config().buffer_size + report.frames_before_boundary;
    assert_eq!(with_cue.left[..boundary], without_cue.left[..boundary]);
    assert_eq!(with_cue.right[..boundary], without_cue.right[..boundary]);
    assert!(with_cue.left[boundary..].iter().all(|&s| s == 0.75));
}

#[tokio::test]
async fn test_tempo_change_keeps_cue_until_bar_end() {
    let backend = TestBackend::new();
    let (mut cued_handle, mut cued) = deck(backend.clone(), config()).unwrap();
    let (mut plain_handle, mut plain) = deck(backend, config()).unwrap();
    go_live(&mut cued_handle, &mut cued, &program(0.25)).await;
    go_live(&mut plain_handle, &mut plain, &program(0.25)).await;

    let mut with_cue = Player::new(&config());
    let mut without_cue = Player::new(&config());
    with_cue.play(&mut cued, 150);
    without_cue.play(&mut plain, 150);

    // At t = 1.5 the bar phase drops from 0.75 to 0.5 with 1 s bars.
    cued_handle.compile(&program(0.75)).await.unwrap();
    cued_handle.apply_cue().unwrap();
    cued_handle.set_bpm(240.0).unwrap();
    plain_handle.set_bpm(240.0).unwrap();
    let changed = with_cue.reports.len();
    with_cue.play(&mut cued, 60);
    without_cue.play(&mut plain, 60);

    let report = with_cue.reports[changed];
    assert!((report.phase.bar - 0.5005).abs() < 1e-9);
    assert!(!report.bar_wrapped);
    assert!(!report.swapped);
    assert_eq!(cued_handle.cue_status(), CueStatus::Applying);

    let swap = with_cue.first_swap().unwrap();
    assert_eq!(swap, changed + 49);
    let report = with_cue.reports[swap];
    assert!((report.time - 1.9905).abs() < 1e-9);
    assert_eq!(report.frames_before_boundary, 9);

    let boundary = swap * config().buffer_size + report.frames_before_boundary;
    assert_eq!(with_cue.left[..boundary], without_cue.left[..boundary]);
    assert_eq!(with_cue.right[..boundary], without_cue.right[..boundary]);
    assert!(with_cue.left[boundary..].iter().all(|&s| s == 0.75));
}

#[tokio::test]
async fn test_guest_keeps_cue_across_host_clock_snap() {
    let backend = TestBackend::new();
    let (mut host_handle, mut host) = deck(backend, config()).unwrap();
    let (mut guest_handle, mut guest) = guest_deck(&host_handle, config()).unwrap();
    go_live(&mut host_handle, &mut host, &program(0.25)).await;
    go_live(&mut guest_handle, &mut guest, &program(0.25)).await;

    let mut host_player = Player::new(&config());
    let mut guest_player = Player::new(&config());
    for _ in 0..100 {
        host_player.cycle(&mut [&mut host]);
        guest_player.cycle(&mut [&mut guest]);
    }
    guest_handle.compile(&program(0.75)).await.unwrap();
    guest_handle.apply_cue().unwrap();
    host_player.cycle(&mut [&mut host]);
    guest_player.cycle(&mut [&mut guest]);

    host_player.next_index -= 20;
    host_player.offset = 0.0005;
    let snapped = guest_player.reports.len();
    for _ in 0..130 {
        host_player.cycle(&mut [&mut host]);
        guest_player.cycle(&mut [&mut guest]);
    }

    assert_eq!(host.drift_corrections(), 1);
    assert!((guest_player.reports[snapped].time - 0.8105).abs() < 1e-9);
    let swap = guest_player.first_swap().unwrap();
    assert_eq!(swap, snapped + 118);
    assert_eq!(guest_player.reports[swap].frames_before_boundary, 9);
}

#[tokio::test]
async fn test_recompiles_release_retired_programs() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    let mut player = Player::new(&config());

    // Many more displaced cues than the retire queue holds.
    for i in 0..3 * config().command_capacity {
        handle.compile(&program(i as f32)).await.unwrap();
        player.play(&mut deck, 1);
    }
    // Each compile released everything retired before it.
    assert_eq!(handle.collect_retired(), 1);
}

#[tokio::test]
async fn test_wrong_block_size_plays_silence() {
    let backend = TestBackend::new();
    let (mut handle, mut deck) = deck(backend, config()).unwrap();
    go_live(&mut handle, &mut deck, &program(0.5)).await;
    let renders = deck.renders();

    let mut left = vec![1.0; 7];
    let mut right = vec![1.0; 7];
    let report = deck.process_block(0.0, &mut left, &mut right);
    assert_eq!(report.frames, 7);
    assert!(left.iter().chain(&right).all(|&s| s == 0.0));
    assert_eq!(deck.renders(), renders);
}

#[tokio::test]
async fn test_guest_shares_clock_and_registry() {
    let backend = TestBackend::new();
    let (mut host_handle, mut host) = deck(backend, config()).unwrap();
    let (mut guest_handle, mut guest) = guest_deck(&host_handle, config()).unwrap();
    assert!(host_handle.is_host());
    assert!(!guest_handle.is_host());

    host_handle.register_sample("amen", &amen()).unwrap();
    assert!(guest_handle.sample_names().contains("amen"));

    host_handle.compile(&program(0.25)).await.unwrap();
    host_handle.apply_cue().unwrap();
    guest_handle.compile(&program(0.5)).await.unwrap();
    guest_handle.apply_cue().unwrap();

    let mut host_player = Player::new(&config());
    let mut guest_player = Player::new(&config());
    for _ in 0..BLOCKS_PER_BAR + 5 {
        host_player.cycle(&mut [&mut host]);
        guest_player.cycle(&mut [&mut guest]);
    }

    let host_swap = host_player.first_swap().unwrap();
    let guest_swap = guest_player.first_swap().unwrap();
    assert_eq!(host_swap, guest_swap);
    assert_eq!(
        host_player.reports[host_swap].frames_before_boundary,
        guest_player.reports[guest_swap].frames_before_boundary
    );
    assert_eq!(host_player.reports.last().unwrap().time, guest_player.reports.last().unwrap().time);

    // Tempo belongs to the host clock.
    guest_handle.set_bpm(90.0).unwrap();
    assert_eq!(host_handle.bpm(), 90.0);
    assert_eq!(guest_handle.get_time(), host_handle.get_time());

    // Disposing a guest leaves the shared registry alone.
    guest_handle.dispose();
    assert!(host_handle.sample_names().contains("amen"));
    host_handle.dispose();
    assert!(host.clock().bpm() == 90.0);
}

#[test]
fn test_guest_rejects_sample_rate_mismatch() {
    let backend = TestBackend::new();
    let (host_handle, _host) = deck(backend, config()).unwrap();
    let mut other = config();
    other.sample_rate = 48000;
    assert!(matches!(
        guest_deck(&host_handle, other),
        Err(SynthError::InvalidArgument(_))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let backend = TestBackend::new();
    let mut bad = config();
    bad.buffer_size = 7;
    assert!(matches!(deck(backend, bad), Err(SynthError::InvalidArgument(_))));
}

#[test]
fn test_invalid_sample_name_rejected() {
    let backend = TestBackend::new();
    let (handle, _deck) = deck(backend, config()).unwrap();
    assert!(handle.register_sample("not a name", &amen()).is_err());
    assert!(handle.register_sample("", &amen()).is_err());
    assert!(handle.sample_names().is_empty());
}

#[test]
fn test_non_positive_bpm_rejected() {
    let backend = TestBackend::new();
    let (handle, _deck) = deck(backend, config()).unwrap();
    assert!(matches!(handle.set_bpm(0.0), Err(SynthError::InvalidArgument(_))));
    assert!(matches!(handle.set_bpm(-10.0), Err(SynthError::InvalidArgument(_))));
    assert_eq!(handle.bpm(), 120.0);
}

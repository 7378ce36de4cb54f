// Queue navigation and end-of-track behavior, checked across queue shapes

use playdeck::audio::{DeviceEvent, SimulatedControls, SimulatedDevice, Track};
use playdeck::playback::{ControllerOptions, PlaybackController};
use tokio::sync::mpsc::UnboundedReceiver;

struct Rig {
    controller: PlaybackController<SimulatedDevice>,
    events: UnboundedReceiver<DeviceEvent>,
    controls: SimulatedControls,
}

impl Rig {
    fn new() -> Self {
        let device = SimulatedDevice::new();
        let controls = device.controls();
        let (controller, events) = PlaybackController::new(device, ControllerOptions::default());
        Self {
            controller,
            events,
            controls,
        }
    }

    /// Playing `tracks[index]` with `tracks` as the queue.
    fn playing(tracks: &[Track], index: usize) -> Self {
        let mut rig = Self::new();
        rig.controller.play(tracks[index].clone(), tracks.to_vec());
        rig
    }

    fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.controller.handle_device_event(event);
        }
    }

    fn finish_track(&mut self) {
        self.controls.finish();
        self.pump();
    }

    fn index(&self) -> usize {
        self.controller.state().current_index()
    }

    fn current(&self) -> Option<&str> {
        self.controller.state().current_track().map(|t| t.id.as_str())
    }
}

fn tracks(n: usize) -> Vec<Track> {
    (0..n)
        .map(|i| {
            Track::new(
                format!("t{}", i),
                format!("Track {}", i),
                "Artist",
                format!("https://cdn.example/t{}.mp3", i),
            )
        })
        .collect()
}

#[test]
fn next_n_times_returns_to_start() {
    for len in 1..=6 {
        let queue = tracks(len);
        for start in 0..len {
            let mut rig = Rig::playing(&queue, start);
            for _ in 0..len {
                rig.controller.next();
            }
            assert_eq!(rig.index(), start, "len {} start {}", len, start);
            assert_eq!(rig.current(), Some(queue[start].id.as_str()));
        }
    }
}

#[test]
fn previous_undoes_next() {
    for len in 1..=6 {
        let queue = tracks(len);
        for start in 0..len {
            let mut rig = Rig::playing(&queue, start);
            rig.controller.next();
            rig.controller.previous();
            assert_eq!(rig.index(), start, "len {} start {}", len, start);
        }
    }
}

#[test]
fn toggle_without_track_never_plays() {
    let mut rig = Rig::new();
    for _ in 0..3 {
        rig.controller.toggle();
        assert!(!rig.controller.state().is_playing());
    }
    rig.controller.set_volume(0.2);
    rig.controller.toggle_loop();
    rig.controller.toggle();
    assert!(!rig.controller.state().is_playing());
    assert!(rig.controller.state().current_track().is_none());
}

#[test]
fn volume_is_always_clamped() {
    let mut rig = Rig::new();
    let inputs = [
        (-10.0, 0.0),
        (-0.3, 0.0),
        (0.0, 0.0),
        (0.05, 0.05),
        (0.5, 0.5),
        (1.0, 1.0),
        (1.5, 1.0),
        (f32::MAX, 1.0),
        (f32::MIN, 0.0),
    ];
    for (input, expected) in inputs {
        rig.controller.set_volume(input);
        assert_eq!(rig.controller.state().volume(), expected, "input {}", input);
        assert_eq!(rig.controls.volume(), expected);
    }
}

#[test]
fn ended_without_loop_stops_in_place() {
    for len in 1..=4 {
        let queue = tracks(len);
        for start in 0..len {
            for variant in 0..3 {
                let mut rig = Rig::playing(&queue, start);
                rig.controller.toggle_loop();
                match variant {
                    1 => rig.controller.set_volume(0.3),
                    2 => {
                        rig.controller.next();
                        rig.controller.previous();
                    }
                    _ => {}
                }
                rig.finish_track();

                assert!(!rig.controller.state().is_playing());
                assert_eq!(rig.index(), start);
                assert_eq!(rig.current(), Some(queue[start].id.as_str()));
            }
        }
    }
}

#[test]
fn ended_with_loop_matches_next() {
    for len in 1..=5 {
        let queue = tracks(len);
        for start in 0..len {
            let mut ended = Rig::playing(&queue, start);
            ended.finish_track();

            let mut skipped = Rig::playing(&queue, start);
            skipped.controller.next();

            assert_eq!(ended.controller.state(), skipped.controller.state());
            assert!(ended.controller.state().is_playing());
            assert_eq!(ended.controls.loaded_url(), skipped.controls.loaded_url());
            assert!(ended.controls.is_playing());
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Interleaved {
    Volume,
    Loop,
}

fn apply(rig: &mut Rig, command: Interleaved) {
    match command {
        Interleaved::Volume => rig.controller.set_volume(0.4),
        Interleaved::Loop => rig.controller.toggle_loop(),
    }
}

#[test]
fn command_racing_ended_matches_ended_first() {
    for len in 1..=4 {
        let queue = tracks(len);
        for start in 0..len {
            for looping in [true, false] {
                for command in [Interleaved::Volume, Interleaved::Loop] {
                    let setup = |rig: &mut Rig| {
                        if !looping {
                            rig.controller.toggle_loop();
                        }
                    };

                    let mut ended_first = Rig::playing(&queue, start);
                    setup(&mut ended_first);
                    ended_first.controls.finish();
                    ended_first.pump();
                    apply(&mut ended_first, command);

                    let mut raced = Rig::playing(&queue, start);
                    setup(&mut raced);
                    raced.controls.finish();
                    apply(&mut raced, command);
                    raced.pump();

                    let label = format!("len {} start {} looping {} {:?}", len, start, looping, command);
                    assert_eq!(raced.controller.state(), ended_first.controller.state(), "{}", label);
                    assert_eq!(raced.controls.loaded_url(), ended_first.controls.loaded_url(), "{}", label);
                    assert_eq!(raced.controls.is_playing(), ended_first.controls.is_playing(), "{}", label);
                    assert_eq!(
                        raced.controller.state().is_playing(),
                        raced.controls.is_playing(),
                        "{}",
                        label
                    );
                }
            }
        }
    }
}

#[test]
fn skip_racing_ended_drops_the_replaced_track_end() {
    for len in 1..=4 {
        let queue = tracks(len);
        for start in 0..len {
            let mut skipped = Rig::playing(&queue, start);
            skipped.controller.next();

            let mut raced = Rig::playing(&queue, start);
            raced.controls.finish();
            raced.controller.next();
            raced.pump();

            assert_eq!(raced.controller.state(), skipped.controller.state());
            assert_eq!(raced.controls.loaded_url(), skipped.controls.loaded_url());
            assert!(raced.controls.is_playing());
        }
    }
}

#[test]
fn scenario_next_wraps_to_first() {
    let queue = tracks(3);
    let mut rig = Rig::playing(&queue, 2);
    rig.controller.next();
    assert_eq!(rig.index(), 0);
    assert_eq!(rig.current(), Some("t0"));
}

#[test]
fn scenario_previous_wraps_to_last() {
    let queue = tracks(3);
    let mut rig = Rig::playing(&queue, 0);
    rig.controller.previous();
    assert_eq!(rig.index(), 2);
    assert_eq!(rig.current(), Some("t2"));
}

#[test]
fn scenario_track_outside_queue() {
    let queue = tracks(2);
    let outsider = Track::new("d", "D", "Other", "https://cdn.example/d.mp3");
    let mut rig = Rig::new();
    rig.controller.play(outsider, queue.clone());

    let state = rig.controller.state();
    assert_eq!(state.current_index(), 0);
    assert_eq!(rig.current(), Some("d"));
    assert_eq!(state.queue().tracks(), queue.as_slice());
}

#[test]
fn scenario_volume_bounds() {
    let mut rig = Rig::new();
    rig.controller.set_volume(1.5);
    assert_eq!(rig.controller.state().volume(), 1.0);
    rig.controller.set_volume(-0.3);
    assert_eq!(rig.controller.state().volume(), 0.0);
}

#[test]
fn scenario_ended_without_loop() {
    let queue = tracks(3);
    let mut rig = Rig::playing(&queue, 1);
    rig.controller.toggle_loop();
    assert!(rig.controller.state().is_playing());

    rig.finish_track();

    assert!(!rig.controller.state().is_playing());
    assert_eq!(rig.index(), 1);
    assert_eq!(rig.current(), Some("t1"));
}

#[test]
fn scenario_single_track_loop_continues() {
    let queue = tracks(1);
    let mut rig = Rig::playing(&queue, 0);
    let first_binding = rig.controls.current_binding();

    rig.finish_track();

    assert_eq!(rig.index(), 0);
    assert!(rig.controller.state().is_playing());
    assert!(rig.controls.is_playing());
    assert_ne!(rig.controls.current_binding(), first_binding);

    // And again: the fresh binding reaches its own end
    rig.finish_track();
    assert!(rig.controller.state().is_playing());
    assert_eq!(rig.index(), 0);
}

// Waveform rendering tests
//
// Rendering is a pure function of the analysis snapshot, so these tests
// feed synthetic 2048-sample windows and check the exact path.

use std::sync::Arc;
use std::time::Duration;

use live_recorder::audio::{AnalysisTap, WINDOW_SIZE};
use live_recorder::visualizer::{
    render_frame, trace_path, PathCanvas, Visualizer, VisualizerConfig, BACKGROUND,
};

#[test]
fn test_full_window_matches_mapping() {
    let samples: Vec<u8> = (0..WINDOW_SIZE).map(|i| (i % 256) as u8).collect();
    let (width, height) = (1024.0, 256.0);

    let path = trace_path(&samples, width, height);

    assert_eq!(path.len(), WINDOW_SIZE + 1);
    for (i, (point, &s)) in path.iter().zip(samples.iter()).enumerate() {
        let x = i as f32 * (width / WINDOW_SIZE as f32);
        let y = height / 2.0 + (s as f32 / 128.0 - 1.0) * height / 2.0;
        assert_eq!(point.x, x, "x of sample {}", i);
        assert_eq!(point.y, y, "y of sample {}", i);
    }

    let end = path[WINDOW_SIZE];
    assert_eq!((end.x, end.y), (width, height / 2.0));
}

#[test]
fn test_silence_is_a_flat_line() {
    let canvas = PathCanvas::new(200.0, 80.0);
    render_frame(&[128u8; WINDOW_SIZE], &canvas);

    assert_eq!(canvas.background(), Some(BACKGROUND));
    assert!(canvas.last_path().iter().all(|p| p.y == 40.0));
}

#[test]
fn test_each_frame_replaces_the_last() {
    let canvas = PathCanvas::new(100.0, 100.0);
    render_frame(&[0u8; 8], &canvas);
    render_frame(&[255u8; 4], &canvas);

    assert_eq!(canvas.frames(), 2);
    assert_eq!(canvas.last_path().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_loop_redraws_until_stopped() {
    let mut tap = AnalysisTap::new();
    let canvas = PathCanvas::new(100.0, 100.0);
    let mut visualizer = Visualizer::new(&VisualizerConfig { refresh_hz: 50 });

    visualizer.start(tap.handle(), Arc::new(canvas.clone()));
    tokio::time::sleep(Duration::from_millis(110)).await;
    assert_eq!(canvas.frames(), 5);

    tap.push(&[i16::MIN], 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(canvas.last_path()[WINDOW_SIZE - 1].y, 0.0);

    visualizer.stop();
    let frames = canvas.frames();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(canvas.frames(), frames);
    assert!(!visualizer.is_running());
}

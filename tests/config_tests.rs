// Configuration layering tests
//
// Environment overrides are process-wide, so they live in their own test
// binary rather than next to the file-only tests in `config.rs`.

use anyhow::Result;
use live_recorder::config::{Config, ENV_PREFIX};

#[test]
fn test_environment_overrides_file_and_defaults() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("recorder.toml");
    std::fs::write(&path, "[audio]\ngain = 0.5\nchannels = 1\n")?;

    let gain_key = format!("{}__AUDIO__GAIN", ENV_PREFIX);
    let timeslice_key = format!("{}__ENCODER__TIMESLICE_MS", ENV_PREFIX);
    std::env::set_var(&gain_key, "0.25");
    std::env::set_var(&timeslice_key, "300");

    let loaded = Config::load(path.to_str().unwrap());

    std::env::remove_var(&gain_key);
    std::env::remove_var(&timeslice_key);

    let session = loaded?.session_config();
    assert_eq!(session.initial_gain, 0.25, "env should win over the file");
    assert_eq!(session.timeslice_ms, 300, "env should win over the default");
    assert_eq!(session.constraints.channels, 1, "file value without env override");
    assert_eq!(session.constraints.sample_rate, 44100);

    Ok(())
}

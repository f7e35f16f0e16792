// Integration tests for the client configuration blob and the simulated engine

mod common;

use anyhow::Result;
use asr_client::engine::profile::declared_profiles;
use asr_client::engine::simulated::MIN_REALTIME_RATE;
use asr_client::engine::{ClientProfile, EngineError, ExtraParams};
use asr_client::{AsrEngine, SimulatedEngine, SimulatedEngineConfig};
use common::write_wav;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn engine_at(root: &Path, realtime_rate: f64) -> Result<SimulatedEngine> {
    SimulatedEngine::create(SimulatedEngineConfig {
        root_dir: root.to_path_buf(),
        client_config: None,
        realtime_rate,
    })
}

#[test]
fn test_extra_params_defaults() {
    let params = ExtraParams::parse("");
    assert_eq!(params, ExtraParams::default());
    assert_eq!(params.n, "1");
    assert_eq!(params.client_port, "8062");
    assert_eq!(params.client_rtp_port_min, "4000");
    assert_eq!(params.client_rtp_port_max, "5000");
    assert_eq!(params.server_ip, "auto");
    assert_eq!(params.server_port, "8060");
}

#[test]
fn test_extra_params_overrides() {
    let params = ExtraParams::parse(
        "n=7, client_port=9000,client_rtp_port_min=6000,client_rtp_port_max=6100,server_ip=192.168.1.10,server_port=5060",
    );

    assert_eq!(params.n, "7");
    assert_eq!(params.client_port, "9000");
    assert_eq!(params.client_rtp_port_min, "6000");
    assert_eq!(params.client_rtp_port_max, "6100");
    assert_eq!(params.server_ip, "192.168.1.10");
    assert_eq!(params.server_port, "5060");
}

#[test]
fn test_extra_params_ignores_noise() {
    let params = ExtraParams::parse("bogus=1,,server_port,n=2,n=3");
    assert_eq!(params.n, "3", "Later keys win");
    assert_eq!(params.server_port, "8060");
}

#[test]
fn test_profile_render_uses_suffix_and_ports() {
    let profile = ClientProfile::new(ExtraParams::parse("n=4,client_port=8100,server_port=8070"));
    let blob = profile.render();

    assert!(blob.starts_with("<?xml"));
    for id in ["SIP-Agent-4", "RTSP-Agent-4", "MRCPv2-Agent-4", "Media-Engine-4", "RTP-Factory-4", "RTP-Settings-4"] {
        assert!(blob.contains(id), "missing {}", id);
    }
    assert!(blob.contains("<sip-port>8100</sip-port>"));
    assert!(blob.contains("<server-port>8070</server-port>"));
    assert!(blob.contains("<rtp-port-min>4000</rtp-port-min>"));
    assert_eq!(declared_profiles(&blob), vec!["uni2".to_string()]);
}

#[test]
fn test_declared_profiles_lists_every_id() {
    let blob = r#"<profiles><mrcpv2-profile id="a"/><mrcpv2-profile id="b"></mrcpv2-profile></profiles>"#;
    assert_eq!(declared_profiles(blob), vec!["a".to_string(), "b".to_string()]);
    assert!(declared_profiles("<profiles/>").is_empty());
}

#[test]
fn test_declared_profiles_skips_comments_and_reads_single_quotes() {
    let blob = r#"<profiles><!-- <mrcpv2-profile id="retired"> --><mrcpv2-profile id='lab'></mrcpv2-profile></profiles>"#;
    assert_eq!(declared_profiles(blob), vec!["lab".to_string()]);
}

#[test]
fn test_profile_render_escapes_parameter_values() {
    let blob = ClientProfile::new(ExtraParams::parse("n=1\"><x,server_ip=a&b")).render();

    assert!(blob.contains(r#"<sip-uac id="SIP-Agent-1&quot;&gt;&lt;x" type="SofiaSIP">"#));
    assert!(blob.contains("<server-ip>a&amp;b</server-ip>"));

    let mut reader = quick_xml::Reader::from_str(&blob);
    loop {
        match reader.read_event() {
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("Rendered blob is not well-formed: {}", e),
        }
    }
    assert_eq!(declared_profiles(&blob), vec!["uni2".to_string()]);
}

#[test]
fn test_simulated_engine_resolves_data_paths() -> Result<()> {
    let engine = engine_at(Path::new("/srv/asr"), 0.0)?;

    assert_eq!(engine.data_path(Path::new("audio")), PathBuf::from("/srv/asr/data/audio"));
    assert_eq!(engine.data_path(Path::new("/tmp/x.wav")), PathBuf::from("/tmp/x.wav"));
    assert_eq!(engine.name(), "simulated");

    Ok(())
}

#[test]
fn test_simulated_engine_recognizes_wav() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let audio = temp_dir.path().join("hello-world.wav");
    write_wav(&audio, 8000, 100)?;

    let engine = engine_at(temp_dir.path(), 0.0)?;
    let mut session = engine.create_session("uni2")?;
    assert_eq!(engine.open_sessions(), 1);

    let result = session.recognize_file("grammar.xml", &audio, None)?;
    assert!(result.contains("<instance>hello-world</instance>"));
    assert!(result.contains("grammar=\"grammar.xml\""));

    session.destroy();
    assert_eq!(engine.open_sessions(), 0);

    Ok(())
}

#[test]
fn test_simulated_engine_paces_at_realtime_rate() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let audio = temp_dir.path().join("half.wav");
    write_wav(&audio, 8000, 200)?;

    // 200ms of audio at 2x speed takes about 100ms
    let engine = engine_at(temp_dir.path(), 2.0)?;
    let mut session = engine.create_session("uni2")?;

    let started = Instant::now();
    session.recognize_file("grammar.xml", &audio, None)?;
    assert!(started.elapsed() >= Duration::from_millis(90));
    session.destroy();

    Ok(())
}

#[test]
fn test_simulated_engine_rejects_unknown_profile() -> Result<()> {
    let engine = engine_at(Path::new("."), 0.0)?;

    let result = engine.create_session("nope");
    assert!(matches!(result, Err(EngineError::SessionCreate(ref p)) if p == "nope"));
    assert_eq!(engine.open_sessions(), 0);

    Ok(())
}

#[test]
fn test_simulated_engine_accepts_profiles_from_blob() -> Result<()> {
    let engine = SimulatedEngine::create(SimulatedEngineConfig {
        root_dir: PathBuf::from("."),
        client_config: Some(r#"<mrcpv2-profile id="lab"></mrcpv2-profile>"#.to_string()),
        realtime_rate: 0.0,
    })?;

    assert_eq!(engine.profiles(), &["uni2".to_string(), "lab".to_string()]);
    engine.create_session("lab")?.destroy();

    Ok(())
}

#[test]
fn test_simulated_engine_recognition_errors() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let not_audio = temp_dir.path().join("broken.wav");
    std::fs::write(&not_audio, b"not a wav file")?;

    let engine = engine_at(temp_dir.path(), 0.0)?;
    let mut session = engine.create_session("uni2")?;

    let err = session
        .recognize_file("grammar.xml", &not_audio, None)
        .expect_err("Garbage input must fail");
    assert!(matches!(err, EngineError::Recognize { ref path, .. } if path == &not_audio));

    let audio = temp_dir.path().join("ok.wav");
    write_wav(&audio, 8000, 10)?;
    let missing_params = temp_dir.path().join("params.txt");
    assert!(session
        .recognize_file("grammar.xml", &audio, Some(&missing_params))
        .is_err());

    session.destroy();
    Ok(())
}

#[test]
fn test_simulated_engine_shutdown() -> Result<()> {
    let engine = engine_at(Path::new("."), 0.0)?;
    engine.shutdown();
    engine.shutdown();

    assert!(engine.create_session("uni2").is_err());
    Ok(())
}

#[test]
fn test_simulated_engine_rejects_unusable_rates() {
    assert!(engine_at(Path::new("."), -1.0).is_err());
    assert!(engine_at(Path::new("."), 1e-300).is_err());
    assert!(engine_at(Path::new("."), f64::INFINITY).is_err());
    assert!(engine_at(Path::new("."), MIN_REALTIME_RATE).is_ok());
}

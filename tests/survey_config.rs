use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::Builder;

use asset_survey::config::SurveyConfig;
use asset_survey::SourceLocation;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SURVEY_CONFIG",
        "SURVEY_ANNOTATIONS",
        "SURVEY_TRACK_DIR",
        "SURVEY_CATEGORY",
        "SURVEY_FRAME_DIR",
        "SURVEY_VIDEO_DURATION_S",
        "SURVEY_FRAME_RATE",
        "SURVEY_CONFIDENCE_SEED",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".json").tempfile().expect("temp config");
    let json = r#"{
        "annotations": "exports/project-3.json",
        "track_dir": "https://cdn.example.com/gpx",
        "category": "barriers",
        "confidence_seed": 11,
        "video": {
            "default_duration_s": 90.0,
            "frame_rate": 25.0,
            "durations": { "survey_0412": 125.5 }
        },
        "frames": { "dir": "frames", "max_entries": 16, "max_bytes": 1048576 }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("SURVEY_CONFIG", file.path());
    std::env::set_var("SURVEY_CATEGORY", "signage");
    std::env::set_var("SURVEY_VIDEO_DURATION_S", "45");

    let cfg = SurveyConfig::load().expect("load config");

    assert_eq!(
        cfg.annotations,
        SourceLocation::File(PathBuf::from("exports/project-3.json"))
    );
    assert_eq!(
        cfg.track_dir,
        SourceLocation::Http("https://cdn.example.com/gpx".to_string())
    );
    assert_eq!(cfg.category, "signage");
    assert_eq!(cfg.confidence_seed, Some(11));
    assert_eq!(cfg.video.default_duration_s, 45.0);
    assert_eq!(cfg.video.frame_rate, 25.0);
    assert_eq!(cfg.video.duration_for("survey_0412"), 125.5);
    assert_eq!(cfg.video.duration_for("survey_0413"), 45.0);
    assert_eq!(cfg.frames.dir, Some(SourceLocation::File(PathBuf::from("frames"))));
    assert_eq!(cfg.frames.max_entries, 16);
    assert_eq!(cfg.frames.max_bytes, 1_048_576);

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new().suffix(".toml").tempfile().expect("temp config");
    let toml = r#"
        track_dir = "/srv/survey/gpx"

        [video]
        default_duration_s = 300.0
    "#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("SURVEY_CONFIG", file.path());
    std::env::set_var("SURVEY_CONFIDENCE_SEED", "99");

    let cfg = SurveyConfig::load().expect("load config");
    assert_eq!(cfg.track_dir, SourceLocation::File(PathBuf::from("/srv/survey/gpx")));
    assert_eq!(cfg.video.default_duration_s, 300.0);
    assert_eq!(cfg.video.frame_rate, 30.0);
    assert_eq!(cfg.category, "road-asset");
    assert_eq!(cfg.confidence_seed, Some(99));
    assert_eq!(cfg.frames.dir, None);

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SurveyConfig::load().expect("load config");
    assert_eq!(cfg.annotations, SourceLocation::File(PathBuf::from("annotations.json")));
    assert_eq!(cfg.track_dir, SourceLocation::File(PathBuf::from("gpx")));
    assert_eq!(cfg.video.default_duration_s, 60.0);
    assert_eq!(cfg.confidence_seed, None);
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SURVEY_FRAME_RATE", "fast");
    let err = SurveyConfig::load().unwrap_err();
    assert!(err.to_string().contains("SURVEY_FRAME_RATE"));
    clear_env();

    std::env::set_var("SURVEY_VIDEO_DURATION_S", "-5");
    assert!(SurveyConfig::load().is_err());
    clear_env();

    std::env::set_var("SURVEY_TRACK_DIR", "ftp://host/gpx");
    let err = SurveyConfig::load().unwrap_err();
    assert!(err.to_string().contains("unsupported source scheme"));
    clear_env();
}

#[test]
fn rejects_missing_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SURVEY_CONFIG", "/nonexistent/survey.json");
    let err = SurveyConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}

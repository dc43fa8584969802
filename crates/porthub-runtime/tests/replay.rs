use porthub_core::RegistryConfig;
use porthub_runtime::RegistryActor;
use porthub_runtime::replay::{self, Scenario};
use std::fs;
use std::path::PathBuf;

fn scenarios_dir() -> PathBuf {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../fixtures/scenarios")
}

async fn load_scenarios() -> Vec<(PathBuf, Scenario)> {
    let dir = scenarios_dir();
    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("failed to read {dir:?}: {e}"))
        .map(|entry| entry.expect("dir entry").path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    let mut scenarios = Vec::new();
    for path in paths {
        let scenario = Scenario::load(&path)
            .await
            .unwrap_or_else(|e| panic!("failed to load scenario {path:?}: {e}"));
        scenarios.push((path, scenario));
    }
    scenarios
}

#[tokio::test]
async fn test_all_scenarios() {
    let scenarios = load_scenarios().await;
    assert!(!scenarios.is_empty(), "no scenarios found in {:?}", scenarios_dir());

    for (path, scenario) in &scenarios {
        assert!(
            scenario.expect.is_some(),
            "scenario {path:?} has no expectations"
        );
        // fresh registry per scenario
        let (handle, join) = RegistryActor::spawn(&RegistryConfig::default()).expect("spawn");
        let report = replay::run(&handle, scenario)
            .await
            .unwrap_or_else(|e| panic!("scenario {path:?} failed: {e}"));
        assert_eq!(report.scenario, scenario.name);

        handle.shutdown().await.expect("shutdown");
        join.await.expect("actor task");
    }
}

#[tokio::test]
async fn replay_with_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("porthub.toml");
    fs::write(
        &config_path,
        r#"
[[pages]]
context = "devtools"
file = "popup.html"
"#,
    )
    .expect("write config");
    let config = RegistryConfig::load(&config_path).expect("load config");

    let scenarios = load_scenarios().await;
    let (_, popup) = scenarios
        .iter()
        .find(|(_, s)| s.name == "popup merge")
        .expect("popup scenario fixture");
    let mut scenario = popup.clone();
    scenario.expect = None;

    let (handle, _join) = RegistryActor::spawn(&config).expect("spawn");
    let report = replay::run(&handle, &scenario).await.expect("replay");

    // explicit pages lead the tie-break order
    assert_eq!(report.agents.len(), 1);
    assert_eq!(report.agents[0].key.context, porthub_core::Context::Devtools);
}

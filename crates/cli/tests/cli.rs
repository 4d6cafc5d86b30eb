use assert_cmd::Command;

#[test]
fn openapi_lists_every_route() {
    let output = Command::cargo_bin("turfbook-cli")
        .unwrap()
        .env("TURFBOOK_ENV", "local")
        .arg("openapi")
        .output()
        .unwrap();

    assert!(output.status.success());
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    for path in ["/turfs", "/getallturfs", "/searchTurfs", "/booking", "/availability", "/contact", "/healthz"] {
        assert!(document["paths"][path].is_object(), "missing {path}");
    }
}

#[test]
fn settings_reflect_environment_overrides() {
    let output = Command::cargo_bin("turfbook-cli")
        .unwrap()
        .env("TURFBOOK_ENV", "staging")
        .env("TURFBOOK_SERVER__PORT", "9191")
        .arg("settings")
        .output()
        .unwrap();

    assert!(output.status.success());
    let settings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings["environment"], "staging");
    assert_eq!(settings["server"]["port"], 9191);
}

#[test]
fn unknown_environment_fails() {
    Command::cargo_bin("turfbook-cli")
        .unwrap()
        .env("TURFBOOK_ENV", "moon")
        .arg("settings")
        .assert()
        .failure();
}

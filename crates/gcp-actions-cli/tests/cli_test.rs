use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// The binary run from an empty directory with no runner or input
/// variables inherited from the host.
fn gcp_actions(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("gcp-actions");
    cmd.current_dir(dir.path()).env_clear();
    cmd
}

// ── Help / Version ──

#[test]
fn help_lists_every_action() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("setup-gcloud"))
        .stdout(predicate::str::contains("deploy-appengine"))
        .stdout(predicate::str::contains("deploy-cloudrun"))
        .stdout(predicate::str::contains("deploy-cloud-function"))
        .stdout(predicate::str::contains("delete-cloud-function"))
        .stdout(predicate::str::contains("upload-cloud-storage"))
        .stdout(predicate::str::contains("get-gke-credentials"))
        .stdout(predicate::str::contains("get-secretmanager-secrets"))
        .stdout(predicate::str::contains("get-iap-token"))
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn shows_version() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gcp-actions"));
}

#[test]
fn help_names_the_action_input_variables() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args(["deploy-appengine", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("INPUT_IMAGE-URL"));

    gcp_actions(&tmp)
        .args(["get-iap-token", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("INPUT_IAP_OAUTH_CLIENT_ID"))
        .stdout(predicate::str::contains("INPUT_SERVICE_ACCOUNT_KEY"));
}

#[test]
fn missing_required_input_is_a_usage_error() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .arg("get-gke-credentials")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--cluster-name"));
}

#[test]
fn cloudrun_needs_an_image_and_service_or_metadata() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args(["deploy-cloudrun", "--service", "api"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"))
        .stderr(predicate::str::contains("Provide image and service names or a YAML file"));
}

#[test]
fn cloudrun_metadata_excludes_image_and_env_vars() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("service.yaml"), "kind: Service\n").unwrap();

    gcp_actions(&tmp)
        .args(["deploy-cloudrun", "--metadata", "service.yaml", "--image", "gcr.io/p/api:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"));

    gcp_actions(&tmp)
        .arg("deploy-cloudrun")
        .env("INPUT_METADATA", "service.yaml")
        .env("INPUT_ENV_VARS", "FOO=bar")
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"));
}

#[test]
fn cloudrun_metadata_file_must_exist() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args(["deploy-cloudrun", "--metadata", "missing.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"))
        .stderr(predicate::str::contains("missing.yaml"));
}

// ── Input validation happens before gcloud is touched ──

#[test]
fn bad_secret_reference_fails_on_input() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args(["get-secretmanager-secrets", "--secrets", "no-destination"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"))
        .stderr(predicate::str::contains("missing destination"));
}

#[test]
fn inputs_are_read_from_action_environment() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .arg("get-secretmanager-secrets")
        .env("INPUT_SECRETS", "token:a/b/c/d/e")
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"))
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn incomplete_event_trigger_is_rejected() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args([
            "deploy-cloud-function",
            "--name",
            "hello",
            "--runtime",
            "nodejs20",
            "--event-trigger-type",
            "google.pubsub.topic.publish",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"))
        .stderr(predicate::str::contains("event_trigger_resource are required"));
}

#[test]
fn malformed_env_vars_are_rejected() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args([
            "deploy-cloudrun",
            "--service",
            "api",
            "--image",
            "gcr.io/p/api:1",
            "--env-vars",
            "FOO",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"))
        .stderr(predicate::str::contains("KEY1=VALUE1"));
}

#[test]
fn blank_deliverables_are_rejected() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args(["deploy-appengine", "--deliverables", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"));
}

#[test]
fn invalid_config_file_fails_on_input() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("gcp-actions.toml"), "[poll\ninterval_secs = ").unwrap();

    gcp_actions(&tmp)
        .args(["deploy-cloudrun", "--service", "api", "--image", "img"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"))
        .stderr(predicate::str::contains("gcp-actions.toml"));
}

#[test]
fn missing_upload_path_fails_on_input() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args([
            "upload-cloud-storage",
            "--path",
            "does-not-exist",
            "--destination",
            "my-bucket/prefix",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("input step failed"));
}

#[test]
fn gke_credentials_need_a_workspace() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args(["get-gke-credentials", "--cluster-name", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITHUB_WORKSPACE"));
}

#[test]
fn invalid_iap_key_fails_on_auth() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args([
            "get-iap-token",
            "--service-account-key",
            "{not json",
            "--iap-oauth-client-id",
            "1234.apps.googleusercontent.com",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("auth step failed"));
}

#[test]
fn iap_inputs_use_action_input_names() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .arg("get-iap-token")
        .env("INPUT_IAP_OAUTH_CLIENT_ID", "1234.apps.googleusercontent.com")
        .env("INPUT_SERVICE_ACCOUNT_KEY", "{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("auth step failed"));
}

#[test]
fn legacy_iap_flag_names_still_parse() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args([
            "get-iap-token",
            "--credentials",
            "{not json",
            "--oauth-client-id",
            "1234.apps.googleusercontent.com",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("auth step failed"));
}

#[test]
fn iap_token_without_any_credentials_fails() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args(["get-iap-token", "--iap-oauth-client-id", "1234.apps.googleusercontent.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_APPLICATION_CREDENTIALS"));
}

// ── Setup ──

#[test]
fn setup_with_system_gcloud_warns_and_exports_metrics() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args(["setup-gcloud", "--skip-install", "true", "--version", "400.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "::warning::Ignoring \"version\" because \"skip_install\" was true!",
        ))
        .stdout(predicate::str::contains("The gcloud CLI is not authenticated"))
        .stdout(predicate::str::contains(
            "CLOUDSDK_METRICS_ENVIRONMENT=github-actions-setup-gcloud",
        ))
        .stdout(predicate::str::contains("CLOUDSDK_METRICS_ENVIRONMENT_VERSION="));
}

#[test]
fn setup_with_missing_auth_credentials_file_fails_on_auth() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp)
        .args(["setup-gcloud", "--skip-install", "true"])
        .env("GOOGLE_GHA_CREDS_PATH", tmp.path().join("gha-creds-gone.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("auth step failed"))
        .stderr(predicate::str::contains("does not exist"));
}

// ── Cleanup ──

#[test]
fn cleanup_removes_exported_credentials() {
    let tmp = TempDir::new().unwrap();
    let creds = tmp.path().join("gha-creds-test.json");
    std::fs::write(&creds, "{}").unwrap();

    gcp_actions(&tmp)
        .arg("cleanup")
        .env("GOOGLE_GHA_CREDS_PATH", &creds)
        .assert()
        .success();

    assert!(!creds.exists());
}

#[test]
fn cleanup_without_exported_credentials_is_a_no_op() {
    let tmp = TempDir::new().unwrap();
    gcp_actions(&tmp).arg("cleanup").assert().success();

    gcp_actions(&tmp)
        .args(["cleanup", "--credentials-path"])
        .arg(tmp.path().join("already-gone.json"))
        .assert()
        .success();
}

use std::path::Path;
use std::sync::{Arc, Mutex};

use gcp_actions_cloud::client::GcloudClient;
use gcp_actions_cloud::executor::{CommandOutput, GcloudExecutor};
use gcp_actions_cloud::gcloud::GcloudError;
use gcp_actions_cloud::upload::{Destination, PlanError, plan_upload, upload_all};
use mockall::mock;
use tempfile::TempDir;

mock! {
    Executor {}

    impl GcloudExecutor for Executor {
        async fn exec(&self, args: &[String]) -> Result<String, GcloudError>;
        async fn exec_streaming(&self, args: &[String]) -> Result<(), GcloudError>;
        async fn exec_with_stdin(
            &self,
            args: &[String],
            stdin_data: &[u8],
        ) -> Result<String, GcloudError>;
        async fn exec_capture(&self, args: &[String]) -> Result<CommandOutput, GcloudError>;
    }
}

fn site() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let public = tmp.path().join("public");
    std::fs::create_dir_all(public.join("css")).unwrap();
    std::fs::write(public.join("index.html"), "<html></html>").unwrap();
    std::fs::write(public.join("css/site.css"), "body {}").unwrap();
    tmp
}

fn objects(dest: &Destination, path: &std::path::Path) -> Vec<String> {
    plan_upload(path, dest)
        .unwrap()
        .into_iter()
        .map(|p| p.object)
        .collect()
}

#[test]
fn single_file_uses_base_name() {
    let tmp = site();
    let file = tmp.path().join("public/index.html");

    let bare = Destination::parse("my-bucket").unwrap();
    assert_eq!(objects(&bare, &file), vec!["index.html"]);

    let prefixed = Destination::parse("my-bucket/releases").unwrap();
    assert_eq!(objects(&prefixed, &file), vec!["releases/index.html"]);
}

#[test]
fn directory_keeps_its_own_name() {
    let tmp = site();
    let dir = tmp.path().join("public");

    let bare = Destination::parse("my-bucket").unwrap();
    assert_eq!(
        objects(&bare, &dir),
        vec!["public/css/site.css", "public/index.html"]
    );

    let prefixed = Destination::parse("my-bucket/v2").unwrap();
    assert_eq!(
        objects(&prefixed, &dir),
        vec!["v2/public/css/site.css", "v2/public/index.html"]
    );
}

#[test]
fn dot_uploads_directory_contents() {
    let tmp = site();
    let dest = Destination::parse("my-bucket/pre").unwrap();

    let dotted = tmp.path().join("public").join(".");
    assert_eq!(
        objects(&dest, &dotted),
        vec!["pre/css/site.css", "pre/index.html"]
    );
}

#[test]
fn working_directory_as_dot() {
    let tmp = site();
    std::env::set_current_dir(tmp.path().join("public")).unwrap();
    let dest = Destination::parse("my-bucket/pre").unwrap();

    let planned = plan_upload(Path::new("."), &dest).unwrap();
    let names: Vec<&str> = planned.iter().map(|p| p.object.as_str()).collect();
    assert_eq!(names, vec!["pre/css/site.css", "pre/index.html"]);
}

#[test]
fn missing_path_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let dest = Destination::parse("my-bucket").unwrap();
    let result = plan_upload(&tmp.path().join("nope"), &dest);
    assert!(matches!(result, Err(PlanError::Stat { .. })));
}

#[tokio::test]
async fn uploads_every_planned_file() {
    let tmp = site();
    let dest = Destination::parse("my-bucket/v2").unwrap();
    let planned = plan_upload(&tmp.path().join("public"), &dest).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| args.starts_with(&["storage".to_owned(), "cp".to_owned()]))
        .times(2)
        .returning(move |args| {
            recorder.lock().unwrap().push(args[3].clone());
            Ok(String::new())
        });

    let client = GcloudClient::with_executor(mock);
    let uploaded = upload_all(&client, &dest, &planned, true).await.unwrap();

    assert_eq!(uploaded, vec!["v2/public/css/site.css", "v2/public/index.html"]);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "gs://my-bucket/v2/public/css/site.css",
            "gs://my-bucket/v2/public/index.html"
        ]
    );
}

#[tokio::test]
async fn stops_at_first_failed_copy() {
    let tmp = site();
    let dest = Destination::parse("my-bucket").unwrap();
    let planned = plan_upload(&tmp.path().join("public"), &dest).unwrap();

    let mut mock = MockExecutor::new();
    mock.expect_exec().times(1).returning(|_| {
        Err(GcloudError::CommandFailed {
            args: vec![],
            stderr: "AccessDeniedException: 403".to_owned(),
        })
    });

    let client = GcloudClient::with_executor(mock);
    let result = upload_all(&client, &dest, &planned, false).await;
    assert!(result.is_err());
}

use aur_mirror::config::Token;
use aur_mirror::contract::{GitHub, NewRelease, Release};
use aur_mirror::error::MirrorError;
use aur_mirror::github::GitHubClient;
use mockito::{Matcher, Server};
use serde_json::json;

fn client(server: &Server) -> GitHubClient {
    GitHubClient::new(&server.url(), Token("test-token".to_string())).expect("client")
}

#[tokio::test]
async fn missing_tag_ref_is_reported_absent() {
    let mut server = Server::new_async().await;
    let missing = server
        .mock("GET", "/repos/arjix-aur/pkg-foo/git/ref/tags/aur/1.0-1")
        .match_header("authorization", "Bearer test-token")
        .match_header("x-github-api-version", "2022-11-28")
        .with_status(404)
        .with_body(r#"{"message":"Not Found"}"#)
        .create_async()
        .await;
    let present = server
        .mock("GET", "/repos/arjix-aur/pkg-foo/git/ref/tags/aur/1.1-1")
        .with_status(200)
        .with_body(r#"{"ref":"refs/tags/aur/1.1-1"}"#)
        .create_async()
        .await;

    let github = client(&server);
    assert!(!github.tag_exists("arjix-aur", "pkg-foo", "aur/1.0-1").await.unwrap());
    assert!(github.tag_exists("arjix-aur", "pkg-foo", "aur/1.1-1").await.unwrap());
    missing.assert_async().await;
    present.assert_async().await;
}

#[tokio::test]
async fn tag_lookup_server_error_is_fatal() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/arjix-aur/pkg-foo/git/ref/tags/aur/1.0-1")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let err = client(&server)
        .tag_exists("arjix-aur", "pkg-foo", "aur/1.0-1")
        .await
        .unwrap_err();
    assert!(matches!(err, MirrorError::Api { status: 500, .. }), "got: {err}");
}

#[tokio::test]
async fn missing_release_by_tag_is_none() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/arjix-aur/repository/releases/tags/latest")
        .with_status(404)
        .with_body(r#"{"message":"Not Found"}"#)
        .create_async()
        .await;

    let release = client(&server)
        .get_release_by_tag("arjix-aur", "repository", "latest")
        .await
        .unwrap();
    assert!(release.is_none());
}

#[tokio::test]
async fn release_creation_requires_created_status() {
    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/repos/arjix-aur/pkg-foo/releases")
        .match_body(Matcher::PartialJson(json!({
            "tag_name": "aur/1.0-1",
            "name": "aur/1.0-1",
            "target_commitish": "main",
            "draft": false,
            "prerelease": false
        })))
        .with_status(422)
        .with_body(r#"{"message":"Validation Failed"}"#)
        .create_async()
        .await;

    let err = client(&server)
        .create_release("arjix-aur", "pkg-foo", NewRelease::for_tag("aur/1.0-1", "main"))
        .await
        .unwrap_err();
    create.assert_async().await;
    match err {
        MirrorError::ReleaseCreation { repo, tag, detail } => {
            assert_eq!(repo, "arjix-aur/pkg-foo");
            assert_eq!(tag, "aur/1.0-1");
            assert!(detail.contains("422"), "got: {detail}");
        }
        other => panic!("expected ReleaseCreation, got {other}"),
    }
}

#[tokio::test]
async fn org_repos_are_paged_until_a_short_page() {
    let mut server = Server::new_async().await;
    let full: Vec<_> = (0..100)
        .map(|i| json!({"name": format!("pkg-{i}"), "topics": ["pkg"]}))
        .collect();
    let first = server
        .mock("GET", "/orgs/arjix-aur/repos")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "100".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
        ]))
        .with_status(200)
        .with_body(serde_json::to_string(&full).unwrap())
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/orgs/arjix-aur/repos")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "100".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(json!([{"name": "pkg-last"}]).to_string())
        .expect(1)
        .create_async()
        .await;
    let third = server
        .mock("GET", "/orgs/arjix-aur/repos")
        .match_query(Matcher::UrlEncoded("page".into(), "3".into()))
        .expect(0)
        .create_async()
        .await;

    let repos = client(&server).list_org_repos("arjix-aur").await.unwrap();
    assert_eq!(repos.len(), 101);
    assert_eq!(repos[100].name, "pkg-last");
    assert!(repos[100].topics.is_empty());
    first.assert_async().await;
    second.assert_async().await;
    third.assert_async().await;
}

#[tokio::test]
async fn upload_posts_to_stripped_upload_url() {
    let mut server = Server::new_async().await;
    let upload = server
        .mock("POST", "/repos/arjix-aur/repository/releases/1/assets")
        .match_query(Matcher::UrlEncoded(
            "name".into(),
            "foo-1.0-1-any.pkg.tar.zst".into(),
        ))
        .match_header("content-type", "application/octet-stream")
        .match_body("package bytes")
        .with_status(201)
        .with_body(
            json!({
                "id": 42,
                "name": "foo-1.0-1-any.pkg.tar.zst",
                "browser_download_url": "https://example.test/foo-1.0-1-any.pkg.tar.zst"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foo-1.0-1-any.pkg.tar.zst");
    std::fs::write(&path, "package bytes").unwrap();
    let release = Release {
        id: 1,
        tag_name: "latest".to_string(),
        upload_url: format!(
            "{}/repos/arjix-aur/repository/releases/1/assets{{?name,label}}",
            server.url()
        ),
        assets: vec![],
    };

    let asset = client(&server)
        .upload_asset(&release, &path, "foo-1.0-1-any.pkg.tar.zst")
        .await
        .unwrap();
    upload.assert_async().await;
    assert_eq!(asset.id, 42);
    assert_eq!(asset.name, "foo-1.0-1-any.pkg.tar.zst");
}

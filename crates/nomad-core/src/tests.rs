use std::cmp::Ordering;

use super::*;

fn version(input: &str) -> Version {
    Version::parse(input).expect("version must parse")
}

#[test]
fn parse_four_component_version_keeps_text() {
    let parsed = version("1.2.10.6");
    assert_eq!(parsed.to_string(), "1.2.10.6");
    assert_eq!(parsed.major(), Some(1));
    assert_eq!(parsed.minor(), Some(2));
    assert_eq!(parsed.patch(), Some(10));
    assert_eq!(parsed.patch2(), Some(6));
    assert_eq!(parsed.prerelease(), "");
    assert_eq!(parsed.build(), "");
}

#[test]
fn parse_ignores_surrounding_noise() {
    let parsed = version("hello1.2.3bob");
    assert_eq!(parsed.as_str(), "1.2.3");
    assert_eq!(parsed.patch2(), None);
}

#[test]
fn parse_keeps_missing_components_absent() {
    let parsed = version("v7");
    assert_eq!(parsed.major(), Some(7));
    assert_eq!(parsed.minor(), None);
    assert_eq!(parsed.patch(), None);
}

#[test]
fn parse_dotted_prerelease_and_build() {
    let parsed = version("2.39.2.windows.1");
    assert_eq!(parsed.as_str(), "2.39.2.windows.1");
    assert_eq!(parsed.patch(), Some(2));
    assert_eq!(parsed.patch2(), None);
    assert_eq!(parsed.prerelease(), "windows.1");

    let parsed = version("1.0.0-rc.1+build.5");
    assert_eq!(parsed.prerelease(), "rc.1");
    assert_eq!(parsed.build(), "build.5");
}

#[test]
fn parse_with_custom_pattern_reads_json_payload() {
    let pattern =
        VersionPattern::new(r#""tag_name":\s*"v{{VERSION}}""#).expect("pattern must compile");
    let body = r#"{"id": 12, "tag_name": "v2.5.0", "name": "Release 2.5.0"}"#;
    assert_eq!(pattern.parse(body).expect("must parse").as_str(), "2.5.0");
}

#[test]
fn parse_github_tag_pattern_skips_non_digit_prefix() {
    let pattern = VersionPattern::new(GITHUB_TAG_PATTERN).expect("pattern must compile");
    let body = r#"{"data":{"repository":{"latestRelease":{"tagName":"release-v0.41.1"}}}}"#;
    assert_eq!(pattern.parse(body).expect("must parse").as_str(), "0.41.1");
}

#[test]
fn parse_reports_missing_version() {
    let err = Version::parse("no digits here").expect_err("must fail");
    assert!(matches!(err, VersionError::NoVersionFound { .. }));
}

#[test]
fn pattern_requires_placeholder() {
    let err = VersionPattern::new("tag: (.*)").expect_err("must fail");
    assert!(matches!(err, VersionError::MissingPlaceholder { .. }));

    let err = VersionPattern::new("([{{VERSION}}").expect_err("must fail");
    assert!(matches!(err, VersionError::InvalidPattern { .. }));
}

#[test]
fn compare_orders_numeric_components() {
    assert!(version("1.10").is_newer_than(&version("1.9")));
    assert!(version("2.0.0").is_newer_than(&version("1.99.99.99")));
    assert!(version("1.2.3.1").is_newer_than(&version("1.2.3")));
    assert_eq!(version("3.4.5").compare(&version("3.4.5")), Ordering::Equal);
}

#[test]
fn compare_treats_absent_component_as_smaller_than_zero() {
    let short = version("1.2");
    let long = version("1.2.0");
    assert!(long.is_newer_than(&short));
    assert!(!short.is_newer_than(&long));
    assert_ne!(short, long);
}

#[test]
fn compare_falls_back_to_text_fields() {
    assert!(version("1.0.0-beta").is_newer_than(&version("1.0.0-alpha")));
    assert!(version("1.0.0+b2").is_newer_than(&version("1.0.0+b1")));
}

#[test]
fn compare_is_antisymmetric() {
    let samples = [
        "1", "1.0", "1.0.0", "1.0.0.0", "1.2.3", "1.2.3-rc1", "1.2.3+7", "0.9.12", "10.0.1",
        "2.39.2.windows.1",
    ];
    for left in samples {
        for right in samples {
            let a = version(left);
            let b = version(right);
            assert!(
                !(a.is_newer_than(&b) && b.is_newer_than(&a)),
                "{left} and {right} both newer"
            );
            let neither = !a.is_newer_than(&b) && !b.is_newer_than(&a);
            assert_eq!(neither, left == right, "{left} vs {right}");
        }
    }
}

#[test]
fn fill_placeholders_renders_fields() {
    let parsed = version("1.2.3");
    assert_eq!(parsed.fill_placeholders("{{VERSION}} {{V_MAJOR}}"), "1.2.3 1");
    assert_eq!(
        parsed.fill_placeholders("app-{{VERSION_NO_DOT}}-{{V_PATCH2}}.zip"),
        "app-123-.zip"
    );
    assert_eq!(parsed.fill_placeholders(""), "");
}

#[test]
fn infer_extension_from_url() {
    assert_eq!(
        infer_download_extension("https://host/app-{{VERSION}}.zip").as_deref(),
        Some(".zip")
    );
    assert_eq!(
        infer_download_extension("https://host/setup.exe?raw=true").as_deref(),
        Some(".exe")
    );
    assert_eq!(infer_download_extension("").as_deref(), Some(".zip"));
    assert_eq!(infer_download_extension("manual:see website"), None);
}

#[test]
fn archive_type_from_extension_ignores_dot_and_case() {
    assert_eq!(ArchiveType::from_extension(".ZIP"), Some(ArchiveType::Zip));
    assert_eq!(ArchiveType::from_extension("exe"), Some(ArchiveType::Exe));
    assert_eq!(ArchiveType::from_extension(".7z"), None);
    assert!(ArchiveType::Zip.is_archive());
    assert!(!ArchiveType::Exe.is_archive());
}

#[test]
fn url_file_name_drops_query() {
    assert_eq!(
        url_file_name("https://host/dl/tool-1.0.exe?download=1#x"),
        "tool-1.0.exe"
    );
}

#[test]
fn definition_fills_defaults() {
    let mut definition = AppDefinition::new("tool");
    definition.version = "1.4.0".to_string();
    definition.download_url = "https://host/tool-{{VERSION}}.zip".to_string();

    let validated = definition.validate().expect("definition must be valid");
    assert_eq!(validated.symlink, "tool");
    assert_eq!(validated.download_extension.as_deref(), Some(".zip"));
    assert_eq!(
        validated.config_version.as_ref().map(Version::as_str),
        Some("1.4.0")
    );
    assert!(validated.remote_check.is_none());
    assert!(validated.extract_filter.is_match("any/path"));
    assert_eq!(
        validated.create_files.get(VERSION_MARKER_FILE).map(String::as_str),
        Some("{{VERSION}}")
    );
}

#[test]
fn definition_without_version_file() {
    let mut definition = AppDefinition::new("tool");
    definition.version = "1.0".to_string();
    definition.download_url = "https://host/tool.exe".to_string();
    definition.no_add_version_file = true;

    let validated = definition.validate().expect("definition must be valid");
    assert!(validated.create_files.is_empty());
    assert_eq!(validated.download_extension.as_deref(), Some(".exe"));
}

#[test]
fn definition_collects_all_problems() {
    let mut definition = AppDefinition::new("");
    definition.extract_regex_list = vec!["([".to_string()];

    let err = definition.validate().expect_err("definition must be invalid");
    assert!(err.problems.len() >= 3, "problems: {:?}", err.problems);
    assert!(err
        .problems
        .iter()
        .any(|problem| problem.contains("missing application name")));
    assert!(err
        .problems
        .iter()
        .any(|problem| problem.contains("missing version info")));
    assert!(!definition.is_valid());
}

#[test]
fn definition_rejects_unparsable_fixed_version() {
    let mut definition = AppDefinition::new("tool");
    definition.version = "latest".to_string();
    definition.download_url = "https://host/tool.zip".to_string();

    let err = definition.validate().expect_err("definition must be invalid");
    assert_eq!(err.name, "tool");
    assert!(err.to_string().contains("bad version 'latest'"));
}

#[test]
fn definition_expands_github_repository() {
    let definition = AppDefinition::from_toml_str(
        r#"
ApplicationName = "fzf"
RepositoryUrl = "github:junegunn/fzf"
DownloadUrl = "v{{VERSION}}/fzf-{{VERSION}}-windows_amd64.zip"
ExtractRegExList = ["fzf.exe"]
"#,
    )
    .expect("definition must parse");

    let validated = definition.validate().expect("definition must be valid");
    assert_eq!(
        validated.download_url,
        "https://github.com/junegunn/fzf/releases/download/v{{VERSION}}/fzf-{{VERSION}}-windows_amd64.zip"
    );
    let check = validated.remote_check.as_ref().expect("must have check");
    assert_eq!(check.url, "github:junegunn/fzf");
    assert_eq!(check.pattern.as_str(), GITHUB_TAG_PATTERN);
    assert!(check.enabled);

    let request = check.build_request(Some("secret"));
    assert_eq!(request.url, GITHUB_GRAPHQL_URL);
    assert_eq!(request.bearer.as_deref(), Some("secret"));
    let body: serde_json::Value =
        serde_json::from_str(request.body.as_deref().expect("must have body"))
            .expect("body must be json");
    let query = body["query"].as_str().expect("query must be a string");
    assert!(query.contains(r#"owner:"junegunn", name:"fzf""#));
    assert!(query.contains("latestRelease{tagName}"));
}

#[test]
fn definition_rejects_unknown_repository_provider() {
    let mut definition = AppDefinition::new("tool");
    definition.repository_url = "gitlab:owner/tool".to_string();
    definition.download_url = "https://host/tool.zip".to_string();
    definition.version = "1.0".to_string();

    let err = definition.validate().expect_err("definition must be invalid");
    assert!(err
        .problems
        .iter()
        .any(|problem| problem.contains("unsupported repository provider gitlab")));
}

#[test]
fn plain_check_url_gets_no_bearer() {
    let definition = AppDefinition::from_json_str(
        r#"{
            "ApplicationName": "tool",
            "DownloadUrl": "https://host/tool-{{VERSION}}.zip",
            "VersionCheck": {
                "Url": "https://host/releases",
                "RegEx": "tool-{{VERSION}}.zip",
                "UseLatestVersion": false
            }
        }"#,
    )
    .expect("definition must parse");

    let validated = definition.validate().expect("definition must be valid");
    let check = validated.remote_check.as_ref().expect("must have check");
    assert!(!check.enabled);
    let request = check.build_request(Some("secret"));
    assert_eq!(request, FetchRequest::get("https://host/releases"));
}

#[test]
fn manual_download_url_has_no_extension() {
    let mut definition = AppDefinition::new("tool");
    definition.version = "1.0".to_string();
    definition.download_url = "manual: fetch from the vendor site".to_string();

    let validated = definition.validate().expect("definition must be valid");
    assert_eq!(validated.download_extension, None);
}

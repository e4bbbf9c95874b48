//! Shared credentials and config files (`~/.aws/credentials`,
//! `~/.aws/config`).

use super::{not_found, CredentialProvider, Credentials, EnvironmentProvider};
use crate::config::Configuration;
use crate::error::{ErrorKind, SdkError, SdkResult};
use crate::http::Transport;
use crate::sts::{self, AssumeRoleInput};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Profiles ────────────────────────────────────────────────────────────

/// One named profile. Keys are lowercased; nested sub-properties are
/// stored as `parent.key`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    name: String,
    properties: BTreeMap<String, String>,
}

impl Profile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.properties
            .insert(key.to_ascii_lowercase(), value.to_string());
    }

    pub fn region(&self) -> Option<&str> {
        self.get("region")
    }

    /// Static keys, if the profile carries both halves.
    pub fn static_credentials(&self) -> Option<Credentials> {
        let access_key_id = self.get("aws_access_key_id")?;
        let secret_access_key = self.get("aws_secret_access_key")?;
        let mut credentials = Credentials::new(access_key_id, secret_access_key);
        credentials.session_token = self.get("aws_session_token").map(str::to_string);
        Some(credentials)
    }
}

/// All profiles from both shared files. A key set in the credentials file
/// wins over the same key in the config file.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: BTreeMap<String, Profile>,
}

#[derive(Clone, Copy, PartialEq)]
enum FileKind {
    Credentials,
    Config,
}

impl ProfileSet {
    /// Parse file contents already in memory.
    pub fn parse(credentials: Option<&str>, config: Option<&str>) -> Self {
        let mut set = Self::default();
        if let Some(text) = config {
            set.merge(text, FileKind::Config);
        }
        if let Some(text) = credentials {
            set.merge(text, FileKind::Credentials);
        }
        set
    }

    /// Read both files. Missing files are treated as empty.
    pub async fn load(credentials: Option<PathBuf>, config: Option<PathBuf>) -> SdkResult<Self> {
        let credentials = read_optional(credentials.as_deref()).await?;
        let config = read_optional(config.as_deref()).await?;
        Ok(Self::parse(credentials.as_deref(), config.as_deref()))
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    fn merge(&mut self, text: &str, kind: FileKind) {
        let mut section: Option<String> = None;
        let mut parent: Option<String> = None;

        for raw in text.lines() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if trimmed.starts_with('[') {
                section = trimmed
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .and_then(|s| section_name(s.trim(), kind));
                parent = None;
                if let Some(ref name) = section {
                    self.profiles
                        .entry(name.clone())
                        .or_insert_with(|| Profile::new(name));
                }
                continue;
            }

            let Some(name) = section.as_ref() else { continue };
            let Some((key, value)) = trimmed.split_once('=') else {
                log::debug!("ignoring malformed line in [{}]", name);
                continue;
            };
            let key = key.trim();
            let value = strip_inline_comment(value.trim());
            let nested = raw.starts_with(char::is_whitespace);

            let Some(profile) = self.profiles.get_mut(name) else { continue };
            if let (true, Some(p)) = (nested, parent.as_deref()) {
                profile.set(&format!("{}.{}", p, key), value);
                continue;
            }
            profile.set(key, value);
            parent = value.is_empty().then(|| key.to_ascii_lowercase());
        }
    }
}

fn section_name(header: &str, kind: FileKind) -> Option<String> {
    match kind {
        FileKind::Credentials => Some(header.to_string()),
        FileKind::Config if header == "default" => Some(header.to_string()),
        FileKind::Config => header
            .strip_prefix("profile")
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .map(|rest| rest.trim().to_string()),
    }
}

fn strip_inline_comment(value: &str) -> &str {
    let cut = value
        .find(" #")
        .into_iter()
        .chain(value.find(" ;"))
        .chain(value.find("\t#"))
        .min();
    match cut {
        Some(i) => value[..i].trim_end(),
        None => value,
    }
}

async fn read_optional(path: Option<&Path>) -> SdkResult<Option<String>> {
    let Some(path) = path else { return Ok(None) };
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ErrorKind::Configuration(format!(
            "cannot read {}: {}",
            path.display(),
            e
        ))
        .into()),
    }
}

// ── Provider ────────────────────────────────────────────────────────────

/// Credentials from the configured profile of the shared files.
///
/// Supports static keys, `role_arn` with `source_profile` (chained through
/// STS, innermost first), `role_arn` with `web_identity_token_file`, and
/// `role_arn` with `credential_source = Environment`.
#[derive(Debug, Clone)]
pub struct IniFileProvider {
    config: Arc<Configuration>,
    transport: Arc<dyn Transport>,
}

/// Where the innermost profile of a role chain gets its credentials.
enum Source {
    Static(Credentials),
    Environment,
    WebIdentity { role_arn: String, token_file: String, session_name: String },
}

impl IniFileProvider {
    pub fn new(config: Arc<Configuration>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Walk `source_profile` links from `name`, returning the roles to
    /// assume (outermost first) and the source at the bottom.
    fn plan<'a>(&self, set: &'a ProfileSet, name: &str) -> SdkResult<(Vec<&'a Profile>, Source)> {
        let mut roles = Vec::new();
        let mut visited = HashSet::new();
        let mut path = vec![name.to_string()];
        let mut current = name.to_string();

        loop {
            if !visited.insert(current.clone()) {
                return Err(config_error(format!(
                    "source_profile loop: {}",
                    path.join(" -> ")
                )));
            }
            let profile = match set.get(&current) {
                Some(p) => p,
                None if roles.is_empty() => {
                    return Err(not_found(self.name(), format!("profile \"{}\" not found", current)))
                }
                None => {
                    return Err(config_error(format!(
                        "source profile \"{}\" does not exist",
                        current
                    )))
                }
            };

            let Some(role_arn) = profile.get("role_arn") else {
                return match profile.static_credentials() {
                    Some(c) => Ok((roles, Source::Static(c))),
                    None if roles.is_empty() => Err(not_found(
                        self.name(),
                        format!("profile \"{}\" has no credentials", current),
                    )),
                    None => Err(config_error(format!(
                        "source profile \"{}\" has no credentials",
                        current
                    ))),
                };
            };

            if let Some(token_file) = profile.get("web_identity_token_file") {
                let source = Source::WebIdentity {
                    role_arn: role_arn.to_string(),
                    token_file: token_file.to_string(),
                    session_name: session_name(profile),
                };
                return Ok((roles, source));
            }

            if let Some(source) = profile.get("credential_source") {
                roles.push(profile);
                return match source {
                    "Environment" => Ok((roles, Source::Environment)),
                    other => Err(config_error(format!(
                        "profile \"{}\": unsupported credential_source \"{}\"",
                        current, other
                    ))),
                };
            }

            let Some(source_profile) = profile.get("source_profile") else {
                return Err(config_error(format!(
                    "profile \"{}\" sets role_arn without source_profile or credential_source",
                    current
                )));
            };
            roles.push(profile);

            // A profile may name itself to use its own static keys as the source.
            if source_profile == current {
                return match profile.static_credentials() {
                    Some(c) => Ok((roles, Source::Static(c))),
                    None => Err(config_error(format!(
                        "profile \"{}\" is its own source_profile but has no keys",
                        current
                    ))),
                };
            }
            current = source_profile.to_string();
            path.push(current.clone());
        }
    }

    async fn source_credentials(&self, source: Source) -> SdkResult<Credentials> {
        match source {
            Source::Static(c) => Ok(c),
            Source::Environment => EnvironmentProvider::new().resolve().await,
            Source::WebIdentity { role_arn, token_file, session_name } => {
                let token = tokio::fs::read_to_string(&token_file).await.map_err(|e| {
                    config_error(format!("cannot read token file {}: {}", token_file, e))
                })?;
                sts::assume_role_with_web_identity(
                    &self.config,
                    self.transport.clone(),
                    &role_arn,
                    &session_name,
                    token.trim(),
                )
                .await
            }
        }
    }
}

fn session_name(profile: &Profile) -> String {
    profile
        .get("role_session_name")
        .map(str::to_string)
        .unwrap_or_else(sts::default_session_name)
}

fn assume_role_input(profile: &Profile) -> SdkResult<AssumeRoleInput> {
    let duration_seconds = match profile.get("duration_seconds") {
        Some(v) => Some(v.parse::<u32>().map_err(|_| {
            config_error(format!(
                "profile \"{}\": invalid duration_seconds \"{}\"",
                profile.name(),
                v
            ))
        })?),
        None => None,
    };
    Ok(AssumeRoleInput {
        role_arn: profile.get("role_arn").unwrap_or_default().to_string(),
        role_session_name: session_name(profile),
        duration_seconds,
        external_id: profile.get("external_id").map(str::to_string),
        ..Default::default()
    })
}

fn config_error(message: String) -> SdkError {
    ErrorKind::Configuration(message).into()
}

#[async_trait]
impl CredentialProvider for IniFileProvider {
    fn name(&self) -> &'static str {
        "profile"
    }

    async fn resolve(&self) -> SdkResult<Credentials> {
        let set = ProfileSet::load(self.config.credentials_file(), self.config.config_file()).await?;
        if set.is_empty() {
            return Err(not_found(self.name(), "no shared credentials or config file"));
        }

        let profile = self.config.profile.as_str();
        let (roles, source) = self.plan(&set, profile)?;
        let mut credentials = self.source_credentials(source).await?;

        for role in roles.iter().rev() {
            log::debug!("profile {}: assuming {}", role.name(), role.get("role_arn").unwrap_or_default());
            let input = assume_role_input(role)?;
            credentials =
                sts::assume_role(&self.config, self.transport.clone(), credentials, &input).await?;
        }
        Ok(credentials.with_provider_name(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RawResponse;
    use crate::sts::tests::assume_role_body;
    use crate::transport::StubTransport;
    use std::fs;

    const CREDENTIALS: &str = "\
# shared credentials
[default]
aws_access_key_id = AKIADEFAULT
aws_secret_access_key = defaultsecret

[base]
aws_access_key_id=AKIABASE
aws_secret_access_key=basesecret ; trailing comment

[temp]
aws_access_key_id = ASIATEMP
aws_secret_access_key = tempsecret
aws_session_token = temptoken
";

    const CONFIG: &str = "\
[default]
region = eu-west-1
aws_access_key_id = AKIAIGNORED

[profile dev]
region = us-west-2
s3 =
  max_concurrent_requests = 20
aws_access_key_id = AKIADEV
aws_secret_access_key = devsecret

[profile mid]
role_arn = arn:aws:iam::111111111111:role/mid
source_profile = base

[profile prod]
role_arn = arn:aws:iam::222222222222:role/prod
source_profile = mid
external_id = ext-1
duration_seconds = 900
role_session_name = prod-session

[profile loop-a]
role_arn = arn:aws:iam::111111111111:role/a
source_profile = loop-b

[profile loop-b]
role_arn = arn:aws:iam::111111111111:role/b
source_profile = loop-a

[sso-session corp]
sso_region = us-east-1
";

    struct Files {
        _dir: tempfile::TempDir,
        config: Configuration,
    }

    fn files(profile: &str) -> Files {
        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("credentials");
        let config = dir.path().join("config");
        fs::write(&credentials, CREDENTIALS).unwrap();
        fs::write(&config, CONFIG).unwrap();
        let config = Configuration::default()
            .with_profile(profile)
            .with_shared_credentials_file(credentials)
            .with_shared_config_file(config);
        Files { _dir: dir, config }
    }

    fn provider(files: &Files, stub: &StubTransport) -> IniFileProvider {
        IniFileProvider::new(Arc::new(files.config.clone()), Arc::new(stub.clone()))
    }

    #[test]
    fn parses_both_files() {
        let set = ProfileSet::parse(Some(CREDENTIALS), Some(CONFIG));
        let default = set.get("default").unwrap();
        assert_eq!(default.get("aws_access_key_id"), Some("AKIADEFAULT"));
        assert_eq!(default.region(), Some("eu-west-1"));

        let dev = set.get("dev").unwrap();
        assert_eq!(dev.region(), Some("us-west-2"));
        assert_eq!(dev.get("s3.max_concurrent_requests"), Some("20"));
        assert_eq!(dev.get("aws_access_key_id"), Some("AKIADEV"));

        assert_eq!(
            set.get("base").unwrap().get("aws_secret_access_key"),
            Some("basesecret")
        );
        assert!(set.get("corp").is_none());
        assert!(set.get("sso-session corp").is_none());
    }

    #[test]
    fn config_sections_need_profile_prefix() {
        let set = ProfileSet::parse(None, Some("[dev]\nregion = x\n[profile  spaced ]\nregion = y\n"));
        assert!(set.get("dev").is_none());
        assert_eq!(set.get("spaced").unwrap().region(), Some("y"));
    }

    #[tokio::test]
    async fn missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = ProfileSet::load(Some(dir.path().join("nope")), None).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn static_profile() {
        let f = files("temp");
        let stub = StubTransport::new();
        let creds = provider(&f, &stub).resolve().await.unwrap();
        assert_eq!(creds.access_key_id, "ASIATEMP");
        assert_eq!(creds.session_token.as_deref(), Some("temptoken"));
        assert_eq!(creds.provider_name.as_deref(), Some("profile"));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn config_only_profile() {
        let f = files("dev");
        let creds = provider(&f, &StubTransport::new()).resolve().await.unwrap();
        assert_eq!(creds.access_key_id, "AKIADEV");
    }

    #[tokio::test]
    async fn role_chain_assumes_innermost_first() {
        let f = files("prod");
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(assume_role_body("AssumeRole", "ASIAMID")))
            .push(RawResponse::new(200).with_body(assume_role_body("AssumeRole", "ASIAPROD")));

        let creds = provider(&f, &stub).resolve().await.unwrap();
        assert_eq!(creds.access_key_id, "ASIAPROD");

        let requests = stub.requests();
        assert_eq!(requests.len(), 2);
        let first = String::from_utf8(requests[0].body.to_vec()).unwrap();
        assert!(first.contains("RoleArn=arn%3Aaws%3Aiam%3A%3A111111111111%3Arole%2Fmid"));
        assert!(requests[0].headers.get("authorization").unwrap().contains("Credential=AKIABASE/"));

        let second = String::from_utf8(requests[1].body.to_vec()).unwrap();
        assert!(second.contains("role%2Fprod"));
        assert!(second.contains("RoleSessionName=prod-session"));
        assert!(second.contains("DurationSeconds=900"));
        assert!(second.contains("ExternalId=ext-1"));
        assert!(requests[1].headers.get("authorization").unwrap().contains("Credential=ASIAMID/"));
        assert!(requests[1].headers.contains("x-amz-security-token"));
    }

    #[tokio::test]
    async fn source_profile_loop_is_rejected() {
        let f = files("loop-a");
        let stub = StubTransport::new();
        let err = provider(&f, &stub).resolve().await.unwrap_err();
        match err.kind() {
            ErrorKind::Configuration(msg) => assert!(msg.contains("loop-a -> loop-b -> loop-a")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn unknown_profile_is_not_found() {
        let f = files("missing");
        let err = provider(&f, &StubTransport::new()).resolve().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CredentialsNotFound(msg) if msg.contains("missing")));
    }

    #[tokio::test]
    async fn no_files_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::default()
            .with_shared_credentials_file(dir.path().join("credentials"))
            .with_shared_config_file(dir.path().join("config"));
        let err = IniFileProvider::new(Arc::new(config), Arc::new(StubTransport::new()))
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CredentialsNotFound(_)));
    }

    #[tokio::test]
    async fn web_identity_profile() {
        let dir = tempfile::tempdir().unwrap();
        let token = dir.path().join("token");
        fs::write(&token, "oidc-token\n").unwrap();
        let config_file = dir.path().join("config");
        fs::write(
            &config_file,
            format!(
                "[profile eks]\nrole_arn = arn:aws:iam::1:role/eks\nweb_identity_token_file = {}\n",
                token.display()
            ),
        )
        .unwrap();
        let config = Configuration::default()
            .with_profile("eks")
            .with_shared_credentials_file(dir.path().join("credentials"))
            .with_shared_config_file(config_file);

        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(assume_role_body("AssumeRoleWithWebIdentity", "ASIAEKS")));
        let creds = IniFileProvider::new(Arc::new(config), Arc::new(stub.clone()))
            .resolve()
            .await
            .unwrap();
        assert_eq!(creds.access_key_id, "ASIAEKS");
        let body = String::from_utf8(stub.last_request().unwrap().body.to_vec()).unwrap();
        assert!(body.contains("WebIdentityToken=oidc-token"));
    }
}

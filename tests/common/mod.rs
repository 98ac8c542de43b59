/// Common test utilities and helpers for mirrormaker tests
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mirrormaker::{
    Backend, Config, HostError, MirrorOptions, MirrorRecord, NewRepository, RepositoryRef, Session,
    Shorthand, SourceHost, SyncEngine, TargetHost,
};

/// GitLab-style repository under `namespace`
pub fn gitlab_repo(namespace: &str, slug: &str) -> RepositoryRef {
    RepositoryRef {
        id: None,
        full_name: format!("{}/{}", namespace, slug),
        slug: slug.to_string(),
        namespace: namespace.to_string(),
        owner: Some(namespace.to_string()),
        description: Some(format!("{} project", slug)),
        web_url: format!("https://gitlab.com/{}/{}", namespace, slug),
        fork: false,
    }
}

/// In-memory GitLab account
pub struct FakeGitLab {
    repos: Vec<RepositoryRef>,
    mirrors: Mutex<HashMap<String, Vec<MirrorRecord>>>,
    mirror_calls: AtomicUsize,
}

impl FakeGitLab {
    pub fn new(repos: Vec<RepositoryRef>) -> Arc<Self> {
        Arc::new(Self {
            repos,
            mirrors: Mutex::new(HashMap::new()),
            mirror_calls: AtomicUsize::new(0),
        })
    }

    pub fn mirror_calls(&self) -> usize {
        self.mirror_calls.load(Ordering::SeqCst)
    }

    pub fn mirrors_of(&self, full_name: &str) -> Vec<MirrorRecord> {
        self.mirrors
            .lock()
            .unwrap()
            .get(full_name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SourceHost for FakeGitLab {
    async fn list_repositories(&self) -> Result<Vec<RepositoryRef>, HostError> {
        Ok(self.repos.clone())
    }

    async fn get_repository(&self, shorthand: &Shorthand) -> Result<RepositoryRef, HostError> {
        self.repos
            .iter()
            .find(|r| match &shorthand.namespace {
                Some(_) => r.full_name == shorthand.to_string(),
                None => r.slug == shorthand.name,
            })
            .cloned()
            .ok_or_else(|| HostError::NotFound {
                host: "GitLab",
                what: shorthand.to_string(),
            })
    }

    async fn list_mirrors(&self, repo: &RepositoryRef) -> Result<Vec<MirrorRecord>, HostError> {
        Ok(self.mirrors_of(&repo.full_name))
    }

    async fn create_mirror(
        &self,
        repo: &RepositoryRef,
        url: &str,
        options: &MirrorOptions,
    ) -> Result<(), HostError> {
        self.mirror_calls.fetch_add(1, Ordering::SeqCst);
        self.mirrors
            .lock()
            .unwrap()
            .entry(repo.full_name.clone())
            .or_default()
            .push(MirrorRecord {
                url: url.to_string(),
                enabled: options.enabled,
            });
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "fake GitLab"
    }
}

/// In-memory GitHub account owned by `owner`
pub struct FakeGitHub {
    owner: String,
    repos: Mutex<Vec<RepositoryRef>>,
    failing: Mutex<HashSet<String>>,
    create_calls: AtomicUsize,
}

impl FakeGitHub {
    pub fn new(owner: &str) -> Arc<Self> {
        Arc::new(Self {
            owner: owner.to_string(),
            repos: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            create_calls: AtomicUsize::new(0),
        })
    }

    /// Pre-existing repository
    pub fn with_repo(self: Arc<Self>, name: &str) -> Arc<Self> {
        let repo = self.repository(name);
        self.repos.lock().unwrap().push(repo);
        self
    }

    /// Creating `name` fails until [`FakeGitHub::heal`] is called
    pub fn fail_on(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .repos
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.full_name.clone())
            .collect();
        names.sort();
        names
    }

    fn repository(&self, name: &str) -> RepositoryRef {
        RepositoryRef {
            id: None,
            full_name: format!("{}/{}", self.owner, name),
            slug: name.to_string(),
            namespace: self.owner.clone(),
            owner: Some(self.owner.clone()),
            description: None,
            web_url: format!("https://github.com/{}/{}", self.owner, name),
            fork: false,
        }
    }
}

#[async_trait]
impl TargetHost for FakeGitHub {
    async fn list_public_repositories(&self) -> Result<Vec<RepositoryRef>, HostError> {
        Ok(self.repos.lock().unwrap().clone())
    }

    async fn create_repository(&self, request: &NewRepository) -> Result<RepositoryRef, HostError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&request.name) {
            return Err(HostError::Status {
                host: "GitHub",
                status: 500,
                body: "server error".to_string(),
            });
        }

        let repo = self.repository(&request.name);
        self.repos.lock().unwrap().push(repo.clone());
        Ok(repo)
    }
}

/// Session with both tokens set
pub fn session(dry_run: bool, username: Option<&str>) -> Session {
    let mut config = Config::default();
    config.github.token = Some("ghp_test".to_string());
    config.gitlab.token = Some("glpat_test".to_string());
    config.github.username = username.map(str::to_string);
    config.dry_run = dry_run;
    Session::new(&config, Backend::NativeApi).expect("session with both tokens")
}

/// Engine over the two fakes using the API backend
pub fn engine(gitlab: &Arc<FakeGitLab>, github: &Arc<FakeGitHub>, session: Session) -> SyncEngine {
    SyncEngine::new(
        session,
        Backend::NativeApi,
        gitlab.clone(),
        None,
        github.clone(),
    )
}

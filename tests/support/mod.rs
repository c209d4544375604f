// ABOUTME: Test support utilities.
// ABOUTME: Provides a scriptable in-memory GitAdapter and tracing setup.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use catapult::git::{Changelog, GitAdapter, GitError};
use catapult::types::CommitHash;
use parking_lot::Mutex;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("catapult=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Full-length hash made of one repeated hex digit.
#[allow(dead_code)]
pub fn commit(digit: char) -> CommitHash {
    CommitHash::new(&digit.to_string().repeat(40)).unwrap()
}

#[derive(Default)]
struct FakeGitState {
    refs: HashMap<String, CommitHash>,
    tags: Vec<(String, CommitHash)>,
    existing_tags: HashSet<String>,
    author: Option<String>,
    reject_push: bool,
    /// `(ancestor, descendant)` pairs beyond the trivial self-ancestry.
    ancestry: HashSet<(CommitHash, CommitHash)>,
    changelog_calls: Vec<(Option<CommitHash>, CommitHash)>,
}

/// GitAdapter whose refs, tags, and author are set up by the test.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct FakeGit {
    state: Arc<Mutex<FakeGitState>>,
}

#[allow(dead_code)]
impl FakeGit {
    /// `HEAD` points at `commit('a')` and the author is `dev@example.com`.
    pub fn new() -> Self {
        Self::default()
            .with_ref("HEAD", commit('a'))
            .with_author("dev@example.com")
    }

    pub fn with_ref(self, name: &str, target: CommitHash) -> Self {
        self.state.lock().refs.insert(name.to_string(), target);
        self
    }

    pub fn with_author(self, author: &str) -> Self {
        self.state.lock().author = Some(author.to_string());
        self
    }

    pub fn without_author(self) -> Self {
        self.state.lock().author = None;
        self
    }

    pub fn with_existing_tag(self, name: &str) -> Self {
        self.state.lock().existing_tags.insert(name.to_string());
        self
    }

    /// Record that `ancestor` is reachable from `descendant`.
    pub fn with_ancestor(self, ancestor: CommitHash, descendant: CommitHash) -> Self {
        self.state.lock().ancestry.insert((ancestor, descendant));
        self
    }

    /// `commits` form a single line of history, oldest first.
    pub fn with_linear_history(self, commits: &[CommitHash]) -> Self {
        {
            let mut state = self.state.lock();
            for (i, ancestor) in commits.iter().enumerate() {
                for descendant in &commits[i + 1..] {
                    state.ancestry.insert((ancestor.clone(), descendant.clone()));
                }
            }
        }
        self
    }

    pub fn rejecting_pushes(self) -> Self {
        self.state.lock().reject_push = true;
        self
    }

    /// Point `HEAD` somewhere else between releases.
    pub fn checkout(&self, target: CommitHash) {
        self.state.lock().refs.insert("HEAD".to_string(), target);
    }

    /// Names of tags created so far, in order.
    pub fn tags(&self) -> Vec<String> {
        self.state.lock().tags.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn changelog_calls(&self) -> Vec<(Option<CommitHash>, CommitHash)> {
        self.state.lock().changelog_calls.clone()
    }
}

#[async_trait]
impl GitAdapter for FakeGit {
    async fn resolve(&self, reference: &str) -> Result<CommitHash, GitError> {
        self.state
            .lock()
            .refs
            .get(reference)
            .cloned()
            .ok_or_else(|| GitError::UnknownRef(reference.to_string()))
    }

    async fn create_tag(&self, name: &str, commit: &CommitHash) -> Result<(), GitError> {
        let mut state = self.state.lock();
        if state.existing_tags.contains(name) {
            return Err(GitError::TagAlreadyExists(name.to_string()));
        }
        if state.reject_push {
            return Err(GitError::PushRejected {
                tag: name.to_string(),
                reason: "remote rejected".to_string(),
            });
        }
        state.existing_tags.insert(name.to_string());
        state.tags.push((name.to_string(), commit.clone()));
        Ok(())
    }

    async fn is_ancestor(
        &self,
        ancestor: &CommitHash,
        descendant: &CommitHash,
    ) -> Result<bool, GitError> {
        Ok(ancestor == descendant
            || self
                .state
                .lock()
                .ancestry
                .contains(&(ancestor.clone(), descendant.clone())))
    }

    async fn author(&self) -> Result<Option<String>, GitError> {
        Ok(self.state.lock().author.clone())
    }

    async fn changelog(
        &self,
        from: Option<&CommitHash>,
        to: &CommitHash,
    ) -> Result<Changelog, GitError> {
        let mut state = self.state.lock();
        state.changelog_calls.push((from.cloned(), to.clone()));
        let (text, rollback) = match from {
            Some(from) => {
                let behind = from != to && state.ancestry.contains(&(to.clone(), from.clone()));
                (format!("{}..{}", from.short(), to.short()), behind)
            }
            None => (format!("initial {}", to.short()), false),
        };
        Ok(Changelog { text, rollback })
    }
}

//! Branch and commit of the git checkout that holds the indexed root.
use std::path::Path;

use git2::{ErrorCode, Repository};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// `None` when `root` is not inside a git repository.
pub fn read_vcs_state(root: &Path) -> Option<VcsState> {
    let repo = match Repository::discover(root) {
        Ok(repo) => repo,
        Err(e) => {
            debug!("No git repository at {}: {}", root.display(), e.message());
            return None;
        }
    };

    let state = match repo.head() {
        Ok(head) => VcsState {
            // Detached HEAD has no branch.
            branch: if head.is_branch() {
                head.shorthand().map(String::from)
            } else {
                None
            },
            commit: head.peel_to_commit().ok().map(|c| c.id().to_string()),
        },
        // Fresh repository: HEAD names a branch without commits.
        Err(e) if e.code() == ErrorCode::UnbornBranch => VcsState {
            branch: repo.find_reference("HEAD").ok().and_then(|head| {
                head.symbolic_target()
                    .map(|target| target.trim_start_matches("refs/heads/").to_string())
            }),
            commit: None,
        },
        Err(e) => {
            warn!("Failed to resolve HEAD in {}: {}", root.display(), e.message());
            return None;
        }
    };
    debug!("VCS state for {}: {:?}", root.display(), state);
    Some(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Oid, RepositoryInitOptions, Signature};
    use tempfile::TempDir;

    fn init(dir: &Path) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        Repository::init_opts(dir, &opts).unwrap()
    }

    fn commit(repo: &Repository, message: &str) -> Oid {
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parents: Vec<git2::Commit<'_>> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn test_not_a_repository() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_vcs_state(dir.path()), None);
    }

    #[test]
    fn test_branch_and_commit() {
        let dir = TempDir::new().unwrap();
        let repo = init(dir.path());
        commit(&repo, "first");
        let head = commit(&repo, "second");

        let state = read_vcs_state(dir.path()).unwrap();
        assert_eq!(state.branch.as_deref(), Some("main"));
        assert_eq!(state.commit, Some(head.to_string()));
    }

    #[test]
    fn test_detached_head() {
        let dir = TempDir::new().unwrap();
        let repo = init(dir.path());
        let first = commit(&repo, "first");
        commit(&repo, "second");
        repo.set_head_detached(first).unwrap();

        let state = read_vcs_state(dir.path()).unwrap();
        assert_eq!(state.branch, None);
        assert_eq!(state.commit, Some(first.to_string()));
    }

    #[test]
    fn test_unborn_branch() {
        let dir = TempDir::new().unwrap();
        init(dir.path());

        let state = read_vcs_state(dir.path()).unwrap();
        assert_eq!(state.branch.as_deref(), Some("main"));
        assert_eq!(state.commit, None);
    }

    #[test]
    fn test_root_below_the_worktree_top() {
        let dir = TempDir::new().unwrap();
        let repo = init(dir.path());
        let head = commit(&repo, "first");
        let nested = dir.path().join("services/api");
        std::fs::create_dir_all(&nested).unwrap();

        let state = read_vcs_state(&nested).unwrap();
        assert_eq!(state.commit, Some(head.to_string()));
    }
}

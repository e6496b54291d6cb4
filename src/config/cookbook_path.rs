//! Process-wide "cookbook path" setting.
//!
//! Parts of the upload stack locate repository files (such as `chefignore`)
//! through this setting when no repository path was handed to them. The tree
//! abstraction has no single cookbook path, so uploads temporarily point the
//! setting at the real repository directory of the cookbook being uploaded.
//!
//! The setting is shared by the whole process. Every scoped override goes
//! through one async mutex, so overlapping uploads are serialized here.

use parking_lot::RwLock;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

static COOKBOOK_PATH: RwLock<Option<PathBuf>> = parking_lot::const_rwlock(None);

fn override_lock() -> &'static tokio::sync::Mutex<()> {
    static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| tokio::sync::Mutex::new(()))
}

/// Current value of the setting.
pub fn get() -> Option<PathBuf> {
    COOKBOOK_PATH.read().clone()
}

/// Replace the setting, returning the previous value.
pub fn set(path: Option<PathBuf>) -> Option<PathBuf> {
    std::mem::replace(&mut *COOKBOOK_PATH.write(), path)
}

/// Restores the saved value when dropped.
struct RestoreGuard {
    previous: Option<PathBuf>,
}

impl RestoreGuard {
    fn apply(actual: &Path) -> Self {
        let mut setting = COOKBOOK_PATH.write();
        let previous = setting.clone();
        if setting.is_none() {
            debug!(cookbook_path = %actual.display(), "Overriding cookbook path for upload");
            *setting = Some(actual.to_path_buf());
        }
        Self { previous }
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        *COOKBOOK_PATH.write() = self.previous.take();
    }
}

/// Run `op` with the setting pointing at `actual_cookbook_path`.
///
/// An explicit value is never replaced. The prior value, including "unset",
/// is restored however `op` finishes: success, error, panic, or the future
/// being dropped.
pub async fn with_actual_cookbooks_dir<F, Fut, T>(actual_cookbook_path: &Path, op: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let _serialized = override_lock().lock().await;
    let _restore = RestoreGuard::apply(actual_cookbook_path);
    op().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_sets_unset_value_and_restores_unset() {
        set(None);
        let seen = with_actual_cookbooks_dir(Path::new("/repo/cookbooks"), || async { get() }).await;
        assert_eq!(seen, Some(PathBuf::from("/repo/cookbooks")));
        assert_eq!(get(), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_does_not_override_explicit_value() {
        set(Some(PathBuf::from("/user/cookbooks")));
        let seen = with_actual_cookbooks_dir(Path::new("/repo/cookbooks"), || async { get() }).await;
        assert_eq!(seen, Some(PathBuf::from("/user/cookbooks")));
        assert_eq!(get(), Some(PathBuf::from("/user/cookbooks")));
        set(None);
    }

    #[tokio::test]
    #[serial]
    async fn test_restores_after_error() {
        set(None);
        let result: Result<(), String> =
            with_actual_cookbooks_dir(Path::new("/repo/cookbooks"), || async {
                Err("upload failed".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(get(), None);
    }

    #[test]
    #[serial]
    fn test_restores_after_panic() {
        set(None);
        let outcome = std::panic::catch_unwind(|| {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(with_actual_cookbooks_dir(
                Path::new("/repo/cookbooks"),
                || async { panic!("uploader blew up") },
            ))
        });
        assert!(outcome.is_err());
        assert_eq!(get(), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_set_returns_previous() {
        set(None);
        assert_eq!(set(Some(PathBuf::from("/a"))), None);
        assert_eq!(set(None), Some(PathBuf::from("/a")));
    }

    #[tokio::test]
    #[serial]
    async fn test_overlapping_overrides_are_serialized() {
        set(None);
        let first = with_actual_cookbooks_dir(Path::new("/repo/a"), || async {
            let before = get();
            // Give the second override a chance to run while this one holds the setting.
            for _ in 0..8 {
                tokio::task::yield_now().await;
            }
            (before, get())
        });
        let second = with_actual_cookbooks_dir(Path::new("/repo/b"), || async {
            tokio::task::yield_now().await;
            get()
        });

        let ((first_before, first_after), second_seen) = tokio::join!(first, second);
        assert_eq!(first_before, Some(PathBuf::from("/repo/a")));
        assert_eq!(first_after, Some(PathBuf::from("/repo/a")));
        assert_eq!(second_seen, Some(PathBuf::from("/repo/b")));
        assert_eq!(get(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[serial]
    async fn test_overrides_from_spawned_tasks() {
        set(None);
        let tasks: Vec<_> = ["/repo/a", "/repo/b", "/repo/c"]
            .into_iter()
            .map(|path| {
                tokio::spawn(async move {
                    with_actual_cookbooks_dir(Path::new(path), || async move {
                        let before = get();
                        tokio::task::yield_now().await;
                        (path, before, get())
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            let (path, before, after) = task.await.unwrap();
            assert_eq!(before, Some(PathBuf::from(path)));
            assert_eq!(after, Some(PathBuf::from(path)));
        }
        assert_eq!(get(), None);
    }
}

//! Process-environment overrides for tests, restored on drop.

use std::ffi::OsString;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ddmlp::app_dirs::CONFIG_HOME_ENV;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Holds the environment lock while variables are overridden.
///
/// Every variable set through the guard gets its previous value (or absence)
/// back when the guard drops, in reverse order of setting.
pub struct ScopedEnv {
    saved: Vec<(&'static str, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    pub fn new() -> Self {
        Self {
            saved: Vec::new(),
            _lock: ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner()),
        }
    }

    /// Resolve the `.ddmlp` directory under `base`.
    pub fn config_home(base: &Path) -> Self {
        let mut env = Self::new();
        env.set(CONFIG_HOME_ENV, base);
        env
    }

    pub fn set(&mut self, key: &'static str, value: impl AsRef<std::ffi::OsStr>) -> &mut Self {
        self.saved.push((key, std::env::var_os(key)));
        // SAFETY: `ENV_LOCK` is held for the guard's lifetime.
        unsafe { std::env::set_var(key, value) };
        self
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        while let Some((key, previous)) = self.saved.pop() {
            // SAFETY: `ENV_LOCK` is still held; `_lock` drops after this body.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}

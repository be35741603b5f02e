use std::{
    collections::HashMap,
    env,
    ffi::{OsStr, OsString},
    mem,
    sync::{Mutex, MutexGuard, PoisonError},
};

use ethabi::Address;

/// Mutex guarding env variables used by config tests. Changes made through the returned
/// [`EnvMutexGuard`] are rolled back when the guard is dropped.
#[derive(Debug)]
pub(crate) struct EnvMutex(Mutex<()>);

impl EnvMutex {
    pub const fn new() -> Self {
        Self(Mutex::new(()))
    }

    pub fn lock(&self) -> EnvMutexGuard<'_> {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        EnvMutexGuard {
            _inner: guard,
            redefined_vars: HashMap::new(),
        }
    }
}

#[must_use = "Environment will be reset when the guard is dropped"]
#[derive(Debug)]
pub(crate) struct EnvMutexGuard<'a> {
    _inner: MutexGuard<'a, ()>,
    redefined_vars: HashMap<OsString, Option<OsString>>,
}

impl Drop for EnvMutexGuard<'_> {
    fn drop(&mut self) {
        for (env_name, value) in mem::take(&mut self.redefined_vars) {
            if let Some(value) = value {
                env::set_var(env_name, value);
            } else {
                env::remove_var(env_name);
            }
        }
    }
}

impl EnvMutexGuard<'_> {
    fn remember(&mut self, variable_name: &OsStr) {
        if !self.redefined_vars.contains_key(variable_name) {
            let prev_value = env::var_os(variable_name);
            self.redefined_vars
                .insert(variable_name.to_os_string(), prev_value);
        }
    }

    /// Sets env vars specified in `.env`-like format.
    pub fn set_env(&mut self, fixture: &str) {
        for line in fixture.split('\n').map(str::trim) {
            if line.is_empty() {
                continue;
            }

            let (name, value) = line
                .split_once('=')
                .unwrap_or_else(|| panic!("Incorrect line for setting env variable: {line}"));
            let variable_name: &OsStr = name.as_ref();
            self.remember(variable_name);
            env::set_var(variable_name, value.trim_matches('"'));
        }
    }

    pub fn remove_env(&mut self, var_names: &[&str]) {
        for &var_name in var_names {
            self.remember(var_name.as_ref());
            env::remove_var(var_name);
        }
    }
}

/// Parses the address panicking upon deserialization failure.
pub fn addr(addr_str: &str) -> Address {
    addr_str.parse().expect("Incorrect address string")
}

#[test]
fn env_mutex_basics() {
    const TEST_VARIABLE_NAME: &str = "ALLOWLIST_TEST_VARIABLE_THAT_WILL_CERTAINLY_NOT_BE_SET";
    const REDEFINED_VARIABLE_NAME: &str = "ALLOWLIST_REDEFINED_VARIABLE_THAT_WILL_CERTAINLY_NOT_BE_SET";

    assert!(env::var_os(TEST_VARIABLE_NAME).is_none());
    assert!(env::var_os(REDEFINED_VARIABLE_NAME).is_none());
    env::set_var(REDEFINED_VARIABLE_NAME, "initial");

    let mutex = EnvMutex::new();
    let mut lock = mutex.lock();
    lock.set_env(&format!("{TEST_VARIABLE_NAME}=test"));
    assert!(lock.redefined_vars[OsStr::new(TEST_VARIABLE_NAME)].is_none());
    assert_eq!(env::var_os(TEST_VARIABLE_NAME).unwrap(), "test");
    lock.set_env(&format!("{REDEFINED_VARIABLE_NAME}=redefined"));
    assert_eq!(env::var_os(REDEFINED_VARIABLE_NAME).unwrap(), "redefined");

    lock.remove_env(&[REDEFINED_VARIABLE_NAME]);
    assert!(env::var_os(REDEFINED_VARIABLE_NAME).is_none());
    assert_eq!(
        lock.redefined_vars[OsStr::new(REDEFINED_VARIABLE_NAME)]
            .as_ref()
            .unwrap(),
        "initial"
    );

    drop(lock);
    assert!(env::var_os(TEST_VARIABLE_NAME).is_none());
    assert_eq!(env::var_os(REDEFINED_VARIABLE_NAME).unwrap(), "initial");
    env::remove_var(REDEFINED_VARIABLE_NAME);
}
